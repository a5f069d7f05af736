//! Command registry: command specs indexed by primary name and alias.
//!
//! Names are lower-cased on the way in and on lookup. An alias resolves in
//! exactly one hop to a primary name; primary names and aliases share one
//! namespace, so any collision is rejected with `DuplicateCommand`.

use std::{collections::HashMap, fmt, sync::Arc, time::Duration};

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::{
    config::Config,
    domain::MessageRef,
    errors::Error,
    messaging::{
        port::MessagingPort,
        types::{MessageContext, OutgoingMessage, SendOptions},
    },
    plugins::PluginSource,
    security::AbuseTracker,
    Result,
};

// ============== Handler ==============

/// Everything a handler may touch while it runs.
#[derive(Clone)]
pub struct CommandContext {
    pub message: MessageContext,
    /// Primary name of the command being run.
    pub command: String,
    pub messenger: Arc<dyn MessagingPort>,
    pub cfg: Arc<Config>,
    pub abuse: Arc<AbuseTracker>,
    /// Registry snapshot the command was resolved from.
    pub registry: Arc<CommandRegistry>,
}

impl CommandContext {
    /// Send `text` to the originating chat, quoting the triggering message.
    pub async fn reply(&self, text: impl Into<String>) -> Result<MessageRef> {
        self.send(OutgoingMessage::text(text)).await
    }

    pub async fn send(&self, payload: OutgoingMessage) -> Result<MessageRef> {
        self.messenger
            .send_message(
                &self.message.chat_id,
                payload,
                SendOptions::quoting(self.message.message.as_ref()),
            )
            .await
    }
}

/// A command implementation. Errors are contained by the dispatcher.
#[async_trait]
pub trait CommandHandler: Send + Sync {
    async fn execute(&self, ctx: &CommandContext, args: &[String]) -> anyhow::Result<()>;
}

// ============== Spec ==============

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct AccessFlags {
    pub owner_only: bool,
    pub group_only: bool,
    pub private_only: bool,
    pub admin_only: bool,
}

#[derive(Clone)]
pub struct CommandSpec {
    pub name: String,
    pub aliases: Vec<String>,
    pub category: String,
    pub description: String,
    pub usage: String,
    /// `Duration::ZERO` means no cooldown.
    pub cooldown: Duration,
    pub access: AccessFlags,
    pub handler: Arc<dyn CommandHandler>,
}

impl CommandSpec {
    pub fn new(name: impl Into<String>, handler: Arc<dyn CommandHandler>) -> Self {
        Self {
            name: name.into(),
            aliases: Vec::new(),
            category: "general".to_string(),
            description: String::new(),
            usage: String::new(),
            cooldown: Duration::ZERO,
            access: AccessFlags::default(),
            handler,
        }
    }

    pub fn aliases<I, S>(mut self, aliases: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.aliases = aliases.into_iter().map(Into::into).collect();
        self
    }

    pub fn category(mut self, category: impl Into<String>) -> Self {
        self.category = category.into();
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn usage(mut self, usage: impl Into<String>) -> Self {
        self.usage = usage.into();
        self
    }

    pub fn cooldown_secs(mut self, secs: u64) -> Self {
        self.cooldown = Duration::from_secs(secs);
        self
    }

    pub fn access(mut self, access: AccessFlags) -> Self {
        self.access = access;
        self
    }

    /// Lower-case the names and drop repeated aliases.
    fn normalized(mut self) -> Self {
        self.name = self.name.trim().to_lowercase();
        let mut aliases: Vec<String> = Vec::with_capacity(self.aliases.len());
        for alias in self.aliases.drain(..) {
            let alias = alias.trim().to_lowercase();
            if !alias.is_empty() && !aliases.contains(&alias) {
                aliases.push(alias);
            }
        }
        self.aliases = aliases;
        self
    }
}

impl fmt::Debug for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandSpec")
            .field("name", &self.name)
            .field("aliases", &self.aliases)
            .field("category", &self.category)
            .field("cooldown", &self.cooldown)
            .field("access", &self.access)
            .finish_non_exhaustive()
    }
}

// ============== Registry ==============

#[derive(Default)]
pub struct CommandRegistry {
    /// Primary name → spec.
    commands: HashMap<String, Arc<CommandSpec>>,
    /// Alias → primary name.
    aliases: HashMap<String, String>,
}

impl CommandRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn is_claimed(&self, name: &str) -> bool {
        self.commands.contains_key(name) || self.aliases.contains_key(name)
    }

    /// Add a command. On any error the registry is left untouched.
    pub fn register(&mut self, spec: CommandSpec) -> Result<()> {
        let spec = spec.normalized();
        if spec.name.is_empty() {
            return Err(Error::InvalidCommand("empty command name".to_string()));
        }

        for name in std::iter::once(&spec.name).chain(spec.aliases.iter()) {
            if self.is_claimed(name) {
                return Err(Error::DuplicateCommand { name: name.clone() });
            }
        }
        if spec.aliases.contains(&spec.name) {
            return Err(Error::DuplicateCommand {
                name: spec.name.clone(),
            });
        }

        for alias in &spec.aliases {
            self.aliases.insert(alias.clone(), spec.name.clone());
        }
        self.commands.insert(spec.name.clone(), Arc::new(spec));
        Ok(())
    }

    /// Look up by primary name or alias (case-insensitive). Never chains aliases.
    pub fn resolve(&self, name: &str) -> Option<Arc<CommandSpec>> {
        let name = name.to_lowercase();
        if let Some(spec) = self.commands.get(&name) {
            return Some(spec.clone());
        }
        let primary = self.aliases.get(&name)?;
        self.commands.get(primary).cloned()
    }

    /// Every command once, ordered by category then name.
    pub fn list(&self) -> Vec<Arc<CommandSpec>> {
        let mut out: Vec<_> = self.commands.values().cloned().collect();
        out.sort_by(|a, b| (&a.category, &a.name).cmp(&(&b.category, &b.name)));
        out
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Build a registry from specs, collecting rejected ones instead of failing.
    pub fn build(specs: impl IntoIterator<Item = CommandSpec>) -> (Self, Vec<Error>) {
        let mut reg = Self::new();
        let mut failures = Vec::new();
        for spec in specs {
            if let Err(e) = reg.register(spec) {
                failures.push(e);
            }
        }
        (reg, failures)
    }
}

// ============== Shared (reloadable) registry ==============

/// What a (re)load produced.
#[derive(Debug, Default)]
pub struct LoadReport {
    pub loaded: usize,
    pub failures: Vec<Error>,
}

/// Registry handle shared between the dispatcher and whoever triggers reloads.
///
/// Readers clone the current `Arc` snapshot; `reload` builds a complete new
/// registry and swaps the pointer, so a half-built registry is never visible.
pub struct SharedRegistry {
    source: Arc<dyn PluginSource>,
    current: RwLock<Arc<CommandRegistry>>,
}

impl SharedRegistry {
    /// Load from `source`. Fails only if the source cannot be enumerated at all.
    pub fn load(source: Arc<dyn PluginSource>) -> Result<(Self, LoadReport)> {
        let (registry, report) = build_from(source.as_ref())?;
        Ok((
            Self {
                source,
                current: RwLock::new(Arc::new(registry)),
            },
            report,
        ))
    }

    pub async fn snapshot(&self) -> Arc<CommandRegistry> {
        self.current.read().await.clone()
    }

    pub async fn resolve(&self, name: &str) -> Option<Arc<CommandSpec>> {
        self.snapshot().await.resolve(name)
    }

    /// Re-scan the source and swap in the result. On error the old registry stays.
    ///
    /// Enumeration may hit the filesystem, so it runs on the blocking pool.
    pub async fn reload(&self) -> Result<LoadReport> {
        let source = self.source.clone();
        let built = tokio::task::spawn_blocking(move || build_from(source.as_ref()))
            .await
            .map_err(|e| Error::External(format!("plugin scan task failed: {e}")))
            .and_then(|built| built);
        let (registry, report) = match built {
            Ok(v) => v,
            Err(e) => {
                warn!("registry reload failed, keeping previous commands: {e}");
                return Err(e);
            }
        };
        *self.current.write().await = Arc::new(registry);
        info!(commands = report.loaded, "registry reloaded");
        Ok(report)
    }
}

fn build_from(source: &dyn PluginSource) -> Result<(CommandRegistry, LoadReport)> {
    let load = source.enumerate()?;
    let mut failures = load.failures;

    let (registry, rejected) = CommandRegistry::build(load.specs);
    failures.extend(rejected);

    for spec in registry.list() {
        info!("Loaded plugin: {} ({})", spec.name, spec.category);
    }
    for e in &failures {
        warn!("Skipped plugin: {e}");
    }
    info!("Loaded {} plugins successfully", registry.len());

    let report = LoadReport {
        loaded: registry.len(),
        failures,
    };
    Ok((registry, report))
}
