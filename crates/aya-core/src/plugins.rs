//! Where command specs come from.
//!
//! A `PluginSource` enumerates specs each time the registry is (re)built.
//! `DirPluginSource` reads JSON manifests from `<root>/<category>/*.json` and
//! binds each one to a compiled handler through a `HandlerCatalog`.

use std::{
    collections::HashMap,
    fs,
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
};

use serde::Deserialize;

use crate::{
    errors::Error,
    registry::{AccessFlags, CommandHandler, CommandSpec},
    Result,
};

/// Result of one enumeration pass. Broken plugins land in `failures`.
#[derive(Debug, Default)]
pub struct PluginLoad {
    pub specs: Vec<CommandSpec>,
    pub failures: Vec<Error>,
}

pub trait PluginSource: Send + Sync {
    /// Produce the current set of specs. `Err` means nothing could be read.
    fn enumerate(&self) -> Result<PluginLoad>;
}

// ============== Static ==============

/// In-memory source. `replace` swaps what the next enumeration returns.
#[derive(Default)]
pub struct StaticPluginSource {
    specs: Mutex<Vec<CommandSpec>>,
    fail_next: Mutex<Option<String>>,
}

impl StaticPluginSource {
    pub fn new(specs: Vec<CommandSpec>) -> Self {
        Self {
            specs: Mutex::new(specs),
            fail_next: Mutex::new(None),
        }
    }

    pub fn replace(&self, specs: Vec<CommandSpec>) {
        *self.specs.lock().unwrap_or_else(|p| p.into_inner()) = specs;
    }

    /// Make the next `enumerate` fail with `reason`.
    pub fn fail_next_enumerate(&self, reason: impl Into<String>) {
        *self.fail_next.lock().unwrap_or_else(|p| p.into_inner()) = Some(reason.into());
    }
}

impl PluginSource for StaticPluginSource {
    fn enumerate(&self) -> Result<PluginLoad> {
        if let Some(reason) = self
            .fail_next
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .take()
        {
            return Err(Error::External(reason));
        }
        Ok(PluginLoad {
            specs: self
                .specs
                .lock()
                .unwrap_or_else(|p| p.into_inner())
                .clone(),
            failures: Vec::new(),
        })
    }
}

// ============== Handler catalog ==============

/// Handler implementations addressable by key from a manifest.
#[derive(Clone, Default)]
pub struct HandlerCatalog {
    handlers: HashMap<String, Arc<dyn CommandHandler>>,
}

impl HandlerCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, handler: Arc<dyn CommandHandler>) {
        self.handlers.insert(key.into(), handler);
    }

    pub fn with(mut self, key: impl Into<String>, handler: Arc<dyn CommandHandler>) -> Self {
        self.insert(key, handler);
        self
    }

    pub fn get(&self, key: &str) -> Option<Arc<dyn CommandHandler>> {
        self.handlers.get(key).cloned()
    }

    pub fn keys(&self) -> Vec<&str> {
        let mut keys: Vec<&str> = self.handlers.keys().map(String::as_str).collect();
        keys.sort_unstable();
        keys
    }
}

// ============== Directory ==============

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Manifest {
    command: String,
    #[serde(default)]
    aliases: Vec<String>,
    #[serde(default)]
    description: String,
    #[serde(default)]
    usage: String,
    /// Seconds.
    #[serde(default)]
    cooldown: u64,
    #[serde(default)]
    owner_only: bool,
    #[serde(default)]
    group_only: bool,
    #[serde(default)]
    private_only: bool,
    #[serde(default)]
    admin_only: bool,
    /// Catalog key; defaults to `command`.
    #[serde(default)]
    handler: Option<String>,
}

pub struct DirPluginSource {
    root: PathBuf,
    catalog: HandlerCatalog,
}

impl DirPluginSource {
    pub fn new(root: impl Into<PathBuf>, catalog: HandlerCatalog) -> Self {
        Self {
            root: root.into(),
            catalog,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn load_manifest(&self, category: &str, path: &Path) -> Result<CommandSpec> {
        let fail = |reason: String| Error::PluginLoad {
            path: path.to_path_buf(),
            reason,
        };

        let raw = fs::read_to_string(path).map_err(|e| fail(e.to_string()))?;
        let m: Manifest = serde_json::from_str(&raw).map_err(|e| fail(e.to_string()))?;
        if m.command.trim().is_empty() {
            return Err(fail("empty command name".to_string()));
        }

        let key = m.handler.clone().unwrap_or_else(|| m.command.clone());
        let handler = self
            .catalog
            .get(&key)
            .ok_or_else(|| fail(format!("unknown handler `{key}`")))?;

        Ok(CommandSpec::new(m.command, handler)
            .aliases(m.aliases)
            .category(category)
            .description(m.description)
            .usage(m.usage)
            .cooldown_secs(m.cooldown)
            .access(AccessFlags {
                owner_only: m.owner_only,
                group_only: m.group_only,
                private_only: m.private_only,
                admin_only: m.admin_only,
            }))
    }
}

fn sorted_entries(dir: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut out = fs::read_dir(dir)?
        .filter_map(|e| e.ok().map(|e| e.path()))
        .collect::<Vec<_>>();
    out.sort();
    Ok(out)
}

impl PluginSource for DirPluginSource {
    fn enumerate(&self) -> Result<PluginLoad> {
        let mut load = PluginLoad::default();

        for category_dir in sorted_entries(&self.root)? {
            if !category_dir.is_dir() {
                continue;
            }
            let Some(category) = category_dir.file_name().and_then(|n| n.to_str()) else {
                continue;
            };

            let files = match sorted_entries(&category_dir) {
                Ok(v) => v,
                Err(e) => {
                    load.failures.push(Error::PluginLoad {
                        path: category_dir.clone(),
                        reason: e.to_string(),
                    });
                    continue;
                }
            };

            for path in files {
                if path.extension().and_then(|e| e.to_str()) != Some("json") {
                    continue;
                }
                match self.load_manifest(category, &path) {
                    Ok(spec) => load.specs.push(spec),
                    Err(e) => load.failures.push(e),
                }
            }
        }

        Ok(load)
    }
}
