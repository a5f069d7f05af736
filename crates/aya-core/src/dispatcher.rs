//! Command dispatch: prefix parsing, resolution, gates, handler invocation.
//!
//! Gate order is fixed and short-circuits on the first denial:
//! block-list → owner → group → private → admin → cooldown → abuse → handler.

use std::sync::Arc;

use tokio::task::AbortHandle;
use tracing::{debug, error, info, warn};

use crate::{
    audit::{AuditEvent, AuditLogger},
    config::Config,
    cooldown::{ceil_secs, CooldownLedger},
    messaging::{
        port::MessagingPort,
        types::{MessageContext, OutgoingMessage, SendOptions},
    },
    registry::{AccessFlags, CommandContext, CommandSpec, LoadReport, SharedRegistry},
    replies,
    security::AbuseTracker,
    Result,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Denial {
    OwnerOnly,
    GroupOnly,
    PrivateOnly,
    AdminOnly,
    Cooldown { remaining_secs: u64 },
    Spam { remaining_secs: u64 },
}

impl Denial {
    pub fn reply(&self) -> String {
        match self {
            Denial::OwnerOnly => replies::OWNER_ONLY.to_string(),
            Denial::GroupOnly => replies::GROUP_ONLY.to_string(),
            Denial::PrivateOnly => replies::PRIVATE_ONLY.to_string(),
            Denial::AdminOnly => replies::ADMIN_ONLY.to_string(),
            Denial::Cooldown { remaining_secs } => replies::cooldown(*remaining_secs),
            Denial::Spam { remaining_secs } => replies::spam(*remaining_secs),
        }
    }

    pub fn reason(&self) -> &'static str {
        match self {
            Denial::OwnerOnly => "owner_only",
            Denial::GroupOnly => "group_only",
            Denial::PrivateOnly => "private_only",
            Denial::AdminOnly => "admin_only",
            Denial::Cooldown { .. } => "cooldown",
            Denial::Spam { .. } => "spam",
        }
    }
}

/// What `Dispatcher::handle` did with a message.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Text does not start with the prefix.
    NotCommand,
    UnknownCommand,
    /// Sender is on the block-list; ignored without a reply.
    Blocked { command: String },
    Denied { command: String, denial: Denial },
    Completed { command: String },
    Failed { command: String, error: String },
}

/// Split `text` into a lower-cased command name and its arguments.
///
/// `None` when `text` does not start with `prefix`. A bare prefix yields an
/// empty name, which never resolves.
pub fn parse_command(text: &str, prefix: &str) -> Option<(String, Vec<String>)> {
    let rest = text.strip_prefix(prefix)?;
    let mut tokens = rest.split_whitespace();
    let name = tokens.next().unwrap_or_default().to_lowercase();
    let args = tokens.map(str::to_string).collect();
    Some((name, args))
}

fn access_denial(access: &AccessFlags, ctx: &MessageContext) -> Option<Denial> {
    if access.owner_only && !ctx.is_sender_owner {
        return Some(Denial::OwnerOnly);
    }
    if access.group_only && !ctx.is_group_chat {
        return Some(Denial::GroupOnly);
    }
    if access.private_only && ctx.is_group_chat {
        return Some(Denial::PrivateOnly);
    }
    if access.admin_only && !(ctx.is_sender_chat_admin || ctx.is_sender_owner) {
        return Some(Denial::AdminOnly);
    }
    None
}

struct AbortOnDrop(AbortHandle);

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        self.0.abort();
    }
}

pub struct Dispatcher {
    cfg: Arc<Config>,
    registry: Arc<SharedRegistry>,
    cooldowns: CooldownLedger,
    abuse: Arc<AbuseTracker>,
    messenger: Arc<dyn MessagingPort>,
    audit: Option<AuditLogger>,
}

impl Dispatcher {
    pub fn new(
        cfg: Arc<Config>,
        registry: Arc<SharedRegistry>,
        abuse: Arc<AbuseTracker>,
        messenger: Arc<dyn MessagingPort>,
    ) -> Self {
        let audit = cfg.audit_log_path.clone().map(AuditLogger::new);
        Self {
            cfg,
            registry,
            cooldowns: CooldownLedger::new(),
            abuse,
            messenger,
            audit,
        }
    }

    pub fn cooldowns(&self) -> &CooldownLedger {
        &self.cooldowns
    }

    pub fn registry(&self) -> &Arc<SharedRegistry> {
        &self.registry
    }

    /// Re-scan the plugin source; see [`SharedRegistry::reload`].
    pub async fn reload(&self) -> Result<LoadReport> {
        self.registry.reload().await
    }

    /// Dispatch one message. Never fails: handler errors become `Failed`.
    pub async fn handle(&self, ctx: &MessageContext) -> DispatchOutcome {
        let outcome = self.dispatch(ctx).await;
        self.record(ctx, &outcome);
        outcome
    }

    async fn dispatch(&self, ctx: &MessageContext) -> DispatchOutcome {
        let Some((name, args)) = parse_command(&ctx.text, &self.cfg.prefix) else {
            return DispatchOutcome::NotCommand;
        };

        let snapshot = self.registry.snapshot().await;
        let Some(spec) = snapshot.resolve(&name) else {
            debug!(command = %name, sender = %ctx.sender_id, "unknown command");
            return DispatchOutcome::UnknownCommand;
        };
        let command = spec.name.clone();

        if !ctx.is_sender_owner && self.abuse.is_blocked(&ctx.sender_id).await {
            debug!(command = %command, sender = %ctx.sender_id, "ignoring blocked sender");
            return DispatchOutcome::Blocked { command };
        }

        if let Some(denial) = access_denial(&spec.access, ctx) {
            return self.deny(ctx, command, denial).await;
        }

        // Keyed by the name as typed: an alias keeps its own cooldown.
        let remaining = self.cooldowns.check(&name).await;
        if !remaining.is_zero() {
            let denial = Denial::Cooldown {
                remaining_secs: ceil_secs(remaining),
            };
            return self.deny(ctx, command, denial).await;
        }

        if self.cfg.antispam && !ctx.is_sender_owner {
            let verdict = self.abuse.check(&ctx.sender_id).await;
            if verdict.is_spam {
                warn!(sender = %ctx.sender_id, command = %command, "spam detected");
                let denial = Denial::Spam {
                    remaining_secs: ceil_secs(verdict.remaining),
                };
                return self.deny(ctx, command, denial).await;
            }
        }

        let invocation = CommandContext {
            message: ctx.clone(),
            command: command.clone(),
            messenger: self.messenger.clone(),
            cfg: self.cfg.clone(),
            abuse: self.abuse.clone(),
            registry: snapshot.clone(),
        };

        match self.run_handler(&spec, invocation, args).await {
            Ok(()) => {
                if !spec.cooldown.is_zero() {
                    self.cooldowns.touch(&name, spec.cooldown).await;
                }
                let chat_kind = if ctx.is_group_chat { "group" } else { "private" };
                info!(
                    command = %command,
                    sender = %ctx.sender_id,
                    chat = chat_kind,
                    "command executed"
                );
                DispatchOutcome::Completed { command }
            }
            Err(e) => {
                error!(command = %command, sender = %ctx.sender_id, "command failed: {e}");
                self.reply(ctx, replies::HANDLER_FAILED.to_string()).await;
                DispatchOutcome::Failed { command, error: e }
            }
        }
    }

    /// Run the handler on its own task so a panic or timeout stays contained.
    async fn run_handler(
        &self,
        spec: &CommandSpec,
        invocation: CommandContext,
        args: Vec<String>,
    ) -> std::result::Result<(), String> {
        let handler = spec.handler.clone();
        let task = tokio::spawn(async move { handler.execute(&invocation, &args).await });
        // Dropping this dispatch (timeout, router shutdown) also stops the handler.
        let _guard = AbortOnDrop(task.abort_handle());

        let joined = match self.cfg.handler_timeout {
            Some(limit) => match tokio::time::timeout(limit, task).await {
                Ok(joined) => joined,
                Err(_) => return Err(format!("timed out after {}ms", limit.as_millis())),
            },
            None => task.await,
        };

        match joined {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(format!("{e:#}")),
            Err(e) if e.is_panic() => Err("handler panicked".to_string()),
            Err(e) => Err(e.to_string()),
        }
    }

    async fn deny(&self, ctx: &MessageContext, command: String, denial: Denial) -> DispatchOutcome {
        info!(
            command = %command,
            sender = %ctx.sender_id,
            reason = denial.reason(),
            "command denied"
        );
        self.reply(ctx, denial.reply()).await;
        DispatchOutcome::Denied { command, denial }
    }

    async fn reply(&self, ctx: &MessageContext, text: String) {
        let options = SendOptions::quoting(ctx.message.as_ref());
        if let Err(e) = self
            .messenger
            .send_message(&ctx.chat_id, OutgoingMessage::text(text), options)
            .await
        {
            warn!(chat = %ctx.chat_id, "failed to send reply: {e}");
        }
    }

    fn record(&self, ctx: &MessageContext, outcome: &DispatchOutcome) {
        let Some(audit) = &self.audit else {
            return;
        };
        let event = |command: &str, result: &str| {
            AuditEvent::command(&ctx.sender_id, &ctx.chat_id, command, result)
                .with_content(&ctx.text)
        };
        let event = match outcome {
            DispatchOutcome::NotCommand | DispatchOutcome::UnknownCommand => return,
            DispatchOutcome::Blocked { command } => event(command, "blocked"),
            DispatchOutcome::Denied { command, denial } => {
                event(command, "denied").with_reason(denial.reason())
            }
            DispatchOutcome::Completed { command } => event(command, "completed"),
            DispatchOutcome::Failed { command, error } => {
                event(command, "failed").with_error(error.clone())
            }
        };
        if let Err(e) = audit.write(event) {
            warn!("failed to write audit log {}: {e}", audit.path().display());
        }
    }
}
