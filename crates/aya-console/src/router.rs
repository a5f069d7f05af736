use std::{sync::Arc, time::Duration};

use chrono::Local;
use tokio::{
    io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite},
    task::JoinSet,
};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use aya_core::{
    config::Config,
    dispatcher::Dispatcher,
    domain::{ChatId, SenderId},
    messaging::{
        normalize::normalize,
        port::MessagingPort,
        types::{InboundEvent, InboundMessage, OutgoingMessage, SendOptions},
    },
    security::{AbuseTracker, SWEEP_INTERVAL},
};

use crate::{
    input::{ConsoleInput, LineParser},
    ConsoleMessenger,
};

/// How long `!admin` waits for earlier messages before applying the grant.
pub const OPERATOR_SETTLE: Duration = Duration::from_secs(2);
/// How long shutdown waits for in-flight dispatches before aborting them.
pub const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

#[derive(Clone)]
pub struct AppState {
    pub cfg: Arc<Config>,
    pub messenger: Arc<dyn MessagingPort>,
    pub dispatcher: Arc<Dispatcher>,
    pub abuse: Arc<AbuseTracker>,
}

/// Route one inbound event. Message dispatch runs on its own task in `tasks`.
pub fn handle_event(state: &AppState, tasks: &mut JoinSet<()>, event: InboundEvent) {
    match event {
        InboundEvent::Message(msg) => {
            let state = state.clone();
            tasks.spawn(async move { dispatch_message(&state, &msg).await });
        }
        InboundEvent::ParticipantsAdded {
            chat_id,
            participants,
        } => {
            let state = state.clone();
            tasks.spawn(async move { welcome(&state, &chat_id, &participants).await });
        }
    }
}

async fn dispatch_message(state: &AppState, msg: &InboundMessage) {
    let Some(ctx) = normalize(msg, &state.cfg, state.messenger.as_ref()).await else {
        return;
    };
    state.dispatcher.handle(&ctx).await;
}

pub fn welcome_text(cfg: &Config) -> String {
    format!(
        "👋 *Welcome!*\n\nI'm *{}*, send *{}menu* to see the available commands.",
        cfg.bot_name, cfg.prefix
    )
}

/// Greet each new participant with a mention.
pub async fn welcome(state: &AppState, chat_id: &ChatId, participants: &[SenderId]) {
    for participant in participants {
        let payload =
            OutgoingMessage::text(welcome_text(&state.cfg)).with_mentions(vec![participant.clone()]);
        if let Err(e) = state
            .messenger
            .send_message(chat_id, payload, SendOptions::default())
            .await
        {
            warn!(chat = %chat_id, participant = %participant, "welcome failed: {e}");
        }
    }
}

/// Tell the owner the bot is up. Returns whether a notification was sent.
pub async fn notify_owner(state: &AppState) -> bool {
    let Some(owner) = state.cfg.owner_id() else {
        return false;
    };
    let text = format!(
        "🤖 *{} online!*\n\n✅ Connected\n📅 Time: {}",
        state.cfg.bot_name,
        Local::now().format("%Y-%m-%d %H:%M:%S")
    );
    match state
        .messenger
        .send_message(&ChatId::from(&owner), OutgoingMessage::text(text), SendOptions::default())
        .await
    {
        Ok(_) => true,
        Err(e) => {
            warn!("owner notification failed: {e}");
            false
        }
    }
}

/// Wait up to `limit` for every task in `tasks` to finish. Returns whether they all did.
async fn settle(tasks: &mut JoinSet<()>, limit: Duration) -> bool {
    tokio::time::timeout(limit, async {
        while tasks.join_next().await.is_some() {}
    })
    .await
    .is_ok()
}

async fn reload<W>(state: &AppState, console: &ConsoleMessenger<W>) -> anyhow::Result<()>
where
    W: AsyncWrite + Unpin + Send,
{
    match state.dispatcher.reload().await {
        Ok(report) => {
            console
                .notice(&format!(
                    "reloaded {} commands, {} skipped",
                    report.loaded,
                    report.failures.len()
                ))
                .await?;
            for failure in &report.failures {
                console.notice(&format!("  {failure}")).await?;
            }
        }
        Err(e) => console.notice(&format!("reload failed: {e}")).await?,
    }
    Ok(())
}

/// Read console lines until EOF, `!quit` or `cancel`.
///
/// In-flight dispatches get [`SHUTDOWN_GRACE`] to finish and are aborted after that.
pub async fn run<R, W>(
    state: AppState,
    console: Arc<ConsoleMessenger<W>>,
    input: R,
    cancel: CancellationToken,
) -> anyhow::Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let sweep_cancel = cancel.child_token();
    let sweeper = state
        .abuse
        .clone()
        .spawn_sweeper(SWEEP_INTERVAL, sweep_cancel.clone());

    if notify_owner(&state).await {
        info!("owner notified");
    }
    info!(bot = %state.cfg.bot_name, prefix = %state.cfg.prefix, "console ready");

    let mut lines = input.lines();
    let mut parser = LineParser::default();
    let mut tasks = JoinSet::new();

    loop {
        let line = tokio::select! {
            _ = cancel.cancelled() => break,
            line = lines.next_line() => line?,
        };
        let Some(line) = line else {
            break;
        };
        // Reap finished dispatches.
        while tasks.try_join_next().is_some() {}

        match parser.parse(&line) {
            Ok(None) => {}
            Ok(Some(ConsoleInput::Event(event))) => {
                if let InboundEvent::ParticipantsAdded {
                    chat_id,
                    participants,
                } = &event
                {
                    console.join(chat_id, participants).await;
                }
                handle_event(&state, &mut tasks, event);
            }
            // A grant applies after messages typed before it, unless one of them hangs.
            Ok(Some(ConsoleInput::GrantAdmin { chat_id, sender_id })) => {
                if !settle(&mut tasks, OPERATOR_SETTLE).await {
                    warn!(pending = tasks.len(), "granting admin with dispatches still running");
                }
                console.grant_admin(chat_id, sender_id).await;
            }
            // Dispatches already running keep the registry snapshot they resolved from.
            Ok(Some(ConsoleInput::Reload)) => reload(&state, &console).await?,
            Ok(Some(ConsoleInput::Quit)) => break,
            Err(usage) => console.notice(&usage).await?,
        }
    }

    if !settle(&mut tasks, SHUTDOWN_GRACE).await {
        warn!(pending = tasks.len(), "aborting dispatches still running at shutdown");
        tasks.shutdown().await;
    }
    sweep_cancel.cancel();
    let _ = sweeper.await;
    info!("console closed");
    Ok(())
}
