use std::sync::Arc;

use tokio::io::BufReader;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use aya_console::{
    router::{self, AppState},
    ConsoleMessenger,
};
use aya_core::{
    config::Config,
    dispatcher::Dispatcher,
    messaging::port::MessagingPort,
    plugins::{DirPluginSource, PluginSource, StaticPluginSource},
    registry::SharedRegistry,
    security::AbuseTracker,
};

#[tokio::main]
async fn main() -> Result<(), aya_core::Error> {
    aya_core::logging::init("aya")?;

    let cfg = Arc::new(Config::load()?);

    let source: Arc<dyn PluginSource> = if cfg.plugins_dir.is_dir() {
        Arc::new(DirPluginSource::new(&cfg.plugins_dir, aya_plugins::catalog()))
    } else {
        warn!(
            "plugins directory {} not found, using built-in commands",
            cfg.plugins_dir.display()
        );
        Arc::new(StaticPluginSource::new(aya_plugins::builtin_specs()))
    };
    let (registry, report) = SharedRegistry::load(source)?;
    info!(
        commands = report.loaded,
        skipped = report.failures.len(),
        "plugins loaded"
    );

    let console = Arc::new(ConsoleMessenger::stdout());
    let messenger: Arc<dyn MessagingPort> = console.clone();
    let abuse = Arc::new(AbuseTracker::new(cfg.antispam_duration));
    let dispatcher = Arc::new(Dispatcher::new(
        cfg.clone(),
        Arc::new(registry),
        abuse.clone(),
        messenger.clone(),
    ));
    let state = AppState {
        cfg,
        messenger,
        dispatcher,
        abuse,
    };

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("received SIGINT, shutting down");
            on_signal.cancel();
        }
    });

    router::run(state, console, BufReader::new(tokio::io::stdin()), cancel)
        .await
        .map_err(|e| aya_core::Error::External(format!("console bot failed: {e}")))?;

    Ok(())
}
