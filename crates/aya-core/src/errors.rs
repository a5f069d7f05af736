use std::path::PathBuf;

/// Core error type.
///
/// Adapter crates map their own failures into `External` so the router can log
/// them uniformly. Handler failures are not represented here: handlers return
/// `anyhow::Result` and the dispatcher contains them.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("config error: {0}")]
    Config(String),

    #[error("invalid command: {0}")]
    InvalidCommand(String),

    #[error("duplicate command name: {name}")]
    DuplicateCommand { name: String },

    #[error("failed to load plugin {path}: {reason}")]
    PluginLoad { path: PathBuf, reason: String },

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("external error: {0}")]
    External(String),
}

pub type Result<T> = std::result::Result<T, Error>;
