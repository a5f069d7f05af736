use std::{
    collections::HashMap,
    env, fs,
    path::{Path, PathBuf},
    time::Duration,
};

use crate::{domain::SenderId, errors::Error, Result};

/// Typed, immutable configuration read once at startup.
#[derive(Clone, Debug)]
pub struct Config {
    // Bot
    pub bot_name: String,
    pub prefix: String,
    pub session_name: String,

    // Owner
    pub owner_name: String,
    pub owner_number: String,

    // Abuse control
    pub antispam: bool,
    pub antispam_duration: Duration,
    /// Reserved; no gate consumes it yet.
    pub max_warnings: u32,

    // Plugins / dispatch
    pub plugins_dir: PathBuf,
    pub handler_timeout: Option<Duration>,

    // Audit
    pub audit_log_path: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bot_name: "AyaTech".to_string(),
            prefix: ".".to_string(),
            session_name: "ayatech_session".to_string(),
            owner_name: String::new(),
            owner_number: String::new(),
            antispam: false,
            antispam_duration: Duration::from_millis(5000),
            max_warnings: 3,
            plugins_dir: PathBuf::from("plugins"),
            handler_timeout: None,
            audit_log_path: None,
        }
    }
}

impl Config {
    /// Load from `.env` (if present) and the process environment.
    pub fn load() -> Result<Self> {
        load_dotenv_if_present(Path::new(".env"));
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build a config from an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let env_str = |key: &str| lookup(key).and_then(non_empty);
        let env_bool = |key: &str| env_str(key).map(|s| parse_bool(&s));
        let env_u64 = |key: &str| env_str(key).and_then(|s| s.trim().parse::<u64>().ok());

        let defaults = Self::default();

        let prefix = env_str("PREFIX")
            .map(|s| s.trim().to_string())
            .unwrap_or(defaults.prefix);
        if prefix.chars().any(char::is_whitespace) {
            return Err(Error::Config(format!(
                "PREFIX must not contain whitespace: {prefix:?}"
            )));
        }

        // Owner number is compared without the international `+`.
        let owner_number = env_str("OWNER_NUMBER")
            .map(|s| s.trim().trim_start_matches('+').to_string())
            .unwrap_or_default();

        let antispam_duration = env_u64("ANTISPAM_DURATION")
            .filter(|ms| *ms > 0)
            .map(Duration::from_millis)
            .unwrap_or(defaults.antispam_duration);

        let max_warnings = env_u64("MAX_WARNINGS")
            .and_then(|v| u32::try_from(v).ok())
            .filter(|v| *v > 0)
            .unwrap_or(defaults.max_warnings);

        let handler_timeout = env_u64("HANDLER_TIMEOUT_MS")
            .filter(|ms| *ms > 0)
            .map(Duration::from_millis);

        Ok(Self {
            bot_name: env_str("BOT_NAME").unwrap_or(defaults.bot_name),
            prefix,
            session_name: env_str("SESSION_NAME").unwrap_or(defaults.session_name),
            owner_name: env_str("OWNER_NAME").unwrap_or(defaults.owner_name),
            owner_number,
            antispam: env_bool("ANTISPAM").unwrap_or(defaults.antispam),
            antispam_duration,
            max_warnings,
            plugins_dir: env_str("PLUGINS_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.plugins_dir),
            handler_timeout,
            audit_log_path: env_str("AUDIT_LOG_PATH").map(PathBuf::from),
        })
    }

    /// Convenience for tests and fixtures.
    pub fn from_map(map: &HashMap<&str, &str>) -> Result<Self> {
        Self::from_lookup(|k| map.get(k).map(|v| v.to_string()))
    }

    /// The owner's chat id, if an owner number is configured.
    pub fn owner_id(&self) -> Option<SenderId> {
        if self.owner_number.is_empty() {
            return None;
        }
        Some(SenderId::from_number(&self.owner_number))
    }
}

fn load_dotenv_if_present(path: &Path) {
    let Ok(contents) = fs::read_to_string(path) else {
        return;
    };

    for raw in contents.lines() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let Some((k, v)) = line.split_once('=') else {
            continue;
        };

        let key = k.trim();
        if key.is_empty() {
            continue;
        }
        if env::var_os(key).is_some() {
            continue; // do not override existing env
        }

        let mut val = v.trim().to_string();
        // Strip optional surrounding quotes.
        if val.len() >= 2
            && ((val.starts_with('"') && val.ends_with('"'))
                || (val.starts_with('\'') && val.ends_with('\'')))
        {
            val = val[1..val.len() - 1].to_string();
        }

        env::set_var(key, val);
    }
}

fn parse_bool(s: &str) -> bool {
    matches!(
        s.trim().to_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

fn non_empty(s: String) -> Option<String> {
    if s.trim().is_empty() {
        None
    } else {
        Some(s)
    }
}
