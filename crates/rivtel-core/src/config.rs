//! Layered runtime configuration.
//!
//! Sources merge in precedence order: defaults < `config.yaml` under the
//! user's config directory < `RIVTEL_*` environment variables. CLI flags
//! are applied separately by the caller and take highest precedence.

use std::path::PathBuf;
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    providers::{Env, Format, Serialized, Yaml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::error::CoreError;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(30);

/// Runtime options shared by every command.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Account email (`RIVTEL_EMAIL`).
    pub email: Option<String>,

    /// Account password (`RIVTEL_PASSWORD`). Discouraged; interactive
    /// prompting is preferred.
    pub password: Option<String>,

    /// Snapshot database path (`RIVTEL_DB_PATH`).
    pub db_path: Option<PathBuf>,

    /// Credentials cache path (`RIVTEL_TOKEN_CACHE`).
    pub token_cache: Option<PathBuf>,

    /// Disable the snapshot store entirely (`RIVTEL_DISABLE_STORE`).
    pub disable_store: bool,

    /// Vehicle index, 0-based (`RIVTEL_VEHICLE`).
    pub vehicle: usize,

    /// Polling interval as a duration string, e.g. `30s`, `5m`
    /// (`RIVTEL_POLL_INTERVAL`).
    pub poll_interval: Option<String>,

    /// Suppress non-error output (`RIVTEL_QUIET`).
    pub quiet: bool,

    /// Verbose logging (`RIVTEL_VERBOSE`).
    pub verbose: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            email: None,
            password: None,
            db_path: None,
            token_cache: None,
            disable_store: false,
            vehicle: 0,
            poll_interval: None,
            quiet: false,
            verbose: false,
        }
    }
}

impl Config {
    /// Load config from file + environment over defaults.
    pub fn load() -> Result<Self, CoreError> {
        let figment = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(config_file_path()))
            .merge(Env::prefixed("RIVTEL_"));

        figment.extract().map_err(|e| CoreError::Config {
            message: e.to_string(),
        })
    }

    /// Load config, falling back to defaults on error.
    pub fn load_or_default() -> Self {
        Self::load().unwrap_or_default()
    }

    /// Effective polling interval; `None` when nothing was configured
    /// (the coordinator then prefers the subscription transport).
    pub fn poll_interval(&self) -> Option<Duration> {
        self.poll_interval.as_deref().and_then(parse_duration)
    }

    /// Snapshot database path, defaulting under the user data dir.
    pub fn db_path(&self) -> PathBuf {
        self.db_path.clone().unwrap_or_else(default_db_path)
    }

    /// Credentials cache path, defaulting under the user config dir.
    pub fn token_cache_path(&self) -> PathBuf {
        self.token_cache
            .clone()
            .unwrap_or_else(default_token_cache_path)
    }
}

/// Path of the YAML config file.
pub fn config_file_path() -> PathBuf {
    project_dirs()
        .map(|dirs| dirs.config_dir().join("config.yaml"))
        .unwrap_or_else(|| PathBuf::from("config.yaml"))
}

fn default_db_path() -> PathBuf {
    project_dirs()
        .map(|dirs| dirs.data_dir().join("state.db"))
        .unwrap_or_else(|| PathBuf::from("state.db"))
}

fn default_token_cache_path() -> PathBuf {
    project_dirs()
        .map(|dirs| dirs.config_dir().join("credentials.json"))
        .unwrap_or_else(|| PathBuf::from("credentials.json"))
}

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("com", "rivtel", "rivtel")
}

/// Parse a duration string: bare seconds (`30`) or a value with an
/// `s`/`m`/`h` suffix (`30s`, `5m`, `1h`).
pub fn parse_duration(raw: &str) -> Option<Duration> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    if let Ok(secs) = raw.parse::<u64>() {
        return Some(Duration::from_secs(secs));
    }

    if !raw.is_char_boundary(raw.len() - 1) {
        return None;
    }
    let (number, unit) = raw.split_at(raw.len() - 1);
    let value: f64 = number.trim().parse().ok()?;
    if value < 0.0 {
        return None;
    }

    let seconds = match unit {
        "s" => value,
        "m" => value * 60.0,
        "h" => value * 3600.0,
        "d" => value * 86400.0,
        _ => return None,
    };
    Some(Duration::from_secs_f64(seconds))
}
