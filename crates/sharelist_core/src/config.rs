//! Runtime configuration for hosts embedding the core.
//!
//! # Responsibility
//! - Describe logging and storage settings in one serde-friendly struct.
//! - Resolve settings from JSON or from `SHARELIST_*` environment variables.
//!
//! # Invariants
//! - Missing fields fall back to defaults; unknown JSON fields are rejected.
//! - No field is validated here; `logging::init_logging` and the store
//!   constructors report their own errors.

use crate::logging::default_log_level;
use serde::Deserialize;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;

pub const ENV_LOG_LEVEL: &str = "SHARELIST_LOG_LEVEL";
pub const ENV_LOG_DIR: &str = "SHARELIST_LOG_DIR";
pub const ENV_DB_PATH: &str = "SHARELIST_DB_PATH";

/// Configuration parse failure.
#[derive(Debug)]
pub enum ConfigError {
    Json(serde_json::Error),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Json(err) => write!(f, "invalid core config: {err}"),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Json(err) => Some(err),
        }
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(value: serde_json::Error) -> Self {
        Self::Json(value)
    }
}

/// Host-supplied core settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CoreConfig {
    #[serde(default = "default_level_string")]
    pub log_level: String,
    /// File logging is off when unset.
    #[serde(default)]
    pub log_dir: Option<PathBuf>,
    /// In-memory database when unset.
    #[serde(default)]
    pub db_path: Option<PathBuf>,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            log_level: default_level_string(),
            log_dir: None,
            db_path: None,
        }
    }
}

impl CoreConfig {
    pub fn from_json_str(raw: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(raw)?)
    }

    /// Reads `SHARELIST_LOG_LEVEL`, `SHARELIST_LOG_DIR` and
    /// `SHARELIST_DB_PATH`. Blank values count as unset.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let read = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        Self {
            log_level: read(ENV_LOG_LEVEL).unwrap_or_else(default_level_string),
            log_dir: read(ENV_LOG_DIR).map(PathBuf::from),
            db_path: read(ENV_DB_PATH).map(PathBuf::from),
        }
    }
}

fn default_level_string() -> String {
    default_log_level().to_string()
}
