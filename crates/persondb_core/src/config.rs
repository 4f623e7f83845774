//! Process configuration read from the environment.
//!
//! # Responsibility
//! - Resolve the store connection string and logging settings once at startup.
//!
//! # Invariants
//! - `PERSONDB_URI` is required; everything else has a default.
//! - Log level values are normalized the same way `init_logging` expects.

use crate::logging::{default_log_level, normalize_level};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;

pub const STORE_URI_VAR: &str = "PERSONDB_URI";
pub const LOG_LEVEL_VAR: &str = "PERSONDB_LOG_LEVEL";
pub const LOG_DIR_VAR: &str = "PERSONDB_LOG_DIR";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    MissingVar(&'static str),
    Invalid { var: &'static str, message: String },
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingVar(var) => write!(f, "environment variable `{var}` is not set"),
            Self::Invalid { var, message } => write!(f, "invalid `{var}`: {message}"),
        }
    }
}

impl Error for ConfigError {}

/// Startup settings for the store and logging.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub store_uri: String,
    pub log_level: &'static str,
    /// File logging is enabled only when set.
    pub log_dir: Option<PathBuf>,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from an arbitrary key lookup. Blank values count as
    /// unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let store_uri = read(STORE_URI_VAR).ok_or(ConfigError::MissingVar(STORE_URI_VAR))?;

        let log_level = match read(LOG_LEVEL_VAR) {
            Some(level) => normalize_level(&level).map_err(|message| ConfigError::Invalid {
                var: LOG_LEVEL_VAR,
                message,
            })?,
            None => default_log_level(),
        };

        Ok(Self {
            store_uri,
            log_level,
            log_dir: read(LOG_DIR_VAR).map(PathBuf::from),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::{AppConfig, ConfigError, LOG_DIR_VAR, LOG_LEVEL_VAR, STORE_URI_VAR};
    use crate::logging::default_log_level;
    use std::collections::HashMap;
    use std::path::PathBuf;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn missing_uri_is_reported() {
        let err = AppConfig::from_lookup(lookup(&[(STORE_URI_VAR, "  ")])).unwrap_err();
        assert_eq!(err, ConfigError::MissingVar(STORE_URI_VAR));
    }

    #[test]
    fn defaults_apply_when_optional_vars_are_absent() {
        let config = AppConfig::from_lookup(lookup(&[(STORE_URI_VAR, "memory")])).unwrap();
        assert_eq!(config.store_uri, "memory");
        assert_eq!(config.log_level, default_log_level());
        assert_eq!(config.log_dir, None);
    }

    #[test]
    fn log_settings_are_normalized() {
        let config = AppConfig::from_lookup(lookup(&[
            (STORE_URI_VAR, "sqlite:///tmp/people.db"),
            (LOG_LEVEL_VAR, " WARNING "),
            (LOG_DIR_VAR, "/tmp/persondb-logs"),
        ]))
        .unwrap();
        assert_eq!(config.log_level, "warn");
        assert_eq!(config.log_dir, Some(PathBuf::from("/tmp/persondb-logs")));
    }

    #[test]
    fn unknown_log_level_is_rejected() {
        let err = AppConfig::from_lookup(lookup(&[
            (STORE_URI_VAR, "memory"),
            (LOG_LEVEL_VAR, "loud"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { var, .. } if var == LOG_LEVEL_VAR));
    }
}
