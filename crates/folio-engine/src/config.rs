//! # Engine Configuration
//!
//! Where the database lives and how chatty the logs are.
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                           │
//! │     FOLIO_DB_PATH=/srv/folio/folio.db                                  │
//! │     FOLIO_DB_MAX_CONNECTIONS=8                                         │
//! │     FOLIO_LOG=debug                                                    │
//! │                                                                         │
//! │  2. TOML Config File                                                   │
//! │     ~/.config/folio-pos/folio.toml (Linux)                             │
//! │     ~/Library/Application Support/com.folio.pos/folio.toml (macOS)     │
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                   │
//! │     <platform data dir>/folio.db, 5 connections, 30s acquire timeout   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! [database]
//! path = "/var/lib/folio/folio.db"
//! max_connections = 5
//! acquire_timeout_secs = 30
//!
//! [logging]
//! filter = "info,folio=debug,sqlx=warn"
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use folio_db::DbConfig;

use crate::telemetry::DEFAULT_LOG_FILTER;

// =============================================================================
// Errors
// =============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

// =============================================================================
// Database Settings
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseSettings {
    /// SQLite file. Default: platform data directory / folio.db
    #[serde(default = "default_database_path")]
    pub path: PathBuf,

    /// Default: 5
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// Seconds to wait for a pooled connection. Default: 30
    #[serde(default = "default_acquire_timeout")]
    pub acquire_timeout_secs: u64,
}

fn default_database_path() -> PathBuf {
    directories::ProjectDirs::from("com", "folio", "pos")
        .map(|dirs| dirs.data_dir().join("folio.db"))
        .unwrap_or_else(|| PathBuf::from("folio.db"))
}

fn default_max_connections() -> u32 {
    5
}

fn default_acquire_timeout() -> u64 {
    30
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        DatabaseSettings {
            path: default_database_path(),
            max_connections: default_max_connections(),
            acquire_timeout_secs: default_acquire_timeout(),
        }
    }
}

// =============================================================================
// Logging Settings
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingSettings {
    /// `EnvFilter` directive string. `RUST_LOG` still wins at runtime.
    #[serde(default = "default_log_filter")]
    pub filter: String,
}

fn default_log_filter() -> String {
    DEFAULT_LOG_FILTER.to_string()
}

impl Default for LoggingSettings {
    fn default() -> Self {
        LoggingSettings {
            filter: default_log_filter(),
        }
    }
}

// =============================================================================
// Engine Configuration
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub database: DatabaseSettings,

    #[serde(default)]
    pub logging: LoggingSettings,
}

impl EngineConfig {
    /// Loads configuration from file and environment.
    ///
    /// ## Load Order (later overrides earlier)
    /// 1. Default values
    /// 2. Config file (`path`, or the platform default when `None`)
    /// 3. Environment variables
    pub fn load(path: Option<&Path>) -> ConfigResult<Self> {
        let path = path.map(Path::to_path_buf).or_else(Self::default_config_path);

        let mut config = match path {
            Some(path) if path.exists() => {
                info!(?path, "Loading engine config from file");
                let contents = std::fs::read_to_string(&path)?;
                Self::from_toml(&contents)?
            }
            Some(path) => {
                debug!(?path, "Config file not found, using defaults");
                Self::default()
            }
            None => Self::default(),
        };

        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    /// Loads config or returns defaults if loading fails.
    pub fn load_or_default(path: Option<&Path>) -> Self {
        Self::load(path).unwrap_or_else(|e| {
            warn!("Failed to load engine config: {}. Using defaults.", e);
            Self::default()
        })
    }

    /// Parses a TOML document. Missing sections fall back to defaults.
    pub fn from_toml(contents: &str) -> ConfigResult<Self> {
        Ok(toml::from_str(contents)?)
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.database.path.as_os_str().is_empty() {
            return Err(ConfigError::Invalid("database.path must not be empty".into()));
        }
        if self.database.max_connections == 0 {
            return Err(ConfigError::Invalid(
                "database.max_connections must be at least 1".into(),
            ));
        }
        if self.database.acquire_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "database.acquire_timeout_secs must be at least 1".into(),
            ));
        }
        Ok(())
    }

    /// Applies `FOLIO_*` environment variable overrides.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(path) = var("FOLIO_DB_PATH") {
            debug!(path = %path, "Overriding database path from environment");
            self.database.path = PathBuf::from(path);
        }

        if let Some(max) = var("FOLIO_DB_MAX_CONNECTIONS") {
            match max.parse::<u32>() {
                Ok(n) => self.database.max_connections = n,
                Err(_) => warn!(value = %max, "Ignoring invalid FOLIO_DB_MAX_CONNECTIONS"),
            }
        }

        if let Some(filter) = var("FOLIO_LOG") {
            self.logging.filter = filter;
        }
    }

    /// Pool settings for [`folio_db::Database::new`].
    pub fn db_config(&self) -> DbConfig {
        DbConfig::new(&self.database.path)
            .max_connections(self.database.max_connections)
            .connect_timeout(Duration::from_secs(self.database.acquire_timeout_secs))
    }

    fn default_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("com", "folio", "pos").map(|dirs| dirs.config_dir().join("folio.toml"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.database.max_connections, 5);
        assert_eq!(config.database.acquire_timeout_secs, 30);
        assert_eq!(config.logging.filter, DEFAULT_LOG_FILTER);
        assert!(config.database.path.ends_with("folio.db"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_partial_file() {
        let config = EngineConfig::from_toml(
            r#"
            [database]
            path = "/tmp/folio-test.db"
            max_connections = 2
            "#,
        )
        .unwrap();

        assert_eq!(config.database.path, PathBuf::from("/tmp/folio-test.db"));
        assert_eq!(config.database.max_connections, 2);
        assert_eq!(config.database.acquire_timeout_secs, 30);
        assert_eq!(config.logging.filter, DEFAULT_LOG_FILTER);
    }

    #[test]
    fn test_parse_error() {
        let err = EngineConfig::from_toml("[database]\nmax_connections = \"many\"").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_validation() {
        let mut config = EngineConfig::default();
        config.database.max_connections = 0;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        config.database.max_connections = 1;
        config.database.acquire_timeout_secs = 0;
        assert!(config.validate().is_err());

        config.database.acquire_timeout_secs = 1;
        config.database.path = PathBuf::new();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_env_overrides() {
        let vars: HashMap<&str, &str> = [
            ("FOLIO_DB_PATH", "/srv/folio/pos.db"),
            ("FOLIO_DB_MAX_CONNECTIONS", "8"),
            ("FOLIO_LOG", "debug"),
        ]
        .into_iter()
        .collect();

        let mut config = EngineConfig::default();
        config.apply_overrides(|key| vars.get(key).map(|v| v.to_string()));

        assert_eq!(config.database.path, PathBuf::from("/srv/folio/pos.db"));
        assert_eq!(config.database.max_connections, 8);
        assert_eq!(config.logging.filter, "debug");
    }

    #[test]
    fn test_invalid_env_number_is_ignored() {
        let mut config = EngineConfig::default();
        config.apply_overrides(|key| (key == "FOLIO_DB_MAX_CONNECTIONS").then(|| "lots".to_string()));
        assert_eq!(config.database.max_connections, 5);
    }

    #[test]
    fn test_load_from_file() {
        let path = std::env::temp_dir().join(format!("folio-engine-config-{}.toml", std::process::id()));
        std::fs::write(&path, "[database]\nacquire_timeout_secs = 12\n").unwrap();

        let config = EngineConfig::load(Some(&path)).unwrap();
        assert_eq!(config.database.acquire_timeout_secs, 12);

        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_db_config() {
        let mut config = EngineConfig::default();
        config.database.path = PathBuf::from("/tmp/x.db");
        config.database.max_connections = 3;
        config.database.acquire_timeout_secs = 7;

        let db = config.db_config();
        assert_eq!(db.database_path, PathBuf::from("/tmp/x.db"));
        assert_eq!(db.max_connections, 3);
        assert_eq!(db.connect_timeout, Duration::from_secs(7));
    }

    #[test]
    fn test_toml_round_trip_sections() {
        let toml_str = toml::to_string_pretty(&EngineConfig::default()).unwrap();
        assert!(toml_str.contains("[database]"));
        assert!(toml_str.contains("[logging]"));
    }
}
