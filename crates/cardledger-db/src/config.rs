//! Ledger configuration.
//!
//! Configuration is loaded from environment variables with fallback to defaults.
//!
//! | Variable | Default |
//! |----------|---------|
//! | `CARDLEDGER_DB_PATH` | `cardledger.db` |
//! | `CARDLEDGER_MAX_CONNECTIONS` | `5` |
//! | `CARDLEDGER_BUSY_TIMEOUT_SECS` | `5` |
//! | `CARDLEDGER_DEFAULT_PAGE_SIZE` | `25` |

use cardledger_core::{DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::pool::DbConfig;

/// Ledger configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerConfig {
    /// SQLite database file
    pub database_path: PathBuf,

    /// Pool size
    pub max_connections: u32,

    /// How long SQLite waits on a locked database before failing
    pub busy_timeout_secs: u64,

    /// Page size for listings that don't ask for one
    pub default_page_size: u32,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        LedgerConfig {
            database_path: PathBuf::from("cardledger.db"),
            max_connections: 5,
            busy_timeout_secs: 5,
            default_page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

impl LedgerConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = LedgerConfig::default();

        let config = LedgerConfig {
            database_path: lookup("CARDLEDGER_DB_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.database_path),

            max_connections: parse_or(
                &lookup,
                "CARDLEDGER_MAX_CONNECTIONS",
                defaults.max_connections,
            )?,

            busy_timeout_secs: parse_or(
                &lookup,
                "CARDLEDGER_BUSY_TIMEOUT_SECS",
                defaults.busy_timeout_secs,
            )?,

            default_page_size: parse_or(
                &lookup,
                "CARDLEDGER_DEFAULT_PAGE_SIZE",
                defaults.default_page_size,
            )?,
        };

        if config.max_connections == 0 {
            return Err(ConfigError::InvalidValue(
                "CARDLEDGER_MAX_CONNECTIONS".to_string(),
            ));
        }

        if config.default_page_size == 0 || config.default_page_size > MAX_PAGE_SIZE {
            return Err(ConfigError::InvalidValue(
                "CARDLEDGER_DEFAULT_PAGE_SIZE".to_string(),
            ));
        }

        Ok(config)
    }

    /// Pool configuration for this ledger.
    pub fn db_config(&self) -> DbConfig {
        DbConfig::new(self.database_path.clone())
            .max_connections(self.max_connections)
            .busy_timeout(Duration::from_secs(self.busy_timeout_secs))
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidValue(key.to_string())),
        None => Ok(default),
    }
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {0}")]
    InvalidValue(String),
}
