//! Store connection settings.
//!
//! Every tool in the crate (library callers and the maintenance CLI) builds one `StoreConfig`
//! at startup and hands it to `DoctorStore::open`; defaults live here and nowhere else.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_BCRYPT_COST, DEFAULT_CHECKPOINT_PERIOD, DEFAULT_CONNECT_TIMEOUT_MS,
    DEFAULT_DATABASE_NAME, JOURNAL_EXTENSION, LOCK_EXTENSION, MAX_BCRYPT_COST, MIN_BCRYPT_COST,
    SNAPSHOT_EXTENSION,
};
use crate::error::{HealthNexusError, Result};

pub const ENV_URI: &str = "HEALTHNEXUS_URI";
pub const ENV_DATABASE: &str = "HEALTHNEXUS_DB";
pub const ENV_CONNECT_TIMEOUT_MS: &str = "HEALTHNEXUS_CONNECT_TIMEOUT_MS";
pub const ENV_BCRYPT_COST: &str = "HEALTHNEXUS_BCRYPT_COST";

const FILE_SCHEME: &str = "file://";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Data directory, as a plain path or a `file://` URI.
    pub connection: String,
    pub database: String,
    /// Budget for acquiring the store lock; 0 tries exactly once.
    pub connect_timeout_ms: u64,
    pub bcrypt_cost: u32,
    pub checkpoint_period: u64,
}

impl StoreConfig {
    pub fn new(connection: impl Into<String>, database: impl Into<String>) -> Self {
        Self {
            connection: connection.into(),
            database: database.into(),
            connect_timeout_ms: DEFAULT_CONNECT_TIMEOUT_MS,
            bcrypt_cost: DEFAULT_BCRYPT_COST,
            checkpoint_period: DEFAULT_CHECKPOINT_PERIOD,
        }
    }

    /// Read the configuration from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let connection = read(ENV_URI).ok_or_else(|| HealthNexusError::Config {
            reason: format!("{ENV_URI} is not set"),
        })?;
        let database = read(ENV_DATABASE).unwrap_or_else(|| DEFAULT_DATABASE_NAME.to_string());

        let mut config = Self::new(connection, database);
        if let Some(raw) = read(ENV_CONNECT_TIMEOUT_MS) {
            config.connect_timeout_ms = parse_number(ENV_CONNECT_TIMEOUT_MS, &raw)?;
        }
        if let Some(raw) = read(ENV_BCRYPT_COST) {
            config.bcrypt_cost = parse_number(ENV_BCRYPT_COST, &raw)?;
        }
        config.validate()?;
        Ok(config)
    }

    #[must_use]
    pub fn with_connect_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.connect_timeout_ms = timeout_ms;
        self
    }

    #[must_use]
    pub fn with_bcrypt_cost(mut self, cost: u32) -> Self {
        self.bcrypt_cost = cost;
        self
    }

    #[must_use]
    pub fn with_checkpoint_period(mut self, period: u64) -> Self {
        self.checkpoint_period = period;
        self
    }

    pub fn validate(&self) -> Result<()> {
        let name = self.database.trim();
        if name.is_empty()
            || !name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        {
            return Err(HealthNexusError::Config {
                reason: format!(
                    "database name {:?} must be non-empty ASCII letters, digits, '-' or '_'",
                    self.database
                ),
            });
        }
        if !(MIN_BCRYPT_COST..=MAX_BCRYPT_COST).contains(&self.bcrypt_cost) {
            return Err(HealthNexusError::Config {
                reason: format!(
                    "bcrypt cost {} outside {}..={}",
                    self.bcrypt_cost,
                    MIN_BCRYPT_COST,
                    MAX_BCRYPT_COST
                ),
            });
        }
        if self.checkpoint_period == 0 {
            return Err(HealthNexusError::Config {
                reason: "checkpoint period must be at least 1".into(),
            });
        }
        self.data_dir().map(|_| ())
    }

    /// Resolve the connection string to the data directory.
    pub fn data_dir(&self) -> Result<PathBuf> {
        let raw = self.connection.trim();
        if let Some(path) = raw.strip_prefix(FILE_SCHEME) {
            if path.is_empty() {
                return Err(HealthNexusError::Config {
                    reason: "file:// URI has no path".into(),
                });
            }
            return Ok(PathBuf::from(path));
        }
        if let Some((scheme, _)) = raw.split_once("://") {
            return Err(HealthNexusError::Config {
                reason: format!("unsupported connection scheme `{scheme}://`"),
            });
        }
        if raw.is_empty() {
            return Err(HealthNexusError::Config {
                reason: "connection string is empty".into(),
            });
        }
        Ok(PathBuf::from(raw))
    }

    pub fn snapshot_path(&self) -> Result<PathBuf> {
        self.file_path(SNAPSHOT_EXTENSION)
    }

    pub fn journal_path(&self) -> Result<PathBuf> {
        self.file_path(JOURNAL_EXTENSION)
    }

    pub fn lock_path(&self) -> Result<PathBuf> {
        self.file_path(LOCK_EXTENSION)
    }

    fn file_path(&self, extension: &str) -> Result<PathBuf> {
        let dir = self.data_dir()?;
        Ok(Path::new(&dir).join(format!("{}.{extension}", self.database.trim())))
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, raw: &str) -> Result<T> {
    raw.trim().parse().map_err(|_| HealthNexusError::Config {
        reason: format!("{key} must be a number, got {raw:?}"),
    })
}
