//! Core configuration.
//!
//! # Responsibility
//! - Describe which storage backend to open and how commits behave.
//! - Deserialize from any serde format supplied by the host process.
//!
//! # Invariants
//! - The backend choice fixes the id numbering scheme for the whole run.
//! - `CoreConfig::open` starts logging before the storage is opened, so the
//!   bootstrap events land in the configured log.

use crate::db::{DbError, Storage};
use crate::logging::{init_logging, LoggingConfig, LoggingError};
use crate::unit_of_work::CommitPolicy;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;

/// Storage backend selection.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BackendConfig {
    /// SQLite database file, created and migrated on open.
    SqliteFile { path: PathBuf },
    /// Private in-memory SQLite database.
    #[default]
    SqliteMemory,
    /// Table store without database; ids are max-plus-one.
    Memory,
}

/// Top-level configuration for the persistence core.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CoreConfig {
    pub backend: BackendConfig,
    pub commit_policy: CommitPolicy,
    /// Rolling file logs; `None` leaves logging to the host process.
    pub logging: Option<LoggingConfig>,
}

impl CoreConfig {
    /// Starts configured logging, then opens the configured backend.
    pub fn open(&self) -> Result<Storage, ConfigError> {
        if let Some(logging) = &self.logging {
            init_logging(logging)?;
        }
        Ok(Storage::open(&self.backend)?)
    }
}

/// Startup failure while applying a `CoreConfig`.
#[derive(Debug)]
pub enum ConfigError {
    Logging(LoggingError),
    Storage(DbError),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Logging(err) => write!(f, "logging setup failed: {err}"),
            Self::Storage(err) => write!(f, "storage open failed: {err}"),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Logging(err) => Some(err),
            Self::Storage(err) => Some(err),
        }
    }
}

impl From<LoggingError> for ConfigError {
    fn from(value: LoggingError) -> Self {
        Self::Logging(value)
    }
}

impl From<DbError> for ConfigError {
    fn from(value: DbError) -> Self {
        Self::Storage(value)
    }
}
