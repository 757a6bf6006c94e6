//! Storage bootstrap, schema migrations and backend selection.
//!
//! # Responsibility
//! - Open and configure SQLite connections for the notebook core.
//! - Apply schema migrations in deterministic order.
//! - Expose the single storage backend (SQLite or in-memory) used by mappers.
//!
//! # Invariants
//! - Migration version is tracked via `PRAGMA user_version`.
//! - Core code must not read/write application data before migrations succeed.
//! - One process-level `Storage` value holds exactly one backend.

use crate::identity::EntityId;
use crate::model::EntityKind;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod memory;
pub mod migrations;
mod open;
mod storage;

pub use memory::MemoryStore;
pub use open::{open_db, open_db_in_memory};
pub use storage::{Storage, StorageTransaction};

pub type DbResult<T> = Result<T, DbError>;

#[derive(Debug)]
pub enum DbError {
    Sqlite(rusqlite::Error),
    UnsupportedSchemaVersion {
        db_version: u32,
        latest_supported: u32,
    },
    /// In-memory write referenced a row that does not exist.
    MissingReference {
        kind: EntityKind,
        id: EntityId,
    },
    /// A storage transaction is already open on this backend.
    NestedTransaction,
}

impl Display for DbError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sqlite(err) => write!(f, "{err}"),
            Self::UnsupportedSchemaVersion {
                db_version,
                latest_supported,
            } => write!(
                f,
                "database schema version {db_version} is newer than supported {latest_supported}"
            ),
            Self::MissingReference { kind, id } => {
                write!(f, "referenced {kind} row does not exist: {id}")
            }
            Self::NestedTransaction => write!(f, "a storage transaction is already active"),
        }
    }
}

impl Error for DbError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Sqlite(err) => Some(err),
            Self::UnsupportedSchemaVersion { .. } => None,
            Self::MissingReference { .. } => None,
            Self::NestedTransaction => None,
        }
    }
}

impl From<rusqlite::Error> for DbError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Sqlite(value)
    }
}
