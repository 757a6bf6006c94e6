//! Storage backend handle and transaction guard.
//!
//! # Responsibility
//! - Wrap the single storage connection shared by all mappers.
//! - Decide the id numbering scheme from the backend kind.
//! - Provide begin/commit/rollback spanning several mapper calls.
//!
//! # Invariants
//! - A dropped, unfinished `StorageTransaction` rolls back.
//! - Transactions never nest on one backend.

use crate::config::BackendConfig;
use crate::db::memory::MemoryStore;
use crate::db::{open_db, open_db_in_memory, DbError, DbResult};
use crate::identity::IdAllocation;
use log::{debug, warn};
use rusqlite::{Connection, Transaction, TransactionBehavior};

/// The one storage backend of a process.
#[derive(Debug)]
pub enum Storage {
    /// Migrated SQLite connection. Ids come from the rowid.
    Sqlite(Connection),
    /// Table store without database. Ids are max-plus-one.
    Memory(MemoryStore),
}

impl Storage {
    /// Opens the backend described by `config`.
    pub fn open(config: &BackendConfig) -> DbResult<Self> {
        match config {
            BackendConfig::SqliteFile { path } => Ok(Self::Sqlite(open_db(path)?)),
            BackendConfig::SqliteMemory => Ok(Self::Sqlite(open_db_in_memory()?)),
            BackendConfig::Memory => Ok(Self::memory()),
        }
    }

    /// Wraps an already migrated connection.
    pub fn sqlite(conn: Connection) -> Self {
        Self::Sqlite(conn)
    }

    pub fn memory() -> Self {
        Self::Memory(MemoryStore::new())
    }

    pub fn id_allocation(&self) -> IdAllocation {
        match self {
            Self::Sqlite(_) => IdAllocation::StorageAssigned,
            Self::Memory(_) => IdAllocation::MaxPlusOne,
        }
    }

    pub fn backend_name(&self) -> &'static str {
        match self {
            Self::Sqlite(_) => "sqlite",
            Self::Memory(_) => "memory",
        }
    }

    /// Raw connection for SQLite backends.
    pub fn connection(&self) -> Option<&Connection> {
        match self {
            Self::Sqlite(conn) => Some(conn),
            Self::Memory(_) => None,
        }
    }

    /// Whether a storage transaction is currently open.
    pub fn in_transaction(&self) -> bool {
        match self {
            Self::Sqlite(conn) => !conn.is_autocommit(),
            Self::Memory(store) => store.in_transaction(),
        }
    }

    /// Opens a transaction spanning every mapper call until commit.
    pub fn begin(&self) -> DbResult<StorageTransaction<'_>> {
        if self.in_transaction() {
            return Err(DbError::NestedTransaction);
        }

        let inner = match self {
            Self::Sqlite(conn) => TxInner::Sqlite(Some(Transaction::new_unchecked(
                conn,
                TransactionBehavior::Immediate,
            )?)),
            Self::Memory(store) => {
                store.begin()?;
                TxInner::Memory(store)
            }
        };
        debug!(
            "event=storage_tx module=db status=begin backend={}",
            self.backend_name()
        );
        Ok(StorageTransaction {
            inner,
            finished: false,
        })
    }
}

enum TxInner<'s> {
    Sqlite(Option<Transaction<'s>>),
    Memory(&'s MemoryStore),
}

/// Open storage transaction. Rolls back on drop unless committed.
pub struct StorageTransaction<'s> {
    inner: TxInner<'s>,
    finished: bool,
}

impl StorageTransaction<'_> {
    pub fn commit(mut self) -> DbResult<()> {
        self.finished = true;
        match &mut self.inner {
            TxInner::Sqlite(tx) => {
                if let Some(tx) = tx.take() {
                    tx.commit()?;
                }
            }
            TxInner::Memory(store) => store.commit(),
        }
        debug!("event=storage_tx module=db status=commit");
        Ok(())
    }

    pub fn rollback(mut self) -> DbResult<()> {
        self.finished = true;
        self.rollback_inner()?;
        debug!("event=storage_tx module=db status=rollback");
        Ok(())
    }

    fn rollback_inner(&mut self) -> DbResult<()> {
        match &mut self.inner {
            TxInner::Sqlite(tx) => {
                if let Some(tx) = tx.take() {
                    tx.rollback()?;
                }
            }
            TxInner::Memory(store) => store.rollback(),
        }
        Ok(())
    }
}

impl Drop for StorageTransaction<'_> {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        if let Err(err) = self.rollback_inner() {
            warn!("event=storage_tx module=db status=error action=implicit_rollback error={err}");
        } else {
            debug!("event=storage_tx module=db status=rollback implicit=true");
        }
    }
}
