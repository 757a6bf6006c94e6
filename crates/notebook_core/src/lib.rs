//! Persistence core for the notebook application.
//! Data mappers, a mapper registry and an explicit unit of work over SQLite
//! or an in-memory table store.

pub mod config;
pub mod db;
pub mod identity;
pub mod logging;
pub mod mapper;
pub mod model;
pub mod registry;
pub mod service;
pub mod unit_of_work;

pub use config::{BackendConfig, ConfigError, CoreConfig};
pub use db::{open_db, open_db_in_memory, DbError, DbResult, MemoryStore, Storage, StorageTransaction};
pub use identity::{next_id_after, EntityId, IdAllocation, ObjectState};
pub use logging::{init_logging, init_logging_with, logging_status, LogLevel, LoggingConfig, LoggingError};
pub use mapper::{
    CategoryMapper, MapperError, MapperResult, MemoryCategoryMapper, MemoryNoteMapper,
    MemoryReaderMapper, NoteMapper, ReaderMapper, SqliteCategoryMapper, SqliteNoteMapper,
    SqliteReaderMapper,
};
pub use model::{
    create_user, find_note, push_unique, Category, CategoryRef, Editor, Entity, EntityKind, Note,
    Reader, ReaderRef, User, UserKind,
};
pub use registry::{Mapper, MapperRegistry, RegistryError, RegistryResult};
pub use service::{NotebookService, NotebookServiceError, NotebookServiceResult, COPY_PREFIX};
pub use unit_of_work::{
    AppliedOperation, CommitFailure, CommitPolicy, CommitReport, PendingKey, UnitOfWork,
    UnitOfWorkError, UnitOfWorkResult,
};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::core_version;

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
