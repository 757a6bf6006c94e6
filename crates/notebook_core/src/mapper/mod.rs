//! Entity mappers: translation between stored rows and domain objects.
//!
//! # Responsibility
//! - Define one mapper contract per persisted entity kind.
//! - Own all SQL text; callers never see rows or statements.
//! - Rebuild nested object graphs from joined rows through one explicit
//!   grouping step shared by every backend.
//!
//! # Invariants
//! - Every read returns fresh domain objects; nothing is cached across reads.
//! - Writes called outside a storage transaction commit on their own.
//!   Inside one, they join it and the caller decides commit or rollback.
//! - `find_by_id` misses are `RecordNotFound`, never an empty placeholder.

use crate::db::DbError;
use crate::identity::EntityId;
use crate::model::EntityKind;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod category_mapper;
pub mod memory;
pub mod note_mapper;
pub mod reader_mapper;
pub(crate) mod rows;
mod sql;

pub use category_mapper::{CategoryMapper, SqliteCategoryMapper};
pub use memory::{MemoryCategoryMapper, MemoryNoteMapper, MemoryReaderMapper};
pub use note_mapper::{NoteMapper, SqliteNoteMapper};
pub use reader_mapper::{ReaderMapper, SqliteReaderMapper};

pub type MapperResult<T> = Result<T, MapperError>;

/// Mapper-level failure.
#[derive(Debug)]
pub enum MapperError {
    /// Lookup by id matched nothing. Expected outcome, callers branch on it.
    RecordNotFound { kind: EntityKind, id: EntityId },
    /// Insert (row plus link rows) failed to commit.
    CommitFailed { kind: EntityKind, source: DbError },
    UpdateFailed {
        kind: EntityKind,
        id: EntityId,
        source: DbError,
    },
    DeleteFailed {
        kind: EntityKind,
        id: EntityId,
        source: DbError,
    },
    /// The object, or an object it references, has no identity yet.
    NotPersisted(EntityKind),
    /// A mapper was handed an object of another kind.
    KindMismatch {
        mapper: EntityKind,
        entity: EntityKind,
    },
    /// Read query failed.
    Query { kind: EntityKind, source: DbError },
    /// Moving a category under `parent_id` would close a parent loop.
    ParentCycle { id: EntityId, parent_id: EntityId },
    /// Stored rows cannot form a valid object graph.
    InvalidData(String),
}

impl MapperError {
    pub(crate) fn commit_failed(kind: EntityKind, source: impl Into<DbError>) -> Self {
        Self::CommitFailed {
            kind,
            source: source.into(),
        }
    }

    pub(crate) fn update_failed(kind: EntityKind, id: EntityId, source: impl Into<DbError>) -> Self {
        Self::UpdateFailed {
            kind,
            id,
            source: source.into(),
        }
    }

    pub(crate) fn delete_failed(kind: EntityKind, id: EntityId, source: impl Into<DbError>) -> Self {
        Self::DeleteFailed {
            kind,
            id,
            source: source.into(),
        }
    }

    pub(crate) fn query(kind: EntityKind, source: impl Into<DbError>) -> Self {
        Self::Query {
            kind,
            source: source.into(),
        }
    }

    /// Whether this is a lookup miss rather than a storage failure.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::RecordNotFound { .. })
    }
}

impl Display for MapperError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::RecordNotFound { kind, id } => write!(f, "{kind} not found: {id}"),
            Self::CommitFailed { kind, source } => {
                write!(f, "failed to commit {kind} insert: {source}")
            }
            Self::UpdateFailed { kind, id, source } => {
                write!(f, "failed to update {kind} {id}: {source}")
            }
            Self::DeleteFailed { kind, id, source } => {
                write!(f, "failed to delete {kind} {id}: {source}")
            }
            Self::NotPersisted(kind) => write!(f, "{kind} has no storage identity yet"),
            Self::KindMismatch { mapper, entity } => {
                write!(f, "{mapper} mapper cannot handle {entity} objects")
            }
            Self::Query { kind, source } => write!(f, "failed to read {kind} rows: {source}"),
            Self::ParentCycle { id, parent_id } => write!(
                f,
                "category {id} cannot be placed under {parent_id}: parent chain would loop"
            ),
            Self::InvalidData(message) => write!(f, "invalid stored data: {message}"),
        }
    }
}

impl Error for MapperError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::CommitFailed { source, .. }
            | Self::UpdateFailed { source, .. }
            | Self::DeleteFailed { source, .. }
            | Self::Query { source, .. } => Some(source),
            Self::RecordNotFound { .. }
            | Self::NotPersisted(_)
            | Self::KindMismatch { .. }
            | Self::ParentCycle { .. }
            | Self::InvalidData(_) => None,
        }
    }
}
