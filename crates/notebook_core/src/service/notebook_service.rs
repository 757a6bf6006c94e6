//! Notebook use-case service.
//!
//! # Responsibility
//! - Provide the create/copy/delete/link flows callers run per request.
//! - Compose mapper reads with one fresh unit of work per write flow.
//!
//! # Invariants
//! - Every write flow owns its unit of work; nothing is shared between calls.
//! - Names are trimmed and must not be empty.
//! - `link_reader` clears previous links before writing new ones, inside one
//!   storage transaction.

use crate::config::CoreConfig;
use crate::db::{DbError, Storage};
use crate::identity::EntityId;
use crate::mapper::{CategoryMapper, MapperError, NoteMapper, ReaderMapper};
use crate::model::{create_user, find_note, Category, Entity, EntityKind, Note, Reader, UserKind};
use crate::registry::MapperRegistry;
use crate::unit_of_work::{CommitPolicy, UnitOfWork, UnitOfWorkError};
use log::{debug, info};
use std::collections::BTreeSet;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Name prefix given to copied notes.
pub const COPY_PREFIX: &str = "copy_";

pub type NotebookServiceResult<T> = Result<T, NotebookServiceError>;

/// Service error for notebook use-cases.
#[derive(Debug)]
pub enum NotebookServiceError {
    /// Name input is empty after trimming.
    InvalidName(&'static str),
    /// Referenced object does not exist.
    NotFound { kind: EntityKind, id: EntityId },
    Mapper(MapperError),
    UnitOfWork(UnitOfWorkError),
    Storage(DbError),
    /// A commit succeeded but did not report the expected object.
    InconsistentState(&'static str),
}

impl Display for NotebookServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidName(field) => write!(f, "{field} name cannot be empty"),
            Self::NotFound { kind, id } => write!(f, "{kind} not found: {id}"),
            Self::Mapper(err) => write!(f, "{err}"),
            Self::UnitOfWork(err) => write!(f, "{err}"),
            Self::Storage(err) => write!(f, "{err}"),
            Self::InconsistentState(details) => write!(f, "inconsistent notebook state: {details}"),
        }
    }
}

impl Error for NotebookServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Mapper(err) => Some(err),
            Self::UnitOfWork(err) => Some(err),
            Self::Storage(err) => Some(err),
            _ => None,
        }
    }
}

impl From<MapperError> for NotebookServiceError {
    fn from(value: MapperError) -> Self {
        match value {
            MapperError::RecordNotFound { kind, id } => Self::NotFound { kind, id },
            other => Self::Mapper(other),
        }
    }
}

impl From<UnitOfWorkError> for NotebookServiceError {
    fn from(value: UnitOfWorkError) -> Self {
        Self::UnitOfWork(value)
    }
}

impl From<DbError> for NotebookServiceError {
    fn from(value: DbError) -> Self {
        Self::Storage(value)
    }
}

/// Use-case service over one storage backend.
pub struct NotebookService<'s> {
    registry: MapperRegistry<'s>,
    policy: CommitPolicy,
}

impl<'s> NotebookService<'s> {
    pub fn new(storage: &'s Storage) -> Self {
        Self::with_policy(storage, CommitPolicy::default())
    }

    /// Service over `storage` with the commit policy from `config`.
    ///
    /// `storage` is normally the value returned by `CoreConfig::open`.
    pub fn from_config(storage: &'s Storage, config: &CoreConfig) -> Self {
        Self::with_policy(storage, config.commit_policy)
    }

    pub fn with_policy(storage: &'s Storage, policy: CommitPolicy) -> Self {
        Self {
            registry: MapperRegistry::new(storage),
            policy,
        }
    }

    pub fn registry(&self) -> MapperRegistry<'s> {
        self.registry
    }

    pub fn policy(&self) -> CommitPolicy {
        self.policy
    }

    fn unit_of_work(&self) -> UnitOfWork<'s> {
        UnitOfWork::with_policy(self.registry, self.policy)
    }

    pub fn categories(&self) -> NotebookServiceResult<Vec<Category>> {
        Ok(self.registry.categories().all()?)
    }

    pub fn notes(&self) -> NotebookServiceResult<Vec<Note>> {
        Ok(self.registry.notes().all()?)
    }

    pub fn readers(&self) -> NotebookServiceResult<Vec<Reader>> {
        Ok(self.registry.readers().all()?)
    }

    pub fn notes_in_category(&self, category_id: EntityId) -> NotebookServiceResult<Vec<Note>> {
        Ok(self.registry.notes().get_by_category_id(category_id)?)
    }

    /// Creates a category, optionally under an existing parent.
    pub fn create_category(
        &self,
        name: &str,
        parent_id: Option<EntityId>,
    ) -> NotebookServiceResult<Category> {
        let name = required_name(name, "category")?;
        let parent = parent_id
            .map(|id| self.registry.categories().find_by_id(id))
            .transpose()?;

        let mut uow = self.unit_of_work();
        uow.mark_new(Category::new(name, parent.as_ref()));
        let category = single_inserted(uow.commit()?.inserted)?
            .into_category()
            .ok_or(NotebookServiceError::InconsistentState("inserted object is not a category"))?;
        info!(
            "event=category_create module=service status=ok id={:?} parent_id={:?}",
            category.id, parent_id
        );
        Ok(category)
    }

    /// Creates a note in `category_id`.
    pub fn create_note(
        &self,
        category_id: EntityId,
        name: &str,
        description: &str,
    ) -> NotebookServiceResult<Note> {
        let name = required_name(name, "note")?;
        let category = self.registry.categories().find_by_id(category_id)?;

        let mut uow = self.unit_of_work();
        uow.mark_new(Note::new(name, description, &category));
        let note = inserted_note(uow.commit()?.inserted)?;
        info!(
            "event=note_create module=service status=ok id={:?} category_id={category_id}",
            note.id
        );
        Ok(note)
    }

    /// Stores a copy of a note named `copy_<name>` in the same category.
    pub fn copy_note(&self, note_id: EntityId) -> NotebookServiceResult<Note> {
        let original = self.registry.notes().find_by_id(note_id)?;

        let mut uow = self.unit_of_work();
        uow.mark_new(original.copy_named(COPY_PREFIX));
        let copy = inserted_note(uow.commit()?.inserted)?;
        info!(
            "event=note_copy module=service status=ok source_id={note_id} id={:?}",
            copy.id
        );
        Ok(copy)
    }

    /// Deletes a note and returns its refreshed category.
    pub fn delete_note(&self, note_id: EntityId) -> NotebookServiceResult<Category> {
        let note = self.registry.notes().find_by_id(note_id)?;
        let category_id = note
            .category
            .id
            .ok_or(NotebookServiceError::InconsistentState("stored note has no category id"))?;

        let mut uow = self.unit_of_work();
        uow.mark_removed(note)?;
        uow.commit()?;
        info!("event=note_delete module=service status=ok id={note_id}");
        Ok(self.registry.categories().find_by_id(category_id)?)
    }

    /// Creates a reader through the user factory.
    pub fn create_reader(&self, name: &str) -> NotebookServiceResult<Reader> {
        let name = required_name(name, "reader")?;

        let mut uow = self.unit_of_work();
        uow.mark_new(create_user(UserKind::Reader, name));
        let reader = single_inserted(uow.commit()?.inserted)?
            .into_reader()
            .ok_or(NotebookServiceError::InconsistentState("inserted object is not a reader"))?;
        info!("event=reader_create module=service status=ok id={:?}", reader.id);
        Ok(reader)
    }

    /// Deletes a reader; its notes stay and lose the reader link.
    pub fn delete_reader(&self, reader_id: EntityId) -> NotebookServiceResult<Reader> {
        let reader = self.registry.readers().find_by_id(reader_id)?;

        let mut uow = self.unit_of_work();
        uow.mark_removed(reader.clone())?;
        uow.commit()?;
        info!("event=reader_delete module=service status=ok id={reader_id}");
        Ok(reader)
    }

    /// Makes `note_ids` the reader's only notes.
    ///
    /// Unknown note ids are skipped. Returns the refreshed reader.
    pub fn link_reader(
        &self,
        reader_id: EntityId,
        note_ids: &[EntityId],
    ) -> NotebookServiceResult<Reader> {
        let readers = self.registry.readers();
        let notes = self.registry.notes();
        readers.find_by_id(reader_id)?;

        let tx = self.registry.storage().begin()?;
        let cleared = notes.clear_user_id(reader_id)?;
        let stored = notes.all()?;
        let mut linked = 0usize;
        for note_id in note_ids.iter().copied().collect::<BTreeSet<_>>() {
            if find_note(&stored, note_id).is_none() {
                debug!("event=reader_link module=service status=skip note_id={note_id}");
                continue;
            }
            notes.update_user_id(note_id, reader_id)?;
            linked += 1;
        }
        tx.commit()?;

        info!(
            "event=reader_link module=service status=ok reader_id={reader_id} cleared={cleared} linked={linked}"
        );
        Ok(readers.find_by_id(reader_id)?)
    }
}

fn required_name<'a>(value: &'a str, field: &'static str) -> NotebookServiceResult<&'a str> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(NotebookServiceError::InvalidName(field));
    }
    Ok(trimmed)
}

fn single_inserted(inserted: Vec<Entity>) -> NotebookServiceResult<Entity> {
    inserted
        .into_iter()
        .next()
        .ok_or(NotebookServiceError::InconsistentState("commit reported no inserted object"))
}

fn inserted_note(inserted: Vec<Entity>) -> NotebookServiceResult<Note> {
    single_inserted(inserted)?
        .into_note()
        .ok_or(NotebookServiceError::InconsistentState("inserted object is not a note"))
}

#[cfg(test)]
mod tests {
    use super::{NotebookService, NotebookServiceError};
    use crate::db::Storage;

    #[test]
    fn blank_names_are_rejected_before_any_write() {
        let storage = Storage::memory();
        let service = NotebookService::new(&storage);
        assert!(matches!(
            service.create_category("   ", None),
            Err(NotebookServiceError::InvalidName("category"))
        ));
        assert!(service.categories().expect("categories").is_empty());
    }

    #[test]
    fn create_note_in_missing_category_is_not_found() {
        let storage = Storage::memory();
        let service = NotebookService::new(&storage);
        let err = service.create_note(5, "n", "d").expect_err("missing category");
        assert!(matches!(err, NotebookServiceError::NotFound { id: 5, .. }));
    }
}
