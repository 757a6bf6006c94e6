//! In-memory storage backend.
//!
//! # Responsibility
//! - Keep reader/note/category tables without any database.
//! - Allocate ids with the max-plus-one scheme.
//! - Snapshot and restore tables for storage transactions.
//!
//! # Invariants
//! - Each category keeps its own nested list of linked note ids.
//! - Note ids are allocated past every id in the flat note table and in every
//!   nested per-category list.
//! - Every write validates references before mutating, so a failed write
//!   leaves tables untouched.

use crate::db::{DbError, DbResult};
use crate::identity::{next_id_after, EntityId};
use crate::model::EntityKind;
use std::cell::RefCell;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ReaderRecord {
    pub id: EntityId,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct NoteRecord {
    pub id: EntityId,
    pub name: String,
    pub description: String,
    pub user_id: Option<EntityId>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct CategoryRecord {
    pub id: EntityId,
    pub name: String,
    pub parent_id: Option<EntityId>,
    /// Linked note ids in link order.
    pub note_ids: Vec<EntityId>,
}

/// Row data owned by `MemoryStore`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct MemoryTables {
    pub readers: Vec<ReaderRecord>,
    pub notes: Vec<NoteRecord>,
    pub categories: Vec<CategoryRecord>,
}

impl MemoryTables {
    pub fn next_reader_id(&self) -> EntityId {
        next_id_after(self.readers.iter().map(|reader| reader.id))
    }

    pub fn next_category_id(&self) -> EntityId {
        next_id_after(self.categories.iter().map(|category| category.id))
    }

    pub fn next_note_id(&self) -> EntityId {
        let flat = self.notes.iter().map(|note| note.id);
        let nested = self
            .categories
            .iter()
            .flat_map(|category| category.note_ids.iter().copied());
        next_id_after(flat.chain(nested))
    }

    pub fn reader(&self, id: EntityId) -> Option<&ReaderRecord> {
        self.readers.iter().find(|reader| reader.id == id)
    }

    #[cfg(test)]
    pub fn note(&self, id: EntityId) -> Option<&NoteRecord> {
        self.notes.iter().find(|note| note.id == id)
    }

    pub fn category(&self, id: EntityId) -> Option<&CategoryRecord> {
        self.categories.iter().find(|category| category.id == id)
    }

    /// Whether `id` is `start` or appears on the parent chain above it.
    pub fn parent_chain_contains(&self, start: Option<EntityId>, id: EntityId) -> bool {
        let mut visited = Vec::new();
        let mut cursor = start;
        while let Some(current) = cursor {
            if current == id {
                return true;
            }
            if visited.contains(&current) {
                return false;
            }
            visited.push(current);
            cursor = self.category(current).and_then(|category| category.parent_id);
        }
        false
    }

    pub fn sorted_categories(&self) -> Vec<&CategoryRecord> {
        let mut categories = self.categories.iter().collect::<Vec<_>>();
        categories.sort_by_key(|category| category.id);
        categories
    }

    pub fn insert_reader(&mut self, name: &str) -> EntityId {
        let id = self.next_reader_id();
        self.readers.push(ReaderRecord {
            id,
            name: name.to_string(),
        });
        id
    }

    pub fn update_reader(&mut self, id: EntityId, name: &str) -> bool {
        match self.readers.iter_mut().find(|reader| reader.id == id) {
            Some(reader) => {
                reader.name = name.to_string();
                true
            }
            None => false,
        }
    }

    /// Deletes a reader and clears it from linked notes.
    pub fn delete_reader(&mut self, id: EntityId) -> bool {
        let before = self.readers.len();
        self.readers.retain(|reader| reader.id != id);
        if self.readers.len() == before {
            return false;
        }
        self.clear_user_id(id);
        true
    }

    pub fn insert_category(&mut self, name: &str, parent_id: Option<EntityId>) -> DbResult<EntityId> {
        self.require_parent(parent_id)?;
        let id = self.next_category_id();
        self.categories.push(CategoryRecord {
            id,
            name: name.to_string(),
            parent_id,
            note_ids: Vec::new(),
        });
        Ok(id)
    }

    pub fn update_category(
        &mut self,
        id: EntityId,
        name: &str,
        parent_id: Option<EntityId>,
    ) -> DbResult<bool> {
        self.require_parent(parent_id)?;
        match self.categories.iter_mut().find(|category| category.id == id) {
            Some(category) => {
                category.name = name.to_string();
                category.parent_id = parent_id;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Deletes a category, its note links and detaches child categories.
    pub fn delete_category(&mut self, id: EntityId) -> bool {
        let before = self.categories.len();
        self.categories.retain(|category| category.id != id);
        if self.categories.len() == before {
            return false;
        }
        for category in &mut self.categories {
            if category.parent_id == Some(id) {
                category.parent_id = None;
            }
        }
        true
    }

    pub fn insert_note(
        &mut self,
        name: &str,
        description: &str,
        user_id: Option<EntityId>,
        category_id: EntityId,
    ) -> DbResult<EntityId> {
        self.require_category(category_id)?;
        self.require_reader(user_id)?;

        let id = self.next_note_id();
        self.notes.push(NoteRecord {
            id,
            name: name.to_string(),
            description: description.to_string(),
            user_id,
        });
        self.link_note(id, category_id);
        Ok(id)
    }

    pub fn update_note(
        &mut self,
        id: EntityId,
        name: &str,
        description: &str,
        user_id: Option<EntityId>,
        category_id: EntityId,
    ) -> DbResult<bool> {
        self.require_category(category_id)?;
        self.require_reader(user_id)?;

        let Some(note) = self.notes.iter_mut().find(|note| note.id == id) else {
            return Ok(false);
        };
        note.name = name.to_string();
        note.description = description.to_string();
        note.user_id = user_id;

        self.unlink_note(id);
        self.link_note(id, category_id);
        Ok(true)
    }

    pub fn delete_note(&mut self, id: EntityId) -> bool {
        let before = self.notes.len();
        self.notes.retain(|note| note.id != id);
        if self.notes.len() == before {
            return false;
        }
        self.unlink_note(id);
        true
    }

    pub fn set_user_id(&mut self, note_id: EntityId, user_id: Option<EntityId>) -> DbResult<bool> {
        self.require_reader(user_id)?;
        match self.notes.iter_mut().find(|note| note.id == note_id) {
            Some(note) => {
                note.user_id = user_id;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    pub fn clear_user_id(&mut self, user_id: EntityId) -> usize {
        let mut cleared = 0;
        for note in &mut self.notes {
            if note.user_id == Some(user_id) {
                note.user_id = None;
                cleared += 1;
            }
        }
        cleared
    }

    fn link_note(&mut self, note_id: EntityId, category_id: EntityId) {
        if let Some(category) = self
            .categories
            .iter_mut()
            .find(|category| category.id == category_id)
        {
            if !category.note_ids.contains(&note_id) {
                category.note_ids.push(note_id);
            }
        }
    }

    fn unlink_note(&mut self, note_id: EntityId) {
        for category in &mut self.categories {
            category.note_ids.retain(|id| *id != note_id);
        }
    }

    fn require_parent(&self, parent_id: Option<EntityId>) -> DbResult<()> {
        match parent_id {
            Some(id) => self.require_category(id),
            None => Ok(()),
        }
    }

    fn require_category(&self, id: EntityId) -> DbResult<()> {
        if self.category(id).is_none() {
            return Err(DbError::MissingReference {
                kind: EntityKind::Category,
                id,
            });
        }
        Ok(())
    }

    fn require_reader(&self, user_id: Option<EntityId>) -> DbResult<()> {
        match user_id {
            Some(id) if self.reader(id).is_none() => Err(DbError::MissingReference {
                kind: EntityKind::Reader,
                id,
            }),
            _ => Ok(()),
        }
    }
}

/// In-memory storage backend with snapshot transactions.
///
/// Single-connection model: the store is `!Sync` and meant to be used from
/// one thread at a time.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: RefCell<MemoryTables>,
    snapshot: RefCell<Option<MemoryTables>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a storage transaction is open.
    pub fn in_transaction(&self) -> bool {
        self.snapshot.borrow().is_some()
    }

    pub(crate) fn read<T>(&self, f: impl FnOnce(&MemoryTables) -> T) -> T {
        f(&self.tables.borrow())
    }

    pub(crate) fn write<T>(&self, f: impl FnOnce(&mut MemoryTables) -> T) -> T {
        f(&mut self.tables.borrow_mut())
    }

    pub(crate) fn begin(&self) -> DbResult<()> {
        let mut snapshot = self.snapshot.borrow_mut();
        if snapshot.is_some() {
            return Err(DbError::NestedTransaction);
        }
        *snapshot = Some(self.tables.borrow().clone());
        Ok(())
    }

    pub(crate) fn commit(&self) {
        self.snapshot.borrow_mut().take();
    }

    pub(crate) fn rollback(&self) {
        if let Some(previous) = self.snapshot.borrow_mut().take() {
            *self.tables.borrow_mut() = previous;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{MemoryStore, MemoryTables};
    use crate::db::DbError;
    use crate::model::EntityKind;

    #[test]
    fn note_ids_skip_ids_seen_only_in_nested_lists() {
        let mut tables = MemoryTables::default();
        let category_id = tables.insert_category("common", None).expect("category insert");
        let first = tables
            .insert_note("a", "d", None, category_id)
            .expect("note insert");
        assert_eq!(first, 1);

        // A link that outlived its flat row still reserves the id.
        tables.categories[0].note_ids.push(7);
        assert_eq!(tables.next_note_id(), 8);
    }

    #[test]
    fn insert_note_rejects_missing_category_without_mutation() {
        let mut tables = MemoryTables::default();
        let err = tables
            .insert_note("a", "d", None, 42)
            .expect_err("missing category must fail");
        assert!(matches!(
            err,
            DbError::MissingReference {
                kind: EntityKind::Category,
                id: 42
            }
        ));
        assert!(tables.notes.is_empty());
    }

    #[test]
    fn delete_reader_clears_note_links() {
        let mut tables = MemoryTables::default();
        let reader_id = tables.insert_reader("ann");
        let category_id = tables.insert_category("c", None).expect("category insert");
        let note_id = tables
            .insert_note("n", "d", Some(reader_id), category_id)
            .expect("note insert");

        assert!(tables.delete_reader(reader_id));
        assert_eq!(tables.note(note_id).and_then(|note| note.user_id), None);
    }

    #[test]
    fn rollback_restores_snapshot_and_nested_begin_fails() {
        let store = MemoryStore::new();
        store.write(|tables| tables.insert_reader("kept"));

        store.begin().expect("begin");
        assert!(matches!(store.begin(), Err(DbError::NestedTransaction)));
        store.write(|tables| tables.insert_reader("discarded"));
        store.rollback();

        assert!(!store.in_transaction());
        assert_eq!(store.read(|tables| tables.readers.len()), 1);
    }
}
