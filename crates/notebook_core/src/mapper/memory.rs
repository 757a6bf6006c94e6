//! Mappers over the in-memory backend.
//!
//! # Invariants
//! - Rows are produced in the same shape and order as the SQL joins, then
//!   reduced by the shared hydration in `rows`.
//! - A note is visible only while some category links it.

use crate::db::memory::{MemoryTables, NoteRecord};
use crate::db::MemoryStore;
use crate::identity::EntityId;
use crate::mapper::category_mapper::persisted_parent_id;
use crate::mapper::note_mapper::linked_reader_id;
use crate::mapper::rows::{
    hydrate_categories, hydrate_notes, hydrate_readers, CategoryRow, NoteRow, ReaderRow,
};
use crate::mapper::{
    CategoryMapper, MapperError, MapperResult, NoteMapper, ReaderMapper,
};
use crate::model::{Category, EntityKind, Note, Reader};
use log::debug;

fn not_found(kind: EntityKind, id: EntityId) -> MapperError {
    MapperError::RecordNotFound { kind, id }
}

fn note_rows(tables: &MemoryTables, record: &NoteRecord) -> Vec<NoteRow> {
    let reader = record.user_id.and_then(|id| tables.reader(id));
    tables
        .sorted_categories()
        .into_iter()
        .filter(|category| category.note_ids.contains(&record.id))
        .map(|category| NoteRow {
            id: record.id,
            name: record.name.clone(),
            description: record.description.clone(),
            category_id: category.id,
            category_name: category.name.clone(),
            reader_id: reader.map(|reader| reader.id),
            reader_name: reader.map(|reader| reader.name.clone()),
        })
        .collect()
}

fn sorted_notes(tables: &MemoryTables) -> Vec<&NoteRecord> {
    let mut notes = tables.notes.iter().collect::<Vec<_>>();
    notes.sort_by_key(|note| note.id);
    notes
}

fn log_read(kind: EntityKind, rows: usize) {
    debug!("event=mapper_read module=mapper kind={kind} backend=memory status=ok rows={rows}");
}

fn log_write(kind: EntityKind, op: &str, id: EntityId) {
    debug!("event=mapper_write module=mapper kind={kind} backend=memory op={op} status=ok id={id}");
}

/// Reader mapper over [`MemoryStore`].
pub struct MemoryReaderMapper<'m> {
    store: &'m MemoryStore,
}

impl<'m> MemoryReaderMapper<'m> {
    pub fn new(store: &'m MemoryStore) -> Self {
        Self { store }
    }

    fn rows(&self, only: Option<EntityId>) -> Vec<ReaderRow> {
        self.store.read(|tables| {
            let mut readers = tables
                .readers
                .iter()
                .filter(|reader| only.map_or(true, |id| reader.id == id))
                .collect::<Vec<_>>();
            readers.sort_by_key(|reader| reader.id);

            let mut rows = Vec::new();
            for reader in readers {
                let linked = sorted_notes(tables)
                    .into_iter()
                    .filter(|note| note.user_id == Some(reader.id))
                    .flat_map(|note| note_rows(tables, note))
                    .collect::<Vec<_>>();
                if linked.is_empty() {
                    rows.push(ReaderRow {
                        id: reader.id,
                        name: reader.name.clone(),
                        note: None,
                    });
                }
                rows.extend(linked.into_iter().map(|note| ReaderRow {
                    id: reader.id,
                    name: reader.name.clone(),
                    note: Some(note),
                }));
            }
            rows
        })
    }
}

impl ReaderMapper for MemoryReaderMapper<'_> {
    fn all(&self) -> MapperResult<Vec<Reader>> {
        let rows = self.rows(None);
        log_read(EntityKind::Reader, rows.len());
        Ok(hydrate_readers(rows))
    }

    fn find_by_id(&self, id: EntityId) -> MapperResult<Reader> {
        let rows = self.rows(Some(id));
        log_read(EntityKind::Reader, rows.len());
        hydrate_readers(rows)
            .into_iter()
            .next()
            .ok_or_else(|| not_found(EntityKind::Reader, id))
    }

    fn insert(&self, reader: &mut Reader) -> MapperResult<EntityId> {
        let id = self.store.write(|tables| tables.insert_reader(&reader.name));
        reader.id = Some(id);
        log_write(EntityKind::Reader, "insert", id);
        Ok(id)
    }

    fn update(&self, reader: &Reader) -> MapperResult<()> {
        let id = reader
            .id
            .ok_or(MapperError::NotPersisted(EntityKind::Reader))?;
        if !self
            .store
            .write(|tables| tables.update_reader(id, &reader.name))
        {
            return Err(not_found(EntityKind::Reader, id));
        }
        log_write(EntityKind::Reader, "update", id);
        Ok(())
    }

    fn delete(&self, reader: &Reader) -> MapperResult<()> {
        let id = reader
            .id
            .ok_or(MapperError::NotPersisted(EntityKind::Reader))?;
        if !self.store.write(|tables| tables.delete_reader(id)) {
            return Err(not_found(EntityKind::Reader, id));
        }
        log_write(EntityKind::Reader, "delete", id);
        Ok(())
    }
}

/// Note mapper over [`MemoryStore`].
pub struct MemoryNoteMapper<'m> {
    store: &'m MemoryStore,
}

impl<'m> MemoryNoteMapper<'m> {
    pub fn new(store: &'m MemoryStore) -> Self {
        Self { store }
    }

    fn load(&self, filter: impl Fn(&NoteRow) -> bool) -> Vec<Note> {
        let rows = self.store.read(|tables| {
            sorted_notes(tables)
                .into_iter()
                .flat_map(|note| note_rows(tables, note))
                .filter(|row| filter(row))
                .collect::<Vec<_>>()
        });
        log_read(EntityKind::Note, rows.len());
        hydrate_notes(rows)
    }
}

impl NoteMapper for MemoryNoteMapper<'_> {
    fn all(&self) -> MapperResult<Vec<Note>> {
        Ok(self.load(|_| true))
    }

    fn find_by_id(&self, id: EntityId) -> MapperResult<Note> {
        self.load(|row| row.id == id)
            .into_iter()
            .next()
            .ok_or_else(|| not_found(EntityKind::Note, id))
    }

    fn insert(&self, note: &mut Note) -> MapperResult<EntityId> {
        let category_id = note
            .category
            .id
            .ok_or(MapperError::NotPersisted(EntityKind::Category))?;
        let user_id = linked_reader_id(note)?;
        let id = self
            .store
            .write(|tables| {
                tables.insert_note(&note.name, &note.description, user_id, category_id)
            })
            .map_err(|err| MapperError::commit_failed(EntityKind::Note, err))?;
        note.id = Some(id);
        log_write(EntityKind::Note, "insert", id);
        Ok(id)
    }

    fn update(&self, note: &Note) -> MapperResult<()> {
        let id = note.id.ok_or(MapperError::NotPersisted(EntityKind::Note))?;
        let category_id = note
            .category
            .id
            .ok_or(MapperError::NotPersisted(EntityKind::Category))?;
        let user_id = linked_reader_id(note)?;
        let found = self
            .store
            .write(|tables| {
                tables.update_note(id, &note.name, &note.description, user_id, category_id)
            })
            .map_err(|err| MapperError::update_failed(EntityKind::Note, id, err))?;
        if !found {
            return Err(not_found(EntityKind::Note, id));
        }
        log_write(EntityKind::Note, "update", id);
        Ok(())
    }

    fn delete(&self, note: &Note) -> MapperResult<()> {
        let id = note.id.ok_or(MapperError::NotPersisted(EntityKind::Note))?;
        if !self.store.write(|tables| tables.delete_note(id)) {
            return Err(not_found(EntityKind::Note, id));
        }
        log_write(EntityKind::Note, "delete", id);
        Ok(())
    }

    fn get_by_category_id(&self, category_id: EntityId) -> MapperResult<Vec<Note>> {
        Ok(self.load(|row| row.category_id == category_id))
    }

    fn update_user_id(&self, note_id: EntityId, user_id: EntityId) -> MapperResult<()> {
        let found = self
            .store
            .write(|tables| tables.set_user_id(note_id, Some(user_id)))
            .map_err(|err| MapperError::update_failed(EntityKind::Note, note_id, err))?;
        if !found {
            return Err(not_found(EntityKind::Note, note_id));
        }
        log_write(EntityKind::Note, "update_user_id", note_id);
        Ok(())
    }

    fn clear_user_id(&self, user_id: EntityId) -> MapperResult<usize> {
        let cleared = self.store.write(|tables| tables.clear_user_id(user_id));
        debug!(
            "event=mapper_write module=mapper kind=note backend=memory op=clear_user_id status=ok user_id={user_id} cleared={cleared}"
        );
        Ok(cleared)
    }
}

/// Category mapper over [`MemoryStore`].
pub struct MemoryCategoryMapper<'m> {
    store: &'m MemoryStore,
}

impl<'m> MemoryCategoryMapper<'m> {
    pub fn new(store: &'m MemoryStore) -> Self {
        Self { store }
    }

    fn rows(&self) -> Vec<CategoryRow> {
        self.store.read(|tables| {
            let notes = sorted_notes(tables);
            let mut rows = Vec::new();
            for category in tables.sorted_categories() {
                let linked = notes
                    .iter()
                    .filter(|note| category.note_ids.contains(&note.id))
                    .map(|note| {
                        let reader = note.user_id.and_then(|id| tables.reader(id));
                        NoteRow {
                            id: note.id,
                            name: note.name.clone(),
                            description: note.description.clone(),
                            category_id: category.id,
                            category_name: category.name.clone(),
                            reader_id: reader.map(|reader| reader.id),
                            reader_name: reader.map(|reader| reader.name.clone()),
                        }
                    })
                    .collect::<Vec<_>>();
                if linked.is_empty() {
                    rows.push(CategoryRow {
                        id: category.id,
                        name: category.name.clone(),
                        parent_id: category.parent_id,
                        note: None,
                    });
                }
                rows.extend(linked.into_iter().map(|note| CategoryRow {
                    id: category.id,
                    name: category.name.clone(),
                    parent_id: category.parent_id,
                    note: Some(note),
                }));
            }
            rows
        })
    }
}

impl CategoryMapper for MemoryCategoryMapper<'_> {
    fn all(&self) -> MapperResult<Vec<Category>> {
        let rows = self.rows();
        log_read(EntityKind::Category, rows.len());
        hydrate_categories(rows)
    }

    fn find_by_id(&self, id: EntityId) -> MapperResult<Category> {
        // The whole table is small; hydrating it resolves the parent chain.
        self.all()?
            .into_iter()
            .find(|category| category.id == Some(id))
            .ok_or_else(|| not_found(EntityKind::Category, id))
    }

    fn insert(&self, category: &mut Category) -> MapperResult<EntityId> {
        let parent_id = persisted_parent_id(category)?;
        let id = self
            .store
            .write(|tables| tables.insert_category(&category.name, parent_id))
            .map_err(|err| MapperError::commit_failed(EntityKind::Category, err))?;
        category.id = Some(id);
        log_write(EntityKind::Category, "insert", id);
        Ok(id)
    }

    fn update(&self, category: &Category) -> MapperResult<()> {
        let id = category
            .id
            .ok_or(MapperError::NotPersisted(EntityKind::Category))?;
        let parent_id = persisted_parent_id(category)?;
        if let Some(parent_id) = parent_id {
            if self
                .store
                .read(|tables| tables.parent_chain_contains(Some(parent_id), id))
            {
                return Err(MapperError::ParentCycle { id, parent_id });
            }
        }
        let found = self
            .store
            .write(|tables| tables.update_category(id, &category.name, parent_id))
            .map_err(|err| MapperError::update_failed(EntityKind::Category, id, err))?;
        if !found {
            return Err(not_found(EntityKind::Category, id));
        }
        log_write(EntityKind::Category, "update", id);
        Ok(())
    }

    fn delete(&self, category: &Category) -> MapperResult<()> {
        let id = category
            .id
            .ok_or(MapperError::NotPersisted(EntityKind::Category))?;
        if !self.store.write(|tables| tables.delete_category(id)) {
            return Err(not_found(EntityKind::Category, id));
        }
        log_write(EntityKind::Category, "delete", id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{MemoryCategoryMapper, MemoryNoteMapper, MemoryReaderMapper};
    use crate::db::MemoryStore;
    use crate::mapper::{CategoryMapper, MapperError, NoteMapper, ReaderMapper};
    use crate::model::{Category, EntityKind, Note, Reader};

    #[test]
    fn memory_ids_start_at_one_and_follow_max() {
        let store = MemoryStore::new();
        let readers = MemoryReaderMapper::new(&store);
        let mut first = Reader::new("a");
        let mut second = Reader::new("b");
        assert_eq!(readers.insert(&mut first).expect("insert"), 1);
        assert_eq!(readers.insert(&mut second).expect("insert"), 2);

        readers.delete(&second).expect("delete");
        let mut third = Reader::new("c");
        assert_eq!(readers.insert(&mut third).expect("insert"), 2);
    }

    #[test]
    fn note_with_reader_is_listed_under_reader() {
        let store = MemoryStore::new();
        let categories = MemoryCategoryMapper::new(&store);
        let notes = MemoryNoteMapper::new(&store);
        let readers = MemoryReaderMapper::new(&store);

        let mut category = Category::new("inbox", None);
        categories.insert(&mut category).expect("category");
        let mut reader = Reader::new("ann");
        readers.insert(&mut reader).expect("reader");
        let mut note = Note::new("n", "d", &category);
        note.assign_reader(&reader);
        notes.insert(&mut note).expect("note");

        let loaded = readers.find_by_id(1).expect("find reader");
        assert_eq!(loaded.notes.len(), 1);
        assert_eq!(loaded.notes[0].reader_id(), Some(1));
        assert_eq!(categories.find_by_id(1).expect("find").notes.len(), 1);
    }

    #[test]
    fn insert_note_into_unknown_category_fails_as_commit_failure() {
        let store = MemoryStore::new();
        let notes = MemoryNoteMapper::new(&store);
        let mut ghost = Category::new("ghost", None);
        ghost.id = Some(9);
        let mut note = Note::new("n", "d", &ghost);

        let err = notes.insert(&mut note).expect_err("missing category");
        assert!(matches!(
            err,
            MapperError::CommitFailed {
                kind: EntityKind::Note,
                ..
            }
        ));
        assert_eq!(note.id, None);
    }
}
