//! Joined-row shapes and object graph reconstruction.
//!
//! # Responsibility
//! - Group joined rows by parent key and reduce each group to one object.
//! - Act as the per-query identity map: one category reference per category
//!   id within a result set.
//!
//! # Invariants
//! - Grouping keeps first-appearance order and merges rows of one key even
//!   when storage returns them non-contiguously.
//! - Category notes are de-duplicated by note equality before appending.

use crate::identity::EntityId;
use crate::mapper::{MapperError, MapperResult};
use crate::model::{push_unique, Category, CategoryRef, Note, Reader, ReaderRef};
use std::collections::BTreeMap;

/// One note joined with its category and optional reader.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct NoteRow {
    pub id: EntityId,
    pub name: String,
    pub description: String,
    pub category_id: EntityId,
    pub category_name: String,
    pub reader_id: Option<EntityId>,
    pub reader_name: Option<String>,
}

impl NoteRow {
    fn into_note(self) -> Note {
        let reader = self.reader_id.map(|id| ReaderRef {
            id: Some(id),
            name: self.reader_name.unwrap_or_default(),
        });
        Note {
            id: Some(self.id),
            name: self.name,
            description: self.description,
            category: CategoryRef {
                id: Some(self.category_id),
                name: self.category_name,
            },
            reader,
        }
    }
}

/// One category joined with at most one of its notes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct CategoryRow {
    pub id: EntityId,
    pub name: String,
    pub parent_id: Option<EntityId>,
    pub note: Option<NoteRow>,
}

/// One reader joined with at most one of its notes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ReaderRow {
    pub id: EntityId,
    pub name: String,
    pub note: Option<NoteRow>,
}

/// Groups rows by key, preserving the order in which keys first appear.
pub(crate) fn group_by_key<R, K>(rows: Vec<R>, key: impl Fn(&R) -> K) -> Vec<(K, Vec<R>)>
where
    K: Ord + Copy,
{
    let mut positions: BTreeMap<K, usize> = BTreeMap::new();
    let mut groups: Vec<(K, Vec<R>)> = Vec::new();
    for row in rows {
        let row_key = key(&row);
        match positions.get(&row_key) {
            Some(&index) => groups[index].1.push(row),
            None => {
                positions.insert(row_key, groups.len());
                groups.push((row_key, vec![row]));
            }
        }
    }
    groups
}

/// One note per note id. A note linked to several categories keeps the first.
pub(crate) fn hydrate_notes(rows: Vec<NoteRow>) -> Vec<Note> {
    group_by_key(rows, |row| row.id)
        .into_iter()
        .filter_map(|(_, group)| group.into_iter().next())
        .map(NoteRow::into_note)
        .collect()
}

/// One reader per reader id with its linked notes, de-duplicated by id.
pub(crate) fn hydrate_readers(rows: Vec<ReaderRow>) -> Vec<Reader> {
    group_by_key(rows, |row| row.id)
        .into_iter()
        .map(|(id, group)| {
            let name = group
                .first()
                .map(|row| row.name.clone())
                .unwrap_or_default();
            let note_rows = group.into_iter().filter_map(|row| row.note).collect();
            Reader {
                id: Some(id),
                name,
                notes: hydrate_notes(note_rows),
            }
        })
        .collect()
}

struct CategoryNode {
    category: Category,
    parent_id: Option<EntityId>,
}

/// One category per category id, with notes and a resolved parent chain.
///
/// Parents must be present in `rows`. A missing parent or a parent cycle is
/// reported as `InvalidData`.
pub(crate) fn hydrate_categories(rows: Vec<CategoryRow>) -> MapperResult<Vec<Category>> {
    let mut order = Vec::new();
    let mut nodes = BTreeMap::new();
    for (id, group) in group_by_key(rows, |row| row.id) {
        let (name, parent_id) = match group.first() {
            Some(row) => (row.name.clone(), row.parent_id),
            None => continue,
        };
        let mut category = Category {
            id: Some(id),
            name,
            parent: None,
            notes: Vec::new(),
        };
        let reference = category.to_ref();
        for row in group {
            if let Some(note_row) = row.note {
                let mut note = note_row.into_note();
                note.category = reference.clone();
                push_unique(&mut category.notes, note);
            }
        }
        order.push(id);
        nodes.insert(
            id,
            CategoryNode {
                category,
                parent_id,
            },
        );
    }

    let mut resolved = BTreeMap::new();
    let mut categories = Vec::with_capacity(order.len());
    for id in order {
        let mut visiting = Vec::new();
        categories.push(resolve_category(id, &nodes, &mut resolved, &mut visiting)?);
    }
    Ok(categories)
}

fn resolve_category(
    id: EntityId,
    nodes: &BTreeMap<EntityId, CategoryNode>,
    resolved: &mut BTreeMap<EntityId, Category>,
    visiting: &mut Vec<EntityId>,
) -> MapperResult<Category> {
    if let Some(done) = resolved.get(&id) {
        return Ok(done.clone());
    }
    if visiting.contains(&id) {
        return Err(MapperError::InvalidData(format!(
            "category parent chain loops back to {id}"
        )));
    }
    let node = nodes.get(&id).ok_or_else(|| {
        MapperError::InvalidData(format!("category {id} is referenced as parent but missing"))
    })?;

    visiting.push(id);
    let mut category = node.category.clone();
    if let Some(parent_id) = node.parent_id {
        let parent = resolve_category(parent_id, nodes, resolved, visiting)?;
        category.parent = Some(Box::new(parent));
    }
    visiting.pop();

    resolved.insert(id, category.clone());
    Ok(category)
}

#[cfg(test)]
mod tests {
    use super::{group_by_key, hydrate_categories, hydrate_notes, CategoryRow, NoteRow};
    use crate::mapper::MapperError;

    fn note_row(id: i64, name: &str, category_id: i64, category_name: &str) -> NoteRow {
        NoteRow {
            id,
            name: name.to_string(),
            description: "d".to_string(),
            category_id,
            category_name: category_name.to_string(),
            reader_id: None,
            reader_name: None,
        }
    }

    fn category_row(id: i64, parent_id: Option<i64>, note: Option<NoteRow>) -> CategoryRow {
        CategoryRow {
            id,
            name: format!("category {id}"),
            parent_id,
            note,
        }
    }

    #[test]
    fn group_by_key_merges_non_contiguous_rows_in_first_seen_order() {
        let groups = group_by_key(vec![(2, 'a'), (1, 'b'), (2, 'c')], |row| row.0);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].0, 2);
        assert_eq!(groups[0].1, vec![(2, 'a'), (2, 'c')]);
        assert_eq!(groups[1].0, 1);
    }

    #[test]
    fn hydrate_notes_keeps_one_object_per_note_id() {
        let notes = hydrate_notes(vec![
            note_row(1, "a", 1, "first"),
            note_row(1, "a", 2, "second"),
            note_row(2, "b", 1, "first"),
        ]);
        assert_eq!(notes.len(), 2);
        assert_eq!(notes[0].category.name, "first");
    }

    #[test]
    fn hydrate_categories_deduplicates_equal_notes_and_links_parents() {
        let rows = vec![
            category_row(1, None, Some(note_row(10, "same", 1, "category 1"))),
            category_row(1, None, Some(note_row(11, "same", 1, "category 1"))),
            category_row(2, Some(1), None),
        ];
        let categories = hydrate_categories(rows).expect("hydrate");
        assert_eq!(categories.len(), 2);
        assert_eq!(categories[0].notes.len(), 1);
        assert!(categories[1].notes.is_empty());
        assert_eq!(categories[1].parent_id(), Some(1));
        assert_eq!(categories[1].notes_count(), 1);
    }

    #[test]
    fn hydrate_categories_reports_parent_cycles() {
        let rows = vec![category_row(1, Some(2), None), category_row(2, Some(1), None)];
        let err = hydrate_categories(rows).expect_err("cycle must fail");
        assert!(matches!(err, MapperError::InvalidData(_)));
    }

    #[test]
    fn hydrate_categories_points_notes_at_current_category() {
        let rows = vec![category_row(3, None, Some(note_row(1, "n", 3, "stale name")))];
        let categories = hydrate_categories(rows).expect("hydrate");
        assert_eq!(categories[0].notes[0].category.name, "category 3");
        assert_eq!(categories[0].notes[0].category.id, Some(3));
    }
}
