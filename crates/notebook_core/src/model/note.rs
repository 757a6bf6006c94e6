//! Note domain model.
//!
//! # Responsibility
//! - Hold note content plus light references to its category and reader.
//! - Define structural equality used for duplicate detection in lists.
//!
//! # Invariants
//! - Two notes are equal iff name, description and category name match.
//!   Identity (`id`) never takes part in equality.
//! - Id-based lookup goes through `find_note`, never through `==`.

use crate::identity::EntityId;
use crate::model::category::Category;
use crate::model::user::Reader;
use serde::{Deserialize, Serialize};

/// Reference from a note to the category it belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryRef {
    /// `None` while the category is not persisted yet.
    pub id: Option<EntityId>,
    pub name: String,
}

impl From<&Category> for CategoryRef {
    fn from(value: &Category) -> Self {
        Self {
            id: value.id,
            name: value.name.clone(),
        }
    }
}

/// Reference from a note to its optional reader.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReaderRef {
    pub id: Option<EntityId>,
    pub name: String,
}

impl From<&Reader> for ReaderRef {
    fn from(value: &Reader) -> Self {
        Self {
            id: value.id,
            name: value.name.clone(),
        }
    }
}

/// One note with rich-text description.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Note {
    /// Assigned by storage on insert.
    pub id: Option<EntityId>,
    pub name: String,
    /// Rich text body.
    pub description: String,
    /// Required owning category.
    pub category: CategoryRef,
    /// Optional linked reader.
    pub reader: Option<ReaderRef>,
}

impl Note {
    /// Creates an unsaved note that belongs to `category`.
    ///
    /// The note is not appended to `category.notes`; use
    /// `Category::attach` for that.
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        category: &Category,
    ) -> Self {
        Self {
            id: None,
            name: name.into(),
            description: description.into(),
            category: CategoryRef::from(category),
            reader: None,
        }
    }

    /// Structural equality: name, description and category name.
    pub fn same_content(&self, other: &Note) -> bool {
        self.name == other.name
            && self.description == other.description
            && self.category.name == other.category.name
    }

    /// Returns an unsaved copy named `{prefix}{name}`.
    ///
    /// The copy keeps category and reader links. With a non-empty prefix the
    /// copy is never equal to the original.
    pub fn copy_named(&self, prefix: &str) -> Note {
        let mut copy = self.clone();
        copy.id = None;
        copy.name = format!("{prefix}{}", self.name);
        copy
    }

    /// Points this note at `reader`.
    pub fn assign_reader(&mut self, reader: &Reader) {
        self.reader = Some(ReaderRef::from(reader));
    }

    pub fn clear_reader(&mut self) {
        self.reader = None;
    }

    /// Id of the linked reader, if the link is persisted.
    pub fn reader_id(&self) -> Option<EntityId> {
        self.reader.as_ref().and_then(|reader| reader.id)
    }
}

impl PartialEq for Note {
    fn eq(&self, other: &Self) -> bool {
        self.same_content(other)
    }
}

impl Eq for Note {}

/// Appends `note` unless an equal note is already present.
///
/// Returns whether the note was appended.
pub fn push_unique(notes: &mut Vec<Note>, note: Note) -> bool {
    if notes.iter().any(|existing| existing.same_content(&note)) {
        return false;
    }
    notes.push(note);
    true
}

/// Finds a note by identity.
pub fn find_note(notes: &[Note], id: EntityId) -> Option<&Note> {
    notes.iter().find(|note| note.id == Some(id))
}
