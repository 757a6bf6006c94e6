//! Tagged entity variant used for registry dispatch and change tracking.
//!
//! # Invariants
//! - Dispatch is keyed on `EntityKind`, never on runtime type inspection.
//! - `same_object` uses identity when both sides have an id. Without ids only
//!   notes can match, through their structural equality.

use crate::identity::EntityId;
use crate::model::category::Category;
use crate::model::note::Note;
use crate::model::user::{Editor, Reader, User};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// Entity kind tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Reader,
    Editor,
    Note,
    Category,
}

impl EntityKind {
    pub const ALL: [EntityKind; 4] = [
        EntityKind::Reader,
        EntityKind::Editor,
        EntityKind::Note,
        EntityKind::Category,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Reader => "reader",
            Self::Editor => "editor",
            Self::Note => "note",
            Self::Category => "category",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim() {
            "reader" => Some(Self::Reader),
            "editor" => Some(Self::Editor),
            "note" => Some(Self::Note),
            "category" => Some(Self::Category),
            _ => None,
        }
    }
}

impl Display for EntityKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Any domain object the persistence core can be asked to handle.
#[derive(Debug, Clone)]
pub enum Entity {
    Reader(Reader),
    Editor(Editor),
    Note(Note),
    Category(Category),
}

impl Entity {
    pub fn kind(&self) -> EntityKind {
        match self {
            Self::Reader(_) => EntityKind::Reader,
            Self::Editor(_) => EntityKind::Editor,
            Self::Note(_) => EntityKind::Note,
            Self::Category(_) => EntityKind::Category,
        }
    }

    pub fn id(&self) -> Option<EntityId> {
        match self {
            Self::Reader(value) => value.id,
            Self::Editor(value) => value.id,
            Self::Note(value) => value.id,
            Self::Category(value) => value.id,
        }
    }

    /// Whether `self` and `other` denote the same domain object.
    ///
    /// Persisted objects compare by `(kind, id)`. Unsaved notes compare by
    /// note equality; other unsaved objects never match anything, so two
    /// readers that share a name stay two objects.
    pub fn same_object(&self, other: &Entity) -> bool {
        if self.kind() != other.kind() {
            return false;
        }
        match (self.id(), other.id()) {
            (Some(left), Some(right)) => return left == right,
            (None, None) => {}
            _ => return false,
        }
        match (self, other) {
            (Self::Note(left), Self::Note(right)) => left.same_content(right),
            _ => false,
        }
    }

    pub fn as_note(&self) -> Option<&Note> {
        match self {
            Self::Note(value) => Some(value),
            _ => None,
        }
    }

    pub fn into_note(self) -> Option<Note> {
        match self {
            Self::Note(value) => Some(value),
            _ => None,
        }
    }

    pub fn into_reader(self) -> Option<Reader> {
        match self {
            Self::Reader(value) => Some(value),
            _ => None,
        }
    }

    pub fn into_category(self) -> Option<Category> {
        match self {
            Self::Category(value) => Some(value),
            _ => None,
        }
    }
}

impl From<Reader> for Entity {
    fn from(value: Reader) -> Self {
        Self::Reader(value)
    }
}

impl From<Editor> for Entity {
    fn from(value: Editor) -> Self {
        Self::Editor(value)
    }
}

impl From<Note> for Entity {
    fn from(value: Note) -> Self {
        Self::Note(value)
    }
}

impl From<Category> for Entity {
    fn from(value: Category) -> Self {
        Self::Category(value)
    }
}

impl From<User> for Entity {
    fn from(value: User) -> Self {
        match value {
            User::Reader(reader) => Self::Reader(reader),
            User::Editor(editor) => Self::Editor(editor),
        }
    }
}
