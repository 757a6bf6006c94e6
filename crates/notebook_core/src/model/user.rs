//! User domain model and factory.
//!
//! # Invariants
//! - Only readers are persisted. Editors exist in memory only.
//! - `Reader::notes` is a back-reference list, not ownership.

use crate::identity::EntityId;
use crate::model::note::Note;
use serde::{Deserialize, Serialize};

/// Note reader.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reader {
    /// Assigned by storage on insert.
    pub id: Option<EntityId>,
    pub name: String,
    /// Notes linked to this reader, ordered by note id on read.
    pub notes: Vec<Note>,
}

impl Reader {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: None,
            name: name.into(),
            notes: Vec::new(),
        }
    }
}

/// Note editor. Has no persistence mapping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Editor {
    pub id: Option<EntityId>,
    pub name: String,
}

/// User kinds known by the factory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserKind {
    Reader,
    Editor,
}

impl UserKind {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim() {
            "reader" => Some(Self::Reader),
            "editor" => Some(Self::Editor),
            _ => None,
        }
    }
}

/// Factory product.
#[derive(Debug, Clone)]
pub enum User {
    Reader(Reader),
    Editor(Editor),
}

/// Creates an unsaved user of the requested kind.
pub fn create_user(kind: UserKind, name: impl Into<String>) -> User {
    let name = name.into();
    match kind {
        UserKind::Reader => User::Reader(Reader::new(name)),
        UserKind::Editor => User::Editor(Editor { id: None, name }),
    }
}

#[cfg(test)]
mod tests {
    use super::{create_user, User, UserKind};

    #[test]
    fn factory_builds_requested_kind() {
        match create_user(UserKind::Reader, "ann") {
            User::Reader(reader) => {
                assert_eq!(reader.name, "ann");
                assert!(reader.id.is_none());
                assert!(reader.notes.is_empty());
            }
            other => panic!("unexpected user: {other:?}"),
        }
        assert!(matches!(
            create_user(UserKind::Editor, "bob"),
            User::Editor(_)
        ));
    }

    #[test]
    fn parse_accepts_known_kinds_only() {
        assert_eq!(UserKind::parse(" reader "), Some(UserKind::Reader));
        assert_eq!(UserKind::parse("editor"), Some(UserKind::Editor));
        assert_eq!(UserKind::parse("admin"), None);
    }
}
