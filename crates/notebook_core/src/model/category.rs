//! Category domain model.
//!
//! # Invariants
//! - `notes` only holds notes whose `category` reference names this category.
//! - `notes_count` is derived and never stored.

use crate::identity::EntityId;
use crate::model::note::{push_unique, CategoryRef, Note};
use serde::{Deserialize, Serialize};

/// Note category with optional parent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Category {
    /// Assigned by storage on insert.
    pub id: Option<EntityId>,
    pub name: String,
    /// Parent snapshot. Categories form a tree.
    pub parent: Option<Box<Category>>,
    pub notes: Vec<Note>,
}

impl Category {
    /// Creates an unsaved category under an optional parent.
    pub fn new(name: impl Into<String>, parent: Option<&Category>) -> Self {
        Self {
            id: None,
            name: name.into(),
            parent: parent.map(|value| Box::new(value.clone())),
            notes: Vec::new(),
        }
    }

    pub fn parent_id(&self) -> Option<EntityId> {
        self.parent.as_ref().and_then(|parent| parent.id)
    }

    /// Own notes plus the recursive count of the parent chain.
    pub fn notes_count(&self) -> usize {
        let own = self.notes.len();
        match self.parent.as_deref() {
            Some(parent) => own + parent.notes_count(),
            None => own,
        }
    }

    /// Re-points `note` at this category and appends it.
    ///
    /// Returns `false` when an equal note is already attached.
    pub fn attach(&mut self, mut note: Note) -> bool {
        note.category = CategoryRef::from(&*self);
        push_unique(&mut self.notes, note)
    }

    /// Light reference used by notes.
    pub fn to_ref(&self) -> CategoryRef {
        CategoryRef::from(self)
    }
}
