//! Identity and change-tracking primitives.
//!
//! # Responsibility
//! - Define the integer identity shared by every persisted entity.
//! - Define per-object lifecycle tags used by the unit of work.
//! - Provide the max-plus-one id scan used by storage without auto-increment.
//!
//! # Invariants
//! - Identities are positive and unique among live rows of one kind. Ids of
//!   deleted rows may be handed out again (max-plus-one, SQLite rowid).
//! - One storage backend uses exactly one `IdAllocation` scheme.

use serde::{Deserialize, Serialize};

/// Stable integer identity assigned by storage.
pub type EntityId = i64;

/// Lifecycle tag of one object observed by a unit of work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectState {
    /// No pending action.
    Clean,
    /// Needs insert.
    New,
    /// Needs update.
    Dirty,
    /// Needs delete.
    Removed,
}

impl ObjectState {
    /// Commit replay order. `Clean` objects are never replayed.
    pub const COMMIT_ORDER: [ObjectState; 3] =
        [ObjectState::New, ObjectState::Dirty, ObjectState::Removed];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Clean => "clean",
            Self::New => "new",
            Self::Dirty => "dirty",
            Self::Removed => "removed",
        }
    }
}

/// Numbering scheme used by a storage backend for new rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdAllocation {
    /// Storage generates the id on insert (SQLite rowid).
    StorageAssigned,
    /// Next id is `max(existing ids) + 1`, computed in memory.
    MaxPlusOne,
}

/// Returns `max(ids) + 1`, or `1` when `ids` is empty.
///
/// Callers pass every id that is already taken, including ids referenced from
/// nested per-parent lists that may not appear in the flat table.
pub fn next_id_after<I>(ids: I) -> EntityId
where
    I: IntoIterator<Item = EntityId>,
{
    ids.into_iter().max().map_or(1, |max| max + 1)
}

#[cfg(test)]
mod tests {
    use super::{next_id_after, ObjectState};

    #[test]
    fn next_id_starts_at_one_for_empty_input() {
        assert_eq!(next_id_after(Vec::new()), 1);
    }

    #[test]
    fn next_id_uses_maximum_not_count() {
        assert_eq!(next_id_after([3, 9, 4]), 10);
    }

    #[test]
    fn next_id_sees_ids_from_chained_sources() {
        let flat = vec![1, 2];
        let nested = vec![vec![7], vec![3, 5]];
        let next = next_id_after(flat.into_iter().chain(nested.into_iter().flatten()));
        assert_eq!(next, 8);
    }

    #[test]
    fn commit_order_is_new_dirty_removed() {
        assert_eq!(
            ObjectState::COMMIT_ORDER,
            [ObjectState::New, ObjectState::Dirty, ObjectState::Removed]
        );
    }
}
