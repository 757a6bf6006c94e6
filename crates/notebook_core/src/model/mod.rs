//! Domain model for readers, notes and categories.
//!
//! # Responsibility
//! - Define plain data holders reconstructed by mappers on every read.
//! - Keep structural note equality separate from id-based lookup.
//!
//! # Invariants
//! - A category's `notes` only contain notes whose `category` points back to it.
//! - Category parents form a tree; a category is never its own ancestor.
//! - Mappers own no domain objects; every read returns fresh instances.

pub mod category;
pub mod entity;
pub mod note;
pub mod user;

pub use category::Category;
pub use entity::{Entity, EntityKind};
pub use note::{find_note, push_unique, CategoryRef, Note, ReaderRef};
pub use user::{create_user, Editor, Reader, User, UserKind};
