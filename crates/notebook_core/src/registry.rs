//! Mapper lookup by object or kind name.
//!
//! # Responsibility
//! - Hand out mappers bound to the one storage backend.
//! - Dispatch on `EntityKind`, never on runtime type inspection.
//!
//! # Invariants
//! - The registry holds no per-call state; constructing mappers opens
//!   nothing and is cheap.
//! - Editors have no mapping and fail with `UnmappedType`.

use crate::db::Storage;
use crate::identity::EntityId;
use crate::mapper::{
    CategoryMapper, MapperError, MapperResult, MemoryCategoryMapper, MemoryNoteMapper,
    MemoryReaderMapper, NoteMapper, ReaderMapper, SqliteCategoryMapper, SqliteNoteMapper,
    SqliteReaderMapper,
};
use crate::model::{Entity, EntityKind};
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type RegistryResult<T> = Result<T, RegistryError>;

/// Registry misuse. Indicates a programming error in the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    /// The kind exists but has no persistence mapping.
    UnmappedType(EntityKind),
    /// The kind name is not recognized.
    UnknownEntityKind(String),
}

impl Display for RegistryError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnmappedType(kind) => write!(f, "no mapper registered for {kind}"),
            Self::UnknownEntityKind(name) => write!(f, "unknown entity kind `{name}`"),
        }
    }
}

impl Error for RegistryError {}

/// Resolves mappers over one storage backend.
#[derive(Debug, Clone, Copy)]
pub struct MapperRegistry<'s> {
    storage: &'s Storage,
}

impl<'s> MapperRegistry<'s> {
    pub fn new(storage: &'s Storage) -> Self {
        Self { storage }
    }

    pub fn storage(&self) -> &'s Storage {
        self.storage
    }

    pub fn readers(&self) -> Box<dyn ReaderMapper + 's> {
        match self.storage {
            Storage::Sqlite(conn) => Box::new(SqliteReaderMapper::new(conn)),
            Storage::Memory(store) => Box::new(MemoryReaderMapper::new(store)),
        }
    }

    pub fn notes(&self) -> Box<dyn NoteMapper + 's> {
        match self.storage {
            Storage::Sqlite(conn) => Box::new(SqliteNoteMapper::new(conn)),
            Storage::Memory(store) => Box::new(MemoryNoteMapper::new(store)),
        }
    }

    pub fn categories(&self) -> Box<dyn CategoryMapper + 's> {
        match self.storage {
            Storage::Sqlite(conn) => Box::new(SqliteCategoryMapper::new(conn)),
            Storage::Memory(store) => Box::new(MemoryCategoryMapper::new(store)),
        }
    }

    /// Mapper for the kind of `entity`.
    pub fn for_instance(&self, entity: &Entity) -> RegistryResult<Mapper<'s>> {
        self.for_kind(entity.kind())
    }

    /// Mapper for a kind name such as `"note"`.
    pub fn for_name(&self, name: &str) -> RegistryResult<Mapper<'s>> {
        let kind = EntityKind::parse(name)
            .ok_or_else(|| RegistryError::UnknownEntityKind(name.to_string()))?;
        self.for_kind(kind)
    }

    pub fn for_kind(&self, kind: EntityKind) -> RegistryResult<Mapper<'s>> {
        match kind {
            EntityKind::Reader => Ok(Mapper::Reader(self.readers())),
            EntityKind::Note => Ok(Mapper::Note(self.notes())),
            EntityKind::Category => Ok(Mapper::Category(self.categories())),
            EntityKind::Editor => Err(RegistryError::UnmappedType(kind)),
        }
    }
}

/// A mapper for one kind, operating on `Entity` values.
pub enum Mapper<'s> {
    Reader(Box<dyn ReaderMapper + 's>),
    Note(Box<dyn NoteMapper + 's>),
    Category(Box<dyn CategoryMapper + 's>),
}

impl Mapper<'_> {
    pub fn kind(&self) -> EntityKind {
        match self {
            Self::Reader(_) => EntityKind::Reader,
            Self::Note(_) => EntityKind::Note,
            Self::Category(_) => EntityKind::Category,
        }
    }

    pub fn all(&self) -> MapperResult<Vec<Entity>> {
        Ok(match self {
            Self::Reader(mapper) => mapper.all()?.into_iter().map(Entity::from).collect(),
            Self::Note(mapper) => mapper.all()?.into_iter().map(Entity::from).collect(),
            Self::Category(mapper) => mapper.all()?.into_iter().map(Entity::from).collect(),
        })
    }

    pub fn find_by_id(&self, id: EntityId) -> MapperResult<Entity> {
        Ok(match self {
            Self::Reader(mapper) => mapper.find_by_id(id)?.into(),
            Self::Note(mapper) => mapper.find_by_id(id)?.into(),
            Self::Category(mapper) => mapper.find_by_id(id)?.into(),
        })
    }

    /// Inserts `entity` and writes the assigned id back onto it.
    pub fn insert(&self, entity: &mut Entity) -> MapperResult<EntityId> {
        match (self, entity) {
            (Self::Reader(mapper), Entity::Reader(reader)) => mapper.insert(reader),
            (Self::Note(mapper), Entity::Note(note)) => mapper.insert(note),
            (Self::Category(mapper), Entity::Category(category)) => mapper.insert(category),
            (mapper, entity) => Err(mapper.mismatch(entity)),
        }
    }

    pub fn update(&self, entity: &Entity) -> MapperResult<()> {
        match (self, entity) {
            (Self::Reader(mapper), Entity::Reader(reader)) => mapper.update(reader),
            (Self::Note(mapper), Entity::Note(note)) => mapper.update(note),
            (Self::Category(mapper), Entity::Category(category)) => mapper.update(category),
            (mapper, entity) => Err(mapper.mismatch(entity)),
        }
    }

    pub fn delete(&self, entity: &Entity) -> MapperResult<()> {
        match (self, entity) {
            (Self::Reader(mapper), Entity::Reader(reader)) => mapper.delete(reader),
            (Self::Note(mapper), Entity::Note(note)) => mapper.delete(note),
            (Self::Category(mapper), Entity::Category(category)) => mapper.delete(category),
            (mapper, entity) => Err(mapper.mismatch(entity)),
        }
    }

    fn mismatch(&self, entity: &Entity) -> MapperError {
        MapperError::KindMismatch {
            mapper: self.kind(),
            entity: entity.kind(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{MapperRegistry, RegistryError};
    use crate::db::Storage;
    use crate::model::{EntityKind, Reader};

    #[test]
    fn for_name_resolves_every_mapped_kind() {
        let storage = Storage::memory();
        let registry = MapperRegistry::new(&storage);
        for name in ["reader", "note", "category"] {
            let mapper = registry.for_name(name).expect("mapped kind");
            assert_eq!(mapper.kind().as_str(), name);
        }
    }

    #[test]
    fn editor_and_unknown_names_fail_differently() {
        let storage = Storage::memory();
        let registry = MapperRegistry::new(&storage);
        assert!(matches!(
            registry.for_name("editor"),
            Err(RegistryError::UnmappedType(EntityKind::Editor))
        ));
        assert!(matches!(
            registry.for_name("course"),
            Err(RegistryError::UnknownEntityKind(name)) if name == "course"
        ));
    }

    #[test]
    fn mapper_rejects_entity_of_other_kind() {
        let storage = Storage::memory();
        let registry = MapperRegistry::new(&storage);
        let mapper = registry.for_name("note").expect("note mapper");
        let mut entity = Reader::new("ann").into();
        let err = mapper.insert(&mut entity).expect_err("kind mismatch");
        assert!(err.to_string().contains("note mapper cannot handle reader"));
    }
}
