use notebook_core::db::Storage;
use notebook_core::mapper::MapperError;
use notebook_core::model::{create_user, Category, Entity, EntityKind, Note, UserKind};
use notebook_core::registry::{MapperRegistry, RegistryError};

#[test]
fn for_instance_dispatches_on_entity_kind() {
    let storage = Storage::sqlite(notebook_core::db::open_db_in_memory().unwrap());
    let registry = MapperRegistry::new(&storage);

    let category = Entity::from(Category::new("c", None));
    let reader = Entity::from(create_user(UserKind::Reader, "ann"));
    assert_eq!(
        registry.for_instance(&category).unwrap().kind(),
        EntityKind::Category
    );
    assert_eq!(
        registry.for_instance(&reader).unwrap().kind(),
        EntityKind::Reader
    );
}

#[test]
fn editor_instances_are_unmapped() {
    let storage = Storage::memory();
    let registry = MapperRegistry::new(&storage);
    let editor = Entity::from(create_user(UserKind::Editor, "bob"));

    let err = registry.for_instance(&editor).err().unwrap();
    assert_eq!(err, RegistryError::UnmappedType(EntityKind::Editor));
}

#[test]
fn unknown_kind_name_is_rejected() {
    let storage = Storage::memory();
    let err = MapperRegistry::new(&storage)
        .for_name("course")
        .err()
        .unwrap();
    assert_eq!(err, RegistryError::UnknownEntityKind("course".to_string()));
}

#[test]
fn mappers_from_registry_share_one_connection() {
    let storage = Storage::sqlite(notebook_core::db::open_db_in_memory().unwrap());
    let registry = MapperRegistry::new(&storage);

    let mut category = Entity::from(Category::new("common", None));
    let category_id = registry
        .for_name("category")
        .unwrap()
        .insert(&mut category)
        .unwrap();
    assert_eq!(category.id(), Some(category_id));

    let category = category.into_category().unwrap();
    let mut note = Entity::from(Note::new("n", "d", &category));
    registry.for_instance(&note).unwrap().insert(&mut note).unwrap();

    let all = registry.for_name("note").unwrap().all().unwrap();
    assert_eq!(all.len(), 1);
    assert_eq!(all[0].kind(), EntityKind::Note);
    let found = registry
        .for_name("note")
        .unwrap()
        .find_by_id(note.id().unwrap())
        .unwrap();
    assert!(found.same_object(&note));
}

#[test]
fn generic_mapper_rejects_other_kinds() {
    let storage = Storage::memory();
    let registry = MapperRegistry::new(&storage);
    let mapper = registry.for_name("category").unwrap();
    let mut reader = Entity::from(create_user(UserKind::Reader, "ann"));

    let err = mapper.insert(&mut reader).unwrap_err();
    assert!(matches!(
        err,
        MapperError::KindMismatch {
            mapper: EntityKind::Category,
            entity: EntityKind::Reader
        }
    ));
}
