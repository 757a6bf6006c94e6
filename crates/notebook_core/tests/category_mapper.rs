use notebook_core::db::{open_db_in_memory, Storage};
use notebook_core::mapper::{
    CategoryMapper, MapperError, NoteMapper, SqliteCategoryMapper, SqliteNoteMapper,
};
use notebook_core::model::{Category, EntityKind, Note};
use notebook_core::registry::MapperRegistry;

#[test]
fn all_groups_notes_under_their_category() {
    let conn = open_db_in_memory().unwrap();
    let categories = SqliteCategoryMapper::new(&conn);
    let notes = SqliteNoteMapper::new(&conn);

    let mut work = Category::new("work", None);
    let mut home = Category::new("home", None);
    categories.insert(&mut work).unwrap();
    categories.insert(&mut home).unwrap();
    notes.insert(&mut Note::new("a", "d", &home)).unwrap();
    notes.insert(&mut Note::new("b", "d", &work)).unwrap();
    notes.insert(&mut Note::new("c", "d", &home)).unwrap();

    let all = categories.all().unwrap();
    assert_eq!(all.len(), 2);
    assert_eq!(all[0].name, "work");
    assert_eq!(all[0].notes.len(), 1);
    assert_eq!(all[1].name, "home");
    let home_notes = all[1]
        .notes
        .iter()
        .map(|note| note.name.as_str())
        .collect::<Vec<_>>();
    assert_eq!(home_notes, vec!["a", "c"]);
    assert!(all[1]
        .notes
        .iter()
        .all(|note| note.category.id == all[1].id));
}

#[test]
fn equal_notes_are_listed_once_per_category() {
    let conn = open_db_in_memory().unwrap();
    let categories = SqliteCategoryMapper::new(&conn);
    let notes = SqliteNoteMapper::new(&conn);

    let mut category = Category::new("dup", None);
    categories.insert(&mut category).unwrap();
    notes.insert(&mut Note::new("same", "d", &category)).unwrap();
    notes.insert(&mut Note::new("same", "d", &category)).unwrap();

    assert_eq!(notes.all().unwrap().len(), 2);
    let loaded = categories.find_by_id(category.id.unwrap()).unwrap();
    assert_eq!(loaded.notes.len(), 1);
}

#[test]
fn find_by_id_loads_full_parent_chain_for_notes_count() {
    let conn = open_db_in_memory().unwrap();
    let categories = SqliteCategoryMapper::new(&conn);
    let notes = SqliteNoteMapper::new(&conn);

    let mut root = Category::new("root", None);
    categories.insert(&mut root).unwrap();
    let mut middle = Category::new("middle", Some(&root));
    categories.insert(&mut middle).unwrap();
    let mut leaf = Category::new("leaf", Some(&middle));
    categories.insert(&mut leaf).unwrap();

    for (category, count) in [(&root, 2), (&middle, 1), (&leaf, 3)] {
        for index in 0..count {
            notes
                .insert(&mut Note::new(format!("{}-{index}", category.name), "d", category))
                .unwrap();
        }
    }

    let loaded = categories.find_by_id(leaf.id.unwrap()).unwrap();
    assert_eq!(loaded.notes.len(), 3);
    assert_eq!(loaded.parent_id(), middle.id);
    let parent = loaded.parent.as_deref().unwrap();
    assert_eq!(parent.parent_id(), root.id);
    assert_eq!(loaded.notes_count(), 6);
}

#[test]
fn find_by_id_on_missing_row_is_record_not_found() {
    let conn = open_db_in_memory().unwrap();
    let err = SqliteCategoryMapper::new(&conn).find_by_id(12).unwrap_err();
    assert!(matches!(
        err,
        MapperError::RecordNotFound {
            kind: EntityKind::Category,
            id: 12
        }
    ));
}

#[test]
fn insert_under_unsaved_parent_is_rejected() {
    let conn = open_db_in_memory().unwrap();
    let parent = Category::new("unsaved", None);
    let mut child = Category::new("child", Some(&parent));

    let err = SqliteCategoryMapper::new(&conn).insert(&mut child).unwrap_err();
    assert!(matches!(err, MapperError::NotPersisted(EntityKind::Category)));
    assert_eq!(child.id, None);
}

#[test]
fn update_renames_and_reparents() {
    let conn = open_db_in_memory().unwrap();
    let categories = SqliteCategoryMapper::new(&conn);
    let mut root = Category::new("root", None);
    categories.insert(&mut root).unwrap();
    let mut other = Category::new("other", None);
    categories.insert(&mut other).unwrap();

    other.name = "renamed".to_string();
    other.parent = Some(Box::new(root.clone()));
    categories.update(&other).unwrap();

    let loaded = categories.find_by_id(other.id.unwrap()).unwrap();
    assert_eq!(loaded.name, "renamed");
    assert_eq!(loaded.parent_id(), root.id);
}

#[test]
fn delete_detaches_children_and_hides_orphaned_notes() {
    let conn = open_db_in_memory().unwrap();
    let categories = SqliteCategoryMapper::new(&conn);
    let notes = SqliteNoteMapper::new(&conn);

    let mut parent = Category::new("parent", None);
    categories.insert(&mut parent).unwrap();
    let mut child = Category::new("child", Some(&parent));
    categories.insert(&mut child).unwrap();
    notes.insert(&mut Note::new("n", "d", &parent)).unwrap();

    categories.delete(&parent).unwrap();

    let remaining = categories.all().unwrap();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].parent_id(), None);
    assert!(notes.all().unwrap().is_empty());
    assert!(categories.delete(&parent).unwrap_err().is_not_found());
}

#[test]
fn update_refuses_to_place_category_under_itself_or_a_descendant() {
    let backends = [
        Storage::sqlite(open_db_in_memory().unwrap()),
        Storage::memory(),
    ];
    for storage in &backends {
        let categories = MapperRegistry::new(storage).categories();
        let mut root = Category::new("root", None);
        categories.insert(&mut root).unwrap();
        let mut child = Category::new("child", Some(&root));
        categories.insert(&mut child).unwrap();
        let mut grandchild = Category::new("grandchild", Some(&child));
        categories.insert(&mut grandchild).unwrap();

        let mut looped = root.clone();
        looped.parent = Some(Box::new(grandchild.clone()));
        let err = categories.update(&looped).unwrap_err();
        assert!(
            matches!(err, MapperError::ParentCycle { id, parent_id }
                if Some(id) == root.id && Some(parent_id) == grandchild.id),
            "backend {}: {err}",
            storage.backend_name()
        );

        let mut own_parent = child.clone();
        own_parent.parent = Some(Box::new(child.clone()));
        assert!(matches!(
            categories.update(&own_parent).unwrap_err(),
            MapperError::ParentCycle { .. }
        ));

        let all = categories.all().unwrap();
        assert_eq!(all.len(), 3, "backend {}", storage.backend_name());
        assert_eq!(all[0].parent_id(), None);
        assert_eq!(
            categories.find_by_id(grandchild.id.unwrap()).unwrap().notes_count(),
            0
        );
    }
}
