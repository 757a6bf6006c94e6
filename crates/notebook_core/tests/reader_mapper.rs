use notebook_core::db::open_db_in_memory;
use notebook_core::mapper::{
    CategoryMapper, NoteMapper, ReaderMapper, SqliteCategoryMapper, SqliteNoteMapper,
    SqliteReaderMapper,
};
use notebook_core::model::{Category, Note, Reader};

#[test]
fn reader_without_notes_is_listed_with_empty_notes() {
    let conn = open_db_in_memory().unwrap();
    let readers = SqliteReaderMapper::new(&conn);
    let mut reader = Reader::new("ann");
    readers.insert(&mut reader).unwrap();

    let all = readers.all().unwrap();
    assert_eq!(all.len(), 1);
    assert_eq!(all[0].name, "ann");
    assert!(all[0].notes.is_empty());
}

#[test]
fn reader_lists_linked_notes_in_id_order() {
    let conn = open_db_in_memory().unwrap();
    let mut category = Category::new("c", None);
    SqliteCategoryMapper::new(&conn).insert(&mut category).unwrap();
    let notes = SqliteNoteMapper::new(&conn);
    let readers = SqliteReaderMapper::new(&conn);

    let mut reader = Reader::new("ann");
    let reader_id = readers.insert(&mut reader).unwrap();
    for name in ["b", "a"] {
        let mut note = Note::new(name, "d", &category);
        note.assign_reader(&reader);
        notes.insert(&mut note).unwrap();
    }
    notes.insert(&mut Note::new("unlinked", "d", &category)).unwrap();

    let loaded = readers.find_by_id(reader_id).unwrap();
    let names = loaded
        .notes
        .iter()
        .map(|note| note.name.as_str())
        .collect::<Vec<_>>();
    assert_eq!(names, vec!["b", "a"]);
    assert!(loaded
        .notes
        .iter()
        .all(|note| note.reader_id() == Some(reader_id)));
}

#[test]
fn update_renames_reader() {
    let conn = open_db_in_memory().unwrap();
    let readers = SqliteReaderMapper::new(&conn);
    let mut reader = Reader::new("ann");
    readers.insert(&mut reader).unwrap();

    reader.name = "anna".to_string();
    readers.update(&reader).unwrap();
    assert_eq!(readers.find_by_id(reader.id.unwrap()).unwrap().name, "anna");
}

#[test]
fn delete_keeps_notes_and_clears_their_reader() {
    let conn = open_db_in_memory().unwrap();
    let mut category = Category::new("c", None);
    SqliteCategoryMapper::new(&conn).insert(&mut category).unwrap();
    let notes = SqliteNoteMapper::new(&conn);
    let readers = SqliteReaderMapper::new(&conn);

    let mut reader = Reader::new("ann");
    readers.insert(&mut reader).unwrap();
    let mut note = Note::new("n", "d", &category);
    note.assign_reader(&reader);
    notes.insert(&mut note).unwrap();

    readers.delete(&reader).unwrap();

    assert!(readers.find_by_id(reader.id.unwrap()).unwrap_err().is_not_found());
    let kept = notes.find_by_id(note.id.unwrap()).unwrap();
    assert_eq!(kept.reader, None);
}
