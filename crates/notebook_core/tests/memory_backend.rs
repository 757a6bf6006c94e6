use notebook_core::config::BackendConfig;
use notebook_core::db::Storage;
use notebook_core::identity::IdAllocation;
use notebook_core::mapper::{CategoryMapper, NoteMapper, ReaderMapper};
use notebook_core::model::{Category, Note, Reader};
use notebook_core::registry::MapperRegistry;
use notebook_core::unit_of_work::UnitOfWork;

/// Runs one scripted session and returns a comparable summary of all reads.
fn session_summary(storage: &Storage) -> Vec<String> {
    let registry = MapperRegistry::new(storage);

    let mut uow = UnitOfWork::new(registry);
    uow.mark_new(Category::new("root", None));
    uow.mark_new(Reader::new("ann"));
    uow.commit().unwrap();

    let root = registry.categories().find_by_id(1).unwrap();
    let reader = registry.readers().find_by_id(1).unwrap();
    let mut uow = UnitOfWork::new(registry);
    uow.mark_new(Category::new("child", Some(&root)));
    let mut linked = Note::new("first", "d", &root);
    linked.assign_reader(&reader);
    uow.mark_new(linked);
    uow.mark_new(Note::new("second", "d", &root));
    uow.commit().unwrap();

    let mut summary = Vec::new();
    for category in registry.categories().all().unwrap() {
        summary.push(format!(
            "category {:?} {} parent={:?} notes={} count={}",
            category.id,
            category.name,
            category.parent_id(),
            category.notes.len(),
            category.notes_count()
        ));
    }
    for note in registry.notes().all().unwrap() {
        summary.push(format!(
            "note {:?} {} category={:?} reader={:?}",
            note.id, note.name, note.category.id, note.reader_id()
        ));
    }
    for reader in registry.readers().all().unwrap() {
        summary.push(format!(
            "reader {:?} {} notes={}",
            reader.id,
            reader.name,
            reader.notes.len()
        ));
    }
    summary
}

#[test]
fn memory_and_sqlite_backends_return_identical_graphs() {
    let sqlite = Storage::open(&BackendConfig::SqliteMemory).unwrap();
    let memory = Storage::open(&BackendConfig::Memory).unwrap();
    assert_eq!(sqlite.id_allocation(), IdAllocation::StorageAssigned);
    assert_eq!(memory.id_allocation(), IdAllocation::MaxPlusOne);

    let expected = session_summary(&sqlite);
    assert_eq!(session_summary(&memory), expected);
    assert_eq!(
        expected[1],
        "category Some(2) child parent=Some(1) notes=0 count=2"
    );
}

#[test]
fn memory_ids_follow_max_plus_one_across_deletes() {
    let storage = Storage::memory();
    let registry = MapperRegistry::new(&storage);
    let categories = registry.categories();
    let notes = registry.notes();

    let mut category = Category::new("c", None);
    categories.insert(&mut category).unwrap();
    let mut first = Note::new("a", "d", &category);
    let mut second = Note::new("b", "d", &category);
    notes.insert(&mut first).unwrap();
    notes.insert(&mut second).unwrap();
    assert_eq!((first.id, second.id), (Some(1), Some(2)));

    notes.delete(&first).unwrap();
    let mut third = Note::new("c", "d", &category);
    notes.insert(&mut third).unwrap();
    assert_eq!(third.id, Some(3));

    notes.delete(&second).unwrap();
    notes.delete(&third).unwrap();
    let mut fresh = Note::new("d", "d", &category);
    notes.insert(&mut fresh).unwrap();
    assert_eq!(fresh.id, Some(1));
}

#[test]
fn memory_storage_transaction_restores_tables_on_rollback() {
    let storage = Storage::memory();
    let registry = MapperRegistry::new(&storage);
    registry.readers().insert(&mut Reader::new("kept")).unwrap();

    let tx = storage.begin().unwrap();
    registry.readers().insert(&mut Reader::new("dropped")).unwrap();
    assert_eq!(registry.readers().all().unwrap().len(), 2);
    drop(tx);

    let readers = registry.readers().all().unwrap();
    assert_eq!(readers.len(), 1);
    assert_eq!(readers[0].name, "kept");
}
