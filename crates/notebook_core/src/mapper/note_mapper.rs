//! Note mapper contract and SQLite implementation.
//!
//! # Responsibility
//! - Persist notes together with their `note_to_category` link row.
//! - Maintain the optional note -> reader link (`note.user_id`).
//!
//! # Invariants
//! - Insert writes the note row, reads back the generated id, then writes the
//!   link row with that id. The id is assigned onto the note only on success.
//! - Reads join note, link, category and reader in one statement ordered by
//!   note id; notes without a category link are not returned.

use crate::identity::EntityId;
use crate::mapper::rows::{hydrate_notes, NoteRow};
use crate::mapper::sql::{collect_rows, write_scope};
use crate::mapper::{MapperError, MapperResult};
use crate::model::{EntityKind, Note};
use log::debug;
use rusqlite::{params, Connection, Row};

const NOTE_SELECT_SQL: &str = "SELECT
    n.id AS note_id,
    n.name AS note_name,
    n.description AS note_description,
    c.id AS category_id,
    c.name AS category_name,
    r.id AS reader_id,
    r.name AS reader_name
FROM note n
INNER JOIN note_to_category nc ON nc.note_id = n.id
INNER JOIN category c ON c.id = nc.category_id
LEFT JOIN reader r ON r.id = n.user_id";

/// Mapper interface for notes.
pub trait NoteMapper {
    /// All notes ordered by id.
    fn all(&self) -> MapperResult<Vec<Note>>;
    /// One note, or `RecordNotFound`.
    fn find_by_id(&self, id: EntityId) -> MapperResult<Note>;
    /// Inserts the note and its category link; assigns `note.id`.
    fn insert(&self, note: &mut Note) -> MapperResult<EntityId>;
    /// Rewrites the note row and its category link.
    fn update(&self, note: &Note) -> MapperResult<()>;
    /// Deletes the note and its category links.
    fn delete(&self, note: &Note) -> MapperResult<()>;
    /// Notes linked to one category, ordered by note id.
    fn get_by_category_id(&self, category_id: EntityId) -> MapperResult<Vec<Note>>;
    /// Points one note at a reader.
    fn update_user_id(&self, note_id: EntityId, user_id: EntityId) -> MapperResult<()>;
    /// Detaches a reader from every note; returns how many notes changed.
    fn clear_user_id(&self, user_id: EntityId) -> MapperResult<usize>;
}

/// SQLite-backed note mapper.
pub struct SqliteNoteMapper<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteNoteMapper<'conn> {
    /// Binds the mapper to a migrated connection. Opens nothing.
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }

    fn load(&self, sql: &str, params: impl rusqlite::Params) -> MapperResult<Vec<Note>> {
        let rows = collect_rows(self.conn, sql, params, parse_note_row)
            .map_err(|err| MapperError::query(EntityKind::Note, err))?;
        debug!(
            "event=mapper_read module=mapper kind=note status=ok rows={}",
            rows.len()
        );
        Ok(hydrate_notes(rows))
    }
}

impl NoteMapper for SqliteNoteMapper<'_> {
    fn all(&self) -> MapperResult<Vec<Note>> {
        self.load(
            &format!("{NOTE_SELECT_SQL} ORDER BY n.id ASC, c.id ASC;"),
            [],
        )
    }

    fn find_by_id(&self, id: EntityId) -> MapperResult<Note> {
        self.load(
            &format!("{NOTE_SELECT_SQL} WHERE n.id = ?1 ORDER BY c.id ASC;"),
            [id],
        )?
        .into_iter()
        .next()
        .ok_or(MapperError::RecordNotFound {
            kind: EntityKind::Note,
            id,
        })
    }

    fn insert(&self, note: &mut Note) -> MapperResult<EntityId> {
        let category_id = note
            .category
            .id
            .ok_or(MapperError::NotPersisted(EntityKind::Category))?;
        let user_id = linked_reader_id(note)?;

        let id = write_scope(self.conn, |conn| {
            conn.execute(
                "INSERT INTO note (name, description, user_id) VALUES (?1, ?2, ?3);",
                params![note.name.as_str(), note.description.as_str(), user_id],
            )?;
            let id = conn.last_insert_rowid();
            conn.execute(
                "INSERT INTO note_to_category (note_id, category_id) VALUES (?1, ?2);",
                params![id, category_id],
            )?;
            Ok(id)
        })
        .map_err(|err| MapperError::commit_failed(EntityKind::Note, err))?;

        note.id = Some(id);
        debug!("event=mapper_write module=mapper kind=note op=insert status=ok id={id}");
        Ok(id)
    }

    fn update(&self, note: &Note) -> MapperResult<()> {
        let id = note.id.ok_or(MapperError::NotPersisted(EntityKind::Note))?;
        let category_id = note
            .category
            .id
            .ok_or(MapperError::NotPersisted(EntityKind::Category))?;
        let user_id = linked_reader_id(note)?;

        let changed = write_scope(self.conn, |conn| {
            let changed = conn.execute(
                "UPDATE note
                 SET name = ?2,
                     description = ?3,
                     user_id = ?4
                 WHERE id = ?1;",
                params![id, note.name.as_str(), note.description.as_str(), user_id],
            )?;
            if changed == 0 {
                return Ok(0);
            }
            conn.execute("DELETE FROM note_to_category WHERE note_id = ?1;", [id])?;
            conn.execute(
                "INSERT INTO note_to_category (note_id, category_id) VALUES (?1, ?2);",
                params![id, category_id],
            )?;
            Ok(changed)
        })
        .map_err(|err| MapperError::update_failed(EntityKind::Note, id, err))?;

        if changed == 0 {
            return Err(MapperError::RecordNotFound {
                kind: EntityKind::Note,
                id,
            });
        }
        debug!("event=mapper_write module=mapper kind=note op=update status=ok id={id}");
        Ok(())
    }

    fn delete(&self, note: &Note) -> MapperResult<()> {
        let id = note.id.ok_or(MapperError::NotPersisted(EntityKind::Note))?;

        let changed = write_scope(self.conn, |conn| {
            conn.execute("DELETE FROM note_to_category WHERE note_id = ?1;", [id])?;
            conn.execute("DELETE FROM note WHERE id = ?1;", [id])
        })
        .map_err(|err| MapperError::delete_failed(EntityKind::Note, id, err))?;

        if changed == 0 {
            return Err(MapperError::RecordNotFound {
                kind: EntityKind::Note,
                id,
            });
        }
        debug!("event=mapper_write module=mapper kind=note op=delete status=ok id={id}");
        Ok(())
    }

    fn get_by_category_id(&self, category_id: EntityId) -> MapperResult<Vec<Note>> {
        self.load(
            &format!("{NOTE_SELECT_SQL} WHERE c.id = ?1 ORDER BY n.id ASC;"),
            [category_id],
        )
    }

    fn update_user_id(&self, note_id: EntityId, user_id: EntityId) -> MapperResult<()> {
        let changed = write_scope(self.conn, |conn| {
            conn.execute(
                "UPDATE note SET user_id = ?2 WHERE id = ?1;",
                params![note_id, user_id],
            )
        })
        .map_err(|err| MapperError::update_failed(EntityKind::Note, note_id, err))?;

        if changed == 0 {
            return Err(MapperError::RecordNotFound {
                kind: EntityKind::Note,
                id: note_id,
            });
        }
        debug!(
            "event=mapper_write module=mapper kind=note op=update_user_id status=ok id={note_id} user_id={user_id}"
        );
        Ok(())
    }

    fn clear_user_id(&self, user_id: EntityId) -> MapperResult<usize> {
        let cleared = write_scope(self.conn, |conn| {
            conn.execute("UPDATE note SET user_id = NULL WHERE user_id = ?1;", [user_id])
        })
        .map_err(|err| MapperError::update_failed(EntityKind::Reader, user_id, err))?;

        debug!(
            "event=mapper_write module=mapper kind=note op=clear_user_id status=ok user_id={user_id} cleared={cleared}"
        );
        Ok(cleared)
    }
}

/// Reader id to store in `note.user_id`. A reader link without identity is
/// rejected instead of silently dropped.
pub(crate) fn linked_reader_id(note: &Note) -> MapperResult<Option<EntityId>> {
    match note.reader.as_ref() {
        Some(reader) => reader
            .id
            .map(Some)
            .ok_or(MapperError::NotPersisted(EntityKind::Reader)),
        None => Ok(None),
    }
}

fn parse_note_row(row: &Row<'_>) -> rusqlite::Result<NoteRow> {
    Ok(NoteRow {
        id: row.get("note_id")?,
        name: row.get("note_name")?,
        description: row.get("note_description")?,
        category_id: row.get("category_id")?,
        category_name: row.get("category_name")?,
        reader_id: row.get("reader_id")?,
        reader_name: row.get("reader_name")?,
    })
}
