//! Reader mapper contract and SQLite implementation.
//!
//! # Invariants
//! - Reads return each reader with the notes whose `user_id` points at it.
//! - Deleting a reader clears it from every note before removing the row.

use crate::identity::EntityId;
use crate::mapper::rows::{hydrate_readers, NoteRow, ReaderRow};
use crate::mapper::sql::{collect_rows, write_scope};
use crate::mapper::{MapperError, MapperResult};
use crate::model::{EntityKind, Reader};
use log::debug;
use rusqlite::{params, Connection, Row};

const READER_SELECT_SQL: &str = "SELECT
    r.id AS reader_id,
    r.name AS reader_name,
    n.id AS note_id,
    n.name AS note_name,
    n.description AS note_description,
    c.id AS category_id,
    c.name AS category_name
FROM reader r
LEFT JOIN note n ON n.user_id = r.id
LEFT JOIN note_to_category nc ON nc.note_id = n.id
LEFT JOIN category c ON c.id = nc.category_id";

/// Mapper interface for readers.
pub trait ReaderMapper {
    fn all(&self) -> MapperResult<Vec<Reader>>;
    fn find_by_id(&self, id: EntityId) -> MapperResult<Reader>;
    fn insert(&self, reader: &mut Reader) -> MapperResult<EntityId>;
    fn update(&self, reader: &Reader) -> MapperResult<()>;
    fn delete(&self, reader: &Reader) -> MapperResult<()>;
}

/// SQLite-backed reader mapper.
pub struct SqliteReaderMapper<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteReaderMapper<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }

    fn load(&self, sql: &str, params: impl rusqlite::Params) -> MapperResult<Vec<Reader>> {
        let rows = collect_rows(self.conn, sql, params, parse_reader_row)
            .map_err(|err| MapperError::query(EntityKind::Reader, err))?;
        debug!(
            "event=mapper_read module=mapper kind=reader status=ok rows={}",
            rows.len()
        );
        Ok(hydrate_readers(rows))
    }
}

impl ReaderMapper for SqliteReaderMapper<'_> {
    fn all(&self) -> MapperResult<Vec<Reader>> {
        self.load(
            &format!("{READER_SELECT_SQL} ORDER BY r.id ASC, n.id ASC, c.id ASC;"),
            [],
        )
    }

    fn find_by_id(&self, id: EntityId) -> MapperResult<Reader> {
        self.load(
            &format!("{READER_SELECT_SQL} WHERE r.id = ?1 ORDER BY n.id ASC, c.id ASC;"),
            [id],
        )?
        .into_iter()
        .next()
        .ok_or(MapperError::RecordNotFound {
            kind: EntityKind::Reader,
            id,
        })
    }

    fn insert(&self, reader: &mut Reader) -> MapperResult<EntityId> {
        let id = write_scope(self.conn, |conn| {
            conn.execute(
                "INSERT INTO reader (name) VALUES (?1);",
                [reader.name.as_str()],
            )?;
            Ok(conn.last_insert_rowid())
        })
        .map_err(|err| MapperError::commit_failed(EntityKind::Reader, err))?;

        reader.id = Some(id);
        debug!("event=mapper_write module=mapper kind=reader op=insert status=ok id={id}");
        Ok(id)
    }

    fn update(&self, reader: &Reader) -> MapperResult<()> {
        let id = reader
            .id
            .ok_or(MapperError::NotPersisted(EntityKind::Reader))?;
        let changed = write_scope(self.conn, |conn| {
            conn.execute(
                "UPDATE reader SET name = ?2 WHERE id = ?1;",
                params![id, reader.name.as_str()],
            )
        })
        .map_err(|err| MapperError::update_failed(EntityKind::Reader, id, err))?;

        if changed == 0 {
            return Err(MapperError::RecordNotFound {
                kind: EntityKind::Reader,
                id,
            });
        }
        debug!("event=mapper_write module=mapper kind=reader op=update status=ok id={id}");
        Ok(())
    }

    fn delete(&self, reader: &Reader) -> MapperResult<()> {
        let id = reader
            .id
            .ok_or(MapperError::NotPersisted(EntityKind::Reader))?;
        let changed = write_scope(self.conn, |conn| {
            conn.execute("UPDATE note SET user_id = NULL WHERE user_id = ?1;", [id])?;
            conn.execute("DELETE FROM reader WHERE id = ?1;", [id])
        })
        .map_err(|err| MapperError::delete_failed(EntityKind::Reader, id, err))?;

        if changed == 0 {
            return Err(MapperError::RecordNotFound {
                kind: EntityKind::Reader,
                id,
            });
        }
        debug!("event=mapper_write module=mapper kind=reader op=delete status=ok id={id}");
        Ok(())
    }
}

fn parse_reader_row(row: &Row<'_>) -> rusqlite::Result<ReaderRow> {
    let id: EntityId = row.get("reader_id")?;
    let name: String = row.get("reader_name")?;
    let note_id: Option<EntityId> = row.get("note_id")?;
    let category_id: Option<EntityId> = row.get("category_id")?;

    let note = match (note_id, category_id) {
        (Some(note_id), Some(category_id)) => Some(NoteRow {
            id: note_id,
            name: row.get("note_name")?,
            description: row.get("note_description")?,
            category_id,
            category_name: row.get("category_name")?,
            reader_id: Some(id),
            reader_name: Some(name.clone()),
        }),
        _ => None,
    };

    Ok(ReaderRow { id, name, note })
}
