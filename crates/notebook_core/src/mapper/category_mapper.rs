//! Category mapper contract and SQLite implementation.
//!
//! # Responsibility
//! - Persist categories with their optional parent.
//! - Rebuild categories with their notes and full parent chain.
//!
//! # Invariants
//! - Reads are one joined statement ordered by category id, then note id.
//! - `find_by_id` loads the category and every ancestor in one recursive
//!   query so `notes_count` works on the returned object.
//! - Deleting a category removes its note links and detaches its children.
//! - An update never places a category under itself or a descendant.

use crate::identity::EntityId;
use crate::mapper::rows::{hydrate_categories, CategoryRow, NoteRow};
use crate::mapper::sql::{collect_rows, write_scope};
use crate::mapper::{MapperError, MapperResult};
use crate::model::{Category, EntityKind};
use log::debug;
use rusqlite::{params, Connection, Row};

const CATEGORY_SELECT_SQL: &str = "SELECT
    c.id AS category_id,
    c.name AS category_name,
    c.parent_id AS parent_id,
    n.id AS note_id,
    n.name AS note_name,
    n.description AS note_description,
    r.id AS reader_id,
    r.name AS reader_name
FROM category c
LEFT JOIN note_to_category nc ON nc.category_id = c.id
LEFT JOIN note n ON n.id = nc.note_id
LEFT JOIN reader r ON r.id = n.user_id";

// `UNION` (not `UNION ALL`) stops the walk on corrupted parent loops.
const LINEAGE_CTE_SQL: &str = "WITH RECURSIVE lineage(id) AS (
    SELECT id FROM category WHERE id = ?1
    UNION
    SELECT parent.parent_id
    FROM category parent
    INNER JOIN lineage l ON parent.id = l.id
    WHERE parent.parent_id IS NOT NULL
)";

/// Mapper interface for categories.
pub trait CategoryMapper {
    fn all(&self) -> MapperResult<Vec<Category>>;
    fn find_by_id(&self, id: EntityId) -> MapperResult<Category>;
    fn insert(&self, category: &mut Category) -> MapperResult<EntityId>;
    fn update(&self, category: &Category) -> MapperResult<()>;
    fn delete(&self, category: &Category) -> MapperResult<()>;
}

/// SQLite-backed category mapper.
pub struct SqliteCategoryMapper<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteCategoryMapper<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }

    fn load(&self, sql: &str, params: impl rusqlite::Params) -> MapperResult<Vec<Category>> {
        let rows = collect_rows(self.conn, sql, params, parse_category_row)
            .map_err(|err| MapperError::query(EntityKind::Category, err))?;
        debug!(
            "event=mapper_read module=mapper kind=category status=ok rows={}",
            rows.len()
        );
        hydrate_categories(rows)
    }

    /// Fails when `id` is `parent_id` or one of its ancestors.
    fn reject_parent_cycle(&self, id: EntityId, parent_id: EntityId) -> MapperResult<()> {
        let loops = self
            .conn
            .query_row(
                &format!("{LINEAGE_CTE_SQL} SELECT EXISTS(SELECT 1 FROM lineage WHERE id = ?2);"),
                params![parent_id, id],
                |row| row.get::<_, bool>(0),
            )
            .map_err(|err| MapperError::query(EntityKind::Category, err))?;
        if loops {
            return Err(MapperError::ParentCycle { id, parent_id });
        }
        Ok(())
    }
}

impl CategoryMapper for SqliteCategoryMapper<'_> {
    fn all(&self) -> MapperResult<Vec<Category>> {
        self.load(
            &format!("{CATEGORY_SELECT_SQL} ORDER BY c.id ASC, n.id ASC;"),
            [],
        )
    }

    fn find_by_id(&self, id: EntityId) -> MapperResult<Category> {
        self.load(
            &format!(
                "{LINEAGE_CTE_SQL}
                 {CATEGORY_SELECT_SQL}
                 WHERE c.id IN (SELECT id FROM lineage)
                 ORDER BY c.id ASC, n.id ASC;"
            ),
            [id],
        )?
        .into_iter()
        .find(|category| category.id == Some(id))
        .ok_or(MapperError::RecordNotFound {
            kind: EntityKind::Category,
            id,
        })
    }

    fn insert(&self, category: &mut Category) -> MapperResult<EntityId> {
        let parent_id = persisted_parent_id(category)?;
        let id = write_scope(self.conn, |conn| {
            conn.execute(
                "INSERT INTO category (name, parent_id) VALUES (?1, ?2);",
                params![category.name.as_str(), parent_id],
            )?;
            Ok(conn.last_insert_rowid())
        })
        .map_err(|err| MapperError::commit_failed(EntityKind::Category, err))?;

        category.id = Some(id);
        debug!("event=mapper_write module=mapper kind=category op=insert status=ok id={id}");
        Ok(id)
    }

    fn update(&self, category: &Category) -> MapperResult<()> {
        let id = category
            .id
            .ok_or(MapperError::NotPersisted(EntityKind::Category))?;
        let parent_id = persisted_parent_id(category)?;
        if let Some(parent_id) = parent_id {
            self.reject_parent_cycle(id, parent_id)?;
        }
        let changed = write_scope(self.conn, |conn| {
            conn.execute(
                "UPDATE category SET name = ?2, parent_id = ?3 WHERE id = ?1;",
                params![id, category.name.as_str(), parent_id],
            )
        })
        .map_err(|err| MapperError::update_failed(EntityKind::Category, id, err))?;

        if changed == 0 {
            return Err(MapperError::RecordNotFound {
                kind: EntityKind::Category,
                id,
            });
        }
        debug!("event=mapper_write module=mapper kind=category op=update status=ok id={id}");
        Ok(())
    }

    fn delete(&self, category: &Category) -> MapperResult<()> {
        let id = category
            .id
            .ok_or(MapperError::NotPersisted(EntityKind::Category))?;
        let changed = write_scope(self.conn, |conn| {
            conn.execute("DELETE FROM note_to_category WHERE category_id = ?1;", [id])?;
            conn.execute(
                "UPDATE category SET parent_id = NULL WHERE parent_id = ?1;",
                [id],
            )?;
            conn.execute("DELETE FROM category WHERE id = ?1;", [id])
        })
        .map_err(|err| MapperError::delete_failed(EntityKind::Category, id, err))?;

        if changed == 0 {
            return Err(MapperError::RecordNotFound {
                kind: EntityKind::Category,
                id,
            });
        }
        debug!("event=mapper_write module=mapper kind=category op=delete status=ok id={id}");
        Ok(())
    }
}

/// Parent id to store. A parent without identity cannot be referenced.
pub(crate) fn persisted_parent_id(category: &Category) -> MapperResult<Option<EntityId>> {
    match category.parent.as_deref() {
        Some(parent) => parent
            .id
            .map(Some)
            .ok_or(MapperError::NotPersisted(EntityKind::Category)),
        None => Ok(None),
    }
}

fn parse_category_row(row: &Row<'_>) -> rusqlite::Result<CategoryRow> {
    let id: EntityId = row.get("category_id")?;
    let name: String = row.get("category_name")?;
    let note = match row.get::<_, Option<EntityId>>("note_id")? {
        Some(note_id) => Some(NoteRow {
            id: note_id,
            name: row.get("note_name")?,
            description: row.get("note_description")?,
            category_id: id,
            category_name: name.clone(),
            reader_id: row.get("reader_id")?,
            reader_name: row.get("reader_name")?,
        }),
        None => None,
    };

    Ok(CategoryRow {
        id,
        name,
        parent_id: row.get("parent_id")?,
        note,
    })
}
