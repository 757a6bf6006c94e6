//! SQLite helpers shared by the SQL mappers.

use rusqlite::{Connection, Params, Row, Transaction, TransactionBehavior};

/// Runs `write` in its own transaction, or inside the caller's open one.
///
/// Outside a transaction the write commits before returning and a failure
/// rolls back the partial write. Inside one, nothing is committed here.
pub(super) fn write_scope<T>(
    conn: &Connection,
    write: impl FnOnce(&Connection) -> rusqlite::Result<T>,
) -> rusqlite::Result<T> {
    if !conn.is_autocommit() {
        return write(conn);
    }

    let tx = Transaction::new_unchecked(conn, TransactionBehavior::Immediate)?;
    let value = write(&tx)?;
    tx.commit()?;
    Ok(value)
}

/// Prepares `sql` and parses every returned row in order.
pub(super) fn collect_rows<T, P: Params>(
    conn: &Connection,
    sql: &str,
    params: P,
    parse: impl Fn(&Row<'_>) -> rusqlite::Result<T>,
) -> rusqlite::Result<Vec<T>> {
    let mut stmt = conn.prepare(sql)?;
    let mut rows = stmt.query(params)?;
    let mut items = Vec::new();
    while let Some(row) = rows.next()? {
        items.push(parse(row)?);
    }
    Ok(items)
}
