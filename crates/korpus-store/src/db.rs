//! Connection setup.
//!
//! Every connection enables foreign keys and runs pending migrations;
//! there is no way to obtain a connection with a stale schema.

use std::path::Path;

use rusqlite::Connection;

use crate::error::StoreResult;
use crate::schema;

/// Open (creating if needed) the store at `path` and migrate it.
pub fn connect(path: &Path) -> StoreResult<Connection> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let conn = Connection::open(path)?;
    configure(&conn)?;
    Ok(conn)
}

/// Open an in-memory store (tests, scratch indexing).
pub fn connect_in_memory() -> StoreResult<Connection> {
    let conn = Connection::open_in_memory()?;
    configure(&conn)?;
    Ok(conn)
}

fn configure(conn: &Connection) -> StoreResult<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    schema::migrate(conn)?;
    Ok(())
}
