use crate::core::error::ShopError;
use crate::core::migration;
use rusqlite::Connection;
use std::fs;
use std::path::Path;

fn apply_pragmas(conn: &Connection) -> Result<(), ShopError> {
    conn.busy_timeout(std::time::Duration::from_secs(5))?;
    conn.query_row("PRAGMA journal_mode=WAL;", [], |_| Ok(()))?;
    conn.execute("PRAGMA foreign_keys=ON;", [])?;
    Ok(())
}

pub fn db_connect(db_path: &Path) -> Result<Connection, ShopError> {
    let conn = Connection::open(db_path)?;
    apply_pragmas(&conn)?;
    Ok(conn)
}

/// In-memory database with the full schema applied. Used by tests and benches.
pub fn memory_connect() -> Result<Connection, ShopError> {
    let conn = Connection::open_in_memory()?;
    conn.execute("PRAGMA foreign_keys=ON;", [])?;
    migration::migrate(&conn)?;
    Ok(conn)
}

/// Create the database file (and parent directory) and bring the schema up to date.
pub fn initialize_db(db_path: &Path) -> Result<Vec<u32>, ShopError> {
    if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let conn = db_connect(db_path)?;
    migration::migrate(&conn)
}
