use crate::core::error::LegacyError;
use crate::core::schemas::{ColumnDef, TableDef};
use rusqlite::{Connection, OptionalExtension};
use std::path::Path;
use std::time::Duration;

pub fn db_connect(db_path: &Path) -> Result<Connection, LegacyError> {
    let conn = Connection::open(db_path)?;
    conn.busy_timeout(Duration::from_secs(5))
        .map_err(LegacyError::RusqliteError)?;
    conn.execute("PRAGMA foreign_keys=ON;", [])
        .map_err(LegacyError::RusqliteError)?;
    Ok(conn)
}

/// Schema generation recorded in the file header (what the client's open helper wrote).
pub fn user_version(conn: &Connection) -> Result<u32, LegacyError> {
    let v: i64 = conn.query_row("PRAGMA user_version;", [], |row| row.get(0))?;
    Ok(u32::try_from(v).unwrap_or(0))
}

pub fn set_user_version(conn: &Connection, version: u32) -> Result<(), LegacyError> {
    // PRAGMA does not accept bound parameters.
    conn.execute_batch(&format!("PRAGMA user_version = {};", version))?;
    Ok(())
}

pub fn table_exists(conn: &Connection, table: &str) -> Result<bool, LegacyError> {
    let found: Option<String> = conn
        .query_row(
            "SELECT name FROM sqlite_master WHERE type='table' AND name=?1",
            [table],
            |row| row.get(0),
        )
        .optional()?;
    Ok(found.is_some())
}

pub fn has_any_table(conn: &Connection) -> Result<bool, LegacyError> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name NOT LIKE 'sqlite_%'",
        [],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

pub fn column_exists(conn: &Connection, table: &str, column: &str) -> Result<bool, LegacyError> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM pragma_table_info(?1) WHERE name=?2",
        [table, column],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

pub fn create_table(conn: &Connection, table: &TableDef) -> Result<(), LegacyError> {
    conn.execute(&table.create_sql(), [])
        .map_err(|e| LegacyError::Schema(format!("create {}: {}", table.name, e)))?;
    Ok(())
}

pub fn create_tables(conn: &Connection, tables: &[&TableDef]) -> Result<(), LegacyError> {
    for table in tables {
        create_table(conn, table)?;
    }
    Ok(())
}

/// Adds `column` unless the table already has it.
pub fn add_column(conn: &Connection, table: &str, column: &ColumnDef) -> Result<(), LegacyError> {
    if column_exists(conn, table, column.name)? {
        return Ok(());
    }
    conn.execute(
        &format!("ALTER TABLE `{}` ADD COLUMN {}", table, column.ddl()),
        [],
    )
    .map_err(|e| LegacyError::Schema(format!("alter {}.{}: {}", table, column.name, e)))?;
    Ok(())
}
