//! Version-gated schema setup for the `students` table.
//!
//! # Responsibility
//! - Create the schema on a fresh database.
//! - Rebuild the schema when the stored version is older than the target.
//!
//! # Invariants
//! - The applied version is mirrored to `PRAGMA user_version`.
//! - Upgrades drop existing rows. The table holds transient data only, so
//!   durability-critical data must not be stored here.
//! - A database written by a newer schema is never touched.

use crate::db::{DbError, DbResult};
use log::{info, warn};
use rusqlite::Connection;

const CREATE_SQL: &str = include_str!("0001_students.sql");
const DROP_SQL: &str = "DROP TABLE IF EXISTS students;";

/// Outcome of bringing a connection to the target schema version.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaAction {
    UpToDate,
    Created,
    Recreated { from_version: u32 },
}

/// Applies the schema at `target_version`, creating or rebuilding as needed.
///
/// # Errors
/// - `UnsupportedSchemaVersion` when the database is newer than `target_version`.
/// - `Sqlite` when any DDL statement fails; the transaction is rolled back.
pub fn apply_schema(conn: &mut Connection, target_version: u32) -> DbResult<SchemaAction> {
    let current_version = current_user_version(conn)?;

    if current_version > target_version {
        return Err(DbError::UnsupportedSchemaVersion {
            db_version: current_version,
            latest_supported: target_version,
        });
    }

    if current_version == target_version {
        return Ok(SchemaAction::UpToDate);
    }

    let tx = conn.transaction()?;
    let action = if current_version == 0 {
        tx.execute_batch(CREATE_SQL)?;
        SchemaAction::Created
    } else {
        tx.execute_batch(DROP_SQL)?;
        tx.execute_batch(CREATE_SQL)?;
        SchemaAction::Recreated {
            from_version: current_version,
        }
    };
    tx.execute_batch(&format!("PRAGMA user_version = {target_version};"))?;
    tx.commit()?;

    match action {
        SchemaAction::Recreated { from_version } => warn!(
            "event=schema_upgrade module=db status=ok from_version={} to_version={} data_discarded=true",
            from_version, target_version
        ),
        _ => info!(
            "event=schema_create module=db status=ok version={}",
            target_version
        ),
    }

    Ok(action)
}

/// Reads the schema version stored in `PRAGMA user_version`.
pub fn current_user_version(conn: &Connection) -> DbResult<u32> {
    let version = conn.query_row("PRAGMA user_version;", [], |row| row.get::<_, u32>(0))?;
    Ok(version)
}
