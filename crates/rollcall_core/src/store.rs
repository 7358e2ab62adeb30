//! Synchronous student store over one shared SQLite connection.
//!
//! # Responsibility
//! - Execute each CRUD statement atomically against the `students` table.
//! - Own the process-wide store handle and its one-time construction.
//!
//! # Invariants
//! - At most one handle is created through [`StudentStore::get_instance`].
//! - All statements are serialized on the single connection; callers on
//!   different worker threads never share a statement concurrently.
//! - Statements and row cursors are released before an operation returns,
//!   on success and error paths alike.
//! - Reads fail with `Schema` instead of defaulting when a column is missing.

use crate::config::StoreConfig;
use crate::db::migrations::current_user_version;
use crate::db::{open_db, open_db_in_memory};
use crate::error::{StoreError, StoreResult};
use crate::model::student::{Student, StudentId};
use log::{error, info};
use once_cell::sync::OnceCell;
use rusqlite::{params, Connection, Row};
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};

static INSTANCE: OnceCell<Arc<StudentStore>> = OnceCell::new();

const STUDENT_SELECT_SQL: &str = "SELECT id, name FROM students";

/// SQLite-backed student store.
///
/// `StudentStore` is `Send + Sync`; share it as `Arc<StudentStore>`.
pub struct StudentStore {
    conn: Mutex<Connection>,
    location: Option<PathBuf>,
    version: u32,
}

impl StudentStore {
    /// Returns the process-wide store, opening it on first use.
    ///
    /// Concurrent first callers observe exactly one construction. A failed
    /// construction is not cached, so later calls retry.
    ///
    /// # Errors
    /// - `Config` when `config` fails validation.
    /// - `Storage`/`Schema` when the database cannot be opened or prepared.
    /// - `HandleConflict` when the handle is already open for another file or version.
    pub fn get_instance(config: &StoreConfig) -> StoreResult<Arc<StudentStore>> {
        config.validate()?;
        let store = INSTANCE.get_or_try_init(|| {
            let store = Self::open(config)?;
            info!(
                "event=store_instance module=store status=ok version={}",
                config.version
            );
            Ok::<_, StoreError>(Arc::new(store))
        })?;

        let requested_path = resolve_location(config.db_path());
        if store.location() != Some(&requested_path) || store.version() != config.version {
            error!(
                "event=store_instance module=store status=error error_code=handle_conflict requested_version={}",
                config.version
            );
            return Err(StoreError::HandleConflict {
                active_path: store.location().cloned().unwrap_or_default(),
                active_version: store.version(),
                requested_path,
                requested_version: config.version,
            });
        }

        Ok(Arc::clone(store))
    }

    /// Opens a standalone store for the configured database file.
    ///
    /// Prefer [`StudentStore::get_instance`] in applications; standalone
    /// stores are for injection and tests.
    pub fn open(config: &StoreConfig) -> StoreResult<Self> {
        config.validate()?;
        let path = config.db_path();
        let conn = open_db(&path, config.version)?;
        Ok(Self {
            conn: Mutex::new(conn),
            location: Some(resolve_location(path)),
            version: config.version,
        })
    }

    /// Opens a standalone in-memory store at `version`.
    pub fn open_in_memory(version: u32) -> StoreResult<Self> {
        let conn = open_db_in_memory(version)?;
        Ok(Self {
            conn: Mutex::new(conn),
            location: None,
            version,
        })
    }

    /// Wraps an externally opened connection.
    ///
    /// # Errors
    /// - `UninitializedConnection` when the connection's `user_version`
    ///   differs from `expected_version`.
    pub fn from_connection(conn: Connection, expected_version: u32) -> StoreResult<Self> {
        let actual_version = current_user_version(&conn)?;
        if actual_version != expected_version {
            return Err(StoreError::UninitializedConnection {
                expected_version,
                actual_version,
            });
        }
        Ok(Self {
            conn: Mutex::new(conn),
            location: None,
            version: expected_version,
        })
    }

    /// Canonical path of the database file, `None` for in-memory stores.
    pub fn location(&self) -> Option<&PathBuf> {
        self.location.as_ref()
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    /// Inserts a student and returns the engine-assigned id.
    ///
    /// Any `id` already set on `student` is ignored.
    pub fn create(&self, student: &Student) -> StoreResult<StudentId> {
        student.validate()?;
        let conn = self.lock();
        conn.execute(
            "INSERT INTO students (name) VALUES (?1);",
            params![student.name.as_str()],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// Looks up one student by primary key; `Ok(None)` when absent.
    pub fn read_by_id(&self, id: StudentId) -> StoreResult<Option<Student>> {
        let conn = self.lock();
        let mut stmt = conn.prepare(&format!("{STUDENT_SELECT_SQL} WHERE id = ?1;"))?;
        let mut rows = stmt.query(params![id])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_student_row(row)?));
        }
        Ok(None)
    }

    /// Returns every student ordered by name, then id.
    pub fn read_all(&self) -> StoreResult<Vec<Student>> {
        let conn = self.lock();
        let mut stmt = conn.prepare(&format!("{STUDENT_SELECT_SQL} ORDER BY name ASC, id ASC;"))?;
        let mut rows = stmt.query([])?;
        let mut students = Vec::new();
        while let Some(row) = rows.next()? {
            students.push(parse_student_row(row)?);
        }
        Ok(students)
    }

    /// Overwrites the name of the row matching `student.id`.
    ///
    /// Returns the number of rows changed; `0` when no row matched.
    pub fn update(&self, student: &Student) -> StoreResult<usize> {
        let id = student.validate_for_update()?;
        let changed = self.lock().execute(
            "UPDATE students SET name = ?1 WHERE id = ?2;",
            params![student.name.as_str(), id],
        )?;
        Ok(changed)
    }

    /// Removes the row matching `id`; `false` when no row matched.
    pub fn delete(&self, id: StudentId) -> StoreResult<bool> {
        let changed = self
            .lock()
            .execute("DELETE FROM students WHERE id = ?1;", params![id])?;
        Ok(changed > 0)
    }

    pub fn count(&self) -> StoreResult<i64> {
        let count = self
            .lock()
            .query_row("SELECT COUNT(*) FROM students;", [], |row| row.get(0))?;
        Ok(count)
    }

    fn lock(&self) -> MutexGuard<'_, Connection> {
        // Statements are atomic, so a poisoned connection is still consistent.
        self.conn
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Canonical form of `path`, so differently spelled paths to one file compare
/// equal. Falls back to `path` as given when it cannot be resolved.
fn resolve_location(path: PathBuf) -> PathBuf {
    std::fs::canonicalize(&path).unwrap_or(path)
}

fn parse_student_row(row: &Row<'_>) -> StoreResult<Student> {
    let id: StudentId = row.get("id")?;
    let name: String = row.get("name")?;
    Ok(Student::with_id(id, name))
}

#[cfg(test)]
mod tests {
    use super::StudentStore;
    use crate::error::StoreError;
    use crate::model::student::Student;

    #[test]
    fn create_ignores_caller_supplied_id() {
        let store = StudentStore::open_in_memory(1).unwrap();
        let id = store.create(&Student::with_id(999, "Ada")).unwrap();
        assert_ne!(id, 999);
        assert!(store.read_by_id(999).unwrap().is_none());
    }

    #[test]
    fn update_without_id_is_a_validation_fault() {
        let store = StudentStore::open_in_memory(1).unwrap();
        let err = store.update(&Student::new("Ada")).unwrap_err();
        assert!(matches!(err, StoreError::Validation(_)));
    }
}
