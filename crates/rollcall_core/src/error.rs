//! Fault taxonomy surfaced by the store and the async façade.
//!
//! # Responsibility
//! - Classify engine errors into storage vs schema faults.
//! - Carry façade-level faults (closed repository, handle conflicts).
//!
//! # Invariants
//! - Absence of a row is never an error; it is a success value.
//! - A missing table or column is always `Schema`, never a default value.

use crate::config::ConfigError;
use crate::db::DbError;
use crate::model::student::StudentValidationError;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug)]
pub enum StoreError {
    /// The engine rejected the operation (constraint, I/O, corruption).
    Storage(DbError),
    /// An expected table or column is missing.
    Schema(String),
    Validation(StudentValidationError),
    /// The repository was shut down before the operation was submitted.
    Closed,
    Config(ConfigError),
    /// The process-wide handle is already open with a different configuration.
    HandleConflict {
        active_path: PathBuf,
        active_version: u32,
        requested_path: PathBuf,
        requested_version: u32,
    },
    UninitializedConnection {
        expected_version: u32,
        actual_version: u32,
    },
    WorkerSpawn(std::io::Error),
}

impl StoreError {
    /// Returns whether this fault came from a missing table or column.
    pub fn is_schema(&self) -> bool {
        matches!(self, Self::Schema(_))
    }

    /// Returns whether this fault was raised because the repository is closed.
    pub fn is_closed(&self) -> bool {
        matches!(self, Self::Closed)
    }

    /// Stable short code used in log events.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Storage(_) => "storage_fault",
            Self::Schema(_) => "schema_fault",
            Self::Validation(_) => "validation_fault",
            Self::Closed => "closed_fault",
            Self::Config(_) => "config_invalid",
            Self::HandleConflict { .. } => "handle_conflict",
            Self::UninitializedConnection { .. } => "uninitialized_connection",
            Self::WorkerSpawn(_) => "worker_spawn_failed",
        }
    }
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Storage(err) => write!(f, "storage fault: {err}"),
            Self::Schema(message) => write!(f, "schema fault: {message}"),
            Self::Validation(err) => write!(f, "{err}"),
            Self::Closed => write!(f, "repository is shut down"),
            Self::Config(err) => write!(f, "{err}"),
            Self::HandleConflict {
                active_path,
                active_version,
                requested_path,
                requested_version,
            } => write!(
                f,
                "store already open at `{}` (version {active_version}); refusing `{}` (version {requested_version})",
                active_path.display(),
                requested_path.display()
            ),
            Self::UninitializedConnection {
                expected_version,
                actual_version,
            } => write!(
                f,
                "connection schema version {actual_version} does not match expected {expected_version}"
            ),
            Self::WorkerSpawn(err) => write!(f, "failed to spawn worker thread: {err}"),
        }
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Storage(err) => Some(err),
            Self::Validation(err) => Some(err),
            Self::Config(err) => Some(err),
            Self::WorkerSpawn(err) => Some(err),
            Self::Schema(_)
            | Self::Closed
            | Self::HandleConflict { .. }
            | Self::UninitializedConnection { .. } => None,
        }
    }
}

impl From<DbError> for StoreError {
    fn from(value: DbError) -> Self {
        match value {
            DbError::Sqlite(err) => Self::from(err),
            other => Self::Storage(other),
        }
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(value: rusqlite::Error) -> Self {
        match schema_message(&value) {
            Some(message) => Self::Schema(message),
            None => Self::Storage(DbError::Sqlite(value)),
        }
    }
}

impl From<StudentValidationError> for StoreError {
    fn from(value: StudentValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<ConfigError> for StoreError {
    fn from(value: ConfigError) -> Self {
        Self::Config(value)
    }
}

fn schema_message(err: &rusqlite::Error) -> Option<String> {
    match err {
        rusqlite::Error::InvalidColumnName(name) => Some(format!("missing column `{name}`")),
        rusqlite::Error::SqliteFailure(_, Some(message)) if is_missing_object(message) => {
            Some(message.clone())
        }
        rusqlite::Error::SqlInputError { msg, .. } if is_missing_object(msg) => Some(msg.clone()),
        _ => None,
    }
}

fn is_missing_object(message: &str) -> bool {
    message.starts_with("no such table") || message.starts_with("no such column")
}
