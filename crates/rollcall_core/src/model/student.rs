//! Student domain model.
//!
//! # Responsibility
//! - Define the single record shape persisted in the `students` table.
//! - Provide write-path validation shared by every store operation.
//!
//! # Invariants
//! - `id` is `None` until the store assigns one; assigned ids are never reused.
//! - `name` is non-empty after trimming.
//! - Identity is `id`: two records with the same `id` are the same entity.

use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Store-assigned row identifier.
pub type StudentId = i64;

/// Persisted student record.
///
/// Values returned from reads are detached snapshots: mutating them has no
/// effect on storage until passed back through an explicit update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Student {
    /// Absent for records that were never persisted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<StudentId>,
    pub name: String,
}

/// Validation failures raised before any SQL mutation runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StudentValidationError {
    EmptyName,
    MissingId,
}

impl Display for StudentValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyName => write!(f, "student name must not be empty"),
            Self::MissingId => write!(f, "student id is required for this operation"),
        }
    }
}

impl Error for StudentValidationError {}

impl Student {
    /// Creates an unsaved record; the store assigns `id` on insert.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: None,
            name: name.into(),
        }
    }

    /// Creates a record carrying an existing identifier.
    ///
    /// Used by the store when hydrating rows and by callers preparing updates.
    pub fn with_id(id: StudentId, name: impl Into<String>) -> Self {
        Self {
            id: Some(id),
            name: name.into(),
        }
    }

    /// Returns whether this record has been assigned a store identifier.
    pub fn is_persisted(&self) -> bool {
        self.id.is_some()
    }

    /// Checks fields required for insertion.
    ///
    /// # Errors
    /// - `EmptyName` when `name` is empty or whitespace only.
    pub fn validate(&self) -> Result<(), StudentValidationError> {
        if self.name.trim().is_empty() {
            return Err(StudentValidationError::EmptyName);
        }
        Ok(())
    }

    /// Checks fields required for an update and returns the target id.
    ///
    /// # Errors
    /// - `MissingId` when the record was never persisted.
    /// - `EmptyName` when `name` is empty or whitespace only.
    pub fn validate_for_update(&self) -> Result<StudentId, StudentValidationError> {
        let id = self.id.ok_or(StudentValidationError::MissingId)?;
        self.validate()?;
        Ok(id)
    }
}

impl Display for Student {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self.id {
            Some(id) => write!(f, "Student{{id={id}, name='{}'}}", self.name),
            None => write!(f, "Student{{id=-, name='{}'}}", self.name),
        }
    }
}
