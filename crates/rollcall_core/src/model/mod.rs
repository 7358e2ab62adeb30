//! Domain model for persisted student records.
//!
//! # Responsibility
//! - Define the data carried between callers, the async façade and storage.
//!
//! # Invariants
//! - Records are plain values with no storage behavior attached.

pub mod student;
