//! Asynchronous data-access façade.
//!
//! # Responsibility
//! - Expose store operations as background submissions with callbacks.
//!
//! # Invariants
//! - Repository methods never block on storage I/O.
//! - Store faults reach callers only through the callback error branch.

pub mod student_repo;
