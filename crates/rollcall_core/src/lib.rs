//! Asynchronous SQLite-backed storage for student records.
//!
//! A [`StudentRepository`] runs every [`StudentStore`] operation on its own
//! worker pool and reports the outcome through a [`Callback`], so callers
//! never block on storage I/O. All repositories opened through
//! [`StudentRepository::open`] share one process-wide store handle.

pub mod callback;
pub mod config;
pub mod db;
pub mod error;
pub mod logging;
pub mod model;
pub mod repo;
pub mod store;
pub mod worker;

pub use callback::{channel, Callback, ChannelCallback};
pub use config::{ConfigError, StoreConfig};
pub use error::{StoreError, StoreResult};
pub use logging::{default_log_level, init_logging, LoggingConfig, LoggingError};
pub use model::student::{Student, StudentId, StudentValidationError};
pub use repo::student_repo::StudentRepository;
pub use store::StudentStore;

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
