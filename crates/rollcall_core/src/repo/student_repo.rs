//! Asynchronous student repository.
//!
//! # Responsibility
//! - Turn each store operation into a non-blocking submit/callback pair.
//! - Own the worker pool that executes those operations.
//!
//! # Invariants
//! - Submission never performs storage I/O on the calling thread.
//! - Every accepted submission runs its store operation exactly once and
//!   completes its callback exactly once, on a worker thread.
//! - After `shutdown`, submissions complete immediately with `Closed`.
//! - The repository adds no validation of its own.

use crate::callback::Callback;
use crate::config::{ConfigError, StoreConfig};
use crate::error::{StoreError, StoreResult};
use crate::model::student::{Student, StudentId};
use crate::store::StudentStore;
use crate::worker::{Dispatch, WorkerPool};
use log::{debug, warn};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Async façade over the shared [`StudentStore`].
///
/// Wrap in `Arc` to chain follow-up operations from inside callbacks.
/// Dropping the repository shuts the pool down and waits for queued work.
pub struct StudentRepository {
    store: Arc<StudentStore>,
    pool: WorkerPool,
}

impl StudentRepository {
    /// Builds a repository on the process-wide store handle.
    ///
    /// # Errors
    /// - Any error from [`StudentStore::get_instance`].
    /// - `WorkerSpawn` when worker threads cannot be started.
    pub fn open(config: &StoreConfig) -> StoreResult<Self> {
        let store = StudentStore::get_instance(config)?;
        Self::with_store(store, config.pool_size)
    }

    /// Builds a repository on an injected store handle.
    pub fn with_store(store: Arc<StudentStore>, pool_size: usize) -> StoreResult<Self> {
        if pool_size == 0 {
            return Err(ConfigError::ZeroPoolSize.into());
        }
        let pool = WorkerPool::new(pool_size).map_err(StoreError::WorkerSpawn)?;
        Ok(Self { store, pool })
    }

    /// Shared store handle used by this repository.
    pub fn store(&self) -> &Arc<StudentStore> {
        &self.store
    }

    /// Inserts `student`; succeeds with the assigned id.
    pub fn create_async(&self, student: Student, callback: impl Callback<StudentId>) {
        self.submit("create", callback, move |store| store.create(&student));
    }

    /// Looks up `id`; succeeds with `None` when no row matches.
    pub fn read_async(&self, id: StudentId, callback: impl Callback<Option<Student>>) {
        self.submit("read", callback, move |store| store.read_by_id(id));
    }

    /// Reads every student ordered by name.
    pub fn read_all_async(&self, callback: impl Callback<Vec<Student>>) {
        self.submit("read_all", callback, |store| store.read_all());
    }

    /// Renames the row matching `student.id`; succeeds with rows affected (0 or 1).
    pub fn update_async(&self, student: Student, callback: impl Callback<usize>) {
        self.submit("update", callback, move |store| store.update(&student));
    }

    /// Deletes `id`; succeeds with `false` when no row matched.
    pub fn delete_async(&self, id: StudentId, callback: impl Callback<bool>) {
        self.submit("delete", callback, move |store| store.delete(id));
    }

    pub fn count_async(&self, callback: impl Callback<i64>) {
        self.submit("count", callback, |store| store.count());
    }

    /// Stops accepting submissions. Idempotent and non-blocking.
    ///
    /// Operations already submitted still run and complete their callbacks.
    pub fn shutdown(&self) {
        self.pool.shutdown();
    }

    pub fn is_shutdown(&self) -> bool {
        self.pool.is_shutdown()
    }

    /// Blocks until all workers have exited after [`shutdown`], or `timeout`
    /// elapses. Returns `true` when the pool fully drained.
    ///
    /// [`shutdown`]: StudentRepository::shutdown
    pub fn await_termination(&self, timeout: Duration) -> bool {
        self.pool.await_termination(timeout)
    }

    fn submit<T, C, F>(&self, op: &'static str, callback: C, operation: F)
    where
        T: Send + 'static,
        C: Callback<T>,
        F: FnOnce(&StudentStore) -> StoreResult<T> + Send + 'static,
    {
        let store = Arc::clone(&self.store);
        let job = Box::new(move |dispatch: Dispatch| match dispatch {
            Dispatch::Run => {
                let started_at = Instant::now();
                let result = operation(&store);
                log_completion(op, started_at, &result);
                callback.complete(result);
            }
            Dispatch::Rejected => {
                warn!(
                    "event=repo_submit module=repo status=error op={} error_code=closed_fault",
                    op
                );
                callback.on_error(StoreError::Closed);
            }
        });
        self.pool.execute(job);
    }
}

fn log_completion<T>(op: &str, started_at: Instant, result: &StoreResult<T>) {
    match result {
        Ok(_) => debug!(
            "event=repo_op module=repo status=ok op={} duration_ms={}",
            op,
            started_at.elapsed().as_millis()
        ),
        Err(err) => warn!(
            "event=repo_op module=repo status=error op={} duration_ms={} error_code={} error={}",
            op,
            started_at.elapsed().as_millis(),
            err.code(),
            err
        ),
    }
}
