//! Fixed-size worker pool that runs store jobs off the caller's thread.
//!
//! # Responsibility
//! - Start `size` named threads consuming one FIFO job queue.
//! - Stop accepting jobs on shutdown while letting queued work drain.
//!
//! # Invariants
//! - Jobs start in submission order; with more than one worker their
//!   completion order is unspecified.
//! - After `shutdown`, `execute` runs the job with `Dispatch::Rejected` on the
//!   calling thread instead of queueing it.
//! - A panicking job is contained; its worker keeps serving the queue.

use log::{debug, error, info};
use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// How a job is being invoked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    /// Running on a worker thread.
    Run,
    /// Refused by a shut-down pool; running on the submitting thread.
    Rejected,
}

pub type Job = Box<dyn FnOnce(Dispatch) + Send + 'static>;

const WORKER_NAME_PREFIX: &str = "rollcall-worker";
const TERMINATION_POLL_INTERVAL: Duration = Duration::from_millis(5);

/// Bounded pool of background threads.
pub struct WorkerPool {
    sender: Mutex<Option<Sender<Job>>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    size: usize,
}

impl WorkerPool {
    /// Spawns `size` worker threads.
    ///
    /// # Errors
    /// Returns the OS error when a thread cannot be spawned; threads already
    /// started exit once the partially built pool is dropped.
    pub fn new(size: usize) -> std::io::Result<Self> {
        let (sender, receiver) = mpsc::channel::<Job>();
        let receiver = Arc::new(Mutex::new(receiver));
        let mut workers = Vec::with_capacity(size);

        for index in 0..size {
            let receiver = Arc::clone(&receiver);
            let handle = thread::Builder::new()
                .name(format!("{WORKER_NAME_PREFIX}-{index}"))
                .spawn(move || run_worker(index, &receiver))?;
            workers.push(handle);
        }

        info!("event=pool_start module=worker status=ok size={}", size);
        Ok(Self {
            sender: Mutex::new(Some(sender)),
            workers: Mutex::new(workers),
            size,
        })
    }

    /// Queues `job` and returns `true`.
    ///
    /// When the pool is shut down the job is invoked immediately on the
    /// calling thread with [`Dispatch::Rejected`] and `false` is returned.
    pub fn execute(&self, job: Job) -> bool {
        let guard = self
            .sender
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let rejected = match guard.as_ref() {
            Some(sender) => match sender.send(job) {
                Ok(()) => return true,
                Err(err) => err.0,
            },
            None => job,
        };
        drop(guard);

        rejected(Dispatch::Rejected);
        false
    }

    pub fn is_shutdown(&self) -> bool {
        self.sender
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .is_none()
    }

    /// Closes the queue. Idempotent and non-blocking.
    ///
    /// Workers finish every job queued before this call, then exit.
    pub fn shutdown(&self) {
        let previous = self
            .sender
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();
        if previous.is_some() {
            info!("event=pool_shutdown module=worker status=ok size={}", self.size);
        }
    }

    /// Waits until every worker has exited or `timeout` elapses.
    ///
    /// Returns `true` when all workers have exited. Call after [`shutdown`];
    /// otherwise workers never exit and this returns `false` at the deadline.
    ///
    /// [`shutdown`]: WorkerPool::shutdown
    pub fn await_termination(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            if self.join_finished() {
                return true;
            }
            if Instant::now() >= deadline {
                return false;
            }
            thread::sleep(TERMINATION_POLL_INTERVAL);
        }
    }

    fn join_finished(&self) -> bool {
        let mut workers = self
            .workers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let mut running = Vec::with_capacity(workers.len());
        for handle in workers.drain(..) {
            if handle.is_finished() {
                let _ = handle.join();
            } else {
                running.push(handle);
            }
        }
        *workers = running;
        workers.is_empty()
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.shutdown();
        let current = thread::current().id();
        let workers = std::mem::take(
            self.workers
                .get_mut()
                .unwrap_or_else(|poisoned| poisoned.into_inner()),
        );
        for handle in workers {
            // A worker that drops the last reference to its own pool cannot
            // join itself; it exits on its own once the queue is drained.
            if handle.thread().id() == current {
                continue;
            }
            let _ = handle.join();
        }
    }
}

fn run_worker(index: usize, receiver: &Mutex<Receiver<Job>>) {
    debug!("event=worker_start module=worker status=ok worker={}", index);
    loop {
        let next = receiver
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .recv();
        let Ok(job) = next else {
            break;
        };
        if panic::catch_unwind(AssertUnwindSafe(move || job(Dispatch::Run))).is_err() {
            error!(
                "event=job_panic module=worker status=error worker={}",
                index
            );
        }
    }
    debug!("event=worker_stop module=worker status=ok worker={}", index);
}
