//! Two-branch completion contract for asynchronous store operations.
//!
//! # Responsibility
//! - Define how a finished operation reports success or a fault.
//! - Adapt closures and channels to that contract.
//!
//! # Invariants
//! - A callback is consumed by the branch it takes, so exactly one of
//!   `on_success`/`on_error` can run per operation.

use crate::error::{StoreError, StoreResult};
use std::sync::mpsc::{self, Receiver, Sender};

/// Receives the outcome of one asynchronous operation.
///
/// Both branches run on the worker thread that executed the operation,
/// except for `StoreError::Closed`, which is delivered on the submitting
/// thread.
pub trait Callback<T>: Send + 'static {
    fn on_success(self, value: T);
    fn on_error(self, error: StoreError);

    /// Dispatches a finished result to the matching branch.
    fn complete(self, result: StoreResult<T>)
    where
        Self: Sized,
    {
        match result {
            Ok(value) => self.on_success(value),
            Err(error) => self.on_error(error),
        }
    }
}

impl<T, F> Callback<T> for F
where
    F: FnOnce(StoreResult<T>) + Send + 'static,
{
    fn on_success(self, value: T) {
        self(Ok(value))
    }

    fn on_error(self, error: StoreError) {
        self(Err(error))
    }
}

/// Callback that forwards the outcome into a channel.
#[derive(Debug)]
pub struct ChannelCallback<T> {
    sender: Sender<StoreResult<T>>,
}

impl<T: Send + 'static> Callback<T> for ChannelCallback<T> {
    fn on_success(self, value: T) {
        // The receiver may have given up waiting; the result is then dropped.
        let _ = self.sender.send(Ok(value));
    }

    fn on_error(self, error: StoreError) {
        let _ = self.sender.send(Err(error));
    }
}

/// Creates a callback whose outcome can be awaited through the receiver.
///
/// Useful for callers that compose operations sequentially instead of
/// nesting callbacks.
pub fn channel<T: Send + 'static>() -> (ChannelCallback<T>, Receiver<StoreResult<T>>) {
    let (sender, receiver) = mpsc::channel();
    (ChannelCallback { sender }, receiver)
}
