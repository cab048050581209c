use std::sync::{Arc, OnceLock};

use tracing::{debug, warn};

use crate::error::{StreamError, TaskFailure};
use crate::latch::Latch;

/// Write-once slot for the first worker failure.
///
/// Any number of workers may call [`record`](FailureCell::record)
/// concurrently; exactly one of them wins and every later failure is dropped.
/// Recording, win or lose, fires the pool's cancellation latch.
///
/// The producer polls the cell with [`check`](FailureCell::check) at the
/// start of every stream operation. Failures are never pushed to the caller.
#[derive(Debug)]
pub struct FailureCell {
    first: OnceLock<Arc<TaskFailure>>,
    cancel: Arc<Latch>,
}

impl FailureCell {
    pub fn new(cancel: Arc<Latch>) -> Self {
        Self {
            first: OnceLock::new(),
            cancel,
        }
    }

    /// Record `failure` and cancel the pool. Returns whether this failure was
    /// the first one.
    pub fn record(&self, failure: TaskFailure) -> bool {
        let won = match self.first.set(Arc::new(failure)) {
            Ok(()) => {
                if let Some(first) = self.first.get() {
                    warn!(block = first.block(), error = %first, "compression stream failed");
                }
                true
            }
            Err(dropped) => {
                debug!(block = dropped.block(), error = %dropped, "discarding later failure");
                false
            }
        };
        self.cancel.fire();
        won
    }

    /// Re-raise the recorded failure, if there is one.
    pub fn check(&self) -> Result<(), StreamError> {
        match self.first.get() {
            Some(failure) => Err(StreamError::Worker(Arc::clone(failure))),
            None => Ok(()),
        }
    }

    pub fn first(&self) -> Option<Arc<TaskFailure>> {
        self.first.get().cloned()
    }
}
