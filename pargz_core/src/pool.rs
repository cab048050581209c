use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam::channel::{self, Receiver, Sender};
use tracing::{debug, trace};

use crate::error::{StreamError, TaskFailure};
use crate::failure::FailureCell;
use crate::latch::Latch;

/// How a job that did not fail ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskOutcome {
    Done,
    /// The pool was cancelled while the job was waiting its turn.
    Interrupted,
}

/// A unit of work for the [`WorkerPool`].
pub trait Job: Send {
    /// Block index the job works on, used to attribute panics.
    fn block(&self) -> u64;

    fn run(self: Box<Self>, cancel: &Latch) -> Result<TaskOutcome, TaskFailure>;
}

/// Fixed set of worker threads fed by a bounded queue.
///
/// [`submit`](WorkerPool::submit) never rejects a job because the queue is
/// full: it blocks the producer until a worker frees a slot. With `W` workers
/// and a queue of `Q`, at most `W + Q` jobs are outstanding and the next
/// submission stalls.
///
/// Job failures and panics are reported to the [`FailureCell`], which cancels
/// the pool.
pub struct WorkerPool {
    queue: Option<Sender<Box<dyn Job>>>,
    workers: Vec<JoinHandle<()>>,
    cancel: Arc<Latch>,
}

impl WorkerPool {
    pub fn spawn(
        workers: usize,
        queue_capacity: usize,
        cancel: Arc<Latch>,
        failures: Arc<FailureCell>,
    ) -> Result<Self, StreamError> {
        let (tx, rx) = channel::bounded::<Box<dyn Job>>(queue_capacity);
        let mut pool = Self {
            queue: Some(tx),
            workers: Vec::with_capacity(workers),
            cancel,
        };

        for id in 0..workers {
            let rx = rx.clone();
            let cancel = Arc::clone(&pool.cancel);
            let failures = Arc::clone(&failures);
            // On error the partially built pool is dropped, which cancels and
            // joins the workers spawned so far.
            let handle = thread::Builder::new()
                .name(format!("pargz-worker-{id}"))
                .spawn(move || worker_loop(rx, &cancel, &failures))?;
            pool.workers.push(handle);
        }

        debug!(workers, queue_capacity, "worker pool started");
        Ok(pool)
    }

    /// Queue a job, blocking while the queue is full.
    ///
    /// Fails with [`StreamError::Rejected`] once the pool has been shut down,
    /// or once every worker has exited after a cancellation.
    pub fn submit(&self, job: Box<dyn Job>) -> Result<(), StreamError> {
        let block = job.block();
        let queue = self
            .queue
            .as_ref()
            .ok_or(StreamError::Rejected { block })?;
        queue
            .send(job)
            .map_err(|_| StreamError::Rejected { block })
    }

    /// Stop accepting jobs. Queued and running jobs still complete.
    pub fn shutdown(&mut self) {
        if self.queue.take().is_some() {
            debug!("worker pool shutting down");
        }
    }

    /// Stop accepting jobs and cancel the rest: queued jobs are dropped
    /// unrun and jobs waiting on an ordering token are interrupted.
    pub fn shutdown_now(&mut self) {
        if !self.cancel.is_fired() {
            debug!("worker pool cancelled");
        }
        self.cancel.fire();
        self.queue = None;
    }

    /// Wait for every worker thread to exit.
    ///
    /// Only meaningful after [`shutdown`](WorkerPool::shutdown) or
    /// [`shutdown_now`](WorkerPool::shutdown_now). Calling it again is a no-op.
    ///
    /// Returns [`StreamError::FlushInterrupted`] only when a worker thread
    /// died of a panic that escaped the per-job `catch_unwind`.
    pub fn await_termination(&mut self) -> Result<(), StreamError> {
        let mut interrupted = false;
        for handle in self.workers.drain(..) {
            if handle.join().is_err() {
                interrupted = true;
            }
        }
        if interrupted {
            Err(StreamError::FlushInterrupted)
        } else {
            Ok(())
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_fired()
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.shutdown_now();
        let _ = self.await_termination();
    }
}

fn worker_loop(rx: Receiver<Box<dyn Job>>, cancel: &Latch, failures: &FailureCell) {
    // Leaving the loop drops this receiver. Once every worker has left, a
    // producer blocked in `submit` sees a disconnected channel and returns.
    while let Ok(job) = rx.recv() {
        if cancel.is_fired() {
            break;
        }
        let block = job.block();
        match panic::catch_unwind(AssertUnwindSafe(|| job.run(cancel))) {
            Ok(Ok(outcome)) => trace!(block, ?outcome, "job finished"),
            Ok(Err(failure)) => {
                failures.record(failure);
            }
            Err(payload) => {
                failures.record(TaskFailure::Panic {
                    block,
                    message: panic_message(payload.as_ref()),
                });
            }
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
