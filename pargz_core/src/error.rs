use std::io;
use std::sync::Arc;

use crate::writer::StreamState;

/// A failure raised on a worker thread while processing one block.
///
/// Worker failures never cross the task boundary as panics or returns to the
/// caller's thread; they are funneled into the [`FailureCell`](crate::FailureCell)
/// and surfaced from the next call on the stream.
#[derive(Debug, thiserror::Error)]
pub enum TaskFailure {
    #[error("codec failed on block {block}: {source}")]
    Codec {
        block: u64,
        #[source]
        source: anyhow::Error,
    },

    #[error("sink append failed on block {block}: {source}")]
    Sink {
        block: u64,
        #[source]
        source: io::Error,
    },

    #[error("worker panicked on block {block}: {message}")]
    Panic { block: u64, message: String },
}

impl TaskFailure {
    /// Index of the block whose task failed.
    pub fn block(&self) -> u64 {
        match self {
            TaskFailure::Codec { block, .. }
            | TaskFailure::Sink { block, .. }
            | TaskFailure::Panic { block, .. } => *block,
        }
    }
}

/// Errors returned to the caller of a [`ParallelWriter`](crate::ParallelWriter).
#[derive(Debug, thiserror::Error)]
pub enum StreamError {
    /// The first failure recorded by any worker. Every call after the failure
    /// returns this same shared value.
    #[error("background compression failed: {0}")]
    Worker(#[source] Arc<TaskFailure>),

    /// Producer-side I/O: flushing the sink or spawning worker threads.
    #[error("stream I/O error: {0}")]
    Io(#[from] io::Error),

    /// Waiting for the worker pool to drain was cut short.
    #[error("interrupted while waiting for compression to finish")]
    FlushInterrupted,

    /// The worker pool no longer accepts blocks.
    #[error("worker pool rejected block {block}")]
    Rejected { block: u64 },

    #[error("cannot {op} a stream in state {state:?}")]
    InvalidState { state: StreamState, op: &'static str },

    #[error("invalid stream config: {0}")]
    InvalidConfig(String),
}

impl StreamError {
    /// The worker failure behind this error, if any.
    pub fn task_failure(&self) -> Option<&TaskFailure> {
        match self {
            StreamError::Worker(failure) => Some(failure),
            _ => None,
        }
    }
}

impl From<StreamError> for io::Error {
    fn from(e: StreamError) -> Self {
        match e {
            StreamError::Io(inner) => inner,
            other => io::Error::new(io::ErrorKind::Other, other),
        }
    }
}

/// A wait on an ordering token was abandoned because the pool was cancelled.
///
/// This is not a user-visible failure: the cancellation that caused it was
/// triggered by a failure that is already recorded, or by `close()`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("wait interrupted by cancellation")]
pub struct Interrupted;
