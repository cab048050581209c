pub mod block;
pub mod chain;
pub mod codec;
pub mod config;
pub mod error;
pub mod failure;
pub mod latch;
pub mod pool;
pub mod stats;
pub mod task;
pub mod writer;

pub use codec::Codec;
pub use config::{StreamConfig, DEFAULT_BLOCK_SIZE, DEFAULT_QUEUE_CAPACITY};
pub use error::{Interrupted, StreamError, TaskFailure};
pub use failure::FailureCell;
pub use latch::Latch;
pub use stats::StreamStats;
pub use writer::{ParallelWriter, StreamState};
