use crate::error::StreamError;

/// Default raw bytes per block: 128 KB.
pub const DEFAULT_BLOCK_SIZE: usize = 128 * 1024;

/// Default number of sealed blocks that may wait in the queue before the
/// producer blocks.
pub const DEFAULT_QUEUE_CAPACITY: usize = 10;

/// Tuning for a [`ParallelWriter`](crate::ParallelWriter).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamConfig {
    /// Raw bytes per block. A block may exceed this by up to one write.
    pub block_size: usize,
    /// Number of compression worker threads.
    pub workers: usize,
    /// Blocks that may be queued, on top of the ones workers are processing,
    /// before `write` blocks.
    pub queue_capacity: usize,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            block_size: DEFAULT_BLOCK_SIZE,
            workers: num_cpus::get(),
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
        }
    }
}

impl StreamConfig {
    pub fn with_block_size(mut self, block_size: usize) -> Self {
        self.block_size = block_size;
        self
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    pub fn with_queue_capacity(mut self, queue_capacity: usize) -> Self {
        self.queue_capacity = queue_capacity;
        self
    }

    /// Most blocks that can be outstanding before the producer stalls.
    pub fn max_outstanding(&self) -> usize {
        self.workers + self.queue_capacity
    }

    pub fn validate(&self) -> Result<(), StreamError> {
        if self.block_size == 0 {
            return Err(StreamError::InvalidConfig("block_size must be at least 1".into()));
        }
        if self.workers == 0 {
            return Err(StreamError::InvalidConfig("workers must be at least 1".into()));
        }
        if self.queue_capacity == 0 {
            return Err(StreamError::InvalidConfig(
                "queue_capacity must be at least 1".into(),
            ));
        }
        Ok(())
    }
}
