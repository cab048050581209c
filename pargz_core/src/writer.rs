use std::io::{self, Write};
use std::sync::{Arc, Mutex, PoisonError};

use tracing::{debug, trace};

use crate::block::BlockAccumulator;
use crate::chain::OrderingChain;
use crate::codec::Codec;
use crate::config::StreamConfig;
use crate::error::StreamError;
use crate::failure::FailureCell;
use crate::latch::Latch;
use crate::pool::WorkerPool;
use crate::stats::{Counters, StreamStats};
use crate::task::CompressionTask;

/// Lifecycle of a [`ParallelWriter`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    /// Accepting writes.
    Open,
    /// `flush()` has sealed the last block and shut the pool down. No further
    /// writes are accepted; the stream stays here until `close()`.
    Flushing,
    Closed,
    /// A worker failure has been observed.
    Failed,
}

/// Streaming writer that compresses blocks in parallel and emits them in order.
///
/// # Write contract
/// Call [`write`] any number of times with arbitrary-sized byte slices. The
/// writer accumulates data and seals a block whenever `block_size` bytes have
/// been gathered. Each block is compressed on the worker pool and appended to
/// the sink strictly in the order blocks were sealed.
///
/// [`write`] blocks when `workers + queue_capacity` blocks are already
/// outstanding.
///
/// # Finishing
/// - [`flush`] seals the trailing partial block, lets every queued block
///   finish, and flushes the sink. The pool is shut down afterwards, so
///   `flush` ends the stream for writing.
/// - [`close`] is abrupt: it cancels the pool, drops queued blocks *and* the
///   pending partial block, then flushes the sink. Call [`flush`] first to
///   keep every byte, or use [`finish`], which does both.
///
/// # Failures
/// The first failure on any worker cancels the pool. It is returned from the
/// next `write`, `flush` or `close`, and from every call after that.
///
/// [`write`]: ParallelWriter::write
/// [`flush`]: ParallelWriter::flush
/// [`close`]: ParallelWriter::close
/// [`finish`]: ParallelWriter::finish
pub struct ParallelWriter<W: Write + Send + 'static> {
    sink: Arc<Mutex<W>>,
    codec: Arc<dyn Codec>,
    config: StreamConfig,
    pending: BlockAccumulator,
    chain: OrderingChain,
    pool: WorkerPool,
    failures: Arc<FailureCell>,
    counters: Arc<Counters>,
    state: StreamState,
}

impl<W: Write + Send + 'static> ParallelWriter<W> {
    /// Wrap `sink` and start `config.workers` compression threads.
    pub fn new(sink: W, codec: Arc<dyn Codec>, config: StreamConfig) -> Result<Self, StreamError> {
        config.validate()?;

        let cancel = Arc::new(Latch::new());
        let failures = Arc::new(FailureCell::new(Arc::clone(&cancel)));
        let pool = WorkerPool::spawn(
            config.workers,
            config.queue_capacity,
            cancel,
            Arc::clone(&failures),
        )?;

        debug!(
            codec = codec.name(),
            block_size = config.block_size,
            workers = config.workers,
            queue_capacity = config.queue_capacity,
            "parallel writer opened"
        );

        Ok(Self {
            sink: Arc::new(Mutex::new(sink)),
            codec,
            pending: BlockAccumulator::new(config.block_size),
            config,
            chain: OrderingChain::new(),
            pool,
            failures,
            counters: Arc::new(Counters::default()),
            state: StreamState::Open,
        })
    }

    /// Buffer `data`, sealing and submitting a block once the block size is
    /// reached. Blocks while the worker queue is full.
    pub fn write(&mut self, data: &[u8]) -> Result<(), StreamError> {
        self.check()?;
        if self.state != StreamState::Open {
            return Err(StreamError::InvalidState {
                state: self.state,
                op: "write",
            });
        }

        self.pending.append(data);
        self.counters.record_input(data.len());
        if self.pending.is_full() {
            self.submit_pending()?;
        }
        Ok(())
    }

    /// Seal any partial block, wait for every block to be compressed and
    /// appended, then flush the sink.
    ///
    /// The worker pool is shut down, so the stream accepts no more writes.
    /// Flushing again is a no-op.
    pub fn flush(&mut self) -> Result<(), StreamError> {
        self.check()?;
        match self.state {
            StreamState::Open => {}
            StreamState::Flushing => return Ok(()),
            state => return Err(StreamError::InvalidState { state, op: "flush" }),
        }

        self.submit_pending()?;
        self.state = StreamState::Flushing;
        self.pool.shutdown();

        if let Err(e) = self.pool.await_termination() {
            self.pool.shutdown_now();
            return Err(e);
        }
        // A block that failed while draining is reported here rather than
        // on the next call.
        self.check()?;

        if self.chain.is_empty() {
            debug!("flushed an empty stream");
        } else {
            debug!(blocks = self.chain.len(), "flushed");
        }
        self.lock_sink().flush()?;
        Ok(())
    }

    /// Cancel all outstanding work and flush the sink.
    ///
    /// Queued blocks and the pending partial block are discarded; only blocks
    /// already appended reach the sink. After a worker failure the pool is
    /// still joined and the sink flushed, and the failure is returned.
    ///
    /// The sink itself is not dropped here: a `File` stays open until the
    /// writer is dropped. Use [`finish`](ParallelWriter::finish) to get the
    /// sink back and release it explicitly.
    pub fn close(&mut self) -> Result<(), StreamError> {
        if self.state == StreamState::Closed {
            return self.failures.check();
        }

        self.pool.shutdown_now();
        let joined = self.pool.await_termination();

        let dropped = self.pending.discard();
        if dropped > 0 {
            debug!(bytes = dropped, "close discarded pending partial block");
        }

        let flushed = self.lock_sink().flush();
        self.state = StreamState::Closed;

        self.failures.check()?;
        joined?;
        flushed?;
        Ok(())
    }

    /// [`flush`](ParallelWriter::flush), then [`close`](ParallelWriter::close),
    /// then hand back the sink.
    pub fn finish(mut self) -> Result<W, StreamError> {
        let flushed = self.flush();
        let closed = self.close();
        flushed?;
        closed?;

        // Every worker has been joined and every task dropped, so the writer
        // holds the last reference to the sink.
        let Self { sink, pool, .. } = self;
        drop(pool);
        match Arc::try_unwrap(sink) {
            Ok(mutex) => Ok(mutex.into_inner().unwrap_or_else(PoisonError::into_inner)),
            Err(_) => Err(StreamError::InvalidState {
                state: StreamState::Closed,
                op: "take the sink of",
            }),
        }
    }

    pub fn state(&self) -> StreamState {
        self.state
    }

    pub fn stats(&self) -> StreamStats {
        self.counters.snapshot()
    }

    pub fn config(&self) -> &StreamConfig {
        &self.config
    }

    pub fn codec(&self) -> &dyn Codec {
        self.codec.as_ref()
    }

    /// Raise the first recorded worker failure, moving the stream to
    /// [`StreamState::Failed`]. The pool is cancelled again in case the
    /// failure arrived between polls.
    fn check(&mut self) -> Result<(), StreamError> {
        if let Err(e) = self.failures.check() {
            self.pool.shutdown_now();
            if self.state != StreamState::Closed {
                self.state = StreamState::Failed;
            }
            return Err(e);
        }
        Ok(())
    }

    fn submit_pending(&mut self) -> Result<(), StreamError> {
        let Some(block) = self.pending.seal() else {
            return Ok(());
        };
        debug_assert!(!block.is_empty());
        let index = block.index();
        self.counters.record_sealed();
        trace!(block = index, len = block.len(), "sealed block");

        let task = CompressionTask::new(
            block,
            Arc::clone(&self.codec),
            Arc::clone(&self.sink),
            self.chain.next_link(),
            Arc::clone(&self.counters),
        );
        if let Err(rejected) = self.pool.submit(Box::new(task)) {
            // Rejection after a cancellation is the failure that caused it.
            self.check()?;
            return Err(rejected);
        }
        Ok(())
    }

    fn lock_sink(&self) -> std::sync::MutexGuard<'_, W> {
        self.sink.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<W: Write + Send + 'static> Write for ParallelWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        ParallelWriter::write(self, buf)?;
        Ok(buf.len())
    }

    /// Terminal: see [`ParallelWriter::flush`].
    fn flush(&mut self) -> io::Result<()> {
        ParallelWriter::flush(self)?;
        Ok(())
    }
}
