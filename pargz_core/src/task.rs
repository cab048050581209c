use std::io::{self, Write};
use std::sync::{Arc, Mutex};

use tracing::trace;

use crate::block::Block;
use crate::chain::Link;
use crate::codec::Codec;
use crate::error::TaskFailure;
use crate::latch::Latch;
use crate::pool::{Job, TaskOutcome};
use crate::stats::Counters;

/// Compresses one block, then appends it to the sink in chain order.
///
/// ```text
/// CREATED -> COMPRESSING -> WAITING_FOR_ORDER -> APPENDING -> DONE
///                 |                 |                |
///               FAILED         INTERRUPTED         FAILED
/// ```
///
/// A failed task never fires its release token. Its successor stays parked
/// in `WAITING_FOR_ORDER` until the pool's cancellation interrupts it.
pub struct CompressionTask<W> {
    block: Block,
    codec: Arc<dyn Codec>,
    sink: Arc<Mutex<W>>,
    link: Link,
    counters: Arc<Counters>,
}

impl<W: Write + Send> CompressionTask<W> {
    pub(crate) fn new(
        block: Block,
        codec: Arc<dyn Codec>,
        sink: Arc<Mutex<W>>,
        link: Link,
        counters: Arc<Counters>,
    ) -> Self {
        Self {
            block,
            codec,
            sink,
            link,
            counters,
        }
    }

    fn append(&self, compressed: &[u8]) -> io::Result<()> {
        // Only the task holding the chain's turn gets here, so the lock is
        // uncontended. A poisoned lock means an earlier append panicked midway.
        let mut sink = self
            .sink
            .lock()
            .map_err(|_| io::Error::new(io::ErrorKind::Other, "sink poisoned by a panicked append"))?;
        sink.write_all(compressed)
    }
}

impl<W: Write + Send> Job for CompressionTask<W> {
    fn block(&self) -> u64 {
        self.block.index()
    }

    fn run(self: Box<Self>, cancel: &Latch) -> Result<TaskOutcome, TaskFailure> {
        let block = self.block.index();

        trace!(block, len = self.block.len(), "compressing");
        let compressed = self
            .codec
            .compress_block(self.block.as_bytes())
            .map_err(|source| TaskFailure::Codec { block, source })?;

        trace!(block, "waiting for order");
        if self.link.wait_for.wait(cancel).is_err() {
            trace!(block, "interrupted");
            return Ok(TaskOutcome::Interrupted);
        }

        trace!(block, len = compressed.len(), "appending");
        self.append(&compressed)
            .map_err(|source| TaskFailure::Sink { block, source })?;
        self.counters
            .record_appended(self.block.len(), compressed.len());

        self.link.release.fire();
        trace!(block, "done");
        Ok(TaskOutcome::Done)
    }
}
