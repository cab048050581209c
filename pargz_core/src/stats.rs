use std::sync::atomic::{AtomicU64, Ordering};

/// Point-in-time view of a stream's progress.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StreamStats {
    /// Raw bytes accepted by `write`, including any partial block that
    /// `close()` later discards.
    pub bytes_in: u64,
    /// Blocks sealed and handed to the worker pool.
    pub blocks_sealed: u64,
    /// Compressed units appended to the sink.
    pub blocks_appended: u64,
    /// Raw size of the blocks whose compressed units reached the sink.
    pub bytes_committed: u64,
    /// Compressed bytes appended to the sink.
    pub bytes_out: u64,
}

impl StreamStats {
    /// Compression ratio (raw / compressed) over the appended blocks so far.
    /// Input that was buffered or discarded but never appended is not counted.
    pub fn ratio(&self) -> f64 {
        if self.bytes_out == 0 {
            return 1.0;
        }
        self.bytes_committed as f64 / self.bytes_out as f64
    }
}

/// Shared counters behind [`StreamStats`]. The producer owns the input side,
/// tasks bump the output side after each append.
#[derive(Debug, Default)]
pub(crate) struct Counters {
    bytes_in: AtomicU64,
    blocks_sealed: AtomicU64,
    blocks_appended: AtomicU64,
    bytes_committed: AtomicU64,
    bytes_out: AtomicU64,
}

impl Counters {
    pub(crate) fn record_input(&self, len: usize) {
        self.bytes_in.fetch_add(len as u64, Ordering::Relaxed);
    }

    pub(crate) fn record_sealed(&self) {
        self.blocks_sealed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_appended(&self, raw_len: usize, compressed_len: usize) {
        self.blocks_appended.fetch_add(1, Ordering::Relaxed);
        self.bytes_committed
            .fetch_add(raw_len as u64, Ordering::Relaxed);
        self.bytes_out
            .fetch_add(compressed_len as u64, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self) -> StreamStats {
        StreamStats {
            bytes_in: self.bytes_in.load(Ordering::Relaxed),
            blocks_sealed: self.blocks_sealed.load(Ordering::Relaxed),
            blocks_appended: self.blocks_appended.load(Ordering::Relaxed),
            bytes_committed: self.bytes_committed.load(Ordering::Relaxed),
            bytes_out: self.bytes_out.load(Ordering::Relaxed),
        }
    }
}
