/// An immutable run of input bytes, captured when the accumulator is sealed.
///
/// Once submitted, a block is owned by exactly one compression task.
#[derive(Debug)]
pub struct Block {
    index: u64,
    data: Vec<u8>,
}

impl Block {
    /// Position of this block in submission order, starting at 0.
    pub fn index(&self) -> u64 {
        self.index
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Buffers caller writes until they reach the block size.
///
/// Writes are never split: a block is sealed only after a whole write has
/// been appended, so a block can exceed `threshold` by up to the length of
/// the write that filled it.
#[derive(Debug)]
pub struct BlockAccumulator {
    pending: Vec<u8>,
    threshold: usize,
    next_index: u64,
}

impl BlockAccumulator {
    pub fn new(threshold: usize) -> Self {
        Self {
            pending: Vec::with_capacity(threshold),
            threshold,
            next_index: 0,
        }
    }

    pub fn append(&mut self, data: &[u8]) {
        self.pending.extend_from_slice(data);
    }

    /// True once the pending buffer has reached the block size.
    pub fn is_full(&self) -> bool {
        self.pending.len() >= self.threshold
    }

    /// Turn the pending bytes into a [`Block`] and start a fresh buffer.
    ///
    /// Returns `None` when nothing is pending; empty blocks are never produced.
    pub fn seal(&mut self) -> Option<Block> {
        if self.pending.is_empty() {
            return None;
        }
        let data = std::mem::replace(&mut self.pending, Vec::with_capacity(self.threshold));
        let block = Block {
            index: self.next_index,
            data,
        };
        self.next_index += 1;
        Some(block)
    }

    /// Drop the partially filled block. Returns how many bytes were discarded.
    pub fn discard(&mut self) -> usize {
        let dropped = self.pending.len();
        self.pending = Vec::new();
        dropped
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Number of blocks sealed so far.
    pub fn sealed(&self) -> u64 {
        self.next_index
    }
}
