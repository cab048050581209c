use std::sync::Arc;

use crate::latch::Latch;

/// One task's position in the ordering chain.
///
/// The task must see `wait_for` fire before it appends to the sink, and fires
/// `release` once its own append is done.
#[derive(Debug)]
pub struct Link {
    pub wait_for: Arc<Latch>,
    pub release: Arc<Latch>,
}

/// Linked sequence of ordering tokens, one per submitted block.
///
/// Token `n` is awaited by block `n + 1` and fired by block `n`. The head is a
/// pre-fired latch, so block 0 appends as soon as it is compressed. Each link
/// only references its predecessor: there is no shared counter and no
/// "next to write" queue.
#[derive(Debug)]
pub struct OrderingChain {
    tail: Arc<Latch>,
    links: u64,
}

impl OrderingChain {
    pub fn new() -> Self {
        Self {
            tail: Arc::new(Latch::fired()),
            links: 0,
        }
    }

    /// Extend the chain by one link.
    pub fn next_link(&mut self) -> Link {
        let release = Arc::new(Latch::new());
        let wait_for = std::mem::replace(&mut self.tail, Arc::clone(&release));
        self.links += 1;
        Link { wait_for, release }
    }

    /// The most recently created token. It fires once every block handed out
    /// so far has been appended.
    pub fn tail(&self) -> &Arc<Latch> {
        &self.tail
    }

    /// Number of links handed out.
    pub fn len(&self) -> u64 {
        self.links
    }

    pub fn is_empty(&self) -> bool {
        self.links == 0
    }
}

impl Default for OrderingChain {
    fn default() -> Self {
        Self::new()
    }
}
