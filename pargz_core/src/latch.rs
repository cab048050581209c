use std::sync::{Mutex, PoisonError};

use crossbeam::channel::{self, Receiver, Sender, TryRecvError};

use crate::error::Interrupted;

/// Single-fire rendezvous.
///
/// A latch starts unfired, fires exactly once, and stays fired. Firing is
/// modelled as the disconnection of a channel nobody ever sends on: dropping
/// the only [`Sender`] wakes every receiver blocked on it, and every later
/// receive returns immediately.
///
/// Latches serve two roles in the pipeline: each ordering token is a latch,
/// and so is the worker pool's cancellation signal.
pub struct Latch {
    trigger: Mutex<Option<Sender<()>>>,
    signal: Receiver<()>,
}

impl Latch {
    /// A latch that has not fired yet.
    pub fn new() -> Self {
        let (tx, rx) = channel::bounded(0);
        Self {
            trigger: Mutex::new(Some(tx)),
            signal: rx,
        }
    }

    /// A latch that is already fired. Used as the head of an ordering chain,
    /// so the first block never waits.
    pub fn fired() -> Self {
        let latch = Self::new();
        latch.fire();
        latch
    }

    /// Fire the latch. Only the first call has any effect.
    pub fn fire(&self) {
        // The guarded value is an Option that is only ever taken, so a
        // poisoned lock still holds a consistent value.
        let sender = self
            .trigger
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        drop(sender);
    }

    pub fn is_fired(&self) -> bool {
        matches!(self.signal.try_recv(), Err(TryRecvError::Disconnected))
    }

    /// Block until this latch fires, or until `cancel` fires.
    ///
    /// Cancellation takes precedence: if `cancel` has fired by the time the
    /// wait returns, the result is [`Interrupted`] even when this latch fired
    /// as well.
    pub fn wait(&self, cancel: &Latch) -> Result<(), Interrupted> {
        if cancel.is_fired() {
            return Err(Interrupted);
        }
        if !self.is_fired() {
            channel::select! {
                recv(self.signal) -> _ => {},
                recv(cancel.signal) -> _ => {},
            }
        }
        if cancel.is_fired() {
            Err(Interrupted)
        } else {
            Ok(())
        }
    }
}

impl Default for Latch {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Latch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Latch")
            .field("fired", &self.is_fired())
            .finish()
    }
}
