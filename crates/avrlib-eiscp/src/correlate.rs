//! Pending command correlation.
//!
//! Responses are not tagged with a request id; the only correlation key is
//! the 3-character group code echoed back in the status message. The map
//! keeps at most one waiter per group. Registering a waiter for an occupied
//! group completes the previous one with
//! [`Error::Superseded`](avrlib_core::Error::Superseded) -- interleaved
//! commands within one group are a documented limitation of the protocol,
//! not a queue.

use std::collections::HashMap;

use tokio::sync::oneshot;

use avrlib_core::error::{Error, Result};
use avrlib_core::types::PropertyValue;

/// A waiter registered for the next decoded value of one group.
struct PendingSlot {
    ticket: u64,
    tx: oneshot::Sender<Result<PropertyValue>>,
}

/// Single-slot-per-group map of outstanding commands.
#[derive(Default)]
pub(crate) struct PendingCommands {
    slots: HashMap<String, PendingSlot>,
    next_ticket: u64,
}

impl PendingCommands {
    /// Register a waiter for `group`, superseding any existing one.
    ///
    /// Returns the waiter's ticket (used by [`cancel`](Self::cancel)) and
    /// the receiving end of the slot.
    pub fn register(&mut self, group: &str) -> (u64, oneshot::Receiver<Result<PropertyValue>>) {
        let ticket = self.next_ticket;
        self.next_ticket += 1;

        let (tx, rx) = oneshot::channel();
        if let Some(old) = self.slots.insert(group.to_string(), PendingSlot { ticket, tx }) {
            tracing::debug!(group, "Superseding pending command");
            let _ = old.tx.send(Err(Error::Superseded));
        }
        (ticket, rx)
    }

    /// Complete the waiter for `group` with a decoded value, if one exists.
    pub fn resolve(&mut self, group: &str, value: PropertyValue) {
        if let Some(slot) = self.slots.remove(group) {
            let _ = slot.tx.send(Ok(value));
        }
    }

    /// Remove the waiter for `group`, but only if it still belongs to
    /// `ticket`.
    ///
    /// A timed-out caller cancels its own slot; if a newer command already
    /// took the slot over, it is left untouched.
    pub fn cancel(&mut self, group: &str, ticket: u64) {
        if self.slots.get(group).is_some_and(|s| s.ticket == ticket) {
            self.slots.remove(group);
        }
    }

    /// Fail every outstanding waiter with [`Error::ConnectionLost`].
    pub fn fail_all(&mut self) {
        for (_, slot) in self.slots.drain() {
            let _ = slot.tx.send(Err(Error::ConnectionLost));
        }
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.slots.len()
    }
}
