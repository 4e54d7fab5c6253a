//! Inbound message dispatch.
//!
//! Every decoded payload is split into its group code and parameter, run
//! through the injected decoder table, and fanned out three ways: the state
//! cache, the pending-command slot for the group, and the event broadcast
//! channel. Messages that cannot be classified never fail the session --
//! they become observational events.

use std::sync::Arc;

use tokio::sync::{broadcast, Mutex};

use avrlib_core::events::DeviceEvent;

use crate::correlate::PendingCommands;
use crate::decoders::DecoderTable;
use crate::state::DeviceState;

/// Length of the group code prefix in every ISCP message.
const GROUP_LEN: usize = 3;

/// Routes decoded payloads to state, pending commands, and subscribers.
pub(crate) struct Dispatcher {
    decoders: DecoderTable,
    state: Arc<Mutex<DeviceState>>,
    pending: Arc<Mutex<PendingCommands>>,
    event_tx: broadcast::Sender<DeviceEvent>,
}

impl Dispatcher {
    pub fn new(
        decoders: DecoderTable,
        state: Arc<Mutex<DeviceState>>,
        pending: Arc<Mutex<PendingCommands>>,
        event_tx: broadcast::Sender<DeviceEvent>,
    ) -> Self {
        Self {
            decoders,
            state,
            pending,
            event_tx,
        }
    }

    /// Classify and fan out one inbound message.
    ///
    /// Messages are processed strictly in the order frames were extracted;
    /// the caller (the session's reader task) is the only invoker.
    pub async fn dispatch(&self, payload: &str) {
        if payload.len() < GROUP_LEN || !payload.is_char_boundary(GROUP_LEN) {
            tracing::debug!(payload, "Message too short for a group code");
            let _ = self.event_tx.send(DeviceEvent::Unrecognized {
                payload: payload.to_string(),
            });
            return;
        }

        let (group, parameter) = payload.split_at(GROUP_LEN);
        tracing::trace!(group, parameter, "RX");

        match self.decoders.decode(group, parameter) {
            None => {
                tracing::debug!(group, parameter, "No decoder for group");
                let _ = self.event_tx.send(DeviceEvent::Unrecognized {
                    payload: payload.to_string(),
                });
            }
            Some(Err(e)) => {
                tracing::debug!(group, parameter, error = %e, "Parameter decode failed");
                let _ = self.event_tx.send(DeviceEvent::DecodeFailed {
                    group: group.to_string(),
                    parameter: parameter.to_string(),
                });
            }
            Some(Ok(value)) => {
                self.state.lock().await.update(group, value.clone());
                self.pending.lock().await.resolve(group, value.clone());
                let _ = self.event_tx.send(DeviceEvent::Property {
                    group: group.to_string(),
                    value,
                });
            }
        }
    }
}
