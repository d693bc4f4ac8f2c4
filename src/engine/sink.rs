//! Actuation sink: the collaborator that physically switches the relay.

#[cfg(test)]
use std::sync::Mutex;

use tracing::info;

use crate::schedule::RelayState;

/// Receives every relay command the engine issues.
///
/// Called from the fetch task and from timer callbacks, always while the
/// engine lock is held, so implementations must be quick and must not call
/// back into the engine. Failures are the sink's own concern.
pub trait ActuationSink: Send + Sync {
    /// Drives `channel_id` to `state`.
    fn set_channel(&self, channel_id: &str, state: RelayState);
}

impl<F> ActuationSink for F
where
    F: Fn(&str, RelayState) + Send + Sync,
{
    fn set_channel(&self, channel_id: &str, state: RelayState) {
        self(channel_id, state);
    }
}

/// Stand-in relay that only logs, for running without hardware.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingSink;

impl ActuationSink for LoggingSink {
    fn set_channel(&self, channel_id: &str, state: RelayState) {
        info!(channel = channel_id, %state, "relay {state}");
    }
}

/// Sink that remembers every call in order.
#[cfg(test)]
#[derive(Debug, Default)]
pub(crate) struct RecordingSink {
    calls: Mutex<Vec<(String, RelayState)>>,
}

#[cfg(test)]
impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// All calls received so far.
    pub fn calls(&self) -> Vec<(String, RelayState)> {
        self.calls
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }

    /// Most recent state sent to any channel.
    pub fn last_state(&self) -> Option<RelayState> {
        self.calls().last().map(|(_, state)| *state)
    }

    pub fn len(&self) -> usize {
        self.calls().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
impl ActuationSink for RecordingSink {
    fn set_channel(&self, channel_id: &str, state: RelayState) {
        self.calls
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push((channel_id.to_string(), state));
    }
}
