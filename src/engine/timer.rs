//! Single-shot deferred callback with race-free cancellation.

use std::time::Duration;

use tokio::runtime::Handle;
use tokio::task::JoinHandle;

/// Slot holding at most one armed timer.
///
/// Every arm or cancel bumps a generation counter. The firing task must call
/// [`TimerSlot::release`] with its generation while holding the same lock as
/// the slot; a stale generation means the timer was cancelled or replaced and
/// the callback must do nothing. Cancelling also aborts the sleeping task.
#[derive(Debug, Default)]
pub struct TimerSlot {
    generation: u64,
    handle: Option<JoinHandle<()>>,
}

impl TimerSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cancels any armed timer, then arms a new one.
    ///
    /// `on_fire` receives the generation it was armed with after `delay`.
    pub fn arm<F>(&mut self, runtime: &Handle, delay: Duration, on_fire: F) -> u64
    where
        F: FnOnce(u64) + Send + 'static,
    {
        self.cancel();
        let generation = self.generation;
        self.handle = Some(runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            on_fire(generation);
        }));
        generation
    }

    /// Cancels the armed timer, if any. Idempotent.
    pub fn cancel(&mut self) {
        self.generation = self.generation.wrapping_add(1);
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }

    /// Claims the slot for a firing callback.
    ///
    /// Returns `true` (and empties the slot) only if `generation` is still the
    /// armed one.
    pub fn release(&mut self, generation: u64) -> bool {
        if self.handle.is_none() || self.generation != generation {
            return false;
        }
        self.handle = None;
        true
    }

    /// Whether a timer is currently armed.
    pub fn is_armed(&self) -> bool {
        self.handle.is_some()
    }
}

impl Drop for TimerSlot {
    fn drop(&mut self) {
        self.cancel();
    }
}
