//! Relay scheduler state machine.
//!
//! The scheduler decides *what* to actuate and *when*; it never touches a
//! timer itself. Each event returns a [`TimerCommand`] that the runtime
//! applies to its single timer slot, which keeps this module synchronous and
//! deterministic under a test clock.
//!
//! ```text
//! Uninitialized ──payload──▶ AwaitingNext ──fire, none left──▶ NoFutureSchedule
//!                               ▲    │                               │
//!                               │    └──drift──▶ Disarmed            │
//!                               └───────────payload with entry───────┘
//! ```
//! A revision change re-plans from any phase.

use std::collections::HashMap;
use std::panic::{AssertUnwindSafe, catch_unwind};

use tracing::{error, info, warn};

use crate::schedule::{
    ControlPayload, FetchMetadata, RelayState, ScheduleEntry, ScheduleStore, Timestamp,
};

use super::sink::ActuationSink;

/// Entries closer than this to "now" are never armed.
///
/// Covers fetch latency and skew between remote timestamps and the local clock.
pub const LOOKAHEAD_GUARD_SECS: i64 = 30;

/// The transition the armed timer will apply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingActuation {
    pub channel_id: String,
    pub entry: ScheduleEntry,
}

impl PendingActuation {
    /// Absolute time the timer targets.
    pub fn at(&self) -> Timestamp {
        self.entry.timestamp
    }
}

/// Where the scheduler stands with respect to the next transition.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum SchedulerPhase {
    /// No payload has been seen yet.
    #[default]
    Uninitialized,
    /// A timer is armed for a known future entry.
    AwaitingNext(PendingActuation),
    /// Payload known, but no entry lies beyond the look-ahead guard.
    NoFutureSchedule,
    /// Drift was corrected and the timer dropped. Planning resumes only after
    /// a revision change.
    Disarmed,
}

impl SchedulerPhase {
    /// Whether the next fetch must perform initial planning.
    pub fn needs_replan(&self) -> bool {
        matches!(self, Self::Uninitialized | Self::NoFutureSchedule)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Uninitialized => "uninitialized",
            Self::AwaitingNext(_) => "awaiting_next",
            Self::NoFutureSchedule => "no_future_schedule",
            Self::Disarmed => "disarmed",
        }
    }
}

/// What the runtime must do with its timer slot after an event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TimerCommand {
    /// Leave the slot as it is.
    Keep,
    /// Cancel whatever is armed.
    Cancel,
    /// Cancel whatever is armed, then arm for this actuation.
    Arm(PendingActuation),
}

/// Single-channel relay scheduler.
#[derive(Debug, Default)]
pub struct RelayScheduler {
    store: ScheduleStore,
    observed: HashMap<String, RelayState>,
    phase: SchedulerPhase,
}

impl RelayScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Handles a successfully fetched payload.
    ///
    /// A revision change (or a pending re-plan) actuates the reported current
    /// state and arms the first entry beyond the guard. In steady state only a
    /// drift check runs: if the remote state differs from what was last
    /// commanded, the timer is cancelled and the channel forced to the remote
    /// state without re-planning.
    pub fn on_payload_fetched(
        &mut self,
        payload: ControlPayload,
        metadata: Option<FetchMetadata>,
        now: Timestamp,
        sink: &dyn ActuationSink,
    ) -> TimerCommand {
        let revision = payload.revision;
        if self.store.replace(payload, metadata) {
            info!(revision, "control revision changed, re-planning");
            return self.plan_initial(now, sink);
        }
        if self.phase.needs_replan() {
            return self.plan_initial(now, sink);
        }
        self.check_drift(sink)
    }

    /// Handles the armed timer firing for `entry`.
    ///
    /// Applies the entry, then arms the next entry beyond the guard from the
    /// current payload, or falls back to waiting for the next fetch.
    pub fn on_timer_fire(
        &mut self,
        channel_id: &str,
        entry: &ScheduleEntry,
        now: Timestamp,
        sink: &dyn ActuationSink,
    ) -> TimerCommand {
        self.actuate(channel_id, entry.state, sink);
        self.arm_next(channel_id, now)
    }

    fn plan_initial(&mut self, now: Timestamp, sink: &dyn ActuationSink) -> TimerCommand {
        let Some((channel_id, state)) = self
            .store
            .payload()
            .map(|p| (p.channel_id.clone(), p.current_state))
        else {
            return TimerCommand::Keep;
        };
        self.actuate(&channel_id, state, sink);
        self.arm_next(&channel_id, now)
    }

    fn arm_next(&mut self, channel_id: &str, now: Timestamp) -> TimerCommand {
        let next = self
            .store
            .payload()
            .and_then(|p| p.first_entry_after(now + LOOKAHEAD_GUARD_SECS));
        match next {
            Some(entry) => {
                let pending = PendingActuation {
                    channel_id: channel_id.to_string(),
                    entry,
                };
                self.phase = SchedulerPhase::AwaitingNext(pending.clone());
                TimerCommand::Arm(pending)
            }
            None => {
                info!("no future schedule entry, waiting for the next fetch");
                self.phase = SchedulerPhase::NoFutureSchedule;
                TimerCommand::Cancel
            }
        }
    }

    fn check_drift(&mut self, sink: &dyn ActuationSink) -> TimerCommand {
        let Some((channel_id, state)) = self
            .store
            .payload()
            .map(|p| (p.channel_id.clone(), p.current_state))
        else {
            return TimerCommand::Keep;
        };
        let observed = self.observed.get(&channel_id).copied();
        if observed == Some(state) {
            return TimerCommand::Keep;
        }
        warn!(
            channel = %channel_id,
            observed = ?observed,
            remote = %state,
            "relay state drifted from remote, forcing update"
        );
        self.actuate(&channel_id, state, sink);
        self.phase = SchedulerPhase::Disarmed;
        TimerCommand::Cancel
    }

    fn actuate(&mut self, channel_id: &str, state: RelayState, sink: &dyn ActuationSink) {
        info!(channel = channel_id, %state, "setting relay");
        self.observed.insert(channel_id.to_string(), state);
        if catch_unwind(AssertUnwindSafe(|| sink.set_channel(channel_id, state))).is_err() {
            error!(channel = channel_id, %state, "actuation sink panicked");
        }
    }

    /// State last commanded for `channel_id`.
    pub fn observed_state(&self, channel_id: &str) -> Option<RelayState> {
        self.observed.get(channel_id).copied()
    }

    /// Target time of the armed timer, if any.
    pub fn next_actuation_time(&self) -> Option<Timestamp> {
        match &self.phase {
            SchedulerPhase::AwaitingNext(pending) => Some(pending.at()),
            _ => None,
        }
    }

    pub fn phase(&self) -> &SchedulerPhase {
        &self.phase
    }

    pub fn store(&self) -> &ScheduleStore {
        &self.store
    }
}

/// Formats the time until the next actuation as `"{h}h{m}m"` or `"{m}m"`.
///
/// Returns an empty string when nothing is scheduled; an overdue actuation
/// reads as `"0m"`.
pub fn format_time_to_next(next: Option<Timestamp>, now: Timestamp) -> String {
    let Some(next) = next else {
        return String::new();
    };
    let delta = (next - now).max(0);
    let hours = delta / 3600;
    let minutes = (delta / 60) % 60;
    if hours > 0 {
        format!("{hours}h{minutes}m")
    } else {
        format!("{minutes}m")
    }
}
