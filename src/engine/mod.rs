//! Relay scheduling engine: the scheduler state machine, its timer, and the
//! runtime that drives both from the fetch loop.

/// Wall-clock abstraction.
pub mod clock;
pub mod runtime;
pub mod scheduler;
pub mod sink;
pub mod timer;

pub use clock::{Clock, ManualClock, SystemClock};
pub use runtime::{Engine, EngineSettings, EngineSnapshot};
pub use scheduler::{
    LOOKAHEAD_GUARD_SECS, PendingActuation, RelayScheduler, SchedulerPhase, TimerCommand,
    format_time_to_next,
};
pub use sink::{ActuationSink, LoggingSink};
pub use timer::TimerSlot;
