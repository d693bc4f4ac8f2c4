//! Engine runtime: shared state, the periodic fetch loop, and timer execution.
//!
//! All mutable state lives in one [`EngineState`] behind one mutex. The fetch
//! loop performs network I/O without holding the lock and only takes it to
//! apply a completed result; timer callbacks take the same lock before they
//! act, so a fetch completion and a timer fire are strictly ordered.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use serde::Serialize;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::config::ControllerConfig;
use crate::error::{EngineError, FetchError};
use crate::fetch::{FetchSource, FetchedControls, Fetcher};
use crate::schedule::projection::DEFAULT_RESOLUTION_SECS;
use crate::schedule::{
    ControlPayload, FetchMetadata, PriceInterval, RelayState, TimelineBucket, Timestamp,
    annotate_with_prices, project_timeline,
};

use super::clock::Clock;
use super::scheduler::{
    PendingActuation, RelayScheduler, SchedulerPhase, TimerCommand, format_time_to_next,
};
use super::sink::ActuationSink;
use super::timer::TimerSlot;

/// Default period of the fetch loop.
pub const DEFAULT_FETCH_INTERVAL: Duration = Duration::from_secs(300);

/// Engine tuning knobs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineSettings {
    /// Channel reported by the status surface.
    pub channel: String,
    /// Period of the fetch loop.
    pub fetch_interval: Duration,
    /// Default projection resolution in seconds.
    pub resolution: i64,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            channel: "1".to_string(),
            fetch_interval: DEFAULT_FETCH_INTERVAL,
            resolution: DEFAULT_RESOLUTION_SECS,
        }
    }
}

impl EngineSettings {
    pub fn from_config(config: &ControllerConfig) -> Self {
        Self {
            channel: config.engine.channel.clone(),
            fetch_interval: Duration::from_secs(config.engine.fetch_interval_secs),
            resolution: config.engine.resolution_secs,
        }
    }
}

/// Everything the fetch cycle and the actuation timer mutate.
#[derive(Debug, Default)]
struct EngineState {
    scheduler: RelayScheduler,
    timer: TimerSlot,
    spot_prices: Vec<PriceInterval>,
}

struct Shared {
    state: Mutex<EngineState>,
    settings: EngineSettings,
    sink: Arc<dyn ActuationSink>,
    clock: Arc<dyn Clock>,
    runtime: Handle,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, EngineState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn apply_control_fetch(self: &Arc<Self>, result: Result<FetchedControls, FetchError>) {
        let fetched = match result {
            Ok(fetched) => fetched,
            Err(e) => {
                warn!(error = %e, "control fetch failed, keeping previous schedule");
                return;
            }
        };
        if fetched.source == FetchSource::Cache {
            debug!(revision = fetched.payload.revision, "using cached control payload");
        }
        if fetched.payload.channel_id != self.settings.channel {
            warn!(
                configured = %self.settings.channel,
                remote = %fetched.payload.channel_id,
                "remote channel differs from the configured one"
            );
        }

        let mut guard = self.lock();
        let state = &mut *guard;
        let now = self.clock.now();
        let command = state.scheduler.on_payload_fetched(
            fetched.payload,
            fetched.metadata,
            now,
            self.sink.as_ref(),
        );
        self.apply_timer(state, command, now);
    }

    fn apply_price_fetch(&self, result: Result<Vec<PriceInterval>, FetchError>) {
        match result {
            Ok(prices) => {
                debug!(intervals = prices.len(), "spot prices updated");
                self.lock().spot_prices = prices;
            }
            Err(e) => warn!(error = %e, "spot price fetch failed"),
        }
    }

    /// Applies a scheduler decision to the timer slot. Caller holds the lock.
    fn apply_timer(self: &Arc<Self>, state: &mut EngineState, command: TimerCommand, now: Timestamp) {
        match command {
            TimerCommand::Keep => {}
            TimerCommand::Cancel => state.timer.cancel(),
            TimerCommand::Arm(pending) => {
                let delay = Duration::from_secs(u64::try_from(pending.at() - now).unwrap_or(0));
                info!(
                    channel = %pending.channel_id,
                    state = %pending.entry.state,
                    at = pending.at(),
                    delay_secs = delay.as_secs(),
                    "actuation timer armed"
                );
                let weak: Weak<Self> = Arc::downgrade(self);
                state.timer.arm(&self.runtime, delay, move |generation| {
                    if let Some(shared) = weak.upgrade() {
                        shared.fire(generation, &pending);
                    }
                });
            }
        }
    }

    fn fire(self: &Arc<Self>, generation: u64, pending: &PendingActuation) {
        let mut guard = self.lock();
        let state = &mut *guard;
        if !state.timer.release(generation) {
            debug!(generation, "stale actuation timer ignored");
            return;
        }
        let now = self.clock.now();
        let command = state.scheduler.on_timer_fire(
            &pending.channel_id,
            &pending.entry,
            now,
            self.sink.as_ref(),
        );
        self.apply_timer(state, command, now);
    }

    /// Each result is applied as soon as its own request completes, so a slow
    /// price endpoint never holds back the schedule.
    async fn run_fetch_cycle(self: &Arc<Self>, fetcher: &Fetcher) {
        let last_request = self.lock().scheduler.store().fetched_at();
        let controls = async {
            let result = fetcher.control.fetch(last_request).await;
            self.apply_control_fetch(result);
        };
        let prices = async {
            if let Some(client) = &fetcher.spot {
                let result = client.fetch().await;
                self.apply_price_fetch(result);
            }
        };
        tokio::join!(controls, prices);
    }

    /// Copies what the projector needs so it runs without the lock held.
    fn projection_input(&self) -> Option<(ControlPayload, Option<FetchMetadata>)> {
        let state = self.lock();
        let store = state.scheduler.store();
        store
            .payload()
            .map(|payload| (payload.clone(), store.metadata().copied()))
    }
}

/// Point-in-time view of the engine for status consumers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EngineSnapshot {
    pub channel_id: String,
    /// Last state commanded to the channel.
    pub state: Option<RelayState>,
    pub phase: &'static str,
    pub next_actuation_at: Option<Timestamp>,
    pub time_to_next: String,
    pub revision: Option<i64>,
    pub fetched_at: Option<Timestamp>,
    pub valid_until: Option<Timestamp>,
    /// Spot price without tax in EUR/MWh for the current interval.
    pub current_price_eur_mwh: Option<f64>,
    pub now: Timestamp,
}

/// A running relay controller.
///
/// Created inside a tokio runtime; [`Engine::start`] spawns the fetch loop,
/// [`Engine::shutdown`] (or dropping the engine) stops it and cancels any
/// pending actuation.
pub struct Engine {
    shared: Arc<Shared>,
    fetch_task: Mutex<Option<JoinHandle<()>>>,
}

impl Engine {
    /// # Errors
    ///
    /// Returns [`EngineError::NoRuntime`] when called outside a tokio runtime.
    pub fn new(
        settings: EngineSettings,
        sink: Arc<dyn ActuationSink>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, EngineError> {
        let runtime = Handle::try_current().map_err(|_| EngineError::NoRuntime)?;
        Ok(Self {
            shared: Arc::new(Shared {
                state: Mutex::new(EngineState::default()),
                settings,
                sink,
                clock,
                runtime,
            }),
            fetch_task: Mutex::new(None),
        })
    }

    /// Feeds one control fetch result through the scheduler.
    ///
    /// Failures are logged and leave the previous schedule untouched.
    pub fn apply_control_fetch(&self, result: Result<FetchedControls, FetchError>) {
        self.shared.apply_control_fetch(result);
    }

    /// Replaces the spot price series, or logs the failure.
    pub fn apply_price_fetch(&self, result: Result<Vec<PriceInterval>, FetchError>) {
        self.shared.apply_price_fetch(result);
    }

    /// Runs one fetch cycle: control and spot prices concurrently, each applied
    /// when it completes.
    pub async fn run_fetch_cycle(&self, fetcher: &Fetcher) {
        self.shared.run_fetch_cycle(fetcher).await;
    }

    /// Spawns the periodic fetch loop. The first cycle runs immediately.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::AlreadyStarted`] if the loop is already running.
    pub fn start(&self, fetcher: Fetcher) -> Result<(), EngineError> {
        let mut task = self
            .fetch_task
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if task.is_some() {
            return Err(EngineError::AlreadyStarted);
        }

        let shared = Arc::clone(&self.shared);
        let period = shared.settings.fetch_interval.max(Duration::from_secs(1));
        info!(period_secs = period.as_secs(), "starting fetch loop");
        *task = Some(self.shared.runtime.spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                shared.run_fetch_cycle(&fetcher).await;
            }
        }));
        Ok(())
    }

    /// Stops the fetch loop and cancels the pending actuation. Idempotent.
    pub fn shutdown(&self) {
        let task = self
            .fetch_task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(task) = task {
            task.abort();
            info!("fetch loop stopped");
        }
        self.shared.lock().timer.cancel();
    }

    pub fn is_running(&self) -> bool {
        self.fetch_task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.shared.settings
    }

    /// State last commanded for `channel_id`.
    pub fn current_state(&self, channel_id: &str) -> Option<RelayState> {
        self.shared.lock().scheduler.observed_state(channel_id)
    }

    pub fn next_actuation_time(&self) -> Option<Timestamp> {
        self.shared.lock().scheduler.next_actuation_time()
    }

    /// Time until the armed actuation, formatted as `"2h5m"` or `"45m"`;
    /// empty when nothing is armed.
    pub fn time_to_next_actuation(&self) -> String {
        let next = self.next_actuation_time();
        format_time_to_next(next, self.shared.clock.now())
    }

    pub fn phase(&self) -> SchedulerPhase {
        self.shared.lock().scheduler.phase().clone()
    }

    /// Whether an actuation timer is currently armed.
    pub fn timer_armed(&self) -> bool {
        self.shared.lock().timer.is_armed()
    }

    /// Projection of the current payload onto `resolution`-second buckets.
    pub fn projected_timeline(&self, resolution: i64) -> BTreeMap<Timestamp, RelayState> {
        match self.shared.projection_input() {
            Some((payload, metadata)) => project_timeline(&payload, metadata.as_ref(), resolution),
            None => BTreeMap::new(),
        }
    }

    /// Projected timeline joined with the current spot prices.
    pub fn price_timeline(&self, resolution: i64) -> Vec<TimelineBucket> {
        let timeline = self.projected_timeline(resolution);
        annotate_with_prices(&timeline, &self.spot_prices())
    }

    pub fn spot_prices(&self) -> Vec<PriceInterval> {
        self.shared.lock().spot_prices.clone()
    }

    /// Consistent view of the status fields, taken under one lock.
    pub fn snapshot(&self) -> EngineSnapshot {
        let now = self.shared.clock.now();
        let state = self.shared.lock();
        let scheduler = &state.scheduler;
        let channel_id = self.shared.settings.channel.clone();
        let next = scheduler.next_actuation_time();
        let metadata = scheduler.store().metadata().copied();
        EngineSnapshot {
            state: scheduler.observed_state(&channel_id),
            channel_id,
            phase: scheduler.phase().name(),
            next_actuation_at: next,
            time_to_next: format_time_to_next(next, now),
            revision: scheduler.store().last_revision_seen(),
            fetched_at: metadata.map(|m| m.fetched_at),
            valid_until: metadata.map(|m| m.valid_until),
            current_price_eur_mwh: state
                .spot_prices
                .iter()
                .find(|p| p.contains(now))
                .map(PriceInterval::eur_per_mwh),
            now,
        }
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        self.shutdown();
    }
}
