//! Fixed-grid projection of the control schedule for display consumers.
//!
//! The projection is never used for actuation timing; it only answers "what
//! state should the channel be in during bucket `t`".

use std::collections::BTreeMap;

use serde::Serialize;

use super::types::{ControlPayload, FetchMetadata, PriceInterval, RelayState, Timestamp};

/// Default bucket width (15 minutes).
pub const DEFAULT_RESOLUTION_SECS: i64 = 900;

/// Remote timestamps may be off by about a minute; entries are pushed forward
/// by this much before snapping to the grid.
pub const ACTIVATION_SLACK_SECS: i64 = 180;

/// Longest window a projection covers, measured from the first bucket.
/// Covers the current and the next day whatever `valid_until` says.
pub const MAX_PROJECTION_SECS: i64 = 2 * 86_400;

/// Grid bucket at which a transition at `timestamp` is considered active.
pub fn activation_bucket(timestamp: Timestamp, resolution: i64) -> Timestamp {
    floor_to_grid(timestamp.saturating_add(ACTIVATION_SLACK_SECS), resolution)
}

fn floor_to_grid(t: Timestamp, resolution: i64) -> Timestamp {
    t.div_euclid(resolution).saturating_mul(resolution)
}

/// Projects the schedule onto a grid of `resolution`-second buckets.
///
/// Buckets cover `[floor(fetched_at), valid_until)`, cut off after
/// [`MAX_PROJECTION_SECS`]. Each bucket reports the
/// state of the most recently activated entry, or `current_state` before any
/// entry activates. Returns an empty map when metadata is missing or the
/// resolution is not positive.
///
/// # Examples
///
/// ```
/// use pricecutter::schedule::projection::project_timeline;
/// use pricecutter::schedule::types::{ControlPayload, FetchMetadata, RelayState, ScheduleEntry};
///
/// let payload = ControlPayload {
///     channel_id: "1".into(),
///     name: String::new(),
///     current_state: RelayState::On,
///     revision: 0,
///     schedule: vec![ScheduleEntry::new(1_800, RelayState::Off)],
/// };
/// let meta = FetchMetadata { fetched_at: 0, valid_until: 3_600 };
/// let timeline = project_timeline(&payload, Some(&meta), 900);
/// let states: Vec<_> = timeline.values().copied().collect();
/// assert_eq!(states, vec![RelayState::On, RelayState::On, RelayState::Off, RelayState::Off]);
/// ```
pub fn project_timeline(
    payload: &ControlPayload,
    metadata: Option<&FetchMetadata>,
    resolution: i64,
) -> BTreeMap<Timestamp, RelayState> {
    let mut buckets = BTreeMap::new();
    let Some(meta) = metadata else {
        return buckets;
    };
    if resolution <= 0 {
        return buckets;
    }

    let schedule = &payload.schedule;
    let mut state = payload.current_state;
    let mut next = 0;
    let mut t = floor_to_grid(meta.fetched_at, resolution);
    let end = meta
        .valid_until
        .min(t.saturating_add(MAX_PROJECTION_SECS));
    while t < end {
        // Entries activate in delivered order; stop at the first one still pending.
        while next < schedule.len() && activation_bucket(schedule[next].timestamp, resolution) <= t
        {
            state = schedule[next].state;
            next += 1;
        }
        buckets.insert(t, state);
        t = match t.checked_add(resolution) {
            Some(next_t) => next_t,
            None => break,
        };
    }
    buckets
}

/// One projected bucket joined with the spot price active at its start.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimelineBucket {
    pub start: Timestamp,
    pub state: RelayState,
    /// Spot price without tax in EUR/kWh, when known for this bucket.
    pub price: Option<f64>,
}

/// Joins a projected timeline with spot prices, in ascending bucket order.
pub fn annotate_with_prices(
    timeline: &BTreeMap<Timestamp, RelayState>,
    prices: &[PriceInterval],
) -> Vec<TimelineBucket> {
    timeline
        .iter()
        .map(|(&start, &state)| TimelineBucket {
            start,
            state,
            price: prices
                .iter()
                .find(|p| p.contains(start))
                .map(|p| p.price_no_tax),
        })
        .collect()
}
