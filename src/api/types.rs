//! API response and query types.
//!
//! Prices are reported in EUR/MWh throughout, times as Unix seconds with an
//! RFC 3339 UTC label alongside.

use serde::{Deserialize, Serialize};

use crate::engine::EngineSnapshot;
use crate::schedule::types::utc_label;
use crate::schedule::{PriceInterval, RelayState, TimelineBucket, Timestamp};

/// Channel status as shown on the status page.
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub channel_id: String,
    /// Last commanded state; `None` before the first actuation.
    pub state: Option<RelayState>,
    pub phase: &'static str,
    pub next_actuation_at: Option<Timestamp>,
    pub next_actuation_utc: Option<String>,
    /// `"2h5m"`, `"45m"`, or empty when nothing is armed.
    pub time_to_next: String,
    pub revision: Option<i64>,
    pub fetched_at: Option<Timestamp>,
    pub valid_until: Option<Timestamp>,
    pub current_price_eur_mwh: Option<f64>,
    pub now: Timestamp,
}

impl From<EngineSnapshot> for StatusResponse {
    fn from(s: EngineSnapshot) -> Self {
        Self {
            next_actuation_utc: s.next_actuation_at.map(utc_label),
            channel_id: s.channel_id,
            state: s.state,
            phase: s.phase,
            next_actuation_at: s.next_actuation_at,
            time_to_next: s.time_to_next,
            revision: s.revision,
            fetched_at: s.fetched_at,
            valid_until: s.valid_until,
            current_price_eur_mwh: s.current_price_eur_mwh,
            now: s.now,
        }
    }
}

/// One projected bucket.
#[derive(Debug, Serialize)]
pub struct TimelineRecord {
    pub start: Timestamp,
    pub start_utc: String,
    pub state: RelayState,
    pub on: bool,
    pub price_eur_mwh: Option<f64>,
}

impl From<&TimelineBucket> for TimelineRecord {
    fn from(b: &TimelineBucket) -> Self {
        Self {
            start: b.start,
            start_utc: utc_label(b.start),
            state: b.state,
            on: b.state.is_on(),
            price_eur_mwh: b.price.map(|p| p * 1000.0),
        }
    }
}

/// One spot price interval.
#[derive(Debug, Serialize)]
pub struct PriceRecord {
    pub start: Timestamp,
    pub end: Timestamp,
    pub start_utc: String,
    pub price_eur_mwh: f64,
    pub price_with_tax_eur_mwh: Option<f64>,
    pub rank: Option<u32>,
}

impl From<&PriceInterval> for PriceRecord {
    fn from(p: &PriceInterval) -> Self {
        Self {
            start: p.start,
            end: p.end,
            start_utc: utc_label(p.start),
            price_eur_mwh: p.eur_per_mwh(),
            price_with_tax_eur_mwh: p.price_with_tax.map(|v| v * 1000.0),
            rank: p.rank,
        }
    }
}

/// Query parameters for `/timeline`.
#[derive(Debug, Deserialize)]
pub struct TimelineQuery {
    /// Bucket width in seconds; the configured default when omitted.
    pub resolution: Option<i64>,
}

/// Error body for rejected requests.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}
