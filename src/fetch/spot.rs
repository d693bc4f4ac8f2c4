//! Client for the day-ahead spot price endpoint.
//!
//! Prices are advisory: they feed the status surface only and never gate
//! the schedule fetch or actuation.

use std::time::Duration;

use chrono::DateTime;
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use crate::error::FetchError;
use crate::schedule::PriceInterval;

/// Interval length assumed for a lone price entry.
const DEFAULT_INTERVAL_SECS: i64 = 3600;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct SpotPriceWire {
    date_time: String,
    price_no_tax: f64,
    #[serde(default)]
    price_with_tax: Option<f64>,
    #[serde(default)]
    rank: Option<u32>,
}

/// Decodes a `TodayAndDayForward` response into ascending price intervals.
///
/// Each interval ends where the next begins; the last one reuses the length
/// of the one before it.
///
/// # Errors
///
/// Returns [`FetchError::Malformed`] on invalid JSON or timestamps.
pub fn decode_spot_prices(body: &[u8]) -> Result<Vec<PriceInterval>, FetchError> {
    let wire: Vec<SpotPriceWire> =
        serde_json::from_slice(body).map_err(|e| FetchError::malformed(e.to_string()))?;

    let mut starts = Vec::with_capacity(wire.len());
    for entry in wire {
        let start = DateTime::parse_from_rfc3339(&entry.date_time)
            .map_err(|e| FetchError::malformed(format!("bad DateTime {:?}: {e}", entry.date_time)))?
            .timestamp();
        starts.push((start, entry));
    }
    starts.sort_by_key(|(start, _)| *start);

    let mut intervals: Vec<PriceInterval> = Vec::with_capacity(starts.len());
    for i in 0..starts.len() {
        let start = starts[i].0;
        let end = match (starts.get(i + 1), i.checked_sub(1).and_then(|p| starts.get(p))) {
            (Some((next, _)), _) => *next,
            (None, Some((prev, _))) => start + (start - prev),
            (None, None) => start + DEFAULT_INTERVAL_SECS,
        };
        let entry = &starts[i].1;
        intervals.push(PriceInterval {
            start,
            end,
            price_no_tax: entry.price_no_tax,
            price_with_tax: entry.price_with_tax,
            rank: entry.rank,
        });
    }
    Ok(intervals)
}

/// Fetches the spot price series.
pub struct SpotClient {
    http: Client,
    endpoint: String,
}

impl SpotClient {
    /// # Errors
    ///
    /// Returns [`FetchError::Http`] if the HTTP client cannot be built.
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self, FetchError> {
        Ok(Self {
            http: Client::builder().timeout(timeout).build()?,
            endpoint: endpoint.into(),
        })
    }

    /// Fetches and decodes the current price series.
    ///
    /// # Errors
    ///
    /// Returns a [`FetchError`] on transport failure, non-200 status, or an
    /// undecodable body.
    pub async fn fetch(&self) -> Result<Vec<PriceInterval>, FetchError> {
        debug!(endpoint = %self.endpoint, "fetching spot prices");
        let response = self.http.get(&self.endpoint).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }
        let body = response.bytes().await?;
        decode_spot_prices(&body)
    }
}
