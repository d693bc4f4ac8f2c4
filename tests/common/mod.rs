//! Shared test fixtures for integration tests.

#![allow(dead_code)]

use std::sync::{Arc, Mutex, PoisonError};

use pricecutter::config::ControllerConfig;
use pricecutter::engine::{ActuationSink, Clock, Engine, EngineSettings, ManualClock};
use pricecutter::schedule::{RelayState, Timestamp};

/// Generation time of the fixture payloads (2024-06-10T06:00:00Z).
pub const FETCHED_AT: Timestamp = 1_717_999_200;

/// End of the fixture validity window, six hours after `FETCHED_AT`.
pub const VALID_UNTIL: Timestamp = FETCHED_AT + 6 * 3600;

/// Control response body in the endpoint's wire format.
///
/// `schedule` holds `(timestamp, "0" | "1")` pairs; numbers are encoded as
/// strings the way the endpoint sends them.
pub fn control_body(revision: i64, state: &str, schedule: &[(Timestamp, &str)]) -> String {
    let entries: Vec<String> = schedule
        .iter()
        .map(|(t, s)| format!(r#"{{"timestamp":"{t}","state":"{s}"}}"#))
        .collect();
    format!(
        r#"{{"metadata":{{"mac":"AABBCCDDEEFF","channels":"1","timestamp":"{FETCHED_AT}","timestamp_offset":"10800","valid_until":"{VALID_UNTIL}"}},"controls":[{{"id":"1","name":"boiler","updated":"{revision}","state":"{state}","schedules":[{}]}}]}}"#,
        entries.join(",")
    )
}

/// Spot price body with `hours` hourly entries starting at `FETCHED_AT`.
///
/// Hour `h` costs `(h + 1)` cents per kWh without tax.
pub fn spot_body(hours: i64) -> String {
    let entries: Vec<String> = (0..hours)
        .map(|h| {
            let start = chrono::DateTime::from_timestamp(FETCHED_AT + h * 3600, 0)
                .map(|dt| dt.to_rfc3339())
                .unwrap_or_default();
            format!(
                r#"{{"Rank":{},"DateTime":"{start}","PriceNoTax":{},"PriceWithTax":{}}}"#,
                h + 1,
                (h + 1) as f64 / 100.0,
                (h + 1) as f64 * 1.255 / 100.0
            )
        })
        .collect();
    format!("[{}]", entries.join(","))
}

/// Valid configuration pointing both endpoints at `base_url`.
pub fn test_config(base_url: &str) -> ControllerConfig {
    let mut cfg = ControllerConfig::default();
    cfg.control.endpoint = format!("{base_url}/getcontrols.php");
    cfg.control.device_mac = "AABBCCDDEEFF".to_string();
    cfg.control.client = "pricecutter-test".to_string();
    cfg.control.timeout_secs = 5;
    cfg.spot.endpoint = format!("{base_url}/TodayAndDayForward");
    cfg
}

/// Sink that remembers every relay command in order.
#[derive(Debug, Default)]
pub struct RecordingSink {
    calls: Mutex<Vec<(String, RelayState)>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<(String, RelayState)> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

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

impl ActuationSink for RecordingSink {
    fn set_channel(&self, channel_id: &str, state: RelayState) {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((channel_id.to_string(), state));
    }
}

/// Engine wired to a recording sink and a manual clock at `now`.
///
/// Must be called inside a tokio runtime.
pub fn test_engine(now: Timestamp) -> (Engine, Arc<RecordingSink>, Arc<ManualClock>) {
    let sink = Arc::new(RecordingSink::new());
    let clock = Arc::new(ManualClock::new(now));
    let engine = Engine::new(
        EngineSettings::default(),
        Arc::clone(&sink) as Arc<dyn ActuationSink>,
        Arc::clone(&clock) as Arc<dyn Clock>,
    )
    .unwrap_or_else(|e| panic!("engine should build inside a runtime: {e}"));
    (engine, sink, clock)
}
