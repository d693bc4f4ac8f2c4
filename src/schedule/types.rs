//! Control schedule data model and decoding of the control endpoint response.

use std::fmt;

use chrono::{DateTime, SecondsFormat};
use serde::{Deserialize, Serialize};

use crate::error::FetchError;

/// Absolute wall-clock time in Unix seconds.
pub type Timestamp = i64;

/// Formats `t` as an RFC 3339 UTC label, e.g. `2024-06-10T06:15:00Z`.
///
/// Out-of-range timestamps yield an empty string.
pub fn utc_label(t: Timestamp) -> String {
    DateTime::from_timestamp(t, 0)
        .map(|dt| dt.to_rfc3339_opts(SecondsFormat::Secs, true))
        .unwrap_or_default()
}

/// Desired or observed state of the relay channel.
///
/// The control endpoint encodes states as the tokens `"0"` and `"1"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RelayState {
    Off,
    On,
}

impl RelayState {
    /// Parses a remote state token. Returns `None` for anything but `0`/`1`.
    pub fn from_token(token: &str) -> Option<Self> {
        match token.trim() {
            "0" => Some(Self::Off),
            "1" => Some(Self::On),
            _ => None,
        }
    }

    /// Token used by the control endpoint for this state.
    pub fn as_token(self) -> &'static str {
        match self {
            Self::Off => "0",
            Self::On => "1",
        }
    }

    pub fn is_on(self) -> bool {
        self == Self::On
    }
}

impl fmt::Display for RelayState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Off => write!(f, "off"),
            Self::On => write!(f, "on"),
        }
    }
}

/// One scheduled transition of the channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ScheduleEntry {
    /// When the transition should happen.
    pub timestamp: Timestamp,
    /// State the channel should take at `timestamp`.
    pub state: RelayState,
}

impl ScheduleEntry {
    pub fn new(timestamp: Timestamp, state: RelayState) -> Self {
        Self { timestamp, state }
    }
}

/// Control payload for the single managed channel.
///
/// Replaced wholesale on every successful fetch; `schedule` is kept in the
/// order the remote delivered it (ascending by timestamp).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ControlPayload {
    /// Channel (relay) identifier.
    pub channel_id: String,
    /// Optional display name configured remotely.
    pub name: String,
    /// State the remote currently considers authoritative.
    pub current_state: RelayState,
    /// Configuration revision; changes when the remote configuration changes.
    pub revision: i64,
    /// Future transitions, ascending by timestamp.
    pub schedule: Vec<ScheduleEntry>,
}

impl ControlPayload {
    /// First entry (in delivered order) whose timestamp is strictly after `threshold`.
    pub fn first_entry_after(&self, threshold: Timestamp) -> Option<ScheduleEntry> {
        self.schedule
            .iter()
            .find(|entry| entry.timestamp > threshold)
            .copied()
    }
}

/// Validity window of a fetched payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FetchMetadata {
    /// Server-side generation time of the payload.
    pub fetched_at: Timestamp,
    /// End of the period the schedule covers.
    pub valid_until: Timestamp,
}

/// One priced interval of the spot market.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PriceInterval {
    /// Interval start (inclusive).
    pub start: Timestamp,
    /// Interval end (exclusive).
    pub end: Timestamp,
    /// Price without tax in EUR/kWh.
    pub price_no_tax: f64,
    /// Price including tax in EUR/kWh, when published.
    pub price_with_tax: Option<f64>,
    /// Cheapness rank within the day (1 = cheapest), when published.
    pub rank: Option<u32>,
}

impl PriceInterval {
    /// Returns `true` when `t` falls within `[start, end)`.
    pub fn contains(&self, t: Timestamp) -> bool {
        t >= self.start && t < self.end
    }

    /// Price without tax converted to EUR/MWh.
    pub fn eur_per_mwh(&self) -> f64 {
        self.price_no_tax * 1000.0
    }
}

/// Decoded control response: payload plus its validity window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControlDocument {
    pub payload: ControlPayload,
    /// `None` when the response carried no usable metadata.
    pub metadata: Option<FetchMetadata>,
}

// The endpoint sends most numbers as JSON strings, but not reliably.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Scalar {
    Int(i64),
    Float(f64),
    Text(String),
}

impl Scalar {
    fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(v) => Some(*v),
            Self::Float(v) => Some(*v as i64),
            Self::Text(s) => s.trim().parse().ok(),
        }
    }

    fn as_text(&self) -> String {
        match self {
            Self::Int(v) => v.to_string(),
            Self::Float(v) => v.to_string(),
            Self::Text(s) => s.clone(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ControlResponseWire {
    metadata: Option<MetadataWire>,
    controls: Option<Vec<ControlWire>>,
}

#[derive(Debug, Deserialize)]
struct MetadataWire {
    timestamp: Option<Scalar>,
    valid_until: Option<Scalar>,
}

#[derive(Debug, Deserialize)]
struct ControlWire {
    id: Option<Scalar>,
    #[serde(default)]
    name: Option<String>,
    updated: Option<Scalar>,
    state: Option<Scalar>,
    schedules: Option<Vec<ScheduleWire>>,
}

#[derive(Debug, Deserialize)]
struct ScheduleWire {
    timestamp: Scalar,
    state: Scalar,
}

// Accepts only instants chrono can represent.
fn parse_timestamp(raw: &Scalar, what: &str) -> Result<Timestamp, FetchError> {
    raw.as_i64()
        .filter(|t| DateTime::from_timestamp(*t, 0).is_some())
        .ok_or_else(|| {
            FetchError::malformed(format!("{what}: {:?} is not a usable timestamp", raw.as_text()))
        })
}

fn parse_state(raw: &Scalar, what: &str) -> Result<RelayState, FetchError> {
    let token = raw.as_text();
    RelayState::from_token(&token)
        .ok_or_else(|| FetchError::malformed(format!("{what}: unknown state token {token:?}")))
}

/// Decodes a control endpoint response (json_version 2).
///
/// Only the first control element is used. Missing metadata is tolerated
/// (the projector then reports nothing); a missing channel id, state, or
/// schedule list is not.
///
/// # Errors
///
/// Returns [`FetchError::Malformed`] if the body is not valid JSON, lacks
/// required control fields, carries an unparsable revision, or has a
/// timestamp outside the representable calendar range.
pub fn decode_control_response(body: &[u8]) -> Result<ControlDocument, FetchError> {
    let wire: ControlResponseWire =
        serde_json::from_slice(body).map_err(|e| FetchError::malformed(e.to_string()))?;

    let control = wire
        .controls
        .and_then(|controls| controls.into_iter().next())
        .ok_or_else(|| FetchError::malformed("response has no controls"))?;

    let channel_id = control
        .id
        .map(|id| id.as_text())
        .ok_or_else(|| FetchError::malformed("control has no id"))?;
    let current_state = control
        .state
        .as_ref()
        .ok_or_else(|| FetchError::malformed("control has no state"))
        .and_then(|s| parse_state(s, "control state"))?;
    let revision = match &control.updated {
        Some(raw) => raw.as_i64().ok_or_else(|| {
            FetchError::malformed(format!("control revision {:?} is not an integer", raw.as_text()))
        })?,
        None => 0,
    };
    let schedules = control
        .schedules
        .ok_or_else(|| FetchError::malformed("control has no schedules"))?;

    let mut schedule = Vec::with_capacity(schedules.len());
    for raw in &schedules {
        schedule.push(ScheduleEntry::new(
            parse_timestamp(&raw.timestamp, "schedule timestamp")?,
            parse_state(&raw.state, "schedule state")?,
        ));
    }

    let metadata = match wire.metadata {
        Some(MetadataWire {
            timestamp: Some(fetched_at),
            valid_until: Some(valid_until),
        }) => Some(FetchMetadata {
            fetched_at: parse_timestamp(&fetched_at, "metadata timestamp")?,
            valid_until: parse_timestamp(&valid_until, "metadata valid_until")?,
        }),
        _ => None,
    };

    Ok(ControlDocument {
        payload: ControlPayload {
            channel_id,
            name: control.name.unwrap_or_default(),
            current_state,
            revision,
            schedule,
        },
        metadata,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{"metadata":{"mac":"ABCDEDFGHIJKLMNOPQRSTUFV","channels":"1","fetch_url":"https://api.porssari.fi/getcontrols.php","timestamp":"1717947639","timestamp_offset":"10800","valid_until":"1718052900"},"controls":[{"id":"1","name":"","updated":"0","state":"1","schedules":[{"timestamp":"1717959631","state":"0"},{"timestamp":"1717966803","state":"1"},{"timestamp":"1717995541","state":"0"},{"timestamp":"1718006442","state":"1"},{"timestamp":"1718010026","state":"0"},{"timestamp":"1718013528","state":"1"}]}]}"#;

    #[test]
    fn utc_labels() {
        assert_eq!(utc_label(1_718_000_100), "2024-06-10T06:15:00Z");
        assert_eq!(utc_label(i64::MAX), "");
    }

    #[test]
    fn decodes_string_encoded_response() {
        let doc = decode_control_response(SAMPLE.as_bytes()).expect("sample should decode");
        assert_eq!(doc.payload.channel_id, "1");
        assert_eq!(doc.payload.current_state, RelayState::On);
        assert_eq!(doc.payload.revision, 0);
        assert_eq!(doc.payload.schedule.len(), 6);
        assert_eq!(
            doc.payload.schedule[0],
            ScheduleEntry::new(1_717_959_631, RelayState::Off)
        );
        assert_eq!(
            doc.metadata,
            Some(FetchMetadata {
                fetched_at: 1_717_947_639,
                valid_until: 1_718_052_900,
            })
        );
    }

    #[test]
    fn accepts_numeric_fields() {
        let body = r#"{"metadata":{"timestamp":100,"valid_until":200},
            "controls":[{"id":2,"updated":7,"state":0,"schedules":[{"timestamp":150,"state":1}]}]}"#;
        let doc = decode_control_response(body.as_bytes()).expect("numeric body should decode");
        assert_eq!(doc.payload.channel_id, "2");
        assert_eq!(doc.payload.revision, 7);
        assert_eq!(doc.payload.current_state, RelayState::Off);
        assert_eq!(doc.payload.schedule, vec![ScheduleEntry::new(150, RelayState::On)]);
    }

    #[test]
    fn missing_metadata_is_tolerated() {
        let body = r#"{"controls":[{"id":"1","state":"0","schedules":[]}]}"#;
        let doc = decode_control_response(body.as_bytes()).expect("should decode");
        assert!(doc.metadata.is_none());
        assert!(doc.payload.schedule.is_empty());
    }

    #[test]
    fn rejects_missing_controls() {
        for body in [r#"{"metadata":{}}"#, r#"{"controls":[]}"#, "not json"] {
            let err = decode_control_response(body.as_bytes());
            assert!(
                matches!(err, Err(FetchError::Malformed(_))),
                "{body} should be malformed"
            );
        }
    }

    #[test]
    fn rejects_missing_schedule_list_and_bad_tokens() {
        let no_schedules = r#"{"controls":[{"id":"1","state":"1"}]}"#;
        assert!(decode_control_response(no_schedules.as_bytes()).is_err());

        let bad_state = r#"{"controls":[{"id":"1","state":"maybe","schedules":[]}]}"#;
        assert!(decode_control_response(bad_state.as_bytes()).is_err());
    }

    #[test]
    fn rejects_out_of_range_timestamps() {
        let far_entry = r#"{"controls":[{"id":"1","state":"1",
            "schedules":[{"timestamp":"9223372036854775800","state":"0"}]}]}"#;
        assert!(matches!(
            decode_control_response(far_entry.as_bytes()),
            Err(FetchError::Malformed(_))
        ));

        let far_window = r#"{"metadata":{"timestamp":"100","valid_until":"9223372036854775807"},
            "controls":[{"id":"1","state":"1","schedules":[]}]}"#;
        assert!(matches!(
            decode_control_response(far_window.as_bytes()),
            Err(FetchError::Malformed(_))
        ));
    }

    #[test]
    fn unparsable_revision_is_malformed() {
        let body = r#"{"controls":[{"id":"1","updated":"soon","state":"1","schedules":[]}]}"#;
        assert!(matches!(
            decode_control_response(body.as_bytes()),
            Err(FetchError::Malformed(_))
        ));

        let absent = r#"{"controls":[{"id":"1","state":"1","schedules":[]}]}"#;
        let doc = decode_control_response(absent.as_bytes()).expect("should decode");
        assert_eq!(doc.payload.revision, 0);
    }

    #[test]
    fn first_entry_after_is_strict() {
        let payload = ControlPayload {
            channel_id: "1".into(),
            name: String::new(),
            current_state: RelayState::On,
            revision: 0,
            schedule: vec![
                ScheduleEntry::new(100, RelayState::Off),
                ScheduleEntry::new(200, RelayState::On),
            ],
        };
        assert_eq!(payload.first_entry_after(99).map(|e| e.timestamp), Some(100));
        assert_eq!(payload.first_entry_after(100).map(|e| e.timestamp), Some(200));
        assert_eq!(payload.first_entry_after(200), None);
    }

    #[test]
    fn state_tokens_round_trip() {
        assert_eq!(RelayState::from_token(" 1 "), Some(RelayState::On));
        assert_eq!(RelayState::from_token("2"), None);
        assert_eq!(RelayState::Off.as_token(), "0");
        assert_eq!(RelayState::On.to_string(), "on");
    }
}
