//! Control schedule model, last-payload store, and timeline projection.

pub mod projection;
/// Holder for the last good control payload.
pub mod store;
pub mod types;

pub use projection::{TimelineBucket, annotate_with_prices, project_timeline};
pub use store::ScheduleStore;
pub use types::{
    ControlDocument, ControlPayload, FetchMetadata, PriceInterval, RelayState, ScheduleEntry,
    Timestamp,
};
