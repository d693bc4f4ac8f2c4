//! Request handlers for the API endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;

use super::AppState;
use super::types::{ErrorResponse, PriceRecord, StatusResponse, TimelineQuery, TimelineRecord};

/// Smallest bucket width served, keeps a day's projection under 1440 rows.
const MIN_RESOLUTION_SECS: i64 = 60;

/// Returns the channel status.
///
/// `GET /status` → 200 + `StatusResponse` JSON
pub async fn get_status(State(state): State<Arc<AppState>>) -> Json<StatusResponse> {
    Json(state.engine.snapshot().into())
}

/// Returns the price-annotated projected timeline.
///
/// `GET /timeline` → 200 + `Vec<TimelineRecord>` at the configured resolution
/// `GET /timeline?resolution=3600` → hourly buckets
/// `GET /timeline?resolution=700` → 400 + `ErrorResponse`
pub async fn get_timeline(
    State(state): State<Arc<AppState>>,
    Query(query): Query<TimelineQuery>,
) -> impl IntoResponse {
    let resolution = query
        .resolution
        .unwrap_or(state.engine.settings().resolution);

    if resolution < MIN_RESOLUTION_SECS || 86_400 % resolution != 0 {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse {
                error: format!(
                    "`resolution` ({resolution}) must divide 86400 and be at least {MIN_RESOLUTION_SECS}"
                ),
            }),
        ));
    }

    let records: Vec<TimelineRecord> = state
        .engine
        .price_timeline(resolution)
        .iter()
        .map(TimelineRecord::from)
        .collect();

    Ok(Json(records))
}

/// Returns the current spot price series.
///
/// `GET /prices` → 200 + `Vec<PriceRecord>` JSON
pub async fn get_prices(State(state): State<Arc<AppState>>) -> Json<Vec<PriceRecord>> {
    Json(
        state
            .engine
            .spot_prices()
            .iter()
            .map(PriceRecord::from)
            .collect(),
    )
}
