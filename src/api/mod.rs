//! Read-only JSON status API.
//!
//! Provides three GET endpoints:
//! - `/status`: channel state, scheduler phase, time to next actuation, current price
//! - `/timeline`: price-annotated projection, `?resolution=N` seconds
//! - `/prices`: the spot price series

mod handlers;
mod types;

use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use axum::routing::get;
use tracing::info;

use crate::engine::Engine;

pub use types::{ErrorResponse, PriceRecord, StatusResponse, TimelineQuery, TimelineRecord};

/// State shared across all request handlers.
///
/// Handlers only call the engine's read accessors, each of which takes a
/// consistent snapshot under the engine lock.
pub struct AppState {
    pub engine: Arc<Engine>,
}

/// Builds the axum router with all API routes.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/status", get(handlers::get_status))
        .route("/timeline", get(handlers::get_timeline))
        .route("/prices", get(handlers::get_prices))
        .with_state(state)
}

/// Binds to `addr` and serves the API until `shutdown` resolves.
///
/// # Errors
///
/// Returns an `io::Error` if the listener cannot bind or the server fails.
pub async fn serve<F>(state: Arc<AppState>, addr: SocketAddr, shutdown: F) -> io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let app = router(state);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "status API listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
}
