//! Error types for fetch and engine operations.

use thiserror::Error;

/// Failure of a single remote fetch.
///
/// None of these are fatal: the engine logs them and keeps its previous
/// schedule until the next periodic fetch.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Transport-level failure (connect, timeout, body read).
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Remote answered with a status other than 200 or 304.
    #[error("unexpected http status {0}")]
    Status(u16),

    /// Body could not be decoded into a usable payload.
    #[error("malformed payload: {0}")]
    Malformed(String),

    /// Remote answered "not modified" but nothing has been cached yet.
    #[error("not modified, but no cached response is available")]
    CacheMissing,

    /// Reading the persisted response failed.
    #[error("response cache error: {0}")]
    Cache(#[from] std::io::Error),
}

impl FetchError {
    pub(crate) fn malformed(message: impl Into<String>) -> Self {
        Self::Malformed(message.into())
    }
}

/// Errors raised while wiring up or starting the engine.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The engine needs a tokio runtime to arm timers.
    #[error("engine must be created inside a tokio runtime")]
    NoRuntime,

    /// `start` was called twice.
    #[error("fetch loop is already running")]
    AlreadyStarted,
}
