//! Client for the remote control schedule endpoint.

use std::sync::Arc;
use std::time::Duration;

use reqwest::{Client, StatusCode};
use tracing::{debug, warn};

use crate::error::FetchError;
use crate::schedule::types::decode_control_response;
use crate::schedule::{ControlPayload, FetchMetadata, Timestamp};

use super::cache::ResponseCache;

/// Response format version requested from the control endpoint.
pub const JSON_VERSION: &str = "2";

/// Where a fetched payload came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchSource {
    /// Fresh 200 response.
    Remote,
    /// 304 response answered from the persisted copy.
    Cache,
}

/// A successfully fetched control payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedControls {
    pub payload: ControlPayload,
    pub metadata: Option<FetchMetadata>,
    pub source: FetchSource,
}

/// Fetches the control schedule for one device.
pub struct ControlClient {
    http: Client,
    endpoint: String,
    device_mac: String,
    client_tag: String,
    cache: Arc<dyn ResponseCache>,
}

impl ControlClient {
    /// Creates a client for `endpoint`.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::Http`] if the HTTP client cannot be built.
    pub fn new(
        endpoint: impl Into<String>,
        device_mac: impl Into<String>,
        client_tag: impl Into<String>,
        timeout: Duration,
        cache: Arc<dyn ResponseCache>,
    ) -> Result<Self, FetchError> {
        let http = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            endpoint: endpoint.into(),
            device_mac: device_mac.into(),
            client_tag: client_tag.into(),
            cache,
        })
    }

    /// Issues one fetch.
    ///
    /// `last_request` is the generation time of the payload already held, if
    /// any; the server may answer 304, in which case the persisted copy is
    /// returned instead. A fresh 200 body is persisted only after it decodes.
    ///
    /// # Errors
    ///
    /// Transport errors, statuses other than 200/304, undecodable bodies, and
    /// a 304 without a cached copy are all reported as [`FetchError`].
    pub async fn fetch(&self, last_request: Option<Timestamp>) -> Result<FetchedControls, FetchError> {
        let last_request = last_request.unwrap_or(0).to_string();
        debug!(endpoint = %self.endpoint, "fetching controls");
        let response = self
            .http
            .get(&self.endpoint)
            .query(&[
                ("device_mac", self.device_mac.as_str()),
                ("last_request", last_request.as_str()),
                ("client", self.client_tag.as_str()),
                ("json_version", JSON_VERSION),
            ])
            .send()
            .await?;

        match response.status() {
            StatusCode::OK => {
                let body = response.bytes().await?;
                let doc = decode_control_response(&body)?;
                if let Err(e) = self.cache.store(&body) {
                    warn!(error = %e, "failed to persist control response");
                }
                Ok(FetchedControls {
                    payload: doc.payload,
                    metadata: doc.metadata,
                    source: FetchSource::Remote,
                })
            }
            StatusCode::NOT_MODIFIED => {
                debug!("control endpoint answered 304, using cached response");
                let body = self.cache.load()?.ok_or(FetchError::CacheMissing)?;
                let doc = decode_control_response(&body)?;
                Ok(FetchedControls {
                    payload: doc.payload,
                    metadata: doc.metadata,
                    source: FetchSource::Cache,
                })
            }
            status => Err(FetchError::Status(status.as_u16())),
        }
    }
}
