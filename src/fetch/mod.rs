//! Remote data sources: the control schedule and the spot price series.

pub mod cache;
pub mod control;
pub mod spot;

use std::sync::Arc;
use std::time::Duration;

use crate::config::ControllerConfig;
use crate::error::FetchError;

pub use cache::{FileCache, MemoryCache, ResponseCache};
pub use control::{ControlClient, FetchSource, FetchedControls};
pub use spot::{SpotClient, decode_spot_prices};

/// Both clients used by one fetch cycle.
pub struct Fetcher {
    pub control: ControlClient,
    /// `None` when spot prices are disabled.
    pub spot: Option<SpotClient>,
}

impl Fetcher {
    /// Builds the clients described by `config`, persisting control responses
    /// to `control.cache_path`.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::Http`] if an HTTP client cannot be built.
    pub fn from_config(config: &ControllerConfig) -> Result<Self, FetchError> {
        let cache = Arc::new(FileCache::new(&config.control.cache_path));
        Self::with_cache(config, cache)
    }

    /// Like [`Fetcher::from_config`], with an explicit response cache.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::Http`] if an HTTP client cannot be built.
    pub fn with_cache(
        config: &ControllerConfig,
        cache: Arc<dyn ResponseCache>,
    ) -> Result<Self, FetchError> {
        let timeout = Duration::from_secs(config.control.timeout_secs);
        let control = ControlClient::new(
            config.control.endpoint.clone(),
            config.control.device_mac.clone(),
            config.control.client.clone(),
            timeout,
            cache,
        )?;
        let spot = if config.spot.enabled {
            Some(SpotClient::new(config.spot.endpoint.clone(), timeout)?)
        } else {
            None
        };
        Ok(Self { control, spot })
    }
}
