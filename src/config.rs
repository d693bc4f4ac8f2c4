//! TOML-based controller configuration with defaults and validation.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use reqwest::Url;
use serde::Deserialize;

/// Seconds in a day; the projection grid must tile it evenly.
const SECS_PER_DAY: i64 = 86_400;

/// Top-level controller configuration parsed from TOML.
///
/// Every section is optional and falls back to its defaults, so an empty
/// file is valid apart from the device identifier, which must be set either
/// here or on the command line.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ControllerConfig {
    /// Control schedule endpoint and device identity.
    #[serde(default)]
    pub control: ControlConfig,
    /// Spot price source.
    #[serde(default)]
    pub spot: SpotConfig,
    /// Scheduling engine parameters.
    #[serde(default)]
    pub engine: EngineConfig,
    /// Status HTTP server.
    #[serde(default)]
    pub api: ApiConfig,
}

/// Control schedule endpoint and device identity.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ControlConfig {
    /// Control endpoint URL.
    pub endpoint: String,
    /// Device identifier sent as `device_mac`.
    pub device_mac: String,
    /// Client tag sent as `client`.
    pub client: String,
    /// File holding the last good control response.
    pub cache_path: PathBuf,
    /// Request timeout (seconds), shared with the spot price client.
    pub timeout_secs: u64,
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://api.porssari.fi/getcontrols.php".to_string(),
            device_mac: String::new(),
            client: concat!("pricecutter-", env!("CARGO_PKG_VERSION")).to_string(),
            cache_path: PathBuf::from("porssari.json"),
            timeout_secs: 30,
        }
    }
}

/// Spot price source.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SpotConfig {
    /// Whether prices are fetched at all.
    pub enabled: bool,
    /// Price endpoint URL.
    pub endpoint: String,
}

impl Default for SpotConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            endpoint: "https://api.spot-hinta.fi/TodayAndDayForward".to_string(),
        }
    }
}

/// Scheduling engine parameters.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    /// Channel reported by the status surface.
    pub channel: String,
    /// Fetch loop period (seconds, must be > 0).
    pub fetch_interval_secs: u64,
    /// Default projection resolution (seconds, must divide a day).
    pub resolution_secs: i64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            channel: "1".to_string(),
            fetch_interval_secs: 300,
            resolution_secs: 900,
        }
    }
}

/// Status HTTP server.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ApiConfig {
    /// Address to bind.
    pub bind: String,
    pub port: u16,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0".to_string(),
            port: 3000,
        }
    }
}

/// Configuration error with field path and constraint description.
#[derive(Debug)]
pub struct ConfigError {
    /// Dotted field path (e.g., `"engine.resolution_secs"`).
    pub field: String,
    /// Human-readable constraint description.
    pub message: String,
}

impl ConfigError {
    fn new(field: &str, message: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "config error: {}: {}", self.field, self.message)
    }
}

impl std::error::Error for ConfigError {}

impl ControllerConfig {
    /// Loads configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the file cannot be read or parsed.
    pub fn from_toml_file(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|e| {
            ConfigError::new("config", format!("cannot read \"{}\": {e}", path.display()))
        })?;
        Self::from_toml_str(&content)
    }

    /// Parses configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the TOML is invalid or contains unknown fields.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        toml::from_str(s).map_err(|e| ConfigError::new("toml", e.to_string()))
    }

    /// Validates all fields and returns a list of errors.
    ///
    /// Returns an empty vector if configuration is valid.
    pub fn validate(&self) -> Vec<ConfigError> {
        let mut errors = Vec::new();

        let c = &self.control;
        if c.device_mac.trim().is_empty() {
            errors.push(ConfigError::new("control.device_mac", "must not be empty"));
        }
        if c.client.trim().is_empty() {
            errors.push(ConfigError::new("control.client", "must not be empty"));
        }
        if let Err(e) = Url::parse(&c.endpoint) {
            errors.push(ConfigError::new(
                "control.endpoint",
                format!("invalid URL \"{}\": {e}", c.endpoint),
            ));
        }
        if c.timeout_secs == 0 {
            errors.push(ConfigError::new("control.timeout_secs", "must be > 0"));
        }

        let s = &self.spot;
        if s.enabled {
            if let Err(e) = Url::parse(&s.endpoint) {
                errors.push(ConfigError::new(
                    "spot.endpoint",
                    format!("invalid URL \"{}\": {e}", s.endpoint),
                ));
            }
        }

        let e = &self.engine;
        if e.channel.trim().is_empty() {
            errors.push(ConfigError::new("engine.channel", "must not be empty"));
        }
        if e.fetch_interval_secs == 0 {
            errors.push(ConfigError::new("engine.fetch_interval_secs", "must be > 0"));
        }
        if e.resolution_secs <= 0 || SECS_PER_DAY % e.resolution_secs != 0 {
            errors.push(ConfigError::new(
                "engine.resolution_secs",
                format!("must be a positive divisor of {SECS_PER_DAY}, got {}", e.resolution_secs),
            ));
        }

        if self.api.bind.trim().is_empty() {
            errors.push(ConfigError::new("api.bind", "must not be empty"));
        }

        errors
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with_mac() -> ControllerConfig {
        let mut cfg = ControllerConfig::default();
        cfg.control.device_mac = "AABBCCDDEEFF".to_string();
        cfg
    }

    #[test]
    fn defaults_need_only_a_device() {
        let errors = with_mac().validate();
        assert!(errors.is_empty(), "defaults should be valid: {errors:?}");

        let errors = ControllerConfig::default().validate();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].field, "control.device_mac");
    }

    #[test]
    fn empty_toml_uses_defaults() {
        let cfg = ControllerConfig::from_toml_str("").ok();
        assert_eq!(cfg.as_ref().map(|c| c.engine.fetch_interval_secs), Some(300));
        assert_eq!(cfg.as_ref().map(|c| c.engine.resolution_secs), Some(900));
        assert_eq!(cfg.as_ref().map(|c| c.spot.enabled), Some(true));
    }

    #[test]
    fn valid_toml_parses() {
        let toml = r#"
[control]
endpoint = "http://localhost:8080/getcontrols.php"
device_mac = "001122334455"
client = "bench"
cache_path = "/tmp/controls.json"
timeout_secs = 5

[spot]
enabled = false

[engine]
channel = "2"
fetch_interval_secs = 60
resolution_secs = 3600

[api]
bind = "127.0.0.1"
port = 8081
"#;
        let cfg = ControllerConfig::from_toml_str(toml);
        assert!(cfg.is_ok(), "valid TOML should parse: {:?}", cfg.err());
        let cfg = cfg.ok();
        assert_eq!(cfg.as_ref().map(|c| &*c.control.client), Some("bench"));
        assert_eq!(cfg.as_ref().map(|c| &*c.engine.channel), Some("2"));
        assert_eq!(cfg.as_ref().map(|c| c.api.port), Some(8081));
        assert_eq!(cfg.as_ref().map(|c| c.validate().len()), Some(0));
    }

    #[test]
    fn invalid_toml_unknown_field() {
        let toml = r#"
[engine]
channel = "1"
bogus_field = true
"#;
        assert!(ControllerConfig::from_toml_str(toml).is_err());
    }

    #[test]
    fn validation_catches_bad_resolution() {
        let mut cfg = with_mac();
        cfg.engine.resolution_secs = 700;
        assert!(cfg.validate().iter().any(|e| e.field == "engine.resolution_secs"));
        cfg.engine.resolution_secs = 0;
        assert!(cfg.validate().iter().any(|e| e.field == "engine.resolution_secs"));
    }

    #[test]
    fn validation_catches_zero_interval() {
        let mut cfg = with_mac();
        cfg.engine.fetch_interval_secs = 0;
        assert!(cfg.validate().iter().any(|e| e.field == "engine.fetch_interval_secs"));
    }

    #[test]
    fn validation_catches_bad_endpoints() {
        let mut cfg = with_mac();
        cfg.control.endpoint = "not a url".to_string();
        cfg.spot.endpoint = "::".to_string();
        let errors = cfg.validate();
        assert!(errors.iter().any(|e| e.field == "control.endpoint"));
        assert!(errors.iter().any(|e| e.field == "spot.endpoint"));

        // A disabled price source is not checked.
        cfg.spot.enabled = false;
        assert!(!cfg.validate().iter().any(|e| e.field == "spot.endpoint"));
    }

    #[test]
    fn missing_file_is_reported() {
        let err = ControllerConfig::from_toml_file(Path::new("/nonexistent/pricecutter.toml"));
        assert!(err.is_err_and(|e| e.field == "config"));
    }
}
