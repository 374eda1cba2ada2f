use crate::error::Error;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

/// Upper bound for the runtime readiness poll interval.
pub const MAX_POLL_INTERVAL: Duration = Duration::from_millis(200);

/// Settings of the payment orchestrator. Every field has a default, so a
/// config file only needs the values it changes.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    pub api_base_url: String,
    /// Bound on every backend request.
    pub request_timeout_ms: u64,
    /// Bound on waiting for the customer to finish the provider UI.
    pub completion_timeout_secs: u64,
    /// Bound on the embedded form reporting itself mounted.
    pub mount_timeout_ms: u64,
    pub hosted: HostedConfig,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct HostedConfig {
    pub script_url: String,
    /// Attribute value identifying the injected script tag.
    pub script_marker: String,
    /// Prefix of the `eventName` the hosted page posts.
    pub message_prefix: String,
    /// Page opened in the fallback popup; the session token is appended.
    pub popup_url: String,
    /// Silence after opening the iframe before falling back to a popup.
    pub fallback_delay_ms: u64,
    pub poll_interval_ms: u64,
    pub max_poll_attempts: u32,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            api_base_url: "http://localhost:8000/api/".to_string(),
            request_timeout_ms: 15_000,
            completion_timeout_secs: 900,
            mount_timeout_ms: 15_000,
            hosted: HostedConfig::default(),
        }
    }
}

impl Default for HostedConfig {
    fn default() -> Self {
        Self {
            script_url: "https://secure.helcim.app/helcim-pay/services/start.js".to_string(),
            script_marker: "hosted-pay-runtime".to_string(),
            message_prefix: "helcim-pay-js".to_string(),
            popup_url: "https://secure.helcim.app/helcim-pay/checkout".to_string(),
            fallback_delay_ms: 2_500,
            poll_interval_ms: 100,
            max_poll_attempts: 50,
        }
    }
}

impl OrchestratorConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, Error> {
        let raw = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn completion_timeout(&self) -> Duration {
        Duration::from_secs(self.completion_timeout_secs)
    }

    pub fn mount_timeout(&self) -> Duration {
        Duration::from_millis(self.mount_timeout_ms)
    }
}

impl HostedConfig {
    pub fn fallback_delay(&self) -> Duration {
        Duration::from_millis(self.fallback_delay_ms)
    }

    /// The configured interval, clamped to `MAX_POLL_INTERVAL`.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1)).min(MAX_POLL_INTERVAL)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = OrchestratorConfig::default();
        assert_eq!(config.hosted.fallback_delay(), Duration::from_millis(2_500));
        assert_eq!(config.request_timeout(), Duration::from_secs(15));
    }

    #[test]
    fn test_poll_interval_is_clamped() {
        let hosted = HostedConfig {
            poll_interval_ms: 5_000,
            ..HostedConfig::default()
        };
        assert_eq!(hosted.poll_interval(), MAX_POLL_INTERVAL);
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"api_base_url": "https://shop.example/api/", "hosted": {{"fallback_delay_ms": 4000}}}}"#
        )
        .unwrap();

        let config = OrchestratorConfig::load(file.path()).unwrap();
        assert_eq!(config.api_base_url, "https://shop.example/api/");
        assert_eq!(config.hosted.fallback_delay_ms, 4_000);
        assert_eq!(config.hosted.max_poll_attempts, 50);
        assert_eq!(config.request_timeout_ms, 15_000);
    }

    #[test]
    fn test_missing_file_is_an_error() {
        assert!(matches!(
            OrchestratorConfig::load("/nonexistent/cartpay.json"),
            Err(Error::Io(_))
        ));
    }
}
