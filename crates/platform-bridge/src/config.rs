//! Bridge configuration

use platform_bridge_core::{PlatformId, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Options passed to `PlatformBridge::initialize`
///
/// Deserializes from camelCase JSON; every field is optional.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BridgeOptions {
    /// Platform forced by the embedding context; always wins when known
    pub forced_platform_id: Option<String>,
    /// Location the game was loaded from, searched for `platform_id`
    pub location_url: Option<String>,
    /// Endpoint returning `{ "forciblySetPlatformId": ... }`
    pub resolution_endpoint: Option<String>,
    /// Platform selected when nothing else resolves
    pub default_platform: PlatformId,
    /// Per-request timeout for message-protocol adapters; `null` waits forever
    pub request_timeout_ms: Option<u64>,
    /// Timeout for the remote resolution fetch
    pub remote_timeout_ms: u64,
    /// Opaque options forwarded to the adapter's `initialize`
    pub platform_options: serde_json::Value,
}

impl Default for BridgeOptions {
    fn default() -> Self {
        Self {
            forced_platform_id: None,
            location_url: None,
            resolution_endpoint: None,
            default_platform: PlatformId::Mock,
            request_timeout_ms: Some(30_000),
            remote_timeout_ms: 5_000,
            platform_options: serde_json::Value::Null,
        }
    }
}

impl BridgeOptions {
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(Into::into)
    }

    pub fn with_forced_platform(mut self, id: impl Into<String>) -> Self {
        self.forced_platform_id = Some(id.into());
        self
    }

    pub fn with_location(mut self, url: impl Into<String>) -> Self {
        self.location_url = Some(url.into());
        self
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_ms.map(Duration::from_millis)
    }

    pub fn remote_timeout(&self) -> Duration {
        Duration::from_millis(self.remote_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use platform_bridge_core::BridgeError;
    use tokio_test::{assert_err, assert_ok};

    #[test]
    fn test_defaults() {
        let options = BridgeOptions::default();
        assert_eq!(options.default_platform, PlatformId::Mock);
        assert_eq!(options.request_timeout(), Some(Duration::from_secs(30)));
        assert_eq!(options.remote_timeout(), Duration::from_secs(5));
    }

    #[test]
    fn test_from_json() {
        let json = r#"{
            "locationUrl": "http://host/?platform_id=qa_tool",
            "defaultPlatform": "playgama",
            "requestTimeoutMs": null
        }"#;
        let options = assert_ok!(BridgeOptions::from_json(json));
        assert_eq!(
            options.location_url.as_deref(),
            Some("http://host/?platform_id=qa_tool")
        );
        assert_eq!(options.default_platform, PlatformId::Playgama);
        assert_eq!(options.request_timeout(), None);
        assert_eq!(options.remote_timeout_ms, 5_000);
    }

    #[test]
    fn test_from_json_rejects_unknown_platform() {
        let err = assert_err!(BridgeOptions::from_json(r#"{"defaultPlatform": "steam"}"#));
        assert!(matches!(err, BridgeError::Serialization(_)));
    }
}
