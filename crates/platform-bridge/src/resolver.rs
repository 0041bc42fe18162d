//! Platform resolution
//!
//! A single pass over the available signals, stopping at the first known id:
//! 1. explicit override from the embedding context
//! 2. `platform_id` query parameter of the location URL
//! 3. one fetch of the remote resolution endpoint (`forciblySetPlatformId`)
//! 4. the default platform
//!
//! Unknown ids fall through to the next step. Resolution never fails.

use crate::config::BridgeOptions;
use async_trait::async_trait;
use platform_bridge_core::{BridgeError, PlatformId, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

/// Query parameter carrying a platform id
pub const PLATFORM_ID_PARAM: &str = "platform_id";

/// Response of the resolution endpoint
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub forcibly_set_platform_id: Option<String>,
    /// Other configuration the endpoint returns
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Source of the remote resolution config
#[async_trait]
pub trait RemoteConfigSource: Send + Sync {
    async fn fetch(&self) -> Result<RemoteConfig>;
}

/// Fetches the remote config over HTTP(S)
pub struct HttpRemoteConfig {
    client: reqwest::Client,
    endpoint: Url,
}

impl HttpRemoteConfig {
    pub fn new(endpoint: &str, timeout: Duration) -> Result<Self> {
        let endpoint = Url::parse(endpoint).map_err(|e| {
            BridgeError::ResolutionFailure(format!(
                "Invalid resolution endpoint {}: {}",
                endpoint, e
            ))
        })?;
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| BridgeError::ResolutionFailure(format!("HTTP client: {}", e)))?;
        Ok(Self { client, endpoint })
    }
}

#[async_trait]
impl RemoteConfigSource for HttpRemoteConfig {
    async fn fetch(&self) -> Result<RemoteConfig> {
        debug!("Fetching platform config from {}", self.endpoint);
        let response = self
            .client
            .get(self.endpoint.clone())
            .send()
            .await
            .map_err(|e| BridgeError::ResolutionFailure(format!("Request failed: {}", e)))?
            .error_for_status()
            .map_err(|e| BridgeError::ResolutionFailure(format!("Bad status: {}", e)))?;

        response
            .json::<RemoteConfig>()
            .await
            .map_err(|e| BridgeError::ResolutionFailure(format!("Malformed response: {}", e)))
    }
}

/// Which signal selected the platform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionSource {
    Override,
    QueryParameter,
    Remote,
    Default,
}

/// Outcome of a resolution pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub platform: PlatformId,
    pub source: ResolutionSource,
}

/// Decides which platform backs a bridge
pub struct PlatformResolver {
    forced: Option<String>,
    location: Option<String>,
    remote: Option<Arc<dyn RemoteConfigSource>>,
    default: PlatformId,
}

impl PlatformResolver {
    pub fn new(default: PlatformId) -> Self {
        Self {
            forced: None,
            location: None,
            remote: None,
            default,
        }
    }

    pub fn from_options(
        options: &BridgeOptions,
        remote: Option<Arc<dyn RemoteConfigSource>>,
    ) -> Self {
        Self {
            forced: options.forced_platform_id.clone(),
            location: options.location_url.clone(),
            remote,
            default: options.default_platform,
        }
    }

    pub fn with_override(mut self, id: impl Into<String>) -> Self {
        self.forced = Some(id.into());
        self
    }

    pub fn with_location(mut self, url: impl Into<String>) -> Self {
        self.location = Some(url.into());
        self
    }

    pub fn with_remote(mut self, remote: Arc<dyn RemoteConfigSource>) -> Self {
        self.remote = Some(remote);
        self
    }

    /// Run the resolution pass. Fetches the remote config at most once.
    pub async fn resolve(&self) -> Resolution {
        let resolution = self.resolve_inner().await;
        info!(
            "Resolved platform {} via {:?}",
            resolution.platform, resolution.source
        );
        resolution
    }

    async fn resolve_inner(&self) -> Resolution {
        if let Some(platform) = self.forced.as_deref().and_then(known_platform) {
            return Resolution {
                platform,
                source: ResolutionSource::Override,
            };
        }

        if let Some(platform) = self
            .location
            .as_deref()
            .and_then(query_platform_id)
            .as_deref()
            .and_then(known_platform)
        {
            return Resolution {
                platform,
                source: ResolutionSource::QueryParameter,
            };
        }

        if let Some(remote) = &self.remote {
            match remote.fetch().await {
                Ok(config) => {
                    if let Some(platform) = config
                        .forcibly_set_platform_id
                        .as_deref()
                        .and_then(known_platform)
                    {
                        return Resolution {
                            platform,
                            source: ResolutionSource::Remote,
                        };
                    }
                    debug!("Remote config names no known platform");
                }
                Err(e) => warn!("Remote resolution failed, falling back: {}", e),
            }
        }

        Resolution {
            platform: self.default,
            source: ResolutionSource::Default,
        }
    }
}

fn known_platform(raw: &str) -> Option<PlatformId> {
    match raw.parse() {
        Ok(id) => Some(id),
        Err(e) => {
            debug!("{}, falling through", e);
            None
        }
    }
}

/// Value of the `platform_id` query parameter, if the location has one
pub fn query_platform_id(location: &str) -> Option<String> {
    let url = match Url::parse(location) {
        Ok(url) => url,
        Err(e) => {
            debug!("Unparseable location {}: {}", location, e);
            return None;
        }
    };
    url.query_pairs()
        .find(|(key, _)| key == PLATFORM_ID_PARAM)
        .map(|(_, value)| value.into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    struct FakeRemote {
        response: Result<RemoteConfig>,
        fetches: AtomicUsize,
    }

    impl FakeRemote {
        fn with_platform(id: &str) -> Arc<Self> {
            Arc::new(Self {
                response: Ok(RemoteConfig {
                    forcibly_set_platform_id: Some(id.into()),
                    extra: Map::new(),
                }),
                fetches: AtomicUsize::new(0),
            })
        }

        fn failing() -> Arc<Self> {
            Arc::new(Self {
                response: Err(BridgeError::ResolutionFailure("unreachable".into())),
                fetches: AtomicUsize::new(0),
            })
        }

        fn fetches(&self) -> usize {
            self.fetches.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl RemoteConfigSource for FakeRemote {
        async fn fetch(&self) -> Result<RemoteConfig> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            self.response.clone()
        }
    }

    #[tokio::test]
    async fn test_query_parameter() {
        let resolution = PlatformResolver::new(PlatformId::Mock)
            .with_location("http://host/?platform_id=qa_tool")
            .resolve()
            .await;
        assert_eq!(resolution.platform, PlatformId::QaTool);
        assert_eq!(resolution.source, ResolutionSource::QueryParameter);
    }

    #[tokio::test]
    async fn test_priority_order() {
        let remote = FakeRemote::with_platform("absolute_games");

        let resolver = PlatformResolver::new(PlatformId::Mock)
            .with_override("playgama")
            .with_location("http://host/?platform_id=qa_tool")
            .with_remote(remote.clone());
        let resolution = resolver.resolve().await;
        assert_eq!(resolution.platform, PlatformId::Playgama);
        assert_eq!(resolution.source, ResolutionSource::Override);

        let resolver = PlatformResolver::new(PlatformId::Mock)
            .with_location("http://host/?platform_id=qa_tool")
            .with_remote(remote.clone());
        assert_eq!(resolver.resolve().await.platform, PlatformId::QaTool);
        assert_eq!(remote.fetches(), 0);

        let resolver = PlatformResolver::new(PlatformId::Mock)
            .with_location("http://host/game.html")
            .with_remote(remote.clone());
        let resolution = resolver.resolve().await;
        assert_eq!(resolution.platform, PlatformId::AbsoluteGames);
        assert_eq!(resolution.source, ResolutionSource::Remote);
        assert_eq!(remote.fetches(), 1);

        let resolution = PlatformResolver::new(PlatformId::Mock).resolve().await;
        assert_eq!(resolution.platform, PlatformId::Mock);
        assert_eq!(resolution.source, ResolutionSource::Default);
    }

    #[tokio::test]
    async fn test_unknown_ids_fall_through() {
        let remote = FakeRemote::with_platform("not_a_platform");
        let resolution = PlatformResolver::new(PlatformId::Mock)
            .with_override("yandex")
            .with_location("http://host/?platform_id=crazy_games")
            .with_remote(remote.clone())
            .resolve()
            .await;
        assert_eq!(resolution.platform, PlatformId::Mock);
        assert_eq!(resolution.source, ResolutionSource::Default);
        assert_eq!(remote.fetches(), 1);
    }

    #[tokio::test]
    async fn test_remote_failure_falls_back() {
        let remote = FakeRemote::failing();
        let resolution = PlatformResolver::new(PlatformId::Playgama)
            .with_location("not a url")
            .with_remote(remote.clone())
            .resolve()
            .await;
        assert_eq!(resolution.platform, PlatformId::Playgama);
        assert_eq!(resolution.source, ResolutionSource::Default);
        assert_eq!(remote.fetches(), 1);
    }

    #[tokio::test]
    async fn test_resolution_is_idempotent() {
        let resolver = PlatformResolver::new(PlatformId::Mock)
            .with_location("http://host/?lang=en&platform_id=playgama");
        let first = resolver.resolve().await;
        let second = resolver.resolve().await;
        assert_eq!(first, second);
        assert_eq!(first.platform, PlatformId::Playgama);
    }

    #[test]
    fn test_query_platform_id() {
        assert_eq!(
            query_platform_id("https://portal.example/play?x=1&platform_id=mock"),
            Some("mock".to_string())
        );
        assert_eq!(query_platform_id("https://portal.example/play"), None);
        assert_eq!(query_platform_id("::"), None);
    }

    #[test]
    fn test_remote_config_format() {
        let json = r#"{"forciblySetPlatformId":"qa_tool","saves":{"cloud":true}}"#;
        let config: RemoteConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.forcibly_set_platform_id.as_deref(), Some("qa_tool"));
        assert!(config.extra.contains_key("saves"));
    }

    #[tokio::test]
    async fn test_http_remote_config() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 1024];
            while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                let n = stream.read(&mut buf).await.unwrap();
                if n == 0 {
                    break;
                }
                request.extend_from_slice(&buf[..n]);
            }
            let body = r#"{"forciblySetPlatformId":"playgama"}"#;
            let response = format!(
                concat!(
                    "HTTP/1.1 200 OK\r\n",
                    "Content-Type: application/json\r\n",
                    "Content-Length: {}\r\n",
                    "Connection: close\r\n\r\n{}"
                ),
                body.len(),
                body
            );
            stream.write_all(response.as_bytes()).await.unwrap();
            stream.shutdown().await.unwrap();
        });

        let source =
            HttpRemoteConfig::new(&format!("http://{}/config", addr), Duration::from_secs(5))
                .unwrap();
        let resolution = PlatformResolver::new(PlatformId::Mock)
            .with_remote(Arc::new(source))
            .resolve()
            .await;
        assert_eq!(resolution.platform, PlatformId::Playgama);
        assert_eq!(resolution.source, ResolutionSource::Remote);
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_http_unreachable_falls_back() {
        // Bind then drop to get a port nobody listens on
        let addr = TcpListener::bind("127.0.0.1:0")
            .await
            .unwrap()
            .local_addr()
            .unwrap();
        let source =
            HttpRemoteConfig::new(&format!("http://{}/config", addr), Duration::from_secs(2))
                .unwrap();
        let resolution = PlatformResolver::new(PlatformId::Mock)
            .with_remote(Arc::new(source))
            .resolve()
            .await;
        assert_eq!(resolution.platform, PlatformId::Mock);
    }

    #[test]
    fn test_invalid_endpoint() {
        assert!(matches!(
            HttpRemoteConfig::new("not a url", Duration::from_secs(1)),
            Err(BridgeError::ResolutionFailure(_))
        ));
    }
}
