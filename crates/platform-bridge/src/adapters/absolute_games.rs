//! AbsoluteGames platform via its embedded SDK
//!
//! The SDK persists strings only, so values are stored as JSON text. It has no
//! advertising API.

use super::{SdkResult, id_string, player_error, sdk_error};
use crate::adapter::PlatformAdapter;
use async_trait::async_trait;
use platform_bridge_core::{BridgeError, Feature, FeatureSet, PlatformId, Player, Result};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

/// Calls the adapter makes into the AbsoluteGames SDK
#[async_trait]
pub trait AbsoluteGamesSdk: Send + Sync {
    async fn init(&self) -> SdkResult<()>;

    async fn login(&self) -> SdkResult<()>;

    /// `{ uid, nick, avatar, ... }`. Rejected without reason when no session exists.
    async fn get_user(&self) -> SdkResult<Value>;

    async fn load(&self, key: &str) -> SdkResult<Option<String>>;

    async fn save(&self, key: &str, value: &str) -> SdkResult<()>;

    async fn remove(&self, key: &str) -> SdkResult<()>;
}

pub struct AbsoluteGamesAdapter {
    sdk: Arc<dyn AbsoluteGamesSdk>,
}

impl AbsoluteGamesAdapter {
    pub fn new(sdk: Arc<dyn AbsoluteGamesSdk>) -> Self {
        Self { sdk }
    }
}

fn player_from_user(raw: Value) -> Result<Player> {
    let Value::Object(mut fields) = raw else {
        return Err(BridgeError::ProtocolMismatch(
            "AbsoluteGames user is not an object".into(),
        ));
    };
    let id = id_string(fields.remove("uid").as_ref());
    if id.is_empty() {
        return Err(BridgeError::NotAuthorized);
    }
    let name = fields
        .remove("nick")
        .and_then(|v| v.as_str().map(str::to_string));
    let photos = fields
        .remove("avatar")
        .and_then(|v| v.as_str().map(str::to_string))
        .into_iter()
        .collect();

    Ok(Player {
        authorized: true,
        id,
        name,
        photos,
        extra: fields.into_iter().collect::<HashMap<_, _>>(),
    })
}

/// Stored text is JSON; older saves may hold bare strings
fn decode_stored(raw: String) -> Value {
    serde_json::from_str(&raw).unwrap_or_else(|_| {
        debug!("Stored value is not JSON, returning it as a string");
        Value::String(raw)
    })
}

#[async_trait]
impl PlatformAdapter for AbsoluteGamesAdapter {
    fn id(&self) -> PlatformId {
        PlatformId::AbsoluteGames
    }

    fn supported_features(&self) -> FeatureSet {
        FeatureSet::from([Feature::Player, Feature::Storage])
    }

    async fn initialize(&self, _options: &Value) -> Result<()> {
        self.sdk.init().await.map_err(|e| sdk_error("init", e))?;
        info!("AbsoluteGames SDK initialized");
        Ok(())
    }

    async fn authorize_player(&self, _options: &Value) -> Result<bool> {
        match self.sdk.login().await {
            Ok(()) => Ok(true),
            Err(rejection) => match player_error(rejection) {
                BridgeError::NotAuthorized => Ok(false),
                other => Err(other),
            },
        }
    }

    async fn get_player(&self) -> Result<Player> {
        let raw = self.sdk.get_user().await.map_err(player_error)?;
        player_from_user(raw)
    }

    async fn storage_get(&self, keys: &[String]) -> Result<Vec<Option<Value>>> {
        let mut values = Vec::with_capacity(keys.len());
        for key in keys {
            let raw = self
                .sdk
                .load(key)
                .await
                .map_err(|e| sdk_error("load", e))?;
            values.push(raw.map(decode_stored));
        }
        Ok(values)
    }

    /// The SDK saves one key at a time. Every value is encoded before the
    /// first save; a failed save stops the batch and keeps keys already saved.
    async fn storage_set(&self, items: Map<String, Value>) -> Result<()> {
        let encoded = items
            .iter()
            .map(|(key, value)| -> Result<(&String, String)> {
                Ok((key, serde_json::to_string(value)?))
            })
            .collect::<Result<Vec<_>>>()?;
        for (key, text) in encoded {
            self.sdk
                .save(key, &text)
                .await
                .map_err(|e| sdk_error("save", e))?;
        }
        Ok(())
    }

    async fn storage_delete(&self, keys: &[String]) -> Result<()> {
        for key in keys {
            self.sdk
                .remove(key)
                .await
                .map_err(|e| sdk_error("remove", e))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::SdkRejection;
    use serde_json::json;
    use tokio::sync::Mutex;

    #[derive(Default)]
    struct FakeAbsoluteGames {
        user: Option<Value>,
        saved: Mutex<HashMap<String, String>>,
        rejected_key: Option<&'static str>,
    }

    #[async_trait]
    impl AbsoluteGamesSdk for FakeAbsoluteGames {
        async fn init(&self) -> SdkResult<()> {
            Ok(())
        }

        async fn login(&self) -> SdkResult<()> {
            match self.user {
                Some(_) => Ok(()),
                None => Err(SdkRejection::silent()),
            }
        }

        async fn get_user(&self) -> SdkResult<Value> {
            self.user.clone().ok_or_else(SdkRejection::silent)
        }

        async fn load(&self, key: &str) -> SdkResult<Option<String>> {
            Ok(self.saved.lock().await.get(key).cloned())
        }

        async fn save(&self, key: &str, value: &str) -> SdkResult<()> {
            if self.rejected_key == Some(key) {
                return Err(SdkRejection::new("quota exceeded"));
            }
            self.saved
                .lock()
                .await
                .insert(key.to_string(), value.to_string());
            Ok(())
        }

        async fn remove(&self, key: &str) -> SdkResult<()> {
            self.saved.lock().await.remove(key);
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_no_session_is_not_authorized() {
        let adapter = AbsoluteGamesAdapter::new(Arc::new(FakeAbsoluteGames::default()));
        assert_eq!(adapter.get_player().await, Err(BridgeError::NotAuthorized));
        assert_eq!(adapter.authorize_player(&Value::Null).await, Ok(false));
    }

    #[tokio::test]
    async fn test_user_shape_translation() {
        let sdk = FakeAbsoluteGames {
            user: Some(json!({
                "uid": 77,
                "nick": "Bo",
                "avatar": "https://ag/77.png",
                "vip": true
            })),
            ..Default::default()
        };
        let adapter = AbsoluteGamesAdapter::new(Arc::new(sdk));

        assert_eq!(adapter.authorize_player(&Value::Null).await, Ok(true));
        let player = adapter.get_player().await.unwrap();
        assert!(player.authorized);
        assert_eq!(player.id, "77");
        assert_eq!(player.name.as_deref(), Some("Bo"));
        assert_eq!(player.photos, vec!["https://ag/77.png".to_string()]);
        assert_eq!(player.extra["vip"], json!(true));
    }

    #[tokio::test]
    async fn test_storage_as_json_text() {
        let sdk = Arc::new(FakeAbsoluteGames::default());
        sdk.saved
            .lock()
            .await
            .insert("legacy".into(), "plain text".into());
        let adapter = AbsoluteGamesAdapter::new(sdk.clone());

        let mut items = Map::new();
        items.insert("progress".into(), json!({"level": 2}));
        adapter.storage_set(items).await.unwrap();
        assert_eq!(
            sdk.saved.lock().await.get("progress").map(String::as_str),
            Some(r#"{"level":2}"#)
        );

        let keys = vec![
            "progress".to_string(),
            "legacy".to_string(),
            "missing".to_string(),
        ];
        assert_eq!(
            adapter.storage_get(&keys).await.unwrap(),
            vec![Some(json!({"level": 2})), Some(json!("plain text")), None]
        );

        adapter.storage_delete(&keys[..1]).await.unwrap();
        assert_eq!(adapter.storage_get(&keys[..1]).await.unwrap(), vec![None]);
    }

    #[tokio::test]
    async fn test_failed_save_stops_the_batch() {
        let sdk = Arc::new(FakeAbsoluteGames {
            rejected_key: Some("b"),
            ..Default::default()
        });
        let adapter = AbsoluteGamesAdapter::new(sdk.clone());

        let mut items = Map::new();
        for (key, n) in [("a", 1), ("b", 2), ("c", 3)] {
            items.insert(key.into(), json!(n));
        }
        assert_eq!(
            adapter.storage_set(items).await,
            Err(BridgeError::Platform("save: quota exceeded".into()))
        );

        let saved = sdk.saved.lock().await;
        assert_eq!(saved.get("a").map(String::as_str), Some("1"));
        assert!(!saved.contains_key("b"));
        assert!(!saved.contains_key("c"));
    }

    #[tokio::test]
    async fn test_advertising_unsupported() {
        let adapter = AbsoluteGamesAdapter::new(Arc::new(FakeAbsoluteGames::default()));
        assert!(!adapter.supported_features().contains(Feature::Advertising));
        assert_eq!(
            adapter.show_interstitial().await,
            Err(BridgeError::UnsupportedFeature(Feature::Advertising))
        );
    }
}
