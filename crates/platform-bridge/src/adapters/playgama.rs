//! Playgama platform via its embedded SDK

use super::{SdkResult, id_string, player_error, sdk_error};
use crate::adapter::PlatformAdapter;
use async_trait::async_trait;
use platform_bridge_core::{
    AdvertisementState, BridgeError, Feature, FeatureSet, PlatformId, Player, Result,
};
use serde_json::{Map, Value};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Calls the adapter makes into the Playgama SDK
#[async_trait]
pub trait PlaygamaSdk: Send + Sync {
    async fn initialize(&self, options: &Value) -> SdkResult<()>;

    async fn authorize_player(&self, options: &Value) -> SdkResult<()>;

    /// Raw player object: `{ isAuthorized, id, name, photos, ... }`
    async fn player(&self) -> SdkResult<Value>;

    /// Values for `keys`: an array aligned with the keys, an object keyed by
    /// name, or a bare non-object value when a single key was asked for.
    /// Objects are always read as keyed by name.
    async fn get_data(&self, keys: &[String]) -> SdkResult<Value>;

    async fn set_data(&self, items: &Map<String, Value>) -> SdkResult<()>;

    async fn delete_data(&self, keys: &[String]) -> SdkResult<()>;

    async fn show_interstitial(&self) -> SdkResult<()>;

    async fn show_rewarded(&self) -> SdkResult<()>;

    /// Advertisement state names as the SDK emits them
    fn advertisement_states(&self) -> broadcast::Receiver<String>;
}

pub struct PlaygamaAdapter {
    sdk: Arc<dyn PlaygamaSdk>,
    ad_states: broadcast::Sender<AdvertisementState>,
    forwarder: Mutex<Option<JoinHandle<()>>>,
}

impl PlaygamaAdapter {
    pub fn new(sdk: Arc<dyn PlaygamaSdk>) -> Self {
        let (ad_states, _) = broadcast::channel(64);
        Self {
            sdk,
            ad_states,
            forwarder: Mutex::new(None),
        }
    }
}

impl Drop for PlaygamaAdapter {
    fn drop(&mut self) {
        if let Some(handle) = self
            .forwarder
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            handle.abort();
        }
    }
}

/// Translate the SDK's player object into `Player`
fn player_from_sdk(raw: Value) -> Result<Player> {
    let Value::Object(mut fields) = raw else {
        return Err(BridgeError::ProtocolMismatch(
            "Playgama player is not an object".into(),
        ));
    };

    let authorized = fields
        .remove("isAuthorized")
        .and_then(|v| v.as_bool())
        .unwrap_or(false);
    let id = id_string(fields.remove("id").as_ref());
    let name = fields
        .remove("name")
        .and_then(|v| v.as_str().map(str::to_string))
        .filter(|name| !name.is_empty());
    let photos = match fields.remove("photos") {
        Some(Value::Array(photos)) => photos
            .into_iter()
            .filter_map(|p| p.as_str().map(str::to_string))
            .collect(),
        _ => Vec::new(),
    };

    Ok(Player {
        authorized,
        id,
        name,
        photos,
        extra: fields.into_iter().collect(),
    })
}

/// Align whatever `get_data` returned with the requested keys
fn values_from_sdk(keys: &[String], raw: Value) -> Result<Vec<Option<Value>>> {
    let present = |value: Value| (!value.is_null()).then_some(value);
    match raw {
        Value::Null => Ok(vec![None; keys.len()]),
        Value::Array(values) if values.len() == keys.len() => {
            Ok(values.into_iter().map(present).collect())
        }
        Value::Object(mut by_key) => Ok(keys
            .iter()
            .map(|key| by_key.remove(key).and_then(present))
            .collect()),
        value if keys.len() == 1 => Ok(vec![present(value)]),
        other => Err(BridgeError::ProtocolMismatch(format!(
            "Playgama returned {} for {} keys",
            other,
            keys.len()
        ))),
    }
}

#[async_trait]
impl PlatformAdapter for PlaygamaAdapter {
    fn id(&self) -> PlatformId {
        PlatformId::Playgama
    }

    fn supported_features(&self) -> FeatureSet {
        FeatureSet::from([Feature::Player, Feature::Storage, Feature::Advertising])
    }

    async fn initialize(&self, options: &Value) -> Result<()> {
        self.sdk
            .initialize(options)
            .await
            .map_err(|e| sdk_error("initialize", e))?;

        let mut raw_states = self.sdk.advertisement_states();
        let ad_states = self.ad_states.clone();
        let handle = tokio::spawn(async move {
            loop {
                match raw_states.recv().await {
                    Ok(raw) => match raw.parse::<AdvertisementState>() {
                        Ok(state) => {
                            let _ = ad_states.send(state);
                        }
                        Err(e) => warn!("Playgama: {}", e),
                    },
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!("Playgama advertisement states lagged, missed {}", n);
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        debug!("Playgama advertisement state stream closed");
                        break;
                    }
                }
            }
        });
        if let Some(previous) = self
            .forwarder
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(handle)
        {
            previous.abort();
        }

        info!("Playgama SDK initialized");
        Ok(())
    }

    async fn authorize_player(&self, options: &Value) -> Result<bool> {
        match self.sdk.authorize_player(options).await {
            Ok(()) => Ok(true),
            Err(rejection) => match player_error(rejection) {
                BridgeError::NotAuthorized => Ok(false),
                other => Err(other),
            },
        }
    }

    async fn get_player(&self) -> Result<Player> {
        let raw = self.sdk.player().await.map_err(player_error)?;
        let player = player_from_sdk(raw)?;
        if !player.authorized {
            return Err(BridgeError::NotAuthorized);
        }
        Ok(player)
    }

    async fn storage_get(&self, keys: &[String]) -> Result<Vec<Option<Value>>> {
        let raw = self
            .sdk
            .get_data(keys)
            .await
            .map_err(|e| sdk_error("get_data", e))?;
        values_from_sdk(keys, raw)
    }

    async fn storage_set(&self, items: Map<String, Value>) -> Result<()> {
        self.sdk
            .set_data(&items)
            .await
            .map_err(|e| sdk_error("set_data", e))
    }

    async fn storage_delete(&self, keys: &[String]) -> Result<()> {
        self.sdk
            .delete_data(keys)
            .await
            .map_err(|e| sdk_error("delete_data", e))
    }

    fn subscribe_advertisement_state(&self) -> Result<broadcast::Receiver<AdvertisementState>> {
        Ok(self.ad_states.subscribe())
    }

    async fn show_interstitial(&self) -> Result<()> {
        self.sdk
            .show_interstitial()
            .await
            .map_err(|e| sdk_error("show_interstitial", e))
    }

    async fn show_rewarded(&self) -> Result<()> {
        self.sdk
            .show_rewarded()
            .await
            .map_err(|e| sdk_error("show_rewarded", e))
    }
}
