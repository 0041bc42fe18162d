//! Platform adapter trait

use async_trait::async_trait;
use platform_bridge_core::{
    AdvertisementState, BridgeError, Feature, FeatureSet, PlatformId, Player, Result,
};
use serde_json::{Map, Value};
use tokio::sync::broadcast;

/// Capability set every platform variant implements
///
/// Methods for capabilities a platform lacks keep their default body, which
/// reports `UnsupportedFeature`. `initialize` is called exactly once per
/// bridge; every other method may be called concurrently.
#[async_trait]
pub trait PlatformAdapter: Send + Sync + 'static {
    /// Platform this adapter binds to
    fn id(&self) -> PlatformId;

    /// Features the platform supports. Final once `initialize` returned.
    fn supported_features(&self) -> FeatureSet;

    /// Bring up the underlying SDK or host connection
    async fn initialize(&self, options: &Value) -> Result<()>;

    /// Ask the platform to authorize the player. `Ok(false)` if the player declined.
    async fn authorize_player(&self, _options: &Value) -> Result<bool> {
        Err(BridgeError::UnsupportedFeature(Feature::Player))
    }

    /// Current player. Fails with `NotAuthorized` when no session exists.
    async fn get_player(&self) -> Result<Player> {
        Err(BridgeError::UnsupportedFeature(Feature::Player))
    }

    /// Stored values for `keys`, in order; `None` for missing keys
    async fn storage_get(&self, _keys: &[String]) -> Result<Vec<Option<Value>>> {
        Err(BridgeError::UnsupportedFeature(Feature::Storage))
    }

    async fn storage_set(&self, _items: Map<String, Value>) -> Result<()> {
        Err(BridgeError::UnsupportedFeature(Feature::Storage))
    }

    async fn storage_delete(&self, _keys: &[String]) -> Result<()> {
        Err(BridgeError::UnsupportedFeature(Feature::Storage))
    }

    /// Subscribe to advertisement state changes
    fn subscribe_advertisement_state(&self) -> Result<broadcast::Receiver<AdvertisementState>> {
        Err(BridgeError::UnsupportedFeature(Feature::Advertising))
    }

    async fn show_interstitial(&self) -> Result<()> {
        Err(BridgeError::UnsupportedFeature(Feature::Advertising))
    }

    async fn show_rewarded(&self) -> Result<()> {
        Err(BridgeError::UnsupportedFeature(Feature::Advertising))
    }
}
