//! The bridge facade applications hold
//!
//! `initialize` resolves the platform, builds its adapter and waits for the
//! adapter to come up. Until then every call fails with `NotInitialized`.

use crate::adapter::PlatformAdapter;
use crate::config::BridgeOptions;
use crate::context::PlatformContext;
use crate::registry::build_adapter;
use crate::resolver::{HttpRemoteConfig, PlatformResolver, RemoteConfigSource, Resolution};
use platform_bridge_core::{
    AdvertisementState, BridgeError, Feature, PlatformId, PlatformIdentity, Player, Result,
};
use serde_json::{Map, Value};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};
use tokio::sync::broadcast;
use tracing::{info, warn};

struct Ready {
    identity: PlatformIdentity,
    resolution: Resolution,
    adapter: Arc<dyn PlatformAdapter>,
}

/// Clears the in-progress flag when an initialization attempt ends
struct InitGuard<'a>(&'a AtomicBool);

impl Drop for InitGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

pub struct PlatformBridge {
    context: PlatformContext,
    initializing: AtomicBool,
    ready: OnceLock<Ready>,
}

impl PlatformBridge {
    pub fn new(context: PlatformContext) -> Self {
        Self {
            context,
            initializing: AtomicBool::new(false),
            ready: OnceLock::new(),
        }
    }

    /// Resolve the platform and bring its adapter up. Succeeds at most once.
    ///
    /// A call overlapping a running one fails with `InitializationInProgress`
    /// whatever that attempt's outcome. A failed attempt leaves the bridge
    /// uninitialized so it may be retried.
    pub async fn initialize(&self, options: BridgeOptions) -> Result<()> {
        if self.ready.get().is_some() {
            return Err(BridgeError::AlreadyInitialized);
        }
        if self.initializing.swap(true, Ordering::AcqRel) {
            return Err(BridgeError::InitializationInProgress);
        }
        let _guard = InitGuard(&self.initializing);
        if self.ready.get().is_some() {
            return Err(BridgeError::AlreadyInitialized);
        }

        let resolver = PlatformResolver::from_options(&options, self.remote_source(&options));
        let resolution = resolver.resolve().await;
        let adapter = self.construct(resolution.platform, &options)?;

        adapter.initialize(&options.platform_options).await?;

        let identity = PlatformIdentity::new(adapter.id(), adapter.supported_features());
        info!(
            "Platform bridge ready on {} with features {:?}",
            identity.id, identity.supported_features
        );

        self.ready
            .set(Ready {
                identity,
                resolution,
                adapter,
            })
            .map_err(|_| BridgeError::AlreadyInitialized)
    }

    fn remote_source(&self, options: &BridgeOptions) -> Option<Arc<dyn RemoteConfigSource>> {
        if let Some(source) = &self.context.remote_config {
            return Some(source.clone());
        }
        let endpoint = options.resolution_endpoint.as_deref()?;
        match HttpRemoteConfig::new(endpoint, options.remote_timeout()) {
            Ok(source) => Some(Arc::new(source)),
            Err(e) => {
                warn!("Skipping remote resolution: {}", e);
                None
            }
        }
    }

    /// Build the resolved platform, falling back to the default and then Mock
    /// when the context lacks its SDK handle.
    fn construct(
        &self,
        resolved: PlatformId,
        options: &BridgeOptions,
    ) -> Result<Arc<dyn PlatformAdapter>> {
        let mut candidates = vec![resolved];
        for fallback in [options.default_platform, PlatformId::Mock] {
            if !candidates.contains(&fallback) {
                candidates.push(fallback);
            }
        }

        let mut last_error = BridgeError::SdkUnavailable(resolved);
        for id in candidates {
            match build_adapter(id, &self.context, options) {
                Ok(adapter) => return Ok(adapter),
                Err(e @ BridgeError::SdkUnavailable(_)) => {
                    warn!("{}, falling back", e);
                    last_error = e;
                }
                Err(e) => return Err(e),
            }
        }
        Err(last_error)
    }

    pub fn is_ready(&self) -> bool {
        self.ready.get().is_some()
    }

    fn ready(&self) -> Result<&Ready> {
        self.ready.get().ok_or(BridgeError::NotInitialized)
    }

    /// Identity of the active platform
    pub fn platform(&self) -> Result<&PlatformIdentity> {
        Ok(&self.ready()?.identity)
    }

    /// How the active platform was chosen
    pub fn resolution(&self) -> Result<&Resolution> {
        Ok(&self.ready()?.resolution)
    }

    fn active(&self, feature: Feature) -> Result<&dyn PlatformAdapter> {
        let ready = self.ready()?;
        if !ready.identity.supports(feature) {
            return Err(BridgeError::UnsupportedFeature(feature));
        }
        Ok(ready.adapter.as_ref())
    }

    pub fn player(&self) -> PlayerApi<'_> {
        PlayerApi { bridge: self }
    }

    pub fn storage(&self) -> StorageApi<'_> {
        StorageApi { bridge: self }
    }

    pub fn advertising(&self) -> AdvertisingApi<'_> {
        AdvertisingApi { bridge: self }
    }
}

pub struct PlayerApi<'a> {
    bridge: &'a PlatformBridge,
}

impl PlayerApi<'_> {
    /// `Ok(false)` when the player declined
    pub async fn authorize(&self, options: &Value) -> Result<bool> {
        self.bridge
            .active(Feature::Player)?
            .authorize_player(options)
            .await
    }

    pub async fn get_user(&self) -> Result<Player> {
        self.bridge.active(Feature::Player)?.get_player().await
    }
}

pub struct StorageApi<'a> {
    bridge: &'a PlatformBridge,
}

impl StorageApi<'_> {
    pub async fn get(&self, key: &str) -> Result<Option<Value>> {
        let mut values = self.get_many(&[key.to_string()]).await?;
        Ok(values.pop().flatten())
    }

    pub async fn get_many(&self, keys: &[String]) -> Result<Vec<Option<Value>>> {
        let values = self
            .bridge
            .active(Feature::Storage)?
            .storage_get(keys)
            .await?;
        if values.len() != keys.len() {
            return Err(BridgeError::ProtocolMismatch(format!(
                "{} values for {} keys",
                values.len(),
                keys.len()
            )));
        }
        Ok(values)
    }

    pub async fn set(&self, items: Map<String, Value>) -> Result<()> {
        self.bridge
            .active(Feature::Storage)?
            .storage_set(items)
            .await
    }

    pub async fn set_value(&self, key: &str, value: impl Into<Value>) -> Result<()> {
        let mut items = Map::new();
        items.insert(key.to_string(), value.into());
        self.set(items).await
    }

    pub async fn delete(&self, keys: &[String]) -> Result<()> {
        self.bridge
            .active(Feature::Storage)?
            .storage_delete(keys)
            .await
    }
}

pub struct AdvertisingApi<'a> {
    bridge: &'a PlatformBridge,
}

impl AdvertisingApi<'_> {
    pub fn subscribe_to_state_changes(&self) -> Result<broadcast::Receiver<AdvertisementState>> {
        self.bridge
            .active(Feature::Advertising)?
            .subscribe_advertisement_state()
    }

    pub async fn show_interstitial(&self) -> Result<()> {
        self.bridge
            .active(Feature::Advertising)?
            .show_interstitial()
            .await
    }

    pub async fn show_rewarded(&self) -> Result<()> {
        self.bridge
            .active(Feature::Advertising)?
            .show_rewarded()
            .await
    }
}
