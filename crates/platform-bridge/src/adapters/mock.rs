//! In-process fallback platform
//!
//! Selected when nothing else resolves. Keeps storage in memory and supports
//! nothing else, so feature checks behave exactly as on a real platform.

use crate::adapter::PlatformAdapter;
use async_trait::async_trait;
use platform_bridge_core::{Feature, FeatureSet, PlatformId, Result};
use serde_json::{Map, Value};
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::info;

#[derive(Default)]
pub struct MockAdapter {
    storage: RwLock<HashMap<String, Value>>,
}

impl MockAdapter {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PlatformAdapter for MockAdapter {
    fn id(&self) -> PlatformId {
        PlatformId::Mock
    }

    fn supported_features(&self) -> FeatureSet {
        FeatureSet::from([Feature::Storage])
    }

    async fn initialize(&self, _options: &Value) -> Result<()> {
        info!("Mock platform initialized");
        Ok(())
    }

    async fn storage_get(&self, keys: &[String]) -> Result<Vec<Option<Value>>> {
        let storage = self.storage.read().await;
        Ok(keys.iter().map(|key| storage.get(key).cloned()).collect())
    }

    async fn storage_set(&self, items: Map<String, Value>) -> Result<()> {
        self.storage.write().await.extend(items);
        Ok(())
    }

    async fn storage_delete(&self, keys: &[String]) -> Result<()> {
        let mut storage = self.storage.write().await;
        for key in keys {
            storage.remove(key);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use platform_bridge_core::BridgeError;
    use serde_json::json;

    #[tokio::test]
    async fn test_storage() {
        let adapter = MockAdapter::new();
        adapter.initialize(&Value::Null).await.unwrap();

        let mut items = Map::new();
        items.insert("coins".into(), json!(10));
        adapter.storage_set(items).await.unwrap();

        let keys = vec!["coins".to_string(), "missing".to_string()];
        assert_eq!(
            adapter.storage_get(&keys).await.unwrap(),
            vec![Some(json!(10)), None]
        );

        adapter.storage_delete(&keys[..1]).await.unwrap();
        assert_eq!(adapter.storage_get(&keys[..1]).await.unwrap(), vec![None]);
    }

    #[tokio::test]
    async fn test_player_unsupported() {
        let adapter = MockAdapter::new();
        assert_eq!(
            adapter.get_player().await,
            Err(BridgeError::UnsupportedFeature(Feature::Player))
        );
        assert!(adapter.subscribe_advertisement_state().is_err());
    }
}
