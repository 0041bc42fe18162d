//! QA-Tool platform: every capability is a broker request
//!
//! The adapter speaks a fixed `(module, action)` namespace so whatever sits on
//! the other side of the channel, mock or real, can intercept by pattern.
//!
//! | call | request | response |
//! |---|---|---|
//! | initialize | `PLATFORM/INITIALIZE {options}` | `{supportedFeatures?}` |
//! | authorize_player | `PLAYER/AUTHORIZE_PLAYER {options}` | `{authorized}` |
//! | get_player | `PLAYER/GET_PLAYER` | `{player}` |
//! | storage_get | `STORAGE/GET_DATA {keys}` | `{values}` |
//! | storage_set | `STORAGE/SET_DATA {items}` | `{}` |
//! | storage_delete | `STORAGE/DELETE_DATA {keys}` | `{}` |
//! | show_* | `ADVERTISEMENT/SHOW_INTERSTITIAL`, `SHOW_REWARDED` | `{}` |
//!
//! Any response may carry `{error: {code, message}}` instead. The host pushes
//! `ADVERTISEMENT/ADVERTISEMENT_STATE_CHANGED {state}` without an id.

use crate::adapter::PlatformAdapter;
use async_trait::async_trait;
use platform_bridge_broker::{Action, Channel, LocalChannel, Message, MessageBroker, SideTag};
use platform_bridge_core::{
    AdvertisementState, BridgeError, Feature, FeatureSet, PlatformId, Player, Result,
};
use serde_json::{Map, Value, json};
use std::sync::{PoisonError, RwLock};
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

/// Features assumed when the host does not negotiate its own
pub const DEFAULT_FEATURES: [Feature; 3] =
    [Feature::Player, Feature::Storage, Feature::Advertising];

pub struct QaToolAdapter {
    broker: MessageBroker,
    timeout: Option<Duration>,
    features: RwLock<FeatureSet>,
    ad_states: broadcast::Sender<AdvertisementState>,
}

impl QaToolAdapter {
    /// Attach to `channel`. Requests time out after `timeout` when set.
    pub fn new(channel: LocalChannel, timeout: Option<Duration>) -> Self {
        let broker = MessageBroker::new(channel, SideTag::bridge());
        let (ad_states, _) = broadcast::channel(64);

        let forward = ad_states.clone();
        broker.add_listener(Channel::Message, move |msg| {
            if msg.action != Action::AdvertisementStateChanged {
                return;
            }
            match msg
                .field("state")
                .and_then(Value::as_str)
                .map(str::parse::<AdvertisementState>)
            {
                Some(Ok(state)) => {
                    debug!("Advertisement state changed: {:?}", state);
                    // No subscribers is fine
                    let _ = forward.send(state);
                }
                _ => warn!("Dropping malformed advertisement state: {:?}", msg.payload),
            }
        });

        Self {
            broker,
            timeout,
            features: RwLock::new(FeatureSet::from(DEFAULT_FEATURES)),
            ad_states,
        }
    }

    async fn call(&self, action: Action, payload: Map<String, Value>) -> Result<Message> {
        let module = action.module();
        let response = match self.timeout {
            Some(timeout) => {
                self.broker
                    .request_with_timeout(module, action, payload, timeout)
                    .await?
            }
            None => self.broker.request(module, action, payload).await?,
        };
        response.into_result()
    }
}

fn payload(key: &str, value: Value) -> Map<String, Value> {
    let mut map = Map::new();
    map.insert(key.to_string(), value);
    map
}

fn parse_features(raw: Value) -> Result<FeatureSet> {
    let Value::Array(items) = raw else {
        return Err(BridgeError::ProtocolMismatch(
            "supportedFeatures is not an array".into(),
        ));
    };
    Ok(items
        .iter()
        .filter_map(|item| match item.as_str().map(str::parse::<Feature>) {
            Some(Ok(feature)) => Some(feature),
            _ => {
                debug!("Ignoring unknown feature {}", item);
                None
            }
        })
        .collect())
}

#[async_trait]
impl PlatformAdapter for QaToolAdapter {
    fn id(&self) -> PlatformId {
        PlatformId::QaTool
    }

    fn supported_features(&self) -> FeatureSet {
        self.features
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    async fn initialize(&self, options: &Value) -> Result<()> {
        let mut response = self
            .call(Action::Initialize, payload("options", options.clone()))
            .await?;

        if let Some(raw) = response.payload.remove("supportedFeatures") {
            let features = parse_features(raw)?;
            *self.features.write().unwrap_or_else(PoisonError::into_inner) = features;
        }
        info!(
            "QA tool initialized, features: {:?}",
            self.supported_features()
        );
        Ok(())
    }

    async fn authorize_player(&self, options: &Value) -> Result<bool> {
        let mut response = self
            .call(Action::AuthorizePlayer, payload("options", options.clone()))
            .await?;
        response.take_field("authorized")
    }

    async fn get_player(&self) -> Result<Player> {
        let mut response = self.call(Action::GetPlayer, Map::new()).await?;
        let player: Player = response.take_field("player")?;
        if !player.authorized {
            return Err(BridgeError::NotAuthorized);
        }
        Ok(player)
    }

    async fn storage_get(&self, keys: &[String]) -> Result<Vec<Option<Value>>> {
        let mut response = self
            .call(Action::GetData, payload("keys", json!(keys)))
            .await?;
        let values: Vec<Value> = response.take_field("values")?;
        if values.len() != keys.len() {
            return Err(BridgeError::ProtocolMismatch(format!(
                "GET_DATA returned {} values for {} keys",
                values.len(),
                keys.len()
            )));
        }
        Ok(values
            .into_iter()
            .map(|value| (!value.is_null()).then_some(value))
            .collect())
    }

    async fn storage_set(&self, items: Map<String, Value>) -> Result<()> {
        self.call(Action::SetData, payload("items", Value::Object(items)))
            .await
            .map(|_| ())
    }

    async fn storage_delete(&self, keys: &[String]) -> Result<()> {
        self.call(Action::DeleteData, payload("keys", json!(keys)))
            .await
            .map(|_| ())
    }

    fn subscribe_advertisement_state(&self) -> Result<broadcast::Receiver<AdvertisementState>> {
        Ok(self.ad_states.subscribe())
    }

    async fn show_interstitial(&self) -> Result<()> {
        self.call(Action::ShowInterstitial, Map::new())
            .await
            .map(|_| ())
    }

    async fn show_rewarded(&self) -> Result<()> {
        self.call(Action::ShowRewarded, Map::new()).await.map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use platform_bridge_broker::{MessageSender, TARGET_ANY};

    /// Minimal host answering with a canned payload per action
    fn host_answering<F>(channel: &LocalChannel, answer: F) -> MessageBroker
    where
        F: Fn(&Message) -> Option<Message> + Send + Sync + 'static,
    {
        let host = MessageBroker::new(channel.endpoint("host"), SideTag::qa_tool());
        let sender: MessageSender = host.sender();
        host.add_listener(Channel::Message, move |msg| {
            if msg.id.is_none() {
                return;
            }
            if let Some(response) = answer(msg) {
                let _ = sender.send(response, TARGET_ANY);
            }
        });
        host
    }

    #[tokio::test]
    async fn test_initialize_negotiates_features() {
        let channel = LocalChannel::new("game");
        let _host = host_answering(&channel, |msg| {
            Some(
                Message::response_to(msg)
                    .with_field("supportedFeatures", json!(["storage", "leaderboards"])),
            )
        });
        let adapter = QaToolAdapter::new(channel, Some(Duration::from_secs(2)));

        assert_eq!(
            adapter.supported_features(),
            FeatureSet::from(DEFAULT_FEATURES)
        );
        adapter.initialize(&json!({"lang": "en"})).await.unwrap();
        assert_eq!(
            adapter.supported_features(),
            FeatureSet::from([Feature::Storage])
        );
    }

    #[tokio::test]
    async fn test_unauthorized_player() {
        let channel = LocalChannel::new("game");
        let _host = host_answering(&channel, |msg| {
            Some(Message::response_to(msg).with_field("player", json!({"authorized": false})))
        });
        let adapter = QaToolAdapter::new(channel, Some(Duration::from_secs(2)));

        assert_eq!(adapter.get_player().await, Err(BridgeError::NotAuthorized));
    }

    #[tokio::test]
    async fn test_error_payload_normalized() {
        let channel = LocalChannel::new("game");
        let _host = host_answering(&channel, |msg| {
            Some(Message::response_to(msg).with_error(&BridgeError::NotAuthorized))
        });
        let adapter = QaToolAdapter::new(channel, Some(Duration::from_secs(2)));

        assert_eq!(
            adapter.authorize_player(&Value::Null).await,
            Err(BridgeError::NotAuthorized)
        );
    }

    #[tokio::test]
    async fn test_malformed_values_fail_only_that_call() {
        let channel = LocalChannel::new("game");
        let _host = host_answering(&channel, |msg| match msg.action {
            Action::GetData => Some(Message::response_to(msg).with_field("values", json!([1]))),
            _ => Some(Message::response_to(msg)),
        });
        let adapter = QaToolAdapter::new(channel, Some(Duration::from_secs(2)));

        let keys = vec!["a".to_string(), "b".to_string()];
        assert!(matches!(
            adapter.storage_get(&keys).await,
            Err(BridgeError::ProtocolMismatch(_))
        ));
        adapter.storage_delete(&keys).await.unwrap();
    }

    #[tokio::test]
    async fn test_silent_host_times_out() {
        let channel = LocalChannel::new("game");
        let _host = host_answering(&channel, |_| None);
        let adapter = QaToolAdapter::new(channel, Some(Duration::from_millis(50)));

        assert!(matches!(
            adapter.show_interstitial().await,
            Err(BridgeError::Unresponsive(_))
        ));
    }

    #[tokio::test]
    async fn test_advertisement_state_forwarded() {
        let channel = LocalChannel::new("game");
        let host = host_answering(&channel, |_| None);
        let adapter = QaToolAdapter::new(channel, None);
        let mut states = adapter.subscribe_advertisement_state().unwrap();

        let push = |state: &str| {
            Message::new(Action::AdvertisementStateChanged).with_field("state", state)
        };
        host.send(push("bogus"), TARGET_ANY).unwrap();
        host.send(push("opened"), TARGET_ANY).unwrap();
        host.send(push("closed"), TARGET_ANY).unwrap();

        assert_eq!(states.recv().await.unwrap(), AdvertisementState::Opened);
        assert_eq!(states.recv().await.unwrap(), AdvertisementState::Closed);
    }
}
