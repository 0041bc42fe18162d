//! # qa-tool-harness
//!
//! Host side of the QA-Tool platform protocol. A [`QaToolHost`] attaches to a
//! message channel and answers every `(module, action)` request the QA-Tool
//! adapter issues from an in-memory [`HostState`]: one player, a key-value
//! store and a feature set. Showing an ad pushes the advertisement state
//! sequence a real ad network would report.

use platform_bridge_broker::{
    Action, Channel, Message, MessageBroker, MessageChannel, SideTag, TARGET_ANY,
    unsupported,
};
use platform_bridge_core::{AdvertisementState, BridgeError, Feature, FeatureSet, Player, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, info, warn};

/// Initial state of a host
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HostConfig {
    /// Account that authorizing signs in. `None` means authorization is declined.
    pub player: Option<Player>,
    /// Whether the player starts out signed in
    pub signed_in: bool,
    pub features: FeatureSet,
    pub storage: Map<String, Value>,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            player: None,
            signed_in: false,
            features: FeatureSet::from([Feature::Player, Feature::Storage, Feature::Advertising]),
            storage: Map::new(),
        }
    }
}

impl HostConfig {
    pub fn with_player(mut self, player: Player, signed_in: bool) -> Self {
        self.player = Some(player);
        self.signed_in = signed_in;
        self
    }

    pub fn with_features(mut self, features: FeatureSet) -> Self {
        self.features = features;
        self
    }
}

/// State the host answers from
#[derive(Debug)]
pub struct HostState {
    account: Option<Player>,
    signed_in: bool,
    features: FeatureSet,
    storage: HashMap<String, Value>,
    initialized: bool,
}

impl HostState {
    pub fn new(config: HostConfig) -> Self {
        Self {
            account: config.player,
            signed_in: config.signed_in,
            features: config.features,
            storage: config.storage.into_iter().collect(),
            initialized: false,
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub fn stored(&self, key: &str) -> Option<&Value> {
        self.storage.get(key)
    }

    fn require(&self, feature: Feature) -> Result<()> {
        if self.features.contains(feature) {
            Ok(())
        } else {
            Err(BridgeError::UnsupportedFeature(feature))
        }
    }

    /// The player as the bridge sees it
    fn player(&self) -> Player {
        match (&self.account, self.signed_in) {
            (Some(account), true) => Player {
                authorized: true,
                ..account.clone()
            },
            _ => Player::default(),
        }
    }
}

/// Answers QA-Tool requests arriving on a channel
pub struct QaToolHost {
    broker: MessageBroker,
    state: Arc<Mutex<HostState>>,
}

impl QaToolHost {
    /// Attach to `channel` and start answering
    pub fn attach(channel: impl MessageChannel + 'static, config: HostConfig) -> Self {
        let broker = MessageBroker::new(channel, SideTag::qa_tool());
        let state = Arc::new(Mutex::new(HostState::new(config)));

        // A sender rather than a broker clone: the broker owns this listener
        let sender = broker.sender();
        let listener_state = state.clone();
        broker.add_listener(Channel::Message, move |msg| {
            if msg.id.is_none() {
                debug!("Ignoring push {}/{}", msg.module, msg.action);
                return;
            }
            let mut state = listener_state
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            for reply in handle_request(msg, &mut state) {
                if let Err(e) = sender.send(reply, TARGET_ANY) {
                    warn!("Failed to answer {}/{}: {}", msg.module, msg.action, e);
                }
            }
        });

        Self { broker, state }
    }

    pub fn side(&self) -> &SideTag {
        self.broker.side()
    }

    /// Inspect the host state
    pub fn with_state<T>(&self, f: impl FnOnce(&mut HostState) -> T) -> T {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut state)
    }

    /// Push an advertisement state change without a request
    pub fn push_ad_state(&self, state: AdvertisementState) -> Result<()> {
        self.broker.send(ad_state_message(state), TARGET_ANY)
    }
}

fn ad_state_message(state: AdvertisementState) -> Message {
    let state = serde_json::to_value(state).unwrap_or(Value::Null);
    Message::new(Action::AdvertisementStateChanged).with_field("state", state)
}

/// Replies to one request: the response, then any pushes it triggers
pub fn handle_request(request: &Message, state: &mut HostState) -> Vec<Message> {
    debug!("Host handling {}/{}", request.module, request.action);

    let result = match request.action {
        Action::Initialize => handle_initialize(state),
        Action::AuthorizePlayer => handle_authorize(state),
        Action::GetPlayer => handle_get_player(state),
        Action::GetData => handle_get_data(request, state),
        Action::SetData => handle_set_data(request, state),
        Action::DeleteData => handle_delete_data(request, state),
        Action::ShowInterstitial | Action::ShowRewarded => handle_show_ad(request, state),
        Action::AdvertisementStateChanged => Err(BridgeError::ProtocolMismatch(
            "ADVERTISEMENT_STATE_CHANGED is a host push".into(),
        )),
    };

    match result {
        Ok((fields, pushes)) => {
            let mut replies = vec![Message::response_to(request).with_payload(fields)];
            replies.extend(pushes.into_iter().map(ad_state_message));
            replies
        }
        Err(BridgeError::UnsupportedFeature(feature)) => vec![unsupported(request, feature)],
        Err(e) => {
            debug!("{}/{} failed: {}", request.module, request.action, e);
            vec![Message::response_to(request).with_error(&e)]
        }
    }
}

type Handled = Result<(Map<String, Value>, Vec<AdvertisementState>)>;

fn fields(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

fn request_field<T: serde::de::DeserializeOwned>(request: &Message, key: &str) -> Result<T> {
    request.clone().take_field(key)
}

fn handle_initialize(state: &mut HostState) -> Handled {
    state.initialized = true;
    info!("Bridge initialized, offering {:?}", state.features);
    Ok((
        fields(json!({ "supportedFeatures": state.features })),
        Vec::new(),
    ))
}

fn handle_authorize(state: &mut HostState) -> Handled {
    state.require(Feature::Player)?;
    state.signed_in = state.account.is_some();
    Ok((fields(json!({ "authorized": state.signed_in })), Vec::new()))
}

fn handle_get_player(state: &mut HostState) -> Handled {
    state.require(Feature::Player)?;
    let player = serde_json::to_value(state.player())?;
    Ok((fields(json!({ "player": player })), Vec::new()))
}

fn handle_get_data(request: &Message, state: &mut HostState) -> Handled {
    state.require(Feature::Storage)?;
    let keys: Vec<String> = request_field(request, "keys")?;
    let values: Vec<Value> = keys
        .iter()
        .map(|key| state.storage.get(key).cloned().unwrap_or(Value::Null))
        .collect();
    Ok((fields(json!({ "values": values })), Vec::new()))
}

fn handle_set_data(request: &Message, state: &mut HostState) -> Handled {
    state.require(Feature::Storage)?;
    let items: Map<String, Value> = request_field(request, "items")?;
    state.storage.extend(items);
    Ok((Map::new(), Vec::new()))
}

fn handle_delete_data(request: &Message, state: &mut HostState) -> Handled {
    state.require(Feature::Storage)?;
    let keys: Vec<String> = request_field(request, "keys")?;
    for key in &keys {
        state.storage.remove(key);
    }
    Ok((Map::new(), Vec::new()))
}

fn handle_show_ad(request: &Message, state: &mut HostState) -> Handled {
    state.require(Feature::Advertising)?;
    let mut pushes = vec![AdvertisementState::Loading, AdvertisementState::Opened];
    if request.action == Action::ShowRewarded {
        pushes.push(AdvertisementState::Rewarded);
    }
    pushes.push(AdvertisementState::Closed);
    Ok((Map::new(), pushes))
}
