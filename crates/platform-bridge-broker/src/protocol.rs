//! Wire protocol exchanged over the message channel
//!
//! Messages are JSON objects namespaced by `type` (module) and `action`:
//! `{"type":"STORAGE","action":"GET_DATA","id":"…","source":"platform_bridge","keys":["a"]}`
//!
//! Module-specific payload fields are flattened into the message object.

use platform_bridge_core::{BridgeError, Feature, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Namespace grouping related actions
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Module {
    Platform,
    Player,
    Storage,
    Advertisement,
}

/// Operation within a module
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Action {
    // === PLATFORM ===
    Initialize,

    // === PLAYER ===
    AuthorizePlayer,
    GetPlayer,

    // === STORAGE ===
    GetData,
    SetData,
    DeleteData,

    // === ADVERTISEMENT ===
    ShowInterstitial,
    ShowRewarded,
    /// Pushed by the host whenever the advertisement state changes
    AdvertisementStateChanged,
}

impl Action {
    /// Wire name, as carried in `action`
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Initialize => "INITIALIZE",
            Action::AuthorizePlayer => "AUTHORIZE_PLAYER",
            Action::GetPlayer => "GET_PLAYER",
            Action::GetData => "GET_DATA",
            Action::SetData => "SET_DATA",
            Action::DeleteData => "DELETE_DATA",
            Action::ShowInterstitial => "SHOW_INTERSTITIAL",
            Action::ShowRewarded => "SHOW_REWARDED",
            Action::AdvertisementStateChanged => "ADVERTISEMENT_STATE_CHANGED",
        }
    }

    /// The module this action is scoped to
    pub fn module(&self) -> Module {
        match self {
            Action::Initialize => Module::Platform,
            Action::AuthorizePlayer | Action::GetPlayer => Module::Player,
            Action::GetData | Action::SetData | Action::DeleteData => Module::Storage,
            Action::ShowInterstitial
            | Action::ShowRewarded
            | Action::AdvertisementStateChanged => Module::Advertisement,
        }
    }
}

impl Module {
    /// Wire name, as carried in `type`
    pub fn as_str(&self) -> &'static str {
        match self {
            Module::Platform => "PLATFORM",
            Module::Player => "PLAYER",
            Module::Storage => "STORAGE",
            Module::Advertisement => "ADVERTISEMENT",
        }
    }
}

impl fmt::Display for Module {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Tag naming the logical side that emitted a message
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(transparent)]
pub struct SideTag(pub String);

impl SideTag {
    pub fn new(tag: impl Into<String>) -> Self {
        Self(tag.into())
    }

    /// The game-facing side (the bridge and its adapters)
    pub fn bridge() -> Self {
        Self::new("platform_bridge")
    }

    /// The QA harness side
    pub fn qa_tool() -> Self {
        Self::new("qa_tool")
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SideTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A message exchanged between the two sides of the channel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    #[serde(rename = "type")]
    pub module: Module,
    pub action: Action,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<SideTag>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender: Option<SideTag>,
    #[serde(flatten)]
    pub payload: Map<String, Value>,
}

impl Message {
    /// A message for `action`, namespaced by the action's own module
    pub fn new(action: Action) -> Self {
        Self {
            module: action.module(),
            action,
            id: None,
            source: None,
            sender: None,
            payload: Map::new(),
        }
    }

    /// A response skeleton carrying the same `(type, action, id)` as `request`
    pub fn response_to(request: &Message) -> Self {
        Self {
            module: request.module,
            action: request.action,
            id: request.id.clone(),
            source: None,
            sender: None,
            payload: Map::new(),
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_payload(mut self, payload: Map<String, Value>) -> Self {
        self.payload = payload;
        self
    }

    pub fn with_field(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.payload.insert(key.to_string(), value.into());
        self
    }

    /// Attach an `{ "error": { code, message } }` payload
    pub fn with_error(self, error: &BridgeError) -> Self {
        let message = match error {
            BridgeError::UnsupportedFeature(feature) => feature.as_str().to_string(),
            other => other.to_string(),
        };
        self.with_field(
            "error",
            serde_json::json!({ "code": error.code(), "message": message }),
        )
    }

    /// The side that originated this message: `source`, else `sender`
    pub fn origin(&self) -> Option<&SideTag> {
        self.source.as_ref().or(self.sender.as_ref())
    }

    pub fn is_from(&self, side: &SideTag) -> bool {
        self.origin() == Some(side)
    }

    pub fn field(&self, key: &str) -> Option<&Value> {
        self.payload.get(key)
    }

    /// Error carried in the payload, if any
    pub fn error(&self) -> Option<BridgeError> {
        let error = self.payload.get("error")?;
        let code = error.get("code").and_then(Value::as_str).unwrap_or_default();
        let message = error
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or_default();
        Some(BridgeError::from_wire(code, message))
    }

    /// Convert an error payload into `Err`, leaving successful responses intact
    pub fn into_result(self) -> Result<Message> {
        match self.error() {
            Some(err) => Err(err),
            None => Ok(self),
        }
    }

    /// Deserialize a payload field into `T`, reporting shape errors as protocol mismatches
    pub fn take_field<T: serde::de::DeserializeOwned>(&mut self, key: &str) -> Result<T> {
        let value = self.payload.remove(key).ok_or_else(|| {
            BridgeError::ProtocolMismatch(format!(
                "{}/{} response missing field `{}`",
                self.module, self.action, key
            ))
        })?;
        serde_json::from_value(value).map_err(|e| {
            BridgeError::ProtocolMismatch(format!(
                "{}/{} field `{}`: {}",
                self.module, self.action, key, e
            ))
        })
    }

    /// Check that the action belongs to the module named in `type`
    pub fn validate(&self) -> Result<()> {
        if self.action.module() != self.module {
            return Err(BridgeError::ProtocolMismatch(format!(
                "action {} is not part of module {}",
                self.action, self.module
            )));
        }
        Ok(())
    }
}

/// Helper to build an `UnsupportedFeature` error response
pub fn unsupported(request: &Message, feature: Feature) -> Message {
    Message::response_to(request).with_error(&BridgeError::UnsupportedFeature(feature))
}

/// Serialize a message to a JSON value for posting on a channel
pub fn encode(msg: &Message) -> Result<Value> {
    serde_json::to_value(msg).map_err(Into::into)
}

/// Decode and validate a JSON value received from the channel
pub fn decode(value: Value) -> Result<Message> {
    let msg: Message = serde_json::from_value(value)
        .map_err(|e| BridgeError::ProtocolMismatch(e.to_string()))?;
    msg.validate()?;
    Ok(msg)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tokio_test::{assert_err, assert_ok};

    #[test]
    fn test_request_format() {
        let mut msg = Message::new(Action::GetData)
            .with_id("req-1")
            .with_field("keys", json!(["a", "b"]));
        msg.source = Some(SideTag::bridge());

        let value = assert_ok!(encode(&msg));
        assert_eq!(
            value,
            json!({
                "type": "STORAGE",
                "action": "GET_DATA",
                "id": "req-1",
                "source": "platform_bridge",
                "keys": ["a", "b"]
            })
        );
    }

    #[test]
    fn test_decode_from_host() {
        // Exact JSON format expected from the QA harness
        let value = json!({
            "type": "PLAYER",
            "action": "GET_PLAYER",
            "id": "42",
            "sender": "qa_tool",
            "player": {"authorized": true, "id": "p-1"}
        });
        let msg = assert_ok!(decode(value));
        assert_eq!(msg.module, Module::Player);
        assert_eq!(msg.action, Action::GetPlayer);
        assert!(msg.is_from(&SideTag::qa_tool()));
        assert!(msg.field("player").is_some());
    }

    #[test]
    fn test_decode_rejects_mismatched_module() {
        let value = json!({"type": "PLAYER", "action": "GET_DATA"});
        assert!(matches!(
            decode(value),
            Err(BridgeError::ProtocolMismatch(_))
        ));
    }

    #[test]
    fn test_decode_rejects_unknown_action() {
        let value = json!({"type": "STORAGE", "action": "DROP_TABLE"});
        assert!(matches!(
            decode(value),
            Err(BridgeError::ProtocolMismatch(_))
        ));
    }

    #[test]
    fn test_error_payload() {
        let request = Message::new(Action::ShowRewarded).with_id("7");
        let response = unsupported(&request, Feature::Advertising);
        assert_eq!(response.id.as_deref(), Some("7"));
        assert_eq!(
            assert_err!(response.into_result()),
            BridgeError::UnsupportedFeature(Feature::Advertising)
        );
    }

    #[test]
    fn test_display_uses_wire_names() {
        for action in [
            Action::Initialize,
            Action::AuthorizePlayer,
            Action::GetPlayer,
            Action::GetData,
            Action::SetData,
            Action::DeleteData,
            Action::ShowInterstitial,
            Action::ShowRewarded,
            Action::AdvertisementStateChanged,
        ] {
            assert_eq!(json!(action), json!(action.to_string()));
            assert_eq!(json!(action.module()), json!(action.module().to_string()));
        }
        assert_eq!(
            format!("{}/{}", Module::Storage, Action::GetData),
            "STORAGE/GET_DATA"
        );
    }

    #[test]
    fn test_take_field_shape_mismatch() {
        let mut msg = Message::new(Action::GetData).with_field("values", json!("nope"));
        let result: Result<Vec<Value>> = msg.take_field("values");
        assert!(matches!(result, Err(BridgeError::ProtocolMismatch(_))));
    }
}
