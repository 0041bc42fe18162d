//! Platform adapter variants
//!
//! - `mock`: in-process fallback, storage only
//! - `qa_tool`: message-protocol adapter speaking to a host over the broker
//! - `playgama`, `absolute_games`: direct-SDK adapters

pub mod absolute_games;
pub mod mock;
pub mod playgama;
pub mod qa_tool;

use platform_bridge_core::BridgeError;
use serde_json::Value;
use std::fmt;

/// Rejection returned by a host SDK call
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SdkRejection {
    pub reason: Option<String>,
}

impl SdkRejection {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: Some(reason.into()),
        }
    }

    /// A rejection carrying no reason
    pub fn silent() -> Self {
        Self::default()
    }

    fn reason(&self) -> Option<&str> {
        self.reason.as_deref().filter(|r| !r.trim().is_empty())
    }
}

impl fmt::Display for SdkRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.reason() {
            Some(reason) => f.write_str(reason),
            None => f.write_str("rejected without reason"),
        }
    }
}

pub type SdkResult<T> = std::result::Result<T, SdkRejection>;

/// Normalize a rejection from a player-state call: no reason means no session
pub(crate) fn player_error(rejection: SdkRejection) -> BridgeError {
    match rejection.reason() {
        Some(reason) => BridgeError::Platform(reason.to_string()),
        None => BridgeError::NotAuthorized,
    }
}

/// Normalize a rejection from any other SDK call
pub(crate) fn sdk_error(operation: &str, rejection: SdkRejection) -> BridgeError {
    BridgeError::Platform(format!("{}: {}", operation, rejection))
}

/// Player ids arrive as strings or numbers depending on the SDK
pub(crate) fn id_string(value: Option<&Value>) -> String {
    match value {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        _ => String::new(),
    }
}
