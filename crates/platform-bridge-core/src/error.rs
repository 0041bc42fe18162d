//! Error types for the platform bridge

use crate::platform::{Feature, PlatformId};
use thiserror::Error;

/// Result type for bridge operations
pub type Result<T> = std::result::Result<T, BridgeError>;

/// Bridge error types
///
/// Adapter-level failures are normalized into these variants before they
/// reach application code.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BridgeError {
    /// A facade method was called before `initialize` completed
    #[error("Bridge is not initialized")]
    NotInitialized,

    /// `initialize` was called on a facade that is already initialized
    #[error("Bridge is already initialized")]
    AlreadyInitialized,

    /// `initialize` was called while another call is still running
    #[error("Bridge initialization is in progress")]
    InitializationInProgress,

    /// The active platform lacks the requested capability
    #[error("Unsupported feature: {0}")]
    UnsupportedFeature(Feature),

    /// The platform reports no authorized player session
    #[error("Player is not authorized")]
    NotAuthorized,

    /// A message or payload did not match the contract for its module/action
    #[error("Protocol mismatch: {0}")]
    ProtocolMismatch(String),

    /// No matching response arrived within the caller's timeout
    #[error("No response: {0}")]
    Unresponsive(String),

    /// The platform could not be resolved remotely
    #[error("Resolution failure: {0}")]
    ResolutionFailure(String),

    /// The embedding context provides no SDK handle for the platform
    #[error("SDK unavailable for platform {0}")]
    SdkUnavailable(PlatformId),

    /// Channel or stream transport error
    #[error("Transport error: {0}")]
    Transport(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Error reported by the underlying platform SDK
    #[error("Platform error: {0}")]
    Platform(String),
}

impl From<serde_json::Error> for BridgeError {
    fn from(err: serde_json::Error) -> Self {
        BridgeError::Serialization(err.to_string())
    }
}

impl BridgeError {
    /// Wire code used when this error crosses the message channel
    pub fn code(&self) -> &'static str {
        match self {
            BridgeError::NotAuthorized => error_codes::NOT_AUTHORIZED,
            BridgeError::UnsupportedFeature(_) => error_codes::UNSUPPORTED_FEATURE,
            _ => error_codes::PLATFORM_ERROR,
        }
    }

    /// Rebuild an error from a wire `{ code, message }` pair.
    ///
    /// Unknown codes and unknown feature names degrade to `Platform`.
    pub fn from_wire(code: &str, message: &str) -> Self {
        match code {
            error_codes::NOT_AUTHORIZED => BridgeError::NotAuthorized,
            error_codes::UNSUPPORTED_FEATURE => match message.parse::<Feature>() {
                Ok(feature) => BridgeError::UnsupportedFeature(feature),
                Err(_) => BridgeError::Platform(message.to_string()),
            },
            _ => BridgeError::Platform(message.to_string()),
        }
    }
}

/// Error codes carried in `{ "error": { "code", "message" } }` payloads
pub mod error_codes {
    pub const NOT_AUTHORIZED: &str = "NOT_AUTHORIZED";
    pub const UNSUPPORTED_FEATURE: &str = "UNSUPPORTED_FEATURE";
    pub const PLATFORM_ERROR: &str = "PLATFORM_ERROR";
}
