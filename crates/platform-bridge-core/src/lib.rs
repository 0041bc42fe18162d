//! # platform-bridge-core
//!
//! Core types shared across the platform bridge crates.
//!
//! This crate provides the foundational types used by the broker, the adapters
//! and the facade:
//! - Platform identifiers and the capability (feature) set
//! - Player state as reported by a platform
//! - Advertisement lifecycle states
//! - The bridge error taxonomy and its wire codes

pub mod advertising;
pub mod error;
pub mod platform;
pub mod player;

pub use advertising::AdvertisementState;
pub use error::{BridgeError, Result, error_codes};
pub use platform::{Feature, FeatureSet, PlatformId, PlatformIdentity};
pub use player::Player;
