//! # platform-bridge
//!
//! Unified game platform API backed by a platform adapter chosen at runtime.
//!
//! This crate provides:
//! - `PlatformResolver`: override > `platform_id` query > remote lookup > default
//! - `PlatformAdapter` trait and its variants (Mock, QA-Tool, Playgama, AbsoluteGames)
//! - `PlatformContext`: the SDK handles and channel an embedder hands to the bridge
//! - `PlatformBridge`: the facade applications hold

pub mod adapter;
pub mod adapters;
pub mod bridge;
pub mod config;
pub mod context;
pub mod registry;
pub mod resolver;

pub use adapter::PlatformAdapter;
pub use bridge::{AdvertisingApi, PlatformBridge, PlayerApi, StorageApi};
pub use config::BridgeOptions;
pub use context::PlatformContext;
pub use resolver::{
    HttpRemoteConfig, PlatformResolver, RemoteConfig, RemoteConfigSource, Resolution,
    ResolutionSource,
};

pub use platform_bridge_core::{
    AdvertisementState, BridgeError, Feature, FeatureSet, PlatformId, PlatformIdentity, Player,
    Result,
};
