//! Advertisement lifecycle states

use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// State of the advertisement currently managed by the platform
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AdvertisementState {
    Loading,
    Opened,
    Closed,
    Failed,
    Rewarded,
}

impl FromStr for AdvertisementState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "loading" => Ok(AdvertisementState::Loading),
            "opened" | "open" => Ok(AdvertisementState::Opened),
            "closed" | "close" => Ok(AdvertisementState::Closed),
            "failed" | "error" => Ok(AdvertisementState::Failed),
            "rewarded" => Ok(AdvertisementState::Rewarded),
            other => Err(format!("unknown advertisement state: {}", other)),
        }
    }
}
