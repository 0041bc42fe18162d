//! Platform identifiers and capability negotiation types

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// Known platform variants
///
/// The set is closed: an identifier outside it is treated as unresolved by
/// the resolver rather than as an error.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum PlatformId {
    /// In-process fallback with no host SDK behind it
    Mock,
    /// QA harness reached over the message channel
    QaTool,
    /// Playgama portal SDK
    Playgama,
    /// AbsoluteGames portal SDK
    AbsoluteGames,
}

impl PlatformId {
    pub const ALL: [PlatformId; 4] = [
        PlatformId::Mock,
        PlatformId::QaTool,
        PlatformId::Playgama,
        PlatformId::AbsoluteGames,
    ];

    /// Wire name of the platform (`platform_id` query value)
    pub fn as_str(&self) -> &'static str {
        match self {
            PlatformId::Mock => "mock",
            PlatformId::QaTool => "qa_tool",
            PlatformId::Playgama => "playgama",
            PlatformId::AbsoluteGames => "absolute_games",
        }
    }
}

impl fmt::Display for PlatformId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a string names no known platform
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownPlatform(pub String);

impl fmt::Display for UnknownPlatform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown platform id: {}", self.0)
    }
}

impl std::error::Error for UnknownPlatform {}

impl FromStr for PlatformId {
    type Err = UnknownPlatform;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        PlatformId::ALL
            .into_iter()
            .find(|id| id.as_str() == trimmed)
            .ok_or_else(|| UnknownPlatform(s.to_string()))
    }
}

/// API surface areas a platform may or may not support
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum Feature {
    Player,
    Storage,
    Advertising,
}

impl Feature {
    pub fn as_str(&self) -> &'static str {
        match self {
            Feature::Player => "player",
            Feature::Storage => "storage",
            Feature::Advertising => "advertising",
        }
    }
}

impl fmt::Display for Feature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Feature {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "player" => Ok(Feature::Player),
            "storage" => Ok(Feature::Storage),
            "advertising" => Ok(Feature::Advertising),
            other => Err(format!("unknown feature: {}", other)),
        }
    }
}

/// Set of features supported by a platform
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FeatureSet(BTreeSet<Feature>);

impl FeatureSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, feature: Feature) -> bool {
        self.0.contains(&feature)
    }

    pub fn insert(&mut self, feature: Feature) -> bool {
        self.0.insert(feature)
    }

    pub fn iter(&self) -> impl Iterator<Item = Feature> + '_ {
        self.0.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<Feature> for FeatureSet {
    fn from_iter<I: IntoIterator<Item = Feature>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl<const N: usize> From<[Feature; N]> for FeatureSet {
    fn from(features: [Feature; N]) -> Self {
        features.into_iter().collect()
    }
}

/// The platform a bridge resolved to, fixed once initialization completes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlatformIdentity {
    pub id: PlatformId,
    pub supported_features: FeatureSet,
}

impl PlatformIdentity {
    pub fn new(id: PlatformId, supported_features: FeatureSet) -> Self {
        Self {
            id,
            supported_features,
        }
    }

    pub fn supports(&self, feature: Feature) -> bool {
        self.supported_features.contains(feature)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_platform_id_parse() {
        assert_eq!("qa_tool".parse::<PlatformId>(), Ok(PlatformId::QaTool));
        assert_eq!(
            "absolute_games".parse::<PlatformId>(),
            Ok(PlatformId::AbsoluteGames)
        );
        assert!("yandex".parse::<PlatformId>().is_err());
        assert!("".parse::<PlatformId>().is_err());
    }

    #[test]
    fn test_identity_format() {
        let identity = PlatformIdentity::new(
            PlatformId::Playgama,
            FeatureSet::from([Feature::Storage, Feature::Player]),
        );
        let json = serde_json::to_string(&identity).unwrap();
        assert_eq!(
            json,
            r#"{"id":"playgama","supportedFeatures":["player","storage"]}"#
        );
        assert!(identity.supports(Feature::Player));
        assert!(!identity.supports(Feature::Advertising));
    }
}
