//! Player state as reported by a platform

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Player state, owned by whichever side is authoritative for the platform.
///
/// The bridge treats it as read-only and fetches it on demand.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Player {
    pub authorized: bool,
    #[serde(default)]
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub photos: Vec<String>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub extra: HashMap<String, serde_json::Value>,
}

impl Player {
    /// An authorized player with the given id
    pub fn authorized(id: impl Into<String>) -> Self {
        Self {
            authorized: true,
            id: id.into(),
            ..Default::default()
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_player_from_host() {
        let json = r#"{
            "authorized": true,
            "id": "p-1",
            "name": "Ada",
            "photos": ["https://cdn/a.png"],
            "extra": {"level": 3}
        }"#;
        let player: Player = serde_json::from_str(json).unwrap();
        assert!(player.authorized);
        assert_eq!(player.id, "p-1");
        assert_eq!(player.name.as_deref(), Some("Ada"));
        assert_eq!(player.photos.len(), 1);
        assert_eq!(player.extra["level"], 3);
    }

    #[test]
    fn test_unauthorized_minimal() {
        let player: Player = serde_json::from_str(r#"{"authorized":false}"#).unwrap();
        assert!(!player.authorized);
        assert!(player.id.is_empty());
    }
}
