//! External player snapshot feed.
//!
//! A companion tool may publish a small JSON summary of the players it sees.
//! The roster cross-checks itself against it; a missing or malformed file
//! reads as an empty snapshot.

use std::fs;
use std::io;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SnapshotPlayer {
    /// Opaque identifier; producers use numbers or strings.
    pub id: Option<serde_json::Value>,
    pub name: String,
    pub is_main_character: bool,
    pub is_in_group: bool,
    pub last_seen_in_combat: Option<DateTime<Utc>>,
    pub is_active: bool,
    pub turn_order: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PlayerSnapshot {
    pub players: Vec<SnapshotPlayer>,
    pub combat_active: bool,
    pub server_name: Option<String>,
    pub last_update: Option<DateTime<Utc>>,
}

pub fn load_snapshot(path: &Path) -> PlayerSnapshot {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return PlayerSnapshot::default(),
        Err(e) => {
            tracing::debug!(path = %path.display(), error = %e, "Snapshot unreadable");
            return PlayerSnapshot::default();
        }
    };
    serde_json::from_str(&content).unwrap_or_else(|e| {
        tracing::debug!(path = %path.display(), error = %e, "Snapshot malformed, treating as empty");
        PlayerSnapshot::default()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parses_feed_document() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("players.json");
        fs::write(
            &path,
            r#"{
                "players": [
                    {"id": 7, "name": "Bob", "isMainCharacter": false, "isInGroup": true,
                     "lastSeenInCombat": "2026-01-02T10:00:00Z", "isActive": true},
                    {"id": "x", "name": "Alice"}
                ],
                "combatActive": true,
                "serverName": null,
                "lastUpdate": "2026-01-02T10:00:05Z"
            }"#,
        )
        .unwrap();

        let snapshot = load_snapshot(&path);
        assert!(snapshot.combat_active);
        assert_eq!(snapshot.players.len(), 2);
        assert!(snapshot.players[0].is_in_group);
        assert_eq!(snapshot.players[0].turn_order, None);
        assert_eq!(snapshot.players[1].name, "Alice");
        assert!(!snapshot.players[1].is_active);
    }

    #[test]
    fn test_missing_or_malformed_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(load_snapshot(&dir.path().join("none.json")), PlayerSnapshot::default());

        let path = dir.path().join("bad.json");
        fs::write(&path, "[1, 2").unwrap();
        assert_eq!(load_snapshot(&path), PlayerSnapshot::default());
    }
}
