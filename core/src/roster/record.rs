use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

/// One character in the live roster.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CharacterRecord {
    pub name: String,
    pub last_seen_in_combat_at: Option<DateTime<Utc>>,
    pub is_main_character: bool,
    pub is_in_group: bool,
    pub is_active: bool,
    /// Position given by the user; tiebreaker for turn order.
    pub manual_order: Option<u32>,
    /// Turn counter reported by the snapshot feed.
    pub turn_order: Option<u32>,
    /// Added by hand rather than detected.
    pub is_manual: bool,
}

impl CharacterRecord {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            last_seen_in_combat_at: None,
            is_main_character: false,
            is_in_group: false,
            is_active: false,
            manual_order: None,
            turn_order: None,
            is_manual: false,
        }
    }

    pub fn key(&self) -> String {
        name_key(&self.name)
    }

    pub fn matches(&self, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(name) || self.key() == name_key(name)
    }

    /// Never removed by automatic eviction.
    pub fn is_protected(&self) -> bool {
        self.is_main_character || self.is_in_group || self.is_manual
    }

    /// Not active and not seen in combat within `timeout`.
    pub fn is_stale(&self, now: DateTime<Utc>, timeout: TimeDelta) -> bool {
        if self.is_active {
            return false;
        }
        match self.last_seen_in_combat_at {
            Some(seen) => now.signed_duration_since(seen) > timeout,
            None => true,
        }
    }
}

/// Case-insensitive identity of a character name.
pub fn name_key(name: &str) -> String {
    name.trim().to_lowercase()
}
