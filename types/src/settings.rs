use serde::{Deserialize, Serialize};

/// Which stream a watched file carries.
///
/// Extractors run on every line regardless of role; the role only decides
/// how a file is recovered at start-up (roster replay vs. sale recovery).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFileRole {
    /// `wakfu.log`: fights, server connections, disconnects.
    #[default]
    Game,
    /// `wakfu_chat.log`: loot, sales, group membership, experience.
    Chat,
}

impl LogFileRole {
    pub fn default_file_name(self) -> &'static str {
        match self {
            Self::Game => "wakfu.log",
            Self::Chat => "wakfu_chat.log",
        }
    }
}

impl std::str::FromStr for LogFileRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "game" => Ok(Self::Game),
            "chat" => Ok(Self::Chat),
            other => Err(format!("unknown log role '{other}' (expected game or chat)")),
        }
    }
}

/// Tunables for the tracker. Every field has a default so older config
/// files keep loading after new settings are added.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerSettings {
    /// Directory holding the game's log files. Empty means "auto-detect".
    pub log_directory: String,
    /// Where roster/ledger state is persisted. Empty means "platform data dir".
    pub data_directory: String,
    /// Tailing timer period. This timer is the source of truth for reads.
    pub poll_interval_ms: u64,
    /// Trigger extra reads from filesystem notifications (never replaces the timer).
    pub use_fs_notifications: bool,
    /// Size of the recently-active window (main character excluded).
    pub recent_window: usize,
    pub inactivity_timeout_secs: u64,
    pub max_group_size: usize,
    /// Optional companion JSON feed polled for roster reconciliation.
    pub snapshot_path: Option<String>,
    pub snapshot_poll_secs: u64,
    pub persist_interval_secs: u64,
    /// Grace window of the reinstall-vs-reconnect heuristic.
    pub reinstall_grace_secs: u64,
    /// How many trailing chat lines are scanned for a sale made while offline.
    pub sale_recovery_lines: usize,
    /// How many trailing bytes of the game log are replayed to rebuild the roster.
    pub replay_tail_bytes: u64,
    /// Loot owner when no main character has been designated yet.
    pub main_character_fallback: String,
}

impl Default for TrackerSettings {
    fn default() -> Self {
        Self {
            log_directory: String::new(),
            data_directory: String::new(),
            poll_interval_ms: 350,
            use_fs_notifications: true,
            recent_window: 6,
            inactivity_timeout_secs: 30,
            max_group_size: 6,
            snapshot_path: None,
            snapshot_poll_secs: 2,
            persist_interval_secs: 10,
            reinstall_grace_secs: 3600,
            sale_recovery_lines: 200,
            replay_tail_bytes: 256 * 1024,
            main_character_fallback: "Moi".to_string(),
        }
    }
}
