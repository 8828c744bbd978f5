use std::fs;
use std::path::Path;
use std::time::SystemTime;

use chrono::{DateTime, TimeDelta, Utc};
use serde::Serialize;

/// How the previous session relates to the logs found at start-up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum StartupMode {
    /// Logs predate the last run: reinstall or long absence. Logs are
    /// truncated and detected characters forgotten.
    FreshInstall,
    /// Normal restart. The log tail is replayed to rebuild state.
    Reconnect,
}

/// Logs older than `last_app_run - grace` mean a fresh install.
/// Without a previous run or any log there is nothing to compare, so the
/// logs are left alone.
pub fn classify_startup(
    last_app_run: Option<DateTime<Utc>>,
    newest_log_modified: Option<DateTime<Utc>>,
    grace: TimeDelta,
) -> StartupMode {
    match (last_app_run, newest_log_modified) {
        (Some(last_run), Some(modified)) if modified < last_run - grace => StartupMode::FreshInstall,
        _ => StartupMode::Reconnect,
    }
}

/// Most recent modification time among `paths` that exist.
pub fn newest_modification(paths: &[&Path]) -> Option<DateTime<Utc>> {
    paths
        .iter()
        .filter_map(|p| fs::metadata(p).and_then(|m| m.modified()).ok())
        .max()
        .map(|t: SystemTime| DateTime::<Utc>::from(t))
}
