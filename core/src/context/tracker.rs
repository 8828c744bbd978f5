//! The tracker service: owns the watched logs, the shared session state and
//! the background loops, and exposes the control operations used by the CLI.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chrono::{TimeDelta, Utc};
use hashbrown::HashMap;
use serde::Serialize;
use tokio::sync::{Mutex, mpsc};
use wakmeter_types::LogFileRole;

use super::app_config::{AppConfig, resolve_log_path};
use super::background_tasks::BackgroundTasks;
use super::session_core::{RoleSink, SessionCore};
use crate::aggregate::{AggregateCounter, XpTotals};
use crate::events::{GameSignal, SignalHandler};
use crate::loot::{LedgerSnapshot, LootError, LootRecord};
use crate::roster::{
    CharacterRecord, RosterConfig, RosterError, RosterOutcome, StartupMode, classify_startup,
    newest_modification,
};
use crate::storage::JsonStore;
use crate::tail::{LogTail, TailError, WatchHandle, spawn_watch, truncate_log};

pub const ROSTER_FILE: &str = "roster.json";
pub const LEDGER_FILE: &str = "loot.json";

#[derive(Debug, thiserror::Error)]
pub enum TrackerError {
    #[error(transparent)]
    Roster(#[from] RosterError),
    #[error(transparent)]
    Loot(#[from] LootError),
    #[error(transparent)]
    Tail(#[from] TailError),
    #[error("not watching {0}")]
    NotWatched(PathBuf),
}

/// What a reset clears.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResetScope {
    /// Loot ledger plus sale and experience counters.
    Ledger,
    /// Detected characters and live session state.
    Roster,
    /// Both, and the watched log files are truncated.
    Full,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WatchedFileStats {
    pub path: PathBuf,
    pub role: LogFileRole,
    pub byte_offset: u64,
    pub last_known_length: u64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionStats {
    pub files: Vec<WatchedFileStats>,
    pub server: Option<String>,
    pub main_character: Option<String>,
    pub roster_size: usize,
    pub ledger_entries: usize,
    pub sales: AggregateCounter,
    pub items_sold: u64,
    pub xp_total: u64,
    pub startup_mode: StartupMode,
}

struct WatchedLog {
    role: LogFileRole,
    handle: WatchHandle,
}

pub struct Tracker {
    core: Arc<SessionCore>,
    config: AppConfig,
    startup_mode: StartupMode,
    watches: Mutex<HashMap<PathBuf, WatchedLog>>,
    background: Mutex<Option<BackgroundTasks>>,
}

impl Tracker {
    /// Restore persisted state, classify the start-up, begin watching the
    /// game and chat logs and start the background loops.
    pub async fn start(config: AppConfig) -> Self {
        let data_dir = config.data_directory();
        let core = Arc::new(SessionCore::new(
            config.tracker.clone(),
            JsonStore::<RosterConfig>::new(data_dir.join(ROSTER_FILE)),
            JsonStore::<LedgerSnapshot>::new(data_dir.join(LEDGER_FILE)),
        ));

        let game = config.log_path(LogFileRole::Game);
        let chat = config.log_path(LogFileRole::Chat);
        let grace = TimeDelta::seconds(config.tracker.reinstall_grace_secs as i64);
        let last_run = core.roster().config().last_app_run;
        let startup_mode = classify_startup(
            last_run,
            newest_modification(&[game.as_path(), chat.as_path()]),
            grace,
        );
        tracing::info!(?startup_mode, ?last_run, "Classified start-up");

        if startup_mode == StartupMode::FreshInstall {
            for path in [&game, &chat] {
                if let Err(e) = truncate_log(path) {
                    tracing::warn!(path = %path.display(), error = %e, "Failed to truncate stale log");
                }
            }
            core.roster().reset_all();
        }
        core.roster().mark_app_run(Utc::now());
        core.persist_all();

        let tracker = Self {
            core,
            config,
            startup_mode,
            watches: Mutex::new(HashMap::new()),
            background: Mutex::new(None),
        };
        tracker.watch(game, LogFileRole::Game).await;
        tracker.watch(chat, LogFileRole::Chat).await;

        let background = BackgroundTasks::spawn(Arc::clone(&tracker.core));
        *tracker.background.lock().await = Some(background);
        tracker
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn startup_mode(&self) -> StartupMode {
        self.startup_mode
    }

    // ─── Watching ───────────────────────────────────────────────────────────

    /// Start tailing `path` from its current end after recovering what the
    /// role needs from the existing content. Relative paths are taken from
    /// the log directory. Returns `false` if the path is already watched.
    pub async fn watch(&self, path: PathBuf, role: LogFileRole) -> bool {
        let path = resolve_log_path(&self.config, &path);
        let mut watches = self.watches.lock().await;
        if watches.contains_key(&path) {
            return false;
        }

        let core = Arc::clone(&self.core);
        let tail_path = path.clone();
        let recovered = tokio::task::spawn_blocking(move || {
            let tail = LogTail::starting_at_end(&tail_path);
            match role {
                LogFileRole::Game => core.replay_roster(&tail_path),
                LogFileRole::Chat => core.recover_sale(&tail_path),
            }
            tail
        })
        .await;
        let tail = match recovered {
            Ok(tail) => tail,
            Err(e) => {
                tracing::error!(path = %path.display(), error = %e, "Log recovery task failed");
                LogTail::starting_at_end(&path)
            }
        };

        let settings = &self.core.settings;
        let handle = spawn_watch(
            Arc::new(tail),
            Arc::new(RoleSink {
                core: Arc::clone(&self.core),
                role,
            }),
            Duration::from_millis(settings.poll_interval_ms),
            settings.use_fs_notifications,
        );
        watches.insert(path, WatchedLog { role, handle });
        true
    }

    pub async fn unwatch(&self, path: &Path) -> Result<(), TrackerError> {
        let path = resolve_log_path(&self.config, path);
        let path = path.as_path();
        let watched = self
            .watches
            .lock()
            .await
            .remove(path)
            .ok_or_else(|| TrackerError::NotWatched(path.to_path_buf()))?;
        watched.handle.stop().await;
        tracing::info!(path = %path.display(), "Stopped watching log");
        Ok(())
    }

    pub async fn watched(&self) -> Vec<(PathBuf, LogFileRole)> {
        let mut files: Vec<_> = self
            .watches
            .lock()
            .await
            .iter()
            .map(|(path, w)| (path.clone(), w.role))
            .collect();
        files.sort_by(|a, b| a.0.cmp(&b.0));
        files
    }

    /// Read whatever is new in `path` now instead of waiting for the timer.
    pub async fn force_read(&self, path: &Path) -> Result<usize, TrackerError> {
        let path = resolve_log_path(&self.config, path);
        let path = path.as_path();
        let (tail, role) = {
            let watches = self.watches.lock().await;
            let watched = watches
                .get(path)
                .ok_or_else(|| TrackerError::NotWatched(path.to_path_buf()))?;
            (Arc::clone(watched.handle.tail()), watched.role)
        };
        let core = Arc::clone(&self.core);
        let read = tokio::task::spawn_blocking(move || {
            tail.poll_with(|batch| core.apply_batch(role, tail.path(), batch))
        })
        .await;
        match read {
            Ok(count) => Ok(count),
            Err(e) => {
                tracing::error!(path = %path.display(), error = %e, "Forced read failed");
                Ok(0)
            }
        }
    }

    // ─── Roster ─────────────────────────────────────────────────────────────

    pub fn characters(&self) -> Vec<CharacterRecord> {
        self.core.roster().characters()
    }

    pub fn visible_characters(&self) -> Vec<CharacterRecord> {
        self.core.roster().visible_characters()
    }

    pub fn roster_config(&self) -> RosterConfig {
        self.core.roster().config().clone()
    }

    pub fn set_main_character(&self, name: &str) -> Result<(), TrackerError> {
        let outcome = self.core.roster().set_main_character(name)?;
        self.commit_roster(outcome);
        Ok(())
    }

    pub fn add_manual_character(&self, name: &str) -> Result<(), TrackerError> {
        let outcome = self.core.roster().add_manual_character(name)?;
        self.commit_roster(outcome);
        Ok(())
    }

    pub fn remove_character(&self, name: &str) -> Result<(), TrackerError> {
        let outcome = self.core.roster().remove_character(name)?;
        self.commit_roster(outcome);
        Ok(())
    }

    pub fn set_character_visibility(&self, name: &str, visible: bool) -> Result<(), TrackerError> {
        let outcome = self.core.roster().set_character_visibility(name, visible)?;
        self.commit_roster(outcome);
        Ok(())
    }

    pub fn add_my_character(&self, name: &str) -> Result<bool, TrackerError> {
        let added = self.core.roster().add_my_character(name)?;
        if added {
            self.commit_roster(RosterOutcome::default());
        }
        Ok(added)
    }

    pub fn remove_my_character(&self, name: &str) -> bool {
        let removed = self.core.roster().remove_my_character(name);
        if removed {
            self.commit_roster(RosterOutcome::default());
        }
        removed
    }

    /// User edits are written through immediately rather than waiting for
    /// the persist loop.
    fn commit_roster(&self, outcome: RosterOutcome) {
        if let Some(config) = self.core.roster().take_dirty(Utc::now()) {
            self.core.save_roster(&config);
        }
        self.core.emit_roster(outcome);
    }

    // ─── Loot and aggregates ────────────────────────────────────────────────

    pub fn loot(&self) -> Vec<LootRecord> {
        self.core.ledger().records()
    }

    pub fn toggle_favorite(&self, character: &str, item: &str) -> Result<LootRecord, TrackerError> {
        let (change, record) = self.core.ledger().toggle_favorite(character, item)?;
        self.commit_ledger(vec![GameSignal::LootChanged {
            change,
            record: record.clone(),
        }]);
        Ok(record)
    }

    pub fn delete_loot(&self, character: &str, item: &str) -> Result<LootRecord, TrackerError> {
        let record = self.core.ledger().delete_by_user(character, item)?;
        self.commit_ledger(vec![GameSignal::LootChanged {
            change: crate::loot::LootChange::Removed,
            record: record.clone(),
        }]);
        Ok(record)
    }

    /// Returns `None` when nothing matched.
    pub fn remove_loot_quantity(
        &self,
        character: &str,
        item: &str,
        quantity: u64,
    ) -> Option<LootRecord> {
        let (change, record) = self.core.ledger().remove_quantity(character, item, quantity)?;
        self.commit_ledger(vec![GameSignal::LootChanged {
            change,
            record: record.clone(),
        }]);
        Some(record)
    }

    fn commit_ledger(&self, signals: Vec<GameSignal>) {
        if let Some(snapshot) = self.core.ledger().take_dirty() {
            self.core.save_ledger(&snapshot);
        }
        self.core.bus.dispatch(signals);
    }

    pub fn sales(&self) -> (AggregateCounter, u64) {
        let sales = self.core.sales();
        (sales.totals().clone(), sales.items_sold())
    }

    pub fn xp(&self) -> Vec<XpTotals> {
        self.core.xp().totals()
    }

    // ─── Resets ─────────────────────────────────────────────────────────────

    pub async fn reset(&self, scope: ResetScope) {
        tracing::info!(?scope, "Resetting session state");
        let mut signals = Vec::new();

        if matches!(scope, ResetScope::Ledger | ResetScope::Full) {
            let changes = self.core.ledger().reset();
            signals.extend(
                changes
                    .into_iter()
                    .map(|(change, record)| GameSignal::LootChanged { change, record }),
            );
            self.core.sales().reset();
            self.core.xp().reset();
        }

        if scope == ResetScope::Full {
            let watches = self.watches.lock().await;
            for (path, watched) in watches.iter() {
                restart_tail(watched.handle.tail(), truncate_log(path));
            }
        }

        self.core.bus.dispatch(signals);
        if matches!(scope, ResetScope::Roster | ResetScope::Full) {
            let outcome = self.core.roster().reset_all();
            self.core.emit_roster(outcome);
        }
        self.core.persist_all();
    }

    // ─── Signals ────────────────────────────────────────────────────────────

    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<GameSignal> {
        self.core.bus.subscribe()
    }

    pub fn add_signal_handler(&self, handler: Box<dyn SignalHandler + Send>) {
        self.core.bus.add_handler(handler);
    }

    // ─── Status ─────────────────────────────────────────────────────────────

    pub async fn stats(&self) -> SessionStats {
        let mut files: Vec<WatchedFileStats> = self
            .watches
            .lock()
            .await
            .iter()
            .map(|(path, watched)| {
                let cursor = watched.handle.tail().cursor();
                WatchedFileStats {
                    path: path.clone(),
                    role: watched.role,
                    byte_offset: cursor.byte_offset,
                    last_known_length: cursor.last_known_length,
                }
            })
            .collect();
        files.sort_by(|a, b| a.path.cmp(&b.path));

        let (server, main_character, roster_size) = {
            let roster = self.core.roster();
            (
                roster.server().map(str::to_string),
                roster.main_character().map(str::to_string),
                roster.characters().len(),
            )
        };
        let (sales, items_sold) = self.sales();
        SessionStats {
            files,
            server,
            main_character,
            roster_size,
            ledger_entries: self.core.ledger().len(),
            sales,
            items_sold,
            xp_total: self.core.xp().session_total(),
            startup_mode: self.startup_mode,
        }
    }

    /// Stop every task and flush state to disk.
    pub async fn shutdown(&self) {
        if let Some(background) = self.background.lock().await.take() {
            background.stop().await;
        }
        let watches: Vec<WatchedLog> = self.watches.lock().await.drain().map(|(_, w)| w).collect();
        for watched in watches {
            watched.handle.stop().await;
        }
        self.core.persist_all();
        tracing::info!("Tracker stopped");
    }
}

/// Restart a watched log after a full reset. A log that could not be
/// truncated still holds old lines, so the reader skips past them instead
/// of reading them again into the cleared state.
fn restart_tail(tail: &LogTail, truncated: Result<(), TailError>) {
    match truncated {
        Ok(()) => tail.request_reset(),
        Err(e) => {
            tracing::warn!(path = %tail.path().display(), error = %e, "Failed to truncate log, skipping its history");
            if let Err(e) = tail.skip_to_end() {
                tracing::warn!(path = %tail.path().display(), error = %e, "Failed to skip log history");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn test_failed_truncate_does_not_reread_history() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("wakfu_chat.log");
        std::fs::write(&path, "Vous avez ramassé 3x Bois de frêne .\n").unwrap();
        let tail = LogTail::new(&path);
        assert_eq!(tail.poll().lines.len(), 1);
        std::fs::write(&path, "Vous avez ramassé 3x Bois de frêne .\nVous avez ramassé 1x Sève .\n").unwrap();

        let locked = io::Error::new(io::ErrorKind::WouldBlock, "locked");
        restart_tail(&tail, Err(TailError::Locked(locked)));

        assert!(tail.poll().is_empty());
        assert_eq!(tail.cursor().byte_offset, std::fs::metadata(&path).unwrap().len());
    }

    #[test]
    fn test_successful_truncate_rereads_from_start() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("wakfu.log");
        std::fs::write(&path, "old\n").unwrap();
        let tail = LogTail::new(&path);
        tail.poll();

        let truncated = truncate_log(&path);
        assert!(truncated.is_ok());
        restart_tail(&tail, truncated);
        std::fs::write(&path, "new\n").unwrap();

        let batch = tail.poll();
        assert!(batch.reset);
        assert_eq!(batch.lines, vec!["new"]);
    }
}
