//! Roster state machine.
//!
//! Consumes combat, group and connection events and keeps the live list of
//! characters plus the persisted [`RosterConfig`]. Each transition reports
//! what changed so the caller can notify after releasing its lock.

use chrono::{DateTime, TimeDelta, Utc};
use hashbrown::HashSet;
use serde::Serialize;
use wakmeter_types::TrackerSettings;

use super::RosterError;
use super::config::RosterConfig;
use super::reconcile::{self, ReconcilePolicy, ReconcileReport};
use super::record::{CharacterRecord, name_key};
use crate::combat_log::EventKind;
use crate::snapshot::PlayerSnapshot;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ServerTransition {
    /// First server after start-up or a disconnect.
    NewConnection,
    /// Switch from one server to another without a disconnect in between.
    Lateral,
    Unchanged,
    Disconnected,
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct RosterOutcome {
    pub characters_changed: bool,
    pub main_changed: bool,
    pub transition: Option<ServerTransition>,
}

impl RosterOutcome {
    fn characters(changed: bool) -> Self {
        Self {
            characters_changed: changed,
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone)]
pub struct RosterSettings {
    pub recent_window: usize,
    pub inactivity_timeout: TimeDelta,
    pub max_group_size: usize,
}

impl From<&TrackerSettings> for RosterSettings {
    fn from(settings: &TrackerSettings) -> Self {
        Self {
            recent_window: settings.recent_window,
            inactivity_timeout: TimeDelta::seconds(settings.inactivity_timeout_secs as i64),
            max_group_size: settings.max_group_size,
        }
    }
}

impl Default for RosterSettings {
    fn default() -> Self {
        Self::from(&TrackerSettings::default())
    }
}

pub struct RosterState {
    settings: RosterSettings,
    records: Vec<CharacterRecord>,
    in_combat: HashSet<String>,
    in_group: HashSet<String>,
    server: Option<String>,
    config: RosterConfig,
    dirty: bool,
    eviction_suspended: bool,
}

impl RosterState {
    pub fn new(settings: RosterSettings, mut config: RosterConfig) -> Self {
        config.ensure_main_visible();
        let mut state = Self {
            settings,
            records: Vec::new(),
            in_combat: HashSet::new(),
            in_group: HashSet::new(),
            server: None,
            config,
            dirty: false,
            eviction_suspended: false,
        };
        state.sync_config_records();
        state
    }

    // --- Accessors ---

    pub fn characters(&self) -> Vec<CharacterRecord> {
        self.records.clone()
    }

    /// Characters the user has not hidden. The main character is always included.
    pub fn visible_characters(&self) -> Vec<CharacterRecord> {
        self.records
            .iter()
            .filter(|r| r.is_main_character || self.config.is_visible(&r.name))
            .cloned()
            .collect()
    }

    pub fn config(&self) -> &RosterConfig {
        &self.config
    }

    pub fn main_character(&self) -> Option<&str> {
        self.config.main_character.as_deref()
    }

    pub fn server(&self) -> Option<&str> {
        self.server.as_deref()
    }

    pub fn is_in_combat(&self, name: &str) -> bool {
        self.in_combat.contains(&name_key(name))
    }

    pub fn eviction_suspended(&self) -> bool {
        self.eviction_suspended
    }

    /// Config to persist if automatic changes touched it since the last call.
    pub fn take_dirty(&mut self, now: DateTime<Utc>) -> Option<RosterConfig> {
        if !std::mem::take(&mut self.dirty) {
            return None;
        }
        self.config.last_update = Some(now);
        Some(self.config.clone())
    }

    pub fn mark_app_run(&mut self, now: DateTime<Utc>) {
        self.config.last_app_run = Some(now);
        self.dirty = true;
    }

    // --- Log events ---

    pub fn apply(&mut self, kind: &EventKind, now: DateTime<Utc>) -> RosterOutcome {
        match kind {
            EventKind::CombatJoin {
                actor_name,
                is_player_controlled: true,
                ..
            } => self.on_combat_join(actor_name, now),
            EventKind::CombatEnd => self.on_combat_end(now),
            EventKind::GroupJoin { name } => self.on_group_join(name),
            EventKind::GroupLeave { name } => self.on_group_leave(name),
            EventKind::ServerChange { server_name } => self.on_server_change(server_name),
            EventKind::Disconnect { .. } => self.on_disconnect(),
            _ => RosterOutcome::default(),
        }
    }

    fn on_combat_join(&mut self, name: &str, now: DateTime<Utc>) -> RosterOutcome {
        let record = self.upsert(name);
        record.is_active = true;
        record.last_seen_in_combat_at = Some(now);
        self.in_combat.insert(name_key(name));
        if self.config.track(name) {
            self.dirty = true;
        }
        self.trim_recent();
        RosterOutcome::characters(true)
    }

    fn on_combat_end(&mut self, now: DateTime<Utc>) -> RosterOutcome {
        self.in_combat.clear();
        for record in &mut self.records {
            if !record.is_in_group && !record.is_main_character {
                record.is_active = false;
            }
        }
        self.evict_stale(now);
        RosterOutcome::characters(true)
    }

    fn on_group_join(&mut self, name: &str) -> RosterOutcome {
        let record = self.upsert(name);
        let changed = !record.is_in_group;
        record.is_in_group = true;
        self.in_group.insert(name_key(name));
        if self.config.track(name) {
            self.dirty = true;
        }
        RosterOutcome::characters(changed)
    }

    fn on_group_leave(&mut self, name: &str) -> RosterOutcome {
        let key = name_key(name);
        self.in_group.remove(&key);
        let Some(idx) = self.records.iter().position(|r| r.key() == key) else {
            return RosterOutcome::default();
        };
        self.records[idx].is_in_group = false;
        let record = &self.records[idx];
        if !self.eviction_suspended
            && !self.in_combat.contains(&key)
            && !record.is_main_character
            && !record.is_manual
        {
            tracing::debug!(name = %record.name, "Left group, evicting");
            self.records.remove(idx);
        }
        RosterOutcome::characters(true)
    }

    fn on_server_change(&mut self, server: &str) -> RosterOutcome {
        let transition = match self.server.as_deref() {
            Some(current) if current == server => ServerTransition::Unchanged,
            None => ServerTransition::NewConnection,
            Some(_) => ServerTransition::Lateral,
        };
        match transition {
            ServerTransition::NewConnection => {
                tracing::info!(server, "New connection");
                self.clear_session_sets();
                self.eviction_suspended = false;
            }
            ServerTransition::Lateral => {
                tracing::info!(from = ?self.server, to = server, "Server switch, eviction suspended");
                self.eviction_suspended = true;
            }
            _ => {}
        }
        self.server = Some(server.to_string());
        RosterOutcome {
            characters_changed: transition == ServerTransition::NewConnection,
            main_changed: false,
            transition: Some(transition),
        }
    }

    fn on_disconnect(&mut self) -> RosterOutcome {
        let previous = self.server.take();
        self.clear_session_sets();
        self.eviction_suspended = false;
        if previous.is_none() {
            return RosterOutcome::characters(true);
        }
        tracing::info!(server = ?previous, "Disconnected");
        RosterOutcome {
            characters_changed: true,
            main_changed: false,
            transition: Some(ServerTransition::Disconnected),
        }
    }

    // --- Cleanup ---

    /// Evict stale characters. Driven by a timer when there is no snapshot feed.
    pub fn sweep(&mut self, now: DateTime<Utc>) -> RosterOutcome {
        RosterOutcome::characters(!self.evict_stale(now).is_empty())
    }

    pub fn apply_snapshot(&mut self, snapshot: &PlayerSnapshot, now: DateTime<Utc>) -> ReconcileReport {
        let policy = ReconcilePolicy {
            inactivity_timeout: self.settings.inactivity_timeout,
            max_group_size: self.settings.max_group_size,
            evict_absent: !self.eviction_suspended,
        };
        let report = reconcile::reconcile(&mut self.records, snapshot, &policy, now);

        for name in &report.added {
            if self.config.track(name) {
                self.dirty = true;
            }
            self.records
                .iter_mut()
                .filter(|r| r.matches(name))
                .for_each(|r| r.is_main_character = self.config.is_main(&r.name));
        }
        for name in &report.removed {
            self.in_combat.remove(&name_key(name));
        }
        self.in_group = self
            .records
            .iter()
            .filter(|r| r.is_in_group)
            .map(CharacterRecord::key)
            .collect();
        report
    }

    fn evict_stale(&mut self, now: DateTime<Utc>) -> Vec<String> {
        if self.eviction_suspended {
            return Vec::new();
        }
        let timeout = self.settings.inactivity_timeout;
        let mut evicted = Vec::new();
        self.records.retain(|r| {
            let evict = !r.is_protected()
                && !self.in_combat.contains(&r.key())
                && r.is_stale(now, timeout);
            if evict {
                evicted.push(r.name.clone());
            }
            !evict
        });
        if !evicted.is_empty() {
            tracing::debug!(?evicted, "Evicted inactive characters");
        }
        evicted
    }

    /// Keep only the `recent_window` most recently seen unprotected characters.
    fn trim_recent(&mut self) {
        let mut recent: Vec<(Option<DateTime<Utc>>, String)> = self
            .records
            .iter()
            .filter(|r| !r.is_protected())
            .map(|r| (r.last_seen_in_combat_at, r.key()))
            .collect();
        if recent.len() <= self.settings.recent_window {
            return;
        }
        recent.sort_by(|a, b| b.0.cmp(&a.0));
        let dropped: HashSet<String> = recent
            .into_iter()
            .skip(self.settings.recent_window)
            .map(|(_, key)| key)
            .collect();
        self.records.retain(|r| !dropped.contains(&r.key()));
    }

    // --- Manual operations ---

    pub fn set_main_character(&mut self, name: &str) -> Result<RosterOutcome, RosterError> {
        let changed = self.config.set_main(name)?;
        self.sync_config_records();
        Ok(RosterOutcome {
            characters_changed: changed,
            main_changed: changed,
            transition: None,
        })
    }

    pub fn add_manual_character(&mut self, name: &str) -> Result<RosterOutcome, RosterError> {
        let added = self.config.add_manual(name)?;
        self.sync_config_records();
        Ok(RosterOutcome::characters(added))
    }

    pub fn remove_character(&mut self, name: &str) -> Result<RosterOutcome, RosterError> {
        let mut removed = self.config.remove_character(name)?;
        let key = name_key(name);
        let before = self.records.len();
        self.records.retain(|r| r.key() != key);
        self.in_combat.remove(&key);
        self.in_group.remove(&key);
        removed |= self.records.len() != before;
        self.sync_config_records();
        Ok(RosterOutcome::characters(removed))
    }

    pub fn set_character_visibility(
        &mut self,
        name: &str,
        visible: bool,
    ) -> Result<RosterOutcome, RosterError> {
        if name.trim().is_empty() {
            return Err(RosterError::EmptyName);
        }
        if !self.config.knows(name) && !self.records.iter().any(|r| r.matches(name)) {
            return Err(RosterError::NotFound(name.trim().to_string()));
        }
        self.config.set_visibility(name, visible)?;
        Ok(RosterOutcome::characters(true))
    }

    pub fn add_my_character(&mut self, name: &str) -> Result<bool, RosterError> {
        self.config.add_my_character(name)
    }

    pub fn remove_my_character(&mut self, name: &str) -> bool {
        self.config.remove_my_character(name)
    }

    // --- Resets ---

    /// Forget what was derived from the logs. Persisted preferences stay.
    pub fn reset_session(&mut self) -> RosterOutcome {
        self.server = None;
        self.eviction_suspended = false;
        self.in_combat.clear();
        self.in_group.clear();
        self.records.clear();
        self.sync_config_records();
        RosterOutcome::characters(true)
    }

    /// Session reset plus forgetting every detected character.
    pub fn reset_all(&mut self) -> RosterOutcome {
        self.config.clear_detected_characters();
        self.dirty = true;
        self.reset_session()
    }

    /// The game log was truncated or replaced: forget the server and fights
    /// it established. Group membership comes from the chat log and stays.
    pub fn reset_game_state(&mut self) -> RosterOutcome {
        self.server = None;
        self.eviction_suspended = false;
        self.in_combat.clear();
        self.records.retain(|r| r.is_protected());
        for record in &mut self.records {
            if !record.is_in_group && !record.is_main_character {
                record.is_active = false;
            }
        }
        RosterOutcome::characters(true)
    }

    /// The chat log was truncated or replaced: forget group membership.
    /// Server and combat state come from the game log and stay.
    pub fn reset_group_state(&mut self) -> RosterOutcome {
        self.in_group.clear();
        let in_combat = &self.in_combat;
        self.records.retain_mut(|r| {
            r.is_in_group = false;
            r.is_protected() || in_combat.contains(&r.key()) || r.last_seen_in_combat_at.is_some()
        });
        RosterOutcome::characters(true)
    }

    // --- Internals ---

    fn upsert(&mut self, name: &str) -> &mut CharacterRecord {
        let name = name.trim();
        let idx = match self.records.iter().position(|r| r.matches(name)) {
            Some(idx) => idx,
            None => {
                let mut record = CharacterRecord::new(name);
                record.is_main_character = self.config.is_main(name);
                record.is_manual = self.config.is_manual(name);
                self.records.push(record);
                self.records.len() - 1
            }
        };
        &mut self.records[idx]
    }

    fn clear_session_sets(&mut self) {
        self.in_combat.clear();
        self.in_group.clear();
        for record in &mut self.records {
            record.is_in_group = false;
            record.is_active = false;
        }
    }

    /// Re-derive main and manual flags from the config and make sure those
    /// characters have a record.
    fn sync_config_records(&mut self) {
        for record in &mut self.records {
            record.is_main_character = self.config.is_main(&record.name);
            record.is_manual = false;
            record.manual_order = None;
        }
        if let Some(main) = self.config.main_character.clone() {
            self.upsert(&main).is_main_character = true;
        }
        let manual = self.config.manual_characters.clone();
        for (order, name) in manual.iter().enumerate() {
            let record = self.upsert(name);
            record.is_manual = true;
            record.manual_order = Some(order as u32);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::combat_log::DisconnectReason;
    use crate::snapshot::SnapshotPlayer;

    fn state() -> RosterState {
        RosterState::new(RosterSettings::default(), RosterConfig::default())
    }

    fn join(name: &str) -> EventKind {
        EventKind::CombatJoin {
            actor_name: name.to_string(),
            is_player_controlled: true,
            fight_id: Some(1),
        }
    }

    fn server(name: &str) -> EventKind {
        EventKind::ServerChange {
            server_name: name.to_string(),
        }
    }

    fn names(state: &RosterState) -> Vec<String> {
        state.characters().into_iter().map(|r| r.name).collect()
    }

    #[test]
    fn test_join_then_end_evicts_after_timeout() {
        let mut roster = state();
        let t0 = Utc::now();

        roster.apply(&join("Bob"), t0);
        assert_eq!(names(&roster), vec!["Bob"]);
        assert!(roster.is_in_combat("bob"));

        // Fight ends quickly: Bob is still within the inactivity window.
        roster.apply(&EventKind::CombatEnd, t0 + TimeDelta::seconds(5));
        assert_eq!(names(&roster), vec!["Bob"]);
        assert!(!roster.characters()[0].is_active);

        let outcome = roster.sweep(t0 + TimeDelta::seconds(31));
        assert!(outcome.characters_changed);
        assert!(names(&roster).is_empty());
    }

    #[test]
    fn test_end_after_timeout_evicts_immediately() {
        let mut roster = state();
        let t0 = Utc::now();
        roster.apply(&join("Bob"), t0);
        roster.apply(&EventKind::CombatEnd, t0 + TimeDelta::seconds(45));
        assert!(names(&roster).is_empty());
        // Still known in the persisted config.
        assert!(roster.config().characters.contains_key("Bob"));
    }

    #[test]
    fn test_ai_actors_ignored() {
        let mut roster = state();
        let outcome = roster.apply(
            &EventKind::CombatJoin {
                actor_name: "Bouftou".to_string(),
                is_player_controlled: false,
                fight_id: None,
            },
            Utc::now(),
        );
        assert_eq!(outcome, RosterOutcome::default());
        assert!(names(&roster).is_empty());
    }

    #[test]
    fn test_recent_window_keeps_most_recent() {
        let mut roster = state();
        roster.set_main_character("Main").unwrap();
        let t0 = Utc::now();
        for i in 0..8 {
            roster.apply(&join(&format!("P{i}")), t0 + TimeDelta::seconds(i));
        }
        let mut kept = names(&roster);
        kept.sort();
        assert_eq!(kept, vec!["Main", "P2", "P3", "P4", "P5", "P6", "P7"]);
    }

    #[test]
    fn test_group_leave_evicts_only_outside_combat() {
        let mut roster = state();
        let now = Utc::now();
        roster.apply(&EventKind::GroupJoin { name: "Ann".into() }, now);
        roster.apply(&EventKind::GroupJoin { name: "Cid".into() }, now);
        roster.apply(&join("Ann"), now);

        roster.apply(&EventKind::GroupLeave { name: "Ann".into() }, now);
        roster.apply(&EventKind::GroupLeave { name: "Cid".into() }, now);
        assert_eq!(names(&roster), vec!["Ann"]);
        assert!(!roster.characters()[0].is_in_group);
    }

    #[test]
    fn test_repeated_server_change_is_one_new_connection() {
        let mut roster = state();
        let now = Utc::now();
        let first = roster.apply(&server("wakfu-rosal"), now);
        let second = roster.apply(&server("wakfu-rosal"), now);
        assert_eq!(first.transition, Some(ServerTransition::NewConnection));
        assert_eq!(second.transition, Some(ServerTransition::Unchanged));
        assert!(!second.characters_changed);
    }

    #[test]
    fn test_lateral_switch_suspends_eviction_until_disconnect() {
        let mut roster = state();
        let t0 = Utc::now();
        roster.apply(&server("wakfu-rosal"), t0);
        roster.apply(&join("Bob"), t0);
        let lateral = roster.apply(&server("wakfu-pandora"), t0);
        assert_eq!(lateral.transition, Some(ServerTransition::Lateral));

        roster.apply(&EventKind::CombatEnd, t0 + TimeDelta::minutes(5));
        assert_eq!(names(&roster), vec!["Bob"]);

        let outcome = roster.apply(
            &EventKind::Disconnect {
                reason: DisconnectReason::Dispatch,
            },
            t0,
        );
        assert_eq!(outcome.transition, Some(ServerTransition::Disconnected));
        assert_eq!(roster.server(), None);
        assert!(!roster.eviction_suspended());
        // Records survive a disconnect.
        assert_eq!(names(&roster), vec!["Bob"]);

        roster.sweep(t0 + TimeDelta::minutes(5));
        assert!(names(&roster).is_empty());
    }

    #[test]
    fn test_main_character_never_evicted_or_removed() {
        let mut roster = state();
        let t0 = Utc::now();
        roster.set_main_character("Main").unwrap();
        roster.apply(&join("Main"), t0);
        roster.apply(&EventKind::CombatEnd, t0 + TimeDelta::hours(1));
        roster.sweep(t0 + TimeDelta::hours(2));
        roster.reset_session();

        assert_eq!(names(&roster), vec!["Main"]);
        assert_eq!(
            roster.remove_character("main"),
            Err(RosterError::MainCharacterProtected)
        );
        assert_eq!(
            roster.set_character_visibility("Main", false),
            Err(RosterError::MainCharacterProtected)
        );
        assert_eq!(roster.visible_characters().len(), 1);
        assert_eq!(
            roster.set_character_visibility("Nobody", false),
            Err(RosterError::NotFound("Nobody".to_string()))
        );
    }

    #[test]
    fn test_main_switch_is_exclusive() {
        let mut roster = state();
        roster.set_main_character("Ana").unwrap();
        let outcome = roster.set_main_character("Bea").unwrap();
        assert!(outcome.main_changed);
        let mains: Vec<_> = roster
            .characters()
            .into_iter()
            .filter(|r| r.is_main_character)
            .map(|r| r.name)
            .collect();
        assert_eq!(mains, vec!["Bea"]);
        assert!(!roster.set_main_character("bea").unwrap().main_changed);
    }

    #[test]
    fn test_manual_characters_survive_eviction() {
        let mut roster = state();
        let t0 = Utc::now();
        roster.add_manual_character("Hand").unwrap();
        roster.apply(&join("Hand"), t0);
        roster.apply(&EventKind::CombatEnd, t0 + TimeDelta::hours(1));
        assert_eq!(names(&roster), vec!["Hand"]);
        assert_eq!(roster.characters()[0].manual_order, Some(0));

        roster.remove_character("Hand").unwrap();
        assert!(names(&roster).is_empty());
    }

    #[test]
    fn test_snapshot_reconciliation_tracks_group() {
        let mut roster = state();
        let now = Utc::now();
        let snapshot = PlayerSnapshot {
            players: vec![SnapshotPlayer {
                name: "Dee".into(),
                is_in_group: true,
                ..Default::default()
            }],
            ..Default::default()
        };
        let report = roster.apply_snapshot(&snapshot, now);
        assert_eq!(report.added, vec!["Dee"]);
        assert!(roster.take_dirty(now).is_some());
        assert!(roster.take_dirty(now).is_none());

        roster.apply(&EventKind::GroupLeave { name: "Dee".into() }, now);
        assert!(names(&roster).is_empty());
    }

    #[test]
    fn test_reset_all_forgets_detected() {
        let mut roster = state();
        roster.set_main_character("Main").unwrap();
        roster.apply(&join("Bob"), Utc::now());
        roster.reset_all();
        assert_eq!(names(&roster), vec!["Main"]);
        assert!(!roster.config().characters.contains_key("Bob"));
    }

    #[test]
    fn test_chat_reset_keeps_server_and_fights() {
        let mut roster = state();
        let now = Utc::now();
        roster.apply(&server("wakfu-rosal"), now);
        roster.apply(&join("Bob"), now);
        roster.apply(&EventKind::GroupJoin { name: "Alice".to_string() }, now);

        roster.reset_group_state();
        assert_eq!(roster.server(), Some("wakfu-rosal"));
        assert!(roster.is_in_combat("Bob"));
        assert_eq!(names(&roster), vec!["Bob"]);

        let outcome = roster.apply(&server("wakfu-pandora"), now);
        assert_eq!(outcome.transition, Some(ServerTransition::Lateral));
    }

    #[test]
    fn test_game_reset_keeps_group() {
        let mut roster = state();
        let now = Utc::now();
        roster.apply(&server("wakfu-rosal"), now);
        roster.apply(&join("Bob"), now);
        roster.apply(&EventKind::GroupJoin { name: "Alice".to_string() }, now);

        roster.reset_game_state();
        assert_eq!(roster.server(), None);
        assert!(!roster.is_in_combat("Bob"));
        assert_eq!(names(&roster), vec!["Alice"]);
        assert!(roster.characters()[0].is_in_group);

        let outcome = roster.apply(&server("wakfu-rosal"), now);
        assert_eq!(outcome.transition, Some(ServerTransition::NewConnection));
    }
}
