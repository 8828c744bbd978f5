//! Shared state behind the [`Tracker`](super::Tracker).
//!
//! One lock per collection; each is held only for a single mutation. Signals
//! are collected while locks are held and dispatched after they are released.

use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use wakmeter_types::{LogFileRole, TrackerSettings};

use crate::aggregate::{SaleAggregator, XpAggregator, latest_sale};
use crate::combat_log::{EventKind, parse_line};
use crate::events::{GameSignal, SignalBus};
use crate::loot::{LedgerSnapshot, LootLedger};
use crate::roster::{RosterConfig, RosterOutcome, RosterSettings, RosterState, ServerTransition};
use crate::snapshot::PlayerSnapshot;
use crate::storage::JsonStore;
use crate::tail::{LineSink, TailBatch, last_lines, read_tail_lines};

pub(crate) struct SessionCore {
    pub(crate) settings: TrackerSettings,
    roster: Mutex<RosterState>,
    ledger: Mutex<LootLedger>,
    sales: Mutex<SaleAggregator>,
    xp: Mutex<XpAggregator>,
    roster_store: JsonStore<RosterConfig>,
    ledger_store: JsonStore<LedgerSnapshot>,
    pub(crate) bus: SignalBus,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

/// Accumulates signals for one batch, coalescing roster changes into a
/// single list snapshot emitted before the next unrelated signal.
#[derive(Default)]
struct SignalBuffer {
    signals: Vec<GameSignal>,
    roster_pending: bool,
}

impl SignalBuffer {
    fn push(&mut self, core: &SessionCore, signal: GameSignal) {
        self.flush_roster(core);
        self.signals.push(signal);
    }

    fn roster(&mut self, outcome: &RosterOutcome) {
        self.roster_pending |= outcome.characters_changed;
    }

    fn flush_roster(&mut self, core: &SessionCore) {
        if std::mem::take(&mut self.roster_pending) {
            let characters = core.roster().characters();
            self.signals.push(GameSignal::CharacterListChanged { characters });
        }
    }

    fn finish(mut self, core: &SessionCore) -> Vec<GameSignal> {
        self.flush_roster(core);
        self.signals
    }
}

impl SessionCore {
    pub(crate) fn new(
        settings: TrackerSettings,
        roster_store: JsonStore<RosterConfig>,
        ledger_store: JsonStore<LedgerSnapshot>,
    ) -> Self {
        let roster = RosterState::new(RosterSettings::from(&settings), roster_store.load());
        let ledger = LootLedger::restore(ledger_store.load());
        tracing::info!(
            characters = roster.characters().len(),
            loot = ledger.len(),
            "Restored persisted state"
        );
        Self {
            settings,
            roster: Mutex::new(roster),
            ledger: Mutex::new(ledger),
            sales: Mutex::new(SaleAggregator::new()),
            xp: Mutex::new(XpAggregator::new()),
            roster_store,
            ledger_store,
            bus: SignalBus::new(),
        }
    }

    pub(crate) fn roster(&self) -> MutexGuard<'_, RosterState> {
        lock(&self.roster)
    }

    pub(crate) fn ledger(&self) -> MutexGuard<'_, LootLedger> {
        lock(&self.ledger)
    }

    pub(crate) fn sales(&self) -> MutexGuard<'_, SaleAggregator> {
        lock(&self.sales)
    }

    pub(crate) fn xp(&self) -> MutexGuard<'_, XpAggregator> {
        lock(&self.xp)
    }

    /// Owner of first-person loot lines.
    fn loot_owner(&self) -> String {
        self.roster()
            .main_character()
            .map(str::to_string)
            .unwrap_or_else(|| self.settings.main_character_fallback.clone())
    }

    // ─── Log processing ─────────────────────────────────────────────────────

    fn process_lines(&self, path: &Path, lines: &[String], out: &mut SignalBuffer) {
        let now = Utc::now();
        for line in lines {
            let Some(event) = parse_line(line) else {
                continue;
            };
            self.process_event(path, &event.kind, now, out);
        }
    }

    fn process_event(&self, path: &Path, kind: &EventKind, now: DateTime<Utc>, out: &mut SignalBuffer) {
        match kind {
            EventKind::LootPickup {
                character,
                item,
                quantity,
            } => {
                let owner = character.clone().unwrap_or_else(|| self.loot_owner());
                let (change, record) = self.ledger().add_or_update(&owner, item, *quantity, now);
                out.push(self, GameSignal::LootChanged { change, record });
            }
            EventKind::SaleCompleted {
                item_count,
                total_currency,
            } => {
                let totals = self.sales().record(*item_count, *total_currency, now);
                out.push(
                    self,
                    GameSignal::SaleDetected {
                        item_count: *item_count,
                        total_currency: *total_currency,
                        totals,
                    },
                );
            }
            EventKind::XpGain {
                entity,
                amount,
                remaining_to_next_level,
                is_combat,
            } => {
                let totals = self
                    .xp()
                    .record(entity, *amount, *remaining_to_next_level, *is_combat, now);
                out.push(
                    self,
                    GameSignal::XpGained {
                        entity: entity.clone(),
                        amount: *amount,
                        totals,
                    },
                );
            }
            roster_event => {
                let outcome = self.roster().apply(roster_event, now);
                out.roster(&outcome);
                match outcome.transition {
                    Some(ServerTransition::Unchanged) | None => {}
                    Some(transition) => {
                        if transition == ServerTransition::NewConnection {
                            self.rescan_after_connection(path, now);
                        }
                        let server = match roster_event {
                            EventKind::ServerChange { server_name } => Some(server_name.clone()),
                            _ => None,
                        };
                        out.push(self, GameSignal::ServerChanged { server, transition });
                    }
                }
            }
        }
    }

    /// Rebuild combat and group membership from the lines that follow the
    /// most recent connection line in the file tail.
    ///
    /// Membership events are idempotent, so lines also present in the batch
    /// being processed are harmless to apply twice.
    fn rescan_after_connection(&self, path: &Path, now: DateTime<Utc>) {
        let lines = match read_tail_lines(path, self.settings.replay_tail_bytes) {
            Ok(lines) => lines,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Failed to rescan log after connection");
                return;
            }
        };
        let events: Vec<EventKind> = lines
            .iter()
            .filter_map(|l| parse_line(l))
            .map(|e| e.kind)
            .collect();
        let start = events
            .iter()
            .rposition(|k| matches!(k, EventKind::ServerChange { .. }))
            .map_or(0, |i| i + 1);

        let mut roster = self.roster();
        let mut applied = 0;
        for kind in &events[start..] {
            if is_membership_event(kind) {
                roster.apply(kind, now);
                applied += 1;
            }
        }
        tracing::debug!(path = %path.display(), applied, "Rescanned log tail after connection");
    }

    /// Replay the tail of a game log into the roster only. Loot, sales and
    /// experience in the replayed range were already counted by a previous run.
    pub(crate) fn replay_roster(&self, path: &Path) {
        let lines = match read_tail_lines(path, self.settings.replay_tail_bytes) {
            Ok(lines) => lines,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Failed to replay log tail");
                return;
            }
        };
        let now = Utc::now();
        let mut replayed = 0;
        let mut changed = false;
        {
            let mut roster = self.roster();
            for event in lines.iter().filter_map(|l| parse_line(l)) {
                if event.kind.is_roster_event() {
                    changed |= roster.apply(&event.kind, now).characters_changed;
                    replayed += 1;
                }
            }
        }
        tracing::info!(path = %path.display(), replayed, "Replayed roster events from log tail");

        let mut out = SignalBuffer::default();
        out.roster_pending = changed;
        let server = self.roster().server().map(str::to_string);
        if server.is_some() {
            out.push(
                self,
                GameSignal::ServerChanged {
                    server,
                    transition: ServerTransition::NewConnection,
                },
            );
        }
        self.bus.dispatch(out.finish(self));
    }

    /// Emit the most recent sale found in the last lines of a chat log.
    pub(crate) fn recover_sale(&self, path: &Path) {
        let lines = match last_lines(path, self.settings.sale_recovery_lines) {
            Ok(lines) => lines,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Failed to scan for offline sale");
                return;
            }
        };
        let Some((item_count, total_currency)) = latest_sale(&lines) else {
            return;
        };
        tracing::info!(item_count, total_currency, "Recovered sale made while offline");
        let totals = self.sales().record(item_count, total_currency, Utc::now());
        self.bus.dispatch(vec![GameSignal::SaleDetected {
            item_count,
            total_currency,
            totals,
        }]);
    }

    // ─── Cleanup ────────────────────────────────────────────────────────────

    pub(crate) fn reconcile_snapshot(&self, snapshot: &PlayerSnapshot) {
        let report = self.roster().apply_snapshot(snapshot, Utc::now());
        if report.changed() {
            tracing::debug!(?report, "Reconciled roster against snapshot");
            self.emit_roster(RosterOutcome {
                characters_changed: true,
                ..Default::default()
            });
        }
    }

    pub(crate) fn sweep(&self) {
        let outcome = self.roster().sweep(Utc::now());
        self.emit_roster(outcome);
    }

    pub(crate) fn emit_roster(&self, outcome: RosterOutcome) {
        let mut out = SignalBuffer::default();
        out.roster(&outcome);
        if outcome.main_changed {
            let name = self.roster().main_character().map(str::to_string);
            out.push(self, GameSignal::MainCharacterChanged { name });
        }
        self.bus.dispatch(out.finish(self));
    }

    // ─── Persistence ────────────────────────────────────────────────────────

    /// Write whatever changed since the last flush.
    pub(crate) fn persist(&self) {
        let now = Utc::now();
        if let Some(config) = self.roster().take_dirty(now) {
            self.save_roster(&config);
        }
        if let Some(snapshot) = self.ledger().take_dirty() {
            self.save_ledger(&snapshot);
        }
    }

    /// Write everything regardless of dirty state.
    pub(crate) fn persist_all(&self) {
        let config = {
            let mut roster = self.roster();
            roster.take_dirty(Utc::now());
            roster.config().clone()
        };
        self.save_roster(&config);
        let snapshot = self.ledger().snapshot();
        self.save_ledger(&snapshot);
    }

    pub(crate) fn save_roster(&self, config: &RosterConfig) {
        if let Err(e) = self.roster_store.save(config) {
            tracing::warn!(error = %e, "Failed to persist roster");
        }
    }

    pub(crate) fn save_ledger(&self, snapshot: &LedgerSnapshot) {
        if let Err(e) = self.ledger_store.save(snapshot) {
            tracing::warn!(error = %e, "Failed to persist loot ledger");
        }
    }
}

fn is_membership_event(kind: &EventKind) -> bool {
    matches!(
        kind,
        EventKind::CombatJoin { .. }
            | EventKind::CombatEnd
            | EventKind::GroupJoin { .. }
            | EventKind::GroupLeave { .. }
    )
}

impl SessionCore {
    /// Apply one batch read from a file watched with `role`. A reset only
    /// forgets the state that file's role establishes.
    pub(crate) fn apply_batch(&self, role: LogFileRole, path: &Path, batch: TailBatch) {
        let mut out = SignalBuffer::default();
        if batch.reset {
            let outcome = match role {
                LogFileRole::Game => self.roster().reset_game_state(),
                LogFileRole::Chat => self.roster().reset_group_state(),
            };
            out.roster(&outcome);
            out.push(
                self,
                GameSignal::LogReset {
                    path: path.to_path_buf(),
                },
            );
        }
        self.process_lines(path, &batch.lines, &mut out);
        self.bus.dispatch(out.finish(self));
    }
}

/// Feeds the batches of one watched file into the core with the file's role.
pub(crate) struct RoleSink {
    pub(crate) core: Arc<SessionCore>,
    pub(crate) role: LogFileRole,
}

impl LineSink for RoleSink {
    fn on_batch(&self, path: &Path, batch: TailBatch) {
        self.core.apply_batch(self.role, path, batch);
    }
}
