//! Cross-check of the live roster against the external snapshot feed.

use chrono::{DateTime, TimeDelta, Utc};
use hashbrown::HashMap;

use super::record::{CharacterRecord, name_key};
use crate::snapshot::{PlayerSnapshot, SnapshotPlayer};

#[derive(Debug, Default, Clone, PartialEq)]
pub struct ReconcileReport {
    pub updated: usize,
    pub added: Vec<String>,
    pub removed: Vec<String>,
    pub demoted: Vec<String>,
    pub reordered: usize,
}

impl ReconcileReport {
    pub fn changed(&self) -> bool {
        self.updated > 0
            || !self.added.is_empty()
            || !self.removed.is_empty()
            || !self.demoted.is_empty()
            || self.reordered > 0
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ReconcilePolicy {
    pub inactivity_timeout: TimeDelta,
    pub max_group_size: usize,
    /// Off after a lateral server switch, until something resets the roster.
    pub evict_absent: bool,
}

/// Bring `records` in line with `snapshot`.
///
/// Untracked players the feed reports as grouped or active are added. Tracked
/// records absent from the feed are removed once stale, unless protected.
/// The main-character flag is never taken from the feed.
pub fn reconcile(
    records: &mut Vec<CharacterRecord>,
    snapshot: &PlayerSnapshot,
    policy: &ReconcilePolicy,
    now: DateTime<Utc>,
) -> ReconcileReport {
    let mut report = ReconcileReport::default();
    let mut by_name: HashMap<String, &SnapshotPlayer> = snapshot
        .players
        .iter()
        .filter(|p| !p.name.trim().is_empty())
        .map(|p| (name_key(&p.name), p))
        .collect();

    let mut absent = Vec::new();
    for record in records.iter_mut() {
        match by_name.remove(&record.key()) {
            Some(player) => {
                if apply_player(record, player) {
                    report.updated += 1;
                }
            }
            None => absent.push(record.key()),
        }
    }

    for player in by_name.into_values() {
        if player.is_in_group || player.is_active {
            let mut record = CharacterRecord::new(player.name.trim());
            apply_player(&mut record, player);
            report.added.push(record.name.clone());
            records.push(record);
        }
    }

    records.retain(|r| {
        let evict = policy.evict_absent
            && absent.contains(&r.key())
            && !r.is_protected()
            && r.is_stale(now, policy.inactivity_timeout);
        if evict {
            report.removed.push(r.name.clone());
        }
        !evict
    });

    report.demoted = enforce_group_limit(records, policy.max_group_size);
    records.retain(|r| {
        let evict = report.demoted.contains(&r.name) && !r.is_active && !r.is_protected();
        if evict {
            report.removed.push(r.name.clone());
        }
        !evict
    });

    report.reordered = apply_turn_order(records);
    report
}

fn apply_player(record: &mut CharacterRecord, player: &SnapshotPlayer) -> bool {
    let before = record.clone();
    record.is_active = player.is_active;
    record.is_in_group = player.is_in_group;
    record.turn_order = player.turn_order;
    if let Some(seen) = player.last_seen_in_combat {
        if record.last_seen_in_combat_at.is_none_or(|current| seen > current) {
            record.last_seen_in_combat_at = Some(seen);
        }
    }
    *record != before
}

/// Demote the least recently seen group members until at most `max` remain.
/// The main character is exempt and counts toward the limit.
pub fn enforce_group_limit(records: &mut [CharacterRecord], max: usize) -> Vec<String> {
    let max = max.max(1);
    let main_in_group = records
        .iter()
        .filter(|r| r.is_in_group && r.is_main_character)
        .count();
    let allowed = max.saturating_sub(main_in_group);

    let mut members: Vec<usize> = records
        .iter()
        .enumerate()
        .filter(|(_, r)| r.is_in_group && !r.is_main_character)
        .map(|(i, _)| i)
        .collect();
    if members.len() <= allowed {
        return Vec::new();
    }

    // Most recent first; never-seen members sort last.
    members.sort_by(|&a, &b| {
        records[b]
            .last_seen_in_combat_at
            .cmp(&records[a].last_seen_in_combat_at)
    });
    members[allowed..]
        .iter()
        .map(|&i| {
            records[i].is_in_group = false;
            tracing::debug!(name = %records[i].name, "Demoted from group, over size limit");
            records[i].name.clone()
        })
        .collect()
}

/// Reorder active members with a turn counter so they follow
/// `(turn_order, manual_order)`. Only slots already holding such members are
/// rewritten, and only when their occupant changes. Returns the number moved.
pub fn apply_turn_order(records: &mut [CharacterRecord]) -> usize {
    let slots: Vec<usize> = records
        .iter()
        .enumerate()
        .filter(|(_, r)| r.is_active && r.turn_order.is_some())
        .map(|(i, _)| i)
        .collect();
    let mut ordered: Vec<CharacterRecord> = slots.iter().map(|&i| records[i].clone()).collect();
    ordered.sort_by_key(|r| {
        (
            r.turn_order.unwrap_or(u32::MAX),
            r.manual_order.unwrap_or(u32::MAX),
        )
    });

    let mut moved = 0;
    for (slot, record) in slots.into_iter().zip(ordered) {
        if records[slot].name != record.name {
            records[slot] = record;
            moved += 1;
        }
    }
    moved
}
