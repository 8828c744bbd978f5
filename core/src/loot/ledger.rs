use chrono::{DateTime, Utc};
use hashbrown::hash_map::Entry;
use hashbrown::{HashMap, HashSet};
use serde::{Deserialize, Serialize};

use super::LootError;

/// Case-insensitive identity of a ledger entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LootKey {
    pub character: String,
    pub item: String,
}

impl LootKey {
    pub fn new(character: &str, item: &str) -> Self {
        Self {
            character: character.trim().to_lowercase(),
            item: item.trim().to_lowercase(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LootRecord {
    pub character_name: String,
    pub item_name: String,
    pub quantity: u64,
    pub is_favorite: bool,
    pub last_obtained_at: Option<DateTime<Utc>>,
}

impl LootRecord {
    pub fn key(&self) -> LootKey {
        LootKey::new(&self.character_name, &self.item_name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum LootChange {
    Added,
    Updated,
    Removed,
}

/// Persisted form of the ledger (`loot.json`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LedgerSnapshot {
    pub records: Vec<LootRecord>,
    pub favorites: Vec<LootKey>,
    pub suppressed: Vec<LootKey>,
}

/// The loot collection for one running session.
///
/// Quantities never go below zero. A record at zero is dropped unless it is a
/// favorite. Favorites are tracked apart from the records so they outlive a
/// reset and carry over to a record created later for the same key.
#[derive(Debug, Default)]
pub struct LootLedger {
    records: HashMap<LootKey, LootRecord>,
    favorites: HashSet<LootKey>,
    /// Keys deleted by the user, lifted by the next pickup.
    suppressed: HashSet<LootKey>,
    dirty: bool,
}

impl LootLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn restore(snapshot: LedgerSnapshot) -> Self {
        let favorites: HashSet<LootKey> = snapshot.favorites.into_iter().collect();
        let suppressed: HashSet<LootKey> = snapshot.suppressed.into_iter().collect();
        let records = snapshot
            .records
            .into_iter()
            .map(|mut r| {
                r.is_favorite = favorites.contains(&r.key());
                (r.key(), r)
            })
            .filter(|(key, _)| !suppressed.contains(key))
            .collect();
        Self {
            records,
            favorites,
            suppressed,
            dirty: false,
        }
    }

    pub fn snapshot(&self) -> LedgerSnapshot {
        let mut favorites: Vec<_> = self.favorites.iter().cloned().collect();
        favorites.sort();
        let mut suppressed: Vec<_> = self.suppressed.iter().cloned().collect();
        suppressed.sort();
        LedgerSnapshot {
            records: self.records(),
            favorites,
            suppressed,
        }
    }

    /// Snapshot to persist if the ledger changed since the last call.
    pub fn take_dirty(&mut self) -> Option<LedgerSnapshot> {
        std::mem::take(&mut self.dirty).then(|| self.snapshot())
    }

    // --- Queries ---

    /// All records, ordered by character then item.
    pub fn records(&self) -> Vec<LootRecord> {
        let mut records: Vec<_> = self.records.values().cloned().collect();
        records.sort_by_key(LootRecord::key);
        records
    }

    pub fn get(&self, character: &str, item: &str) -> Option<&LootRecord> {
        self.records.get(&LootKey::new(character, item))
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn is_suppressed(&self, character: &str, item: &str) -> bool {
        self.suppressed.contains(&LootKey::new(character, item))
    }

    pub fn is_favorite(&self, character: &str, item: &str) -> bool {
        self.favorites.contains(&LootKey::new(character, item))
    }

    // --- Mutations ---

    /// Record a pickup. A pickup of a user-deleted key is a redrop and lifts
    /// the suppression.
    pub fn add_or_update(
        &mut self,
        character: &str,
        item: &str,
        quantity: u64,
        now: DateTime<Utc>,
    ) -> (LootChange, LootRecord) {
        let key = LootKey::new(character, item);
        if self.suppressed.remove(&key) {
            tracing::debug!(character, item, "Redrop lifts deletion");
        }
        let is_favorite = self.favorites.contains(&key);
        self.dirty = true;

        match self.records.entry(key) {
            Entry::Occupied(mut entry) => {
                let record = entry.get_mut();
                record.quantity = record.quantity.saturating_add(quantity);
                record.last_obtained_at = Some(now);
                (LootChange::Updated, record.clone())
            }
            Entry::Vacant(entry) => {
                let record = entry.insert(LootRecord {
                    character_name: character.trim().to_string(),
                    item_name: item.trim().to_string(),
                    quantity,
                    is_favorite,
                    last_obtained_at: Some(now),
                });
                (LootChange::Added, record.clone())
            }
        }
    }

    /// Decrement a record. Returns `None` for an unknown key.
    pub fn remove_quantity(
        &mut self,
        character: &str,
        item: &str,
        quantity: u64,
    ) -> Option<(LootChange, LootRecord)> {
        let key = LootKey::new(character, item);
        let record = self.records.get_mut(&key)?;
        record.quantity = record.quantity.saturating_sub(quantity);
        self.dirty = true;

        if record.quantity == 0 && !record.is_favorite {
            let record = self.records.remove(&key)?;
            return Some((LootChange::Removed, record));
        }
        Some((LootChange::Updated, record.clone()))
    }

    /// Remove a record at the user's request and suppress the key until it is
    /// dropped again. Favorites are refused.
    pub fn delete_by_user(&mut self, character: &str, item: &str) -> Result<LootRecord, LootError> {
        let key = LootKey::new(character, item);
        let Some(record) = self.records.get(&key) else {
            return Err(LootError::NotFound {
                character: character.to_string(),
                item: item.to_string(),
            });
        };
        if record.is_favorite {
            return Err(LootError::FavoriteProtected {
                character: record.character_name.clone(),
                item: record.item_name.clone(),
            });
        }
        let record = self.records.remove(&key).ok_or_else(|| LootError::NotFound {
            character: character.to_string(),
            item: item.to_string(),
        })?;
        self.suppressed.insert(key);
        self.dirty = true;
        Ok(record)
    }

    /// Flip the favorite flag. Unfavoriting an empty record removes it.
    pub fn toggle_favorite(
        &mut self,
        character: &str,
        item: &str,
    ) -> Result<(LootChange, LootRecord), LootError> {
        let key = LootKey::new(character, item);
        let Some(record) = self.records.get_mut(&key) else {
            return Err(LootError::NotFound {
                character: character.to_string(),
                item: item.to_string(),
            });
        };
        record.is_favorite = !record.is_favorite;
        self.dirty = true;

        if record.is_favorite {
            let record = record.clone();
            self.favorites.insert(key);
            return Ok((LootChange::Updated, record));
        }
        let empty = record.quantity == 0;
        let record = record.clone();
        self.favorites.remove(&key);
        if empty {
            self.records.remove(&key);
            return Ok((LootChange::Removed, record));
        }
        Ok((LootChange::Updated, record))
    }

    /// Clear quantities and suppression. Favorite records stay at zero.
    pub fn reset(&mut self) -> Vec<(LootChange, LootRecord)> {
        let mut changes = Vec::new();
        self.records.retain(|_, record| {
            if record.is_favorite {
                record.quantity = 0;
                changes.push((LootChange::Updated, record.clone()));
                true
            } else {
                changes.push((LootChange::Removed, record.clone()));
                false
            }
        });
        self.suppressed.clear();
        self.dirty = true;
        changes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn now() -> DateTime<Utc> {
        Utc::now()
    }

    #[test]
    fn test_pickups_accumulate_case_insensitively() {
        let mut ledger = LootLedger::new();
        let (change, _) = ledger.add_or_update("Main", "Bois de frêne", 3, now());
        assert_eq!(change, LootChange::Added);
        let (change, record) = ledger.add_or_update("main", "bois de FRÊNE", 2, now());
        assert_eq!(change, LootChange::Updated);
        assert_eq!(record.quantity, 5);
        assert_eq!(record.item_name, "Bois de frêne");
        assert_eq!(ledger.len(), 1);
    }

    #[test]
    fn test_conservation_floors_at_zero() {
        let mut ledger = LootLedger::new();
        let ops: [(bool, u64); 6] = [(true, 4), (false, 1), (true, 2), (false, 3), (true, 5), (false, 2)];
        let mut expected: i64 = 0;
        for (pickup, qty) in ops {
            if pickup {
                ledger.add_or_update("C", "Ore", qty, now());
                expected += qty as i64;
            } else {
                ledger.remove_quantity("C", "Ore", qty);
                expected = (expected - qty as i64).max(0);
            }
            let actual = ledger.get("C", "Ore").map_or(0, |r| r.quantity as i64);
            assert_eq!(actual, expected);
        }

        let (change, _) = ledger.remove_quantity("C", "Ore", 100).unwrap();
        assert_eq!(change, LootChange::Removed);
        assert!(ledger.get("C", "Ore").is_none());
        assert!(ledger.remove_quantity("C", "Ore", 1).is_none());
    }

    #[test]
    fn test_favorite_kept_at_zero() {
        let mut ledger = LootLedger::new();
        ledger.add_or_update("C", "Gem", 2, now());
        ledger.toggle_favorite("C", "Gem").unwrap();

        let (change, record) = ledger.remove_quantity("C", "Gem", 5).unwrap();
        assert_eq!(change, LootChange::Updated);
        assert_eq!(record.quantity, 0);
        assert!(record.is_favorite);

        assert_eq!(
            ledger.delete_by_user("C", "Gem"),
            Err(LootError::FavoriteProtected {
                character: "C".into(),
                item: "Gem".into()
            })
        );

        let (change, _) = ledger.toggle_favorite("C", "Gem").unwrap();
        assert_eq!(change, LootChange::Removed);
        assert!(ledger.is_empty());
    }

    #[test]
    fn test_redrop_after_delete() {
        let mut ledger = LootLedger::new();
        ledger.add_or_update("C", "Wheat", 10, now());
        let deleted = ledger.delete_by_user("c", "wheat").unwrap();
        assert_eq!(deleted.quantity, 10);
        assert!(ledger.is_suppressed("C", "Wheat"));
        assert!(ledger.get("C", "Wheat").is_none());

        let (change, record) = ledger.add_or_update("C", "Wheat", 2, now());
        assert_eq!(change, LootChange::Added);
        assert_eq!(record.quantity, 2);
        assert!(!ledger.is_suppressed("C", "Wheat"));
    }

    #[test]
    fn test_favorite_inherited_by_new_record() {
        let mut ledger = LootLedger::new();
        ledger.add_or_update("C", "Gem", 1, now());
        ledger.toggle_favorite("C", "Gem").unwrap();
        ledger.reset();
        assert_eq!(ledger.get("C", "Gem").unwrap().quantity, 0);

        let (_, record) = ledger.add_or_update("C", "Gem", 4, now());
        assert!(record.is_favorite);
        assert_eq!(record.quantity, 4);
    }

    #[test]
    fn test_reset_clears_suppression_keeps_favorites() {
        let mut ledger = LootLedger::new();
        ledger.add_or_update("C", "A", 1, now());
        ledger.add_or_update("C", "B", 1, now());
        ledger.toggle_favorite("C", "B").unwrap();
        ledger.delete_by_user("C", "A").unwrap();

        let changes = ledger.reset();
        assert_eq!(changes.len(), 1);
        assert!(!ledger.is_suppressed("C", "A"));
        assert!(ledger.is_favorite("C", "B"));
    }

    #[test]
    fn test_toggle_unknown_is_not_found() {
        let mut ledger = LootLedger::new();
        assert!(matches!(
            ledger.toggle_favorite("C", "Nope"),
            Err(LootError::NotFound { .. })
        ));
    }

    #[test]
    fn test_snapshot_restore() {
        let mut ledger = LootLedger::new();
        ledger.add_or_update("C", "Keep", 3, now());
        ledger.add_or_update("C", "Fav", 1, now());
        ledger.toggle_favorite("C", "Fav").unwrap();
        ledger.add_or_update("C", "Gone", 1, now());
        ledger.delete_by_user("C", "Gone").unwrap();

        let mut snapshot = ledger.take_dirty().unwrap();
        assert!(ledger.take_dirty().is_none());

        // A stale copy of the deleted record must not come back.
        snapshot.records.push(LootRecord {
            character_name: "C".into(),
            item_name: "Gone".into(),
            quantity: 1,
            is_favorite: false,
            last_obtained_at: None,
        });
        let restored = LootLedger::restore(snapshot);
        assert_eq!(restored.len(), 2);
        assert!(restored.get("C", "Fav").unwrap().is_favorite);
        assert!(restored.is_suppressed("C", "Gone"));
    }
}
