use chrono::{DateTime, Utc};
use hashbrown::HashMap;
use serde::Serialize;

use super::AggregateCounter;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct XpTotals {
    pub entity: String,
    pub counter: AggregateCounter,
    /// Combat experience for a character, as opposed to a profession.
    pub is_combat: bool,
    /// Latest "next level in" hint seen for this entity.
    pub remaining_to_next_level: Option<u64>,
}

/// Experience per character or profession.
#[derive(Debug, Default)]
pub struct XpAggregator {
    entities: HashMap<String, XpTotals>,
}

impl XpAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(
        &mut self,
        entity: &str,
        amount: u64,
        remaining_to_next_level: Option<u64>,
        is_combat: bool,
        now: DateTime<Utc>,
    ) -> XpTotals {
        let entity = entity.trim();
        let totals = self
            .entities
            .entry(entity.to_lowercase())
            .or_insert_with(|| XpTotals {
                entity: entity.to_string(),
                counter: AggregateCounter::new(entity),
                is_combat,
                remaining_to_next_level: None,
            });
        totals.counter.record(amount, now);
        totals.is_combat = is_combat;
        // Lines without the hint keep the previous one.
        if remaining_to_next_level.is_some() {
            totals.remaining_to_next_level = remaining_to_next_level;
        }
        totals.clone()
    }

    pub fn get(&self, entity: &str) -> Option<&XpTotals> {
        self.entities.get(&entity.trim().to_lowercase())
    }

    /// All entities, combat first, then by name.
    pub fn totals(&self) -> Vec<XpTotals> {
        let mut totals: Vec<_> = self.entities.values().cloned().collect();
        totals.sort_by(|a, b| {
            b.is_combat
                .cmp(&a.is_combat)
                .then_with(|| a.entity.to_lowercase().cmp(&b.entity.to_lowercase()))
        });
        totals
    }

    pub fn session_total(&self) -> u64 {
        self.entities
            .values()
            .fold(0u64, |acc, t| acc.saturating_add(t.counter.cumulative_amount))
    }

    pub fn reset(&mut self) {
        self.entities.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_per_entity_totals_and_hint() {
        let mut xp = XpAggregator::new();
        let now = Utc::now();
        xp.record("Bob", 100, Some(900), true, now);
        xp.record("bob", 50, None, true, now);
        xp.record("Paysan", 20, Some(80), false, now);

        let bob = xp.get("BOB").unwrap();
        assert_eq!(bob.counter.cumulative_amount, 150);
        assert_eq!(bob.counter.event_count, 2);
        assert_eq!(bob.remaining_to_next_level, Some(900));

        let names: Vec<_> = xp.totals().into_iter().map(|t| t.entity).collect();
        assert_eq!(names, vec!["Bob", "Paysan"]);
        assert_eq!(xp.session_total(), 170);

        xp.reset();
        assert!(xp.totals().is_empty());
    }
}
