//! Cumulative sale and experience counters.

mod sale;
mod xp;

pub use sale::{SaleAggregator, latest_sale};
pub use xp::{XpAggregator, XpTotals};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Running total for one entity or for the whole session. Only grows until
/// an explicit reset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregateCounter {
    pub key: String,
    pub cumulative_amount: u64,
    pub event_count: u64,
    pub last_updated_at: Option<DateTime<Utc>>,
}

impl AggregateCounter {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            cumulative_amount: 0,
            event_count: 0,
            last_updated_at: None,
        }
    }

    pub fn record(&mut self, amount: u64, now: DateTime<Utc>) {
        self.cumulative_amount = self.cumulative_amount.saturating_add(amount);
        self.event_count += 1;
        self.last_updated_at = Some(now);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counter_is_monotonic() {
        let mut counter = AggregateCounter::new("session");
        let now = Utc::now();
        let mut previous = 0;
        for amount in [5, 0, 12, u64::MAX] {
            counter.record(amount, now);
            assert!(counter.cumulative_amount >= previous);
            previous = counter.cumulative_amount;
        }
        assert_eq!(counter.event_count, 4);
        assert_eq!(counter.cumulative_amount, u64::MAX);
    }
}
