use chrono::{DateTime, Utc};

use super::AggregateCounter;
use crate::combat_log::{EventKind, parse_line};

pub const SESSION_KEY: &str = "session";

/// Kamas earned from merchant sales this session.
#[derive(Debug, Clone)]
pub struct SaleAggregator {
    currency: AggregateCounter,
    items_sold: u64,
}

impl Default for SaleAggregator {
    fn default() -> Self {
        Self::new()
    }
}

impl SaleAggregator {
    pub fn new() -> Self {
        Self {
            currency: AggregateCounter::new(SESSION_KEY),
            items_sold: 0,
        }
    }

    pub fn record(&mut self, item_count: u64, total_currency: u64, now: DateTime<Utc>) -> AggregateCounter {
        self.items_sold = self.items_sold.saturating_add(item_count);
        self.currency.record(total_currency, now);
        self.currency.clone()
    }

    pub fn totals(&self) -> &AggregateCounter {
        &self.currency
    }

    pub fn items_sold(&self) -> u64 {
        self.items_sold
    }

    pub fn reset(&mut self) {
        *self = Self::new();
    }
}

/// The most recent sale in `lines`, as `(item_count, total_currency)`.
/// Older sales are ignored so a restart does not replay a backlog.
pub fn latest_sale(lines: &[String]) -> Option<(u64, u64)> {
    lines.iter().rev().find_map(|line| match parse_line(line)?.kind {
        EventKind::SaleCompleted {
            item_count,
            total_currency,
        } => Some((item_count, total_currency)),
        _ => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_accumulates() {
        let mut sales = SaleAggregator::new();
        let now = Utc::now();
        sales.record(3, 1_500, now);
        let totals = sales.record(1, 250, now);
        assert_eq!(totals.cumulative_amount, 1_750);
        assert_eq!(totals.event_count, 2);
        assert_eq!(sales.items_sold(), 4);

        sales.reset();
        assert_eq!(sales.totals().cumulative_amount, 0);
    }

    #[test]
    fn test_latest_sale_only() {
        let lines: Vec<String> = [
            "[10:00:00] [Information (jeu)] Vous avez vendu 2 objets pour un total de 1 000 kamas.",
            "[10:05:00] [Information (jeu)] Vous avez ramassé 3x Blé .",
            "[10:10:00] [Information (jeu)] Vous avez vendu 5 objets pour un total de 12 500 kamas.",
            "[10:11:00] [Information (jeu)] Bob a rejoint le groupe.",
        ]
        .into_iter()
        .map(String::from)
        .collect();
        assert_eq!(latest_sale(&lines), Some((5, 12_500)));
        assert_eq!(latest_sale(&lines[1..2]), None);
    }
}
