use std::sync::LazyLock;

use regex::Regex;

use super::event::EventKind;
use super::numbers::parse_grouped_u64;

/// Ordered alternatives. `qty` is optional: lines without a count mean one item.
static PICKUP_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        // Vous avez ramassé 3x Bois de frêne .
        r"^(?:Vous avez ramassé|Vous avez obtenu|You picked up|You have picked up|You obtained)\s+(?P<qty>\d[\d\s,]*?)\s*x\s+(?P<item>\S.*?)\s*\.?$",
        // Vous avez ramassé 3 Bois de frêne.
        r"^(?:Vous avez ramassé|Vous avez obtenu|You picked up|You have picked up|You obtained)\s+(?P<qty>\d[\d\s,]*?)\s+(?P<item>[^\d\s].*?)\s*\.?$",
        // Vous avez ramassé Bois de frêne.
        r"^(?:Vous avez ramassé|Vous avez obtenu|You picked up|You have picked up|You obtained)\s+(?:un |une |an |a )?(?P<item>[^\d\s].*?)\s*\.?$",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("loot pickup pattern"))
    .collect()
});

pub(super) fn extract_loot_pickup(line: &str) -> Option<EventKind> {
    PICKUP_PATTERNS.iter().find_map(|pattern| {
        let caps = pattern.captures(line)?;
        let quantity = match caps.name("qty") {
            Some(m) => parse_grouped_u64(m.as_str())?,
            None => 1,
        };
        let item = caps.name("item")?.as_str().trim();
        if item.is_empty() || quantity == 0 {
            return None;
        }
        Some(EventKind::LootPickup {
            character: None,
            item: item.to_string(),
            quantity,
        })
    })
}
