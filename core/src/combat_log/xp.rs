use std::sync::LazyLock;

use phf::phf_set;
use regex::Regex;

use super::event::EventKind;
use super::numbers::parse_grouped_u64;

// Bob : +1 234 points d'XP. Prochain niveau dans : 5 678.
// Bûcheron : +120 points d'XP.
static XP_GAIN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)^(?P<entity>[^:+]+?)\s*:\s*\+\s*(?P<amount>\d[\d\s,]*?)\s*(?:points? d'(?:XP|expérience)|XP points?|XP)\s*\.?(?:\s*(?:\(|-)?\s*(?:Prochain niveau dans|Next level in)\s*:?\s*(?P<remaining>\d[\d\s,]*?)\s*\)?\s*\.?)?\s*$",
    )
    .expect("xp gain pattern")
});

/// Profession names (French and English). XP lines attributed to one of
/// these are crafting/gathering experience, everything else is combat.
static PROFESSIONS: phf::Set<&'static str> = phf_set! {
    "bûcheron", "paysan", "mineur", "pêcheur", "herboriste", "trappeur",
    "armurier", "bijoutier", "boulanger", "cuisinier", "ébéniste",
    "maître d'armes", "maroquinier", "tailleur",
    "lumberjack", "farmer", "miner", "fisherman", "herbalist", "trapper",
    "armorer", "jeweler", "baker", "chef", "handyman", "weapons master",
    "leather dealer", "tailor",
};

pub fn is_profession(entity: &str) -> bool {
    PROFESSIONS.contains(entity.trim().to_lowercase().as_str())
}

pub(super) fn extract_xp_gain(line: &str) -> Option<EventKind> {
    let caps = XP_GAIN.captures(line)?;
    let entity = caps.name("entity")?.as_str().trim();
    let amount = parse_grouped_u64(caps.name("amount")?.as_str())?;
    if entity.is_empty() || amount == 0 {
        return None;
    }
    let remaining_to_next_level = match caps.name("remaining") {
        Some(m) => Some(parse_grouped_u64(m.as_str())?),
        None => None,
    };
    Some(EventKind::XpGain {
        entity: entity.to_string(),
        amount,
        remaining_to_next_level,
        is_combat: !is_profession(entity),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_combat_xp_with_remaining() {
        assert_eq!(
            extract_xp_gain("Bob : +1 234 points d'XP. Prochain niveau dans : 5 678."),
            Some(EventKind::XpGain {
                entity: "Bob".to_string(),
                amount: 1234,
                remaining_to_next_level: Some(5678),
                is_combat: true,
            })
        );
    }

    #[test]
    fn test_profession_xp_without_remaining() {
        assert_eq!(
            extract_xp_gain("Bûcheron : +120 points d'XP."),
            Some(EventKind::XpGain {
                entity: "Bûcheron".to_string(),
                amount: 120,
                remaining_to_next_level: None,
                is_combat: false,
            })
        );
    }

    #[test]
    fn test_english_wording() {
        let Some(EventKind::XpGain { amount, remaining_to_next_level, .. }) =
            extract_xp_gain("Alice: +2,500 XP points. Next level in: 10,000")
        else {
            panic!("expected xp gain");
        };
        assert_eq!(amount, 2500);
        assert_eq!(remaining_to_next_level, Some(10_000));
    }

    #[test]
    fn test_not_xp() {
        assert_eq!(extract_xp_gain("Bob : salut tout le monde"), None);
        assert_eq!(extract_xp_gain("Bob : +0 points d'XP."), None);
    }
}
