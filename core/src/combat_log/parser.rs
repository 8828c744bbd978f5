use super::connection::{extract_disconnect, extract_server_change};
use super::event::{DomainEvent, EventKind};
use super::fight::{extract_combat_end, extract_combat_join};
use super::group::{extract_group_join, extract_group_leave};
use super::loot::extract_loot_pickup;
use super::normalize::normalize_line;
use super::sale::extract_sale;
use super::xp::extract_xp_gain;

/// One row of the extractor table: a label for diagnostics and the matcher.
pub struct Extractor {
    pub name: &'static str,
    pub extract: fn(&str) -> Option<EventKind>,
}

/// Extractors in priority order. The first match wins, so the cheap and
/// highly specific patterns (fight markers, connection lines) come first.
pub static EXTRACTORS: &[Extractor] = &[
    Extractor { name: "combat_join", extract: extract_combat_join },
    Extractor { name: "combat_end", extract: extract_combat_end },
    Extractor { name: "server_change", extract: extract_server_change },
    Extractor { name: "disconnect", extract: extract_disconnect },
    Extractor { name: "loot_pickup", extract: extract_loot_pickup },
    Extractor { name: "sale", extract: extract_sale },
    Extractor { name: "xp_gain", extract: extract_xp_gain },
    Extractor { name: "group_join", extract: extract_group_join },
    Extractor { name: "group_leave", extract: extract_group_leave },
];

/// Run the extractor table over a line that has already been normalized.
pub fn parse_normalized(line: &str) -> Option<DomainEvent> {
    if line.is_empty() {
        return None;
    }
    EXTRACTORS.iter().find_map(|extractor| {
        let kind = (extractor.extract)(line)?;
        tracing::trace!(extractor = extractor.name, line, "matched");
        Some(DomainEvent {
            kind,
            source_line: line.to_string(),
        })
    })
}

/// Normalize a raw log line and extract its event, if any.
pub fn parse_line(raw: &str) -> Option<DomainEvent> {
    parse_normalized(normalize_line(raw))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::combat_log::DisconnectReason;

    #[test]
    fn test_player_join_line() {
        let event = parse_line(
            "INFO 12:01:02,345 [AWT-EventQueue-0] (aDa:1018) - [_FL_] fightId=12 Bob breed : 8 [5] isControlledByAI=false obstacleId : -1 join the fight at {Point3 : (1, 2, 3)}",
        )
        .expect("join line should parse");
        assert_eq!(
            event.kind,
            EventKind::CombatJoin {
                actor_name: "Bob".to_string(),
                is_player_controlled: true,
                fight_id: Some(12),
            }
        );
        assert!(event.source_line.starts_with("[_FL_]"));
    }

    #[test]
    fn test_fight_end_line() {
        assert_eq!(
            parse_line("[FIGHT] End fight").map(|e| e.kind),
            Some(EventKind::CombatEnd)
        );
    }

    #[test]
    fn test_loot_line_with_chat_prefix() {
        assert_eq!(
            parse_line("[12:00:01] [Information (jeu)] Vous avez ramassé 3x Bois de frêne .")
                .map(|e| e.kind),
            Some(EventKind::LootPickup {
                character: None,
                item: "Bois de frêne".to_string(),
                quantity: 3,
            })
        );
    }

    #[test]
    fn test_server_and_dispatcher() {
        assert_eq!(
            parse_line("Connected to wakfu-rosal.ankama-games.com:5556").map(|e| e.kind),
            Some(EventKind::ServerChange {
                server_name: "wakfu-rosal".to_string()
            })
        );
        assert_eq!(parse_line("Connected to dispatch.ankama-games.com:5555"), None);
    }

    #[test]
    fn test_disconnect_line() {
        assert_eq!(
            parse_line("Disconnected from server {LogOff}").map(|e| e.kind),
            Some(EventKind::Disconnect {
                reason: DisconnectReason::LogOff
            })
        );
    }

    #[test]
    fn test_unknown_and_empty_lines() {
        assert_eq!(parse_line(""), None);
        assert_eq!(parse_line("   "), None);
        assert_eq!(parse_line("INFO 12:00:00,000 [main] (a:1) - Loading textures"), None);
    }

    #[test]
    fn test_table_names_unique() {
        let mut names: Vec<_> = EXTRACTORS.iter().map(|e| e.name).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), EXTRACTORS.len());
    }
}
