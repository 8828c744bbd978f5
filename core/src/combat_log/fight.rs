use std::sync::LazyLock;

use regex::{Captures, Regex};

use super::event::EventKind;

// [_FL_] fightId=1541263 Bob breed : 8 [1234567] isControlledByAI=false obstacleId : -1 join the fight at {...}
static JOIN_STRICT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"\[_FL_\].*?fightId=(?P<fight>\d+)\s+(?P<name>.+?)\s+breed\s*:\s*-?\d+\s+\[-?\d+\]\s+isControlledByAI=(?P<ai>true|false)\b.*?join the fight",
    )
    .expect("combat join pattern")
});

// Older clients omit the bracketed actor id and may use ':' after the AI flag.
static JOIN_LOOSE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"\[_FL_\].*?fightId=(?P<fight>\d+)\s+(?P<name>.+?)\s+breed\s*:.*?isControlledByAI\s*[=:]\s*(?P<ai>true|false)\b.*?join(?:s)? the fight",
    )
    .expect("loose combat join pattern")
});

static FIGHT_END: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\[(?:FIGHT|_FL_)\]\s*(?:End fight|Fin du combat|Fight ended)")
        .expect("fight end pattern")
});

pub(super) fn extract_combat_join(line: &str) -> Option<EventKind> {
    JOIN_STRICT
        .captures(line)
        .or_else(|| JOIN_LOOSE.captures(line))
        .and_then(|caps| join_from_captures(&caps))
}

fn join_from_captures(caps: &Captures<'_>) -> Option<EventKind> {
    let actor_name = caps.name("name")?.as_str().trim();
    if actor_name.is_empty() {
        return None;
    }
    Some(EventKind::CombatJoin {
        actor_name: actor_name.to_string(),
        is_player_controlled: &caps["ai"] == "false",
        fight_id: caps.name("fight").and_then(|m| m.as_str().parse().ok()),
    })
}

pub(super) fn extract_combat_end(line: &str) -> Option<EventKind> {
    FIGHT_END.is_match(line).then_some(EventKind::CombatEnd)
}
