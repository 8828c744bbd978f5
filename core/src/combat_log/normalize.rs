use std::sync::LazyLock;

use regex::Regex;

// INFO 16:24:01,123 [AWT-EventQueue-0] (aSx:1074) - message
static GAME_PREFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^\s*(?:TRACE|DEBUG|INFO|WARN|ERROR|FATAL)\s+\d{1,2}:\d{2}:\d{2}(?:[,.]\d{1,3})?\s+\[[^\]]*\]\s+(?:\([^)]*\)\s+)?-\s+",
    )
    .expect("game log prefix pattern")
});

// [16:24:01] [Information (jeu)] message
static CHAT_PREFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*\[\d{1,2}:\d{2}:\d{2}\]\s*(?:\[[^\]]*\]\s*)?").expect("chat log prefix pattern")
});

/// Strip the timestamp/channel prefix and surrounding whitespace from a raw line.
///
/// Lines without a known prefix are returned trimmed, unchanged otherwise.
pub fn normalize_line(raw: &str) -> &str {
    let line = raw.trim_start_matches('\u{feff}').trim();
    if let Some(m) = GAME_PREFIX.find(line) {
        return line[m.end()..].trim();
    }
    if let Some(m) = CHAT_PREFIX.find(line) {
        return line[m.end()..].trim();
    }
    line
}
