use std::sync::LazyLock;

use phf::phf_set;
use regex::Regex;

use super::event::{DisconnectReason, EventKind};

/// Connection-line prefixes, checked in order. Everything after the prefix is the host.
const CONNECT_PREFIXES: &[&str] = &[
    "Connected to server ",
    "Connected to ",
    "Connecting to server ",
    "Connexion au serveur ",
    "Connexion établie avec ",
    "Connection established with ",
];

/// Hosts the client talks to between real servers. Not a server change.
static DISPATCHER_HOSTS: phf::Set<&'static str> = phf_set! {
    "dispatch",
    "dispatcher",
    "wakfu-dispatch",
    "dispatch-wakfu",
};

static DISCONNECT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)(?:disconnect|d[ée]connexion|connection closed|session closed|connexion ferm[ée]e).*?\{(?P<reason>LogOff|Dispatch)\}",
    )
    .expect("disconnect pattern")
});

/// Strip a known prefix and cut the host at the first `.` or `:`.
///
/// Returns `None` for dispatcher hosts so a trip through the dispatcher is neutral.
pub(super) fn extract_server_change(line: &str) -> Option<EventKind> {
    let host = CONNECT_PREFIXES.iter().find_map(|prefix| {
        let start = line.find(prefix)?;
        Some(&line[start + prefix.len()..])
    })?;
    let host = host.trim_start_matches(|c: char| c == ':' || c.is_whitespace());
    let end = host
        .find(|c: char| c == '.' || c == ':' || c.is_whitespace())
        .unwrap_or(host.len());
    let server_name = host[..end].trim().to_ascii_lowercase();

    if server_name.is_empty() || is_dispatcher_host(&server_name) {
        return None;
    }
    Some(EventKind::ServerChange { server_name })
}

pub(super) fn extract_disconnect(line: &str) -> Option<EventKind> {
    let caps = DISCONNECT.captures(line)?;
    let reason = match &caps["reason"] {
        "LogOff" => DisconnectReason::LogOff,
        _ => DisconnectReason::Dispatch,
    };
    Some(EventKind::Disconnect { reason })
}

pub fn is_dispatcher_host(server_name: &str) -> bool {
    DISPATCHER_HOSTS.contains(server_name.to_ascii_lowercase().as_str())
}
