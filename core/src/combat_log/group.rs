use std::sync::LazyLock;

use regex::Regex;

use super::event::EventKind;

static GROUP_JOIN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?P<name>\S.*?)\s+(?:a rejoint le groupe|has joined the group|joined the group)\s*\.?$")
        .expect("group join pattern")
});

static GROUP_LEAVE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(?P<name>\S.*?)\s+(?:a quitté le groupe|a été exclu du groupe|has left the group|left the group|was kicked from the group)\s*\.?$",
    )
    .expect("group leave pattern")
});

/// First-person subjects refer to the log owner, who is never a roster guest.
fn is_self_reference(name: &str) -> bool {
    matches!(name.to_lowercase().as_str(), "vous" | "you")
}

pub(super) fn extract_group_join(line: &str) -> Option<EventKind> {
    let name = GROUP_JOIN.captures(line)?.name("name")?.as_str().trim();
    (!is_self_reference(name)).then(|| EventKind::GroupJoin {
        name: name.to_string(),
    })
}

pub(super) fn extract_group_leave(line: &str) -> Option<EventKind> {
    let name = GROUP_LEAVE.captures(line)?.name("name")?.as_str().trim();
    (!is_self_reference(name)).then(|| EventKind::GroupLeave {
        name: name.to_string(),
    })
}
