use serde::Serialize;

/// Why the client dropped its server connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DisconnectReason {
    /// `{LogOff}`: the player logged out or quit.
    LogOff,
    /// `{Dispatch}`: the client went back to the server dispatcher.
    Dispatch,
}

/// Typed payload of a recognised log line.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type")]
pub enum EventKind {
    CombatJoin {
        actor_name: String,
        is_player_controlled: bool,
        fight_id: Option<u64>,
    },
    CombatEnd,
    GroupJoin {
        name: String,
    },
    GroupLeave {
        name: String,
    },
    ServerChange {
        server_name: String,
    },
    Disconnect {
        reason: DisconnectReason,
    },
    /// `character` is `None` for first-person lines ("Vous avez ramassé ...");
    /// the consumer attributes those to the log owner.
    LootPickup {
        character: Option<String>,
        item: String,
        quantity: u64,
    },
    SaleCompleted {
        item_count: u64,
        total_currency: u64,
    },
    XpGain {
        entity: String,
        amount: u64,
        remaining_to_next_level: Option<u64>,
        is_combat: bool,
    },
}

impl EventKind {
    /// Events that only touch the roster state machine.
    pub fn is_roster_event(&self) -> bool {
        matches!(
            self,
            Self::CombatJoin { .. }
                | Self::CombatEnd
                | Self::GroupJoin { .. }
                | Self::GroupLeave { .. }
                | Self::ServerChange { .. }
                | Self::Disconnect { .. }
        )
    }
}

/// An extracted event plus the normalized line it came from (kept for diagnostics).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DomainEvent {
    pub kind: EventKind,
    pub source_line: String,
}
