use std::path::PathBuf;

use serde::Serialize;

use crate::aggregate::{AggregateCounter, XpTotals};
use crate::loot::{LootChange, LootRecord};
use crate::roster::{CharacterRecord, ServerTransition};

/// Outward notifications for presentation collaborators.
/// Each carries a snapshot of the state it refers to.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "signal", rename_all = "camelCase")]
pub enum GameSignal {
    // Roster
    CharacterListChanged {
        characters: Vec<CharacterRecord>,
    },
    MainCharacterChanged {
        name: Option<String>,
    },
    ServerChanged {
        server: Option<String>,
        transition: ServerTransition,
    },

    // Loot
    LootChanged {
        change: LootChange,
        record: LootRecord,
    },

    // Aggregates
    SaleDetected {
        item_count: u64,
        total_currency: u64,
        totals: AggregateCounter,
    },
    XpGained {
        entity: String,
        amount: u64,
        totals: XpTotals,
    },

    /// A watched file was truncated or replaced and derived state was rebuilt.
    LogReset {
        path: PathBuf,
    },
}
