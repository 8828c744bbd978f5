//! Per-session loot ledger keyed by (character, item).

mod ledger;

pub use ledger::{LedgerSnapshot, LootChange, LootKey, LootLedger, LootRecord};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LootError {
    #[error("{item} is a favorite and cannot be deleted")]
    FavoriteProtected { character: String, item: String },
    #[error("no loot recorded for {character} / {item}")]
    NotFound { character: String, item: String },
}
