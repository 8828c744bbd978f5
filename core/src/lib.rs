//! Session tracking for Wakfu: tails the game and chat logs, keeps a roster of
//! characters seen in fights and groups, a per-session loot ledger and sale
//! and experience counters, and persists what should survive a restart.

pub mod aggregate;
pub mod combat_log;
pub mod context;
pub mod events;
pub mod loot;
pub mod roster;
pub mod snapshot;
pub mod storage;
pub mod tail;

// Re-exports for convenience
pub use context::{AppConfig, ResetScope, SessionStats, Tracker, TrackerError};
pub use events::{GameSignal, SignalBus, SignalHandler};
pub use roster::{CharacterRecord, StartupMode};
pub use loot::LootRecord;
pub use wakmeter_types::{LogFileRole, TrackerSettings};
