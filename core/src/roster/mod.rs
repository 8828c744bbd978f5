//! Live roster of characters and the preferences persisted alongside it.

mod config;
mod reconcile;
mod record;
mod startup;
mod state;

pub use config::{MAX_MY_CHARACTERS, RosterConfig};
pub use reconcile::{ReconcilePolicy, ReconcileReport, apply_turn_order, enforce_group_limit, reconcile};
pub use record::{CharacterRecord, name_key};
pub use startup::{StartupMode, classify_startup, newest_modification};
pub use state::{RosterOutcome, RosterSettings, RosterState, ServerTransition};

/// Rejections at the roster API boundary. Nothing here is fatal.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RosterError {
    #[error("the main character cannot be hidden or removed")]
    MainCharacterProtected,
    #[error("at most {0} characters can be marked as yours")]
    MyCharactersFull(usize),
    #[error("character name is empty")]
    EmptyName,
    #[error("unknown character: {0}")]
    NotFound(String),
}
