//! Line-level event extraction.
//!
//! Every extractor is a pure function over one normalized line backed by
//! precompiled patterns. [`parser::parse_line`] walks the extractor table in
//! order and returns the first match.

mod connection;
mod event;
mod fight;
mod group;
mod loot;
mod normalize;
mod numbers;
mod parser;
mod sale;
mod xp;

pub use connection::is_dispatcher_host;
pub use event::{DisconnectReason, DomainEvent, EventKind};
pub use normalize::normalize_line;
pub use numbers::parse_grouped_u64;
pub use parser::{parse_line, parse_normalized, EXTRACTORS};
pub use sale::extract_sale;
