pub mod formatting;
mod settings;

pub use settings::{LogFileRole, TrackerSettings};
