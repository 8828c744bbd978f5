mod app_config;
mod background_tasks;
mod session_core;
mod tracker;

pub use app_config::{
    APP_NAME, AppConfig, ConfigError, default_data_directory, default_log_directory,
    resolve_log_path,
};
pub use background_tasks::BackgroundTasks;
pub use tracker::{
    LEDGER_FILE, ROSTER_FILE, ResetScope, SessionStats, Tracker, TrackerError, WatchedFileStats,
};
