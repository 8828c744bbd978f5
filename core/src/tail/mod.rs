//! Incremental tailing of files owned by another process.
//!
//! A [`LogTail`] is opened, read and closed on every cycle; nothing keeps a
//! handle on the game's log between polls. [`spawn_watch`] drives one tail
//! from a timer plus optional filesystem notifications.

mod cursor;
mod reader;
mod watcher;

pub use cursor::LogCursor;
pub use reader::{LogTail, TailBatch, last_lines, read_tail_lines, truncate_log};
pub use watcher::{LineSink, WatchHandle, spawn_watch};

use std::io;

#[derive(Debug, thiserror::Error)]
pub enum TailError {
    /// Sharing or lock violation. Expected while the writer holds the file.
    #[error("file is locked by another process: {0}")]
    Locked(#[source] io::Error),
    #[error("permission denied: {0}")]
    PermissionDenied(#[source] io::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
}

impl TailError {
    pub fn classify(err: io::Error) -> Self {
        if is_lock_violation(&err) {
            return Self::Locked(err);
        }
        match err.kind() {
            io::ErrorKind::PermissionDenied => Self::PermissionDenied(err),
            _ => Self::Io(err),
        }
    }
}

#[cfg(windows)]
fn is_lock_violation(err: &io::Error) -> bool {
    // ERROR_SHARING_VIOLATION, ERROR_LOCK_VIOLATION
    matches!(err.raw_os_error(), Some(32) | Some(33))
}

#[cfg(not(windows))]
fn is_lock_violation(err: &io::Error) -> bool {
    err.kind() == io::ErrorKind::WouldBlock
}
