use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::thread;
use std::time::Duration;

use encoding_rs::WINDOWS_1252;
use memchr::{memchr, memchr_iter, memrchr};

use super::TailError;
use super::cursor::{HEAD_LEN, LogCursor};

const RETRY_ATTEMPTS: u32 = 3;
const RETRY_BASE_DELAY: Duration = Duration::from_millis(10);

/// Lines completed since the previous poll.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct TailBatch {
    /// The file was truncated or replaced. Derived state must be rebuilt
    /// before `lines` are applied; `lines` then start at the new beginning.
    pub reset: bool,
    pub lines: Vec<String>,
}

impl TailBatch {
    pub fn is_empty(&self) -> bool {
        !self.reset && self.lines.is_empty()
    }
}

/// Clears the read-in-progress flag when a poll ends, including by panic
/// in the consumer.
struct ReadGuard<'a>(&'a AtomicBool);

impl Drop for ReadGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Tails one file. Safe to poll from several triggers: overlapping polls
/// return an empty batch instead of blocking.
pub struct LogTail {
    path: PathBuf,
    cursor: Mutex<LogCursor>,
    reading: AtomicBool,
    reset_pending: AtomicBool,
}

impl LogTail {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        Self {
            cursor: Mutex::new(LogCursor::new(path.clone())),
            path,
            reading: AtomicBool::new(false),
            reset_pending: AtomicBool::new(false),
        }
    }

    /// Tail that skips everything already in the file, up to the last complete line.
    pub fn starting_at_end(path: impl Into<PathBuf>) -> Self {
        let tail = Self::new(path);
        match tail.seek_to_end() {
            Ok(()) => {}
            Err(e) => {
                tracing::warn!(path = %tail.path.display(), error = %e, "Failed to seek log end, tailing from start");
            }
        }
        tail
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn cursor(&self) -> LogCursor {
        self.lock_cursor().clone()
    }

    /// Ask for the cursor to go back to the start. Applied by the next poll,
    /// or right after the poll currently in flight.
    pub fn request_reset(&self) {
        self.reset_pending.store(true, Ordering::Release);
        if self.reading.load(Ordering::Acquire) {
            tracing::debug!(path = %self.path.display(), "Reset deferred until read completes");
        }
    }

    /// Read whatever was appended since the last poll. Never fails: errors
    /// are logged and produce an empty batch.
    pub fn poll(&self) -> TailBatch {
        let mut out = TailBatch::default();
        self.poll_with(|batch| out = batch);
        out
    }

    /// Poll and hand a non-empty batch to `deliver` while the read is still
    /// guarded, so batches of one file reach the consumer in read order.
    /// Returns the number of lines delivered; 0 if another read was in flight.
    pub fn poll_with(&self, deliver: impl FnOnce(TailBatch)) -> usize {
        if self.reading.swap(true, Ordering::AcqRel) {
            return 0;
        }
        let _guard = ReadGuard(&self.reading);

        let batch = self.read_batch();
        let count = batch.lines.len();
        if !batch.is_empty() {
            deliver(batch);
        }
        count
    }

    fn read_batch(&self) -> TailBatch {
        let mut batch = TailBatch::default();
        if self.reset_pending.swap(false, Ordering::AcqRel) {
            self.lock_cursor().reset();
            batch.reset = true;
        }

        match self.read_new(&mut batch) {
            Ok(()) => {}
            Err(TailError::Locked(e)) => {
                tracing::debug!(path = %self.path.display(), error = %e, "Log locked, retrying next cycle");
            }
            Err(TailError::PermissionDenied(e)) => {
                tracing::warn!(path = %self.path.display(), error = %e, "Permission denied reading log, skipping cycle");
            }
            Err(TailError::Io(e)) => {
                tracing::warn!(path = %self.path.display(), error = %e, "Failed to read log");
            }
        }

        // A reset that arrived mid-read: whatever was just read predates it.
        if self.reset_pending.swap(false, Ordering::AcqRel) {
            self.lock_cursor().reset();
            batch.lines.clear();
            batch.reset = true;
        }
        batch
    }

    /// Move the cursor to the last complete line without reading anything,
    /// dropping a pending reset. Used when the file could not be truncated.
    pub fn skip_to_end(&self) -> Result<(), TailError> {
        self.reset_pending.store(false, Ordering::Release);
        self.seek_to_end()
    }

    fn read_new(&self, batch: &mut TailBatch) -> Result<(), TailError> {
        let Some(mut file) = with_retry(|| open_shared(&self.path))? else {
            return Ok(());
        };
        let length = file.metadata().map_err(TailError::classify)?.len();
        let mut cursor = self.lock_cursor();

        let mut current_head = None;
        if length < cursor.byte_offset {
            tracing::info!(
                path = %self.path.display(),
                offset = cursor.byte_offset,
                length,
                "Log truncated, rereading from start"
            );
            cursor.reset();
            batch.reset = true;
        } else if cursor.byte_offset > 0 {
            let head = read_head(&mut file, length).map_err(TailError::classify)?;
            if cursor.head_changed(&head) {
                tracing::info!(path = %self.path.display(), "Log replaced, rereading from start");
                cursor.reset();
                batch.reset = true;
            } else {
                current_head = Some(head);
            }
        }

        if length == cursor.byte_offset {
            cursor.last_known_length = length;
            return Ok(());
        }

        let offset = cursor.byte_offset;
        file.seek(SeekFrom::Start(offset)).map_err(TailError::classify)?;
        let mut buf = Vec::with_capacity(length.saturating_sub(offset) as usize);
        file.read_to_end(&mut buf).map_err(TailError::classify)?;

        // Bytes after the last newline stay unread until the line is finished.
        let Some(last_newline) = memrchr(b'\n', &buf) else {
            cursor.last_known_length = length;
            return Ok(());
        };
        let consumed = last_newline + 1;
        batch.lines.extend(decode_lines(&buf[..consumed]));

        if offset == 0 {
            cursor.head = buf[..buf.len().min(HEAD_LEN)].to_vec();
        } else if let Some(head) = current_head {
            if cursor.head.len() < head.len() {
                cursor.head = head;
            }
        }
        cursor.advance(consumed as u64, length);

        let length_after = file.metadata().map_err(TailError::classify)?.len();
        if length_after < cursor.byte_offset {
            tracing::info!(
                path = %self.path.display(),
                length_after,
                "Log shrank during read, discarding batch"
            );
            cursor.reset();
            batch.lines.clear();
            batch.reset = true;
        }

        tracing::debug!(
            path = %self.path.display(),
            lines = batch.lines.len(),
            offset = cursor.byte_offset,
            "Tail cycle"
        );
        Ok(())
    }

    fn seek_to_end(&self) -> Result<(), TailError> {
        let Some(mut file) = with_retry(|| open_shared(&self.path))? else {
            return Ok(());
        };
        let length = file.metadata().map_err(TailError::classify)?.len();
        let window = length.min(4096);
        file.seek(SeekFrom::Start(length - window))
            .map_err(TailError::classify)?;
        let mut buf = Vec::with_capacity(window as usize);
        (&mut file)
            .take(window)
            .read_to_end(&mut buf)
            .map_err(TailError::classify)?;

        let offset = match memrchr(b'\n', &buf) {
            Some(i) => length - window + i as u64 + 1,
            None if window == length => 0,
            None => length,
        };
        let head = read_head(&mut file, length).map_err(TailError::classify)?;

        let mut cursor = self.lock_cursor();
        cursor.byte_offset = offset;
        cursor.last_known_length = length;
        cursor.head = head;
        Ok(())
    }

    fn lock_cursor(&self) -> MutexGuard<'_, LogCursor> {
        self.cursor.lock().unwrap_or_else(|e| e.into_inner())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// One-shot helpers
// ─────────────────────────────────────────────────────────────────────────────

/// Complete lines within the last `max_bytes` of a file. A line cut by the
/// window start is dropped, as is an unterminated final line.
pub fn read_tail_lines(path: &Path, max_bytes: u64) -> Result<Vec<String>, TailError> {
    let Some(mut file) = with_retry(|| open_shared(path))? else {
        return Ok(Vec::new());
    };
    let length = file.metadata().map_err(TailError::classify)?.len();
    let start = length.saturating_sub(max_bytes);
    // One byte early so a window that starts exactly on a line keeps it.
    let read_from = start.saturating_sub(1);
    file.seek(SeekFrom::Start(read_from)).map_err(TailError::classify)?;
    let mut buf = Vec::with_capacity((length - read_from) as usize);
    file.read_to_end(&mut buf).map_err(TailError::classify)?;

    let body = if start > 0 {
        match memchr(b'\n', &buf) {
            Some(i) => &buf[i + 1..],
            None => &[][..],
        }
    } else {
        &buf[..]
    };
    let complete = match memrchr(b'\n', body) {
        Some(i) => &body[..=i],
        None => &[][..],
    };
    Ok(decode_lines(complete))
}

/// The last `n` non-empty lines of a file.
pub fn last_lines(path: &Path, n: usize) -> Result<Vec<String>, TailError> {
    if n == 0 {
        return Ok(Vec::new());
    }
    let length = fs::metadata(path).map(|m| m.len()).unwrap_or(0);
    let mut budget = (n as u64).saturating_mul(256).max(4096);
    loop {
        let mut lines = read_tail_lines(path, budget)?;
        if lines.len() >= n || budget >= length {
            let skip = lines.len().saturating_sub(n);
            lines.drain(..skip);
            return Ok(lines);
        }
        budget = budget.saturating_mul(2);
    }
}

/// Empty a log file in place. A missing file is not an error.
pub fn truncate_log(path: &Path) -> Result<(), TailError> {
    let result = with_retry(|| {
        let mut options = OpenOptions::new();
        options.write(true).truncate(true);
        share_all(&mut options);
        options.open(path).map_err(TailError::classify)
    });
    match result {
        Ok(_) => {
            tracing::info!(path = %path.display(), "Truncated log");
            Ok(())
        }
        Err(TailError::Io(e)) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// I/O primitives
// ─────────────────────────────────────────────────────────────────────────────

fn open_shared(path: &Path) -> Result<Option<File>, TailError> {
    let mut options = OpenOptions::new();
    options.read(true);
    share_all(&mut options);
    match options.open(path) {
        Ok(file) => Ok(Some(file)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(TailError::classify(e)),
    }
}

#[cfg(windows)]
fn share_all(options: &mut OpenOptions) {
    use std::os::windows::fs::OpenOptionsExt;
    // FILE_SHARE_READ | FILE_SHARE_WRITE | FILE_SHARE_DELETE
    options.share_mode(0x1 | 0x2 | 0x4);
}

#[cfg(not(windows))]
fn share_all(_options: &mut OpenOptions) {}

/// Retry `op` on lock violations with exponential backoff, then give up
/// until the next cycle.
fn with_retry<T>(mut op: impl FnMut() -> Result<T, TailError>) -> Result<T, TailError> {
    let mut delay = RETRY_BASE_DELAY;
    let mut attempt = 1;
    loop {
        match op() {
            Err(TailError::Locked(_)) if attempt < RETRY_ATTEMPTS => {
                thread::sleep(delay);
                delay *= 2;
                attempt += 1;
            }
            other => return other,
        }
    }
}

fn read_head(file: &mut File, length: u64) -> io::Result<Vec<u8>> {
    let n = length.min(HEAD_LEN as u64);
    file.seek(SeekFrom::Start(0))?;
    let mut head = Vec::with_capacity(n as usize);
    file.take(n).read_to_end(&mut head)?;
    Ok(head)
}

fn decode_lines(bytes: &[u8]) -> Vec<String> {
    let mut lines = Vec::new();
    let mut start = 0;
    for end in memchr_iter(b'\n', bytes) {
        lines.extend(decode_line(&bytes[start..end]));
        start = end + 1;
    }
    if start < bytes.len() {
        lines.extend(decode_line(&bytes[start..]));
    }
    lines
}

/// UTF-8 first, Windows-1252 for anything the game wrote in the legacy codepage.
fn decode_line(raw: &[u8]) -> Option<String> {
    let raw = raw.strip_suffix(b"\r").unwrap_or(raw);
    if raw.iter().all(u8::is_ascii_whitespace) {
        return None;
    }
    match std::str::from_utf8(raw) {
        Ok(s) => Some(s.to_string()),
        Err(_) => Some(WINDOWS_1252.decode_without_bom_handling(raw).0.into_owned()),
    }
}
