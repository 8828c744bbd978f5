use std::path::{Path, PathBuf};

/// Leading bytes remembered to recognise a file that was replaced in place.
pub(crate) const HEAD_LEN: usize = 64;

/// Read position within one tailed file.
///
/// `byte_offset <= last_known_length` holds after every read.
#[derive(Debug, Clone)]
pub struct LogCursor {
    pub path: PathBuf,
    pub byte_offset: u64,
    pub last_known_length: u64,
    pub(crate) head: Vec<u8>,
}

impl LogCursor {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            byte_offset: 0,
            last_known_length: 0,
            head: Vec::new(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn reset(&mut self) {
        self.byte_offset = 0;
        self.last_known_length = 0;
        self.head.clear();
    }

    /// True if `current` no longer starts with the remembered head bytes.
    pub(crate) fn head_changed(&self, current: &[u8]) -> bool {
        if self.head.is_empty() {
            return false;
        }
        let n = self.head.len().min(current.len());
        self.head[..n] != current[..n] || current.len() < self.head.len()
    }

    pub(crate) fn advance(&mut self, consumed: u64, length: u64) {
        self.byte_offset += consumed;
        self.last_known_length = length.max(self.byte_offset);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_head_changed() {
        let mut cursor = LogCursor::new("a.log");
        assert!(!cursor.head_changed(b"anything"));
        cursor.head = b"INFO 1".to_vec();
        assert!(!cursor.head_changed(b"INFO 1 and more"));
        assert!(cursor.head_changed(b"WARN 2 and more"));
        assert!(cursor.head_changed(b"INFO"));
    }

    #[test]
    fn test_advance_keeps_offset_within_length() {
        let mut cursor = LogCursor::new("a.log");
        cursor.advance(10, 4);
        assert_eq!(cursor.byte_offset, 10);
        assert_eq!(cursor.last_known_length, 10);
        cursor.reset();
        assert_eq!((cursor.byte_offset, cursor.last_known_length), (0, 0));
    }
}
