//! JSON-backed persisted state.
//!
//! Each store owns one file and serialises read-modify-write through its own
//! lock. A missing or corrupt file loads as `T::default()`; writes go to a
//! sibling temp file and are renamed into place.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::Serialize;
use serde::de::DeserializeOwned;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to serialize {path}: {source}")]
    Serialize {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

pub struct JsonStore<T> {
    path: PathBuf,
    lock: Mutex<()>,
    _marker: std::marker::PhantomData<fn() -> T>,
}

impl<T> JsonStore<T>
where
    T: Serialize + DeserializeOwned + Default,
{
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
            _marker: std::marker::PhantomData,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the stored value, falling back to the default on any read or parse failure.
    pub fn load(&self) -> T {
        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());
        self.read_unlocked()
    }

    pub fn save(&self, value: &T) -> Result<(), StoreError> {
        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());
        self.write_unlocked(value)
    }

    fn read_unlocked(&self) -> T {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return T::default(),
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "Failed to read store, using defaults");
                return T::default();
            }
        };
        if content.trim().is_empty() {
            return T::default();
        }
        match serde_json::from_str(&content) {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "Corrupt store, using defaults");
                T::default()
            }
        }
    }

    fn write_unlocked(&self, value: &T) -> Result<(), StoreError> {
        let io_err = |source| StoreError::Io {
            path: self.path.clone(),
            source,
        };
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(io_err)?;
        }
        let content = serde_json::to_string_pretty(value).map_err(|source| StoreError::Serialize {
            path: self.path.clone(),
            source,
        })?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, content).map_err(io_err)?;
        fs::rename(&tmp, &self.path).map_err(io_err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Default, PartialEq, Serialize, Deserialize)]
    struct Counter {
        hits: u32,
    }

    #[test]
    fn test_missing_file_is_default() {
        let dir = tempfile::tempdir().unwrap();
        let store: JsonStore<Counter> = JsonStore::new(dir.path().join("nope.json"));
        assert_eq!(store.load(), Counter::default());
    }

    #[test]
    fn test_corrupt_file_is_default() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("counter.json");
        fs::write(&path, "{ not json").unwrap();
        let store: JsonStore<Counter> = JsonStore::new(&path);
        assert_eq!(store.load(), Counter::default());
    }

    #[test]
    fn test_save_creates_directory_and_replaces() {
        let dir = tempfile::tempdir().unwrap();
        let store: JsonStore<Counter> = JsonStore::new(dir.path().join("nested/deeper/counter.json"));
        store.save(&Counter { hits: 2 }).unwrap();
        store.save(&Counter { hits: 3 }).unwrap();
        assert_eq!(store.load(), Counter { hits: 3 });
        assert!(!dir.path().join("nested/deeper/counter.json.tmp").exists());
    }
}
