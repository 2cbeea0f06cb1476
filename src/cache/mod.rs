//! Local cache store.
//!
//! A small synchronous key-value store holding the last-known-good content
//! snapshot and the single pending-changes slot.

use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use crate::errors::SyncError;

/// Key of the last successfully reconciled content.
pub const CONTENT_CACHE_KEY: &str = "content_cache";
/// Key of the one unsent content mutation.
pub const PENDING_CHANGES_KEY: &str = "content_pending";

/// Synchronous key-value persistence.
pub trait CacheStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, SyncError>;
    fn set(&self, key: &str, value: &str) -> Result<(), SyncError>;
    fn remove(&self, key: &str) -> Result<(), SyncError>;
}

/// Cache backed by one file per key inside a directory.
#[derive(Debug, Clone)]
pub struct FileCache {
    dir: PathBuf,
}

impl FileCache {
    /// Open (and create if needed) the cache directory.
    pub fn open(dir: &Path) -> Result<Self, SyncError> {
        std::fs::create_dir_all(dir)?;
        Ok(Self {
            dir: dir.to_path_buf(),
        })
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, SyncError> {
        let valid = !key.is_empty()
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
        if !valid {
            return Err(SyncError::Storage(format!("invalid cache key '{}'", key)));
        }
        Ok(self.dir.join(format!("{}.json", key)))
    }
}

impl CacheStore for FileCache {
    fn get(&self, key: &str) -> Result<Option<String>, SyncError> {
        match std::fs::read_to_string(self.path_for(key)?) {
            Ok(raw) => Ok(Some(raw)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<(), SyncError> {
        let path = self.path_for(key)?;
        // Concurrent writers each rename their own temp file; the last rename wins.
        let tmp = self
            .dir
            .join(format!(".{}.{}.tmp", key, uuid::Uuid::new_v4().simple()));
        std::fs::write(&tmp, value)?;
        std::fs::rename(&tmp, &path)?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), SyncError> {
        match std::fs::remove_file(self.path_for(key)?) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// In-process cache, used when no cache directory is available.
#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CacheStore for MemoryCache {
    fn get(&self, key: &str) -> Result<Option<String>, SyncError> {
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), SyncError> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), SyncError> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_file_cache_set_get_remove() {
        let dir = TempDir::new().unwrap();
        let cache = FileCache::open(dir.path()).unwrap();

        assert_eq!(cache.get(CONTENT_CACHE_KEY).unwrap(), None);
        cache.set(CONTENT_CACHE_KEY, r#"{"hero":{}}"#).unwrap();
        assert_eq!(
            cache.get(CONTENT_CACHE_KEY).unwrap().as_deref(),
            Some(r#"{"hero":{}}"#)
        );

        cache.remove(CONTENT_CACHE_KEY).unwrap();
        assert_eq!(cache.get(CONTENT_CACHE_KEY).unwrap(), None);
        // Removing twice is fine
        cache.remove(CONTENT_CACHE_KEY).unwrap();
    }

    #[test]
    fn test_file_cache_survives_reopen() {
        let dir = TempDir::new().unwrap();
        FileCache::open(dir.path())
            .unwrap()
            .set(PENDING_CHANGES_KEY, "{}")
            .unwrap();

        let reopened = FileCache::open(dir.path()).unwrap();
        assert_eq!(reopened.get(PENDING_CHANGES_KEY).unwrap().as_deref(), Some("{}"));
    }

    #[test]
    fn test_file_cache_rejects_path_keys() {
        let dir = TempDir::new().unwrap();
        let cache = FileCache::open(dir.path()).unwrap();
        assert!(matches!(
            cache.set("../escape", "x"),
            Err(SyncError::Storage(_))
        ));
    }

    #[test]
    fn test_memory_cache_overwrites() {
        let cache = MemoryCache::new();
        cache.set(PENDING_CHANGES_KEY, "one").unwrap();
        cache.set(PENDING_CHANGES_KEY, "two").unwrap();
        assert_eq!(cache.get(PENDING_CHANGES_KEY).unwrap().as_deref(), Some("two"));
    }
}
