use std::fs;
use std::path::PathBuf;

use super::error::StorageError;

/// Flat string-keyed blob storage backing the store's durable state.
pub trait KeyValueStorage {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&mut self, key: &str, value: &str) -> Result<(), StorageError>;
}

/// One `<key>.json` file per key under a directory.
pub struct FileStorage {
    dir: PathBuf,
}

impl FileStorage {
    pub fn new(dir: PathBuf) -> Self {
        if let Err(e) = fs::create_dir_all(&dir) {
            log::warn!("Failed to create data directory {}: {}", dir.display(), e);
        }
        Self { dir }
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", key))
    }
}

impl KeyValueStorage for FileStorage {
    fn get(&self, key: &str) -> Option<String> {
        let path = self.path_for(key);
        if !path.exists() {
            return None;
        }
        fs::read_to_string(&path)
            .map_err(|e| log::warn!("Failed to read {}: {}", path.display(), e))
            .ok()
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StorageError> {
        let path = self.path_for(key);
        // write-then-rename so a crash never leaves a truncated blob
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, value)
            .and_then(|_| fs::rename(&tmp, &path))
            .map_err(|source| StorageError::Io { key: key.to_string(), source })
    }
}

/// In-memory storage for tests.
#[cfg(test)]
#[derive(Debug, Default)]
pub struct MemoryStorage {
    entries: std::collections::HashMap<String, String>,
    fail_writes: bool,
}

#[cfg(test)]
impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entry(mut self, key: &str, value: &str) -> Self {
        self.entries.insert(key.to_string(), value.to_string());
        self
    }

    /// Makes every subsequent `set` fail, for exercising persistence errors.
    pub fn failing(mut self) -> Self {
        self.fail_writes = true;
        self
    }
}

#[cfg(test)]
impl KeyValueStorage for MemoryStorage {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StorageError> {
        if self.fail_writes {
            return Err(StorageError::Io {
                key: key.to_string(),
                source: std::io::Error::other("storage is read-only"),
            });
        }
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_storage_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let mut storage = FileStorage::new(dir.path().join("state"));

        assert_eq!(storage.get("bookmarks"), None);
        storage.set("bookmarks", r#"["a","b"]"#).unwrap();
        assert_eq!(storage.get("bookmarks").as_deref(), Some(r#"["a","b"]"#));

        let reopened = FileStorage::new(dir.path().join("state"));
        assert_eq!(reopened.get("bookmarks").as_deref(), Some(r#"["a","b"]"#));
    }

    #[test]
    fn file_storage_reports_write_failure() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        fs::write(&blocker, "").unwrap();
        // a regular file where the directory should be
        let mut storage = FileStorage::new(blocker);

        let err = storage.set("mangaSettings", "{}").unwrap_err();
        assert!(matches!(err, StorageError::Io { ref key, .. } if key == "mangaSettings"));
    }
}
