//! File-backed storage
//!
//! One JSON object per profile directory. The whole map is kept in memory and
//! rewritten on every mutation, so a session survives process restarts.

use super::{read_lock, write_lock, StorageBackend};
use rolegate_core::{storage_error, RolegateResult};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use tracing::{debug, info, warn};

const STORAGE_FILE: &str = "storage.json";

#[derive(Debug)]
pub struct FileStorage {
    path: PathBuf,
    items: RwLock<HashMap<String, String>>,
}

impl FileStorage {
    /// Open (or create) the storage in `dir`
    pub fn open<P: AsRef<Path>>(dir: P) -> RolegateResult<Self> {
        let dir = dir.as_ref();
        std::fs::create_dir_all(dir).map_err(|e| {
            storage_error!(
                format!("Failed to create profile directory {}: {}", dir.display(), e),
                "file_storage",
                e
            )
        })?;

        let path = dir.join(STORAGE_FILE);
        let items = if path.exists() {
            let content = std::fs::read_to_string(&path)?;
            match serde_json::from_str::<HashMap<String, String>>(&content) {
                Ok(items) => items,
                Err(e) => {
                    // Unreadable state is dropped rather than trusted.
                    warn!(
                        "Discarding unreadable storage file {}: {}",
                        path.display(),
                        e
                    );
                    HashMap::new()
                }
            }
        } else {
            HashMap::new()
        };

        info!(
            "File storage opened at {} ({} keys)",
            path.display(),
            items.len()
        );

        Ok(Self {
            path,
            items: RwLock::new(items),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self, items: &HashMap<String, String>) -> RolegateResult<()> {
        let json = serde_json::to_string_pretty(items)?;
        let tmp = self.path.with_extension("json.tmp");

        std::fs::write(&tmp, json)
            .and_then(|_| std::fs::rename(&tmp, &self.path))
            .map_err(|e| {
                storage_error!(
                    format!("Failed to write {}: {}", self.path.display(), e),
                    "file_storage",
                    e
                )
            })?;

        debug!("Persisted {} keys to {}", items.len(), self.path.display());
        Ok(())
    }
}

impl StorageBackend for FileStorage {
    fn get_item(&self, key: &str) -> Option<String> {
        read_lock(&self.items).get(key).cloned()
    }

    fn set_item(&self, key: &str, value: &str) -> RolegateResult<()> {
        let mut items = write_lock(&self.items);
        items.insert(key.to_string(), value.to_string());
        self.persist(&items)
    }

    fn remove_item(&self, key: &str) -> RolegateResult<()> {
        let mut items = write_lock(&self.items);
        if items.remove(key).is_some() {
            self.persist(&items)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_values_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();

        let storage = FileStorage::open(dir.path()).unwrap();
        storage.set_item("accessToken", "abc").unwrap();
        storage.set_item("user", r#"{"id":"1"}"#).unwrap();
        drop(storage);

        let reopened = FileStorage::open(dir.path()).unwrap();
        assert_eq!(reopened.get_item("accessToken").as_deref(), Some("abc"));
        assert_eq!(reopened.get_item("user").as_deref(), Some(r#"{"id":"1"}"#));
    }

    #[test]
    fn test_remove_is_persisted() {
        let dir = tempfile::tempdir().unwrap();

        let storage = FileStorage::open(dir.path()).unwrap();
        storage.set_item("accessToken", "abc").unwrap();
        storage.remove_item("accessToken").unwrap();
        storage.remove_item("never-set").unwrap();
        drop(storage);

        let reopened = FileStorage::open(dir.path()).unwrap();
        assert!(reopened.get_item("accessToken").is_none());
    }

    #[test]
    fn test_corrupt_file_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(STORAGE_FILE), "{not json").unwrap();

        let storage = FileStorage::open(dir.path()).unwrap();
        assert!(storage.get_item("accessToken").is_none());

        storage.set_item("accessToken", "fresh").unwrap();
        let reopened = FileStorage::open(dir.path()).unwrap();
        assert_eq!(reopened.get_item("accessToken").as_deref(), Some("fresh"));
    }

    #[test]
    fn test_creates_missing_directories() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("rolegate").join("work");

        let storage = FileStorage::open(&nested).unwrap();
        storage.set_item("k", "v").unwrap();
        assert!(nested.join(STORAGE_FILE).exists());
        assert_eq!(storage.path(), nested.join(STORAGE_FILE));
    }
}
