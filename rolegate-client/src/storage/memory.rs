//! In-memory storage (for tests and throwaway sessions)

use super::{read_lock, write_lock, StorageBackend};
use rolegate_core::RolegateResult;
use std::collections::HashMap;
use std::sync::RwLock;

#[derive(Debug, Default)]
pub struct MemoryStorage {
    items: RwLock<HashMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        read_lock(&self.items).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl StorageBackend for MemoryStorage {
    fn get_item(&self, key: &str) -> Option<String> {
        read_lock(&self.items).get(key).cloned()
    }

    fn set_item(&self, key: &str, value: &str) -> RolegateResult<()> {
        write_lock(&self.items).insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove_item(&self, key: &str) -> RolegateResult<()> {
        write_lock(&self.items).remove(key);
        Ok(())
    }
}
