//! Key/value backends for the session records
//!
//! Modelled on browser local storage: string keys, string values, writes
//! visible to the next read.

use rolegate_core::RolegateResult;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

pub mod file;
pub mod memory;

pub use file::FileStorage;
pub use memory::MemoryStorage;

/// Durable string key/value storage scoped to one profile
pub trait StorageBackend: Send + Sync {
    /// Read a value; `None` when the key is absent
    fn get_item(&self, key: &str) -> Option<String>;

    /// Write a value. The write is visible to `get_item` even if persisting it fails.
    fn set_item(&self, key: &str, value: &str) -> RolegateResult<()>;

    /// Remove a key. Removing an absent key is not an error.
    fn remove_item(&self, key: &str) -> RolegateResult<()>;
}

// A panic while holding one of these locks leaves the map itself intact.
pub(crate) fn read_lock<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

pub(crate) fn write_lock<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}
