// In-memory storage for tests and hosts without a disk

use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        RwLock,
    },
};

use super::{KeyValueStorage, Result, StorageError};

#[derive(Default)]
pub struct MemoryStorage {
    items: RwLock<HashMap<String, String>>,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
    writes: AtomicUsize,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_item(key: &str, value: &str) -> Self {
        let storage = Self::new();
        if let Ok(mut guard) = storage.items.write() {
            guard.insert(key.to_string(), value.to_string());
        }
        storage
    }

    /// Makes every read fail as if storage were disabled.
    pub fn set_fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    /// Makes every write fail as if the quota were exhausted.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Number of successful writes so far.
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }
}

impl KeyValueStorage for MemoryStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(StorageError::Unavailable("reads disabled".into()));
        }
        let guard = self
            .items
            .read()
            .map_err(|_| StorageError::Unavailable("storage lock poisoned".into()))?;
        Ok(guard.get(key).cloned())
    }

    fn set_item(&self, key: &str, value: &str) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StorageError::QuotaExceeded(key.to_string()));
        }
        let mut guard = self
            .items
            .write()
            .map_err(|_| StorageError::Unavailable("storage lock poisoned".into()))?;
        guard.insert(key.to_string(), value.to_string());
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn remove_item(&self, key: &str) -> Result<()> {
        let mut guard = self
            .items
            .write()
            .map_err(|_| StorageError::Unavailable("storage lock poisoned".into()))?;
        guard.remove(key);
        Ok(())
    }
}
