use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;

use super::{NOT_FOUND, StatusStore, StoreError};

/// Process-local status store. Counts calls so callers can assert on access.
#[derive(Debug, Default)]
pub struct MemoryStatusStore {
    records: Mutex<HashMap<String, i32>>,
    get_calls: AtomicUsize,
    save_calls: AtomicUsize,
}

impl MemoryStatusStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-seeded with the given records.
    pub fn with_records<I, K>(records: I) -> Self
    where
        I: IntoIterator<Item = (K, i32)>,
        K: Into<String>,
    {
        let store = Self::new();
        {
            let mut guard = store.lock();
            for (key, status_code) in records {
                guard.insert(key.into(), status_code);
            }
        }
        store
    }

    /// Current record without counting as a read.
    pub fn peek(&self, key: &str) -> Option<i32> {
        self.lock().get(key).copied()
    }

    pub fn get_calls(&self) -> usize {
        self.get_calls.load(Ordering::SeqCst)
    }

    pub fn save_calls(&self) -> usize {
        self.save_calls.load(Ordering::SeqCst)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, i32>> {
        // A poisoned map is still consistent: every write is a single insert.
        self.records.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl StatusStore for MemoryStatusStore {
    async fn get_status(&self, key: &str) -> Result<i32, StoreError> {
        self.get_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.lock().get(key).copied().unwrap_or(NOT_FOUND))
    }

    async fn save_status(&self, key: &str, status_code: i32) -> Result<(), StoreError> {
        self.save_calls.fetch_add(1, Ordering::SeqCst);
        self.lock().insert(key.to_string(), status_code);
        Ok(())
    }
}
