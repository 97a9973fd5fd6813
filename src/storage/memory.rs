use std::sync::Mutex;

use serde_json::Value;

use super::{KeyValueStore, Snapshot, WriteBatch};
use crate::error::StoreError;

#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<Snapshot>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_snapshot(snapshot: Snapshot) -> Self {
        Self {
            entries: Mutex::new(snapshot),
        }
    }

    pub fn snapshot(&self) -> Result<Snapshot, StoreError> {
        let guard = self.entries.lock().map_err(|_| StoreError::Poisoned)?;
        Ok(guard.clone())
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<Value>, StoreError> {
        let guard = self.entries.lock().map_err(|_| StoreError::Poisoned)?;
        Ok(guard.get(key).cloned())
    }

    fn keys(&self) -> Result<Vec<String>, StoreError> {
        let guard = self.entries.lock().map_err(|_| StoreError::Poisoned)?;
        Ok(guard.keys().cloned().collect())
    }

    fn commit(&self, batch: WriteBatch) -> Result<(), StoreError> {
        let mut guard = self.entries.lock().map_err(|_| StoreError::Poisoned)?;
        let mut next = guard.clone();
        batch.apply_to(&mut next)?;
        *guard = next;
        Ok(())
    }
}
