//! In-memory backend.

use std::collections::BTreeMap;

use parking_lot::RwLock;

use crate::kv::PersistentKv;
use crate::StoreResult;

#[derive(Debug, Default)]
pub struct MemoryKv {
    entries: RwLock<BTreeMap<String, String>>,
}

impl MemoryKv {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

impl PersistentKv for MemoryKv {
    fn get(&self, key: &str) -> StoreResult<Option<String>> {
        Ok(self.entries.read().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> StoreResult<()> {
        self.entries.write().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> StoreResult<()> {
        self.entries.write().remove(key);
        Ok(())
    }

    fn keys(&self) -> StoreResult<Vec<String>> {
        Ok(self.entries.read().keys().cloned().collect())
    }

    fn clear(&self) -> StoreResult<()> {
        self.entries.write().clear();
        Ok(())
    }
}
