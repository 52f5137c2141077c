//! The persistent key-value capability.

use crate::StoreResult;

/// Durable local cache, scoped per profile.
///
/// Implementations must be safe to share between concurrent resolver calls.
/// Writes are last-writer-wins; no transactions are required.
pub trait PersistentKv: Send + Sync {
    fn get(&self, key: &str) -> StoreResult<Option<String>>;

    fn set(&self, key: &str, value: &str) -> StoreResult<()>;

    fn remove(&self, key: &str) -> StoreResult<()>;

    /// All keys in ascending order.
    fn keys(&self) -> StoreResult<Vec<String>>;

    fn clear(&self) -> StoreResult<()> {
        for key in self.keys()? {
            self.remove(&key)?;
        }
        Ok(())
    }

    /// Approximate payload size (keys plus values).
    fn size_bytes(&self) -> StoreResult<u64> {
        let mut total = 0u64;
        for key in self.keys()? {
            let value_len = self.get(&key)?.map_or(0, |v| v.len());
            total += (key.len() + value_len) as u64;
        }
        Ok(total)
    }
}
