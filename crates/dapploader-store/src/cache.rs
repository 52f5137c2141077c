//! Descriptor cache.
//!
//! Maps a resolved address to the public part of its descriptor, or to the
//! `invalid` sentinel for a known-bad address. The whole cache belongs to one
//! build identifier: when the running build differs from the recorded one,
//! every entry is dropped.
//!
//! Key layout inside the backing store:
//! - `meta:build` -> build identifier the entries were written under
//! - `descriptor:<address>` -> descriptor JSON or `invalid`

use std::fmt;
use std::sync::Arc;

use bytesize::ByteSize;
use serde::Serialize;

use dapploader_core::model::ApplicationDescriptor;

use crate::kv::PersistentKv;
use crate::{StoreError, StoreResult};

pub const BUILD_KEY: &str = "meta:build";
pub const ENTRY_PREFIX: &str = "descriptor:";
pub const INVALID_SENTINEL: &str = "invalid";

/// A cached value.
#[derive(Debug, Clone, PartialEq)]
pub enum CacheEntry {
    Valid(ApplicationDescriptor),
    Invalid,
}

#[derive(Clone)]
pub struct DescriptorCache {
    kv: Arc<dyn PersistentKv>,
    build_id: String,
}

impl fmt::Debug for DescriptorCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DescriptorCache")
            .field("build_id", &self.build_id)
            .finish_non_exhaustive()
    }
}

impl DescriptorCache {
    /// Open the cache for the running build. Entries recorded under another
    /// build are dropped.
    pub fn open(kv: Arc<dyn PersistentKv>, build_id: impl Into<String>) -> StoreResult<Self> {
        let cache = Self {
            kv,
            build_id: build_id.into(),
        };
        cache.claim_build()?;
        Ok(cache)
    }

    pub fn build_id(&self) -> &str {
        &self.build_id
    }

    fn key(address: &str) -> String {
        format!("{ENTRY_PREFIX}{address}")
    }

    fn build_matches(&self) -> StoreResult<bool> {
        Ok(self.kv.get(BUILD_KEY)?.as_deref() == Some(self.build_id.as_str()))
    }

    /// Make the running build the owner of the store, dropping foreign entries.
    fn claim_build(&self) -> StoreResult<()> {
        if self.build_matches()? {
            return Ok(());
        }
        let recorded = self.kv.get(BUILD_KEY)?;
        tracing::debug!(
            recorded = recorded.as_deref().unwrap_or("<none>"),
            running = %self.build_id,
            "build changed, invalidating descriptor cache"
        );
        self.drop_entries()?;
        self.kv.set(BUILD_KEY, &self.build_id)
    }

    fn drop_entries(&self) -> StoreResult<()> {
        for key in self.kv.keys()? {
            if key.starts_with(ENTRY_PREFIX) {
                self.kv.remove(&key)?;
            }
        }
        Ok(())
    }

    /// Look up `address`. Entries written under another build are never served.
    pub fn get(&self, address: &str) -> StoreResult<Option<CacheEntry>> {
        if !self.build_matches()? {
            return Ok(None);
        }
        let Some(raw) = self.kv.get(&Self::key(address))? else {
            return Ok(None);
        };
        if raw == INVALID_SENTINEL {
            return Ok(Some(CacheEntry::Invalid));
        }
        match serde_json::from_str::<ApplicationDescriptor>(&raw) {
            Ok(descriptor) => Ok(Some(CacheEntry::Valid(descriptor))),
            Err(e) => {
                tracing::warn!(%address, error = %e, "dropping unreadable cache entry");
                self.kv.remove(&Self::key(address))?;
                Ok(None)
            }
        }
    }

    /// Whether this handle may write. A store without a recorded build is
    /// claimed; one owned by another build is left alone.
    fn writable(&self) -> StoreResult<bool> {
        match self.kv.get(BUILD_KEY)? {
            Some(recorded) if recorded == self.build_id => Ok(true),
            Some(recorded) => {
                tracing::debug!(%recorded, running = %self.build_id, "store owned by another build, dropping write");
                Ok(false)
            }
            None => {
                self.kv.set(BUILD_KEY, &self.build_id)?;
                Ok(true)
            }
        }
    }

    /// Store the public part of `descriptor` under `address`.
    pub fn put(&self, address: &str, descriptor: &ApplicationDescriptor) -> StoreResult<()> {
        let json = descriptor
            .to_public_json()
            .map_err(|e| StoreError::Invalid(e.to_string()))?;
        if !self.writable()? {
            return Ok(());
        }
        self.kv.set(&Self::key(address), &json)
    }

    /// Mark `address` as known-bad.
    pub fn mark_invalid(&self, address: &str) -> StoreResult<()> {
        if !self.writable()? {
            return Ok(());
        }
        self.kv.set(&Self::key(address), INVALID_SENTINEL)
    }

    pub fn remove(&self, address: &str) -> StoreResult<()> {
        self.kv.remove(&Self::key(address))
    }

    /// Addresses with a valid entry.
    pub fn addresses(&self) -> StoreResult<Vec<String>> {
        if !self.build_matches()? {
            return Ok(Vec::new());
        }
        let mut out = Vec::new();
        for key in self.kv.keys()? {
            let Some(address) = key.strip_prefix(ENTRY_PREFIX) else {
                continue;
            };
            if matches!(self.get(address)?, Some(CacheEntry::Valid(_))) {
                out.push(address.to_string());
            }
        }
        Ok(out)
    }

    /// Whether `address` has a valid entry for the running build.
    pub fn has_valid(&self, address: &str) -> bool {
        matches!(self.get(address), Ok(Some(CacheEntry::Valid(_))))
    }

    pub fn clear(&self) -> StoreResult<()> {
        self.drop_entries()
    }

    pub fn stats(&self) -> StoreResult<CacheStats> {
        let mut stats = CacheStats {
            build_id: self.build_id.clone(),
            ..CacheStats::default()
        };
        for key in self.kv.keys()? {
            if let Some(address) = key.strip_prefix(ENTRY_PREFIX) {
                match self.get(address)? {
                    Some(CacheEntry::Valid(_)) => stats.entries += 1,
                    Some(CacheEntry::Invalid) => stats.invalid += 1,
                    None => {}
                }
            }
        }
        stats.size = ByteSize::b(self.kv.size_bytes()?).to_string();
        Ok(stats)
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct CacheStats {
    pub build_id: String,
    pub entries: usize,
    pub invalid: usize,
    pub size: String,
}
