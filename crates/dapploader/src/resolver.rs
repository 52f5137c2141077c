//! Content resolver.
//!
//! Turns an address into an [`ApplicationDescriptor`]:
//! - content hashes are fetched from the content store directly
//! - symbolic addresses go through the descriptor cache, then the name
//!   resolver and the content store
//! - locally served applications bypass both (development override)
//!
//! A cache hit is returned immediately. When a refresh delay is configured,
//! the address is re-resolved in the background so the next call sees the
//! latest published descriptor.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::{debug, warn};

use dapploader_core::address::{self, DEV_DESCRIPTOR_FILE};
use dapploader_core::config::LoaderConfig;
use dapploader_core::model::{parse_envelope, ApplicationDescriptor};
use dapploader_core::{LoaderError, LoaderResult};
use dapploader_store::{CacheEntry, DescriptorCache};

use crate::capability::{Capabilities, DescriptorSource};
use crate::dev::override_target;

/// Resolves addresses to descriptors. Cheap to clone.
#[derive(Clone)]
pub struct ContentResolver {
    inner: Arc<Inner>,
}

struct Inner {
    cfg: LoaderConfig,
    caps: Capabilities,
    cache: DescriptorCache,
    refreshing: Mutex<HashSet<String>>,
}

impl ContentResolver {
    pub fn new(cfg: LoaderConfig, caps: Capabilities, cache: DescriptorCache) -> Self {
        Self {
            inner: Arc::new(Inner {
                cfg,
                caps,
                cache,
                refreshing: Mutex::new(HashSet::new()),
            }),
        }
    }

    pub fn config(&self) -> &LoaderConfig {
        &self.inner.cfg
    }

    pub fn capabilities(&self) -> &Capabilities {
        &self.inner.caps
    }

    pub fn cache(&self) -> &DescriptorCache {
        &self.inner.cache
    }

    /// Resolve `address` to its descriptor, private part included.
    pub async fn resolve(&self, address: &str) -> LoaderResult<ApplicationDescriptor> {
        let inner = &self.inner;
        let address = inner.cfg.normalize_address(address);
        if address.is_empty() {
            return Err(LoaderError::invalid_argument("empty address"));
        }

        if let Some(name) = override_target(&inner.cfg, inner.caps.dev.as_ref(), &address) {
            return inner.resolve_dev(&address, &name).await;
        }

        if inner.cfg.is_content_hash(&address) {
            return inner.resolve_hash(&address).await;
        }

        if let Some(rewritten) = inner.dev_domain_rewrite(&address) {
            match self.resolve_symbolic(&rewritten).await {
                Ok(descriptor) => return Ok(descriptor),
                Err(e) => {
                    debug!(%address, %rewritten, error = %e, "dev domain lookup failed, using original address");
                }
            }
        }

        self.resolve_symbolic(&address).await
    }

    /// Resolve `address` without consulting the cache. The result is still
    /// written back.
    pub async fn resolve_uncached(&self, address: &str) -> LoaderResult<ApplicationDescriptor> {
        let address = self.inner.cfg.normalize_address(address);
        if self.inner.cfg.is_content_hash(&address) {
            let bytes = self.inner.caps.content.fetch(&address).await?;
            return parse_envelope(&address, &bytes, self.inner.cfg.max_descriptor_bytes);
        }
        self.inner.resolve_live(&address).await
    }

    /// Whether `address` has a valid cache entry for the running build.
    pub fn has_valid_cache(&self, address: &str) -> bool {
        self.inner.cache.has_valid(&self.inner.cfg.normalize_address(address))
    }

    async fn resolve_symbolic(&self, address: &str) -> LoaderResult<ApplicationDescriptor> {
        match self.inner.cache_get(address) {
            Some(CacheEntry::Valid(descriptor)) => {
                debug!(%address, "descriptor cache hit");
                self.schedule_refresh(address);
                return Ok(descriptor);
            }
            Some(CacheEntry::Invalid) => {
                debug!(%address, "address cached as invalid, retrying live lookup");
            }
            None => debug!(%address, "descriptor cache miss"),
        }

        match self.inner.resolve_live(address).await {
            Ok(descriptor) => Ok(descriptor),
            Err(e) => {
                if let Err(cache_err) = self.inner.cache.mark_invalid(address) {
                    warn!(%address, error = %cache_err, "failed to record invalid address");
                }
                Err(e)
            }
        }
    }

    /// Re-resolve a cache-served address after the configured delay.
    fn schedule_refresh(&self, address: &str) {
        let Some(delay) = self.inner.cfg.cache_refresh_delay() else {
            return;
        };
        if !self.inner.refreshing.lock().insert(address.to_string()) {
            return;
        }

        let inner = self.inner.clone();
        let address = address.to_string();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            match inner.resolve_live(&address).await {
                Ok(_) => debug!(%address, "background refresh done"),
                Err(e) => warn!(%address, error = %e, "background refresh failed"),
            }
            inner.refreshing.lock().remove(&address);
        });
    }
}

impl Inner {
    fn cache_get(&self, address: &str) -> Option<CacheEntry> {
        match self.cache.get(address) {
            Ok(entry) => entry,
            Err(e) => {
                warn!(%address, error = %e, "descriptor cache read failed");
                None
            }
        }
    }

    fn cache_put(&self, address: &str, descriptor: &ApplicationDescriptor) {
        if !descriptor.is_cacheable() {
            debug!(%address, "descriptor opted out of caching");
            return;
        }
        if let Err(e) = self.cache.put(address, descriptor) {
            warn!(%address, error = %e, "descriptor cache write failed");
        }
    }

    fn dev_domain_rewrite(&self, address: &str) -> Option<String> {
        let dev = &self.cfg.dev;
        let domain = dev.dev_domain.as_deref().filter(|d| dev.enabled && !d.is_empty())?;
        if address::is_contract_address(address) || address::root_domain(address) == domain {
            return None;
        }
        Some(address::with_root_domain(address, domain))
    }

    async fn resolve_dev(&self, address: &str, name: &str) -> LoaderResult<ApplicationDescriptor> {
        let path = address::dev_path(name, DEV_DESCRIPTOR_FILE);
        debug!(%address, %path, "serving descriptor from local development origin");
        let bytes = self.caps.local_files.fetch(&path).await?;
        parse_envelope(address, &bytes, self.cfg.max_descriptor_bytes)
    }

    async fn resolve_hash(&self, hash: &str) -> LoaderResult<ApplicationDescriptor> {
        if let Some(CacheEntry::Valid(descriptor)) = self.cache_get(hash) {
            debug!(%hash, "descriptor cache hit");
            return Ok(descriptor);
        }
        let bytes = self.caps.content.fetch(hash).await?;
        let descriptor = parse_envelope(hash, &bytes, self.cfg.max_descriptor_bytes)?;
        self.cache_put(hash, &descriptor);
        Ok(descriptor)
    }

    async fn resolve_live(&self, address: &str) -> LoaderResult<ApplicationDescriptor> {
        let lookup = tokio::time::timeout(
            self.cfg.name_lookup_timeout(),
            self.caps.names.resolve_content_hash(address),
        )
        .await;

        let hash = match lookup {
            Ok(Ok(Some(hash))) if !hash.trim().is_empty() => hash.trim().to_string(),
            Ok(Ok(_)) => return Err(LoaderError::not_found(address)),
            Ok(Err(e)) => return Err(e),
            Err(_) => {
                warn!(%address, timeout_ms = self.cfg.name_lookup_timeout_ms, "name lookup timed out");
                return Err(LoaderError::not_found(address));
            }
        };
        debug!(%address, %hash, "name resolved");

        let bytes = self.caps.content.fetch(&hash).await?;
        let descriptor = parse_envelope(address, &bytes, self.cfg.max_descriptor_bytes)?;
        self.cache_put(address, &descriptor);
        Ok(descriptor)
    }
}

#[async_trait]
impl DescriptorSource for ContentResolver {
    async fn descriptor(&self, address: &str) -> LoaderResult<ApplicationDescriptor> {
        self.resolve(address).await
    }
}
