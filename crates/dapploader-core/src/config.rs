//! Configuration structures for dapploader.
//!
//! Configuration objects are explicit and serializable. The core crate does
//! not read environment variables or browser storage; the host (CLI, embedding
//! page) builds a `LoaderConfig` and passes it down.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::address::{self, CONTENT_HASH_PREFIX};
use crate::errors::{LoaderError, LoaderResult};

/// Global configuration container.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoaderConfig {
    /// Root domain appended to bare dependency names.
    pub domain: String,

    /// Prefix identifying content hashes.
    pub content_hash_prefix: String,

    /// Dependency recursion bound. Resolution fails once depth reaches it.
    pub max_depth: usize,

    /// Maximum accepted descriptor size.
    pub max_descriptor_bytes: usize,

    /// Bounded wait for a name lookup. A timeout reads as "not found".
    pub name_lookup_timeout_ms: u64,

    /// Delay before a cache-served descriptor is refreshed in the background.
    /// `None` disables the refresh.
    pub cache_refresh_delay_ms: Option<u64>,

    /// Extra delay before the first launch tears down the initial chrome.
    pub first_launch_teardown_delay_ms: u64,

    /// Bounded wait for an embedded document to signal readiness.
    pub frame_ready_timeout_ms: u64,

    /// Origin of the content gateway, e.g. `https://ipfs.example.net`.
    pub content_origin: String,

    /// Local development override.
    pub dev: DevConfig,

    /// Load locations considered loaded when the session starts.
    pub preloaded: Vec<String>,

    /// Legacy module names mapped to load locations.
    pub aliases: BTreeMap<String, String>,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            domain: "evan".to_string(),
            content_hash_prefix: CONTENT_HASH_PREFIX.to_string(),
            max_depth: 20,
            max_descriptor_bytes: crate::model::DEFAULT_MAX_DESCRIPTOR_BYTES,
            name_lookup_timeout_ms: 10_000,
            cache_refresh_delay_ms: Some(3_000),
            first_launch_teardown_delay_ms: 500,
            frame_ready_timeout_ms: 30_000,
            content_origin: "https://ipfs.test.evan.network".to_string(),
            dev: DevConfig::default(),
            preloaded: Vec::new(),
            aliases: BTreeMap::new(),
        }
    }
}

impl LoaderConfig {
    pub fn is_content_hash(&self, address: &str) -> bool {
        address::is_content_hash_with(address, &self.content_hash_prefix)
    }

    pub fn normalize_address(&self, address: &str) -> String {
        address::normalize_address(address, &self.content_hash_prefix)
    }

    /// `name` with the default domain appended (hashes and contracts unchanged).
    pub fn qualify(&self, name: &str) -> String {
        address::with_domain(name, &self.domain, &self.content_hash_prefix)
    }

    pub fn name_lookup_timeout(&self) -> Duration {
        Duration::from_millis(self.name_lookup_timeout_ms)
    }

    pub fn cache_refresh_delay(&self) -> Option<Duration> {
        self.cache_refresh_delay_ms.map(Duration::from_millis)
    }

    pub fn first_launch_teardown_delay(&self) -> Duration {
        Duration::from_millis(self.first_launch_teardown_delay_ms)
    }

    pub fn frame_ready_timeout(&self) -> Duration {
        Duration::from_millis(self.frame_ready_timeout_ms)
    }
}

/// Local development override settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DevConfig {
    pub enabled: bool,

    /// Origin that serves local applications, e.g. `http://localhost:3000`.
    pub local_origin: Option<String>,

    /// Root domain substituted into symbolic addresses in dev mode.
    pub dev_domain: Option<String>,

    /// Application names served locally.
    pub externals: Vec<String>,
}

/// Validate a full configuration object.
pub fn validate_config(cfg: &LoaderConfig) -> LoaderResult<()> {
    if cfg.max_depth == 0 {
        return Err(LoaderError::invalid_argument(
            "max_depth must be greater than zero",
        ));
    }

    if cfg.content_hash_prefix.is_empty() {
        return Err(LoaderError::invalid_argument(
            "content_hash_prefix must not be empty",
        ));
    }

    if cfg.max_descriptor_bytes == 0 {
        return Err(LoaderError::invalid_argument(
            "max_descriptor_bytes must be greater than zero",
        ));
    }

    if cfg.frame_ready_timeout_ms == 0 {
        return Err(LoaderError::invalid_argument(
            "frame_ready_timeout_ms must be greater than zero",
        ));
    }

    if cfg.content_origin.trim().is_empty() || cfg.content_origin.trim() == "*" {
        return Err(LoaderError::invalid_argument(
            "content_origin must be a concrete origin",
        ));
    }

    if cfg.dev.enabled && cfg.dev.local_origin.as_deref().map_or(true, str::is_empty) {
        return Err(LoaderError::invalid_argument(
            "dev mode requires a local_origin",
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let cfg = LoaderConfig::default();
        validate_config(&cfg).unwrap();
        assert_eq!(cfg.max_depth, 20);
    }

    #[test]
    fn wildcard_origin_rejected() {
        let mut cfg = LoaderConfig::default();
        cfg.content_origin = "*".to_string();
        assert!(validate_config(&cfg).is_err());
    }

    #[test]
    fn dev_mode_needs_origin() {
        let mut cfg = LoaderConfig::default();
        cfg.dev.enabled = true;
        assert!(validate_config(&cfg).is_err());
        cfg.dev.local_origin = Some("http://localhost:3000".to_string());
        validate_config(&cfg).unwrap();
    }

    #[test]
    fn partial_json_uses_defaults() {
        let cfg: LoaderConfig = serde_json::from_str(r#"{ "domain": "test", "cache_refresh_delay_ms": null }"#).unwrap();
        assert_eq!(cfg.domain, "test");
        assert_eq!(cfg.cache_refresh_delay(), None);
        assert_eq!(cfg.qualify("foo"), "foo.test");
    }
}
