//! Local development override.
//!
//! Applications listed as externals are served from a local origin instead
//! of the name and content layers:
//! - descriptors from `dapps/<name>/dbcp.json`
//! - files from `dapps/<name>/<file>`
//!
//! Content hashes and contract addresses never take the override.

use std::collections::BTreeSet;
use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;

use dapploader_core::address::{self, dapp_name};
use dapploader_core::config::{DevConfig, LoaderConfig};
use dapploader_core::{LoaderError, LoaderResult};

use crate::capability::{DevOverrideRegistry, LocalFileSource};

/// Application name served locally for `address`, if the override applies.
pub fn override_target(cfg: &LoaderConfig, registry: &dyn DevOverrideRegistry, address: &str) -> Option<String> {
    if !cfg.dev.enabled || cfg.is_content_hash(address) || address::is_contract_address(address) {
        return None;
    }
    let name = dapp_name(address);
    registry.is_available(&name).then_some(name)
}

/// Static list of locally served applications.
#[derive(Debug, Clone, Default)]
pub struct ExternalsList {
    names: BTreeSet<String>,
}

impl ExternalsList {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            names: names
                .into_iter()
                .map(|n| address::strip_separators(n.as_ref().trim()))
                .filter(|n| !n.is_empty())
                .collect(),
        }
    }

    pub fn from_config(dev: &DevConfig) -> Self {
        Self::new(&dev.externals)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

impl DevOverrideRegistry for ExternalsList {
    fn is_available(&self, name: &str) -> bool {
        self.names.contains(name)
    }
}

/// Development files read from a local directory.
#[derive(Debug, Clone)]
pub struct DirectoryFiles {
    root: PathBuf,
    origin: String,
}

impl DirectoryFiles {
    /// `origin` is the URL prefix the same directory is served under.
    pub fn new(root: impl Into<PathBuf>, origin: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            origin: origin.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, path: &str) -> LoaderResult<PathBuf> {
        let rel = Path::new(path.trim_start_matches('/'));
        if rel.components().any(|c| !matches!(c, Component::Normal(_))) {
            return Err(LoaderError::invalid_argument(format!(
                "development path escapes its root: {path}"
            )));
        }
        Ok(self.root.join(rel))
    }
}

#[async_trait]
impl LocalFileSource for DirectoryFiles {
    async fn fetch(&self, path: &str) -> LoaderResult<Bytes> {
        let full = self.resolve(path)?;
        match tokio::fs::read(&full).await {
            Ok(bytes) => Ok(Bytes::from(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(LoaderError::not_found(path)),
            Err(e) => Err(LoaderError::load_failure(path, e)),
        }
    }

    fn url_for(&self, path: &str) -> String {
        format!("{}/{}", self.origin, path.trim_start_matches('/'))
    }
}
