//! Store configuration.

use std::path::PathBuf;
use std::sync::Arc;

use crate::kv::PersistentKv;
use crate::memory::MemoryKv;
use crate::{StoreError, StoreResult};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreBackend {
    Memory,
    Fs(PathBuf),
    Sqlite(PathBuf),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    pub backend: StoreBackend,
}

impl StoreConfig {
    pub fn memory() -> Self {
        Self {
            backend: StoreBackend::Memory,
        }
    }

    /// Local store under `root`: SQLite when available, one file per key
    /// otherwise.
    pub fn local_dev(root: PathBuf) -> StoreResult<Self> {
        std::fs::create_dir_all(&root)?;
        let backend = if cfg!(feature = "sqlite") {
            StoreBackend::Sqlite(root.join("descriptors.sqlite"))
        } else {
            StoreBackend::Fs(root.join("descriptors"))
        };
        Ok(Self { backend })
    }
}

/// Open the configured backend.
pub fn open_kv(cfg: &StoreConfig) -> StoreResult<Arc<dyn PersistentKv>> {
    match &cfg.backend {
        StoreBackend::Memory => Ok(Arc::new(MemoryKv::new())),

        #[cfg(feature = "fs")]
        StoreBackend::Fs(root) => Ok(Arc::new(crate::fs::FsKv::open(root.clone())?)),
        #[cfg(not(feature = "fs"))]
        StoreBackend::Fs(_) => Err(StoreError::Invalid("fs backend not compiled in".to_string())),

        #[cfg(feature = "sqlite")]
        StoreBackend::Sqlite(path) => Ok(Arc::new(crate::sqlite::SqliteKv::open(path)?)),
        #[cfg(not(feature = "sqlite"))]
        StoreBackend::Sqlite(_) => Err(StoreError::Invalid("sqlite backend not compiled in".to_string())),
    }
}
