//! dapploader-store
//!
//! Durable key-value persistence for the loader, and the descriptor cache
//! built on top of it.
//!
//! Backends:
//! - [`memory::MemoryKv`]: process-local, for tests and ephemeral sessions
//! - [`fs::FsKv`]: one JSON record per key under a directory (`fs` feature)
//! - [`sqlite::SqliteKv`]: single-table SQLite database (`sqlite` feature)
//!
//! The cache is last-writer-wins. Entries are content addressed or dropped
//! wholesale when the build identifier changes, so a racing stale write is
//! corrected on the next read.

pub mod cache;
pub mod config;
pub mod kv;
pub mod memory;

#[cfg(feature = "fs")]
pub mod fs;

#[cfg(feature = "sqlite")]
pub mod sqlite;

use dapploader_core::LoaderError;
use thiserror::Error;

pub use cache::{CacheEntry, CacheStats, DescriptorCache};
pub use config::{open_kv, StoreBackend, StoreConfig};
pub use kv::PersistentKv;
pub use memory::MemoryKv;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[cfg(feature = "sqlite")]
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("{0}")]
    Invalid(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

impl From<StoreError> for LoaderError {
    fn from(e: StoreError) -> Self {
        LoaderError::cache(e)
    }
}

/// Current UTC time as RFC 3339, used to stamp written records.
pub(crate) fn now_rfc3339() -> String {
    time::OffsetDateTime::now_utc()
        .format(&time::format_description::well_known::Rfc3339)
        .unwrap_or_default()
}
