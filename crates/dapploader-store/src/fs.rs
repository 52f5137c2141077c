//! Filesystem backend.
//!
//! Each key is stored as `<root>/<sha256(key) hex>.json` holding a small
//! record with the original key, the value and the write timestamp. Writes go
//! through a temporary file and a rename.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use walkdir::WalkDir;

use crate::kv::PersistentKv;
use crate::{now_rfc3339, StoreError, StoreResult};

#[derive(Debug, Serialize, Deserialize)]
struct Record {
    key: String,
    value: String,
    written_at: String,
}

#[derive(Debug, Clone)]
pub struct FsKv {
    root: PathBuf,
}

impl FsKv {
    pub fn open(root: impl Into<PathBuf>) -> StoreResult<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        if !root.is_dir() {
            return Err(StoreError::Invalid(format!(
                "store root is not a directory: {}",
                root.display()
            )));
        }
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &str) -> PathBuf {
        let digest = Sha256::digest(key.as_bytes());
        self.root.join(format!("{}.json", hex::encode(digest)))
    }

    fn read_record(path: &Path) -> StoreResult<Option<Record>> {
        match fs::read(path) {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn records(&self) -> impl Iterator<Item = PathBuf> + '_ {
        WalkDir::new(&self.root)
            .min_depth(1)
            .max_depth(1)
            .into_iter()
            .filter_map(Result::ok)
            .filter(|e| e.file_type().is_file())
            .map(|e| e.into_path())
            .filter(|p| p.extension().is_some_and(|ext| ext == "json"))
    }
}

impl PersistentKv for FsKv {
    fn get(&self, key: &str) -> StoreResult<Option<String>> {
        Ok(Self::read_record(&self.path_for(key))?
            .filter(|r| r.key == key)
            .map(|r| r.value))
    }

    fn set(&self, key: &str, value: &str) -> StoreResult<()> {
        let record = Record {
            key: key.to_string(),
            value: value.to_string(),
            written_at: now_rfc3339(),
        };
        let path = self.path_for(key);
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, serde_json::to_vec(&record)?)?;
        fs::rename(&tmp, &path)?;
        Ok(())
    }

    fn remove(&self, key: &str) -> StoreResult<()> {
        match fs::remove_file(self.path_for(key)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn keys(&self) -> StoreResult<Vec<String>> {
        let mut keys = Vec::new();
        for path in self.records() {
            match Self::read_record(&path) {
                Ok(Some(r)) => keys.push(r.key),
                Ok(None) => {}
                Err(e) => tracing::warn!(path = %path.display(), error = %e, "skipping unreadable cache record"),
            }
        }
        keys.sort();
        Ok(keys)
    }

    fn clear(&self) -> StoreResult<()> {
        let paths: Vec<PathBuf> = self.records().collect();
        for path in paths {
            fs::remove_file(path)?;
        }
        Ok(())
    }
}
