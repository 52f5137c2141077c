//! Loaded dependency registry.
//!
//! The set of load locations whose modules are already registered with the
//! module system in this session. Locations are content hashes or
//! version-pinned addresses, so an entry stays valid for the session and is
//! never removed.
//!
//! Requirements:
//! - stable ordering for listing
//! - no global mutable state: one registry per adapter

use std::collections::BTreeSet;

use parking_lot::RwLock;

#[derive(Debug, Default)]
pub struct LoadedDependencyRegistry {
    locations: RwLock<BTreeSet<String>>,
}

impl LoadedDependencyRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry seeded with locations the host already provides.
    pub fn seeded<I, S>(locations: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            locations: RwLock::new(locations.into_iter().map(Into::into).collect()),
        }
    }

    pub fn len(&self) -> usize {
        self.locations.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.locations.read().is_empty()
    }

    pub fn contains(&self, location: &str) -> bool {
        self.locations.read().contains(location)
    }

    /// Record `location` as loaded. Returns false if it already was.
    pub fn insert(&self, location: &str) -> bool {
        self.locations.write().insert(location.to_string())
    }

    /// Loaded locations in deterministic order.
    pub fn list(&self) -> Vec<String> {
        self.locations.read().iter().cloned().collect()
    }
}
