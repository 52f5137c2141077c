//! Dependency trees.
//!
//! A tree is an ordered list of waves. Loading walks the waves front to back:
//! every entry of a wave is loaded before any entry of the next one starts, so
//! the innermost dependencies sit at the front.

use serde::Serialize;

use super::descriptor::ApplicationDescriptor;

/// One resolved dependency edge.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DependencyEntry {
    /// Declared dependency name (the import name).
    pub name: String,
    /// Descriptor of the version that will be loaded, carrying the latest
    /// version history.
    pub definition: ApplicationDescriptor,
    /// Load location: a content hash or a symbolic address.
    pub location: String,
}

/// Entries discovered at the same recursion step.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Wave {
    pub entries: Vec<DependencyEntry>,
}

impl Wave {
    pub fn new(entries: Vec<DependencyEntry>) -> Self {
        Self { entries }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct DependencyTree {
    pub waves: Vec<Wave>,
}

impl DependencyTree {
    /// A tree holding a single (possibly empty) wave.
    pub fn single(wave: Wave) -> Self {
        Self { waves: vec![wave] }
    }

    /// Concatenate subtrees in order, then append `last`.
    pub fn concat(parts: impl IntoIterator<Item = DependencyTree>, last: Wave) -> Self {
        let mut waves: Vec<Wave> = parts.into_iter().flat_map(|t| t.waves).collect();
        waves.push(last);
        Self { waves }
    }

    pub fn len(&self) -> usize {
        self.waves.len()
    }

    pub fn is_empty(&self) -> bool {
        self.waves.iter().all(Wave::is_empty)
    }

    /// Number of entries across all waves (duplicates included).
    pub fn entry_count(&self) -> usize {
        self.waves.iter().map(Wave::len).sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Wave> {
        self.waves.iter()
    }

    /// Index of the first wave that contains `name`.
    pub fn position_of(&self, name: &str) -> Option<usize> {
        self.waves
            .iter()
            .position(|w| w.entries.iter().any(|e| e.name == name))
    }
}
