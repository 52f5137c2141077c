//! Version parsing and matching.
//!
//! Versions are three numeric slots. Ranges come in three forms:
//! - exact: `1.2.3`
//! - `~1.2.3`: patch is a wildcard (same major and minor, patch >= 3)
//! - `^1.2.3`: minor and patch are wildcards (same major, minor.patch >= 2.3)
//!
//! Missing slots are zero-filled, extra slots are dropped.
//!
//! Matching is not full semver range intersection. Non-wildcard slots must be
//! equal, wildcard slots widen the match, and among all matches the highest
//! value wins, comparing wildcard slots left to right.

use std::collections::BTreeMap;
use std::fmt;

use crate::address::is_content_hash_with;
use crate::errors::{LoaderError, LoaderResult};

/// A normalized three-slot version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct SemverTriple(pub [u64; 3]);

impl SemverTriple {
    pub fn new(major: u64, minor: u64, patch: u64) -> Self {
        Self([major, minor, patch])
    }

    /// Parse a version string. A leading `~`/`^` is ignored.
    ///
    /// Each slot takes its leading digits (`3-beta` reads as `3`); a slot with
    /// no leading digit is an error.
    pub fn parse(s: &str) -> LoaderResult<Self> {
        let body = s.trim().trim_start_matches(['~', '^']);
        if body.is_empty() {
            return Err(LoaderError::InvalidVersion {
                value: s.to_string(),
                reason: "empty version".to_string(),
            });
        }

        let mut slots = [0u64; 3];
        for (i, part) in body.split('.').take(3).enumerate() {
            let digits: String = part.chars().take_while(|c| c.is_ascii_digit()).collect();
            slots[i] = digits.parse().map_err(|_| LoaderError::InvalidVersion {
                value: s.to_string(),
                reason: format!("slot {i} is not numeric: {part:?}"),
            })?;
        }
        Ok(Self(slots))
    }

    pub fn major(&self) -> u64 {
        self.0[0]
    }

    pub fn minor(&self) -> u64 {
        self.0[1]
    }

    pub fn patch(&self) -> u64 {
        self.0[2]
    }

    /// Compare a single slot.
    pub fn compare_slot(&self, other: &Self, slot: usize) -> std::cmp::Ordering {
        self.0[slot].cmp(&other.0[slot])
    }
}

impl fmt::Display for SemverTriple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.0[0], self.0[1], self.0[2])
    }
}

/// Range operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeKind {
    Exact,
    /// `~`: patch wildcard.
    Tilde,
    /// `^`: minor and patch wildcards.
    Caret,
}

impl RangeKind {
    /// Index of the first wildcard slot, if any.
    pub fn first_wildcard(&self) -> Option<usize> {
        match self {
            Self::Exact => None,
            Self::Tilde => Some(2),
            Self::Caret => Some(1),
        }
    }
}

/// A required-version expression attached to a dependency edge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionRange {
    pub raw: String,
    pub kind: RangeKind,
    pub base: SemverTriple,
}

impl VersionRange {
    pub fn parse(s: &str) -> LoaderResult<Self> {
        let t = s.trim();
        let kind = if t.starts_with('~') {
            RangeKind::Tilde
        } else if t.starts_with('^') {
            RangeKind::Caret
        } else {
            RangeKind::Exact
        };
        Ok(Self {
            raw: t.to_string(),
            kind,
            base: SemverTriple::parse(t)?,
        })
    }

    /// Whether `slot` is a wildcard in this range.
    pub fn is_wildcard(&self, slot: usize) -> bool {
        self.kind.first_wildcard().is_some_and(|w| slot >= w)
    }

    /// Fixed slots must be equal; wildcard slots, read left to right, must not
    /// fall below the requested floor.
    pub fn matches_range(&self, candidate: &SemverTriple) -> bool {
        let split = self.kind.first_wildcard().unwrap_or(3);
        if candidate.0[..split] != self.base.0[..split] {
            return false;
        }
        candidate.0[split..] >= self.base.0[split..]
    }
}

impl fmt::Display for VersionRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// Where a selected version lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VersionLocation {
    /// Immutable artifact, load it directly.
    ContentHash(String),
    /// Symbolic address that goes back through the content resolver.
    Symbolic(String),
}

impl VersionLocation {
    pub fn as_str(&self) -> &str {
        match self {
            Self::ContentHash(s) | Self::Symbolic(s) => s,
        }
    }

    pub fn is_content_hash(&self) -> bool {
        matches!(self, Self::ContentHash(_))
    }
}

/// Result of matching a range against a version history.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionMatch {
    /// The version key as published.
    pub version: String,
    pub triple: SemverTriple,
    pub location: VersionLocation,
}

/// Inputs for [`select_version`].
#[derive(Debug, Clone, Copy)]
pub struct MatchContext<'a> {
    /// Declared dependency name, used in errors.
    pub name: &'a str,
    /// Default domain appended to bare symbolic locations.
    pub domain: &'a str,
    /// Content hash prefix.
    pub hash_prefix: &'a str,
}

/// Select the concrete version to load for `range` out of `versions`.
///
/// Keys that do not parse as versions are skipped. Ties between keys that
/// normalize to the same triple keep the first key in map order.
pub fn select_version(
    range: &str,
    versions: &BTreeMap<String, String>,
    ctx: MatchContext<'_>,
) -> LoaderResult<VersionMatch> {
    let wanted = VersionRange::parse(range)?;

    let mut best: Option<(SemverTriple, &String, &String)> = None;
    for (key, location) in versions {
        let Ok(candidate) = SemverTriple::parse(key) else {
            continue;
        };
        if !wanted.matches_range(&candidate) {
            continue;
        }
        let better = match &best {
            None => true,
            Some((current, _, _)) => candidate > *current,
        };
        if better {
            best = Some((candidate, key, location));
        }
    }

    let Some((triple, key, location)) = best else {
        return Err(LoaderError::VersionNotFound {
            name: ctx.name.to_string(),
            range: wanted.raw,
        });
    };

    let location = if is_content_hash_with(location, ctx.hash_prefix) {
        VersionLocation::ContentHash(location.clone())
    } else if location.contains('.') || ctx.domain.is_empty() {
        VersionLocation::Symbolic(location.clone())
    } else {
        VersionLocation::Symbolic(format!("{location}.{}", ctx.domain))
    };

    Ok(VersionMatch {
        version: key.clone(),
        triple,
        location,
    })
}
