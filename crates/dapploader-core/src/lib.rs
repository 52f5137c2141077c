//! dapploader-core
//!
//! Core primitives for dapploader:
//! - application descriptor model (public/private envelope)
//! - version parsing and range matching
//! - dependency tree (waves) model
//! - address helpers (content hashes, domains, dev paths)
//! - configuration and the error taxonomy

pub mod address;
pub mod config;
pub mod errors;
pub mod model;
pub mod version;

pub use crate::errors::{LoaderError, LoaderResult};

/// Module request plugin suffixes.
pub mod plugin {
    /// Descriptor resolution (`foo.evan!ens`).
    pub const ENS: &str = "ens";
    /// Application content (`foo.evan!dapp-content`).
    pub const DAPP_CONTENT: &str = "dapp-content";
}

/// Convenience re-exports.
pub mod prelude {
    pub use crate::config::{validate_config, DevConfig, LoaderConfig};
    pub use crate::model::{
        parse_envelope, ApplicationDescriptor, ContentLocation, DependencyEntry, DependencyTree,
        EntrypointKind, Wave,
    };
    pub use crate::version::{select_version, MatchContext, SemverTriple, VersionLocation, VersionMatch, VersionRange};
    pub use crate::{LoaderError, LoaderResult};
}
