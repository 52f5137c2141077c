//! dapploader data models.
//!
//! - [`descriptor`]: the application manifest and its public/private envelope
//! - [`tree`]: resolved dependency edges grouped into loading waves
//!
//! Models are mostly data. Resolution policy lives in the `dapploader` crate.

pub mod descriptor;
pub mod tree;

pub use descriptor::{
    parse_envelope, ApplicationDescriptor, ContentLocation, DappSection, EntrypointKind,
    DEFAULT_MAX_DESCRIPTOR_BYTES,
};
pub use tree::{DependencyEntry, DependencyTree, Wave};
