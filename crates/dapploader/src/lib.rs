//! dapploader
//!
//! Runtime side of the loader:
//! - content resolution (names, content hashes, descriptor cache, dev override)
//! - dependency tree construction
//! - the module loader adapter (locate/fetch/translate, in-flight dedup)
//! - the application launcher and the embedded document bridge
//!
//! The network, the page and the module system are reached through the
//! traits in [`capability`]. [`memory`] provides in-process implementations.

pub mod adapter;
pub mod bridge;
pub mod capability;
pub mod dev;
pub mod launcher;
pub mod registry;
pub mod resolver;
pub mod tree;

#[cfg(feature = "memory")]
pub mod memory;

pub use adapter::{LoadReport, ModuleLoaderAdapter, ModuleRequest};
pub use capability::Capabilities;
pub use launcher::{LaunchReport, LaunchState, Launcher};
pub use registry::LoadedDependencyRegistry;
pub use resolver::ContentResolver;

/// Convenience re-exports.
pub mod prelude {
    pub use crate::adapter::{LoadReport, Located, ModuleLoaderAdapter, ModuleRequest, Plugin};
    pub use crate::bridge::{FrameBridge, FrameMessage, OriginAllowList};
    pub use crate::capability::{
        Capabilities, Container, ContentStore, DescriptorSource, DevOverrideRegistry, LocalFileSource,
        ModuleSource, ModuleSystem, NameResolver, NodeRef, StylesheetSink,
    };
    pub use crate::launcher::{LaunchReport, LaunchState, Launcher};
    pub use crate::resolver::ContentResolver;
    pub use crate::tree::build_tree;
    pub use dapploader_core::prelude::*;
}
