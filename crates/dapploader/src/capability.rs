//! Capabilities consumed by the loader.
//!
//! Everything that touches the network, the local disk, the module system or
//! the page is reached through one of these traits. Concrete implementations
//! live in `dapploader-ens-client` (JSON-RPC name lookups, HTTP gateway),
//! [`crate::dev`] (local development files) and [`crate::memory`] (tests).

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use dapploader_core::model::ApplicationDescriptor;
use dapploader_core::{LoaderError, LoaderResult};

use crate::bridge::FrameMessage;

/// Symbolic name to content hash.
#[async_trait]
pub trait NameResolver: Send + Sync {
    /// `Ok(None)` when the name has no content set.
    async fn resolve_content_hash(&self, address: &str) -> LoaderResult<Option<String>>;
}

/// Content-addressed blob store.
#[async_trait]
pub trait ContentStore: Send + Sync {
    /// Fetch a blob by hash, or by `/ipfs/<hash>/<file>` style path.
    async fn fetch(&self, path: &str) -> LoaderResult<Bytes>;

    /// Public URL of `path`, used for base URLs and embedded documents.
    fn url_for(&self, path: &str) -> String;
}

/// Local development exception list.
pub trait DevOverrideRegistry: Send + Sync {
    fn is_available(&self, name: &str) -> bool;
}

/// Files served by the local development origin.
#[async_trait]
pub trait LocalFileSource: Send + Sync {
    async fn fetch(&self, path: &str) -> LoaderResult<Bytes>;

    fn url_for(&self, path: &str) -> String;
}

/// Descriptor lookup as seen by the tree builder.
#[async_trait]
pub trait DescriptorSource: Send + Sync {
    async fn descriptor(&self, address: &str) -> LoaderResult<ApplicationDescriptor>;
}

/// A translated module ready for evaluation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleSource {
    /// Canonical request id (`address/file!plugin`).
    pub id: String,
    pub format: ModuleFormat,
    pub text: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ModuleFormat {
    Script,
    Json,
    /// Placeholder for side-effect-only requests (stylesheets).
    Empty,
}

/// Arguments passed to a script application's start export.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StartArgs {
    pub container: String,
    pub name: String,
    pub address: String,
    pub base_url: String,
}

/// The host module system.
#[async_trait]
pub trait ModuleSystem: Send + Sync {
    /// Register and execute a translated module.
    async fn evaluate(&self, module: ModuleSource) -> LoaderResult<()>;

    /// Call `export` of an evaluated module.
    async fn invoke_start(&self, module_id: &str, export: &str, args: StartArgs) -> LoaderResult<()>;
}

/// Stylesheets injected into the document head.
pub trait StylesheetSink: Send + Sync {
    fn contains(&self, id: &str) -> bool;

    fn inject(&self, id: &str, href: &str);
}

/// A child node of a container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeRef {
    pub id: String,
    /// Persistent chrome survives teardown.
    pub persistent: bool,
}

/// Embedded document to mount.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameSpec {
    pub src: String,
    pub name: String,
}

/// Message received from an embedded document.
#[derive(Debug, Clone, PartialEq)]
pub struct InboundMessage {
    pub origin: String,
    pub payload: String,
}

/// Message posted to an embedded document.
#[derive(Debug, Clone, PartialEq)]
pub struct OutboundMessage {
    pub target_origin: String,
    pub message: FrameMessage,
}

/// Channel pair of a mounted frame.
#[derive(Debug)]
pub struct FrameChannel {
    pub node_id: String,
    pub inbound: mpsc::UnboundedReceiver<InboundMessage>,
    pub outbound: mpsc::UnboundedSender<OutboundMessage>,
}

/// The element an application is mounted into.
#[async_trait]
pub trait Container: Send + Sync {
    fn id(&self) -> &str;

    fn children(&self) -> Vec<NodeRef>;

    fn remove_child(&self, node_id: &str);

    async fn mount_frame(&self, frame: FrameSpec) -> LoaderResult<FrameChannel>;
}

/// Dev registry that serves nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoDevOverrides;

impl DevOverrideRegistry for NoDevOverrides {
    fn is_available(&self, _name: &str) -> bool {
        false
    }
}

/// Local file source for hosts without a development origin.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoLocalFiles;

#[async_trait]
impl LocalFileSource for NoLocalFiles {
    async fn fetch(&self, path: &str) -> LoaderResult<Bytes> {
        Err(LoaderError::load_failure(path, "no local development source configured"))
    }

    fn url_for(&self, path: &str) -> String {
        path.to_string()
    }
}

/// The network and development capabilities shared by resolver, adapter and
/// launcher.
#[derive(Clone)]
pub struct Capabilities {
    pub names: Arc<dyn NameResolver>,
    pub content: Arc<dyn ContentStore>,
    pub dev: Arc<dyn DevOverrideRegistry>,
    pub local_files: Arc<dyn LocalFileSource>,
}

impl Capabilities {
    pub fn new(names: Arc<dyn NameResolver>, content: Arc<dyn ContentStore>) -> Self {
        Self {
            names,
            content,
            dev: Arc::new(NoDevOverrides),
            local_files: Arc::new(NoLocalFiles),
        }
    }

    pub fn with_dev(mut self, dev: Arc<dyn DevOverrideRegistry>, local_files: Arc<dyn LocalFileSource>) -> Self {
        self.dev = dev;
        self.local_files = local_files;
        self
    }
}
