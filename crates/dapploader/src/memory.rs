//! In-memory capability implementations.
//!
//! Used by the test suites and by hosts that want to drive the loader
//! without a network (dry runs, fixtures). Every implementation records what
//! it was asked for so tests can assert on fetch and lookup counts.

use std::collections::{BTreeSet, HashMap};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use tokio::sync::mpsc;

use dapploader_core::{LoaderError, LoaderResult};

use crate::capability::{
    Container, ContentStore, DevOverrideRegistry, FrameChannel, FrameSpec, InboundMessage, LocalFileSource,
    ModuleSource, ModuleSystem, NameResolver, NodeRef, OutboundMessage, StartArgs, StylesheetSink,
};
use crate::bridge::FrameMessage;

fn key(path: &str) -> String {
    path.trim_start_matches('/').to_string()
}

#[derive(Debug, Clone)]
enum NameRecord {
    Hash(String),
    Hang,
}

/// Name resolver backed by a map.
#[derive(Debug, Default)]
pub struct MemoryNameResolver {
    records: Mutex<HashMap<String, NameRecord>>,
    lookups: Mutex<HashMap<String, usize>>,
}

impl MemoryNameResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, name: &str, hash: &str) {
        self.records.lock().insert(name.to_string(), NameRecord::Hash(hash.to_string()));
    }

    /// Make lookups of `name` never complete.
    pub fn hang(&self, name: &str) {
        self.records.lock().insert(name.to_string(), NameRecord::Hang);
    }

    pub fn lookups(&self, name: &str) -> usize {
        self.lookups.lock().get(name).copied().unwrap_or(0)
    }

    pub fn total_lookups(&self) -> usize {
        self.lookups.lock().values().sum()
    }
}

#[async_trait]
impl NameResolver for MemoryNameResolver {
    async fn resolve_content_hash(&self, address: &str) -> LoaderResult<Option<String>> {
        *self.lookups.lock().entry(address.to_string()).or_default() += 1;
        let record = self.records.lock().get(address).cloned();
        match record {
            Some(NameRecord::Hash(hash)) => Ok(Some(hash)),
            Some(NameRecord::Hang) => std::future::pending().await,
            None => Ok(None),
        }
    }
}

/// Content store backed by a map, with per-path fetch counters and optional
/// artificial latency.
#[derive(Debug)]
pub struct MemoryContentStore {
    origin: String,
    blobs: Mutex<HashMap<String, Bytes>>,
    delays: Mutex<HashMap<String, Duration>>,
    fetches: Mutex<HashMap<String, usize>>,
}

impl Default for MemoryContentStore {
    fn default() -> Self {
        Self::with_origin("https://ipfs.test.evan.network")
    }
}

impl MemoryContentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_origin(origin: impl Into<String>) -> Self {
        Self {
            origin: origin.into().trim_end_matches('/').to_string(),
            blobs: Mutex::new(HashMap::new()),
            delays: Mutex::new(HashMap::new()),
            fetches: Mutex::new(HashMap::new()),
        }
    }

    pub fn insert(&self, path: &str, bytes: impl Into<Bytes>) {
        self.blobs.lock().insert(key(path), bytes.into());
    }

    pub fn insert_json(&self, path: &str, value: serde_json::Value) {
        self.insert(path, value.to_string());
    }

    /// Delay every fetch of `path`.
    pub fn delay(&self, path: &str, delay: Duration) {
        self.delays.lock().insert(key(path), delay);
    }

    pub fn fetch_count(&self, path: &str) -> usize {
        self.fetches.lock().get(&key(path)).copied().unwrap_or(0)
    }

    pub fn total_fetches(&self) -> usize {
        self.fetches.lock().values().sum()
    }

    /// Paths fetched more than once.
    pub fn repeated_fetches(&self) -> Vec<String> {
        let mut out: Vec<String> = self
            .fetches
            .lock()
            .iter()
            .filter(|(_, n)| **n > 1)
            .map(|(p, _)| p.clone())
            .collect();
        out.sort();
        out
    }
}

#[async_trait]
impl ContentStore for MemoryContentStore {
    async fn fetch(&self, path: &str) -> LoaderResult<Bytes> {
        let path = key(path);
        *self.fetches.lock().entry(path.clone()).or_default() += 1;
        let delay = self.delays.lock().get(&path).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        let blob = self.blobs.lock().get(&path).cloned();
        blob.ok_or_else(|| LoaderError::not_found(path))
    }

    fn url_for(&self, path: &str) -> String {
        format!("{}/{}", self.origin, key(path))
    }
}

/// Local development files backed by a map.
#[derive(Debug)]
pub struct MemoryFiles {
    origin: String,
    files: Mutex<HashMap<String, Bytes>>,
    fetches: Mutex<HashMap<String, usize>>,
}

impl MemoryFiles {
    pub fn new(origin: impl Into<String>) -> Self {
        Self {
            origin: origin.into().trim_end_matches('/').to_string(),
            files: Mutex::new(HashMap::new()),
            fetches: Mutex::new(HashMap::new()),
        }
    }

    pub fn insert(&self, path: &str, bytes: impl Into<Bytes>) {
        self.files.lock().insert(key(path), bytes.into());
    }

    pub fn fetch_count(&self, path: &str) -> usize {
        self.fetches.lock().get(&key(path)).copied().unwrap_or(0)
    }
}

#[async_trait]
impl LocalFileSource for MemoryFiles {
    async fn fetch(&self, path: &str) -> LoaderResult<Bytes> {
        let path = key(path);
        *self.fetches.lock().entry(path.clone()).or_default() += 1;
        let file = self.files.lock().get(&path).cloned();
        file.ok_or_else(|| LoaderError::not_found(path))
    }

    fn url_for(&self, path: &str) -> String {
        format!("{}/{}", self.origin, key(path))
    }
}

/// Fixed set of locally served application names.
#[derive(Debug, Clone, Default)]
pub struct StaticDevRegistry {
    names: BTreeSet<String>,
}

impl StaticDevRegistry {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            names: names.into_iter().map(Into::into).collect(),
        }
    }
}

impl DevOverrideRegistry for StaticDevRegistry {
    fn is_available(&self, name: &str) -> bool {
        self.names.contains(name)
    }
}

/// Records injected stylesheets in order.
#[derive(Debug, Default)]
pub struct MemoryStylesheets {
    links: Mutex<Vec<(String, String)>>,
}

impl MemoryStylesheets {
    pub fn new() -> Self {
        Self::default()
    }

    /// `(id, href)` pairs in injection order.
    pub fn links(&self) -> Vec<(String, String)> {
        self.links.lock().clone()
    }
}

impl StylesheetSink for MemoryStylesheets {
    fn contains(&self, id: &str) -> bool {
        self.links.lock().iter().any(|(existing, _)| existing == id)
    }

    fn inject(&self, id: &str, href: &str) {
        self.links.lock().push((id.to_string(), href.to_string()));
    }
}

/// Module system that records evaluations and start calls.
#[derive(Debug, Default)]
pub struct RecordingModuleSystem {
    evaluated: Mutex<Vec<ModuleSource>>,
    starts: Mutex<Vec<(String, String, StartArgs)>>,
    failing: Mutex<BTreeSet<String>>,
}

impl RecordingModuleSystem {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail evaluation of modules whose id contains `pattern`.
    pub fn fail_on(&self, pattern: &str) {
        self.failing.lock().insert(pattern.to_string());
    }

    pub fn evaluated(&self) -> Vec<ModuleSource> {
        self.evaluated.lock().clone()
    }

    pub fn evaluated_ids(&self) -> Vec<String> {
        self.evaluated.lock().iter().map(|m| m.id.clone()).collect()
    }

    /// `(module id, export, args)` per start call.
    pub fn starts(&self) -> Vec<(String, String, StartArgs)> {
        self.starts.lock().clone()
    }
}

#[async_trait]
impl ModuleSystem for RecordingModuleSystem {
    async fn evaluate(&self, module: ModuleSource) -> LoaderResult<()> {
        let failing = self.failing.lock().iter().any(|p| module.id.contains(p.as_str()));
        if failing {
            return Err(LoaderError::load_failure(&module.id, "module evaluation failed"));
        }
        self.evaluated.lock().push(module);
        Ok(())
    }

    async fn invoke_start(&self, module_id: &str, export: &str, args: StartArgs) -> LoaderResult<()> {
        let known = self.evaluated.lock().iter().any(|m| m.id == module_id);
        if !known {
            return Err(LoaderError::load_failure(module_id, "module was never evaluated"));
        }
        self.starts.lock().push((module_id.to_string(), export.to_string(), args));
        Ok(())
    }
}

/// Something that happened to a [`VirtualContainer`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContainerEvent {
    Added(String),
    FrameMounted { node_id: String, src: String },
    Removed(String),
}

/// Test-side ends of a mounted frame.
#[derive(Debug)]
pub struct FramePeer {
    pub inbound: mpsc::UnboundedSender<InboundMessage>,
    pub outbound: mpsc::UnboundedReceiver<OutboundMessage>,
}

#[derive(Debug, Default)]
struct ContainerState {
    nodes: Vec<NodeRef>,
    events: Vec<ContainerEvent>,
    peers: HashMap<String, FramePeer>,
    mounted: usize,
}

/// A container that keeps its children in memory.
#[derive(Debug)]
pub struct VirtualContainer {
    id: String,
    handshake_origin: Option<String>,
    state: Mutex<ContainerState>,
}

impl VirtualContainer {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            handshake_origin: None,
            state: Mutex::new(ContainerState::default()),
        }
    }

    /// Mounted frames immediately request the user context and signal
    /// readiness from `origin`.
    pub fn with_frame_handshake(mut self, origin: impl Into<String>) -> Self {
        self.handshake_origin = Some(origin.into());
        self
    }

    pub fn add_node(&self, id: &str, persistent: bool) {
        let mut state = self.state.lock();
        state.nodes.push(NodeRef {
            id: id.to_string(),
            persistent,
        });
        state.events.push(ContainerEvent::Added(id.to_string()));
    }

    pub fn node_ids(&self) -> Vec<String> {
        self.state.lock().nodes.iter().map(|n| n.id.clone()).collect()
    }

    pub fn events(&self) -> Vec<ContainerEvent> {
        self.state.lock().events.clone()
    }

    /// Take the test-side channel ends of a mounted frame.
    pub fn take_frame_peer(&self, node_id: &str) -> Option<FramePeer> {
        self.state.lock().peers.remove(node_id)
    }
}

#[async_trait]
impl Container for VirtualContainer {
    fn id(&self) -> &str {
        &self.id
    }

    fn children(&self) -> Vec<NodeRef> {
        self.state.lock().nodes.clone()
    }

    fn remove_child(&self, node_id: &str) {
        let mut state = self.state.lock();
        let before = state.nodes.len();
        state.nodes.retain(|n| n.id != node_id);
        if state.nodes.len() != before {
            state.events.push(ContainerEvent::Removed(node_id.to_string()));
        }
    }

    async fn mount_frame(&self, frame: FrameSpec) -> LoaderResult<FrameChannel> {
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();

        if let Some(origin) = &self.handshake_origin {
            for message in [FrameMessage::RequestUserContext, FrameMessage::Ready] {
                let payload = serde_json::to_string(&message)
                    .map_err(|e| LoaderError::load_failure(&frame.src, e))?;
                // the receiver is alive until the channel is returned
                let _ = inbound_tx.send(InboundMessage {
                    origin: origin.clone(),
                    payload,
                });
            }
        }

        let mut state = self.state.lock();
        state.mounted += 1;
        let node_id = format!("{}-frame-{}", frame.name, state.mounted);
        state.nodes.push(NodeRef {
            id: node_id.clone(),
            persistent: false,
        });
        state.events.push(ContainerEvent::FrameMounted {
            node_id: node_id.clone(),
            src: frame.src,
        });
        state.peers.insert(
            node_id.clone(),
            FramePeer {
                inbound: inbound_tx,
                outbound: outbound_rx,
            },
        );

        Ok(FrameChannel {
            node_id,
            inbound: inbound_rx,
            outbound: outbound_tx,
        })
    }
}
