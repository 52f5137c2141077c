//! Application launcher.
//!
//! `start(address, container)` resolves the application, loads its
//! dependency tree, mounts the entrypoint and then tears down what the
//! previous application left in the container:
//! - script entrypoints are imported and started through `startDApp`
//! - document entrypoints are mounted as an embedded frame and count as
//!   mounted once the frame signals readiness
//!
//! Teardown only runs after the new content is mounted and never removes
//! persistent nodes. Every launch gets an id; a launch replaced by a newer
//! one in the same container drops its mount effect instead of tearing down.

pub mod state;

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use serde_json::Value;
use tokio::sync::oneshot;
use tracing::{debug, info, warn};
use uuid::Uuid;

use dapploader_core::address::dapp_name;
use dapploader_core::model::{ApplicationDescriptor, EntrypointKind};
use dapploader_core::{LoaderError, LoaderResult};

use crate::adapter::{LoadReport, ModuleLoaderAdapter, ModuleRequest};
use crate::bridge::{FrameBridge, OriginAllowList};
use crate::capability::{Container, FrameSpec, NodeRef, StartArgs};
use crate::dev::override_target;

pub use state::{LaunchState, LaunchStatus};

/// Export every script application provides.
pub const START_EXPORT: &str = "startDApp";

/// Outcome of a launch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LaunchReport {
    pub id: Uuid,
    pub address: String,
    pub name: String,
    pub entrypoint: String,
    pub kind: &'static str,
    pub base_url: String,
    pub state: LaunchState,
    pub dependencies: LoadReport,
}

pub struct Launcher {
    adapter: ModuleLoaderAdapter,
    user_context: RwLock<Value>,
    launches: Mutex<HashMap<String, LaunchStatus>>,
    first_launch: AtomicBool,
}

impl Launcher {
    pub fn new(adapter: ModuleLoaderAdapter) -> Self {
        Self {
            adapter,
            user_context: RwLock::new(Value::Null),
            launches: Mutex::new(HashMap::new()),
            first_launch: AtomicBool::new(true),
        }
    }

    pub fn with_user_context(self, context: Value) -> Self {
        *self.user_context.write() = context;
        self
    }

    /// Payload handed to embedded documents that ask for it.
    pub fn set_user_context(&self, context: Value) {
        *self.user_context.write() = context;
    }

    pub fn adapter(&self) -> &ModuleLoaderAdapter {
        &self.adapter
    }

    /// Latest launch in `container`.
    pub fn status(&self, container: &str) -> Option<LaunchStatus> {
        self.launches.lock().get(container).cloned()
    }

    /// Origins an embedded document may receive the user context on.
    pub fn frame_allow_list(&self) -> OriginAllowList {
        let cfg = self.adapter.config();
        let dev_origin = cfg.dev.local_origin.as_deref().filter(|_| cfg.dev.enabled);
        OriginAllowList::new(dev_origin.into_iter().chain([cfg.content_origin.as_str()]))
    }

    /// Base URL the application's files are served under, if it has one.
    pub fn base_url(&self, address: &str, descriptor: &ApplicationDescriptor) -> Option<String> {
        let cfg = self.adapter.config();
        let caps = self.adapter.resolver().capabilities();
        if let Some(name) = override_target(cfg, caps.dev.as_ref(), address) {
            let origin = cfg.dev.local_origin.as_deref()?.trim_end_matches('/');
            return Some(format!("{origin}/external/{name}"));
        }
        let location = descriptor.content_location()?;
        let scheme = if location.is_content_addressed { "ipfs" } else { "ipns" };
        Some(caps.content.url_for(&format!("/{scheme}/{}", location.origin)))
    }

    /// Start the application at `address` in `container`.
    pub async fn start(&self, address: &str, container: &dyn Container) -> LoaderResult<LaunchReport> {
        let address = self.adapter.config().normalize_address(address);
        let id = Uuid::new_v4();
        self.begin(container.id(), id, &address);
        info!(%address, container = container.id(), launch = %id, "starting application");

        match self.run(id, &address, container).await {
            Ok(report) => Ok(report),
            Err(e) => {
                warn!(%address, launch = %id, error = %e, "application launch failed");
                self.advance(container.id(), id, LaunchState::Failed);
                Err(e)
            }
        }
    }

    async fn run(&self, id: Uuid, requested: &str, container: &dyn Container) -> LoaderResult<LaunchReport> {
        let cid = container.id();
        self.advance(cid, id, LaunchState::ResolvingDependencies);

        let (address, descriptor, base_url) = self.locate_app(requested).await?;
        let entrypoint = descriptor
            .entrypoint()
            .ok_or_else(|| LoaderError::NoEntrypoint {
                address: address.clone(),
            })?
            .to_string();
        let kind = match EntrypointKind::of(&entrypoint) {
            Some(kind @ (EntrypointKind::Script | EntrypointKind::Document)) => kind,
            _ => {
                return Err(LoaderError::InvalidEntrypoint {
                    address: address.clone(),
                    entrypoint,
                })
            }
        };

        self.advance(cid, id, LaunchState::Loading);
        let dependencies = self.adapter.load_dependencies(&address).await?;

        self.advance(cid, id, LaunchState::Starting);
        let mut report = LaunchReport {
            id,
            address: address.clone(),
            name: descriptor.name.clone(),
            entrypoint: entrypoint.clone(),
            kind: match kind {
                EntrypointKind::Document => "document",
                _ => "script",
            },
            base_url: base_url.clone(),
            state: LaunchState::Starting,
            dependencies,
        };

        let previous = container.children();
        let mounted = match kind {
            EntrypointKind::Document => {
                if self.superseded(cid, id) {
                    return Ok(self.finish_superseded(cid, report));
                }
                match self.mount_document(&address, &entrypoint, &base_url, container).await {
                    Ok(node) => vec![node],
                    // the newer launch tore this frame down
                    Err(_) if self.superseded(cid, id) => return Ok(self.finish_superseded(cid, report)),
                    Err(e) => return Err(e),
                }
            }
            _ => {
                let module = self.adapter.import(&ModuleRequest::content(address.clone())).await?;
                if self.superseded(cid, id) {
                    return Ok(self.finish_superseded(cid, report));
                }
                let args = StartArgs {
                    container: cid.to_string(),
                    name: descriptor.name.clone(),
                    address: address.clone(),
                    base_url: base_url.clone(),
                };
                let before = container.children();
                self.adapter.modules().invoke_start(&module, START_EXPORT, args).await?;
                added_since(container, &before)
            }
        };

        if self.superseded(cid, id) {
            // only this launch's own nodes; the newer launch owns the rest
            for node in &mounted {
                container.remove_child(node);
            }
            return Ok(self.finish_superseded(cid, report));
        }

        if self.first_launch.swap(false, Ordering::SeqCst) {
            let delay = self.adapter.config().first_launch_teardown_delay();
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
        }
        teardown(container, &previous);

        self.advance(cid, id, LaunchState::Running);
        report.state = LaunchState::Running;
        info!(%address, launch = %id, kind = report.kind, "application running");
        Ok(report)
    }

    /// Resolve the application descriptor and its base URL. An application
    /// without a content origin is re-addressed under the default domain.
    async fn locate_app(&self, address: &str) -> LoaderResult<(String, ApplicationDescriptor, String)> {
        let descriptor = self.adapter.descriptor(address).await?;
        if let Some(base_url) = self.base_url(address, &descriptor) {
            return Ok((address.to_string(), descriptor, base_url));
        }

        let readdressed = self.adapter.config().qualify(&descriptor.name);
        if readdressed == address {
            return Err(LoaderError::load_failure(address, "descriptor has no content origin"));
        }
        debug!(%address, %readdressed, "no content origin, re-addressing application");
        let descriptor = self.adapter.descriptor(&readdressed).await?;
        let base_url = self
            .base_url(&readdressed, &descriptor)
            .ok_or_else(|| LoaderError::load_failure(&readdressed, "descriptor has no content origin"))?;
        Ok((readdressed, descriptor, base_url))
    }

    async fn mount_document(
        &self,
        address: &str,
        entrypoint: &str,
        base_url: &str,
        container: &dyn Container,
    ) -> LoaderResult<String> {
        let src = format!("{base_url}/{}#/{address}", entrypoint.trim_start_matches('/'));
        let channel = container
            .mount_frame(FrameSpec {
                src: src.clone(),
                name: dapp_name(address),
            })
            .await?;

        let node_id = channel.node_id.clone();
        let bridge = FrameBridge::new(self.frame_allow_list(), self.user_context.read().clone());
        let (ready_tx, ready_rx) = oneshot::channel();
        tokio::spawn(bridge.run(channel, ready_tx));

        let wait = self.adapter.config().frame_ready_timeout();
        let failure = match tokio::time::timeout(wait, ready_rx).await {
            Ok(Ok(())) => {
                debug!(%address, %src, "embedded document ready");
                return Ok(node_id);
            }
            Ok(Err(_)) => "embedded document closed before signalling readiness".to_string(),
            Err(_) => format!("embedded document not ready after {}ms", wait.as_millis()),
        };
        container.remove_child(&node_id);
        Err(LoaderError::load_failure(address, failure))
    }

    /// Load the dependency trees of applications that already have a valid
    /// cache entry, without starting them. Returns the addresses preloaded.
    pub async fn preload_cached(&self, addresses: &[String]) -> Vec<String> {
        let mut done = Vec::new();
        for address in addresses {
            let address = self.adapter.config().normalize_address(address);
            if !self.adapter.resolver().has_valid_cache(&address) {
                continue;
            }
            match self.adapter.load_dependencies(&address).await {
                Ok(_) => done.push(address),
                Err(e) => warn!(%address, error = %e, "preloading failed"),
            }
        }
        done
    }

    fn begin(&self, container: &str, id: Uuid, address: &str) {
        let status = LaunchStatus {
            id,
            container: container.to_string(),
            address: address.to_string(),
            state: LaunchState::Idle,
        };
        if let Some(previous) = self.launches.lock().insert(container.to_string(), status) {
            if !previous.state.is_terminal() {
                debug!(container, previous = %previous.id, next = %id, "superseding running launch");
            }
        }
    }

    fn advance(&self, container: &str, id: Uuid, next: LaunchState) {
        let mut launches = self.launches.lock();
        let Some(status) = launches.get_mut(container).filter(|s| s.id == id) else {
            return;
        };
        if status.state.can_advance_to(next) {
            debug!(launch = %id, from = %status.state, to = %next, "launch state");
            status.state = next;
        }
    }

    fn superseded(&self, container: &str, id: Uuid) -> bool {
        self.launches.lock().get(container).map_or(true, |s| s.id != id)
    }

    fn finish_superseded(&self, container: &str, mut report: LaunchReport) -> LaunchReport {
        info!(address = %report.address, launch = %report.id, container, "launch superseded");
        report.state = LaunchState::Superseded;
        report
    }
}

/// Remove every non-persistent node of the previous application.
fn teardown(container: &dyn Container, previous: &[NodeRef]) {
    for node in previous.iter().filter(|n| !n.persistent) {
        container.remove_child(&node.id);
    }
}

/// Non-persistent nodes present now that were not in `before`.
fn added_since(container: &dyn Container, before: &[NodeRef]) -> Vec<String> {
    container
        .children()
        .into_iter()
        .filter(|n| !n.persistent && !before.iter().any(|b| b.id == n.id))
        .map(|n| n.id)
        .collect()
}

#[cfg(all(test, feature = "memory"))]
mod tests {
    use std::sync::Arc;

    use assert_matches::assert_matches;
    use serde_json::json;

    use dapploader_core::config::LoaderConfig;
    use dapploader_store::{DescriptorCache, MemoryKv};

    use super::*;
    use crate::bridge::FrameMessage;
    use crate::capability::{Capabilities, InboundMessage};
    use crate::memory::{
        ContainerEvent, FramePeer, MemoryContentStore, MemoryNameResolver, MemoryStylesheets,
        RecordingModuleSystem, VirtualContainer,
    };
    use crate::resolver::ContentResolver;

    const ORIGIN: &str = "https://ipfs.test.evan.network";

    struct Fixture {
        names: Arc<MemoryNameResolver>,
        content: Arc<MemoryContentStore>,
        modules: Arc<RecordingModuleSystem>,
        launcher: Launcher,
    }

    fn fixture() -> Fixture {
        let names = Arc::new(MemoryNameResolver::new());
        let content = Arc::new(MemoryContentStore::with_origin(ORIGIN));
        let cfg = LoaderConfig {
            cache_refresh_delay_ms: None,
            first_launch_teardown_delay_ms: 0,
            content_origin: ORIGIN.to_string(),
            ..LoaderConfig::default()
        };
        let cache = DescriptorCache::open(Arc::new(MemoryKv::new()), "test").unwrap();
        let resolver = ContentResolver::new(cfg, Capabilities::new(names.clone(), content.clone()), cache);
        let modules = Arc::new(RecordingModuleSystem::new());
        let adapter = ModuleLoaderAdapter::new(resolver, modules.clone(), Arc::new(MemoryStylesheets::new()));
        Fixture {
            names,
            content,
            modules,
            launcher: Launcher::new(adapter),
        }
    }

    async fn peer(container: &VirtualContainer, node_id: &str) -> FramePeer {
        loop {
            if let Some(peer) = container.take_frame_peer(node_id) {
                return peer;
            }
            tokio::task::yield_now().await;
        }
    }

    fn send_ready(peer: &FramePeer) {
        let payload = serde_json::to_string(&FrameMessage::Ready).unwrap();
        peer.inbound
            .send(InboundMessage {
                origin: ORIGIN.to_string(),
                payload,
            })
            .unwrap();
    }

    impl Fixture {
        fn publish(&self, address: &str, hash: &str, entrypoint: &str) {
            self.names.set(address, hash);
            self.content.insert_json(
                hash,
                json!({ "public": { "name": address.split('.').next().unwrap(), "version": "1.0.0",
                    "dapp": { "entrypoint": entrypoint, "origin": format!("{hash}Files") } } }),
            );
            self.content
                .insert(&format!("ipfs/{hash}Files/{entrypoint}"), "export function startDApp() {}");
        }
    }

    #[tokio::test]
    async fn script_launch_starts_and_tears_down() {
        let f = fixture();
        f.publish("app.evan", "QmApp", "app.js");
        let container = VirtualContainer::new("main");
        container.add_node("banner", true);
        container.add_node("old-app", false);

        let report = f.launcher.start("app.evan", &container).await.unwrap();
        assert_eq!(report.state, LaunchState::Running);
        assert_eq!(report.kind, "script");
        assert_eq!(report.base_url, format!("{ORIGIN}/ipfs/QmAppFiles"));

        let starts = f.modules.starts();
        assert_eq!(starts.len(), 1);
        assert_eq!(starts[0].1, START_EXPORT);
        assert_eq!(starts[0].2.container, "main");
        assert_eq!(starts[0].2.address, "app.evan");

        assert_eq!(container.node_ids(), vec!["banner"]);
        assert_eq!(f.launcher.status("main").unwrap().state, LaunchState::Running);
    }

    #[tokio::test]
    async fn document_launch_waits_for_ready_before_teardown() {
        let f = fixture();
        f.publish("page.evan", "QmPage", "index.html");
        let container = VirtualContainer::new("main").with_frame_handshake(ORIGIN);
        container.add_node("old-app", false);

        let report = f.launcher.start("page.evan", &container).await.unwrap();
        assert_eq!(report.kind, "document");

        let events = container.events();
        let mounted = events
            .iter()
            .position(|e| matches!(e, ContainerEvent::FrameMounted { .. }))
            .unwrap();
        let removed = events
            .iter()
            .position(|e| *e == ContainerEvent::Removed("old-app".to_string()))
            .unwrap();
        assert!(mounted < removed);
        assert_matches!(&events[mounted], ContainerEvent::FrameMounted { src, .. }
            if *src == format!("{ORIGIN}/ipfs/QmPageFiles/index.html#/page.evan"));
    }

    #[tokio::test]
    async fn entrypoint_errors_fail_the_launch() {
        let f = fixture();
        f.publish("style.evan", "QmStyle", "main.css");
        f.names.set("empty.evan", "QmEmpty");
        f.content.insert_json(
            "QmEmpty",
            json!({ "name": "empty", "dapp": { "origin": "QmEmptyFiles" } }),
        );
        let container = VirtualContainer::new("main");

        assert_matches!(
            f.launcher.start("style.evan", &container).await,
            Err(LoaderError::InvalidEntrypoint { ref entrypoint, .. }) if entrypoint == "main.css"
        );
        assert_eq!(f.launcher.status("main").unwrap().state, LaunchState::Failed);
        assert_matches!(
            f.launcher.start("empty.evan", &container).await,
            Err(LoaderError::NoEntrypoint { .. })
        );
    }

    #[tokio::test]
    async fn missing_origin_readdresses_under_default_domain() {
        let f = fixture();
        f.publish("tool.evan", "QmTool", "tool.js");
        f.content.insert_json(
            "QmToolPinned",
            json!({ "name": "tool", "dapp": { "entrypoint": "tool.js" } }),
        );

        let report = f.launcher.start("QmToolPinned", &VirtualContainer::new("c")).await.unwrap();
        assert_eq!(report.address, "tool.evan");
        assert_eq!(report.base_url, format!("{ORIGIN}/ipfs/QmToolFiles"));
    }

    #[tokio::test]
    async fn allow_list_has_no_wildcard() {
        let f = fixture();
        assert_eq!(f.launcher.frame_allow_list().origins(), [ORIGIN.to_string()]);
    }

    #[tokio::test]
    async fn late_ready_from_replaced_frame_keeps_the_newer_application() {
        let f = fixture();
        f.publish("slow.evan", "QmSlow", "index.html");
        f.publish("fast.evan", "QmFast", "index.html");
        let container = VirtualContainer::new("main");

        let drive = async {
            let slow = peer(&container, "slow-frame-1").await;
            let newer_ready = async {
                let fast = peer(&container, "fast-frame-2").await;
                send_ready(&fast);
                fast
            };
            let (newer, fast) = tokio::join!(f.launcher.start("fast.evan", &container), newer_ready);
            let newer = newer.unwrap();
            assert_eq!(newer.state, LaunchState::Running);
            assert_eq!(container.node_ids(), vec!["fast-frame-2"]);

            send_ready(&slow);
            (newer, slow, fast)
        };
        let (older, (newer, _slow, _fast)) = tokio::join!(f.launcher.start("slow.evan", &container), drive);

        assert_eq!(older.unwrap().state, LaunchState::Superseded);
        assert_eq!(container.node_ids(), vec!["fast-frame-2"]);
        let status = f.launcher.status("main").unwrap();
        assert_eq!(status.id, newer.id);
        assert_eq!(status.state, LaunchState::Running);
    }

    #[tokio::test(start_paused = true)]
    async fn silent_frame_times_out_and_keeps_the_previous_application() {
        let f = fixture();
        f.publish("mute.evan", "QmMute", "index.html");
        let container = VirtualContainer::new("main");
        container.add_node("old-app", false);

        assert_matches!(
            f.launcher.start("mute.evan", &container).await,
            Err(LoaderError::LoadFailure { ref address, .. }) if address == "mute.evan"
        );
        assert_eq!(f.launcher.status("main").unwrap().state, LaunchState::Failed);
        assert_eq!(container.node_ids(), vec!["old-app"]);
    }
}
