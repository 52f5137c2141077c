//! Application launches into a virtual container: teardown order, the
//! embedded document handshake, superseded launches and preloading.

mod common;

use std::time::Duration;

use assert_matches::assert_matches;
use serde_json::json;
use tokio::sync::mpsc::error::TryRecvError;

use dapploader::bridge::FrameMessage;
use dapploader::capability::InboundMessage;
use dapploader::launcher::START_EXPORT;
use dapploader::memory::{ContainerEvent, VirtualContainer};
use dapploader::LaunchState;
use dapploader_core::LoaderError;

use common::{Harness, ORIGIN};

fn publish_document(h: &Harness, address: &str, hash: &str) {
    let name = address.split('.').next().unwrap();
    h.publish_with(
        address,
        hash,
        json!({ "name": name, "version": "1.0.0",
            "dapp": { "entrypoint": "index.html", "origin": format!("{hash}Files") } }),
    );
}

fn removed_at(events: &[ContainerEvent], node: &str) -> usize {
    events
        .iter()
        .position(|e| *e == ContainerEvent::Removed(node.to_string()))
        .unwrap_or_else(|| panic!("{node} was never removed: {events:?}"))
}

fn mounted_at(events: &[ContainerEvent], node: &str) -> usize {
    events
        .iter()
        .position(|e| matches!(e, ContainerEvent::FrameMounted { node_id, .. } if node_id == node))
        .unwrap_or_else(|| panic!("{node} was never mounted: {events:?}"))
}

fn message(origin: &str, message: &FrameMessage) -> InboundMessage {
    InboundMessage {
        origin: origin.to_string(),
        payload: serde_json::to_string(message).unwrap(),
    }
}

#[tokio::test]
async fn script_application_starts_after_its_dependencies() {
    let h = Harness::new().with_registry();
    let launcher = h.launcher();
    let container = VirtualContainer::new("dapp-wrapper");
    container.add_node("header", true);
    container.add_node("loading-screen", false);

    let report = launcher.start("portal.evan", &container).await.unwrap();
    assert_eq!(report.state, LaunchState::Running);
    assert_eq!(report.name, "portal");
    assert_eq!(report.dependencies.loaded.len(), 3);

    let starts = h.modules.starts();
    assert_eq!(starts.len(), 1);
    let (module, export, args) = &starts[0];
    assert_eq!(module, "portal.evan!dapp-content");
    assert_eq!(export, START_EXPORT);
    assert_eq!(args.container, "dapp-wrapper");
    assert_eq!(args.base_url, format!("{ORIGIN}/ipfs/QmPortalFiles"));

    // the application module is evaluated after everything it depends on
    let evaluated = h.evaluated();
    assert_eq!(evaluated.last().map(String::as_str), Some("portal.evan"));

    assert_eq!(container.node_ids(), vec!["header"]);
}

#[tokio::test]
async fn replacing_a_document_mounts_before_removing() {
    let h = Harness::new();
    publish_document(&h, "docs.evan", "QmDocs");
    publish_document(&h, "wiki.evan", "QmWiki");
    let launcher = h.launcher();
    let container = VirtualContainer::new("main").with_frame_handshake(ORIGIN);
    container.add_node("header", true);

    launcher.start("docs.evan", &container).await.unwrap();
    assert_eq!(container.node_ids(), vec!["header", "docs-frame-1"]);

    launcher.start("wiki.evan", &container).await.unwrap();
    assert_eq!(container.node_ids(), vec!["header", "wiki-frame-2"]);

    let events = container.events();
    assert!(mounted_at(&events, "wiki-frame-2") < removed_at(&events, "docs-frame-1"));
    assert!(!events.contains(&ContainerEvent::Removed("header".to_string())));
}

#[tokio::test]
async fn user_context_goes_only_to_the_allowed_origin() {
    let h = Harness::new();
    publish_document(&h, "docs.evan", "QmDocs");
    let launcher = h.launcher().with_user_context(json!({ "account": "0x0001" }));
    let container = VirtualContainer::new("main");

    let drive = async {
        let mut peer = loop {
            if let Some(peer) = container.take_frame_peer("docs-frame-1") {
                break peer;
            }
            tokio::task::yield_now().await;
        };

        peer.inbound.send(message("https://evil.example", &FrameMessage::RequestUserContext)).unwrap();
        peer.inbound.send(message(ORIGIN, &FrameMessage::RequestUserContext)).unwrap();
        peer.inbound.send(message(ORIGIN, &FrameMessage::RequestUserContext)).unwrap();
        peer.inbound.send(message("https://evil.example", &FrameMessage::Ready)).unwrap();
        peer.inbound.send(message(ORIGIN, &FrameMessage::Ready)).unwrap();

        let reply = peer.outbound.recv().await.unwrap();
        (peer, reply)
    };

    let (report, (mut peer, reply)) = tokio::join!(launcher.start("docs.evan", &container), drive);
    assert_eq!(report.unwrap().kind, "document");

    assert_eq!(reply.target_origin, ORIGIN);
    assert_eq!(
        reply.message,
        FrameMessage::UserContext {
            context: json!({ "account": "0x0001" })
        }
    );
    // delivered once, never to the foreign origin
    assert_matches!(peer.outbound.try_recv(), Err(TryRecvError::Empty));

    assert_matches!(
        container.events().iter().find(|e| matches!(e, ContainerEvent::FrameMounted { .. })),
        Some(ContainerEvent::FrameMounted { src, .. }) if *src == format!("{ORIGIN}/ipfs/QmDocsFiles/index.html#/docs.evan")
    );
}

#[tokio::test(start_paused = true)]
async fn newer_launch_supersedes_a_loading_one() {
    let h = Harness::new();
    h.publish_with(
        "slow.evan",
        "QmSlow",
        json!({ "name": "slow", "version": "1.0.0",
            "dapp": { "entrypoint": "index.html", "origin": "QmSlowFiles", "dependencies": { "heavy": "^1.0.0" } } }),
    );
    h.publish("heavy.evan", "QmHeavy", &[]);
    h.content.delay("ipfs/QmHeavyFiles/heavy.js", Duration::from_secs(2));
    publish_document(&h, "fast.evan", "QmFast");

    let launcher = h.launcher();
    let container = VirtualContainer::new("main").with_frame_handshake(ORIGIN);
    container.add_node("previous-app", false);

    let newer = async {
        while launcher.status("main").map(|s| s.state) != Some(LaunchState::Loading) {
            tokio::task::yield_now().await;
        }
        launcher.start("fast.evan", &container).await
    };
    let (older, newer) = tokio::join!(launcher.start("slow.evan", &container), newer);

    let older = older.unwrap();
    let newer = newer.unwrap();
    assert_eq!(older.state, LaunchState::Superseded);
    assert_eq!(newer.state, LaunchState::Running);

    let status = launcher.status("main").unwrap();
    assert_eq!(status.id, newer.id);
    assert_eq!(status.state, LaunchState::Running);

    // only the newer application is left in the container
    assert_eq!(container.node_ids(), vec!["fast-frame-1"]);
}

#[tokio::test]
async fn failed_launch_leaves_the_container_alone() {
    let h = Harness::new().with_registry();
    h.modules.fail_on("ui.evan!");
    let launcher = h.launcher();
    let container = VirtualContainer::new("main");
    container.add_node("loading-screen", false);

    assert_matches!(
        launcher.start("portal.evan", &container).await,
        Err(LoaderError::LoadFailure { .. })
    );
    assert_eq!(launcher.status("main").unwrap().state, LaunchState::Failed);
    assert_eq!(container.node_ids(), vec!["loading-screen"]);
    assert!(h.modules.starts().is_empty());
}

#[tokio::test]
async fn preload_only_touches_cached_applications() {
    let h = Harness::new().with_registry();
    h.publish("other.evan", "QmOther", &[("core", "^1.0.0")]);
    h.resolver().resolve("portal.evan").await.unwrap();

    let launcher = h.launcher();
    let preloaded = launcher
        .preload_cached(&["portal.evan".to_string(), "other.evan".to_string()])
        .await;
    assert_eq!(preloaded, vec!["portal.evan"]);

    assert_eq!(h.modules.evaluated().len(), 3);
    assert!(h.modules.starts().is_empty());
    assert_eq!(h.names.lookups("other.evan"), 0);
}
