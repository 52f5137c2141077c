//! Dependency loading: version selection across the tree, wave ordering,
//! idempotence and failure propagation.

mod common;

use std::time::Duration;

use assert_matches::assert_matches;

use dapploader_core::LoaderError;

use common::{position, Harness};

#[tokio::test]
async fn registry_tree_selects_versions_per_edge() {
    let h = Harness::new().with_registry();

    let tree = h.adapter.build_tree("portal.evan").await.unwrap();
    let locations: Vec<Vec<String>> = tree
        .iter()
        .map(|wave| wave.entries.iter().map(|e| e.location.clone()).collect())
        .collect();

    // core ~1.2.0 pins the published hash, ui and its core ^1.0.0 stay on
    // the latest symbolic versions
    let flat: Vec<String> = locations.concat();
    assert!(flat.contains(&"QmCore123".to_string()));
    assert!(flat.contains(&"ui.evan".to_string()));
    assert!(flat.contains(&"core.evan".to_string()));
    assert_eq!(tree.entry_count(), 3);

    // ui's own dependency sits in an earlier wave than ui
    let wave_of = |loc: &str| locations.iter().position(|w| w.iter().any(|l| l == loc)).unwrap();
    assert!(wave_of("core.evan") < wave_of("ui.evan"));

    // the pinned entry carries the latest version history
    let pinned = tree.iter().flat_map(|w| w.entries.iter()).find(|e| e.location == "QmCore123").unwrap();
    assert_eq!(pinned.definition.version, "1.2.3");
    assert!(pinned.definition.versions.contains_key("1.3.0"));
    assert_eq!(pinned.definition.private(), None);
}

#[tokio::test]
async fn dependencies_load_inner_waves_first() {
    let h = Harness::new().with_registry();

    let report = h.adapter.load_dependencies("portal.evan").await.unwrap();
    assert_eq!(report.root, "portal.evan");
    assert_eq!(report.loaded.len(), 3);
    assert!(report.skipped.is_empty());

    let evaluated = h.evaluated();
    assert!(position(&evaluated, "core.evan") < position(&evaluated, "ui.evan"));
    assert!(!evaluated.iter().any(|id| id == "portal.evan"));

    // ui lists a stylesheet, which is linked rather than evaluated as code
    let links = h.styles.links();
    assert_eq!(links.len(), 1);
    assert_eq!(links[0].1, format!("{}/ipfs/QmUiFiles/ui.css", common::ORIGIN));
}

#[tokio::test(start_paused = true)]
async fn slow_inner_dependency_still_loads_before_its_dependant() {
    let h = Harness::new();
    h.publish("r.evan", "QmR", &[("x", "^1.0.0")]);
    h.publish("x.evan", "QmX", &[("y", "^1.0.0")]);
    h.publish("y.evan", "QmY", &[]);
    h.content.delay("ipfs/QmYFiles/y.js", Duration::from_millis(500));

    let report = h.adapter.load_dependencies("r.evan").await.unwrap();
    assert_eq!(report.loaded, vec!["y.evan", "x.evan"]);
    assert_eq!(h.evaluated(), vec!["y.evan", "x.evan"]);
}

#[tokio::test]
async fn loading_twice_fetches_nothing_new() {
    let h = Harness::new().with_registry();

    h.adapter.load_dependencies("portal.evan").await.unwrap();
    let fetches = h.content.total_fetches();
    let lookups = h.names.total_lookups();

    let again = h.adapter.load_dependencies("portal.evan").await.unwrap();
    assert!(again.loaded.is_empty());
    assert_eq!(again.skipped.len(), 3);
    assert_eq!(h.content.total_fetches(), fetches);
    assert_eq!(h.names.total_lookups(), lookups);
    assert!(h.content.repeated_fetches().is_empty());
    assert_eq!(h.modules.evaluated().len(), 3);
}

#[tokio::test]
async fn shared_dependency_loads_once() {
    let h = Harness::new();
    h.publish("root.evan", "QmRoot", &[("left", "^1.0.0"), ("right", "^1.0.0")]);
    h.publish("left.evan", "QmLeft", &[("shared", "^1.0.0")]);
    h.publish("right.evan", "QmRight", &[("shared", "^1.0.0")]);
    h.publish("shared.evan", "QmShared", &[]);

    let report = h.adapter.load_dependencies("root.evan").await.unwrap();
    assert_eq!(report.loaded.iter().filter(|l| *l == "shared.evan").count(), 1);
    assert_eq!(report.skipped, vec!["shared.evan"]);
    assert_eq!(h.content.fetch_count("ipfs/QmSharedFiles/shared.js"), 1);
    assert_eq!(h.names.lookups("shared.evan"), 1);

    let evaluated = h.evaluated();
    assert!(position(&evaluated, "shared.evan") < position(&evaluated, "left.evan"));
    assert!(position(&evaluated, "shared.evan") < position(&evaluated, "right.evan"));
}

#[tokio::test]
async fn dependency_cycle_hits_the_depth_bound() {
    let h = Harness::new();
    h.publish("a.evan", "QmA", &[("b", "^1.0.0")]);
    h.publish("b.evan", "QmB", &[("a", "^1.0.0")]);

    assert_matches!(
        h.adapter.load_dependencies("a.evan").await,
        Err(LoaderError::RecursiveDependency { depth: 20, .. })
    );
    assert!(h.modules.evaluated().is_empty());
}

#[tokio::test]
async fn failed_module_aborts_later_waves() {
    let h = Harness::new().with_registry();
    h.modules.fail_on("core.evan!");

    assert_matches!(
        h.adapter.load_dependencies("portal.evan").await,
        Err(LoaderError::LoadFailure { .. })
    );
    let evaluated = h.evaluated();
    assert!(!evaluated.iter().any(|id| id == "ui.evan" || id == "QmCore123"));
    assert!(!h.adapter.registry().contains("core.evan"));
}

#[tokio::test]
async fn unsatisfiable_range_names_the_dependency() {
    let h = Harness::new();
    h.publish("app.evan", "QmApp", &[("lib", "^2.0.0")]);
    h.publish("lib.evan", "QmLib", &[]);

    assert_matches!(
        h.adapter.load_dependencies("app.evan").await,
        Err(LoaderError::VersionNotFound { name, range }) if name == "lib" && range == "^2.0.0"
    );
}
