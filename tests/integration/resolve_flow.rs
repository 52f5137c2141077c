//! Content resolution end to end: name lookup, content fetch, envelope
//! parsing and the persistent descriptor cache.

mod common;

use std::sync::Arc;

use assert_matches::assert_matches;
use serde_json::json;

use dapploader_core::LoaderError;
use dapploader_store::{CacheEntry, MemoryKv};

use common::{config, Harness};

fn publish_foo(h: &Harness) {
    h.publish_with(
        "foo.evan",
        "Qmabc",
        json!({ "name": "foo", "version": "2.0.0", "dapp": { "entrypoint": "foo.js", "origin": "QmFooFiles" } }),
    );
}

#[tokio::test]
async fn name_resolves_through_hash_and_is_cached_under_the_name() {
    let h = Harness::new();
    publish_foo(&h);

    let descriptor = h.resolver().resolve("Foo.Evan").await.unwrap();
    assert_eq!(descriptor.name, "foo");
    assert_eq!(descriptor.entrypoint(), Some("foo.js"));
    assert_eq!(h.names.lookups("foo.evan"), 1);
    assert_eq!(h.content.fetch_count("Qmabc"), 1);

    assert_matches!(
        h.resolver().cache().get("foo.evan").unwrap(),
        Some(CacheEntry::Valid(cached)) if cached.name == "foo"
    );

    // served from the cache, no second lookup or fetch
    h.resolver().resolve("foo.evan").await.unwrap();
    assert_eq!(h.names.total_lookups(), 1);
    assert_eq!(h.content.fetch_count("Qmabc"), 1);
}

#[tokio::test]
async fn private_section_never_reaches_the_cache() {
    let h = Harness::new().with_registry();

    let descriptor = h.resolver().resolve("portal.evan").await.unwrap();
    assert_eq!(descriptor.private(), Some(&json!({ "deployKey": "do-not-cache" })));

    let Some(CacheEntry::Valid(cached)) = h.resolver().cache().get("portal.evan").unwrap() else {
        panic!("portal.evan was not cached");
    };
    assert_eq!(cached.private(), None);
    assert!(!cached.to_public_json().unwrap().contains("do-not-cache"));
}

#[tokio::test]
async fn new_build_discards_cached_descriptors() {
    let kv = Arc::new(MemoryKv::new());

    let first = Harness::with(kv.clone(), "B1", config());
    publish_foo(&first);
    first.resolver().resolve("foo.evan").await.unwrap();
    assert_eq!(first.names.lookups("foo.evan"), 1);

    // same build after a restart: the cache answers
    let restarted = Harness::sharing(kv.clone(), "B1", config(), first.names.clone(), first.content.clone());
    assert!(restarted.resolver().has_valid_cache("foo.evan"));
    restarted.resolver().resolve("foo.evan").await.unwrap();
    assert_eq!(first.names.lookups("foo.evan"), 1);

    // a different build starts from an empty cache and looks the name up again
    let upgraded = Harness::sharing(kv, "B2", config(), first.names.clone(), first.content.clone());
    assert!(!upgraded.resolver().has_valid_cache("foo.evan"));
    upgraded.resolver().resolve("foo.evan").await.unwrap();
    assert_eq!(first.names.lookups("foo.evan"), 2);
    assert_eq!(upgraded.resolver().cache().build_id(), "B2");
}

#[tokio::test]
async fn unknown_name_is_remembered_as_invalid_until_published() {
    let h = Harness::new();

    assert_matches!(
        h.resolver().resolve("later.evan").await,
        Err(LoaderError::NotFound { address }) if address == "later.evan"
    );
    assert_eq!(h.resolver().cache().get("later.evan").unwrap(), Some(CacheEntry::Invalid));

    h.publish("later.evan", "QmLater", &[]);
    let descriptor = h.resolver().resolve("later.evan").await.unwrap();
    assert_eq!(descriptor.name, "later");
    assert!(h.resolver().has_valid_cache("later.evan"));
}

#[tokio::test]
async fn content_hash_needs_no_name_lookup() {
    let h = Harness::new().with_registry();

    let descriptor = h.resolver().resolve("QmCore123").await.unwrap();
    assert_eq!(descriptor.version, "1.2.3");
    assert_eq!(h.names.total_lookups(), 0);
    assert!(h.resolver().has_valid_cache("QmCore123"));
}

#[tokio::test]
async fn descriptor_without_dapp_section_is_rejected() {
    let h = Harness::new();
    h.names.set("lib.evan", "QmLib");
    h.content.insert_json("QmLib", json!({ "public": { "name": "lib", "version": "1.0.0" } }));
    h.names.set("broken.evan", "QmBroken");
    h.content.insert("QmBroken", "{ not json");

    assert_matches!(
        h.resolver().resolve("lib.evan").await,
        Err(LoaderError::MissingEntrypoint { .. })
    );
    assert_matches!(
        h.resolver().resolve("broken.evan").await,
        Err(LoaderError::ParseError { .. })
    );
}
