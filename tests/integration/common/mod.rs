//! Shared harness for the integration tests: an in-memory name registry,
//! content store and module system wired into a loader.

#![allow(dead_code)]

use std::sync::Arc;

use serde_json::{json, Value};

use dapploader::memory::{MemoryContentStore, MemoryNameResolver, MemoryStylesheets, RecordingModuleSystem};
use dapploader::{Capabilities, ContentResolver, Launcher, ModuleLoaderAdapter};
use dapploader_core::config::LoaderConfig;
use dapploader_store::{DescriptorCache, MemoryKv, PersistentKv};

pub const ORIGIN: &str = "https://ipfs.test.evan.network";

const REGISTRY: &str = include_str!("../../fixtures/registry.json");

pub fn config() -> LoaderConfig {
    LoaderConfig {
        cache_refresh_delay_ms: None,
        first_launch_teardown_delay_ms: 0,
        content_origin: ORIGIN.to_string(),
        ..LoaderConfig::default()
    }
}

pub struct Harness {
    pub kv: Arc<MemoryKv>,
    pub names: Arc<MemoryNameResolver>,
    pub content: Arc<MemoryContentStore>,
    pub modules: Arc<RecordingModuleSystem>,
    pub styles: Arc<MemoryStylesheets>,
    pub adapter: ModuleLoaderAdapter,
}

impl Harness {
    pub fn new() -> Self {
        Self::with(Arc::new(MemoryKv::new()), "build-1", config())
    }

    /// Harness over an existing key-value store, so tests can simulate a
    /// restart or a new build.
    pub fn with(kv: Arc<MemoryKv>, build_id: &str, cfg: LoaderConfig) -> Self {
        Self::sharing(
            kv,
            build_id,
            cfg,
            Arc::new(MemoryNameResolver::new()),
            Arc::new(MemoryContentStore::with_origin(ORIGIN)),
        )
    }

    pub fn sharing(
        kv: Arc<MemoryKv>,
        build_id: &str,
        cfg: LoaderConfig,
        names: Arc<MemoryNameResolver>,
        content: Arc<MemoryContentStore>,
    ) -> Self {
        let store: Arc<dyn PersistentKv> = kv.clone();
        let cache = DescriptorCache::open(store, build_id).unwrap();
        let resolver = ContentResolver::new(cfg, Capabilities::new(names.clone(), content.clone()), cache);
        let modules = Arc::new(RecordingModuleSystem::new());
        let styles = Arc::new(MemoryStylesheets::new());
        let adapter = ModuleLoaderAdapter::new(resolver, modules.clone(), styles.clone());
        Self {
            kv,
            names,
            content,
            modules,
            styles,
            adapter,
        }
    }

    pub fn resolver(&self) -> &ContentResolver {
        self.adapter.resolver()
    }

    pub fn launcher(&self) -> Launcher {
        Launcher::new(self.adapter.clone())
    }

    /// Publish the fixture registry.
    pub fn with_registry(self) -> Self {
        let registry: Value = serde_json::from_str(REGISTRY).unwrap();
        for (name, hash) in registry["names"].as_object().unwrap() {
            self.names.set(name, hash.as_str().unwrap());
        }
        for (hash, envelope) in registry["descriptors"].as_object().unwrap() {
            self.content.insert_json(hash, envelope.clone());
        }
        for (path, text) in registry["files"].as_object().unwrap() {
            self.content.insert(path, text.as_str().unwrap().to_string());
        }
        self
    }

    /// Publish `address` (`<name>.evan`) under `hash` with a single script
    /// entrypoint `<name>.js`. The current version is the only one.
    pub fn publish(&self, address: &str, hash: &str, deps: &[(&str, &str)]) {
        let name = address.split('.').next().unwrap();
        self.publish_with(address, hash, json!({
            "name": name,
            "version": "1.0.0",
            "dapp": {
                "entrypoint": format!("{name}.js"),
                "origin": format!("{hash}Files"),
                "dependencies": deps.iter().map(|(n, r)| (n.to_string(), json!(r))).collect::<serde_json::Map<_, _>>(),
            }
        }));
    }

    pub fn publish_with(&self, address: &str, hash: &str, public: Value) {
        let name = public["name"].as_str().unwrap().to_string();
        let entrypoint = public["dapp"]["entrypoint"].as_str().map(str::to_string);
        let origin = public["dapp"]["origin"].as_str().map(str::to_string);

        self.names.set(address, hash);
        self.content.insert_json(hash, json!({ "public": public }));
        if let (Some(entrypoint), Some(origin)) = (entrypoint, origin) {
            self.content
                .insert(&format!("ipfs/{origin}/{entrypoint}"), format!("export const {name} = true;"));
        }
    }

    /// Module ids in evaluation order, without the plugin suffix.
    pub fn evaluated(&self) -> Vec<String> {
        self.modules
            .evaluated_ids()
            .into_iter()
            .map(|id| id.split('!').next().unwrap_or_default().to_string())
            .collect()
    }
}

pub fn position(list: &[String], item: &str) -> usize {
    list.iter()
        .position(|x| x == item)
        .unwrap_or_else(|| panic!("{item} missing from {list:?}"))
}
