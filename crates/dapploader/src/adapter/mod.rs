//! Module loader adapter.
//!
//! Bridges resolution into the host module system through three hooks:
//! - `locate`: request -> development path, content path, descriptor JSON or
//!   stylesheet
//! - `fetch`: located module -> source text
//! - `translate`: source text -> evaluable module
//!
//! On top of the hooks the adapter owns the session state: the name map
//! (legacy module names -> load locations), the loaded dependency registry,
//! the descriptor memo and the import table that keeps at most one in-flight
//! load per module.

pub mod request;
pub mod session;

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use futures::future::{try_join_all, BoxFuture, FutureExt, Shared};
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use tracing::{debug, info};

use dapploader_core::address::{dev_path, sanitize_element_id};
use dapploader_core::config::LoaderConfig;
use dapploader_core::model::{ApplicationDescriptor, DependencyEntry, DependencyTree, EntrypointKind};
use dapploader_core::{LoaderError, LoaderResult};

use crate::capability::{ModuleFormat, ModuleSource, ModuleSystem, StylesheetSink};
use crate::dev::override_target;
use crate::registry::LoadedDependencyRegistry;
use crate::resolver::ContentResolver;
use crate::tree::build_tree;

pub use request::{ModuleRequest, Plugin};
pub use session::SessionDescriptors;

type SharedLoad = Shared<BoxFuture<'static, LoaderResult<()>>>;

/// Where a module request points.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Located {
    /// Path served by the local development origin.
    DevPath(String),
    /// Path in the content store.
    ContentPath { path: String, url: String },
    /// Descriptor JSON, already serialized.
    Descriptor(String),
    /// Stylesheet injected into the document head.
    Stylesheet { id: String, href: String },
}

/// Summary of a `load_dependencies` run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LoadReport {
    pub root: String,
    pub waves: usize,
    /// Locations loaded by this run.
    pub loaded: Vec<String>,
    /// Locations that were already loaded.
    pub skipped: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LoadOutcome {
    Loaded,
    Skipped,
}

/// The module loader adapter. Cheap to clone; clones share session state.
#[derive(Clone)]
pub struct ModuleLoaderAdapter {
    inner: Arc<Inner>,
}

struct Inner {
    resolver: ContentResolver,
    modules: Arc<dyn ModuleSystem>,
    styles: Arc<dyn StylesheetSink>,
    names: RwLock<BTreeMap<String, String>>,
    loaded: LoadedDependencyRegistry,
    descriptors: SessionDescriptors,
    imports: Mutex<HashMap<String, SharedLoad>>,
}

impl ModuleLoaderAdapter {
    pub fn new(resolver: ContentResolver, modules: Arc<dyn ModuleSystem>, styles: Arc<dyn StylesheetSink>) -> Self {
        let cfg = resolver.config();
        let names = cfg.aliases.clone();
        let loaded = LoadedDependencyRegistry::seeded(cfg.preloaded.iter().map(|l| cfg.normalize_address(l)));
        Self {
            inner: Arc::new(Inner {
                descriptors: SessionDescriptors::new(resolver.clone()),
                resolver,
                modules,
                styles,
                names: RwLock::new(names),
                loaded,
                imports: Mutex::new(HashMap::new()),
            }),
        }
    }

    pub fn config(&self) -> &LoaderConfig {
        self.inner.resolver.config()
    }

    pub fn resolver(&self) -> &ContentResolver {
        &self.inner.resolver
    }

    pub fn registry(&self) -> &LoadedDependencyRegistry {
        &self.inner.loaded
    }

    pub fn modules(&self) -> &Arc<dyn ModuleSystem> {
        &self.inner.modules
    }

    /// Point a module name at a load location.
    pub fn map_name(&self, name: &str, location: &str) {
        self.inner.names.write().insert(name.to_string(), location.to_string());
    }

    pub fn mapped(&self, name: &str) -> Option<String> {
        self.inner.names.read().get(name).cloned()
    }

    /// Session-memoized public descriptor of `address`.
    pub async fn descriptor(&self, address: &str) -> LoaderResult<ApplicationDescriptor> {
        self.inner.descriptors.get(address).await
    }

    pub async fn build_tree(&self, address: &str) -> LoaderResult<DependencyTree> {
        let root = self.descriptor(address).await?;
        build_tree(&self.inner.descriptors, self.config(), &root).await
    }

    /// Load every dependency of `root`, wave by wave.
    ///
    /// Entries of one wave load concurrently; a wave starts only after the
    /// previous one fully settled. The first failure aborts the run.
    pub async fn load_dependencies(&self, root: &str) -> LoaderResult<LoadReport> {
        let root = self.config().normalize_address(root);
        let tree = self.build_tree(&root).await?;

        let mut report = LoadReport {
            root: root.clone(),
            waves: tree.len(),
            ..LoadReport::default()
        };

        for (index, wave) in tree.iter().enumerate() {
            if wave.is_empty() {
                continue;
            }
            debug!(%root, wave = index, entries = wave.len(), "loading wave");
            let outcomes = try_join_all(wave.entries.iter().map(|entry| self.load_entry(entry))).await?;
            for (entry, outcome) in wave.entries.iter().zip(outcomes) {
                match outcome {
                    LoadOutcome::Loaded => report.loaded.push(entry.location.clone()),
                    LoadOutcome::Skipped => report.skipped.push(entry.location.clone()),
                }
            }
        }

        info!(%root, loaded = report.loaded.len(), skipped = report.skipped.len(), "dependencies loaded");
        Ok(report)
    }

    async fn load_entry(&self, entry: &DependencyEntry) -> LoaderResult<LoadOutcome> {
        self.map_name(&entry.name, &entry.location);
        let request = ModuleRequest::content(entry.location.clone());

        if self.inner.loaded.contains(&entry.location) {
            let pending = self.inner.imports.lock().get(&request.id()).cloned();
            if let Some(pending) = pending {
                pending.await?;
            }
            return Ok(LoadOutcome::Skipped);
        }

        self.import(&request).await?;
        if self.inner.loaded.insert(&entry.location) {
            info!(name = %entry.name, location = %entry.location, "dependency loaded");
            Ok(LoadOutcome::Loaded)
        } else {
            Ok(LoadOutcome::Skipped)
        }
    }

    /// Route a bare request through the name map.
    fn route(&self, request: &ModuleRequest) -> ModuleRequest {
        if request.plugin.is_some() {
            return request.clone();
        }
        let address = self.mapped(&request.address).unwrap_or_else(|| request.address.clone());
        ModuleRequest {
            address,
            plugin: Some(Plugin::DappContent),
            ..request.clone()
        }
    }

    /// Import a module, sharing any in-flight load of the same module.
    /// Returns the module id.
    pub async fn import(&self, request: &ModuleRequest) -> LoaderResult<String> {
        let request = self.route(request);
        let id = request.id();

        let pending = {
            let mut imports = self.inner.imports.lock();
            imports
                .entry(id.clone())
                .or_insert_with(|| {
                    let adapter = self.clone();
                    let request = request.clone();
                    async move { adapter.import_uncached(&request).await }.boxed().shared()
                })
                .clone()
        };

        match pending.await {
            Ok(()) => Ok(id),
            Err(e) => {
                self.inner.imports.lock().remove(&id);
                Err(e)
            }
        }
    }

    async fn import_uncached(&self, request: &ModuleRequest) -> LoaderResult<()> {
        let located = self.locate(request).await?;
        let text = self.fetch(&located).await?;
        let module = self.translate(request, &located, text);
        debug!(module = %module.id, format = ?module.format, "evaluating module");
        self.inner.modules.evaluate(module).await
    }

    pub async fn locate(&self, request: &ModuleRequest) -> LoaderResult<Located> {
        let request = self.route(request);
        let descriptor = self.descriptor(&request.address).await?;

        if request.plugin == Some(Plugin::Ens) {
            return Ok(Located::Descriptor(descriptor.to_public_json()?));
        }

        let file = requested_file(&descriptor, request.file.as_deref()).ok_or_else(|| LoaderError::NoEntrypoint {
            address: request.address.clone(),
        })?;
        self.side_load_styles(&request.address, &descriptor, &file)?;

        let located = self.file_location(&request.address, &descriptor, &file)?;
        if EntrypointKind::of(&file) == Some(EntrypointKind::Stylesheet) {
            return Ok(Located::Stylesheet {
                id: sanitize_element_id(&format!("{}/{}", request.address, file)),
                href: self.href(&located),
            });
        }
        Ok(located)
    }

    pub async fn fetch(&self, located: &Located) -> LoaderResult<String> {
        let caps = self.inner.resolver.capabilities();
        let (origin, bytes) = match located {
            Located::DevPath(path) => (path, caps.local_files.fetch(path).await?),
            Located::ContentPath { path, .. } => (path, caps.content.fetch(path).await?),
            Located::Descriptor(json) => return Ok(json.clone()),
            Located::Stylesheet { id, href } => {
                self.inject_stylesheet(id, href);
                return Ok(String::new());
            }
        };
        String::from_utf8(bytes.to_vec()).map_err(|e| LoaderError::load_failure(origin, e))
    }

    pub fn translate(&self, request: &ModuleRequest, located: &Located, text: String) -> ModuleSource {
        let id = request.id();
        let is_json = match located {
            Located::Descriptor(_) => true,
            Located::DevPath(path) | Located::ContentPath { path, .. } => path.to_ascii_lowercase().ends_with(".json"),
            Located::Stylesheet { .. } => {
                return ModuleSource {
                    id,
                    format: ModuleFormat::Empty,
                    text: String::new(),
                }
            }
        };

        if is_json {
            ModuleSource {
                id,
                format: ModuleFormat::Json,
                text: format!("module.exports = {text};"),
            }
        } else {
            ModuleSource {
                id,
                format: ModuleFormat::Script,
                text,
            }
        }
    }

    /// Location of `file` of the application at `address`.
    fn file_location(&self, address: &str, descriptor: &ApplicationDescriptor, file: &str) -> LoaderResult<Located> {
        let cfg = self.config();
        let caps = self.inner.resolver.capabilities();
        if let Some(name) = override_target(cfg, caps.dev.as_ref(), address) {
            return Ok(Located::DevPath(dev_path(&name, file)));
        }

        let location = descriptor
            .content_location()
            .ok_or_else(|| LoaderError::load_failure(address, "descriptor has no content origin"))?;
        let scheme = if location.is_content_addressed { "ipfs" } else { "ipns" };
        let path = format!("/{scheme}/{}/{}", location.origin, file.trim_start_matches('/'));
        Ok(Located::ContentPath {
            url: caps.content.url_for(&path),
            path,
        })
    }

    fn href(&self, located: &Located) -> String {
        match located {
            Located::DevPath(path) => self.inner.resolver.capabilities().local_files.url_for(path),
            Located::ContentPath { url, .. } => url.clone(),
            Located::Descriptor(_) => String::new(),
            Located::Stylesheet { href, .. } => href.clone(),
        }
    }

    fn side_load_styles(&self, address: &str, descriptor: &ApplicationDescriptor, requested: &str) -> LoaderResult<()> {
        for file in descriptor.files() {
            if file == requested || EntrypointKind::of(file) != Some(EntrypointKind::Stylesheet) {
                continue;
            }
            let located = self.file_location(address, descriptor, file)?;
            let id = sanitize_element_id(&format!("{address}/{file}"));
            self.inject_stylesheet(&id, &self.href(&located));
        }
        Ok(())
    }

    fn inject_stylesheet(&self, id: &str, href: &str) {
        if self.inner.styles.contains(id) {
            return;
        }
        debug!(%id, %href, "injecting stylesheet");
        self.inner.styles.inject(id, href);
    }
}

/// The file a content request loads: a listed file when requested, the
/// entrypoint otherwise.
pub fn requested_file(descriptor: &ApplicationDescriptor, requested: Option<&str>) -> Option<String> {
    if let Some(file) = requested.map(|f| f.trim_start_matches('/')) {
        if descriptor.files().iter().any(|f| f.trim_start_matches('/') == file) {
            return Some(file.to_string());
        }
    }
    descriptor.entrypoint().map(str::to_string)
}
