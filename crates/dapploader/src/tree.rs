//! Dependency tree builder.
//!
//! For every declared dependency the latest published descriptor is resolved
//! first, since its version history decides which version gets loaded. A
//! version pinned to a content hash is then resolved on its own and inherits
//! the latest history, so nested resolution always sees every published
//! version.
//!
//! Siblings resolve concurrently. The result of each call is a fresh wave
//! list: the subtrees of the direct dependencies in declaration order,
//! followed by the wave of the direct dependencies themselves.

use futures::future::{try_join_all, BoxFuture, FutureExt};
use tracing::{debug, warn};

use dapploader_core::address::strip_separators;
use dapploader_core::config::LoaderConfig;
use dapploader_core::model::{ApplicationDescriptor, DependencyEntry, DependencyTree, Wave};
use dapploader_core::version::{select_version, MatchContext, SemverTriple, VersionLocation};
use dapploader_core::{LoaderError, LoaderResult};

use crate::capability::DescriptorSource;

/// Build the dependency tree of `root`.
pub async fn build_tree(
    source: &dyn DescriptorSource,
    cfg: &LoaderConfig,
    root: &ApplicationDescriptor,
) -> LoaderResult<DependencyTree> {
    subtree(source, cfg, root.clone(), 0).await
}

fn subtree<'a>(
    source: &'a dyn DescriptorSource,
    cfg: &'a LoaderConfig,
    descriptor: ApplicationDescriptor,
    depth: usize,
) -> BoxFuture<'a, LoaderResult<DependencyTree>> {
    async move {
        if depth >= cfg.max_depth {
            return Err(LoaderError::RecursiveDependency {
                name: descriptor.name.clone(),
                depth,
            });
        }

        let deps = descriptor.dependencies();
        if deps.is_empty() {
            return Ok(DependencyTree::single(Wave::default()));
        }
        debug!(name = %descriptor.name, depth, count = deps.len(), "resolving dependencies");

        let branches = try_join_all(deps.iter().map(|(name, range)| async move {
            let entry = resolve_edge(source, cfg, name, range).await?;
            let nested = subtree(source, cfg, entry.definition.clone(), depth + 1).await?;
            Ok::<_, LoaderError>((entry, nested))
        }))
        .await?;

        let (entries, nested): (Vec<_>, Vec<_>) = branches.into_iter().unzip();
        Ok(DependencyTree::concat(nested, Wave::new(entries)))
    }
    .boxed()
}

/// Resolve one dependency edge to the entry that will be loaded.
pub async fn resolve_edge(
    source: &dyn DescriptorSource,
    cfg: &LoaderConfig,
    name: &str,
    range: &str,
) -> LoaderResult<DependencyEntry> {
    let latest_address = cfg.qualify(name);
    let mut latest = source.descriptor(&latest_address).await?;
    latest.ensure_current_version(&strip_separators(name));
    for key in latest.versions.keys().filter(|k| SemverTriple::parse(k).is_err()) {
        warn!(%name, version = %key, "skipping unparsable published version");
    }

    let chosen = select_version(
        range,
        &latest.versions,
        MatchContext {
            name,
            domain: &cfg.domain,
            hash_prefix: &cfg.content_hash_prefix,
        },
    )?;
    debug!(%name, %range, version = %chosen.version, location = chosen.location.as_str(), "version selected");

    let (definition, location) = match chosen.location {
        VersionLocation::ContentHash(hash) => {
            let mut pinned = source.descriptor(&hash).await?;
            pinned.versions = latest.versions.clone();
            (pinned, hash)
        }
        // `angular-core.evan` and `angularcore.evan` name the same application
        VersionLocation::Symbolic(address) if strip_separators(&address) == strip_separators(&latest_address) => {
            (latest, latest_address)
        }
        VersionLocation::Symbolic(address) => {
            let mut other = source.descriptor(&address).await?;
            other.versions = latest.versions.clone();
            (other, address)
        }
    };

    Ok(DependencyEntry {
        name: name.to_string(),
        definition: definition.into_public(),
        location,
    })
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use assert_matches::assert_matches;
    use async_trait::async_trait;

    use super::*;

    /// Descriptors keyed by address.
    #[derive(Default)]
    struct Fixed(HashMap<String, ApplicationDescriptor>);

    impl Fixed {
        fn with(mut self, address: &str, d: ApplicationDescriptor) -> Self {
            self.0.insert(address.to_string(), d);
            self
        }
    }

    #[async_trait]
    impl DescriptorSource for Fixed {
        async fn descriptor(&self, address: &str) -> LoaderResult<ApplicationDescriptor> {
            self.0.get(address).cloned().ok_or_else(|| LoaderError::not_found(address))
        }
    }

    fn app(name: &str) -> ApplicationDescriptor {
        ApplicationDescriptor::new(name, "1.0.0").with_entrypoint("index.js")
    }

    #[tokio::test]
    async fn leaf_has_single_empty_wave() {
        let tree = build_tree(&Fixed::default(), &LoaderConfig::default(), &app("r")).await.unwrap();
        assert_eq!(tree.len(), 1);
        assert!(tree.is_empty());
    }

    #[tokio::test]
    async fn inner_dependencies_come_first() {
        let source = Fixed::default()
            .with("x.evan", app("x").with_dependency("y", "^1.0.0"))
            .with("y.evan", app("y"));
        let root = app("r").with_dependency("x", "^1.0.0");

        let tree = build_tree(&source, &LoaderConfig::default(), &root).await.unwrap();
        assert_eq!(tree.len(), 3);
        assert_eq!(tree.position_of("y"), Some(1));
        assert_eq!(tree.position_of("x"), Some(2));
        assert_eq!(tree.waves[2].entries[0].location, "x.evan");
    }

    #[tokio::test]
    async fn pinned_hash_inherits_latest_history() {
        let latest = ApplicationDescriptor::new("lib", "2.0.0")
            .with_entrypoint("index.js")
            .with_version("1.0.0", "QmLibOne");
        let old = ApplicationDescriptor::new("lib", "1.0.0").with_entrypoint("old.js");
        let source = Fixed::default().with("lib.evan", latest).with("QmLibOne", old);
        let root = app("r").with_dependency("lib", "~1.0.0");

        let tree = build_tree(&source, &LoaderConfig::default(), &root).await.unwrap();
        let entry = &tree.waves.last().unwrap().entries[0];
        assert_eq!(entry.location, "QmLibOne");
        assert_eq!(entry.definition.entrypoint(), Some("old.js"));
        assert_eq!(entry.definition.versions.get("2.0.0").map(String::as_str), Some("lib"));
        assert_eq!(entry.definition.versions.get("1.0.0").map(String::as_str), Some("QmLibOne"));
    }

    #[tokio::test]
    async fn cycle_is_fatal() {
        let source = Fixed::default()
            .with("a.evan", app("a").with_dependency("b", "^1.0.0"))
            .with("b.evan", app("b").with_dependency("a", "^1.0.0"));
        let root = app("a").with_dependency("b", "^1.0.0");

        let err = build_tree(&source, &LoaderConfig::default(), &root).await.unwrap_err();
        assert_matches!(err, LoaderError::RecursiveDependency { depth: 20, .. });
    }

    #[tokio::test]
    async fn unmatched_range_names_the_dependency() {
        let source = Fixed::default().with("lib.evan", app("lib"));
        let root = app("r").with_dependency("lib", "3.0.0");
        let err = build_tree(&source, &LoaderConfig::default(), &root).await.unwrap_err();
        assert_matches!(err, LoaderError::VersionNotFound { ref name, ref range } if name == "lib" && range == "3.0.0");
    }

    #[tokio::test]
    async fn hyphenated_dependency_keeps_its_published_address() {
        let source = Fixed::default().with("angular-core.evan", app("angular-core"));
        let root = app("r").with_dependency("angular-core", "^1.0.0");

        let tree = build_tree(&source, &LoaderConfig::default(), &root).await.unwrap();
        let entry = &tree.waves.last().unwrap().entries[0];
        assert_eq!(entry.name, "angular-core");
        assert_eq!(entry.location, "angular-core.evan");
        assert_eq!(entry.definition.name, "angular-core");
    }
}
