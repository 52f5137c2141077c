use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::debug;
use url::Url;

use dapploader::dev::ExternalsList;
use dapploader::memory::{MemoryStylesheets, RecordingModuleSystem};
use dapploader::{Capabilities, ContentResolver, ModuleLoaderAdapter};
use dapploader_core::config::{validate_config, LoaderConfig};
use dapploader_ens_client::{DevServerFiles, EnsClient, GatewayStore, DEFAULT_RESOLVER, DEFAULT_RPC_URL};
use dapploader_store::{open_kv, DescriptorCache, StoreConfig};

use crate::args::{Cli, Command};
use crate::output;

mod cache;
mod doctor;
mod launch;
mod load;
mod resolve;
mod tree;
mod versions;

pub async fn dispatch(cli: Cli) -> Result<()> {
    match &cli.command {
        Command::Resolve { address, fresh } => resolve::run(&cli, address, *fresh).await,
        Command::Tree { address } => tree::run(&cli, address).await,
        Command::Versions { address, range } => versions::run(&cli, address, range).await,
        Command::Load { address } => load::run(&cli, address).await,
        Command::Launch { address, context } => launch::run(&cli, address, context.as_deref()).await,
        Command::Cache { action } => cache::run(&cli, action),
        Command::Doctor => doctor::run(&cli).await,
    }
}

/// Loader configuration from `--config` with flag overrides applied.
pub fn loader_config(cli: &Cli) -> Result<LoaderConfig> {
    let mut cfg = match &cli.config {
        Some(path) => {
            let raw = fs::read_to_string(path).with_context(|| format!("reading {path}"))?;
            serde_json::from_str::<LoaderConfig>(&raw).map_err(|e| anyhow!("invalid config {path}: {e}"))?
        }
        None => LoaderConfig::default(),
    };
    if let Some(domain) = &cli.domain {
        cfg.domain = domain.clone();
    }
    if let Some(gateway) = &cli.gateway {
        let url = Url::parse(gateway).with_context(|| format!("invalid gateway {gateway}"))?;
        cfg.content_origin = url.as_str().trim_end_matches('/').to_string();
    }
    validate_config(&cfg)?;
    debug!(domain = %cfg.domain, origin = %cfg.content_origin, file = ?cli.config, "loader config");
    Ok(cfg)
}

pub fn build_id(cli: &Cli) -> String {
    cli.build_id
        .clone()
        .unwrap_or_else(|| format!("dapploader-cli-{}", env!("CARGO_PKG_VERSION")))
}

pub fn open_cache(cli: &Cli) -> Result<DescriptorCache> {
    let store_cfg = StoreConfig::local_dev(PathBuf::from(&cli.store_root))?;
    let kv = open_kv(&store_cfg)?;
    debug!(root = %cli.store_root, build = %build_id(cli), "opening descriptor cache");
    Ok(DescriptorCache::open(kv, build_id(cli))?)
}

/// Network capabilities for `cfg`, with the dev override wired when enabled.
pub fn capabilities(cli: &Cli, cfg: &LoaderConfig) -> Result<Capabilities> {
    let rpc_url = cli.rpc_url.as_deref().unwrap_or(DEFAULT_RPC_URL);
    let resolver = cli.resolver.as_deref().unwrap_or(DEFAULT_RESOLVER);

    let names = EnsClient::new(rpc_url, resolver)?;
    let content = GatewayStore::new(&cfg.content_origin)?;
    let caps = Capabilities::new(Arc::new(names), Arc::new(content));

    match (&cfg.dev.enabled, &cfg.dev.local_origin) {
        (true, Some(origin)) => {
            let files = DevServerFiles::new(origin)?;
            Ok(caps.with_dev(Arc::new(ExternalsList::from_config(&cfg.dev)), Arc::new(files)))
        }
        _ => Ok(caps),
    }
}

pub fn open_resolver(cli: &Cli) -> Result<ContentResolver> {
    let cfg = loader_config(cli)?;
    let caps = capabilities(cli, &cfg)?;
    let cache = open_cache(cli)?;
    Ok(ContentResolver::new(cfg, caps, cache))
}

/// Adapter over a recording module system: sources are fetched and
/// translated but never executed.
pub fn dry_run_adapter(cli: &Cli) -> Result<(ModuleLoaderAdapter, Arc<RecordingModuleSystem>)> {
    let resolver = open_resolver(cli)?;
    let modules = Arc::new(RecordingModuleSystem::new());
    let adapter = ModuleLoaderAdapter::new(resolver, modules.clone(), Arc::new(MemoryStylesheets::new()));
    Ok((adapter, modules))
}

pub fn spinner(msg: &str) -> ProgressBar {
    if output::is_json() {
        return ProgressBar::hidden();
    }
    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::with_template("{spinner} {msg}") {
        pb.set_style(style);
    }
    pb.enable_steady_tick(std::time::Duration::from_millis(80));
    pb.set_message(msg.to_string());
    pb
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::*;

    #[test]
    fn flags_override_the_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("loader.json");
        fs::write(&path, r#"{ "domain": "test", "max_depth": 5 }"#).unwrap();

        let cli = Cli::parse_from([
            "dapploader",
            "--config",
            path.to_str().unwrap(),
            "--gateway",
            "https://gw.example/",
            "doctor",
        ]);
        let cfg = loader_config(&cli).unwrap();
        assert_eq!(cfg.domain, "test");
        assert_eq!(cfg.content_origin, "https://gw.example");

        let cli = Cli::parse_from(["dapploader", "--config", path.to_str().unwrap(), "--domain", "evan", "doctor"]);
        assert_eq!(loader_config(&cli).unwrap().domain, "evan");
    }

    #[test]
    fn malformed_gateway_is_rejected() {
        let cli = Cli::parse_from(["dapploader", "--gateway", "not a url", "doctor"]);
        let err = loader_config(&cli).unwrap_err();
        assert!(err.to_string().contains("invalid gateway"));
    }

    #[test]
    fn cache_opens_under_the_store_root() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("store");
        let cli = Cli::parse_from(["dapploader", "--store-root", root.to_str().unwrap(), "--build-id", "b1", "cache", "stats"]);
        let cache = open_cache(&cli).unwrap();
        assert_eq!(cache.build_id(), "b1");
        assert!(cache.addresses().unwrap().is_empty());
    }
}
