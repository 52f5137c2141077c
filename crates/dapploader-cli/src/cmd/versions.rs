use anyhow::Result;
use serde::Serialize;

use dapploader_core::address::strip_separators;
use dapploader_core::version::{select_version, MatchContext};

use crate::args::Cli;
use crate::output;

#[derive(Debug, Serialize)]
pub struct VersionsOut {
    pub address: String,
    pub range: String,
    pub version: String,
    pub location: String,
    pub content_addressed: bool,
    pub available: Vec<String>,
}

pub async fn run(cli: &Cli, address: &str, range: &str) -> Result<()> {
    let resolver = super::open_resolver(cli)?;
    let cfg = resolver.config().clone();
    let address = cfg.qualify(address);

    let mut latest = resolver.resolve(&address).await?;
    latest.ensure_current_version(&strip_separators(&address));

    let selected = select_version(
        range,
        &latest.versions,
        MatchContext {
            name: &address,
            domain: &cfg.domain,
            hash_prefix: &cfg.content_hash_prefix,
        },
    )?;

    output::print(&VersionsOut {
        range: range.to_string(),
        version: selected.version,
        location: selected.location.as_str().to_string(),
        content_addressed: selected.location.is_content_hash(),
        available: latest.versions.keys().cloned().collect(),
        address,
    })
}
