use anyhow::Result;
use serde::Serialize;
use serde_json::Value;

use crate::args::Cli;
use crate::output;

#[derive(Debug, Serialize)]
pub struct ResolveOut {
    pub address: String,
    pub cached: bool,
    pub entrypoint: Option<String>,
    pub descriptor: Value,
}

pub async fn run(cli: &Cli, address: &str, fresh: bool) -> Result<()> {
    let resolver = super::open_resolver(cli)?;
    let address = resolver.config().normalize_address(address);
    let cached = resolver.has_valid_cache(&address);

    let pb = super::spinner(&format!("resolving {address}"));
    let descriptor = if fresh {
        resolver.resolve_uncached(&address).await
    } else {
        resolver.resolve(&address).await
    };
    pb.finish_and_clear();
    let descriptor = descriptor?.into_public();

    output::print(&ResolveOut {
        entrypoint: descriptor.entrypoint().map(str::to_string),
        descriptor: serde_json::from_str(&descriptor.to_public_json()?)?,
        cached: cached && !fresh,
        address,
    })
}
