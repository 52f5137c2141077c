use anyhow::Result;
use serde::Serialize;

use crate::args::Cli;
use crate::output;

#[derive(Debug, Serialize)]
pub struct TreeEntryOut {
    pub name: String,
    pub version: String,
    pub location: String,
}

#[derive(Debug, Serialize)]
pub struct TreeOut {
    pub root: String,
    pub waves: Vec<Vec<TreeEntryOut>>,
}

pub async fn run(cli: &Cli, address: &str) -> Result<()> {
    let (adapter, _) = super::dry_run_adapter(cli)?;
    let root = adapter.config().normalize_address(address);

    let pb = super::spinner(&format!("building dependency tree of {root}"));
    let tree = adapter.build_tree(&root).await;
    pb.finish_and_clear();
    let tree = tree?;

    let waves = tree
        .iter()
        .filter(|wave| !wave.is_empty())
        .map(|wave| {
            wave.entries
                .iter()
                .map(|e| TreeEntryOut {
                    name: e.name.clone(),
                    version: e.definition.version.clone(),
                    location: e.location.clone(),
                })
                .collect()
        })
        .collect();

    output::print(&TreeOut { root, waves })
}
