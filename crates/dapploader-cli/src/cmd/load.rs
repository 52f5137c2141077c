use anyhow::Result;
use serde::Serialize;

use dapploader::LoadReport;

use crate::args::Cli;
use crate::output;

#[derive(Debug, Serialize)]
pub struct LoadOut {
    #[serde(flatten)]
    pub report: LoadReport,
    pub modules: Vec<String>,
}

pub async fn run(cli: &Cli, address: &str) -> Result<()> {
    let (adapter, modules) = super::dry_run_adapter(cli)?;
    let root = adapter.config().normalize_address(address);

    let pb = super::spinner(&format!("loading dependencies of {root}"));
    let report = adapter.load_dependencies(&root).await;
    pb.finish_and_clear();

    output::print(&LoadOut {
        report: report?,
        modules: modules.evaluated_ids(),
    })
}
