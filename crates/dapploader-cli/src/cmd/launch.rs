use anyhow::{anyhow, Result};
use serde::Serialize;
use serde_json::Value;

use dapploader::memory::VirtualContainer;
use dapploader::{LaunchReport, Launcher};

use crate::args::Cli;
use crate::output;

#[derive(Debug, Serialize)]
pub struct LaunchOut {
    #[serde(flatten)]
    pub report: LaunchReport,
    pub starts: Vec<String>,
    pub remaining_nodes: Vec<String>,
}

pub async fn run(cli: &Cli, address: &str, context: Option<&str>) -> Result<()> {
    let (adapter, modules) = super::dry_run_adapter(cli)?;
    let origin = adapter.config().content_origin.clone();

    let context = match context {
        Some(raw) => serde_json::from_str::<Value>(raw).map_err(|e| anyhow!("invalid --context: {e}"))?,
        None => Value::Null,
    };
    let launcher = Launcher::new(adapter).with_user_context(context);

    // Stands in for the page: one node of initial chrome, and embedded
    // documents answer the handshake from the gateway origin.
    let container = VirtualContainer::new("dapp-wrapper").with_frame_handshake(origin);
    container.add_node("loading-screen", false);

    let pb = super::spinner(&format!("launching {address}"));
    let report = launcher.start(address, &container).await;
    pb.finish_and_clear();

    output::print(&LaunchOut {
        report: report?,
        starts: modules.starts().into_iter().map(|(id, export, _)| format!("{id}#{export}")).collect(),
        remaining_nodes: container.node_ids(),
    })
}
