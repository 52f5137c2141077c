use anyhow::{bail, Result};
use serde::Serialize;

use dapploader_ens_client::{EnsClient, GatewayStore, DEFAULT_RESOLVER, DEFAULT_RPC_URL};

use crate::args::Cli;
use crate::output;

#[derive(Debug, Serialize)]
pub struct Check {
    pub name: String,
    pub ok: bool,
    pub detail: String,
}

#[derive(Debug, Serialize)]
pub struct DoctorOut {
    pub ok: bool,
    pub checks: Vec<Check>,
}

impl Check {
    fn new(name: &str, result: Result<String, String>) -> Self {
        let (ok, detail) = match result {
            Ok(detail) => (true, detail),
            Err(detail) => (false, detail),
        };
        output::status(ok, &format!("{name}: {detail}"));
        Self {
            name: name.to_string(),
            ok,
            detail,
        }
    }
}

pub async fn run(cli: &Cli) -> Result<()> {
    let mut checks = Vec::new();

    let cfg = super::loader_config(cli);
    checks.push(Check::new(
        "config",
        cfg.as_ref()
            .map(|c| format!("domain {}, max depth {}", c.domain, c.max_depth))
            .map_err(|e| e.to_string()),
    ));

    checks.push(Check::new(
        "store",
        super::open_cache(cli)
            .and_then(|cache| Ok(cache.stats()?))
            .map(|s| format!("{} entries ({}) under build {}", s.entries, s.size, s.build_id))
            .map_err(|e| e.to_string()),
    ));

    let rpc_url = cli.rpc_url.as_deref().unwrap_or(DEFAULT_RPC_URL);
    let resolver = cli.resolver.as_deref().unwrap_or(DEFAULT_RESOLVER);
    let domain = cfg.as_ref().map(|c| c.domain.clone()).unwrap_or_default();
    let rpc = match EnsClient::new(rpc_url, resolver) {
        Ok(client) => client
            .lookup(&domain)
            .await
            .map(|hash| format!("{rpc_url} answered for `{domain}` ({})", hash.as_deref().unwrap_or("unset")))
            .map_err(|e| e.to_string()),
        Err(e) => Err(e.to_string()),
    };
    checks.push(Check::new("rpc", rpc));

    if let Ok(cfg) = &cfg {
        let gateway = match GatewayStore::new(&cfg.content_origin) {
            Ok(store) => store
                .probe("/")
                .await
                .map(|status| format!("{} answered {status}", store.base()))
                .map_err(|e| e.to_string()),
            Err(e) => Err(e.to_string()),
        };
        checks.push(Check::new("gateway", gateway));

        if cfg.dev.enabled {
            let detail = match &cfg.dev.local_origin {
                Some(origin) => Ok(format!("{} externals served from {origin}", cfg.dev.externals.len())),
                None => Err("dev mode enabled without a local origin".to_string()),
            };
            checks.push(Check::new("dev", detail));
        }
    }

    let ok = checks.iter().all(|c| c.ok);
    let verdict = verdict(&checks);
    if output::is_json() {
        output::print(&DoctorOut { ok, checks })?;
    }
    verdict
}

/// Fails when any check failed, so the exit status reflects the result.
fn verdict(checks: &[Check]) -> Result<()> {
    let failed: Vec<&str> = checks.iter().filter(|c| !c.ok).map(|c| c.name.as_str()).collect();
    if !failed.is_empty() {
        bail!("{} of {} checks failed: {}", failed.len(), checks.len(), failed.join(", "));
    }
    Ok(())
}
