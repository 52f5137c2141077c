use anyhow::Result;
use serde::Serialize;

use crate::args::{CacheAction, Cli};
use crate::output;

#[derive(Debug, Serialize)]
pub struct ListOut {
    pub build_id: String,
    pub addresses: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct ClearOut {
    pub removed: usize,
}

pub fn run(cli: &Cli, action: &CacheAction) -> Result<()> {
    let cache = super::open_cache(cli)?;
    match action {
        CacheAction::Stats => output::print(&cache.stats()?),
        CacheAction::List => output::print(&ListOut {
            build_id: cache.build_id().to_string(),
            addresses: cache.addresses()?,
        }),
        CacheAction::Clear => {
            let removed = cache.addresses()?.len();
            cache.clear()?;
            output::print(&ClearOut { removed })
        }
    }
}
