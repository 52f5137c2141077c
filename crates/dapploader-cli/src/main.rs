use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

mod args;
mod cmd;
mod output;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = args::Cli::parse();
    output::init(cli.json);
    init_tracing(cli.verbose, cli.json);

    cmd::dispatch(cli).await
}

fn init_tracing(verbose: u8, json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(match verbose {
            0 => "warn",
            1 => "dapploader=info,warn",
            2 => "dapploader=debug,info",
            _ => "trace",
        })
    });

    // logs go to stderr so stdout stays machine-readable
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(verbose > 1);

    let _ = if json { builder.json().try_init() } else { builder.try_init() };
}
