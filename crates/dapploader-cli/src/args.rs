use clap::{ArgAction, Parser, Subcommand};

#[derive(Parser, Debug, Clone)]
#[command(name = "dapploader", version, about = "Resolve, inspect and dry-run decentralized applications")]
pub struct Cli {
    /// Emit JSON output on stdout.
    #[arg(long, global = true)]
    pub json: bool,

    /// Store root directory (default: .dapploader)
    #[arg(long, global = true, default_value = ".dapploader")]
    pub store_root: String,

    /// Loader configuration file (JSON). Flags below override it.
    #[arg(long, global = true)]
    pub config: Option<String>,

    /// JSON-RPC endpoint used for name lookups.
    #[arg(long, global = true, env = "DAPPLOADER_RPC_URL")]
    pub rpc_url: Option<String>,

    /// Content gateway base URL.
    #[arg(long, global = true, env = "DAPPLOADER_GATEWAY")]
    pub gateway: Option<String>,

    /// Resolver contract address.
    #[arg(long, global = true)]
    pub resolver: Option<String>,

    /// Build identifier the descriptor cache is bound to.
    #[arg(long, global = true)]
    pub build_id: Option<String>,

    /// Root domain appended to bare names.
    #[arg(long, global = true)]
    pub domain: Option<String>,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace).
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Resolve an address to its public descriptor.
    Resolve {
        address: String,

        /// Skip the descriptor cache.
        #[arg(long)]
        fresh: bool,
    },

    /// Print the dependency waves of an application.
    Tree { address: String },

    /// Select the version a range resolves to.
    Versions {
        address: String,

        /// Version range, e.g. `^1.2.0` or `1.x`.
        #[arg(long)]
        range: String,
    },

    /// Dry-run the dependency load of an application.
    Load { address: String },

    /// Dry-run a full application launch into a virtual container.
    Launch {
        address: String,

        /// User context handed to embedded documents (JSON).
        #[arg(long)]
        context: Option<String>,
    },

    /// Inspect or clear the descriptor cache.
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },

    /// Run environment checks.
    Doctor,
}

#[derive(Subcommand, Debug, Clone)]
pub enum CacheAction {
    /// Entry counts and on-disk size.
    Stats,
    /// Cached addresses.
    List,
    /// Drop every entry.
    Clear,
}
