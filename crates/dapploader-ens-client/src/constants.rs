//! Constants shared by the name and content clients.
//!
//! Keep these stable: they are part of the on-chain call layout.

use std::time::Duration;

/// Default JSON-RPC endpoint.
pub const DEFAULT_RPC_URL: &str = "https://testcore.evan.network";

/// Default resolver contract the content lookup is sent to.
pub const DEFAULT_RESOLVER: &str = "0xDC18774FA2E472D26aB91deCC4CDd20D9E82047e";

/// Default content gateway.
pub const DEFAULT_GATEWAY: &str = "https://ipfs.test.evan.network";

/// 4-byte selector of the resolver's content lookup, hex without `0x`.
pub const CONTENT_SELECTOR: &str = "2dff6941";

/// Multihash header of a sha2-256 digest (code 0x12, length 32).
pub const MULTIHASH_SHA256: [u8; 2] = [0x12, 0x20];

/// Request timeout applied to every HTTP call.
pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(10);

/// Version string sent as user agent suffix.
pub const CLIENT_VERSION: &str = "v1";
