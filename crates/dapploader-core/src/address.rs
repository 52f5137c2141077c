//! Address helpers.
//!
//! Three kinds of addresses flow through the loader:
//! - symbolic addresses (`dashboard.vue.evan`), resolved through the name layer
//! - content hashes (`Qm…`), fetched directly from the content store
//! - contract addresses (`0x…`), symbolic but exempt from dev overrides and
//!   default-domain handling
//!
//! All helpers here are pure string functions.

use path_clean::PathClean;
use std::path::PathBuf;

/// Default prefix that marks a content hash.
pub const CONTENT_HASH_PREFIX: &str = "Qm";

/// Directory under which locally served development applications live.
pub const DEV_ROOT: &str = "dapps";

/// File name of a locally served descriptor.
pub const DEV_DESCRIPTOR_FILE: &str = "dbcp.json";

/// Returns true if `address` starts with the given content hash prefix.
pub fn is_content_hash_with(address: &str, prefix: &str) -> bool {
    !prefix.is_empty() && address.starts_with(prefix)
}

/// Returns true if `address` is a content hash under the default prefix.
pub fn is_content_hash(address: &str) -> bool {
    is_content_hash_with(address, CONTENT_HASH_PREFIX)
}

/// Returns true for contract addresses (`0x…`).
pub fn is_contract_address(address: &str) -> bool {
    address.starts_with("0x")
}

/// Normalize an incoming address.
///
/// Symbolic names are case-insensitive and get lowercased. Content hashes are
/// case-sensitive and are only trimmed.
pub fn normalize_address(address: &str, hash_prefix: &str) -> String {
    let trimmed = address.trim().trim_start_matches('/');
    if is_content_hash_with(trimmed, hash_prefix) {
        trimmed.to_string()
    } else {
        trimmed.to_ascii_lowercase()
    }
}

/// Remove separator characters from a name (`angular-core` -> `angularcore`).
pub fn strip_separators(name: &str) -> String {
    name.replace('-', "")
}

/// Application name of an address: separators removed, last label dropped.
///
/// `angular-core.evan` -> `angularcore`, `dashboard.vue.evan` -> `dashboard.vue`.
/// A single-label address is returned without separators.
pub fn dapp_name(address: &str) -> String {
    let stripped = strip_separators(address);
    match stripped.rfind('.') {
        Some(idx) if idx > 0 => stripped[..idx].to_string(),
        _ => stripped,
    }
}

/// Last label of an address (`foo.bar.evan` -> `evan`).
pub fn root_domain(address: &str) -> &str {
    address.rsplit('.').next().unwrap_or(address)
}

/// Append the default domain to a bare name.
///
/// Content hashes and contract addresses are returned unchanged.
pub fn with_domain(name: &str, domain: &str, hash_prefix: &str) -> String {
    if is_content_hash_with(name, hash_prefix) || is_contract_address(name) || domain.is_empty() {
        return name.to_string();
    }
    format!("{name}.{domain}")
}

/// Replace the root domain of a symbolic address.
pub fn with_root_domain(address: &str, domain: &str) -> String {
    match address.rfind('.') {
        Some(idx) => format!("{}.{domain}", &address[..idx]),
        None => format!("{address}.{domain}"),
    }
}

/// Relative path of a locally served development file.
pub fn dev_path(name: &str, file: &str) -> String {
    let p = PathBuf::from(DEV_ROOT).join(name).join(file.trim_start_matches('/')).clean();
    p.to_string_lossy().replace('\\', "/")
}

/// Element id for an injected stylesheet.
///
/// Leading characters up to the first ASCII letter are dropped, then every
/// character outside `[A-Za-z0-9_:.-]` is removed.
pub fn sanitize_element_id(input: &str) -> String {
    let start = input
        .char_indices()
        .find(|(_, c)| c.is_ascii_alphabetic())
        .map(|(i, _)| i)
        .unwrap_or(input.len());

    input[start..]
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | ':' | '.' | '-'))
        .collect()
}
