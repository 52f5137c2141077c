//! Name hashing and content hash decoding.
//!
//! `namehash` is the recursive keccak-256 name hash: starting from 32 zero
//! bytes, each label from the right is hashed and folded into the node. The
//! resolver answers with a bytes32 sha2-256 digest, which becomes a content
//! hash once the multihash header is put back and the result is base58
//! encoded.

use sha3::{Digest, Keccak256};

use crate::constants::MULTIHASH_SHA256;

/// Name hash of `name`. The empty name hashes to 32 zero bytes.
pub fn namehash(name: &str) -> [u8; 32] {
    let mut node = [0u8; 32];
    if name.is_empty() {
        return node;
    }
    for label in name.rsplit('.') {
        let label_hash = Keccak256::digest(label.as_bytes());
        let mut hasher = Keccak256::new();
        hasher.update(node);
        hasher.update(label_hash);
        node.copy_from_slice(&hasher.finalize());
    }
    node
}

/// Name hash as lowercase hex, without `0x`.
pub fn namehash_hex(name: &str) -> String {
    hex::encode(namehash(name))
}

/// Content hash of a bytes32 resolver result (`0x…`, 64 hex digits).
///
/// Returns `None` for an empty, malformed or all-zero result.
pub fn bytes32_to_content_hash(result: &str) -> Option<String> {
    let digits = result.trim().trim_start_matches("0x");
    if digits.len() != 64 {
        return None;
    }
    let digest = hex::decode(digits).ok()?;
    if digest.iter().all(|b| *b == 0) {
        return None;
    }

    let mut multihash = Vec::with_capacity(34);
    multihash.extend_from_slice(&MULTIHASH_SHA256);
    multihash.extend_from_slice(&digest);
    Some(bs58::encode(multihash).into_string())
}
