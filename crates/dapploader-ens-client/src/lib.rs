//! dapploader-ens-client
//!
//! Network implementations of the loader capabilities:
//! - [`EnsClient`]: name to content hash lookup over JSON-RPC `eth_call`
//! - [`GatewayStore`]: content fetches through an HTTP content gateway
//! - [`DevServerFiles`]: files served by a local development server

pub mod constants;
pub mod gateway;
pub mod namehash;
pub mod rpc;

pub use constants::*;
pub use gateway::{DevServerFiles, GatewayStore};
pub use namehash::{bytes32_to_content_hash, namehash, namehash_hex};
pub use rpc::EnsClient;

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("invalid url: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("unsupported url scheme: {0}")]
    UnsupportedScheme(String),

    #[error("invalid resolver address: {0}")]
    InvalidResolver(String),

    #[error("rpc error: {0}")]
    Rpc(String),

    #[error("http client: {0}")]
    Http(#[from] reqwest::Error),
}
