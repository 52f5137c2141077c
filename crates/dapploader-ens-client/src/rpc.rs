//! JSON-RPC name resolver.
//!
//! Resolves a name by calling the resolver contract's content lookup through
//! `eth_call`:
//! - `data` = selector + namehash(name)
//! - `to` = resolver contract
//!
//! An unset name answers with an empty or all-zero word. An unreachable or
//! failing endpoint is reported as "no content" so callers never hang on it;
//! the loader applies its own bounded wait on top.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};
use url::Url;

use dapploader::capability::NameResolver;
use dapploader_core::LoaderResult;

use crate::constants::{CLIENT_VERSION, CONTENT_SELECTOR, DEFAULT_HTTP_TIMEOUT};
use crate::namehash::{bytes32_to_content_hash, namehash_hex};
use crate::ClientError;

#[derive(Debug, Clone, Serialize)]
struct CallObject {
    data: String,
    to: String,
}

#[derive(Debug, Clone, Serialize)]
struct RpcRequest {
    jsonrpc: &'static str,
    id: u64,
    method: &'static str,
    params: (CallObject, &'static str),
}

#[derive(Debug, Clone, Deserialize)]
struct RpcResponse {
    #[serde(default)]
    result: Option<String>,
    #[serde(default)]
    error: Option<Value>,
}

#[derive(Debug, Clone)]
pub struct EnsClient {
    http: reqwest::Client,
    rpc_url: Url,
    resolver: String,
}

impl EnsClient {
    pub fn new(rpc_url: &str, resolver: &str) -> Result<Self, ClientError> {
        let rpc_url = Url::parse(rpc_url)?;
        let scheme = rpc_url.scheme().to_string();
        let rpc_url = match scheme.as_str() {
            "http" | "https" => rpc_url,
            // websocket endpoints expose the same API over plain HTTP(S)
            "ws" | "wss" => {
                let http = if scheme == "wss" { "https" } else { "http" };
                Url::parse(&rpc_url.as_str().replacen(&scheme, http, 1))?
            }
            other => return Err(ClientError::UnsupportedScheme(other.to_string())),
        };

        let resolver = resolver.trim();
        if !resolver.starts_with("0x") || resolver.len() != 42 || hex::decode(&resolver[2..]).is_err() {
            return Err(ClientError::InvalidResolver(resolver.to_string()));
        }

        let http = reqwest::Client::builder()
            .timeout(DEFAULT_HTTP_TIMEOUT)
            .user_agent(format!("dapploader/{CLIENT_VERSION}"))
            .build()?;

        Ok(Self {
            http,
            rpc_url,
            resolver: resolver.to_string(),
        })
    }

    pub fn rpc_url(&self) -> &Url {
        &self.rpc_url
    }

    pub fn resolver(&self) -> &str {
        &self.resolver
    }

    fn request(&self, name: &str) -> RpcRequest {
        RpcRequest {
            jsonrpc: "2.0",
            id: 1,
            method: "eth_call",
            params: (
                CallObject {
                    data: format!("0x{CONTENT_SELECTOR}{}", namehash_hex(name)),
                    to: self.resolver.clone(),
                },
                "latest",
            ),
        }
    }

    async fn call(&self, name: &str) -> Result<RpcResponse, reqwest::Error> {
        self.http
            .post(self.rpc_url.clone())
            .json(&self.request(name))
            .send()
            .await?
            .error_for_status()?
            .json::<RpcResponse>()
            .await
    }

    /// Lookup that surfaces transport and RPC errors instead of folding them
    /// into "unset".
    pub async fn lookup(&self, name: &str) -> Result<Option<String>, ClientError> {
        let response = self.call(name).await?;
        if let Some(error) = response.error {
            return Err(ClientError::Rpc(error.to_string()));
        }
        Ok(response.result.as_deref().and_then(bytes32_to_content_hash))
    }
}

#[async_trait]
impl NameResolver for EnsClient {
    async fn resolve_content_hash(&self, address: &str) -> LoaderResult<Option<String>> {
        match self.lookup(address).await {
            Ok(hash) => {
                debug!(%address, hash = hash.as_deref().unwrap_or("<unset>"), "name lookup");
                Ok(hash)
            }
            Err(e) => {
                warn!(%address, rpc = %self.rpc_url, error = %e, "name lookup failed");
                Ok(None)
            }
        }
    }
}
