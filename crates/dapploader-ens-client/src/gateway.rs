//! HTTP content gateway and dev server file source.
//!
//! Paths handed to [`GatewayStore`] are either a bare content hash (a
//! descriptor) or an absolute gateway path such as `/ipfs/<hash>/index.js`.

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::StatusCode;
use tracing::debug;
use url::Url;

use dapploader::capability::{ContentStore, LocalFileSource};
use dapploader_core::{LoaderError, LoaderResult};

use crate::constants::{CLIENT_VERSION, DEFAULT_HTTP_TIMEOUT};
use crate::ClientError;

fn http_client() -> Result<reqwest::Client, ClientError> {
    Ok(reqwest::Client::builder()
        .timeout(DEFAULT_HTTP_TIMEOUT)
        .user_agent(format!("dapploader/{CLIENT_VERSION}"))
        .build()?)
}

fn base_url(raw: &str) -> Result<String, ClientError> {
    let url = Url::parse(raw.trim())?;
    match url.scheme() {
        "http" | "https" => Ok(url.as_str().trim_end_matches('/').to_string()),
        other => Err(ClientError::UnsupportedScheme(other.to_string())),
    }
}

async fn get(http: &reqwest::Client, url: &str, path: &str) -> LoaderResult<Bytes> {
    debug!(%url, "fetch");
    let response = http
        .get(url)
        .send()
        .await
        .map_err(|e| LoaderError::load_failure(path, e))?;

    match response.status() {
        StatusCode::NOT_FOUND => Err(LoaderError::not_found(path)),
        status if !status.is_success() => Err(LoaderError::load_failure(path, format!("http status {status}"))),
        _ => response.bytes().await.map_err(|e| LoaderError::load_failure(path, e)),
    }
}

#[derive(Debug, Clone)]
pub struct GatewayStore {
    http: reqwest::Client,
    base: String,
}

impl GatewayStore {
    pub fn new(base: &str) -> Result<Self, ClientError> {
        Ok(Self {
            http: http_client()?,
            base: base_url(base)?,
        })
    }

    pub fn base(&self) -> &str {
        &self.base
    }

    /// Status code the gateway answers for a path.
    pub async fn probe(&self, path: &str) -> Result<u16, ClientError> {
        let response = self.http.head(self.url_for(path)).send().await?;
        Ok(response.status().as_u16())
    }
}

#[async_trait]
impl ContentStore for GatewayStore {
    async fn fetch(&self, path: &str) -> LoaderResult<Bytes> {
        get(&self.http, &self.url_for(path), path).await
    }

    fn url_for(&self, path: &str) -> String {
        if path.starts_with('/') {
            format!("{}{path}", self.base)
        } else {
            format!("{}/ipfs/{path}", self.base)
        }
    }
}

/// Files served by a local development server.
#[derive(Debug, Clone)]
pub struct DevServerFiles {
    http: reqwest::Client,
    origin: String,
}

impl DevServerFiles {
    pub fn new(origin: &str) -> Result<Self, ClientError> {
        Ok(Self {
            http: http_client()?,
            origin: base_url(origin)?,
        })
    }
}

#[async_trait]
impl LocalFileSource for DevServerFiles {
    async fn fetch(&self, path: &str) -> LoaderResult<Bytes> {
        get(&self.http, &self.url_for(path), path).await
    }

    fn url_for(&self, path: &str) -> String {
        format!("{}/{}", self.origin, path.trim_start_matches('/'))
    }
}
