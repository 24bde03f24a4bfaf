//! Network access for the request cache.

use std::time::Duration;

use async_trait::async_trait;

use super::types::{Request, Response};
use crate::error::{OffnoteError, Result};

/// Performs network fetches on behalf of the cache.
///
/// Like a browser `fetch`, an HTTP error status is a successful fetch; only
/// transport failures (no route, refused connection, DNS) are `Err`.
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, request: &Request) -> Result<Response>;
}

/// Fetch with an optional upper bound on completion time.
///
/// Exceeding the bound is reported as `OffnoteError::Timeout`, which policies
/// treat the same as a network failure.
pub async fn fetch_with_timeout(
    fetcher: &dyn Fetcher,
    request: &Request,
    timeout: Option<Duration>,
) -> Result<Response> {
    match timeout {
        Some(limit) => tokio::time::timeout(limit, fetcher.fetch(request))
            .await
            .map_err(|_| OffnoteError::Timeout(limit))?,
        None => fetcher.fetch(request).await,
    }
}

/// `Fetcher` backed by a reqwest client.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("offnote/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| OffnoteError::Network(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self { client })
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, request: &Request) -> Result<Response> {
        let response = self
            .client
            .request(request.method.clone(), &request.url)
            .send()
            .await
            .map_err(|e| OffnoteError::Network(format!("{} {}: {}", request.method, request.url, e)))?;

        let status = response.status();
        let headers = response.headers().clone();
        let body = response
            .bytes()
            .await
            .map_err(|e| OffnoteError::Network(format!("Failed to read body of {}: {}", request.url, e)))?;

        Ok(Response {
            status,
            headers,
            body,
        })
    }
}
