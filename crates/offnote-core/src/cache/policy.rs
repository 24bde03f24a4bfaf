//! Fetch policies: network-first for documents, cache-first with a freshness
//! window for everything else.

use std::sync::atomic::{AtomicBool, Ordering};

use chrono::Duration as ChronoDuration;
use http::{Method, StatusCode};
use tracing::{debug, warn};

use super::clock::Clock;
use super::fetch::{fetch_with_timeout, Fetcher};
use super::settings::CacheSettings;
use super::store::CacheStorage;
use super::types::{Request, Response, Served};
use crate::error::Result;

/// Everything a policy needs to answer one request against one generation.
pub struct PolicyContext<'a> {
    pub generation: &'a str,
    pub storage: &'a dyn CacheStorage,
    pub fetcher: &'a dyn Fetcher,
    pub clock: &'a dyn Clock,
    pub settings: &'a CacheSettings,
    /// Checked at write time; cleared once the owning worker is superseded
    pub writable: &'a AtomicBool,
}

impl PolicyContext<'_> {
    /// Route a request to its policy.
    pub async fn respond(&self, request: &Request) -> Result<Served> {
        if request.method != Method::GET {
            return self.pass_through(request).await;
        }
        if request.is_navigation() {
            self.network_first(request).await
        } else {
            self.cache_first(request).await
        }
    }

    /// Non-GET requests are never cached or answered from cache.
    pub async fn pass_through(&self, request: &Request) -> Result<Served> {
        let response = self.fetch(request).await?;
        Ok(Served::network(response))
    }

    /// Live response when reachable (and refresh the cached copy), otherwise
    /// the cached copy. With neither, the network error propagates.
    pub async fn network_first(&self, request: &Request) -> Result<Served> {
        match self.fetch(request).await {
            Ok(response) => {
                self.store(request, &response).await;
                Ok(Served::network(response))
            }
            Err(err) if err.is_network_failure() => match self.lookup(request).await {
                Some(cached) => {
                    debug!(url = %request.url, "offline, serving cached document");
                    Ok(Served::cache(cached))
                }
                None => Err(err),
            },
            Err(err) => Err(err),
        }
    }

    /// Fresh cached copy when available, otherwise revalidate over the
    /// network. A stale copy beats nothing; nothing at all yields a 503.
    pub async fn cache_first(&self, request: &Request) -> Result<Served> {
        let cached = self.lookup(request).await;
        if let Some(hit) = &cached {
            if self.is_fresh(hit) {
                return Ok(Served::cache(hit.clone()));
            }
        }

        match self.fetch(request).await {
            Ok(response) => {
                if response.status == StatusCode::OK {
                    self.store(request, &response).await;
                }
                Ok(Served::network(response))
            }
            Err(err) => {
                warn!(url = %request.url, error = %err, "fetch failed, falling back");
                Ok(match cached {
                    Some(stale) => Served::cache(stale),
                    None => Served::synthesized(Response::service_unavailable()),
                })
            }
        }
    }

    /// A cached response is fresh when its `date` header is less than the
    /// freshness window old. No `date` means stale.
    pub fn is_fresh(&self, response: &Response) -> bool {
        let Some(date) = response.date() else {
            return false;
        };
        let window = ChronoDuration::from_std(self.settings.freshness_window)
            .unwrap_or(ChronoDuration::MAX);
        self.clock.now().signed_duration_since(date) < window
    }

    async fn fetch(&self, request: &Request) -> Result<Response> {
        fetch_with_timeout(self.fetcher, request, self.settings.network_timeout).await
    }

    /// Storage read errors count as a miss.
    async fn lookup(&self, request: &Request) -> Option<Response> {
        match self
            .storage
            .match_request(self.generation, &request.key())
            .await
        {
            Ok(hit) => hit,
            Err(err) => {
                warn!(url = %request.url, error = %err, "cache lookup failed");
                None
            }
        }
    }

    /// Storage write errors never affect the response already in hand.
    async fn store(&self, request: &Request, response: &Response) {
        if !self.writable.load(Ordering::SeqCst) {
            debug!(url = %request.url, "generation no longer writable, not caching");
            return;
        }
        if let Err(err) = self
            .storage
            .put(self.generation, &request.key(), response)
            .await
        {
            warn!(url = %request.url, error = %err, "failed to cache response");
        }
    }
}
