// fetch.rs - Document fetching collaborator
// Scraper commands never do network I/O themselves; they are handed a Fetcher.

use std::time::Duration;

use async_trait::async_trait;
use log::{debug, warn};

use crate::error::Result;

/// A fetched document and the URL it was finally served from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fetched {
    pub url: String,
    /// UTF-8 text of the response, decoded from its declared charset.
    pub body: Vec<u8>,
}

#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<Fetched>;
}

/// Fetcher backed by a shared reqwest client. Non-success statuses are
/// returned as documents, like any other page.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new(timeout_secs: u64, user_agent: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .user_agent(user_agent)
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<Fetched> {
        debug!("[FETCH] GET {}", url);
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            warn!("[FETCH] {} answered with status {}", url, status);
        }
        let resolved = response.url().to_string();
        // Content-Type charset aware; undecodable bytes become U+FFFD
        let body = response.text().await?.into_bytes();
        Ok(Fetched { url: resolved, body })
    }
}

#[cfg(test)]
pub use stub::MapFetcher;
