use async_trait::async_trait;
use reqwest::{Client, Url};
use serde::Serialize;
use serde_json::{Map, Value};
use std::fmt;
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};

use crate::error::{Result, SyncError};

pub mod xml;

pub use xml::parse_feed;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum FeedError {
    #[error("malformed XML: {0}")]
    Xml(String),
    #[error("invalid RSS feed structure: missing channel")]
    MissingChannel,
}

/// One `<item>` of the feed, before normalization.
///
/// Element names keep their namespace prefix (`itunes:episode`), attributes
/// are stored as `@_name` keys and mixed text as `#text`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct FeedItem(pub Map<String, Value>);

impl FeedItem {
    /// Wraps a JSON object. Anything else (`null`, scalars) is not an item.
    pub fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Object(map) => Some(Self(map)),
            _ => None,
        }
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.0
    }
}

/// Source of raw feed text.
#[async_trait]
pub trait FeedSource: Send + Sync {
    async fn fetch(&self) -> Result<String>;
}

#[derive(Clone)]
pub struct HttpFeedSource {
    http: Client,
    url: Url,
}

impl fmt::Debug for HttpFeedSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpFeedSource")
            .field("url", &self.url)
            .finish_non_exhaustive()
    }
}

impl HttpFeedSource {
    pub fn new(url: &str, timeout: Duration) -> anyhow::Result<Self> {
        let url = Url::parse(url.trim())?;
        let http = Client::builder()
            .user_agent(concat!("podcast-indexer/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()?;
        Ok(Self { http, url })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn build_request(&self) -> reqwest::Result<reqwest::Request> {
        self.http
            .get(self.url.clone())
            .header("Accept", "application/rss+xml, application/xml, text/xml")
            .build()
    }
}

#[async_trait]
impl FeedSource for HttpFeedSource {
    async fn fetch(&self) -> Result<String> {
        let request = self.build_request()?;
        info!(url = %self.url, "fetching feed");
        let res = self.http.execute(request).await?;
        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            warn!(%status, "feed fetch failed");
            return Err(SyncError::FeedStatus {
                status: status.as_u16(),
                body,
            });
        }
        let text = res.text().await?;
        info!(size = text.len(), "feed fetched");
        Ok(text)
    }
}
