//! Page fetching behind a trait so tests can script network behaviour.

use async_trait::async_trait;

use super::task::FetchFailure;

/// A fetched page before extraction.
#[derive(Debug, Clone)]
pub struct FetchedPage {
    pub status: u16,
    pub content_type: String,
    pub body: String,
}

/// Fetches a URL and returns the raw response.
///
/// Implementations report transport problems as [`FetchFailure`]; HTTP
/// error statuses are returned as a page so the caller classifies them
/// alongside content checks. The caller owns the per-attempt deadline.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<FetchedPage, FetchFailure>;
}

/// [`PageFetcher`] backed by a shared [`reqwest::Client`].
pub struct HttpPageFetcher {
    client: reqwest::Client,
}

impl HttpPageFetcher {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl PageFetcher for HttpPageFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchedPage, FetchFailure> {
        let response = self.client.get(url).send().await.map_err(|e| {
            if e.is_timeout() {
                FetchFailure::Timeout
            } else {
                FetchFailure::Connection(e.to_string())
            }
        })?;

        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_owned();

        let body = response.text().await.map_err(|e| {
            if e.is_timeout() {
                FetchFailure::Timeout
            } else {
                FetchFailure::Connection(e.to_string())
            }
        })?;

        Ok(FetchedPage {
            status,
            content_type,
            body,
        })
    }
}
