//! News search adapter for NewsAPI-compatible endpoints.
//!
//! Parses the `articles` array, carrying outlet names and publication
//! timestamps through to [`SearchResult`]. Timestamps are parsed
//! tolerantly; unparsable dates become `None` rather than dropping the
//! article.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;

use super::{ProviderError, SearchProvider};
use crate::types::SearchResult;

/// NewsAPI-compatible news provider.
pub struct NewsProvider {
    client: reqwest::Client,
    api_url: String,
    api_key: String,
}

impl NewsProvider {
    /// `api_url` is the article search endpoint, e.g.
    /// `https://newsapi.org/v2/everything`.
    pub fn new(client: reqwest::Client, api_url: String, api_key: String) -> Self {
        Self {
            client,
            api_url,
            api_key,
        }
    }
}

#[derive(Deserialize)]
struct NewsResponse {
    #[serde(default)]
    articles: Vec<Article>,
}

#[derive(Deserialize)]
struct Article {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    source: Option<ArticleSource>,
    #[serde(default, rename = "publishedAt")]
    published_at: Option<String>,
}

#[derive(Deserialize)]
struct ArticleSource {
    #[serde(default)]
    name: Option<String>,
}

fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .ok()
}

fn parse_articles(articles: Vec<Article>, limit: usize) -> Vec<SearchResult> {
    let mut results = Vec::new();
    for article in articles {
        if results.len() >= limit {
            break;
        }
        let Some(url) = article.url.filter(|u| !u.is_empty()) else {
            tracing::debug!("skipping article without url");
            continue;
        };
        results.push(SearchResult {
            title: article.title.unwrap_or_default(),
            url,
            snippet: article.description.unwrap_or_default(),
            rank: results.len(),
            source: article.source.and_then(|s| s.name),
            published_at: article.published_at.as_deref().and_then(parse_timestamp),
        });
    }
    results
}

#[async_trait]
impl SearchProvider for NewsProvider {
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<SearchResult>, ProviderError> {
        let page_size = limit.to_string();
        let params = [
            ("q", query),
            ("apiKey", self.api_key.as_str()),
            ("pageSize", page_size.as_str()),
            ("sortBy", "publishedAt"),
            ("language", "en"),
        ];

        let response = self
            .client
            .get(&self.api_url)
            .query(&params)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() || e.is_connect() {
                    ProviderError::Transient(e.to_string())
                } else {
                    ProviderError::Permanent(e.to_string())
                }
            })?;

        let status = response.status();
        if status.is_server_error() || status.as_u16() == 429 {
            return Err(ProviderError::Transient(format!("status {status}")));
        }
        if !status.is_success() {
            return Err(ProviderError::Permanent(format!("status {status}")));
        }

        let parsed: NewsResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::Permanent(format!("malformed response: {e}")))?;

        Ok(parse_articles(parsed.articles, limit))
    }

    fn name(&self) -> &str {
        "news"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn article(url: &str, published: Option<&str>) -> Article {
        Article {
            title: Some("Headline".into()),
            url: Some(url.into()),
            description: Some("desc".into()),
            source: Some(ArticleSource {
                name: Some("The Wire".into()),
            }),
            published_at: published.map(str::to_owned),
        }
    }

    #[test]
    fn parses_articles_with_metadata() {
        let results = parse_articles(
            vec![article("https://a.com/story", Some("2026-08-20T09:30:00Z"))],
            10,
        );
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].source.as_deref(), Some("The Wire"));
        let ts = results[0].published_at.expect("timestamp");
        assert_eq!(ts.to_rfc3339(), "2026-08-20T09:30:00+00:00");
    }

    #[test]
    fn unparsable_date_kept_without_timestamp() {
        let results = parse_articles(vec![article("https://a.com", Some("yesterday"))], 10);
        assert_eq!(results.len(), 1);
        assert!(results[0].published_at.is_none());
    }

    #[test]
    fn articles_without_url_skipped() {
        let mut bad = article("", None);
        bad.url = None;
        let results = parse_articles(vec![bad, article("https://ok.com", None)], 10);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].rank, 0);
        assert_eq!(results[0].url, "https://ok.com");
    }

    #[test]
    fn limit_enforced() {
        let articles = (0..8)
            .map(|i| article(&format!("https://n{i}.com"), None))
            .collect();
        assert_eq!(parse_articles(articles, 4).len(), 4);
    }
}
