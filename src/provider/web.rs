//! Web search adapter for SerpAPI-compatible endpoints.
//!
//! Sends the query as GET parameters and parses the `organic_results`
//! array. Malformed entries are skipped rather than failing the whole
//! response; ranks are reassigned contiguously over the survivors.

use async_trait::async_trait;
use serde::Deserialize;

use super::{ProviderError, SearchProvider};
use crate::types::SearchResult;

/// SerpAPI-compatible web search provider.
pub struct WebSearchProvider {
    client: reqwest::Client,
    api_url: String,
    api_key: String,
}

impl WebSearchProvider {
    /// `api_url` is the search endpoint, e.g. `https://serpapi.com/search`.
    pub fn new(client: reqwest::Client, api_url: String, api_key: String) -> Self {
        Self {
            client,
            api_url,
            api_key,
        }
    }
}

#[derive(Deserialize)]
struct SerpResponse {
    #[serde(default)]
    organic_results: Vec<serde_json::Value>,
}

fn parse_organic(entries: Vec<serde_json::Value>, limit: usize) -> Vec<SearchResult> {
    let mut results = Vec::new();
    for entry in entries {
        if results.len() >= limit {
            break;
        }
        let Some(url) = entry.get("link").and_then(|v| v.as_str()) else {
            tracing::debug!("skipping organic result without link");
            continue;
        };
        if url.is_empty() {
            continue;
        }
        let title = entry
            .get("title")
            .and_then(|v| v.as_str())
            .unwrap_or("")
            .to_owned();
        let snippet = entry
            .get("snippet")
            .and_then(|v| v.as_str())
            .unwrap_or("")
            .to_owned();
        results.push(SearchResult {
            title,
            url: url.to_owned(),
            snippet,
            rank: results.len(),
            source: None,
            published_at: None,
        });
    }
    results
}

#[async_trait]
impl SearchProvider for WebSearchProvider {
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<SearchResult>, ProviderError> {
        let num = limit.to_string();
        let params = [
            ("q", query),
            ("engine", "google"),
            ("api_key", self.api_key.as_str()),
            ("num", num.as_str()),
            ("gl", "us"),
            ("hl", "en"),
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

        let parsed: SerpResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::Permanent(format!("malformed response: {e}")))?;

        Ok(parse_organic(parsed.organic_results, limit))
    }

    fn name(&self) -> &str {
        "web"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_well_formed_results() {
        let entries = vec![
            json!({"title": "A", "link": "https://a.com", "snippet": "first"}),
            json!({"title": "B", "link": "https://b.com", "snippet": "second"}),
        ];
        let results = parse_organic(entries, 10);
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].rank, 0);
        assert_eq!(results[1].rank, 1);
        assert_eq!(results[1].url, "https://b.com");
    }

    #[test]
    fn skips_entries_without_link_and_reranks() {
        let entries = vec![
            json!({"title": "no link"}),
            json!({"title": "ok", "link": "https://ok.com"}),
            json!({"link": ""}),
            json!({"title": "also ok", "link": "https://also.com", "snippet": "s"}),
        ];
        let results = parse_organic(entries, 10);
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].url, "https://ok.com");
        assert_eq!(results[0].rank, 0);
        assert_eq!(results[1].rank, 1);
    }

    #[test]
    fn respects_limit() {
        let entries = (0..20)
            .map(|i| json!({"title": "t", "link": format!("https://site{i}.com")}))
            .collect();
        let results = parse_organic(entries, 3);
        assert_eq!(results.len(), 3);
    }

    #[test]
    fn missing_fields_default_to_empty() {
        let entries = vec![json!({"link": "https://bare.com"})];
        let results = parse_organic(entries, 10);
        assert_eq!(results[0].title, "");
        assert_eq!(results[0].snippet, "");
    }
}
