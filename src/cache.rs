//! TTL response cache keyed by request fingerprint.
//!
//! Backed by [`moka`]'s future cache, which guarantees `get` never returns
//! an expired entry. The fingerprint covers everything that affects output:
//! the normalised query, the tool, the LLM toggle, and the per-request
//! option overrides.

use std::hash::{DefaultHasher, Hash, Hasher};
use std::time::Duration;

use moka::future::Cache;

use crate::types::{ResearchRequest, ResponseEnvelope};

/// Cache key derived from the output-affecting parts of a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Fingerprint(u64);

impl Fingerprint {
    /// Compute the fingerprint of a request.
    ///
    /// The query is trimmed, lowercased, and whitespace-collapsed so that
    /// cosmetic differences hit the same entry.
    pub fn of(request: &ResearchRequest) -> Self {
        let normalized_query = request
            .query
            .trim()
            .to_lowercase()
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ");

        let mut hasher = DefaultHasher::new();
        normalized_query.hash(&mut hasher);
        request.tool.name().hash(&mut hasher);
        request.use_llm.hash(&mut hasher);
        request.options.search_results_limit.hash(&mut hasher);
        request.options.top_k.hash(&mut hasher);
        request.options.include_content.hash(&mut hasher);
        Self(hasher.finish())
    }
}

/// TTL cache of assembled response envelopes.
pub struct ResponseCache {
    inner: Cache<Fingerprint, ResponseEnvelope>,
}

impl ResponseCache {
    /// Create a cache holding at most `capacity` envelopes, each living
    /// for `ttl` after insertion.
    pub fn new(capacity: u64, ttl: Duration) -> Self {
        Self {
            inner: Cache::builder()
                .max_capacity(capacity)
                .time_to_live(ttl)
                .build(),
        }
    }

    pub async fn get(&self, fingerprint: &Fingerprint) -> Option<ResponseEnvelope> {
        self.inner.get(fingerprint).await
    }

    pub async fn insert(&self, fingerprint: Fingerprint, envelope: ResponseEnvelope) {
        self.inner.insert(fingerprint, envelope).await;
    }

    /// Drop all cached envelopes.
    pub async fn clear(&self) {
        self.inner.invalidate_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{RequestOptions, Tool};

    fn request(query: &str, tool: Tool) -> ResearchRequest {
        ResearchRequest {
            query: query.into(),
            tool,
            use_llm: true,
            options: RequestOptions::default(),
        }
    }

    fn envelope(query: &str) -> ResponseEnvelope {
        ResponseEnvelope {
            query: query.into(),
            refined_query: query.into(),
            tool: Tool::Search,
            results: None,
            documents: None,
            result: None,
            llm_response: None,
            partial: false,
            degraded: false,
            cached: false,
            timing_ms: 0,
        }
    }

    #[test]
    fn cosmetic_query_differences_share_a_fingerprint() {
        let a = Fingerprint::of(&request("Rust   Async ", Tool::Search));
        let b = Fingerprint::of(&request("rust async", Tool::Search));
        assert_eq!(a, b);
    }

    #[test]
    fn tool_differentiates_fingerprints() {
        let a = Fingerprint::of(&request("rust", Tool::Search));
        let b = Fingerprint::of(&request("rust", Tool::Analyzer));
        assert_ne!(a, b);
    }

    #[test]
    fn use_llm_differentiates_fingerprints() {
        let mut with = request("rust", Tool::Search);
        let mut without = request("rust", Tool::Search);
        with.use_llm = true;
        without.use_llm = false;
        assert_ne!(Fingerprint::of(&with), Fingerprint::of(&without));
    }

    #[test]
    fn options_differentiate_fingerprints() {
        let plain = request("rust", Tool::News);
        let mut with_content = request("rust", Tool::News);
        with_content.options.include_content = Some(true);
        assert_ne!(Fingerprint::of(&plain), Fingerprint::of(&with_content));
    }

    #[tokio::test]
    async fn insert_then_get_round_trips() {
        let cache = ResponseCache::new(10, Duration::from_secs(60));
        let fp = Fingerprint::of(&request("rust", Tool::Search));
        cache.insert(fp, envelope("rust")).await;
        let hit = cache.get(&fp).await.expect("should hit");
        assert_eq!(hit.query, "rust");
    }

    #[tokio::test]
    async fn entries_expire_after_ttl() {
        let cache = ResponseCache::new(10, Duration::from_millis(200));
        let fp = Fingerprint::of(&request("rust", Tool::Search));
        cache.insert(fp, envelope("rust")).await;

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(cache.get(&fp).await.is_some());

        tokio::time::sleep(Duration::from_millis(250)).await;
        assert!(cache.get(&fp).await.is_none());
    }

    #[tokio::test]
    async fn clear_empties_the_cache() {
        let cache = ResponseCache::new(10, Duration::from_secs(60));
        let fp = Fingerprint::of(&request("rust", Tool::Search));
        cache.insert(fp, envelope("rust")).await;
        cache.clear().await;
        assert!(cache.get(&fp).await.is_none());
    }
}
