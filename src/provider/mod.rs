//! Search provider abstraction and shared retry policy.
//!
//! A [`SearchProvider`] answers a query with ranked [`SearchResult`]s.
//! Adapters live in [`web`] and [`news`]; the orchestrator talks to the
//! trait only, which is also the seam tests mock.

pub mod news;
pub mod web;

use std::time::Duration;

use async_trait::async_trait;

use crate::error::PipelineError;
use crate::types::SearchResult;

/// Errors from a search or news provider.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    /// Transport failure or 5xx/429 response. Retried with backoff.
    #[error("provider transient error: {0}")]
    Transient(String),

    /// Rejected request (bad key, quota, malformed query). Not retried.
    #[error("provider permanent error: {0}")]
    Permanent(String),
}

impl ProviderError {
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_))
    }
}

/// A source of ranked search results.
#[async_trait]
pub trait SearchProvider: Send + Sync {
    /// Run a query, returning at most `limit` results with contiguous
    /// 0-based ranks.
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<SearchResult>, ProviderError>;

    /// Provider name for logs and error messages.
    fn name(&self) -> &str;
}

/// Call a provider with exponential backoff on transient failures.
///
/// Makes up to `max_attempts` calls, sleeping `backoff * 2^(attempt-1)`
/// between them. Permanent errors abort immediately. Exhaustion maps to
/// [`PipelineError::ProviderUnavailable`].
pub async fn search_with_retries(
    provider: &dyn SearchProvider,
    query: &str,
    limit: usize,
    max_attempts: u32,
    backoff: Duration,
) -> Result<Vec<SearchResult>, PipelineError> {
    let attempts = max_attempts.max(1);
    let mut last_error = String::new();

    for attempt in 1..=attempts {
        match provider.search(query, limit).await {
            Ok(results) => {
                tracing::debug!(
                    provider = provider.name(),
                    count = results.len(),
                    attempt,
                    "provider search succeeded"
                );
                return Ok(results);
            }
            Err(err) if err.is_transient() && attempt < attempts => {
                let delay = backoff * 2u32.saturating_pow(attempt - 1);
                tracing::warn!(
                    provider = provider.name(),
                    attempt,
                    error = %err,
                    delay_ms = delay.as_millis() as u64,
                    "provider search failed, retrying"
                );
                last_error = err.to_string();
                tokio::time::sleep(delay).await;
            }
            Err(err) if err.is_transient() => {
                last_error = err.to_string();
            }
            Err(err) => {
                return Err(PipelineError::ProviderUnavailable(format!(
                    "{}: {err}",
                    provider.name()
                )));
            }
        }
    }

    Err(PipelineError::ProviderUnavailable(format!(
        "{}: {attempts} attempts exhausted, last error: {last_error}",
        provider.name()
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct ScriptedProvider {
        calls: AtomicUsize,
        fail_first: usize,
        permanent: bool,
    }

    #[async_trait]
    impl SearchProvider for ScriptedProvider {
        async fn search(
            &self,
            _query: &str,
            _limit: usize,
        ) -> Result<Vec<SearchResult>, ProviderError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.fail_first {
                if self.permanent {
                    Err(ProviderError::Permanent("invalid key".into()))
                } else {
                    Err(ProviderError::Transient("503".into()))
                }
            } else {
                Ok(vec![SearchResult {
                    title: "t".into(),
                    url: "https://example.com".into(),
                    snippet: "s".into(),
                    rank: 0,
                    source: None,
                    published_at: None,
                }])
            }
        }

        fn name(&self) -> &str {
            "scripted"
        }
    }

    #[tokio::test(start_paused = true)]
    async fn transient_failures_retried_until_success() {
        let provider = ScriptedProvider {
            calls: AtomicUsize::new(0),
            fail_first: 2,
            permanent: false,
        };
        let results =
            search_with_retries(&provider, "q", 5, 3, Duration::from_millis(100)).await;
        assert_eq!(results.expect("should succeed on third attempt").len(), 1);
        assert_eq!(provider.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn exhaustion_maps_to_provider_unavailable() {
        let provider = ScriptedProvider {
            calls: AtomicUsize::new(0),
            fail_first: 10,
            permanent: false,
        };
        let err = search_with_retries(&provider, "q", 5, 3, Duration::from_millis(100))
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::ProviderUnavailable(_)));
        assert_eq!(provider.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn permanent_error_aborts_immediately() {
        let provider = ScriptedProvider {
            calls: AtomicUsize::new(0),
            fail_first: 10,
            permanent: true,
        };
        let err = search_with_retries(&provider, "q", 5, 3, Duration::from_millis(100))
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::ProviderUnavailable(_)));
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
    }
}
