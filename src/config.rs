//! Pipeline configuration with sensible defaults.
//!
//! [`PipelineConfig`] controls the scraper worker pool, per-host politeness,
//! retry budgets, content bounds, ranking and synthesis limits, and the
//! response cache. The defaults are tuned for reliable, polite scraping.

use std::time::Duration;

use crate::error::PipelineError;
use crate::types::RequestOptions;

/// Configuration for the research pipeline.
///
/// Use [`Default::default()`] for sensible defaults, or construct with
/// field overrides for custom behaviour.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Scraper worker-pool size; also the global in-flight fetch cap.
    pub max_concurrent_requests: usize,
    /// Simultaneous in-flight requests allowed per hostname.
    pub per_host_concurrency: usize,
    /// Minimum delay between successive requests to the same host.
    pub request_delay: Duration,
    /// Per-task retry ceiling for transient fetch failures.
    pub max_retries: u32,
    /// Base delay for exponential retry backoff.
    pub retry_backoff: Duration,
    /// Per-attempt fetch deadline.
    pub fetch_timeout: Duration,
    /// Whole-scrape deadline; outstanding tasks are cancelled when it fires.
    pub operation_timeout: Duration,
    /// Lower acceptance bound for extracted document text, in characters.
    pub min_content_length: usize,
    /// Upper acceptance bound for extracted document text, in characters.
    pub max_content_length: usize,
    /// Result cap passed to the search and news providers.
    pub search_results_limit: usize,
    /// Total attempts against the search/news API before giving up.
    pub provider_max_attempts: u32,
    /// Base delay for exponential provider backoff.
    pub provider_backoff: Duration,
    /// Documents retained after ranking.
    pub top_k: usize,
    /// Synthesizer prompt character budget.
    pub max_prompt_chars: usize,
    /// Whether the response cache is consulted and populated.
    pub cache_enabled: bool,
    /// Lifetime of a cached response envelope.
    pub cache_ttl: Duration,
    /// Maximum number of cached envelopes.
    pub cache_capacity: u64,
    /// Custom User-Agent string. If `None`, rotates through a built-in list
    /// of realistic browser User-Agents.
    pub user_agent: Option<String>,
    /// Whether robots.txt is fetched and honoured before scraping a host.
    pub respect_robots: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_concurrent_requests: 5,
            per_host_concurrency: 1,
            request_delay: Duration::from_millis(500),
            max_retries: 2,
            retry_backoff: Duration::from_millis(250),
            fetch_timeout: Duration::from_secs(10),
            operation_timeout: Duration::from_secs(60),
            min_content_length: 200,
            max_content_length: 100_000,
            search_results_limit: 10,
            provider_max_attempts: 3,
            provider_backoff: Duration::from_millis(250),
            top_k: 5,
            max_prompt_chars: 8_000,
            cache_enabled: true,
            cache_ttl: Duration::from_secs(3600),
            cache_capacity: 100,
            user_agent: None,
            respect_robots: true,
        }
    }
}

impl PipelineConfig {
    /// Validates this configuration, returning an error if any field is invalid.
    ///
    /// Checks:
    /// - `max_concurrent_requests` must be greater than 0
    /// - `per_host_concurrency` must be greater than 0
    /// - `fetch_timeout` and `operation_timeout` must be non-zero
    /// - `search_results_limit` and `top_k` must be greater than 0
    /// - `min_content_length` must be <= `max_content_length`
    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.max_concurrent_requests == 0 {
            return Err(PipelineError::Config(
                "max_concurrent_requests must be greater than 0".into(),
            ));
        }
        if self.per_host_concurrency == 0 {
            return Err(PipelineError::Config(
                "per_host_concurrency must be greater than 0".into(),
            ));
        }
        if self.fetch_timeout.is_zero() {
            return Err(PipelineError::Config(
                "fetch_timeout must be non-zero".into(),
            ));
        }
        if self.operation_timeout.is_zero() {
            return Err(PipelineError::Config(
                "operation_timeout must be non-zero".into(),
            ));
        }
        if self.search_results_limit == 0 {
            return Err(PipelineError::Config(
                "search_results_limit must be greater than 0".into(),
            ));
        }
        if self.top_k == 0 {
            return Err(PipelineError::Config("top_k must be greater than 0".into()));
        }
        if self.min_content_length > self.max_content_length {
            return Err(PipelineError::Config(
                "min_content_length must be <= max_content_length".into(),
            ));
        }
        Ok(())
    }

    /// Effective provider result cap after per-request overrides.
    pub fn effective_results_limit(&self, options: &RequestOptions) -> usize {
        options
            .search_results_limit
            .filter(|&limit| limit > 0)
            .unwrap_or(self.search_results_limit)
    }

    /// Effective ranking cut-off after per-request overrides.
    pub fn effective_top_k(&self, options: &RequestOptions) -> usize {
        options.top_k.filter(|&k| k > 0).unwrap_or(self.top_k)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_sensible_values() {
        let config = PipelineConfig::default();
        assert_eq!(config.max_concurrent_requests, 5);
        assert_eq!(config.per_host_concurrency, 1);
        assert_eq!(config.max_retries, 2);
        assert_eq!(config.search_results_limit, 10);
        assert_eq!(config.top_k, 5);
        assert!(config.cache_enabled);
        assert_eq!(config.cache_ttl, Duration::from_secs(3600));
        assert!(config.user_agent.is_none());
        assert!(config.respect_robots);
    }

    #[test]
    fn valid_config_passes_validation() {
        assert!(PipelineConfig::default().validate().is_ok());
    }

    #[test]
    fn zero_pool_size_rejected() {
        let config = PipelineConfig {
            max_concurrent_requests: 0,
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("max_concurrent_requests"));
    }

    #[test]
    fn zero_per_host_concurrency_rejected() {
        let config = PipelineConfig {
            per_host_concurrency: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn zero_fetch_timeout_rejected() {
        let config = PipelineConfig {
            fetch_timeout: Duration::ZERO,
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("fetch_timeout"));
    }

    #[test]
    fn zero_top_k_rejected() {
        let config = PipelineConfig {
            top_k: 0,
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("top_k"));
    }

    #[test]
    fn inverted_content_bounds_rejected() {
        let config = PipelineConfig {
            min_content_length: 5_000,
            max_content_length: 1_000,
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("min_content_length"));
    }

    #[test]
    fn request_overrides_apply() {
        let config = PipelineConfig::default();
        let options = RequestOptions {
            search_results_limit: Some(3),
            top_k: Some(2),
            include_content: None,
        };
        assert_eq!(config.effective_results_limit(&options), 3);
        assert_eq!(config.effective_top_k(&options), 2);
    }

    #[test]
    fn zero_valued_overrides_ignored() {
        let config = PipelineConfig::default();
        let options = RequestOptions {
            search_results_limit: Some(0),
            top_k: Some(0),
            include_content: None,
        };
        assert_eq!(config.effective_results_limit(&options), 10);
        assert_eq!(config.effective_top_k(&options), 5);
    }

    #[test]
    fn no_overrides_fall_back_to_config() {
        let config = PipelineConfig {
            search_results_limit: 7,
            ..Default::default()
        };
        assert_eq!(
            config.effective_results_limit(&RequestOptions::default()),
            7
        );
    }
}
