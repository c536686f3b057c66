//! Error types for the web-research pipeline.
//!
//! All errors use stable string messages suitable for display to callers
//! and programmatic handling. No API keys or sensitive data appear in
//! error messages.
//!
//! Failures inside the Scraper and Synthesizer stages are recovered locally
//! (partial results, extractive fallback) and never surface here; only
//! request validation, provider exhaustion, and a content-requiring scrape
//! with zero successes are user-visible.

/// Errors that can surface from a pipeline request.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// The incoming request is malformed: empty query, unknown tool,
    /// or invalid options. Surfaced before any stage runs.
    #[error("invalid request: {0}")]
    Validation(String),

    /// The search or news API failed after exhausting its retry budget.
    #[error("search provider unavailable: {0}")]
    ProviderUnavailable(String),

    /// A scrape run required content and zero tasks succeeded.
    #[error("no content could be retrieved: {0}")]
    NoContent(String),

    /// An HTTP transport failure outside the recoverable paths.
    #[error("HTTP error: {0}")]
    Http(String),

    /// A payload could not be parsed.
    #[error("parse error: {0}")]
    Parse(String),

    /// Invalid pipeline configuration.
    #[error("config error: {0}")]
    Config(String),
}

/// Convenience type alias for pipeline results.
pub type Result<T> = std::result::Result<T, PipelineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_validation() {
        let err = PipelineError::Validation("query is empty".into());
        assert_eq!(err.to_string(), "invalid request: query is empty");
    }

    #[test]
    fn display_provider_unavailable() {
        let err = PipelineError::ProviderUnavailable("3 attempts exhausted".into());
        assert_eq!(
            err.to_string(),
            "search provider unavailable: 3 attempts exhausted"
        );
    }

    #[test]
    fn display_no_content() {
        let err = PipelineError::NoContent("all 5 fetches failed".into());
        assert_eq!(
            err.to_string(),
            "no content could be retrieved: all 5 fetches failed"
        );
    }

    #[test]
    fn display_config() {
        let err = PipelineError::Config("top_k must be greater than 0".into());
        assert_eq!(err.to_string(), "config error: top_k must be greater than 0");
    }

    #[test]
    fn error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<PipelineError>();
    }
}
