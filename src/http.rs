//! Shared HTTP client construction with User-Agent rotation.
//!
//! Provides configured [`reqwest::Client`] values with browser-like headers,
//! cookie support, and rotating User-Agent strings. API clients get a
//! client-level timeout; the scraper applies its own per-attempt deadline
//! and therefore builds a client without one.

use std::time::Duration;

use rand::seq::SliceRandom;

use crate::config::PipelineConfig;
use crate::error::PipelineError;

/// Realistic browser User-Agent strings, rotated per client.
const USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:133.0) Gecko/20100101 Firefox/133.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10.15; rv:133.0) Gecko/20100101 Firefox/133.0",
];

/// Build a [`reqwest::Client`] for API calls with a client-level timeout.
///
/// # Errors
///
/// Returns [`PipelineError::Http`] if the client cannot be constructed.
pub fn build_api_client(
    config: &PipelineConfig,
    timeout: Duration,
) -> Result<reqwest::Client, PipelineError> {
    client_builder(config)
        .timeout(timeout)
        .build()
        .map_err(|e| PipelineError::Http(format!("failed to build HTTP client: {e}")))
}

/// Build a [`reqwest::Client`] for page fetching.
///
/// No client-level timeout: the scraper wraps each attempt in its own
/// deadline so a slow body read counts against the attempt, not the client.
///
/// # Errors
///
/// Returns [`PipelineError::Http`] if the client cannot be constructed.
pub fn build_fetch_client(config: &PipelineConfig) -> Result<reqwest::Client, PipelineError> {
    client_builder(config)
        .build()
        .map_err(|e| PipelineError::Http(format!("failed to build HTTP client: {e}")))
}

fn client_builder(config: &PipelineConfig) -> reqwest::ClientBuilder {
    let ua = match config.user_agent {
        Some(ref custom) => custom.clone(),
        None => random_user_agent().to_owned(),
    };

    reqwest::Client::builder()
        .cookie_store(true)
        .user_agent(ua)
        .redirect(reqwest::redirect::Policy::limited(10))
}

/// Select a random User-Agent string from the rotation list.
pub fn random_user_agent() -> &'static str {
    let mut rng = rand::thread_rng();
    USER_AGENTS
        .choose(&mut rng)
        .copied()
        // USER_AGENTS is a non-empty const array; choose only returns None on empty slices
        .unwrap_or(USER_AGENTS[0])
}
