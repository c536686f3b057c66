//! Per-tool pipeline orchestration.
//!
//! The orchestrator owns every stage and decides which of them run for a
//! given tool: `search` stops after retrieval, `scraper` adds extraction,
//! `analyzer` adds ranking and synthesis, and `news` uses the news provider
//! with optional article scraping. Responses are cached by request
//! fingerprint when caching is enabled.

use std::sync::Arc;
use std::time::Instant;

use crate::cache::{Fingerprint, ResponseCache};
use crate::config::PipelineConfig;
use crate::error::{PipelineError, Result};
use crate::llm::LlmProvider;
use crate::provider::{search_with_retries, SearchProvider};
use crate::ranker::ContentRanker;
use crate::refiner::QueryRefiner;
use crate::scraper::fetch::PageFetcher;
use crate::scraper::task::ScrapeTarget;
use crate::scraper::{ScrapeOutcome, Scraper};
use crate::synthesizer::Synthesizer;
use crate::types::{ResearchRequest, ResponseEnvelope, SearchResult, Tool};

/// The research pipeline engine.
pub struct Orchestrator {
    config: PipelineConfig,
    refiner: QueryRefiner,
    web: Arc<dyn SearchProvider>,
    news: Arc<dyn SearchProvider>,
    scraper: Scraper,
    ranker: ContentRanker,
    synthesizer: Synthesizer,
    cache: Option<ResponseCache>,
}

impl Orchestrator {
    /// Build an orchestrator from its collaborators.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Config`] if the configuration is invalid.
    pub fn new(
        config: PipelineConfig,
        web: Arc<dyn SearchProvider>,
        news: Arc<dyn SearchProvider>,
        fetcher: Arc<dyn PageFetcher>,
        llm: Option<Arc<dyn LlmProvider>>,
    ) -> Result<Self> {
        config.validate()?;

        let cache = config
            .cache_enabled
            .then(|| ResponseCache::new(config.cache_capacity, config.cache_ttl));

        Ok(Self {
            refiner: QueryRefiner::new(llm.clone()),
            scraper: Scraper::new(config.clone(), fetcher),
            ranker: ContentRanker::default(),
            synthesizer: Synthesizer::new(llm, config.max_prompt_chars),
            cache,
            config,
            web,
            news,
        })
    }

    /// Handle one research request end to end.
    ///
    /// # Errors
    ///
    /// - [`PipelineError::Validation`] for an empty query.
    /// - [`PipelineError::ProviderUnavailable`] when the search or news API
    ///   is down after retries.
    /// - [`PipelineError::NoContent`] when a content-requiring tool scraped
    ///   targets but extracted nothing.
    pub async fn handle(&self, request: ResearchRequest) -> Result<ResponseEnvelope> {
        let started = Instant::now();

        let query = request.query.trim();
        if query.is_empty() {
            return Err(PipelineError::Validation("query must not be empty".into()));
        }

        let fingerprint = Fingerprint::of(&request);
        if let Some(cache) = &self.cache {
            if let Some(mut hit) = cache.get(&fingerprint).await {
                tracing::debug!(tool = %request.tool, "cache hit");
                hit.cached = true;
                hit.timing_ms = elapsed_ms(started);
                return Ok(hit);
            }
        }

        let refined_query = self
            .refiner
            .refine(query, request.tool, request.use_llm)
            .await;
        tracing::info!(tool = %request.tool, query, refined_query, "running pipeline");

        let provider: &dyn SearchProvider = match request.tool {
            Tool::News => self.news.as_ref(),
            _ => self.web.as_ref(),
        };
        let results = search_with_retries(
            provider,
            &refined_query,
            self.config.effective_results_limit(&request.options),
            self.config.provider_max_attempts,
            self.config.provider_backoff,
        )
        .await?;

        let mut envelope = ResponseEnvelope {
            query: query.to_owned(),
            refined_query: refined_query.clone(),
            tool: request.tool,
            results: None,
            documents: None,
            result: None,
            llm_response: None,
            partial: false,
            degraded: false,
            cached: false,
            timing_ms: 0,
        };

        match request.tool {
            Tool::Search => {
                if request.use_llm {
                    let narrative = self.synthesizer.narrate_results(query, &results).await;
                    envelope.degraded = narrative.degraded;
                    envelope.llm_response = Some(narrative.text);
                }
                envelope.results = Some(results);
            }
            Tool::Scraper => {
                let outcome = self.scrape_results(&results).await?;
                if request.use_llm {
                    let narrative = self
                        .synthesizer
                        .narrate_documents(query, &outcome.documents)
                        .await;
                    envelope.degraded = narrative.degraded;
                    envelope.llm_response = Some(narrative.text);
                }
                envelope.partial = outcome.partial;
                envelope.documents = Some(outcome.documents);
                envelope.results = Some(results);
            }
            Tool::Analyzer => {
                let outcome = self.scrape_results(&results).await?;
                envelope.partial = outcome.partial;

                let ranked = self.ranker.rank(
                    &refined_query,
                    outcome.documents,
                    self.config.effective_top_k(&request.options),
                );
                let synthesis = self
                    .synthesizer
                    .synthesize(&refined_query, &ranked, request.use_llm)
                    .await;
                envelope.degraded = synthesis.degraded;
                envelope.result = Some(synthesis.result);
                envelope.results = Some(results);
            }
            Tool::News => {
                if request.options.include_content.unwrap_or(false) {
                    // News tolerates a fully failed scrape; the articles
                    // themselves are still the answer.
                    let outcome = self.scraper.scrape(&targets_of(&results)).await;
                    envelope.partial = outcome.partial;
                    envelope.documents = Some(outcome.documents);
                }
                if request.use_llm {
                    let narrative = self.synthesizer.narrate_news(query, &results).await;
                    envelope.degraded = narrative.degraded;
                    envelope.llm_response = Some(narrative.text);
                }
                envelope.results = Some(results);
            }
        }

        envelope.timing_ms = elapsed_ms(started);

        if let Some(cache) = &self.cache {
            cache.insert(fingerprint, envelope.clone()).await;
        }

        tracing::info!(
            tool = %request.tool,
            partial = envelope.partial,
            degraded = envelope.degraded,
            timing_ms = envelope.timing_ms,
            "pipeline finished"
        );
        Ok(envelope)
    }

    /// Scrape search results for tools that require content, failing when
    /// targets existed but nothing was extracted.
    async fn scrape_results(&self, results: &[SearchResult]) -> Result<ScrapeOutcome> {
        let targets = targets_of(results);
        let outcome = self.scraper.scrape(&targets).await;
        if outcome.documents.is_empty() && !targets.is_empty() {
            return Err(PipelineError::NoContent(format!(
                "all {} fetches failed",
                targets.len()
            )));
        }
        Ok(outcome)
    }
}

fn targets_of(results: &[SearchResult]) -> Vec<ScrapeTarget> {
    results
        .iter()
        .map(|r| ScrapeTarget {
            url: r.url.clone(),
            rank: r.rank,
        })
        .collect()
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}
