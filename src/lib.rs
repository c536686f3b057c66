//! # web-research
//!
//! A web-research pipeline engine: refine a query, search the web or news,
//! scrape the result pages concurrently, rank the extracted content, and
//! synthesize a structured answer — with graceful degradation at every
//! stage.
//!
//! ## Design
//!
//! - Four tools over one pipeline: `search`, `scraper`, `analyzer`, `news`
//! - Fixed worker pool with per-host concurrency caps, request spacing,
//!   robots.txt checks, and bounded retries with exponential backoff
//! - Deterministic lexical ranking behind a pluggable scoring trait
//! - Optional LLM collaboration for refinement, narratives, and synthesis;
//!   every model path has a deterministic fallback
//! - In-memory TTL response cache keyed by request fingerprint
//!
//! ## Degradation
//!
//! Individual page failures shrink the result set rather than failing the
//! request; model failures fall back to extractive output. Only an invalid
//! request, an exhausted search provider, or a fully failed
//! content-requiring scrape surface as errors.

pub mod cache;
pub mod config;
pub mod error;
pub mod http;
pub mod llm;
pub mod orchestrator;
pub mod provider;
pub mod ranker;
pub mod refiner;
pub mod scraper;
pub mod synthesizer;
pub mod types;

pub use cache::{Fingerprint, ResponseCache};
pub use config::PipelineConfig;
pub use error::{PipelineError, Result};
pub use llm::{HttpLlmProvider, LlmProvider};
pub use orchestrator::Orchestrator;
pub use provider::{news::NewsProvider, web::WebSearchProvider, SearchProvider};
pub use ranker::{ContentRanker, LexicalScorer, ScoringStrategy};
pub use refiner::QueryRefiner;
pub use scraper::{fetch::HttpPageFetcher, fetch::PageFetcher, Scraper};
pub use synthesizer::Synthesizer;
pub use types::{
    RankedDocument, RequestOptions, ResearchRequest, ResponseEnvelope, ScrapedDocument,
    SearchResult, SourceRef, SynthesisResult, Tool,
};
