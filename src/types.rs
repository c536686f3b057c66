//! Core types flowing through the research pipeline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::PipelineError;

/// The tool selected for a research request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tool {
    /// Web search: ranked results only, no page fetching.
    Search,
    /// Search plus concurrent content extraction from the result pages.
    Scraper,
    /// Search, scrape, rank, and synthesize a structured answer.
    Analyzer,
    /// News search; optionally scrapes article bodies when requested.
    News,
}

impl Tool {
    /// Returns the wire name of this tool.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Search => "search",
            Self::Scraper => "scraper",
            Self::Analyzer => "analyzer",
            Self::News => "news",
        }
    }

    /// Parse a wire name into a tool, rejecting unknown names.
    pub fn parse(name: &str) -> Result<Self, PipelineError> {
        match name {
            "search" => Ok(Self::Search),
            "scraper" => Ok(Self::Scraper),
            "analyzer" => Ok(Self::Analyzer),
            "news" => Ok(Self::News),
            other => Err(PipelineError::Validation(format!("unknown tool: {other}"))),
        }
    }
}

impl fmt::Display for Tool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A single search result returned from a search or news provider.
///
/// Unique by URL within a result set; `rank` is the provider's 0-based
/// position and drives downstream ordering and tie-breaking.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResult {
    /// The title of the result page.
    pub title: String,
    /// The URL of the result.
    pub url: String,
    /// A text snippet summarising the page content.
    pub snippet: String,
    /// 0-based position in the provider's ranking.
    pub rank: usize,
    /// Publishing outlet, for news results.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    /// Publication timestamp, for news results.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub published_at: Option<DateTime<Utc>>,
}

/// Extracted readable content from a successfully fetched page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScrapedDocument {
    /// The URL that was fetched.
    pub url: String,
    /// The page title extracted from HTML.
    pub title: String,
    /// Cleaned, readable text content with HTML boilerplate stripped.
    pub text: String,
    /// Character length of the extracted text.
    pub char_count: usize,
    /// When the fetch completed.
    pub fetched_at: DateTime<Utc>,
    /// Rank of the originating search result.
    pub source_rank: usize,
}

/// A scraped document with a relevance score and final position.
///
/// Ordering invariant: score descending, ties broken by `source_rank`
/// ascending.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankedDocument {
    /// The underlying document.
    pub document: ScrapedDocument,
    /// Relevance score from the ranking strategy (higher is better).
    pub score: f64,
    /// 0-based position after sorting and truncation.
    pub final_rank: usize,
}

/// A cited source in a synthesized answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceRef {
    pub title: String,
    pub url: String,
}

/// A structured answer produced by the Synthesizer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SynthesisResult {
    /// Concise summary answering the query.
    pub summary: String,
    /// Ordered key points extracted from the sources.
    pub key_points: Vec<String>,
    /// Ordered source citations, always populated from the ranked documents.
    pub sources: Vec<SourceRef>,
}

/// Per-request option overrides.
///
/// Only the subset of options that affects output; these participate in the
/// cache fingerprint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestOptions {
    /// Override for the search provider result cap.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search_results_limit: Option<usize>,
    /// Override for the number of documents retained after ranking.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_k: Option<usize>,
    /// For the news tool: also scrape the article bodies.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub include_content: Option<bool>,
}

/// An incoming research request at the tool-dispatch boundary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResearchRequest {
    /// The user's raw query text.
    pub query: String,
    /// The selected tool.
    pub tool: Tool,
    /// Whether to use the language-model collaborator for refinement,
    /// narratives, and synthesis.
    #[serde(default = "default_use_llm")]
    pub use_llm: bool,
    /// Optional per-request overrides.
    #[serde(default)]
    pub options: RequestOptions,
}

fn default_use_llm() -> bool {
    true
}

/// The assembled response for a research request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseEnvelope {
    /// The original query, always preserved.
    pub query: String,
    /// The refined query used for retrieval.
    pub refined_query: String,
    /// The tool that produced this response.
    pub tool: Tool,
    /// Ranked search results, for tools that return them.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub results: Option<Vec<SearchResult>>,
    /// Extracted documents, for tools that scrape.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub documents: Option<Vec<ScrapedDocument>>,
    /// Synthesized structured answer, for the analyzer tool.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<SynthesisResult>,
    /// Optional LLM-generated Markdown narrative over the raw results.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub llm_response: Option<String>,
    /// True when any recovered failure reduced the returned data.
    pub partial: bool,
    /// True when a preferred path (LLM synthesis or narrative) fell back
    /// to a deterministic substitute.
    pub degraded: bool,
    /// True when this envelope was served from the response cache.
    pub cached: bool,
    /// Wall-clock duration of the pipeline run in milliseconds.
    pub timing_ms: u64,
}
