//! Answer synthesis over ranked documents, with deterministic fallbacks.
//!
//! The synthesizer asks the language model for a structured JSON answer and
//! degrades to an extractive summary when the model is unavailable, fails,
//! or returns something unparsable. It also produces the Markdown
//! narratives for the non-analyzer tools, each with a deterministic
//! formatter behind it. Source citations always come from the ranked
//! documents, never from model output.

use std::sync::Arc;

use serde::Deserialize;

use crate::llm::{complete_with_retry, LlmProvider};
use crate::types::{RankedDocument, ScrapedDocument, SearchResult, SourceRef, SynthesisResult};

/// A synthesis answer plus whether it came from the fallback path.
#[derive(Debug)]
pub struct SynthesisOutcome {
    pub result: SynthesisResult,
    pub degraded: bool,
}

/// A narrative plus whether it came from the fallback formatter.
#[derive(Debug)]
pub struct NarrativeOutcome {
    pub text: String,
    pub degraded: bool,
}

/// Synthesizes structured answers and tool narratives.
pub struct Synthesizer {
    llm: Option<Arc<dyn LlmProvider>>,
    max_prompt_chars: usize,
}

#[derive(Deserialize)]
struct SynthesisPayload {
    summary: String,
    #[serde(default)]
    key_points: Vec<String>,
}

impl Synthesizer {
    pub fn new(llm: Option<Arc<dyn LlmProvider>>, max_prompt_chars: usize) -> Self {
        Self {
            llm,
            max_prompt_chars,
        }
    }

    /// Produce a structured answer from the ranked documents.
    ///
    /// `degraded` is true whenever the model path was wanted but the
    /// extractive fallback answered instead.
    pub async fn synthesize(
        &self,
        query: &str,
        ranked: &[RankedDocument],
        use_llm: bool,
    ) -> SynthesisOutcome {
        let sources = sources_of(ranked);

        if ranked.is_empty() {
            return SynthesisOutcome {
                result: SynthesisResult {
                    summary: "No information found for the query.".into(),
                    key_points: Vec::new(),
                    sources,
                },
                degraded: false,
            };
        }

        if use_llm {
            if let Some(llm) = &self.llm {
                let prompt = self.build_synthesis_prompt(query, ranked);
                match complete_with_retry(llm.as_ref(), &prompt).await {
                    Ok(completion) => match parse_synthesis(&completion) {
                        Some(payload) => {
                            return SynthesisOutcome {
                                result: SynthesisResult {
                                    summary: payload.summary,
                                    key_points: payload.key_points,
                                    sources,
                                },
                                degraded: false,
                            };
                        }
                        None => {
                            tracing::warn!("synthesis response unparsable, using extractive fallback");
                        }
                    },
                    Err(err) => {
                        tracing::warn!(error = %err, "synthesis call failed, using extractive fallback");
                    }
                }
            }
            return SynthesisOutcome {
                result: extractive_synthesis(ranked, sources),
                degraded: true,
            };
        }

        SynthesisOutcome {
            result: extractive_synthesis(ranked, sources),
            degraded: false,
        }
    }

    /// Build the synthesis prompt within the character budget.
    ///
    /// The instruction scaffold is charged against the budget first;
    /// documents fill what is left in rank order, with later documents
    /// truncated first. The returned prompt never exceeds
    /// `max_prompt_chars`.
    fn build_synthesis_prompt(&self, query: &str, ranked: &[RankedDocument]) -> String {
        let header = format!(
            "You are an expert content analyst synthesizing information from \
             multiple web sources.\n\nUser query: \"{query}\"\n\n\
             Here is content from relevant websites:\n\n"
        );
        let footer = "Based on these sources, provide:\n\
             1. A concise summary (2-3 paragraphs) answering the query\n\
             2. A list of 5-7 key points extracted from the sources\n\n\
             Respond with a JSON object of exactly this shape:\n\
             {\"summary\": \"...\", \"key_points\": [\"...\", \"...\"]}\n\n\
             Only return the JSON object, nothing else.";

        let mut remaining = self
            .max_prompt_chars
            .saturating_sub(header.len() + footer.len());
        let mut prompt = header;

        for (index, ranked_doc) in ranked.iter().enumerate() {
            let doc = &ranked_doc.document;
            let block_header = format!(
                "Source {}:\nTitle: {}\nURL: {}\nContent: ",
                index + 1,
                doc.title,
                doc.url
            );
            // Not enough room left for a meaningful excerpt.
            if remaining <= block_header.len() + 80 {
                break;
            }
            let content_budget = remaining - block_header.len() - 2;
            let content = truncate_chars(&doc.text, content_budget);

            remaining -= block_header.len() + content.len() + 2;
            prompt.push_str(&block_header);
            prompt.push_str(&content);
            prompt.push_str("\n\n");
        }

        prompt.push_str(footer);
        prompt
    }

    /// Markdown narrative over plain search results.
    pub async fn narrate_results(
        &self,
        query: &str,
        results: &[SearchResult],
    ) -> NarrativeOutcome {
        if results.is_empty() {
            return NarrativeOutcome {
                text: "No search results found to process.".into(),
                degraded: false,
            };
        }

        let mut listing = String::new();
        for (i, result) in results.iter().enumerate() {
            listing.push_str(&format!(
                "Result {}:\nTitle: {}\nURL: {}\nSnippet: {}\n\n",
                i + 1,
                result.title,
                result.url,
                result.snippet
            ));
        }
        let prompt = format!(
            "You are an expert web researcher.\n\nUser query: \"{query}\"\n\n\
             Here are the search results:\n\n{listing}\
             Write a Markdown answer that addresses the query, cites sources \
             as [1], [2], etc., and ends with a numbered References section."
        );

        self.narrate(prompt, || format_basic_results(query, results))
            .await
    }

    /// Markdown narrative over scraped documents.
    pub async fn narrate_documents(
        &self,
        query: &str,
        documents: &[ScrapedDocument],
    ) -> NarrativeOutcome {
        if documents.is_empty() {
            return NarrativeOutcome {
                text: "No content could be scraped to process.".into(),
                degraded: false,
            };
        }

        let mut listing = String::new();
        let mut remaining = self.max_prompt_chars;
        for (i, doc) in documents.iter().enumerate() {
            if remaining < 200 {
                break;
            }
            let excerpt = truncate_chars(&doc.text, remaining.min(1_200));
            remaining = remaining.saturating_sub(excerpt.len() + 100);
            listing.push_str(&format!(
                "Source {}:\nTitle: {}\nURL: {}\nContent: {}\n\n",
                i + 1,
                doc.title,
                doc.url,
                excerpt
            ));
        }
        let prompt = format!(
            "You are an expert content analyst.\n\nUser query: \"{query}\"\n\n\
             Here is content scraped from relevant pages:\n\n{listing}\
             Write a Markdown answer that addresses the query using this \
             content, cites sources as [1], [2], etc., and ends with a \
             numbered References section."
        );

        self.narrate(prompt, || format_basic_documents(query, documents))
            .await
    }

    /// Markdown narrative over news results.
    pub async fn narrate_news(&self, query: &str, results: &[SearchResult]) -> NarrativeOutcome {
        if results.is_empty() {
            return NarrativeOutcome {
                text: "No news articles found to process.".into(),
                degraded: false,
            };
        }

        let mut listing = String::new();
        for (i, article) in results.iter().enumerate() {
            let published = article
                .published_at
                .map(|dt| dt.to_rfc3339())
                .unwrap_or_else(|| "Unknown date".into());
            listing.push_str(&format!(
                "Article {}:\nTitle: {}\nSource: {}\nPublished: {}\nURL: {}\nSnippet: {}\n\n",
                i + 1,
                article.title,
                article.source.as_deref().unwrap_or("Unknown source"),
                published,
                article.url,
                article.snippet
            ));
        }
        let prompt = format!(
            "You are an expert news reporter.\n\nUser query about news: \"{query}\"\n\n\
             Here are the relevant articles:\n\n{listing}\
             Summarise the key developments, cite sources as [1], [2], etc., \
             and end with a numbered References section, in Markdown."
        );

        self.narrate(prompt, || format_basic_news(query, results)).await
    }

    async fn narrate<F>(&self, prompt: String, fallback: F) -> NarrativeOutcome
    where
        F: FnOnce() -> String,
    {
        if let Some(llm) = &self.llm {
            match complete_with_retry(llm.as_ref(), &prompt).await {
                Ok(text) if !text.trim().is_empty() => {
                    return NarrativeOutcome {
                        text,
                        degraded: false,
                    };
                }
                Ok(_) => {
                    tracing::warn!("empty narrative from LLM, using basic formatting");
                }
                Err(err) => {
                    tracing::warn!(error = %err, "narrative call failed, using basic formatting");
                }
            }
        }
        NarrativeOutcome {
            text: fallback(),
            degraded: true,
        }
    }
}

fn sources_of(ranked: &[RankedDocument]) -> Vec<SourceRef> {
    ranked
        .iter()
        .map(|r| SourceRef {
            title: if r.document.title.is_empty() {
                "Untitled".into()
            } else {
                r.document.title.clone()
            },
            url: r.document.url.clone(),
        })
        .collect()
}

/// Parse a synthesis completion, tolerating Markdown code fences.
fn parse_synthesis(completion: &str) -> Option<SynthesisPayload> {
    let mut cleaned = completion.trim();
    if let Some(stripped) = cleaned.strip_prefix("```json") {
        cleaned = stripped;
    } else if let Some(stripped) = cleaned.strip_prefix("```") {
        cleaned = stripped;
    }
    if let Some(stripped) = cleaned.strip_suffix("```") {
        cleaned = stripped;
    }
    let payload: SynthesisPayload = serde_json::from_str(cleaned.trim()).ok()?;
    if payload.summary.trim().is_empty() {
        return None;
    }
    Some(payload)
}

/// Deterministic fallback: leading sentences of the best documents for the
/// summary, titles (or first sentences) for the key points.
fn extractive_synthesis(ranked: &[RankedDocument], sources: Vec<SourceRef>) -> SynthesisResult {
    let summary = ranked
        .iter()
        .take(3)
        .map(|r| leading_sentences(&r.document.text, 2))
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(" ");

    let key_points = ranked
        .iter()
        .take(7)
        .map(|r| {
            if r.document.title.is_empty() {
                leading_sentences(&r.document.text, 1)
            } else {
                r.document.title.clone()
            }
        })
        .filter(|p| !p.is_empty())
        .collect();

    SynthesisResult {
        summary,
        key_points,
        sources,
    }
}

/// The first `n` sentences of `text`, capped at 400 characters.
fn leading_sentences(text: &str, n: usize) -> String {
    let mut out = String::new();
    let mut sentences = 0;
    for ch in text.chars() {
        out.push(ch);
        if matches!(ch, '.' | '!' | '?') {
            sentences += 1;
            if sentences >= n {
                break;
            }
        }
        if out.len() >= 400 {
            break;
        }
    }
    out.trim().to_owned()
}

fn truncate_chars(text: &str, max: usize) -> String {
    if text.len() <= max {
        return text.to_owned();
    }
    let mut end = max;
    while !text.is_char_boundary(end) && end > 0 {
        end -= 1;
    }
    text[..end].to_owned()
}

fn format_basic_results(query: &str, results: &[SearchResult]) -> String {
    let mut formatted = format!("Here are the search results for \"{query}\":\n\n");
    for (i, result) in results.iter().enumerate() {
        formatted.push_str(&format!(
            "{}. **{}**\n   {}\n   [Link]({})\n\n",
            i + 1,
            result.title,
            result.snippet,
            result.url
        ));
    }
    formatted
}

fn format_basic_documents(query: &str, documents: &[ScrapedDocument]) -> String {
    let mut formatted = format!("Here is the content retrieved for \"{query}\":\n\n");
    for (i, doc) in documents.iter().enumerate() {
        let excerpt = truncate_chars(&doc.text, 500);
        formatted.push_str(&format!(
            "{}. **{}**\n   Source: {}\n\n   {}\n\n",
            i + 1,
            doc.title,
            doc.url,
            excerpt
        ));
    }
    formatted
}

fn format_basic_news(query: &str, results: &[SearchResult]) -> String {
    let mut formatted = format!("Here are the latest news articles for \"{query}\":\n\n");
    for (i, article) in results.iter().enumerate() {
        let date = article
            .published_at
            .map(|dt| dt.format("%Y-%m-%d").to_string())
            .unwrap_or_else(|| "Unknown date".into());
        formatted.push_str(&format!(
            "{}. **{}**\n   *{}* | {}\n   {}\n   [Read more]({})\n\n",
            i + 1,
            article.title,
            article.source.as_deref().unwrap_or("Unknown source"),
            date,
            article.snippet,
            article.url
        ));
    }
    formatted
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::LlmError;
    use async_trait::async_trait;
    use chrono::Utc;

    struct CannedLlm(Result<String, ()>);

    #[async_trait]
    impl LlmProvider for CannedLlm {
        async fn complete(&self, _prompt: &str) -> Result<String, LlmError> {
            self.0
                .clone()
                .map_err(|_| LlmError::Status(401))
        }

        fn name(&self) -> &str {
            "canned"
        }
    }

    fn ranked_doc(title: &str, text: &str, rank: usize) -> RankedDocument {
        RankedDocument {
            document: ScrapedDocument {
                url: format!("https://example.com/{rank}"),
                title: title.into(),
                text: text.into(),
                char_count: text.chars().count(),
                fetched_at: Utc::now(),
                source_rank: rank,
            },
            score: 1.0,
            final_rank: rank,
        }
    }

    #[tokio::test]
    async fn valid_llm_json_used_with_local_sources() {
        let llm = Arc::new(CannedLlm(Ok(
            r#"{"summary": "Rust is safe.", "key_points": ["memory safety"]}"#.into(),
        )));
        let synth = Synthesizer::new(Some(llm), 8_000);
        let ranked = vec![ranked_doc("Rust intro", "Rust is a language. It is fast.", 0)];
        let outcome = synth.synthesize("rust", &ranked, true).await;
        assert!(!outcome.degraded);
        assert_eq!(outcome.result.summary, "Rust is safe.");
        assert_eq!(outcome.result.sources.len(), 1);
        assert_eq!(outcome.result.sources[0].url, "https://example.com/0");
    }

    #[tokio::test]
    async fn fenced_json_parsed() {
        let llm = Arc::new(CannedLlm(Ok(
            "```json\n{\"summary\": \"ok\", \"key_points\": []}\n```".into(),
        )));
        let synth = Synthesizer::new(Some(llm), 8_000);
        let ranked = vec![ranked_doc("T", "Some text here.", 0)];
        let outcome = synth.synthesize("q", &ranked, true).await;
        assert!(!outcome.degraded);
        assert_eq!(outcome.result.summary, "ok");
    }

    #[tokio::test]
    async fn malformed_json_falls_back_extractively() {
        let llm = Arc::new(CannedLlm(Ok("this is not json at all".into())));
        let synth = Synthesizer::new(Some(llm), 8_000);
        let ranked = vec![
            ranked_doc("Doc A", "First sentence. Second sentence. Third one.", 0),
            ranked_doc("Doc B", "Another page of text. With more words.", 1),
        ];
        let outcome = synth.synthesize("q", &ranked, true).await;
        assert!(outcome.degraded);
        assert!(outcome.result.summary.contains("First sentence."));
        assert_eq!(outcome.result.key_points, vec!["Doc A", "Doc B"]);
        assert_eq!(outcome.result.sources.len(), 2);
    }

    #[tokio::test]
    async fn llm_failure_falls_back_extractively() {
        let llm = Arc::new(CannedLlm(Err(())));
        let synth = Synthesizer::new(Some(llm), 8_000);
        let ranked = vec![ranked_doc("Doc", "One sentence. Another.", 0)];
        let outcome = synth.synthesize("q", &ranked, true).await;
        assert!(outcome.degraded);
        assert!(!outcome.result.summary.is_empty());
    }

    #[tokio::test]
    async fn use_llm_false_is_deterministic_not_degraded() {
        let synth = Synthesizer::new(None, 8_000);
        let ranked = vec![ranked_doc("Doc", "Plain text. More text.", 0)];
        let outcome = synth.synthesize("q", &ranked, false).await;
        assert!(!outcome.degraded);
        assert!(outcome.result.summary.contains("Plain text."));
    }

    #[tokio::test]
    async fn empty_input_yields_empty_answer() {
        let synth = Synthesizer::new(None, 8_000);
        let outcome = synth.synthesize("q", &[], true).await;
        assert!(outcome.result.key_points.is_empty());
        assert!(outcome.result.sources.is_empty());
    }

    #[test]
    fn prompt_respects_character_budget() {
        let synth = Synthesizer::new(None, 2_000);
        let ranked: Vec<RankedDocument> = (0..5)
            .map(|i| ranked_doc("Long doc", &"word ".repeat(2_000), i))
            .collect();
        let prompt = synth.build_synthesis_prompt("query", &ranked);
        assert!(prompt.len() <= 2_000);
        assert!(prompt.contains("Source 1:"));
    }

    #[test]
    fn prompt_scaffold_counts_against_budget() {
        let synth = Synthesizer::new(None, 1_000);
        let ranked: Vec<RankedDocument> = (0..3)
            .map(|i| ranked_doc("Padding", &"filler text ".repeat(400), i))
            .collect();
        let prompt = synth.build_synthesis_prompt("query", &ranked);
        assert!(prompt.chars().count() <= 1_000, "prompt was {} chars", prompt.chars().count());
    }

    #[test]
    fn prompt_prefers_earlier_documents() {
        let synth = Synthesizer::new(None, 1_500);
        let ranked: Vec<RankedDocument> = (0..4)
            .map(|i| ranked_doc(&format!("Doc {i}"), &"content ".repeat(500), i))
            .collect();
        let prompt = synth.build_synthesis_prompt("query", &ranked);
        assert!(prompt.contains("Doc 0"));
        assert!(!prompt.contains("Doc 3"));
    }

    #[tokio::test]
    async fn basic_results_narrative_when_no_llm() {
        let synth = Synthesizer::new(None, 8_000);
        let results = vec![SearchResult {
            title: "Rust Book".into(),
            url: "https://doc.rust-lang.org/book".into(),
            snippet: "Learn Rust".into(),
            rank: 0,
            source: None,
            published_at: None,
        }];
        let narrative = synth.narrate_results("rust", &results).await;
        assert!(narrative.degraded);
        assert!(narrative.text.contains("**Rust Book**"));
        assert!(narrative.text.contains("https://doc.rust-lang.org/book"));
    }

    #[tokio::test]
    async fn news_narrative_includes_outlet_and_date() {
        let synth = Synthesizer::new(None, 8_000);
        let results = vec![SearchResult {
            title: "Release".into(),
            url: "https://news.example.com/release".into(),
            snippet: "A new release".into(),
            rank: 0,
            source: Some("Example Wire".into()),
            published_at: Some(Utc::now()),
        }];
        let narrative = synth.narrate_news("releases", &results).await;
        assert!(narrative.degraded);
        assert!(narrative.text.contains("*Example Wire*"));
    }

    #[tokio::test]
    async fn llm_narrative_used_when_available() {
        let llm = Arc::new(CannedLlm(Ok("## Answer\nCited [1].".into())));
        let synth = Synthesizer::new(Some(llm), 8_000);
        let results = vec![SearchResult {
            title: "T".into(),
            url: "https://t.com".into(),
            snippet: "s".into(),
            rank: 0,
            source: None,
            published_at: None,
        }];
        let narrative = synth.narrate_results("q", &results).await;
        assert!(!narrative.degraded);
        assert!(narrative.text.contains("## Answer"));
    }
}
