//! Query refinement: turning conversational queries into search keywords.
//!
//! Refinement never fails. When a language model is available and enabled it
//! gets the first shot; any model failure, or an empty completion, falls back
//! silently to the deterministic rule-based path.

use std::sync::Arc;

use crate::llm::LlmProvider;
use crate::types::Tool;

/// Conversational phrases that add no retrieval value.
const FILLER_PHRASES: &[&str] = &[
    "please tell me",
    "i want to know",
    "can you tell me",
    "i'm looking for",
    "i'd like to know",
    "inform me about",
    "give me information about",
    "i need information on",
];

/// Leading question forms simplified to keyword queries.
const QUESTION_PREFIXES: &[&str] = &[
    "what is ",
    "who is ",
    "where is ",
    "when is ",
    "how to ",
    "why is ",
    "can you ",
];

/// Words that already signal recency in a news query.
const RECENCY_MARKERS: &[&str] = &[
    "latest", "recent", "news", "update", "updates", "current", "today",
];

/// A coarse classification of what the query is after.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryIntent {
    /// Definition or fact lookup.
    Factual,
    /// How-to, guides, learning material.
    Exploratory,
    /// Recent events.
    News,
    /// Head-to-head comparisons.
    Comparison,
    /// Recommendations and reviews.
    Opinion,
}

/// Classify a raw query by surface patterns. Defaults to [`QueryIntent::Factual`].
pub fn classify_intent(query: &str) -> QueryIntent {
    let lower = query.to_lowercase();
    let has = |needles: &[&str]| needles.iter().any(|n| lower.contains(n));

    if has(&[
        "compare",
        "difference between",
        " vs ",
        " vs.",
        "versus",
        "pros and cons",
        "advantages",
        "disadvantages",
    ]) {
        QueryIntent::Comparison
    } else if has(&[
        "best ",
        "worst ",
        "should i",
        "recommend",
        "review",
        "opinion",
        "thoughts on",
    ]) {
        QueryIntent::Opinion
    } else if has(&[
        "latest",
        "recent",
        "news",
        "update",
        "current",
        "today",
        "this week",
        "this month",
        "developments",
    ]) {
        QueryIntent::News
    } else if has(&[
        "how to", "how do", "ways to", "methods for", "steps", "guide", "tutorial", "learn",
    ]) {
        QueryIntent::Exploratory
    } else {
        QueryIntent::Factual
    }
}

/// Rule-based refinement: strip filler phrases and leading question forms,
/// collapse whitespace, and for the news tool add a recency cue when the
/// query carries none.
///
/// Matching is case-insensitive but removal cuts from the original string,
/// so surviving text keeps its casing. An input that reduces to nothing
/// falls back to the trimmed original.
pub fn refine_deterministic(raw: &str, tool: Tool) -> String {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return String::new();
    }

    let mut refined = trimmed.to_owned();
    for phrase in FILLER_PHRASES {
        refined = remove_phrase_ci(&refined, phrase);
    }

    let lower = refined.to_lowercase();
    for prefix in QUESTION_PREFIXES {
        if lower.starts_with(prefix) && refined.is_char_boundary(prefix.len()) {
            refined = refined[prefix.len()..].to_owned();
            break;
        }
    }

    let mut refined = collapse_whitespace(&refined);
    if refined.is_empty() {
        refined = collapse_whitespace(trimmed);
    }

    if tool == Tool::News {
        let lower = refined.to_lowercase();
        if !RECENCY_MARKERS.iter().any(|m| lower.contains(m)) {
            refined.push_str(" latest news");
        }
    }

    refined
}

/// Remove every case-insensitive occurrence of `phrase`, preserving the
/// casing of the text around it.
fn remove_phrase_ci(text: &str, phrase: &str) -> String {
    let lower_text = text.to_lowercase();
    let lower_phrase = phrase.to_lowercase();
    // Lowercasing can change byte lengths for some scripts; positions found
    // in the lowered copy are only valid when the lengths line up.
    if lower_text.len() != text.len() {
        return text.to_owned();
    }
    let mut out = String::with_capacity(text.len());
    let mut cursor = 0;
    while let Some(pos) = lower_text[cursor..].find(&lower_phrase) {
        let start = cursor + pos;
        out.push_str(&text[cursor..start]);
        cursor = start + lower_phrase.len();
    }
    out.push_str(&text[cursor..]);
    out
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Refines raw queries before retrieval, optionally with model assistance.
pub struct QueryRefiner {
    llm: Option<Arc<dyn LlmProvider>>,
}

impl QueryRefiner {
    pub fn new(llm: Option<Arc<dyn LlmProvider>>) -> Self {
        Self { llm }
    }

    /// Refine a raw query for the given tool. Infallible: model errors and
    /// empty completions fall back to the rule-based path.
    pub async fn refine(&self, raw: &str, tool: Tool, use_llm: bool) -> String {
        if use_llm {
            if let Some(llm) = &self.llm {
                match llm.complete(&refinement_prompt(raw)).await {
                    Ok(completion) => {
                        let refined = completion.trim().trim_matches(['\'', '"']).trim();
                        if !refined.is_empty() {
                            tracing::debug!(raw, refined, "query refined via LLM");
                            return refined.to_owned();
                        }
                        tracing::debug!(raw, "LLM returned empty refinement, using rules");
                    }
                    Err(err) => {
                        tracing::debug!(raw, error = %err, "LLM refinement failed, using rules");
                    }
                }
            }
        }
        refine_deterministic(raw, tool)
    }
}

fn refinement_prompt(raw: &str) -> String {
    format!(
        "Convert this user query into an optimal web search query. \
         Make it concise, use relevant keywords, and avoid special search \
         operators unless necessary.\n\n\
         Original query: \"{raw}\"\n\n\
         Return only the refined search query, with no explanation."
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::LlmError;
    use async_trait::async_trait;

    #[test]
    fn filler_phrases_removed_case_insensitively() {
        let refined = refine_deterministic("Please tell me about Rust ownership", Tool::Search);
        assert_eq!(refined, "about Rust ownership");
    }

    #[test]
    fn question_prefix_stripped() {
        let refined = refine_deterministic("What is the borrow checker", Tool::Search);
        assert_eq!(refined, "the borrow checker");
    }

    #[test]
    fn casing_preserved_around_removed_text() {
        let refined = refine_deterministic("I want to know Tokio Runtime internals", Tool::Search);
        assert_eq!(refined, "Tokio Runtime internals");
    }

    #[test]
    fn whitespace_collapsed() {
        let refined = refine_deterministic("  rust   async\t\truntime  ", Tool::Search);
        assert_eq!(refined, "rust async runtime");
    }

    #[test]
    fn empty_reduction_falls_back_to_original() {
        let refined = refine_deterministic("can you tell me", Tool::Search);
        assert_eq!(refined, "can you tell me");
    }

    #[test]
    fn empty_input_stays_empty() {
        assert_eq!(refine_deterministic("   ", Tool::Search), "");
    }

    #[test]
    fn news_tool_adds_recency_cue() {
        let refined = refine_deterministic("rust foundation funding", Tool::News);
        assert_eq!(refined, "rust foundation funding latest news");
    }

    #[test]
    fn news_tool_keeps_existing_recency() {
        let refined = refine_deterministic("latest rust releases", Tool::News);
        assert_eq!(refined, "latest rust releases");
    }

    #[test]
    fn intent_classification() {
        assert_eq!(classify_intent("rust vs go performance"), QueryIntent::Comparison);
        assert_eq!(classify_intent("best rust web framework"), QueryIntent::Opinion);
        assert_eq!(classify_intent("latest rust news"), QueryIntent::News);
        assert_eq!(classify_intent("how to learn rust"), QueryIntent::Exploratory);
        assert_eq!(classify_intent("rust borrow checker"), QueryIntent::Factual);
    }

    struct CannedLlm(Result<String, ()>);

    #[async_trait]
    impl LlmProvider for CannedLlm {
        async fn complete(&self, _prompt: &str) -> Result<String, LlmError> {
            self.0
                .clone()
                .map_err(|_| LlmError::Transport("down".into()))
        }

        fn name(&self) -> &str {
            "canned"
        }
    }

    #[tokio::test]
    async fn llm_refinement_used_when_available() {
        let refiner = QueryRefiner::new(Some(Arc::new(CannedLlm(Ok("\"rust ownership\"".into())))));
        let refined = refiner.refine("tell me about rust ownership", Tool::Search, true).await;
        assert_eq!(refined, "rust ownership");
    }

    #[tokio::test]
    async fn llm_failure_falls_back_silently() {
        let refiner = QueryRefiner::new(Some(Arc::new(CannedLlm(Err(())))));
        let refined = refiner
            .refine("what is the borrow checker", Tool::Search, true)
            .await;
        assert_eq!(refined, "the borrow checker");
    }

    #[tokio::test]
    async fn empty_llm_output_falls_back() {
        let refiner = QueryRefiner::new(Some(Arc::new(CannedLlm(Ok("  ".into())))));
        let refined = refiner.refine("what is wasm", Tool::Search, true).await;
        assert_eq!(refined, "wasm");
    }

    #[tokio::test]
    async fn use_llm_false_skips_model() {
        let refiner = QueryRefiner::new(Some(Arc::new(CannedLlm(Ok("model output".into())))));
        let refined = refiner.refine("what is wasm", Tool::Search, false).await;
        assert_eq!(refined, "wasm");
    }
}
