//! Relevance ranking of scraped documents against the refined query.
//!
//! The scoring strategy sits behind a trait so alternative scorers can be
//! slotted in; the default is a deterministic lexical scorer. Ranking
//! itself is pure: no I/O, no randomness, same inputs always produce the
//! same order.

use crate::types::{RankedDocument, ScrapedDocument};

/// Scores one document against the query terms. Higher is better.
pub trait ScoringStrategy: Send + Sync {
    fn score(&self, query_terms: &[String], document: &ScrapedDocument) -> f64;
}

/// Deterministic lexical scorer.
///
/// Combines three signals:
/// - term coverage: the fraction of distinct query terms present in the
///   document text (dominant signal, so more matched terms always wins);
/// - a title bonus of 0.5 per query term present in the title, capped at 1.5;
/// - occurrence density: total occurrences of query terms per kilochar,
///   capped at 1.0, as a small tie-splitter.
#[derive(Debug, Default)]
pub struct LexicalScorer;

impl ScoringStrategy for LexicalScorer {
    fn score(&self, query_terms: &[String], document: &ScrapedDocument) -> f64 {
        if query_terms.is_empty() {
            return 0.0;
        }

        let text = document.text.to_lowercase();
        let title = document.title.to_lowercase();

        let mut covered = 0usize;
        let mut title_hits = 0usize;
        let mut occurrences = 0usize;

        for term in query_terms {
            let count = text.matches(term.as_str()).count();
            if count > 0 {
                covered += 1;
                occurrences += count;
            }
            if title.contains(term.as_str()) {
                title_hits += 1;
            }
        }

        let coverage = covered as f64 / query_terms.len() as f64;
        let title_bonus = (title_hits as f64 * 0.5).min(1.5);
        let density = if document.char_count == 0 {
            0.0
        } else {
            (occurrences as f64 * 1000.0 / document.char_count as f64).min(1.0)
        };

        // Coverage dominates: one extra matched term (worth >= 1/len, and
        // len is small) outweighs the capped density contribution.
        coverage * 10.0 + title_bonus + density
    }
}

/// Ranks scraped documents and keeps the best `top_k`.
pub struct ContentRanker {
    strategy: Box<dyn ScoringStrategy>,
}

impl Default for ContentRanker {
    fn default() -> Self {
        Self {
            strategy: Box::new(LexicalScorer),
        }
    }
}

impl ContentRanker {
    pub fn new(strategy: Box<dyn ScoringStrategy>) -> Self {
        Self { strategy }
    }

    /// Score all documents against the refined query, order them by score
    /// descending with ties broken by source rank ascending, truncate to
    /// `top_k`, and assign contiguous final ranks.
    pub fn rank(
        &self,
        refined_query: &str,
        documents: Vec<ScrapedDocument>,
        top_k: usize,
    ) -> Vec<RankedDocument> {
        let query_terms = query_terms(refined_query);

        let mut scored: Vec<RankedDocument> = documents
            .into_iter()
            .map(|document| {
                let score = self.strategy.score(&query_terms, &document);
                RankedDocument {
                    document,
                    score,
                    final_rank: 0,
                }
            })
            .collect();

        scored.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.document.source_rank.cmp(&b.document.source_rank))
        });
        scored.truncate(top_k);

        for (index, ranked) in scored.iter_mut().enumerate() {
            ranked.final_rank = index;
        }
        scored
    }
}

/// Lowercased distinct query terms, short stop-words removed.
fn query_terms(query: &str) -> Vec<String> {
    let mut terms: Vec<String> = query
        .to_lowercase()
        .split_whitespace()
        .filter(|t| t.len() > 2)
        .map(str::to_owned)
        .collect();
    terms.sort();
    terms.dedup();
    terms
}
