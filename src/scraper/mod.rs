//! Concurrent page scraper with per-host politeness and bounded retries.
//!
//! Targets are deduplicated by normalised URL, then worked through a fixed
//! pool of workers fed from a bounded queue. Each task honours robots.txt,
//! the per-host limiter, a per-attempt fetch deadline, and a transient-retry
//! budget with exponential backoff. The whole run is bounded by an
//! operation deadline; whatever committed before it fires is returned as a
//! partial result.

pub mod extract;
pub mod fetch;
pub mod limiter;
pub mod robots;
pub mod task;
pub mod url_normalize;

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Utc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::timeout;

use crate::config::PipelineConfig;
use crate::types::ScrapedDocument;

use fetch::{FetchedPage, PageFetcher};
use limiter::DomainLimiter;
use robots::RobotsCache;
use task::{FetchFailure, ScrapeTarget, TaskReport, TaskState};
use url_normalize::{host_of, normalize_url};

/// Result of a scrape run.
#[derive(Debug)]
pub struct ScrapeOutcome {
    /// Successfully extracted documents, ordered by source rank.
    pub documents: Vec<ScrapedDocument>,
    /// True when any task failed, was skipped, or was cut off by the
    /// operation deadline.
    pub partial: bool,
    /// One report per task that reached a terminal state.
    pub reports: Vec<TaskReport>,
}

/// Tunables and collaborators shared by every worker in a run.
struct TaskContext {
    fetcher: Arc<dyn PageFetcher>,
    limiter: DomainLimiter,
    robots: RobotsCache,
    respect_robots: bool,
    max_retries: u32,
    retry_backoff: Duration,
    fetch_timeout: Duration,
    min_content_length: usize,
    max_content_length: usize,
    documents: Mutex<Vec<ScrapedDocument>>,
    reports: Mutex<Vec<TaskReport>>,
}

/// Concurrent scraper over a fixed worker pool.
pub struct Scraper {
    config: PipelineConfig,
    fetcher: Arc<dyn PageFetcher>,
}

impl Scraper {
    pub fn new(config: PipelineConfig, fetcher: Arc<dyn PageFetcher>) -> Self {
        Self { config, fetcher }
    }

    /// Scrape the given targets.
    ///
    /// Never fails: fetch and extraction problems degrade to a partial
    /// outcome. An empty target list yields an empty, non-partial outcome.
    pub async fn scrape(&self, targets: &[ScrapeTarget]) -> ScrapeOutcome {
        let tasks = dedup_targets(targets);
        if tasks.is_empty() {
            return ScrapeOutcome {
                documents: Vec::new(),
                partial: false,
                reports: Vec::new(),
            };
        }
        let total = tasks.len();

        let ctx = Arc::new(TaskContext {
            fetcher: self.fetcher.clone(),
            limiter: DomainLimiter::new(
                self.config.per_host_concurrency,
                self.config.request_delay,
            ),
            robots: RobotsCache::new(self.fetcher.clone(), self.config.fetch_timeout),
            respect_robots: self.config.respect_robots,
            max_retries: self.config.max_retries,
            retry_backoff: self.config.retry_backoff,
            fetch_timeout: self.config.fetch_timeout,
            min_content_length: self.config.min_content_length,
            max_content_length: self.config.max_content_length,
            documents: Mutex::new(Vec::new()),
            reports: Mutex::new(Vec::new()),
        });

        let pool = self.config.max_concurrent_requests;
        let (tx, rx) = mpsc::channel::<ScrapeTarget>(pool);
        let rx = Arc::new(tokio::sync::Mutex::new(rx));

        // Workers must be running before the bounded queue is fed, or a
        // target list longer than the queue capacity would stall the feeder.
        let mut handles: Vec<JoinHandle<()>> = (0..pool)
            .map(|_| {
                let ctx = ctx.clone();
                let rx = rx.clone();
                tokio::spawn(async move {
                    loop {
                        let target = { rx.lock().await.recv().await };
                        match target {
                            Some(target) => run_task(&ctx, target).await,
                            None => break,
                        }
                    }
                })
            })
            .collect();

        let feed_and_join = async {
            for target in tasks {
                if tx.send(target).await.is_err() {
                    break;
                }
            }
            drop(tx);
            for handle in &mut handles {
                let _ = handle.await;
            }
        };

        let deadline_hit = timeout(self.config.operation_timeout, feed_and_join)
            .await
            .is_err();
        if deadline_hit {
            tracing::warn!(total, "scrape deadline hit, aborting outstanding tasks");
            for handle in &handles {
                handle.abort();
            }
        }

        let ctx = match Arc::try_unwrap(ctx) {
            Ok(ctx) => ctx,
            // Aborted workers may still hold a reference briefly; fall back
            // to copying out of the shared state.
            Err(shared) => {
                let documents = shared.documents.lock().unwrap_or_else(|e| e.into_inner()).clone();
                let reports = shared.reports.lock().unwrap_or_else(|e| e.into_inner()).clone();
                return finish(documents, reports, total, deadline_hit);
            }
        };

        let documents = ctx.documents.into_inner().unwrap_or_else(|e| e.into_inner());
        let reports = ctx.reports.into_inner().unwrap_or_else(|e| e.into_inner());
        finish(documents, reports, total, deadline_hit)
    }
}

fn finish(
    mut documents: Vec<ScrapedDocument>,
    reports: Vec<TaskReport>,
    total: usize,
    deadline_hit: bool,
) -> ScrapeOutcome {
    documents.sort_by_key(|d| d.source_rank);
    let partial = deadline_hit || documents.len() < total;
    tracing::debug!(
        successes = documents.len(),
        total,
        partial,
        "scrape run finished"
    );
    ScrapeOutcome {
        documents,
        partial,
        reports,
    }
}

/// Deduplicate targets by normalised URL, keeping the lowest rank for each,
/// and order the survivors by rank.
fn dedup_targets(targets: &[ScrapeTarget]) -> Vec<ScrapeTarget> {
    let mut by_url: HashMap<String, ScrapeTarget> = HashMap::new();
    for target in targets {
        let key = normalize_url(&target.url);
        match by_url.get(&key) {
            Some(existing) if existing.rank <= target.rank => {}
            _ => {
                by_url.insert(key, target.clone());
            }
        }
    }
    let mut tasks: Vec<ScrapeTarget> = by_url.into_values().collect();
    tasks.sort_by_key(|t| t.rank);
    tasks
}

async fn run_task(ctx: &TaskContext, target: ScrapeTarget) {
    let mut transitions = vec![TaskState::Pending];

    if ctx.respect_robots && !ctx.robots.is_allowed(&target.url).await {
        tracing::debug!(url = %target.url, "skipped by robots.txt");
        transitions.push(TaskState::Skipped);
        push_report(
            ctx,
            &target.url,
            TaskState::Skipped,
            0,
            transitions,
            Some(FetchFailure::RobotsDenied.to_string()),
        );
        return;
    }

    let host = host_of(&target.url).unwrap_or_default();
    let max_attempts = ctx.max_retries + 1;
    let mut attempts = 0;

    loop {
        attempts += 1;
        transitions.push(TaskState::InFlight);

        let failure = {
            let _permit = ctx.limiter.acquire(&host).await;
            match timeout(ctx.fetch_timeout, ctx.fetcher.fetch(&target.url)).await {
                Err(_) => FetchFailure::Timeout,
                Ok(Err(failure)) => failure,
                Ok(Ok(page)) => match accept(ctx, &page) {
                    Ok(extraction) => {
                        commit_document(ctx, &target, extraction);
                        transitions.push(TaskState::Success);
                        push_report(ctx, &target.url, TaskState::Success, attempts, transitions, None);
                        return;
                    }
                    Err(failure) => failure,
                },
            }
        };

        if failure.is_transient() && attempts < max_attempts {
            let delay = ctx.retry_backoff * 2u32.saturating_pow(attempts - 1);
            tracing::debug!(
                url = %target.url,
                attempt = attempts,
                error = %failure,
                delay_ms = delay.as_millis() as u64,
                "transient fetch failure, retrying"
            );
            transitions.push(TaskState::Retrying);
            tokio::time::sleep(delay).await;
            continue;
        }

        tracing::debug!(url = %target.url, attempts, error = %failure, "scrape task failed");
        transitions.push(TaskState::Failed);
        push_report(
            ctx,
            &target.url,
            TaskState::Failed,
            attempts,
            transitions,
            Some(failure.to_string()),
        );
        return;
    }
}

/// Validate a fetched page and extract its content.
fn accept(ctx: &TaskContext, page: &FetchedPage) -> Result<extract::Extraction, FetchFailure> {
    if !(200..300).contains(&page.status) {
        return Err(FetchFailure::Status(page.status));
    }

    let content_type = page.content_type.to_lowercase();
    if !content_type.is_empty() && !content_type.contains("html") {
        return Err(FetchFailure::ContentType(page.content_type.clone()));
    }

    let extraction = extract::extract_text(&page.body, usize::MAX).ok_or(FetchFailure::NoText)?;

    let chars = extraction.text.chars().count();
    if chars < ctx.min_content_length || chars > ctx.max_content_length {
        return Err(FetchFailure::ContentBounds {
            actual: chars,
            min: ctx.min_content_length,
            max: ctx.max_content_length,
        });
    }

    Ok(extraction)
}

fn commit_document(ctx: &TaskContext, target: &ScrapeTarget, extraction: extract::Extraction) {
    let char_count = extraction.text.chars().count();
    let document = ScrapedDocument {
        url: target.url.clone(),
        title: extraction.title,
        text: extraction.text,
        char_count,
        fetched_at: Utc::now(),
        source_rank: target.rank,
    };
    ctx.documents
        .lock()
        .unwrap_or_else(|e| e.into_inner())
        .push(document);
}

fn push_report(
    ctx: &TaskContext,
    url: &str,
    state: TaskState,
    attempts: u32,
    transitions: Vec<TaskState>,
    error: Option<String>,
) {
    ctx.reports
        .lock()
        .unwrap_or_else(|e| e.into_inner())
        .push(TaskReport {
            url: url.to_owned(),
            state,
            attempts,
            transitions,
            error,
        });
}

#[cfg(test)]
mod tests {
    use super::*;

    fn target(url: &str, rank: usize) -> ScrapeTarget {
        ScrapeTarget {
            url: url.into(),
            rank,
        }
    }

    #[test]
    fn dedup_keeps_lowest_rank() {
        let targets = [
            target("https://example.com/page?b=2&a=1", 3),
            target("https://Example.COM/page/?a=1&b=2#frag", 1),
            target("https://other.com/x", 2),
        ];
        let tasks = dedup_targets(&targets);
        assert_eq!(tasks.len(), 2);
        assert_eq!(tasks[0].rank, 1);
        assert_eq!(tasks[0].url, "https://Example.COM/page/?a=1&b=2#frag");
        assert_eq!(tasks[1].rank, 2);
    }

    #[test]
    fn dedup_orders_by_rank() {
        let targets = [
            target("https://c.com", 5),
            target("https://a.com", 0),
            target("https://b.com", 2),
        ];
        let ranks: Vec<usize> = dedup_targets(&targets).iter().map(|t| t.rank).collect();
        assert_eq!(ranks, vec![0, 2, 5]);
    }

    #[tokio::test]
    async fn empty_target_list_yields_empty_outcome() {
        struct NeverFetch;
        #[async_trait::async_trait]
        impl PageFetcher for NeverFetch {
            async fn fetch(&self, _url: &str) -> Result<FetchedPage, FetchFailure> {
                panic!("no fetch expected");
            }
        }

        let scraper = Scraper::new(PipelineConfig::default(), Arc::new(NeverFetch));
        let outcome = scraper.scrape(&[]).await;
        assert!(outcome.documents.is_empty());
        assert!(!outcome.partial);
        assert!(outcome.reports.is_empty());
    }
}
