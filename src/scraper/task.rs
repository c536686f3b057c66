//! Scrape task bookkeeping: targets, lifecycle states, failure
//! classification, and per-task reports.

use serde::Serialize;

/// A URL selected for scraping, paired with the rank of the search result
/// it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScrapeTarget {
    pub url: String,
    pub rank: usize,
}

/// Lifecycle state of a scrape task.
///
/// `Pending -> InFlight -> {Success | Retrying | Failed | Skipped}`;
/// `Retrying` transitions back to `InFlight` on the next attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskState {
    Pending,
    InFlight,
    Retrying,
    Success,
    Failed,
    Skipped,
}

/// Outcome record for a single scrape task, success or not.
#[derive(Debug, Clone, Serialize)]
pub struct TaskReport {
    pub url: String,
    /// Terminal state: `Success`, `Failed`, or `Skipped`.
    pub state: TaskState,
    /// Fetch attempts made. Zero for tasks skipped before any fetch.
    pub attempts: u32,
    /// The full state path the task took, ending in `state`. A retried
    /// task shows `Retrying -> InFlight` once per extra attempt.
    pub transitions: Vec<TaskState>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Whether a failure is worth retrying.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Timeouts, connection errors, 5xx, 429. Retried with backoff.
    Transient,
    /// 404 and other 4xx, robots denial, wrong content type, content
    /// outside the acceptance bounds. Never retried.
    Permanent,
}

/// A classified scrape failure.
#[derive(Debug, Clone, thiserror::Error)]
pub enum FetchFailure {
    #[error("fetch timed out")]
    Timeout,

    #[error("connection error: {0}")]
    Connection(String),

    #[error("HTTP status {0}")]
    Status(u16),

    #[error("disallowed by robots.txt")]
    RobotsDenied,

    #[error("unsupported content type: {0}")]
    ContentType(String),

    #[error("extracted content length {actual} outside bounds [{min}, {max}]")]
    ContentBounds {
        actual: usize,
        min: usize,
        max: usize,
    },

    #[error("no extractable content")]
    NoText,
}

impl FetchFailure {
    /// Classify this failure for retry purposes.
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::Timeout | Self::Connection(_) => FailureKind::Transient,
            Self::Status(code) if *code >= 500 || *code == 429 => FailureKind::Transient,
            Self::Status(_)
            | Self::RobotsDenied
            | Self::ContentType(_)
            | Self::ContentBounds { .. }
            | Self::NoText => FailureKind::Permanent,
        }
    }

    pub fn is_transient(&self) -> bool {
        self.kind() == FailureKind::Transient
    }
}
