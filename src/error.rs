// Error types shared by adapters, the aggregator and the scheduler.

use thiserror::Error;

/// Failure of a single rate source for one cycle.
///
/// Never escapes the aggregator: a failed source contributes zero records.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("unexpected http status {0}")]
    Status(u16),
    #[error("venue returned error code {0}")]
    ApiCode(String),
    #[error("malformed payload: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("all {failed} instrument requests failed")]
    Exhausted { failed: usize },
    #[error("cancelled")]
    Cancelled,
}

impl SourceError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, SourceError::Cancelled)
    }
}

/// Failure of a whole fetch cycle.
#[derive(Debug, Error)]
pub enum CycleError {
    #[error("no rate sources are enabled")]
    NoSources,
    #[error("all sources failed: {}", failures.join("; "))]
    AllSourcesFailed { failures: Vec<String> },
    #[error("cycle cancelled")]
    Cancelled,
}

#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("refresh scheduler has shut down")]
    Closed,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("unknown exchange `{0}`")]
    UnknownExchange(String),
    #[error("unknown horizon `{0}` (expected one of 8h, 1d, 7d, 30d, 180d, 1y)")]
    UnknownHorizon(String),
}
