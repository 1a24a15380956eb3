//! Day provider trait, progress reporting, and structured error types.
//!
//! The DayProvider trait abstracts over where a day's report comes from (the
//! live OPCOM endpoint, a saved page, an in-memory stub) so the collection
//! driver can be exercised without network access.

use crate::domain::DayBatch;
use chrono::NaiveDate;
use std::fmt;
use thiserror::Error;

/// Session token captured from a loaded report page.
///
/// `Debug` does not print the value.
#[derive(Clone, PartialEq, Eq)]
pub struct AuthToken(String);

impl AuthToken {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for AuthToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AuthToken(***)")
    }
}

/// Structured error types for provider operations.
///
/// These are displayable in CLI output as-is.
#[derive(Debug, Error)]
pub enum DataError {
    #[error("network unreachable: {0}")]
    NetworkUnreachable(String),

    #[error("rate limited by endpoint (retry after {retry_after_secs}s)")]
    RateLimited { retry_after_secs: u64 },

    #[error("endpoint returned HTTP {status}")]
    HttpStatus { status: u16 },

    #[error("session token not found on {url}; the report page did not load as expected")]
    TokenNotFound { url: String },

    #[error("hard stop: endpoint has blocked requests (circuit breaker tripped)")]
    CircuitBreakerTripped,

    #[error("provider '{provider}' is not accepting requests")]
    Unavailable { provider: String },

    #[error("invalid endpoint URL '{0}'")]
    InvalidEndpoint(String),

    #[error("failed to build HTTP client: {0}")]
    ClientBuild(String),
}

/// Source of per-day report batches.
///
/// Implementations fetch and parse exactly one day per call. A day with no
/// published table is `Ok(vec![])`; only transport-level failures are `Err`.
pub trait DayProvider {
    /// Human-readable name of this provider.
    fn name(&self) -> &str;

    /// Capture the session token. Called once, before any `fetch_day`.
    fn acquire_token(&self) -> Result<AuthToken, DataError>;

    /// Fetch and parse the report for one date.
    fn fetch_day(&self, date: NaiveDate, token: &AuthToken) -> Result<DayBatch, DataError>;

    /// Whether the provider will currently accept requests.
    fn is_available(&self) -> bool {
        true
    }
}

/// Progress callback for a collection run.
pub trait CollectProgress {
    /// Called before a date is fetched. `index` is 0-based.
    fn on_day_start(&self, _date: NaiveDate, _index: usize, _total: usize) {}

    /// Called after a date's batch has been appended.
    fn on_day_complete(&self, completed: usize, total: usize, label: &str, rows: usize);

    /// Called once when every date has been processed.
    fn on_run_complete(&self, _rows: usize, _empty_days: usize, _total_days: usize) {}
}

/// Progress reporter that prints to stdout.
#[derive(Debug, Default, Clone, Copy)]
pub struct StdoutProgress;

impl CollectProgress for StdoutProgress {
    fn on_day_complete(&self, completed: usize, total: usize, label: &str, rows: usize) {
        if rows == 0 {
            println!("[{completed}/{total}] {label}: no data");
        } else {
            println!("[{completed}/{total}] {label}: {rows} rows");
        }
    }

    fn on_run_complete(&self, rows: usize, empty_days: usize, total_days: usize) {
        println!("\nCollection complete: {rows} rows over {total_days} day(s), {empty_days} without data");
    }
}

/// Progress reporter that discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

impl CollectProgress for NoProgress {
    fn on_day_complete(&self, _completed: usize, _total: usize, _label: &str, _rows: usize) {}
}
