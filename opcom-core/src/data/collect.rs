//! Collection driver: walks a date range day by day through a provider.
//!
//! Days are fetched strictly one after another, in ascending date order,
//! with a fixed pause after every day. Empty days are recorded and the run
//! continues; a provider error aborts the run. A cancel flag is checked
//! before each fetch.

use super::hourly::normalize_hourly;
use super::provider::{AuthToken, CollectProgress, DataError, DayProvider};
use crate::domain::{DateRange, Granularity, ObservationRow};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};

/// Default pause between consecutive day requests.
pub const DEFAULT_DELAY: Duration = Duration::from_millis(400);

/// Shared cooperative cancellation flag.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Waits between requests. Swappable so tests do not sleep.
pub trait Pacer {
    fn pause(&self, delay: Duration);
}

/// Pacer that blocks the current thread.
#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadPacer;

impl Pacer for ThreadPacer {
    fn pause(&self, delay: Duration) {
        if !delay.is_zero() {
            std::thread::sleep(delay);
        }
    }
}

#[derive(Debug, Clone)]
pub struct CollectOptions {
    /// Collapse 96-row days into 24 hourly rows.
    pub normalize_hourly: bool,
    /// Pause after each day.
    pub delay: Duration,
    pub cancel: CancelFlag,
}

impl Default for CollectOptions {
    fn default() -> Self {
        Self {
            normalize_hourly: false,
            delay: DEFAULT_DELAY,
            cancel: CancelFlag::new(),
        }
    }
}

/// What was collected for a single date.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DaySummary {
    pub date: NaiveDate,
    /// Rows appended for this date (after normalisation).
    pub rows: usize,
    /// Rows in the fetched report.
    pub source_rows: usize,
    pub normalized: bool,
}

/// Rows accumulated over a run, in ascending date order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CollectedDataset {
    rows: Vec<ObservationRow>,
    days: Vec<DaySummary>,
}

impl CollectedDataset {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rows(&self) -> &[ObservationRow] {
        &self.rows
    }

    pub fn days(&self) -> &[DaySummary] {
        &self.days
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Dates that produced no rows.
    pub fn empty_days(&self) -> Vec<NaiveDate> {
        self.days
            .iter()
            .filter(|d| d.rows == 0)
            .map(|d| d.date)
            .collect()
    }

    fn push_day(&mut self, summary: DaySummary, rows: Vec<ObservationRow>) {
        self.rows.extend(rows);
        self.days.push(summary);
    }
}

impl From<Vec<ObservationRow>> for CollectedDataset {
    /// Wrap already-collected rows, deriving per-day counts from them.
    fn from(rows: Vec<ObservationRow>) -> Self {
        let mut days: Vec<DaySummary> = Vec::new();
        for row in &rows {
            match days.last_mut() {
                Some(last) if last.date == row.date => {
                    last.rows += 1;
                    last.source_rows += 1;
                }
                _ => days.push(DaySummary {
                    date: row.date,
                    rows: 1,
                    source_rows: 1,
                    normalized: false,
                }),
            }
        }
        Self { rows, days }
    }
}

#[derive(Debug, Error)]
pub enum CollectError {
    #[error("fetch failed for {date}: {source}")]
    Transport {
        date: NaiveDate,
        #[source]
        source: DataError,
        partial: CollectedDataset,
    },

    #[error("collection cancelled after {} day(s)", .partial.days().len())]
    Cancelled { partial: CollectedDataset },
}

impl CollectError {
    /// Rows collected before the run stopped.
    pub fn partial(&self) -> &CollectedDataset {
        match self {
            CollectError::Transport { partial, .. } | CollectError::Cancelled { partial } => {
                partial
            }
        }
    }

    pub fn into_partial(self) -> CollectedDataset {
        match self {
            CollectError::Transport { partial, .. } | CollectError::Cancelled { partial } => {
                partial
            }
        }
    }
}

/// Collect every day of `range` from `provider`.
///
/// For each date in order: fetch, normalise 96-row days when requested,
/// append, report progress, then pause for `opts.delay`.
pub fn collect_days(
    provider: &dyn DayProvider,
    range: &DateRange,
    token: &AuthToken,
    opts: &CollectOptions,
    progress: &dyn CollectProgress,
    pacer: &dyn Pacer,
) -> Result<CollectedDataset, CollectError> {
    let total = range.len();
    let mut dataset = CollectedDataset::new();

    for (i, date) in range.days().enumerate() {
        if opts.cancel.is_cancelled() {
            warn!(completed = i, total, "collection cancelled");
            return Err(CollectError::Cancelled { partial: dataset });
        }

        if !provider.is_available() {
            warn!(provider = provider.name(), date = %date, "provider unavailable, stopping");
            return Err(CollectError::Transport {
                date,
                source: DataError::Unavailable {
                    provider: provider.name().to_string(),
                },
                partial: dataset,
            });
        }

        progress.on_day_start(date, i, total);
        let label = date.format("%Y-%m-%d").to_string();

        let batch = match provider.fetch_day(date, token) {
            Ok(batch) => batch,
            Err(source) => {
                return Err(CollectError::Transport {
                    date,
                    source,
                    partial: dataset,
                })
            }
        };
        let source_rows = batch.len();

        let hourly = if opts.normalize_hourly {
            normalize_hourly(&batch)
        } else {
            None
        };
        let (rows, normalized) = match hourly {
            Some(hourly) => {
                info!(date = %label, "15-minute report normalised to 24 hourly means");
                (hourly, true)
            }
            None => (batch, false),
        };

        if source_rows == 0 {
            warn!(date = %label, "no report table for date");
        } else {
            if Granularity::from_len(source_rows).is_none() {
                warn!(date = %label, rows = source_rows, "unexpected report length");
            }
            info!(date = %label, rows = rows.len(), "collected day");
        }

        let appended = rows.len();
        dataset.push_day(
            DaySummary {
                date,
                rows: appended,
                source_rows,
                normalized,
            },
            rows,
        );
        progress.on_day_complete(i + 1, total, &label, appended);

        pacer.pause(opts.delay);
    }

    progress.on_run_complete(dataset.len(), dataset.empty_days().len(), total);
    Ok(dataset)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::{Cell, RefCell};

    struct FixedProvider {
        rows_per_day: usize,
        fail_on: Option<NaiveDate>,
    }

    impl DayProvider for FixedProvider {
        fn name(&self) -> &str {
            "fixed"
        }

        fn acquire_token(&self) -> Result<AuthToken, DataError> {
            Ok(AuthToken::new("t"))
        }

        fn fetch_day(
            &self,
            date: NaiveDate,
            _token: &AuthToken,
        ) -> Result<Vec<ObservationRow>, DataError> {
            if self.fail_on == Some(date) {
                return Err(DataError::NetworkUnreachable("connection reset".into()));
            }
            Ok((0..self.rows_per_day)
                .map(|i| ObservationRow {
                    date,
                    zone: "RO".into(),
                    interval: i as u32 + 1,
                    price: Some(i as f64),
                    volume: None,
                    buy_volume: None,
                    sell_volume: None,
                })
                .collect())
        }
    }

    #[derive(Default)]
    struct CountingPacer(Cell<usize>);

    impl Pacer for CountingPacer {
        fn pause(&self, _delay: Duration) {
            self.0.set(self.0.get() + 1);
        }
    }

    #[derive(Default)]
    struct Recorder(RefCell<Vec<(usize, usize, String)>>);

    impl CollectProgress for Recorder {
        fn on_day_complete(&self, completed: usize, total: usize, label: &str, _rows: usize) {
            self.0.borrow_mut().push((completed, total, label.to_string()));
        }
    }

    fn range(start: &str, end: &str) -> DateRange {
        DateRange::parse(start, end).unwrap()
    }

    fn opts(normalize_hourly: bool) -> CollectOptions {
        CollectOptions {
            normalize_hourly,
            delay: Duration::ZERO,
            cancel: CancelFlag::new(),
        }
    }

    #[test]
    fn pauses_after_every_day() {
        let provider = FixedProvider { rows_per_day: 0, fail_on: None };
        let pacer = CountingPacer::default();
        let progress = Recorder::default();
        let ds = collect_days(
            &provider,
            &range("2024-01-30", "2024-02-02"),
            &AuthToken::new("t"),
            &opts(false),
            &progress,
            &pacer,
        )
        .unwrap();
        assert!(ds.is_empty());
        assert_eq!(ds.days().len(), 4);
        assert_eq!(pacer.0.get(), 4);
        assert_eq!(progress.0.borrow().last().unwrap(), &(4, 4, "2024-02-02".to_string()));
    }

    #[test]
    fn normalises_only_quarter_hour_days() {
        let provider = FixedProvider { rows_per_day: 96, fail_on: None };
        let ds = collect_days(
            &provider,
            &range("2024-03-01", "2024-03-02"),
            &AuthToken::new("t"),
            &opts(true),
            &Recorder::default(),
            &CountingPacer::default(),
        )
        .unwrap();
        assert_eq!(ds.len(), 48);
        assert!(ds.days().iter().all(|d| d.normalized && d.source_rows == 96));

        let provider = FixedProvider { rows_per_day: 24, fail_on: None };
        let ds = collect_days(
            &provider,
            &range("2024-03-01", "2024-03-01"),
            &AuthToken::new("t"),
            &opts(true),
            &Recorder::default(),
            &CountingPacer::default(),
        )
        .unwrap();
        assert_eq!(ds.len(), 24);
        assert!(!ds.days()[0].normalized);
    }

    #[test]
    fn keeps_quarter_hours_without_normalisation() {
        let provider = FixedProvider { rows_per_day: 96, fail_on: None };
        let ds = collect_days(
            &provider,
            &range("2024-03-01", "2024-03-01"),
            &AuthToken::new("t"),
            &opts(false),
            &Recorder::default(),
            &CountingPacer::default(),
        )
        .unwrap();
        assert_eq!(ds.len(), 96);
    }

    #[test]
    fn transport_error_carries_partial_rows() {
        let provider = FixedProvider {
            rows_per_day: 24,
            fail_on: NaiveDate::from_ymd_opt(2024, 1, 3),
        };
        let progress = Recorder::default();
        let err = collect_days(
            &provider,
            &range("2024-01-01", "2024-01-05"),
            &AuthToken::new("t"),
            &opts(false),
            &progress,
            &CountingPacer::default(),
        )
        .unwrap_err();

        match &err {
            CollectError::Transport { date, source, partial } => {
                assert_eq!(*date, NaiveDate::from_ymd_opt(2024, 1, 3).unwrap());
                assert!(matches!(source, DataError::NetworkUnreachable(_)));
                assert_eq!(partial.len(), 48);
            }
            other => panic!("expected transport error, got {other:?}"),
        }
        assert_eq!(progress.0.borrow().len(), 2);
    }

    #[test]
    fn cancel_stops_before_next_fetch() {
        struct CancelAfterFirst(CancelFlag);
        impl CollectProgress for CancelAfterFirst {
            fn on_day_complete(&self, _c: usize, _t: usize, _l: &str, _r: usize) {
                self.0.cancel();
            }
        }

        let provider = FixedProvider { rows_per_day: 24, fail_on: None };
        let options = opts(false);
        let err = collect_days(
            &provider,
            &range("2024-01-01", "2024-01-31"),
            &AuthToken::new("t"),
            &options,
            &CancelAfterFirst(options.cancel.clone()),
            &CountingPacer::default(),
        )
        .unwrap_err();

        assert!(matches!(err, CollectError::Cancelled { .. }));
        assert_eq!(err.partial().len(), 24);
        assert_eq!(err.into_partial().days().len(), 1);
    }

    #[test]
    fn dataset_from_rows_groups_days() {
        let provider = FixedProvider { rows_per_day: 3, fail_on: None };
        let token = AuthToken::new("t");
        let mut rows = provider
            .fetch_day(NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(), &token)
            .unwrap();
        rows.extend(
            provider
                .fetch_day(NaiveDate::from_ymd_opt(2024, 1, 2).unwrap(), &token)
                .unwrap(),
        );
        let ds = CollectedDataset::from(rows);
        assert_eq!(ds.len(), 6);
        assert_eq!(ds.days().len(), 2);
        assert_eq!(ds.days()[1].rows, 3);
    }

    #[test]
    fn unavailable_provider_stops_before_fetching() {
        struct GoesDownAfter {
            inner: FixedProvider,
            fetched: Cell<usize>,
            limit: usize,
        }

        impl DayProvider for GoesDownAfter {
            fn name(&self) -> &str {
                "flaky"
            }

            fn acquire_token(&self) -> Result<AuthToken, DataError> {
                self.inner.acquire_token()
            }

            fn fetch_day(
                &self,
                date: NaiveDate,
                token: &AuthToken,
            ) -> Result<Vec<ObservationRow>, DataError> {
                self.fetched.set(self.fetched.get() + 1);
                self.inner.fetch_day(date, token)
            }

            fn is_available(&self) -> bool {
                self.fetched.get() < self.limit
            }
        }

        let provider = GoesDownAfter {
            inner: FixedProvider { rows_per_day: 24, fail_on: None },
            fetched: Cell::new(0),
            limit: 2,
        };
        let err = collect_days(
            &provider,
            &range("2024-01-01", "2024-01-05"),
            &AuthToken::new("t"),
            &opts(false),
            &Recorder::default(),
            &CountingPacer::default(),
        )
        .unwrap_err();

        match &err {
            CollectError::Transport { date, source, partial } => {
                assert_eq!(*date, NaiveDate::from_ymd_opt(2024, 1, 3).unwrap());
                assert!(matches!(
                    source,
                    DataError::Unavailable { provider } if provider == "flaky"
                ));
                assert_eq!(partial.len(), 48);
            }
            other => panic!("expected transport error, got {other:?}"),
        }
        assert_eq!(provider.fetched.get(), 2);
    }
}
