//! End-to-end collection over saved report pages, without network access.

use chrono::NaiveDate;
use opcom_core::data::{
    collect_days, parse_day_report, AuthToken, CancelFlag, CollectOptions, CollectProgress,
    DataError, DayProvider, Pacer,
};
use opcom_core::domain::{DateRange, DayBatch};
use std::cell::RefCell;
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

fn fixture(name: &str) -> String {
    let path = PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests/fixtures")
        .join(name);
    std::fs::read_to_string(path).unwrap()
}

/// Serves saved pages keyed by date; unknown dates get the "no data" page.
struct SavedPages {
    pages: HashMap<NaiveDate, String>,
    fallback: String,
    fetched: RefCell<Vec<NaiveDate>>,
}

impl SavedPages {
    fn new(pages: &[(NaiveDate, &str)]) -> Self {
        Self {
            pages: pages.iter().map(|(d, f)| (*d, fixture(f))).collect(),
            fallback: fixture("opcom_no_data.html"),
            fetched: RefCell::new(Vec::new()),
        }
    }
}

impl DayProvider for SavedPages {
    fn name(&self) -> &str {
        "saved_pages"
    }

    fn acquire_token(&self) -> Result<AuthToken, DataError> {
        Ok(AuthToken::new("fixture"))
    }

    fn fetch_day(&self, date: NaiveDate, token: &AuthToken) -> Result<DayBatch, DataError> {
        assert_eq!(token.as_str(), "fixture");
        self.fetched.borrow_mut().push(date);
        let page = self.pages.get(&date).unwrap_or(&self.fallback);
        Ok(parse_day_report(page, date))
    }
}

#[derive(Default)]
struct Calls(RefCell<Vec<(usize, usize, String)>>);

impl CollectProgress for Calls {
    fn on_day_complete(&self, completed: usize, total: usize, label: &str, _rows: usize) {
        self.0.borrow_mut().push((completed, total, label.to_string()));
    }
}

#[derive(Default)]
struct Pauses(RefCell<Vec<Duration>>);

impl Pacer for Pauses {
    fn pause(&self, delay: Duration) {
        self.0.borrow_mut().push(delay);
    }
}

fn d(y: i32, m: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, day).unwrap()
}

#[test]
fn empty_day_and_hourly_day() {
    let provider = SavedPages::new(&[(d(2024, 9, 15), "opcom_hourly.html")]);
    let range = DateRange::new(d(2024, 9, 14), d(2024, 9, 15)).unwrap();
    let calls = Calls::default();
    let pauses = Pauses::default();
    let opts = CollectOptions {
        normalize_hourly: false,
        delay: Duration::from_millis(400),
        cancel: CancelFlag::new(),
    };

    let ds = collect_days(&provider, &range, &AuthToken::new("fixture"), &opts, &calls, &pauses)
        .unwrap();

    assert_eq!(ds.len(), 24);
    assert_eq!(ds.empty_days(), vec![d(2024, 9, 14)]);
    assert_eq!(
        *calls.0.borrow(),
        vec![
            (1, 2, "2024-09-14".to_string()),
            (2, 2, "2024-09-15".to_string())
        ]
    );
    // one pause per date, including after the empty one
    assert_eq!(*pauses.0.borrow(), vec![Duration::from_millis(400); 2]);
}

#[test]
fn days_are_fetched_in_ascending_order() {
    let provider = SavedPages::new(&[]);
    let range = DateRange::new(d(2023, 12, 30), d(2024, 1, 2)).unwrap();
    let opts = CollectOptions {
        delay: Duration::ZERO,
        ..CollectOptions::default()
    };

    collect_days(
        &provider,
        &range,
        &AuthToken::new("fixture"),
        &opts,
        &Calls::default(),
        &Pauses::default(),
    )
    .unwrap();

    assert_eq!(
        *provider.fetched.borrow(),
        vec![d(2023, 12, 30), d(2023, 12, 31), d(2024, 1, 1), d(2024, 1, 2)]
    );
}

#[test]
fn mixed_granularity_with_normalisation() {
    let provider = SavedPages::new(&[
        (d(2025, 9, 30), "opcom_hourly.html"),
        (d(2025, 10, 1), "opcom_quarter_hourly.html"),
    ]);
    let range = DateRange::new(d(2025, 9, 30), d(2025, 10, 1)).unwrap();
    let opts = CollectOptions {
        normalize_hourly: true,
        delay: Duration::ZERO,
        cancel: CancelFlag::new(),
    };

    let ds = collect_days(
        &provider,
        &range,
        &AuthToken::new("fixture"),
        &opts,
        &Calls::default(),
        &Pauses::default(),
    )
    .unwrap();

    assert_eq!(ds.len(), 48);
    assert!(!ds.days()[0].normalized);
    assert!(ds.days()[1].normalized);
    assert_eq!(ds.days()[1].source_rows, 96);
    // rows stay grouped by date, in date order
    assert!(ds.rows()[..24].iter().all(|r| r.date == d(2025, 9, 30)));
    assert!(ds.rows()[24..].iter().all(|r| r.date == d(2025, 10, 1)));
}
