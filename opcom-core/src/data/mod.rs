//! Report fetching, parsing and day-by-day collection

pub mod circuit_breaker;
pub mod collect;
pub mod hourly;
pub mod locale;
pub mod opcom;
pub mod provider;
pub mod report;

pub use circuit_breaker::CircuitBreaker;
pub use collect::{
    collect_days, CancelFlag, CollectError, CollectOptions, CollectedDataset, DaySummary, Pacer,
    ThreadPacer, DEFAULT_DELAY,
};
pub use hourly::{is_quarter_hourly, normalize_hourly};
pub use locale::parse_locale_number;
pub use opcom::{OpcomProvider, RetryPolicy, OPCOM_ENDPOINT};
pub use provider::{AuthToken, CollectProgress, DataError, DayProvider, NoProgress, StdoutProgress};
pub use report::{extract_token, parse_day_report, parse_day_report_with, ReportLayout};
