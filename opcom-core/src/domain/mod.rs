//! Domain types for OPCOM day-ahead report collection

pub mod date_range;
pub mod row;

pub use date_range::{parse_iso_date, DateRange, DateRangeError, Days};
pub use row::{DayBatch, Granularity, Metric, ObservationRow, HOURLY_ROWS, QUARTER_HOURLY_ROWS};
