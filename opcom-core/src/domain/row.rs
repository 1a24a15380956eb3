//! Observation rows and the metrics that can be projected out of them.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Number of rows in an hourly report.
pub const HOURLY_ROWS: usize = 24;

/// Number of rows in a 15-minute report.
pub const QUARTER_HOURLY_ROWS: usize = 96;

/// One parsed report line: a single zone/interval observation for a date.
///
/// Field order is fixed: date, zone, interval, price, volume, buy volume,
/// sell volume. Numeric fields are `None` when the source cell was empty or
/// could not be parsed; they never carry the raw locale-formatted text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObservationRow {
    pub date: NaiveDate,
    pub zone: String,
    /// 1-based position within the day (1..=24 or 1..=96).
    pub interval: u32,
    pub price: Option<f64>,
    pub volume: Option<f64>,
    pub buy_volume: Option<f64>,
    pub sell_volume: Option<f64>,
}

impl ObservationRow {
    /// Value of the given metric for this row.
    pub fn metric(&self, metric: Metric) -> Option<f64> {
        match metric {
            Metric::Price => self.price,
            Metric::Volume => self.volume,
            Metric::Buy => self.buy_volume,
            Metric::Sell => self.sell_volume,
        }
    }

    /// ISO `YYYY-MM-DD` label of the row's date.
    pub fn date_label(&self) -> String {
        self.date.format("%Y-%m-%d").to_string()
    }
}

/// All observation rows for one calendar date, in source table order.
///
/// Valid lengths are 0 (no table), 24 (hourly) or 96 (15-minute).
pub type DayBatch = Vec<ObservationRow>;

/// The four numeric columns of an observation row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    Price,
    Volume,
    Buy,
    Sell,
}

impl Metric {
    pub const ALL: [Metric; 4] = [Metric::Price, Metric::Volume, Metric::Buy, Metric::Sell];

    /// Position of this metric in the fixed 7-field row layout.
    pub fn column_index(self) -> usize {
        match self {
            Metric::Price => 3,
            Metric::Volume => 4,
            Metric::Buy => 5,
            Metric::Sell => 6,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Metric::Price => "price",
            Metric::Volume => "volume",
            Metric::Buy => "buy",
            Metric::Sell => "sell",
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Report granularity, inferred from a day batch's length.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Granularity {
    Hourly,
    QuarterHourly,
}

impl Granularity {
    /// Classify a batch length. Returns `None` for empty or malformed batches.
    pub fn from_len(len: usize) -> Option<Self> {
        match len {
            HOURLY_ROWS => Some(Granularity::Hourly),
            QUARTER_HOURLY_ROWS => Some(Granularity::QuarterHourly),
            _ => None,
        }
    }
}
