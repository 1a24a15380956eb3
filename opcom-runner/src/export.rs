//! CSV projections of a collected dataset.
//!
//! Two layouts:
//! - **Flat**: one line per observation row with a fixed 7-column header.
//! - **Transposed**: one line per date for a single metric, one column per
//!   interval, padded to the widest date in the dataset.
//!
//! Quoting follows standard CSV rules via the `csv` writer: a field holding a
//! comma, quote, or newline is quoted, with embedded quotes doubled.

use anyhow::{Context, Result};
use opcom_core::domain::{Metric, ObservationRow};
use serde::{Deserialize, Serialize};
use std::collections::hash_map::{Entry, HashMap};
use std::fmt;

/// Header of the flat export.
pub const FLAT_HEADER: [&str; 7] = [
    "Date",
    "Zone",
    "Interval",
    "Price",
    "Volume",
    "Buy Volume",
    "Sell Volume",
];

/// One of the five output files a run can produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExportKind {
    Flat,
    Transposed(Metric),
}

impl ExportKind {
    pub const ALL: [ExportKind; 5] = [
        ExportKind::Flat,
        ExportKind::Transposed(Metric::Price),
        ExportKind::Transposed(Metric::Volume),
        ExportKind::Transposed(Metric::Buy),
        ExportKind::Transposed(Metric::Sell),
    ];

    pub fn file_name(self) -> String {
        match self {
            ExportKind::Flat => "opcom_all.csv".to_string(),
            ExportKind::Transposed(metric) => format!("opcom_{}.csv", metric.label()),
        }
    }

    /// Render this export over `rows`.
    pub fn render(self, rows: &[ObservationRow]) -> Result<String> {
        match self {
            ExportKind::Flat => export_flat_csv(rows),
            ExportKind::Transposed(metric) => export_transposed_csv(rows, metric),
        }
    }
}

impl fmt::Display for ExportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExportKind::Flat => f.write_str("all"),
            ExportKind::Transposed(metric) => write!(f, "{metric}"),
        }
    }
}

/// A rendered export: output file name plus its UTF-8 CSV text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamedCsv {
    pub kind: ExportKind,
    pub name: String,
    pub content: String,
}

/// Render each requested export over `rows`, in the order given.
pub fn build_exports(rows: &[ObservationRow], kinds: &[ExportKind]) -> Result<Vec<NamedCsv>> {
    kinds
        .iter()
        .map(|&kind| {
            let content = kind
                .render(rows)
                .with_context(|| format!("failed to render {} export", kind.file_name()))?;
            Ok(NamedCsv {
                kind,
                name: kind.file_name(),
                content,
            })
        })
        .collect()
}

fn format_value(value: Option<f64>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

/// Flat export: header plus one line per row, in dataset order.
pub fn export_flat_csv(rows: &[ObservationRow]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record(FLAT_HEADER)?;

    for r in rows {
        wtr.write_record([
            &r.date_label(),
            &r.zone,
            &r.interval.to_string(),
            &format_value(r.price),
            &format_value(r.volume),
            &format_value(r.buy_volume),
            &format_value(r.sell_volume),
        ])?;
    }

    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

/// Transposed export for one metric.
///
/// Dates appear in first-seen order. A date's n-th row fills column `n`
/// regardless of its interval field; shorter dates are padded with empty
/// cells up to the longest date.
pub fn export_transposed_csv(rows: &[ObservationRow], metric: Metric) -> Result<String> {
    let mut by_date: Vec<(String, Vec<String>)> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();
    for r in rows {
        let value = format_value(r.metric(metric));
        match index.entry(r.date_label()) {
            Entry::Occupied(slot) => by_date[*slot.get()].1.push(value),
            Entry::Vacant(slot) => {
                by_date.push((slot.key().clone(), vec![value]));
                slot.insert(by_date.len() - 1);
            }
        }
    }

    let width = by_date.iter().map(|(_, v)| v.len()).max().unwrap_or(0);

    let mut wtr = csv::Writer::from_writer(vec![]);
    let header: Vec<String> = std::iter::once("Date".to_string())
        .chain((1..=width).map(|i| i.to_string()))
        .collect();
    wtr.write_record(&header)?;

    for (date, mut values) in by_date {
        values.resize(width, String::new());
        wtr.write_record(std::iter::once(date).chain(values))?;
    }

    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}
