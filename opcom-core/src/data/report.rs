//! OPCOM report page adapter.
//!
//! This is the only place that knows how the report HTML is laid out: where
//! the session token lives, which table holds the data, and which cell holds
//! which column. If the site changes its markup, only this module changes.

use super::locale::parse_locale_number;
use crate::domain::{DayBatch, ObservationRow};
use chrono::NaiveDate;
use scraper::{ElementRef, Html, Selector};

const TOKEN_SELECTOR: &str = r#"input[name="_token"]"#;
const TABLE_SELECTOR: &str = "table.border_table";

/// Cell positions of each field within a data row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReportLayout {
    pub zone: usize,
    pub interval: usize,
    pub price: usize,
    pub volume: usize,
    pub buy_volume: usize,
    pub sell_volume: usize,
}

impl Default for ReportLayout {
    fn default() -> Self {
        Self {
            zone: 0,
            interval: 1,
            price: 2,
            volume: 3,
            buy_volume: 4,
            sell_volume: 5,
        }
    }
}

/// Extract the CSRF token from a loaded report page.
///
/// Returns `None` when the input is missing or its value is blank.
pub fn extract_token(html: &str) -> Option<String> {
    let doc = Html::parse_document(html);
    let selector = selector(TOKEN_SELECTOR)?;
    doc.select(&selector)
        .filter_map(|input| input.value().attr("value"))
        .map(str::trim)
        .find(|v| !v.is_empty())
        .map(str::to_string)
}

/// Parse a report page for `date` with the default column layout.
pub fn parse_day_report(html: &str, date: NaiveDate) -> DayBatch {
    parse_day_report_with(html, date, &ReportLayout::default())
}

/// Parse a report page for `date`.
///
/// Reads the first `table.border_table`, drops its header row and maps each
/// remaining row through `layout`. A page without that table yields an
/// empty batch. Rows without any `td` cells are skipped.
pub fn parse_day_report_with(html: &str, date: NaiveDate, layout: &ReportLayout) -> DayBatch {
    let doc = Html::parse_document(html);
    let (Some(table_sel), Some(tr_sel), Some(td_sel)) =
        (selector(TABLE_SELECTOR), selector("tr"), selector("td"))
    else {
        return Vec::new();
    };

    let Some(table) = doc.select(&table_sel).next() else {
        return Vec::new();
    };

    table
        .select(&tr_sel)
        .skip(1)
        .map(|tr| tr.select(&td_sel).map(cell_text).collect::<Vec<_>>())
        .filter(|cells| !cells.is_empty())
        .enumerate()
        .map(|(position, cells)| row_from_cells(date, position, &cells, layout))
        .collect()
}

fn row_from_cells(
    date: NaiveDate,
    position: usize,
    cells: &[String],
    layout: &ReportLayout,
) -> ObservationRow {
    let cell = |idx: usize| cells.get(idx).map(String::as_str).unwrap_or("");
    let interval = cell(layout.interval)
        .parse::<u32>()
        .ok()
        .filter(|&n| n > 0)
        .unwrap_or(position as u32 + 1);

    ObservationRow {
        date,
        zone: cell(layout.zone).to_string(),
        interval,
        price: parse_locale_number(cell(layout.price)),
        volume: parse_locale_number(cell(layout.volume)),
        buy_volume: parse_locale_number(cell(layout.buy_volume)),
        sell_volume: parse_locale_number(cell(layout.sell_volume)),
    }
}

/// Visible text of a cell with runs of whitespace collapsed.
fn cell_text(td: ElementRef<'_>) -> String {
    let raw: String = td.text().collect();
    raw.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn selector(css: &str) -> Option<Selector> {
    Selector::parse(css).ok()
}
