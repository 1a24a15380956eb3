//! Report adapter tests against saved OPCOM pages.

use chrono::NaiveDate;
use opcom_core::data::{extract_token, normalize_hourly, parse_day_report};
use opcom_core::domain::Granularity;
use std::path::PathBuf;

fn fixture(name: &str) -> String {
    let path = PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests/fixtures")
        .join(name);
    std::fs::read_to_string(&path).unwrap_or_else(|e| panic!("read {}: {e}", path.display()))
}

fn date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 9, 14).unwrap()
}

#[test]
fn hourly_page_yields_24_rows() {
    let rows = parse_day_report(&fixture("opcom_hourly.html"), date());

    assert_eq!(Granularity::from_len(rows.len()), Some(Granularity::Hourly));
    for (i, row) in rows.iter().enumerate() {
        assert_eq!(row.date, date());
        assert_eq!(row.zone, "ROPEX");
        assert_eq!(row.interval, i as u32 + 1);
    }
    assert_eq!(rows[0].price, Some(412.5));
    assert_eq!(rows[0].volume, Some(2037.25));
    assert_eq!(rows[0].buy_volume, Some(2187.25));
    assert_eq!(rows[0].sell_volume, Some(1887.25));
    assert_eq!(rows[23].price, Some(700.0));
}

#[test]
fn quarter_hourly_page_yields_96_rows() {
    let rows = parse_day_report(&fixture("opcom_quarter_hourly.html"), date());

    assert_eq!(rows.len(), 96);
    assert_eq!(rows[95].interval, 96);
    // "-" cells are missing, not zero
    assert_eq!(rows[0].sell_volume, None);
    assert_eq!(rows[4].sell_volume, Some(505.0));
}

#[test]
fn quarter_hourly_page_normalises_to_hour_means() {
    let rows = parse_day_report(&fixture("opcom_quarter_hourly.html"), date());
    let hourly = normalize_hourly(&rows).expect("96 rows");

    assert_eq!(hourly.len(), 24);
    for (i, row) in hourly.iter().enumerate() {
        let h = i as f64 + 1.0;
        assert_eq!(row.interval, i as u32 + 1);
        assert_eq!(row.price, Some(300.0 + 4.0 * h - 1.5));
        assert_eq!(row.volume, Some(1015.0));
    }
    assert_eq!(hourly[0].sell_volume, None);
    assert_eq!(hourly[1].sell_volume, Some(507.5));
}

#[test]
fn report_pages_carry_token() {
    let token = extract_token(&fixture("opcom_hourly.html"));
    assert_eq!(token.as_deref(), Some("Fh3kLq9ZtW2xY7pQvN1sR8dC0mJ4aB6eGuIoKyXz"));
    assert!(extract_token(&fixture("opcom_no_data.html")).is_some());
}

#[test]
fn pages_without_table_yield_empty_batches() {
    assert!(parse_day_report(&fixture("opcom_no_data.html"), date()).is_empty());
    assert!(parse_day_report(&fixture("opcom_session_expired.html"), date()).is_empty());
    assert_eq!(extract_token(&fixture("opcom_session_expired.html")), None);
}
