//! 15-minute → hourly normalisation.
//!
//! A 96-row day is split into 24 consecutive groups of four quarter-hours.
//! Each group becomes one hourly row carrying the first member's date and
//! zone, the 1-based hour as interval, and for every numeric column the
//! mean of the finite values present, rounded to 2 decimals. A column with
//! no values in a group stays missing.

use crate::domain::{DayBatch, ObservationRow, HOURLY_ROWS, QUARTER_HOURLY_ROWS};

const ROWS_PER_HOUR: usize = QUARTER_HOURLY_ROWS / HOURLY_ROWS;

/// True when the batch is a full 15-minute day.
pub fn is_quarter_hourly(batch: &[ObservationRow]) -> bool {
    batch.len() == QUARTER_HOURLY_ROWS
}

/// Collapse a 96-row day into 24 hourly rows.
///
/// Returns `None` for any batch that is not exactly 96 rows long; callers
/// keep such batches unchanged. Rows are assumed to be in interval order.
pub fn normalize_hourly(batch: &[ObservationRow]) -> Option<DayBatch> {
    if !is_quarter_hourly(batch) {
        return None;
    }

    let hours = batch
        .chunks_exact(ROWS_PER_HOUR)
        .enumerate()
        .map(|(hour, group)| {
            let first = &group[0];
            ObservationRow {
                date: first.date,
                zone: first.zone.clone(),
                interval: hour as u32 + 1,
                price: mean_2dp(group.iter().map(|r| r.price)),
                volume: mean_2dp(group.iter().map(|r| r.volume)),
                buy_volume: mean_2dp(group.iter().map(|r| r.buy_volume)),
                sell_volume: mean_2dp(group.iter().map(|r| r.sell_volume)),
            }
        })
        .collect();

    Some(hours)
}

fn mean_2dp(values: impl Iterator<Item = Option<f64>>) -> Option<f64> {
    let (sum, count) = values
        .flatten()
        .filter(|v| v.is_finite())
        .fold((0.0, 0u32), |(sum, n), v| (sum + v, n + 1));

    if count == 0 {
        return None;
    }
    let mean = sum / f64::from(count);
    Some((mean * 100.0).round() / 100.0)
}
