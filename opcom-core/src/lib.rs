//! OPCOM Core: observation rows, date ranges, report parsing, day collection.
//!
//! This crate holds everything between "a date range" and "a list of rows":
//! - Domain types (observation rows, metrics, closed date ranges)
//! - Romanian-locale number parsing
//! - The report page adapter (session token, `border_table` rows)
//! - The `DayProvider` seam and the live OPCOM HTTP provider
//! - 15-minute → hourly normalisation
//! - The sequential, rate-limited collection driver

pub mod data;
pub mod domain;
