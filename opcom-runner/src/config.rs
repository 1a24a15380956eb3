//! Serializable run configuration.
//!
//! A run is described by a date range, the hourly-normalisation switch, the
//! set of CSV exports to produce, and request pacing. It can be loaded from
//! a TOML file and then overridden field by field from the command line.

use crate::export::ExportKind;
use opcom_core::data::{RetryPolicy, OPCOM_ENDPOINT};
use opcom_core::domain::{DateRange, DateRangeError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid date range: {0}")]
    Range(#[from] DateRangeError),

    #[error("no export selected (enable at least one of all, price, volume, buy, sell)")]
    NoExportSelected,

    #[error("delay_ms must be at most {max} ms, got {got}")]
    InvalidDelay { got: u64, max: u64 },
}

/// Upper bound on the per-day pause.
pub const MAX_DELAY_MS: u64 = 60_000;

/// Configuration for a single collection + export run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct RunConfig {
    /// First date to fetch (YYYY-MM-DD, inclusive).
    pub start: String,
    /// Last date to fetch (YYYY-MM-DD, inclusive).
    pub end: String,

    /// Collapse 15-minute days into hourly means.
    #[serde(default)]
    pub normalize_hourly: bool,

    #[serde(default)]
    pub export_all: bool,
    #[serde(default)]
    pub export_price: bool,
    #[serde(default)]
    pub export_volume: bool,
    #[serde(default)]
    pub export_buy: bool,
    #[serde(default)]
    pub export_sell: bool,

    /// Pause after each day's request.
    #[serde(default = "default_delay_ms")]
    pub delay_ms: u64,

    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// Extra attempts per request after a transport failure.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    #[serde(default = "default_retry_base_delay_ms")]
    pub retry_base_delay_ms: u64,

    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// Write whatever was collected when a run aborts part-way.
    #[serde(default)]
    pub export_partial_on_abort: bool,
}

fn default_delay_ms() -> u64 {
    400
}

fn default_endpoint() -> String {
    OPCOM_ENDPOINT.to_string()
}

fn default_max_retries() -> u32 {
    RetryPolicy::default().max_retries
}

fn default_retry_base_delay_ms() -> u64 {
    RetryPolicy::default().base_delay.as_millis() as u64
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("exports")
}

impl RunConfig {
    /// A config for `[start, end]` with every other field at its default
    /// and no export selected.
    pub fn new(start: impl Into<String>, end: impl Into<String>) -> Self {
        Self {
            start: start.into(),
            end: end.into(),
            normalize_hourly: false,
            export_all: false,
            export_price: false,
            export_volume: false,
            export_buy: false,
            export_sell: false,
            delay_ms: default_delay_ms(),
            endpoint: default_endpoint(),
            max_retries: default_max_retries(),
            retry_base_delay_ms: default_retry_base_delay_ms(),
            output_dir: default_output_dir(),
            export_partial_on_abort: false,
        }
    }

    /// Load a config from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }

    /// Parse a config from a TOML string.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Enable every export.
    pub fn with_all_exports(mut self) -> Self {
        self.export_all = true;
        self.export_price = true;
        self.export_volume = true;
        self.export_buy = true;
        self.export_sell = true;
        self
    }

    /// Check preconditions and return the validated date range.
    pub fn validate(&self) -> Result<DateRange, ConfigError> {
        let range = DateRange::parse(&self.start, &self.end)?;
        if self.selected_exports().is_empty() {
            return Err(ConfigError::NoExportSelected);
        }
        if self.delay_ms > MAX_DELAY_MS {
            return Err(ConfigError::InvalidDelay {
                got: self.delay_ms,
                max: MAX_DELAY_MS,
            });
        }
        Ok(range)
    }

    /// Selected exports, in output order.
    pub fn selected_exports(&self) -> Vec<ExportKind> {
        use opcom_core::domain::Metric;

        [
            (self.export_all, ExportKind::Flat),
            (self.export_price, ExportKind::Transposed(Metric::Price)),
            (self.export_volume, ExportKind::Transposed(Metric::Volume)),
            (self.export_buy, ExportKind::Transposed(Metric::Buy)),
            (self.export_sell, ExportKind::Transposed(Metric::Sell)),
        ]
        .into_iter()
        .filter_map(|(on, kind)| on.then_some(kind))
        .collect()
    }

    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.max_retries,
            base_delay: Duration::from_millis(self.retry_base_delay_ms),
        }
    }
}
