//! Writing a run's outputs to disk.
//!
//! The output directory receives each rendered CSV under its fixed name plus
//! a `manifest.json` describing the run. The manifest carries a
//! `schema_version`; newer versions are rejected on load.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use opcom_core::data::{CollectedDataset, DaySummary};
use opcom_core::domain::{DateRange, ObservationRow};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::export::{export_flat_csv, NamedCsv};

pub const MANIFEST_FILE: &str = "manifest.json";

/// Current manifest schema version.
pub const SCHEMA_VERSION: u32 = 1;

/// Summary of one run, written next to its CSV files.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunManifest {
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    pub created_at: DateTime<Utc>,
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub normalize_hourly: bool,
    /// Set when the run aborted and only the days before the abort were kept.
    pub partial: bool,
    pub total_rows: usize,
    pub days: Vec<DaySummary>,
    pub empty_days: Vec<NaiveDate>,
    pub files: Vec<String>,
    /// BLAKE3 hex digest of the flat CSV rendering of the dataset.
    pub dataset_hash: String,
}

fn default_schema_version() -> u32 {
    1
}

impl RunManifest {
    pub fn new(
        range: &DateRange,
        normalize_hourly: bool,
        dataset: &CollectedDataset,
        exports: &[NamedCsv],
        partial: bool,
    ) -> Result<Self> {
        Ok(Self {
            schema_version: SCHEMA_VERSION,
            created_at: Utc::now(),
            start: range.start(),
            end: range.end(),
            normalize_hourly,
            partial,
            total_rows: dataset.len(),
            days: dataset.days().to_vec(),
            empty_days: dataset.empty_days(),
            files: exports.iter().map(|e| e.name.clone()).collect(),
            dataset_hash: dataset_hash(dataset.rows())?,
        })
    }
}

/// Stable content hash of a dataset.
pub fn dataset_hash(rows: &[ObservationRow]) -> Result<String> {
    let flat = export_flat_csv(rows)?;
    Ok(blake3::hash(flat.as_bytes()).to_hex().to_string())
}

/// Write every rendered export into `dir`, creating it if needed.
pub fn write_exports(dir: &Path, exports: &[NamedCsv]) -> Result<Vec<PathBuf>> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("failed to create output dir: {}", dir.display()))?;

    exports
        .iter()
        .map(|export| {
            let path = dir.join(&export.name);
            std::fs::write(&path, &export.content)
                .with_context(|| format!("failed to write {}", path.display()))?;
            info!(file = %path.display(), bytes = export.content.len(), "wrote export");
            Ok(path)
        })
        .collect()
}

pub fn write_manifest(dir: &Path, manifest: &RunManifest) -> Result<PathBuf> {
    let json =
        serde_json::to_string_pretty(manifest).context("failed to serialize run manifest")?;
    let path = dir.join(MANIFEST_FILE);
    std::fs::write(&path, json)
        .with_context(|| format!("failed to write manifest to {}", path.display()))?;
    Ok(path)
}

/// Read `manifest.json` from an output directory.
pub fn load_manifest(dir: &Path) -> Result<RunManifest> {
    let path = dir.join(MANIFEST_FILE);
    let json = std::fs::read_to_string(&path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let manifest: RunManifest =
        serde_json::from_str(&json).context("failed to deserialize run manifest")?;
    if manifest.schema_version > SCHEMA_VERSION {
        bail!(
            "unsupported schema version {} (max supported: {})",
            manifest.schema_version,
            SCHEMA_VERSION
        );
    }
    Ok(manifest)
}

/// Write the exports and the manifest. Returns the paths written, manifest last.
pub fn save_artifacts(
    dir: &Path,
    exports: &[NamedCsv],
    manifest: &RunManifest,
) -> Result<Vec<PathBuf>> {
    let mut paths = write_exports(dir, exports)?;
    paths.push(write_manifest(dir, manifest)?);
    Ok(paths)
}
