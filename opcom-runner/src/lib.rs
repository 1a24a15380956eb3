//! OPCOM Runner: run configuration, CSV exporters, artifacts, orchestration.
//!
//! This crate builds on `opcom-core` to provide:
//! - TOML run configuration with validation
//! - Flat and per-metric transposed CSV exports
//! - Output directory writing with a JSON run manifest
//! - The end-to-end run with its partial-results policy

pub mod artifacts;
pub mod config;
pub mod export;
pub mod runner;

pub use artifacts::{
    dataset_hash, load_manifest, save_artifacts, write_exports, write_manifest, RunManifest,
    MANIFEST_FILE, SCHEMA_VERSION,
};
pub use config::{ConfigError, RunConfig, MAX_DELAY_MS};
pub use export::{
    build_exports, export_flat_csv, export_transposed_csv, ExportKind, NamedCsv, FLAT_HEADER,
};
pub use runner::{build_provider, run_export, RunError, RunOutput};
