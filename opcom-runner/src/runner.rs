//! Run orchestration: validate, acquire the session token, collect, export.
//!
//! When collection aborts part-way (transport failure or cancellation) the
//! rows gathered so far are discarded unless the config asks for them to be
//! exported; either way the run reports an error.

use std::path::PathBuf;
use std::sync::Arc;

use opcom_core::data::{
    collect_days, CancelFlag, CircuitBreaker, CollectError, CollectOptions, CollectProgress,
    CollectedDataset, DataError, DayProvider, OpcomProvider, Pacer,
};
use opcom_core::domain::DateRange;
use thiserror::Error;
use tracing::{info, warn};

use crate::artifacts::{save_artifacts, RunManifest};
use crate::config::{ConfigError, RunConfig};
use crate::export::{build_exports, NamedCsv};

/// Errors from the runner.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    #[error("could not acquire session token: {0}")]
    Token(#[source] DataError),

    #[error("collection aborted: {source}")]
    Collect {
        #[source]
        source: CollectError,
        /// Files written from the partial dataset, empty when it was discarded.
        exported: Vec<PathBuf>,
    },

    /// Collection aborted and writing the partial results failed too.
    #[error("collection aborted: {source}; partial export failed: {export}")]
    PartialExport {
        #[source]
        source: CollectError,
        export: Box<RunError>,
    },

    #[error("export failed: {0:#}")]
    Export(#[source] anyhow::Error),

    #[error("failed to write outputs: {0:#}")]
    Io(#[source] anyhow::Error),
}

/// Everything a completed run produced.
#[derive(Debug, Clone)]
pub struct RunOutput {
    pub range: DateRange,
    pub dataset: CollectedDataset,
    pub exports: Vec<NamedCsv>,
    pub manifest: RunManifest,
    /// Paths written, manifest last.
    pub written: Vec<PathBuf>,
}

/// Live OPCOM provider configured from the run's endpoint and retry settings.
pub fn build_provider(config: &RunConfig) -> Result<OpcomProvider, DataError> {
    let breaker = Arc::new(CircuitBreaker::default_endpoint());
    Ok(OpcomProvider::new(&config.endpoint, breaker)?.with_retry(config.retry_policy()))
}

/// Execute a full run against `provider` and write its outputs to
/// `config.output_dir`.
pub fn run_export(
    config: &RunConfig,
    provider: &dyn DayProvider,
    progress: &dyn CollectProgress,
    pacer: &dyn Pacer,
    cancel: &CancelFlag,
) -> Result<RunOutput, RunError> {
    let range = config.validate()?;
    let exports = config.selected_exports();
    info!(
        provider = provider.name(),
        start = %range.start(),
        end = %range.end(),
        days = range.len(),
        exports = exports.len(),
        "starting run"
    );

    let token = provider.acquire_token().map_err(RunError::Token)?;
    info!("session token acquired");

    let opts = CollectOptions {
        normalize_hourly: config.normalize_hourly,
        delay: config.delay(),
        cancel: cancel.clone(),
    };

    match collect_days(provider, &range, &token, &opts, progress, pacer) {
        Ok(dataset) => finish(config, range, dataset, false),
        Err(source) if config.export_partial_on_abort => {
            warn!(
                error = %source,
                rows = source.partial().len(),
                "run aborted, exporting partial results"
            );
            match finish(config, range, source.partial().clone(), true) {
                Ok(output) => Err(RunError::Collect {
                    source,
                    exported: output.written,
                }),
                Err(export) => {
                    warn!(error = %export, "partial export failed");
                    Err(RunError::PartialExport {
                        source,
                        export: Box::new(export),
                    })
                }
            }
        }
        Err(source) => {
            warn!(
                error = %source,
                rows = source.partial().len(),
                "run aborted, discarding partial results"
            );
            Err(RunError::Collect {
                source,
                exported: Vec::new(),
            })
        }
    }
}

fn finish(
    config: &RunConfig,
    range: DateRange,
    dataset: CollectedDataset,
    partial: bool,
) -> Result<RunOutput, RunError> {
    let exports =
        build_exports(dataset.rows(), &config.selected_exports()).map_err(RunError::Export)?;
    let manifest = RunManifest::new(&range, config.normalize_hourly, &dataset, &exports, partial)
        .map_err(RunError::Export)?;
    let written =
        save_artifacts(&config.output_dir, &exports, &manifest).map_err(RunError::Io)?;

    info!(
        rows = dataset.len(),
        files = written.len(),
        dir = %config.output_dir.display(),
        partial,
        "run outputs written"
    );

    Ok(RunOutput {
        range,
        dataset,
        exports,
        manifest,
        written,
    })
}
