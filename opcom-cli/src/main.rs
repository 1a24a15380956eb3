//! OPCOM CLI: fetch report data over a date range and export it as CSV.
//!
//! Commands:
//! - `fetch`: collect day by day from the OPCOM report page and write CSV exports
//! - `parse`: run the report parser over a saved page and print the flat CSV

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use opcom_core::data::{
    normalize_hourly, parse_day_report, CancelFlag, StdoutProgress, ThreadPacer,
};
use opcom_core::domain::parse_iso_date;
use opcom_runner::{build_provider, export_flat_csv, run_export, RunConfig, RunError, RunOutput};
use std::path::{Path, PathBuf};
use tracing::warn;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "opcom",
    about = "OPCOM day-ahead market report scraper and CSV exporter"
)]
struct Cli {
    /// Debug-level logging (RUST_LOG takes precedence).
    #[arg(long, short, global = true, default_value_t = false)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch every day in a date range and write the selected CSV exports.
    Fetch(FetchArgs),
    /// Parse a saved report page and print its rows as flat CSV.
    Parse {
        /// Saved HTML page.
        file: PathBuf,

        /// Date the page reports on (YYYY-MM-DD).
        #[arg(long)]
        date: String,

        /// Collapse a 15-minute report to hourly means.
        #[arg(long, default_value_t = false)]
        hourly: bool,
    },
}

#[derive(Args)]
struct FetchArgs {
    /// Path to a TOML run config. Flags below override its values.
    #[arg(long)]
    config: Option<PathBuf>,

    /// First date (YYYY-MM-DD, inclusive).
    #[arg(long)]
    start: Option<String>,

    /// Last date (YYYY-MM-DD, inclusive).
    #[arg(long)]
    end: Option<String>,

    /// Collapse 15-minute days into hourly means.
    #[arg(long, default_value_t = false)]
    hourly: bool,

    /// Write opcom_all.csv (flat).
    #[arg(long, default_value_t = false)]
    all: bool,

    /// Write opcom_price.csv (transposed).
    #[arg(long, default_value_t = false)]
    price: bool,

    /// Write opcom_volume.csv (transposed).
    #[arg(long, default_value_t = false)]
    volume: bool,

    /// Write opcom_buy.csv (transposed).
    #[arg(long, default_value_t = false)]
    buy: bool,

    /// Write opcom_sell.csv (transposed).
    #[arg(long, default_value_t = false)]
    sell: bool,

    /// Pause after each day, in milliseconds. Defaults to 400.
    #[arg(long)]
    delay_ms: Option<u64>,

    /// Retries per request on transport failure. Defaults to 2.
    #[arg(long)]
    retries: Option<u32>,

    /// Report page URL.
    #[arg(long)]
    endpoint: Option<String>,

    /// Output directory. Defaults to ./exports.
    #[arg(long)]
    out_dir: Option<PathBuf>,

    /// Export the days collected so far if the run aborts.
    #[arg(long, default_value_t = false)]
    keep_partial: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Fetch(args) => run_fetch(args),
        Commands::Parse { file, date, hourly } => run_parse(&file, &date, hourly),
    }
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Build the run config from an optional file plus command-line overrides.
fn build_config(args: FetchArgs) -> Result<RunConfig> {
    let mut config = match &args.config {
        Some(path) => RunConfig::from_file(path)?,
        None => {
            let (Some(start), Some(end)) = (&args.start, &args.end) else {
                bail!("--start and --end are required without --config");
            };
            RunConfig::new(start.as_str(), end.as_str())
        }
    };

    if let Some(start) = args.start {
        config.start = start;
    }
    if let Some(end) = args.end {
        config.end = end;
    }
    config.normalize_hourly |= args.hourly;
    config.export_all |= args.all;
    config.export_price |= args.price;
    config.export_volume |= args.volume;
    config.export_buy |= args.buy;
    config.export_sell |= args.sell;
    config.export_partial_on_abort |= args.keep_partial;
    if let Some(delay_ms) = args.delay_ms {
        config.delay_ms = delay_ms;
    }
    if let Some(retries) = args.retries {
        config.max_retries = retries;
    }
    if let Some(endpoint) = args.endpoint {
        config.endpoint = endpoint;
    }
    if let Some(out_dir) = args.out_dir {
        config.output_dir = out_dir;
    }

    // No format chosen anywhere: write everything.
    if config.selected_exports().is_empty() {
        config = config.with_all_exports();
    }

    Ok(config)
}

fn run_fetch(args: FetchArgs) -> Result<()> {
    let config = build_config(args)?;
    let provider = build_provider(&config)?;

    let cancel = CancelFlag::new();
    let handler_flag = cancel.clone();
    ctrlc::set_handler(move || {
        eprintln!("\nInterrupt received, stopping after the current day...");
        handler_flag.cancel();
    })
    .context("failed to install Ctrl-C handler")?;

    match run_export(&config, &provider, &StdoutProgress, &ThreadPacer, &cancel) {
        Ok(output) => {
            print_summary(&output);
            Ok(())
        }
        Err(RunError::Collect { source, exported }) => {
            if exported.is_empty() {
                warn!("partial results discarded (use --keep-partial to export them)");
            } else {
                println!("Partial results written:");
                for path in &exported {
                    println!("  {}", path.display());
                }
            }
            Err(source).context("collection aborted")
        }
        Err(e) => Err(e.into()),
    }
}

fn print_summary(output: &RunOutput) {
    let m = &output.manifest;
    println!();
    println!("Range:       {} to {} ({} day(s))", m.start, m.end, output.range.len());
    println!("Rows:        {}", m.total_rows);
    if !m.empty_days.is_empty() {
        let dates: Vec<String> = m.empty_days.iter().map(ToString::to_string).collect();
        println!("No data:     {}", dates.join(", "));
    }
    println!("Dataset:     {}", m.dataset_hash);
    println!("Files:");
    for path in &output.written {
        println!("  {}", path.display());
    }
}

fn run_parse(file: &Path, date: &str, hourly: bool) -> Result<()> {
    let date = parse_iso_date(date)?;
    let html = std::fs::read_to_string(file)
        .with_context(|| format!("failed to read {}", file.display()))?;

    let mut rows = parse_day_report(&html, date);
    if rows.is_empty() {
        warn!(file = %file.display(), "no report table found");
    }
    if hourly {
        if let Some(hours) = normalize_hourly(&rows) {
            rows = hours;
        } else if !rows.is_empty() {
            warn!(rows = rows.len(), "not a 96-row report, left unchanged");
        }
    }

    print!("{}", export_flat_csv(&rows)?);
    Ok(())
}
