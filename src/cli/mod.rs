//! Command-line parsing for the CMJ to bat-speed transfer analysis.
//!
//! The goal of this module is to keep **argument parsing** and **command dispatch**
//! separate from the statistics code. Every analysis option is an `Option` here
//! so that a value from `--config` is only overridden when the flag is given.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(
    name = "transfer",
    version,
    about = "CMJ to bat speed transfer efficiency by competition level"
)]
pub struct Cli {
    /// Enable debug logging (overridden by RUST_LOG).
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Fit every level, print rankings, and write the report files.
    Report(ReportArgs),
    /// Project one athlete's bat speed from their CMJ height.
    Project(ProjectArgs),
    /// Compute jump metrics from one force-plate trace.
    Metrics(MetricsArgs),
}

/// Options shared by every subcommand.
#[derive(Debug, Args, Clone)]
pub struct InputArgs {
    /// Input CSV with one row per athlete test.
    #[arg(long, value_name = "CSV")]
    pub input: PathBuf,

    /// TOML config file (CLI flags take precedence).
    #[arg(long, value_name = "TOML")]
    pub config: Option<PathBuf>,

    /// Column holding the competition level.
    #[arg(long = "level-col", alias = "level_col", value_name = "NAME")]
    pub level_col: Option<String>,

    /// Column holding the CMJ jump height.
    #[arg(long = "cmj-col", alias = "cmj_col", value_name = "NAME")]
    pub cmj_col: Option<String>,

    /// Column holding bat speed (mph).
    #[arg(long = "bat-col", alias = "bat_col", value_name = "NAME")]
    pub bat_col: Option<String>,

    /// Bat-speed column used when the primary one is absent or nearly empty.
    /// Default `hitting_max_hss`; pass an empty string to disable.
    #[arg(long = "bat-fallback-col", alias = "bat_fallback_col", value_name = "NAME")]
    pub bat_fallback_col: Option<String>,

    /// Optional athlete identifier column.
    #[arg(long = "id-col", alias = "id_col", value_name = "NAME")]
    pub id_col: Option<String>,

    /// Drop bat speeds below this value (mph). Default 40.
    #[arg(long = "min-bat", alias = "min_bat")]
    pub min_bat: Option<f64>,

    /// Outlier cut in standard deviations from the level mean. Default 3.
    #[arg(long = "z-cut", alias = "z_cut")]
    pub z_cut: Option<f64>,

    /// Also remove CMJ-height outliers with the same z cut.
    #[arg(long = "filter-cmj-outliers")]
    pub filter_cmj_outliers: bool,

    /// Residuals within this many mph of zero are classified neutral. Default 0.
    #[arg(long = "neutral-band")]
    pub neutral_band: Option<f64>,

    /// Minimum cleaned rows needed to fit a level (never below 2).
    #[arg(long = "min-samples", alias = "min_samples")]
    pub min_samples: Option<usize>,

    /// Output directory for report files. Default `reports`.
    #[arg(long = "out-dir", alias = "out_dir", value_name = "DIR")]
    pub out_dir: Option<PathBuf>,
}

/// Options for the batch report.
#[derive(Debug, Args, Clone)]
pub struct ReportArgs {
    #[command(flatten)]
    pub input: InputArgs,

    /// Show top-N over- and under-performers per level. Default 15.
    #[arg(long, alias = "top_n")]
    pub top: Option<usize>,

    /// Render an ASCII plot per level in the terminal (enabled by default).
    #[arg(long, default_value_t = true)]
    pub plot: bool,

    /// Disable the terminal plot.
    #[arg(long)]
    pub no_plot: bool,

    /// Plot width (columns).
    #[arg(long, default_value_t = 80)]
    pub width: usize,

    /// Plot height (rows).
    #[arg(long, default_value_t = 20)]
    pub height: usize,

    /// Also write the full run (models, residuals, counts) as JSON.
    #[arg(long = "export-json", value_name = "JSON")]
    pub export_json: Option<PathBuf>,

    /// Print to the terminal only; write no files.
    #[arg(long)]
    pub no_files: bool,
}

/// Options for a single-athlete projection.
#[derive(Debug, Args, Clone)]
pub struct ProjectArgs {
    #[command(flatten)]
    pub input: InputArgs,

    /// Competition level of the athlete (e.g. "High School", college, pro),
    /// or `All` to project from every level pooled.
    #[arg(long, default_value = "All")]
    pub level: String,

    /// The athlete's CMJ height, in the same units as the input.
    #[arg(long = "athlete-cmj", alias = "athlete_cmj")]
    pub athlete_cmj: f64,

    /// Confidence level for the bootstrap interval. Default 0.95.
    #[arg(long)]
    pub confidence: Option<f64>,

    /// Number of bootstrap resamples. Default 1000.
    #[arg(long, alias = "n_bootstrap")]
    pub bootstrap: Option<usize>,

    /// Seed for reproducible intervals.
    #[arg(long)]
    pub seed: Option<u64>,

    /// Also write an HTML projection report into the output directory.
    #[arg(long)]
    pub report: bool,

    /// Also write the projection as JSON.
    #[arg(long = "export-json", value_name = "JSON")]
    pub export_json: Option<PathBuf>,
}

/// Options for the force-plate metrics report.
#[derive(Debug, Args, Clone)]
pub struct MetricsArgs {
    /// Force-plate CSV with `time_s` and `force_n` columns.
    #[arg(long, value_name = "CSV")]
    pub input: PathBuf,

    /// Athlete name for the report title and file name.
    #[arg(long, default_value = "Athlete")]
    pub athlete: String,

    /// Sampling rate of the force plate (Hz).
    #[arg(long = "sampling-rate", alias = "sampling_rate", value_name = "HZ")]
    pub sampling_rate: u32,

    /// Output directory for the HTML report.
    #[arg(long = "out-dir", alias = "out_dir", value_name = "DIR", default_value = "reports")]
    pub out_dir: PathBuf,

    /// Also write the metrics as JSON.
    #[arg(long = "export-json", value_name = "JSON")]
    pub export_json: Option<PathBuf>,

    /// Print to the terminal only; write no files.
    #[arg(long)]
    pub no_files: bool,
}
