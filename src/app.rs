//! Top-level application orchestration.
//!
//! `src/main.rs` is intentionally tiny; this module is the "real main" that:
//! - parses CLI arguments and merges them over the config file
//! - sets up logging
//! - runs the batch, projection or force-plate metrics pipeline
//! - prints reports/plots
//! - writes report files once every computation has succeeded

use std::path::{Path, PathBuf};

use chrono::Utc;
use clap::Parser;
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Command, InputArgs, MetricsArgs, ProjectArgs, ReportArgs};
use crate::domain::{AnalysisConfig, BootstrapOptions, ProjectionRequest};
use crate::error::AppError;
use crate::io::config::{FileConfig, fallback_column, load_config_file};
use crate::io::export::{
    filter_counts_csv, force_report_file_name, residuals_csv, residuals_file_name, to_json_bytes,
    write_files_atomically,
};
use crate::report::chart::{render_force_chart, render_level_chart};
use crate::report::format::{
    RunOverview, format_force_metrics, format_models, format_projection, format_rankings, format_run_summary,
};
use crate::report::html::{
    BatchReport, ForceReport, LevelSection, render_batch_report, render_force_report, render_projection_report,
};

pub mod pipeline;

pub const REPORT_FILE: &str = "transfer_report.html";
pub const COUNTS_FILE: &str = "filter_counts.csv";

const CHART_WIDTH: u32 = 720;
const CHART_HEIGHT: u32 = 440;
const FORCE_CHART_HEIGHT: u32 = 380;

/// Entry point for the `transfer` binary.
pub fn run() -> Result<(), AppError> {
    // `transfer --input x.csv` runs the report,
    // `transfer --input x.csv --athlete_cmj 35 ...` runs a projection and
    // `transfer --input jump.csv --sampling_rate 1000` runs the force-plate metrics.
    //
    // Clap requires a subcommand name, so we do a small, explicit rewrite of the
    // argv list before parsing.
    let argv = rewrite_args(std::env::args().collect());
    let cli = Cli::parse_from(argv);
    init_tracing(cli.verbose);

    match cli.command {
        Command::Report(args) => handle_report(&args),
        Command::Project(args) => handle_project(&args),
        Command::Metrics(args) => handle_metrics(&args),
    }
}

/// Log to stderr so stdout only carries the report.
fn init_tracing(verbose: bool) {
    let default = if verbose {
        "cmj_transfer=debug,warn"
    } else {
        "cmj_transfer=info,warn"
    };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)))
        .with_writer(std::io::stderr)
        .with_ansi(std::io::IsTerminal::is_terminal(&std::io::stderr()))
        .with_target(false)
        .try_init();
}

fn handle_report(args: &ReportArgs) -> Result<(), AppError> {
    let (config, _) = config_from_report_args(args)?;
    let run = pipeline::run_batch(&config)?;

    print!(
        "{}",
        format_run_summary(&RunOverview {
            input: &config.input,
            rows_read: run.ingest.rows_read,
            rows_skipped: run.ingest.row_errors.len(),
            bat_speed_column: &run.ingest.bat_speed_column,
            cleaning: &config.cleaning,
            counts: run.cleaned.all_counts(),
        })
    );
    let models: Vec<_> = run.levels.iter().map(|l| l.model.clone()).collect();
    print!("{}", format_models(&models, run.pooled.as_ref(), &run.failures));

    for level in &run.levels {
        print!("{}", format_rankings(level.model.level, &level.rankings));
        if config.plot {
            println!();
            print!(
                "{}",
                crate::plot::render_ascii_plot(
                    &level.analysis.records,
                    &level.model,
                    config.plot_width,
                    config.plot_height,
                    Some(&level.rankings),
                )
            );
        }
    }

    // Render everything first; write only when all artifacts exist.
    let generated_at = Utc::now();
    let mut files: Vec<(PathBuf, Vec<u8>)> = Vec::new();

    if config.write_files {
        let charts: Vec<Option<String>> = run
            .levels
            .iter()
            .map(|l| match render_level_chart(&l.analysis, &l.model, CHART_WIDTH, CHART_HEIGHT) {
                Ok(svg) => Some(svg),
                Err(e) => {
                    warn!("{e}");
                    None
                }
            })
            .collect();
        let sections = run
            .levels
            .iter()
            .zip(&charts)
            .map(|(l, svg)| LevelSection {
                model: &l.model,
                analysis: &l.analysis,
                rankings: &l.rankings,
                chart_svg: svg.as_deref(),
            })
            .collect();
        let html = render_batch_report(&BatchReport {
            generated_at,
            input: &config.input,
            cleaning: &config.cleaning,
            neutral_band: config.neutral_band,
            counts: run.cleaned.all_counts(),
            levels: sections,
            pooled: run.pooled.as_ref(),
            failures: &run.failures,
        });

        files.push((config.out_dir.join(REPORT_FILE), html.into_bytes()));
        files.push((config.out_dir.join(COUNTS_FILE), filter_counts_csv(run.cleaned.all_counts())?));
        for l in &run.levels {
            files.push((
                config.out_dir.join(residuals_file_name(l.model.level)),
                residuals_csv(&l.analysis.records)?,
            ));
        }
    }
    if let Some(path) = &config.export_json {
        let export = run.to_export(&config, generated_at.to_rfc3339());
        files.push((path.clone(), to_json_bytes(&export)?));
    }

    write_files_atomically(&files)?;
    if !files.is_empty() {
        println!("\nWrote {} file(s) to {}", files.len(), describe_targets(&files));
    }
    Ok(())
}

fn handle_project(args: &ProjectArgs) -> Result<(), AppError> {
    let (config, file) = config_from_input_args(&args.input)?;
    let request = projection_request(args, file.as_ref());
    let run = pipeline::run_projection(&config, &request)?;

    print!("{}", format_projection(&run.projection, &run.model));

    let mut files: Vec<(PathBuf, Vec<u8>)> = Vec::new();
    if args.report {
        let html = render_projection_report(&run.projection, &run.model, &config.input, Utc::now());
        let name = format!("projection_{}.html", run.projection.level.slug());
        files.push((config.out_dir.join(name), html.into_bytes()));
    }
    if let Some(path) = &args.export_json {
        files.push((path.clone(), to_json_bytes(&run)?));
    }

    write_files_atomically(&files)
}

fn handle_metrics(args: &MetricsArgs) -> Result<(), AppError> {
    let run = pipeline::run_force_metrics(&args.input, &args.athlete, args.sampling_rate)?;

    print!("{}", format_force_metrics(&run.athlete, &run.metrics));

    let mut files: Vec<(PathBuf, Vec<u8>)> = Vec::new();
    if !args.no_files {
        let title = format!("{} Force-Time", run.athlete);
        let chart = match render_force_chart(&run.trace, &run.metrics, &title, CHART_WIDTH, FORCE_CHART_HEIGHT) {
            Ok(svg) => Some(svg),
            Err(e) => {
                warn!("{e}");
                None
            }
        };
        let html = render_force_report(&ForceReport {
            athlete: &run.athlete,
            input: &run.input,
            generated_at: Utc::now(),
            sampling_rate_hz: run.sampling_rate_hz,
            samples: run.samples,
            metrics: &run.metrics,
            chart_svg: chart.as_deref(),
        });
        files.push((args.out_dir.join(force_report_file_name(&run.athlete)), html.into_bytes()));
    }
    if let Some(path) = &args.export_json {
        files.push((path.clone(), to_json_bytes(&run)?));
    }

    write_files_atomically(&files)?;
    if !files.is_empty() {
        println!("\nWrote {} file(s) to {}", files.len(), describe_targets(&files));
    }
    Ok(())
}

fn describe_targets(files: &[(PathBuf, Vec<u8>)]) -> String {
    let mut dirs: Vec<String> = files
        .iter()
        .map(|(p, _)| {
            p.parent()
                .filter(|d| !d.as_os_str().is_empty())
                .unwrap_or(Path::new("."))
                .display()
                .to_string()
        })
        .collect();
    dirs.sort();
    dirs.dedup();
    dirs.join(", ")
}

/// Build the analysis config: defaults, then the config file, then CLI flags.
pub fn config_from_input_args(args: &InputArgs) -> Result<(AnalysisConfig, Option<FileConfig>), AppError> {
    let mut config = AnalysisConfig::new(&args.input);

    let file = match &args.config {
        Some(path) => {
            let file = load_config_file(path)?;
            file.apply(&mut config);
            debug!(path = %path.display(), "applied config file");
            Some(file)
        }
        None => None,
    };

    if let Some(v) = &args.level_col {
        config.columns.level = v.clone();
    }
    if let Some(v) = &args.cmj_col {
        config.columns.cmj_height = v.clone();
    }
    if let Some(v) = &args.bat_col {
        config.columns.bat_speed = v.clone();
    }
    if let Some(v) = &args.bat_fallback_col {
        config.columns.bat_speed_fallback = fallback_column(v);
    }
    if args.id_col.is_some() {
        config.columns.id = args.id_col.clone();
    }
    if let Some(v) = args.min_bat {
        config.cleaning.min_bat_speed = v;
    }
    if let Some(v) = args.z_cut {
        config.cleaning.z_cut = v;
    }
    if args.filter_cmj_outliers {
        config.cleaning.filter_cmj_outliers = true;
    }
    if let Some(v) = args.neutral_band {
        config.neutral_band = v;
    }
    if let Some(v) = args.min_samples {
        config.min_samples = v;
    }
    if let Some(v) = &args.out_dir {
        config.out_dir = v.clone();
    }

    Ok((config, file))
}

pub fn config_from_report_args(args: &ReportArgs) -> Result<(AnalysisConfig, Option<FileConfig>), AppError> {
    let (mut config, file) = config_from_input_args(&args.input)?;
    if let Some(v) = args.top {
        config.top_n = v;
    }
    config.plot = args.plot && !args.no_plot;
    config.plot_width = args.width;
    config.plot_height = args.height;
    config.write_files = !args.no_files;
    config.export_json = args.export_json.clone();
    Ok((config, file))
}

pub fn projection_request(args: &ProjectArgs, file: Option<&FileConfig>) -> ProjectionRequest {
    let mut bootstrap = BootstrapOptions::default();
    if let Some(file) = file {
        file.apply_bootstrap(&mut bootstrap);
    }
    if let Some(v) = args.confidence {
        bootstrap.confidence = v;
    }
    if let Some(v) = args.bootstrap {
        bootstrap.iterations = v;
    }
    if args.seed.is_some() {
        bootstrap.seed = args.seed;
    }

    ProjectionRequest {
        level: args.level.clone(),
        athlete_cmj: args.athlete_cmj,
        bootstrap,
    }
}

/// Rewrite argv so a bare invocation picks the right subcommand.
///
/// Rules:
/// - `transfer --input x.csv ...`                  -> `transfer report --input x.csv ...`
/// - `transfer --input x.csv --athlete_cmj 35 ...` -> `transfer project --input x.csv ...`
/// - `transfer --input j.csv --sampling_rate 1000` -> `transfer metrics --input j.csv ...`
/// - `transfer --help/--version/-h`                -> unchanged
/// - `transfer report|project|metrics ...`         -> unchanged
fn rewrite_args(mut argv: Vec<String>) -> Vec<String> {
    let Some(arg1) = argv.get(1).cloned() else {
        return argv;
    };

    let is_top_level_help_or_version = matches!(arg1.as_str(), "-h" | "--help" | "-V" | "--version" | "help");
    if is_top_level_help_or_version {
        return argv;
    }

    let is_subcommand = matches!(arg1.as_str(), "report" | "project" | "metrics");
    if is_subcommand {
        return argv;
    }

    // Flags first: infer the subcommand from what was asked for.
    let has_flag = |names: &[&str]| {
        argv.iter().skip(1).any(|a| {
            let flag = a.split('=').next().unwrap_or(a);
            names.contains(&flag)
        })
    };
    let sub = if has_flag(&["--athlete_cmj", "--athlete-cmj"]) {
        "project"
    } else if has_flag(&["--sampling_rate", "--sampling-rate"]) {
        "metrics"
    } else {
        "report"
    };
    if argv.iter().skip(1).any(|a| a.starts_with('-')) {
        argv.insert(1, sub.to_string());
    }
    argv
}
