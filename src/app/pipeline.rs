//! Shared analysis pipeline used by the `report`, `project` and `metrics` commands.
//!
//! Keeping this in one place avoids duplicating the core workflow:
//! ingest -> clean -> fit per level -> residuals -> rankings (batch), or
//! ingest -> clean -> resolve cohort -> fit -> bootstrap (projection), or
//! load trace -> jump metrics (force plate).
//!
//! The command handlers can then focus on presentation and file output.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{info, warn};

use crate::clean::{CleanedData, clean};
use crate::domain::{
    AnalysisConfig, Cohort, FilterCounts, ForceMetrics, ForceTrace, Level, ProjectionRequest, ProjectionResult,
    RegressionModel,
};
use crate::error::AppError;
use crate::fit::{fit_level_with_min, fit_levels, fit_pooled, project};
use crate::force::compute_force_metrics;
use crate::io::force::load_force_trace;
use crate::io::ingest::{IngestedData, load_athlete_records};
use crate::report::{Rankings, ResidualAnalysis, analyze_residuals, rank_over_under};

/// Everything computed for one successfully fitted level.
#[derive(Debug, Clone, Serialize)]
pub struct LevelReport {
    pub model: RegressionModel,
    pub analysis: ResidualAnalysis,
    pub rankings: Rankings,
}

/// All computed outputs of a batch run.
#[derive(Debug, Clone)]
pub struct BatchRun {
    pub ingest: IngestedData,
    pub cleaned: CleanedData,
    /// Fitted levels, in `Level` order.
    pub levels: Vec<LevelReport>,
    /// Levels that were present but could not be fitted.
    pub failures: Vec<(Level, AppError)>,
    /// One line over every retained row; `None` when it could not be fitted.
    pub pooled: Option<RegressionModel>,
}

impl BatchRun {
    pub fn level(&self, level: Level) -> Option<&LevelReport> {
        self.levels.iter().find(|l| l.model.level == level)
    }
}

/// Outputs of a single-athlete projection.
#[derive(Debug, Clone, Serialize)]
pub struct ProjectionRun {
    pub model: RegressionModel,
    pub projection: ProjectionResult,
    pub counts: FilterCounts,
}

/// Reject option values that would make the analysis meaningless.
pub fn validate_config(config: &AnalysisConfig) -> Result<(), AppError> {
    let c = &config.cleaning;
    if !c.min_bat_speed.is_finite() {
        return Err(AppError::Config(format!(
            "min bat speed must be a finite number, got {}",
            c.min_bat_speed
        )));
    }
    if !(c.z_cut.is_finite() && c.z_cut > 0.0) {
        return Err(AppError::Config(format!("z cut must be positive, got {}", c.z_cut)));
    }
    if !(config.neutral_band.is_finite() && config.neutral_band >= 0.0) {
        return Err(AppError::Config(format!(
            "neutral band must be zero or positive, got {}",
            config.neutral_band
        )));
    }
    for (name, col) in [
        ("level", &config.columns.level),
        ("cmj_height", &config.columns.cmj_height),
        ("bat_speed", &config.columns.bat_speed),
    ] {
        if col.trim().is_empty() {
            return Err(AppError::Config(format!("column name for {name} is empty")));
        }
    }
    Ok(())
}

/// Execute the batch pipeline from the configured input file.
pub fn run_batch(config: &AnalysisConfig) -> Result<BatchRun, AppError> {
    validate_config(config)?;
    let ingest = load_athlete_records(&config.input, &config.columns)?;
    run_batch_with_ingest(ingest, config)
}

/// Execute the batch pipeline on already-ingested records.
///
/// Per-level failures are collected; the run only fails when no level could
/// be fitted, with the first failing level's error.
pub fn run_batch_with_ingest(ingest: IngestedData, config: &AnalysisConfig) -> Result<BatchRun, AppError> {
    let cleaned = clean(&ingest.records, &config.cleaning);
    log_counts(&cleaned);

    let fits = fit_levels(&cleaned, config.min_samples);
    let mut failures = fits.failed;
    let mut levels = Vec::with_capacity(fits.fitted.len());

    for model in fits.fitted {
        let Some(dataset) = model.level.as_level().and_then(|level| cleaned.dataset(level)) else {
            continue;
        };
        match analyze_residuals(dataset, &model, config.neutral_band) {
            Ok(analysis) => {
                let rankings = rank_over_under(&analysis.records, config.top_n);
                info!(
                    level = %model.level,
                    n = model.n_samples,
                    slope = model.slope,
                    intercept = model.intercept,
                    r = model.r,
                    "level fitted"
                );
                levels.push(LevelReport {
                    model,
                    analysis,
                    rankings,
                });
            }
            Err(e) => {
                warn!(level = %model.level, "{e}");
                if let Some(level) = model.level.as_level() {
                    failures.push((level, e));
                }
            }
        }
    }
    failures.sort_by_key(|(level, _)| *level);

    if levels.is_empty() {
        return Err(match failures.into_iter().next() {
            Some((_, err)) => err,
            None => AppError::InputFormat("No levels found in input.".to_string()),
        });
    }

    let pooled = match fit_pooled(&cleaned, config.min_samples) {
        Ok(model) => {
            info!(n = model.n_samples, slope = model.slope, intercept = model.intercept, r = model.r, "pooled fit");
            Some(model)
        }
        Err(e) => {
            warn!("pooled fit skipped: {e}");
            None
        }
    };

    Ok(BatchRun {
        ingest,
        cleaned,
        levels,
        failures,
        pooled,
    })
}

/// Execute a projection from the configured input file.
pub fn run_projection(config: &AnalysisConfig, request: &ProjectionRequest) -> Result<ProjectionRun, AppError> {
    validate_config(config)?;
    let ingest = load_athlete_records(&config.input, &config.columns)?;
    run_projection_with_ingest(&ingest, config, request)
}

/// Execute a projection on already-ingested records. Any failure is fatal.
pub fn run_projection_with_ingest(
    ingest: &IngestedData,
    config: &AnalysisConfig,
    request: &ProjectionRequest,
) -> Result<ProjectionRun, AppError> {
    let cleaned = clean(&ingest.records, &config.cleaning);
    log_counts(&cleaned);

    let level = resolve_level(&request.level, &cleaned)?;
    let dataset = cleaned.cohort(level).ok_or_else(|| unknown_level(&request.level, &cleaned))?;
    let counts = cleaned.cohort_counts(level).unwrap_or_default();

    let model = fit_level_with_min(&dataset, config.min_samples)?;
    let projection = project(&model, &dataset, request.athlete_cmj, &request.bootstrap)?;
    if projection.extrapolated {
        warn!(
            level = %level,
            cmj = request.athlete_cmj,
            min = projection.observed_cmj_min,
            max = projection.observed_cmj_max,
            "athlete CMJ is outside the observed range"
        );
    }

    Ok(ProjectionRun {
        model,
        projection,
        counts,
    })
}

/// Map a user-typed level name onto a level present in the input, or onto
/// the pooled cohort for `All`.
pub fn resolve_level(requested: &str, cleaned: &CleanedData) -> Result<Cohort, AppError> {
    Cohort::parse_label(requested)
        .filter(|&cohort| match cohort {
            Cohort::Level(level) => cleaned.dataset(level).is_some(),
            Cohort::AllLevels => !cleaned.levels().is_empty(),
        })
        .ok_or_else(|| unknown_level(requested, cleaned))
}

/// Outputs of a force-plate metrics run.
#[derive(Debug, Clone, Serialize)]
pub struct ForceRun {
    pub athlete: String,
    pub input: PathBuf,
    pub sampling_rate_hz: u32,
    /// Rate implied by the timestamps, when the trace spans any time.
    pub observed_rate_hz: Option<f64>,
    pub samples: usize,
    pub metrics: ForceMetrics,
    #[serde(skip)]
    pub trace: ForceTrace,
}

/// Observed rates further than this (relative) from the declared one are flagged.
const SAMPLING_RATE_TOLERANCE: f64 = 0.05;

/// Load a force-plate trace and compute its jump metrics.
pub fn run_force_metrics(input: &Path, athlete: &str, sampling_rate_hz: u32) -> Result<ForceRun, AppError> {
    if sampling_rate_hz == 0 {
        return Err(AppError::Config("sampling rate must be positive, got 0".to_string()));
    }
    let trace = load_force_trace(input)?;
    let metrics = compute_force_metrics(&trace)?;

    let observed_rate_hz = trace.observed_rate_hz();
    let declared = f64::from(sampling_rate_hz);
    if let Some(observed) = observed_rate_hz.filter(|o| ((o - declared) / declared).abs() > SAMPLING_RATE_TOLERANCE) {
        warn!(declared = sampling_rate_hz, observed, "timestamps disagree with the declared sampling rate");
    }

    Ok(ForceRun {
        athlete: athlete.to_string(),
        input: input.to_path_buf(),
        sampling_rate_hz,
        observed_rate_hz,
        samples: trace.len(),
        metrics,
        trace,
    })
}

fn unknown_level(requested: &str, cleaned: &CleanedData) -> AppError {
    let present: Vec<&str> = cleaned.levels().into_iter().map(Level::display_name).collect();
    AppError::UnknownLevel {
        requested: requested.trim().to_string(),
        available: if present.is_empty() {
            "none".to_string()
        } else {
            present.join(", ")
        },
    }
}

fn log_counts(cleaned: &CleanedData) {
    for (level, c) in cleaned.all_counts() {
        info!(
            level = %level,
            raw = c.rows_raw,
            missing = c.dropped_missing,
            below_floor = c.dropped_below_floor,
            outliers = c.dropped_outliers,
            retained = c.rows_retained,
            "cleaned level"
        );
    }
}

/// JSON shape of a full batch run.
#[derive(Debug, Serialize)]
pub struct BatchExport<'a> {
    pub generated_at: String,
    pub input: String,
    pub bat_speed_column: &'a str,
    pub min_bat_speed: f64,
    pub z_cut: f64,
    pub filter_cmj_outliers: bool,
    pub neutral_band: f64,
    pub rows_read: usize,
    pub rows_skipped: usize,
    pub filter_counts: &'a BTreeMap<Level, FilterCounts>,
    pub levels: &'a [LevelReport],
    pub pooled: Option<&'a RegressionModel>,
    pub failures: Vec<FailureExport>,
}

#[derive(Debug, Serialize)]
pub struct FailureExport {
    pub level: Level,
    pub error: String,
}

impl BatchRun {
    pub fn to_export<'a>(&'a self, config: &AnalysisConfig, generated_at: String) -> BatchExport<'a> {
        BatchExport {
            generated_at,
            input: config.input.display().to_string(),
            bat_speed_column: &self.ingest.bat_speed_column,
            min_bat_speed: config.cleaning.min_bat_speed,
            z_cut: config.cleaning.z_cut,
            filter_cmj_outliers: config.cleaning.filter_cmj_outliers,
            neutral_band: config.neutral_band,
            rows_read: self.ingest.rows_read,
            rows_skipped: self.ingest.row_errors.len(),
            filter_counts: self.cleaned.all_counts(),
            levels: &self.levels,
            pooled: self.pooled.as_ref(),
            failures: self
                .failures
                .iter()
                .map(|(level, err)| FailureExport {
                    level: *level,
                    error: err.to_string(),
                })
                .collect(),
        }
    }
}
