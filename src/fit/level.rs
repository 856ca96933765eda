//! Per-level regression fitting.
//!
//! Each level gets its own `bat_speed ~ cmj_height` line. Batch runs fit every
//! level and keep going when one level fails, so the report can say which
//! levels succeeded and why the others did not.

use tracing::{debug, warn};

use crate::clean::CleanedData;
use crate::domain::{Cohort, Level, LevelDataset, MIN_SAMPLES, RegressionModel};
use crate::error::AppError;
use crate::math::{OlsError, fit_line};

/// Output of fitting every level present in the cleaned data.
#[derive(Debug, Clone)]
pub struct LevelFits {
    /// Successful fits, in `Level` order.
    pub fitted: Vec<RegressionModel>,
    /// Levels that could not be fitted and why.
    pub failed: Vec<(Level, AppError)>,
}

impl LevelFits {
    pub fn model(&self, level: Level) -> Option<&RegressionModel> {
        self.fitted.iter().find(|m| m.level == level)
    }
}

/// Fit one level (or the pooled data) with the minimum sample count of two.
pub fn fit_level(dataset: &LevelDataset) -> Result<RegressionModel, AppError> {
    fit_level_with_min(dataset, MIN_SAMPLES)
}

/// Fit one level, requiring at least `min_samples` records (never fewer than two).
pub fn fit_level_with_min(dataset: &LevelDataset, min_samples: usize) -> Result<RegressionModel, AppError> {
    let level = dataset.level();
    let required = min_samples.max(MIN_SAMPLES);
    let n = dataset.len();
    if n < required {
        return Err(AppError::InsufficientData { level, n, required });
    }

    let fit = fit_line(&dataset.cmj_heights(), &dataset.bat_speeds()).map_err(|e| ols_error(level, n, e))?;
    let (cmj_min, cmj_max) = dataset
        .cmj_range()
        .ok_or(AppError::InsufficientData { level, n, required })?;

    debug!(
        level = %level,
        n,
        slope = fit.slope,
        intercept = fit.intercept,
        r = fit.r,
        "fitted model"
    );

    Ok(RegressionModel {
        level,
        slope: fit.slope,
        intercept: fit.intercept,
        r: fit.r,
        n_samples: n,
        residual_std: fit.residual_std,
        cmj_min,
        cmj_max,
    })
}

/// Fit every level in the cleaned data, collecting failures instead of stopping.
pub fn fit_levels(cleaned: &CleanedData, min_samples: usize) -> LevelFits {
    let mut fitted = Vec::new();
    let mut failed = Vec::new();

    for dataset in cleaned.datasets() {
        match fit_level_with_min(dataset, min_samples) {
            Ok(model) => fitted.push(model),
            Err(e) => {
                warn!(level = %dataset.level(), "{e}");
                if let Some(level) = dataset.level().as_level() {
                    failed.push((level, e));
                }
            }
        }
    }

    LevelFits { fitted, failed }
}

/// Fit one line over every retained row, ignoring level.
pub fn fit_pooled(cleaned: &CleanedData, min_samples: usize) -> Result<RegressionModel, AppError> {
    fit_level_with_min(&cleaned.pooled(), min_samples)
}

/// Attach level context to a line-fit error.
pub(crate) fn ols_error(level: Cohort, n: usize, err: OlsError) -> AppError {
    match err {
        OlsError::TooFewPoints(got) => AppError::InsufficientData {
            level,
            n: got,
            required: MIN_SAMPLES,
        },
        OlsError::ZeroVariance => AppError::DegenerateInput {
            level,
            reason: format!("all {n} CMJ heights are identical, so the slope is undefined"),
        },
        OlsError::LengthMismatch { .. } => AppError::Numeric(format!("{level}: {err}")),
    }
}
