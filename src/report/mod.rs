//! Reporting utilities: residuals, rankings, and rendered output.
//!
//! We keep formatting code in one place so:
//! - the math/fitting code stays clean and testable
//! - output changes are localized
//!
//! Renderers:
//! - `format`: terminal summaries and tables
//! - `html`: the HTML report documents
//! - `chart`: SVG scatter + regression line, and the force-time curve, embedded in the HTML reports

use serde::Serialize;
use tracing::warn;

use crate::domain::{Classification, Cohort, LevelDataset, RegressionModel, ResidualRecord};
use crate::error::AppError;
use crate::math::std_dev;

pub mod chart;
pub mod format;
pub mod html;

/// Relative tolerance for the residual-SD cross-check against the fit.
const RESIDUAL_STD_TOL: f64 = 1e-9;

/// Residuals for one level, in the dataset's input order, plus a summary.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResidualAnalysis {
    pub level: Cohort,
    pub records: Vec<ResidualRecord>,
    pub mean_residual: f64,
    /// SD of the residuals with `n - 2` degrees of freedom.
    pub residual_std: f64,
    pub over_count: usize,
    pub under_count: usize,
    pub neutral_count: usize,
}

/// Top over- and under-performers (top-N each side).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Rankings {
    pub over: Vec<ResidualRecord>,
    pub under: Vec<ResidualRecord>,
}

/// Compute predicted values and residuals for every athlete in `dataset`.
///
/// Residuals with `|residual| <= neutral_band` are classified neutral.
pub fn analyze_residuals(
    dataset: &LevelDataset,
    model: &RegressionModel,
    neutral_band: f64,
) -> Result<ResidualAnalysis, AppError> {
    if model.level != dataset.level() {
        return Err(AppError::Config(format!(
            "model was fitted for {} but the dataset is {}",
            model.level,
            dataset.level()
        )));
    }

    let mut records = Vec::with_capacity(dataset.len());
    for p in dataset.points() {
        let predicted = model.predict(p.cmj_height);
        if !predicted.is_finite() {
            return Err(AppError::Numeric(format!(
                "non-finite prediction for {} ({}) during residual computation",
                p.label(),
                model.level
            )));
        }
        let residual = p.bat_speed - predicted;
        records.push(ResidualRecord {
            line: p.line,
            id: p.id.clone(),
            level: p.level,
            cmj_height: p.cmj_height,
            actual_bat_speed: p.bat_speed,
            predicted_bat_speed: predicted,
            residual,
            classification: Classification::from_residual(residual, neutral_band),
        });
    }

    let residuals: Vec<f64> = records.iter().map(|r| r.residual).collect();
    let mean_residual = crate::math::mean(&residuals).unwrap_or(0.0);
    let residual_std = std_dev(&residuals, 2).unwrap_or(0.0);

    let scale = model.residual_std.abs().max(1.0);
    if (residual_std - model.residual_std).abs() > RESIDUAL_STD_TOL * scale {
        warn!(
            level = %model.level,
            analyzed = residual_std,
            fitted = model.residual_std,
            "residual SD disagrees with the fitted model"
        );
    }

    let count = |c: Classification| records.iter().filter(|r| r.classification == c).count();
    let over_count = count(Classification::OverPerformer);
    let under_count = count(Classification::UnderPerformer);
    let neutral_count = count(Classification::Neutral);

    Ok(ResidualAnalysis {
        level: model.level,
        records,
        mean_residual,
        residual_std,
        over_count,
        under_count,
        neutral_count,
    })
}

/// Rank the top over- and under-performers by residual.
///
/// Ties keep input order.
pub fn rank_over_under(records: &[ResidualRecord], top_n: usize) -> Rankings {
    let mut sorted = records.to_vec();
    sorted.sort_by(|a, b| b.residual.total_cmp(&a.residual));
    let over = sorted.iter().take(top_n).cloned().collect();

    let mut sorted_under = records.to_vec();
    sorted_under.sort_by(|a, b| a.residual.total_cmp(&b.residual));
    let under = sorted_under.iter().take(top_n).cloned().collect();

    Rankings { over, under }
}
