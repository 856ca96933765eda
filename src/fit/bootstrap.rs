//! Single-athlete projection with a bootstrap confidence interval.
//!
//! The point estimate comes straight from the fitted model (one level, or all
//! levels pooled). The interval comes from refitting the line on resamples
//! (with replacement) of the same observations and taking empirical
//! percentiles of the predictions at the query CMJ height.
//!
//! Reproducibility: a master `StdRng` (seeded from `--seed`, or from OS
//! entropy) draws one sub-seed per iteration up front, and each iteration
//! resamples with its own `StdRng`. Iterations can then run in parallel with
//! rayon and still produce bit-identical results for a given seed.

use rand::prelude::*;
use rayon::prelude::*;
use tracing::{debug, info};

use crate::domain::{BootstrapOptions, LevelDataset, MIN_SAMPLES, ProjectionResult, RegressionModel};
use crate::error::AppError;
use crate::fit::level::ols_error;
use crate::math::{OlsError, fit_line, mean, percentile};

/// Project bat speed for `query_cmj` using `model` and resampling `dataset`.
///
/// Fails fast: a resample with identical CMJ heights aborts the projection
/// rather than being skipped, since skipping would bias the interval.
pub fn project(
    model: &RegressionModel,
    dataset: &LevelDataset,
    query_cmj: f64,
    opts: &BootstrapOptions,
) -> Result<ProjectionResult, AppError> {
    validate(model, dataset, query_cmj, opts)?;

    let level = dataset.level();
    let n = dataset.len();
    if n < MIN_SAMPLES {
        return Err(AppError::InsufficientData {
            level,
            n,
            required: MIN_SAMPLES,
        });
    }
    let (observed_cmj_min, observed_cmj_max) = dataset.cmj_range().ok_or(AppError::InsufficientData {
        level,
        n,
        required: MIN_SAMPLES,
    })?;

    let x = dataset.cmj_heights();
    let y = dataset.bat_speeds();
    let point_estimate = model.predict(query_cmj);

    info!(
        level = %level,
        n,
        iterations = opts.iterations,
        confidence = opts.confidence,
        seed = ?opts.seed,
        "running bootstrap"
    );

    let mut master = match opts.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    let seeds: Vec<u64> = (0..opts.iterations).map(|_| master.next_u64()).collect();

    // Evaluate each resample independently (parallel).
    let draws: Vec<Result<f64, OlsError>> = seeds
        .par_iter()
        .map(|&seed| resample_prediction(&x, &y, query_cmj, seed))
        .collect();

    // Scan in iteration order so the reported failure does not depend on scheduling.
    let mut predictions = Vec::with_capacity(draws.len());
    for (i, draw) in draws.into_iter().enumerate() {
        match draw {
            Ok(v) if v.is_finite() => predictions.push(v),
            Ok(v) => {
                return Err(AppError::Numeric(format!(
                    "bootstrap iteration {} produced a non-finite prediction ({v})",
                    i + 1
                )));
            }
            Err(OlsError::ZeroVariance) => {
                return Err(AppError::DegenerateInput {
                    level,
                    reason: format!(
                        "bootstrap resample {} of {} drew only identical CMJ heights",
                        i + 1,
                        opts.iterations
                    ),
                });
            }
            Err(e) => return Err(ols_error(level, n, e)),
        }
    }

    predictions.sort_by(f64::total_cmp);

    let tail = (1.0 - opts.confidence) / 2.0;
    let ci_lower = percentile(&predictions, tail)
        .ok_or_else(|| AppError::Numeric("empty bootstrap distribution".to_string()))?;
    let ci_upper = percentile(&predictions, 1.0 - tail)
        .ok_or_else(|| AppError::Numeric("empty bootstrap distribution".to_string()))?;
    let bootstrap_mean =
        mean(&predictions).ok_or_else(|| AppError::Numeric("empty bootstrap distribution".to_string()))?;

    let extrapolated = query_cmj < observed_cmj_min || query_cmj > observed_cmj_max;
    debug!(point_estimate, ci_lower, ci_upper, extrapolated, "bootstrap finished");

    Ok(ProjectionResult {
        level,
        query_cmj,
        point_estimate,
        bootstrap_mean,
        ci_lower,
        ci_upper,
        confidence_level: opts.confidence,
        bootstrap_samples: opts.iterations,
        seed: opts.seed,
        extrapolated,
        observed_cmj_min,
        observed_cmj_max,
    })
}

fn validate(
    model: &RegressionModel,
    dataset: &LevelDataset,
    query_cmj: f64,
    opts: &BootstrapOptions,
) -> Result<(), AppError> {
    if model.level != dataset.level() {
        return Err(AppError::Config(format!(
            "model was fitted for {} but the dataset is {}",
            model.level,
            dataset.level()
        )));
    }
    if !query_cmj.is_finite() {
        return Err(AppError::Config(format!("athlete CMJ must be a finite number, got {query_cmj}")));
    }
    if !(opts.confidence > 0.0 && opts.confidence < 1.0) {
        return Err(AppError::Config(format!(
            "confidence must be between 0 and 1 (exclusive), got {}",
            opts.confidence
        )));
    }
    if opts.iterations == 0 {
        return Err(AppError::Config("bootstrap iterations must be at least 1".to_string()));
    }
    Ok(())
}

/// Resample `(x, y)` pairs with replacement, refit, and predict at `query`.
fn resample_prediction(x: &[f64], y: &[f64], query: f64, seed: u64) -> Result<f64, OlsError> {
    let mut rng = StdRng::seed_from_u64(seed);
    let n = x.len();
    let mut xb = Vec::with_capacity(n);
    let mut yb = Vec::with_capacity(n);
    for _ in 0..n {
        let i = rng.gen_range(0..n);
        xb.push(x[i]);
        yb.push(y[i]);
    }
    Ok(fit_line(&xb, &yb)?.predict(query))
}
