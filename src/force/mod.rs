//! Countermovement-jump metrics from a single force-plate trace.
//!
//! Every window is measured from the first sample. Bodyweight comes from the
//! quiet-standing phase at the start of the recording; the early rate of force
//! development and the impulses cover the first 200 ms.

use crate::domain::{ForceMetrics, ForceSample, ForceTrace};
use crate::error::AppError;
use crate::math::mean;

/// A trace shorter than this has no meaningful windows.
pub const MIN_FORCE_SAMPLES: usize = 3;

/// Quiet-standing window used for the bodyweight estimate (seconds).
pub const BODYWEIGHT_WINDOW_S: f64 = 0.25;

/// Fewest samples the standing window must hold before falling back to a
/// leading slice of the trace.
const MIN_BODYWEIGHT_SAMPLES: usize = 5;

/// Share of the trace used by the fallback bodyweight estimate.
const BODYWEIGHT_FALLBACK_SHARE: f64 = 0.10;

const RFD_WINDOWS_S: [f64; 3] = [0.05, 0.10, 0.20];

/// Window of the impulse integrals (seconds).
const IMPULSE_WINDOW_S: f64 = 0.20;

/// Compute bodyweight, peak, rate-of-force-development and impulse metrics.
pub fn compute_force_metrics(trace: &ForceTrace) -> Result<ForceMetrics, AppError> {
    let samples = trace.samples();
    if samples.len() < MIN_FORCE_SAMPLES {
        return Err(AppError::InputFormat(format!(
            "Force trace has {} sample(s); need at least {MIN_FORCE_SAMPLES}.",
            samples.len()
        )));
    }
    let t0 = samples[0].time_s;
    let f0 = samples[0].force_n;

    let bw = estimate_bodyweight(samples, t0)?;

    let peak = peak_sample(samples);
    let [rfd_50, rfd_100, rfd_200] = RFD_WINDOWS_S.map(|dt| (force_near(samples, t0 + dt) - f0) / dt);

    let metrics = ForceMetrics {
        bw_n: bw,
        peak_force_n: peak.force_n,
        peak_force_xbw: (bw != 0.0).then(|| peak.force_n / bw),
        net_peak_force_n: peak.force_n - bw,
        time_to_peak_ms: (peak.time_s - t0) * 1000.0,
        rfd_0_50_n_per_s: rfd_50,
        rfd_0_100_n_per_s: rfd_100,
        rfd_0_200_n_per_s: rfd_200,
        impulse_0_200_ns: impulse(samples, t0 + IMPULSE_WINDOW_S, 0.0),
        net_impulse_0_200_ns: impulse(samples, t0 + IMPULSE_WINDOW_S, bw),
    };
    tracing::debug!(
        samples = samples.len(),
        bw_n = metrics.bw_n,
        peak_force_n = metrics.peak_force_n,
        "force metrics"
    );
    Ok(metrics)
}

/// Mean force over the standing window, or over the leading tenth of the
/// trace (at least five samples) when the window is too short.
fn estimate_bodyweight(samples: &[ForceSample], t0: f64) -> Result<f64, AppError> {
    let standing: Vec<f64> = samples
        .iter()
        .filter(|s| s.time_s <= t0 + BODYWEIGHT_WINDOW_S)
        .map(|s| s.force_n)
        .collect();
    let bw = if standing.len() >= MIN_BODYWEIGHT_SAMPLES {
        mean(&standing)
    } else {
        let share = (samples.len() as f64 * BODYWEIGHT_FALLBACK_SHARE) as usize;
        let n = share.max(MIN_BODYWEIGHT_SAMPLES).min(samples.len());
        let leading: Vec<f64> = samples[..n].iter().map(|s| s.force_n).collect();
        mean(&leading)
    };
    bw.filter(|v| v.is_finite())
        .ok_or_else(|| AppError::Numeric("bodyweight estimate is not finite".into()))
}

/// First sample holding the maximum force.
fn peak_sample(samples: &[ForceSample]) -> ForceSample {
    let mut best = samples[0];
    for s in &samples[1..] {
        if s.force_n > best.force_n {
            best = *s;
        }
    }
    best
}

/// Force of the sample nearest to `t`; the earlier sample wins a tie.
fn force_near(samples: &[ForceSample], t: f64) -> f64 {
    let mut best = samples[0];
    let mut best_gap = (best.time_s - t).abs();
    for s in &samples[1..] {
        let gap = (s.time_s - t).abs();
        if gap < best_gap {
            best = *s;
            best_gap = gap;
        }
    }
    best.force_n
}

/// Trapezoidal integral of `force - baseline` over samples up to `until`.
fn impulse(samples: &[ForceSample], until: f64, baseline: f64) -> f64 {
    let window: Vec<&ForceSample> = samples.iter().filter(|s| s.time_s <= until).collect();
    window
        .windows(2)
        .map(|w| {
            let dt = w[1].time_s - w[0].time_s;
            0.5 * ((w[0].force_n - baseline) + (w[1].force_n - baseline)) * dt
        })
        .sum()
}
