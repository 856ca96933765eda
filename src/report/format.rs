//! Terminal output: run summary, model lines, ranking tables, projections,
//! force-plate jump metrics.

use std::collections::BTreeMap;
use std::path::Path;

use crate::domain::{
    CleaningOptions, Cohort, FilterCounts, ForceMetrics, Level, ProjectionResult, RegressionModel, ResidualRecord,
};
use crate::error::AppError;
use crate::report::Rankings;

/// Dataset-level facts shown at the top of a batch run.
#[derive(Debug, Clone, Copy)]
pub struct RunOverview<'a> {
    pub input: &'a Path,
    pub rows_read: usize,
    pub rows_skipped: usize,
    /// Bat-speed column actually read (the fallback when it was used).
    pub bat_speed_column: &'a str,
    pub cleaning: &'a CleaningOptions,
    pub counts: &'a BTreeMap<Level, FilterCounts>,
}

/// Format the run summary: input stats, cleaning rules, and per-level filter counts.
pub fn format_run_summary(overview: &RunOverview<'_>) -> String {
    let mut out = String::new();

    out.push_str("=== CMJ -> Bat Speed Transfer ===\n");
    out.push_str(&format!("Input: {}\n", overview.input.display()));
    out.push_str(&format!("Bat speed column: {}\n", overview.bat_speed_column));
    let retained: usize = overview.counts.values().map(|c| c.rows_retained).sum();
    out.push_str(&format!(
        "Rows: read={} | skipped={} | retained={}\n",
        overview.rows_read, overview.rows_skipped, retained
    ));
    out.push_str(&format!("Cleaning: {}\n", describe_cleaning(overview.cleaning)));

    out.push_str("\nFilter counts:\n");
    out.push_str(&format_counts_table(overview.counts));
    out
}

/// One-line description of the cleaning rules, shared with the HTML report.
pub fn describe_cleaning(opts: &CleaningOptions) -> String {
    let vars = if opts.filter_cmj_outliers {
        "bat speed and CMJ"
    } else {
        "bat speed"
    };
    format!(
        "bat_speed >= {:.2} mph, then |z| <= {:.2} per level ({vars})",
        opts.min_bat_speed, opts.z_cut
    )
}

fn format_counts_table(counts: &BTreeMap<Level, FilterCounts>) -> String {
    let mut out = String::new();
    push_line(
        &mut out,
        format!(
            "{:<14} {:>6} {:>8} {:>8} {:>9} {:>9}",
            "level", "raw", "missing", "floor", "outliers", "retained"
        ),
    );
    push_line(
        &mut out,
        format!("{:-<14} {:-<6} {:-<8} {:-<8} {:-<9} {:-<9}", "", "", "", "", "", ""),
    );
    for (level, c) in counts {
        push_line(
            &mut out,
            format!(
                "{:<14} {:>6} {:>8} {:>8} {:>9} {:>9}",
                level.display_name(),
                c.rows_raw,
                c.dropped_missing,
                c.dropped_below_floor,
                c.dropped_outliers,
                c.rows_retained
            ),
        );
    }
    out
}

/// Per-level model lines, the pooled line, and any levels that could not be fitted.
pub fn format_models(
    models: &[RegressionModel],
    pooled: Option<&RegressionModel>,
    failures: &[(Level, AppError)],
) -> String {
    let mut out = String::new();
    out.push_str("\nLevel models:\n");
    for m in models {
        out.push_str(&format!("- {}\n", format_model_line(m)));
    }
    for (level, err) in failures {
        out.push_str(&format!("  (skipped {}) {err}\n", level.display_name()));
    }
    if let Some(m) = pooled {
        out.push_str(&format!("- {}\n", format_model_line(m)));
    }
    out
}

pub fn format_model_line(m: &RegressionModel) -> String {
    format!(
        "{:<13} bat_speed = {:.4} * cmj {} {:.4} | n={} r={:.4} r2={:.4} resid_sd={:.3} | cmj=[{:.2}, {:.2}]",
        m.level.display_name(),
        m.slope,
        if m.intercept < 0.0 { "-" } else { "+" },
        m.intercept.abs(),
        m.n_samples,
        m.r,
        m.r_squared(),
        m.residual_std,
        m.cmj_min,
        m.cmj_max
    )
}

/// Format the over/under tables for one level.
pub fn format_rankings(level: Cohort, rankings: &Rankings) -> String {
    let mut out = String::new();

    out.push_str(&format!(
        "\n{}: top over-performers (positive residual):\n",
        level.display_name()
    ));
    out.push_str(&format_table(&rankings.over));
    out.push('\n');

    out.push_str(&format!(
        "{}: top under-performers (negative residual):\n",
        level.display_name()
    ));
    out.push_str(&format_table(&rankings.under));

    out
}

fn format_table(rows: &[ResidualRecord]) -> String {
    let mut out = String::new();
    push_line(
        &mut out,
        format!(
            "{:<20} {:>8} {:>10} {:>10} {:>10}",
            "athlete", "cmj", "actual", "predicted", "residual"
        ),
    );
    push_line(
        &mut out,
        format!("{:-<20} {:-<8} {:-<10} {:-<10} {:-<10}", "", "", "", "", ""),
    );

    for r in rows {
        push_line(
            &mut out,
            format!(
                "{:<20} {:>8.2} {:>10.2} {:>10.2} {:>+10.2}",
                truncate(&r.label(), 20),
                r.cmj_height,
                r.actual_bat_speed,
                r.predicted_bat_speed,
                r.residual
            ),
        );
    }

    out
}

/// Format a single-athlete projection.
pub fn format_projection(p: &ProjectionResult, model: &RegressionModel) -> String {
    let mut out = String::new();

    out.push_str(&format!("=== Projection: {} ===\n", p.level.display_name()));
    out.push_str(&format!("Athlete CMJ: {:.2}\n", p.query_cmj));
    out.push_str(&format!("Model: {}\n", format_model_line(model)));
    out.push_str(&format!("Projected bat speed: {:.2} mph\n", p.point_estimate));
    out.push_str(&format!("Bootstrap mean: {:.2} mph\n", p.bootstrap_mean));

    let seed = p.seed.map(|s| format!(", seed={s}")).unwrap_or_default();
    out.push_str(&format!(
        "{}% CI: [{:.2}, {:.2}] mph ({} resamples{seed})\n",
        fmt_pct(p.confidence_level),
        p.ci_lower,
        p.ci_upper,
        p.bootstrap_samples
    ));

    if p.extrapolated {
        out.push_str(&format!(
            "Warning: CMJ {:.2} is outside the observed {} range [{:.2}, {:.2}]; this is an extrapolation.\n",
            p.query_cmj,
            p.level.display_name(),
            p.observed_cmj_min,
            p.observed_cmj_max
        ));
    }

    out
}

/// Format one jump's force-plate metrics, one labelled value per line.
pub fn format_force_metrics(athlete: &str, metrics: &ForceMetrics) -> String {
    let mut out = String::new();

    out.push_str("=== CMJ Metrics ===\n");
    out.push_str(&format!("Athlete: {athlete}\n"));
    for (label, value) in metrics.labelled() {
        let value = value.map(|v| format!("{v:.2}")).unwrap_or_else(|| "n/a".to_string());
        out.push_str(&format!("{label:<28} {value:>10}\n"));
    }

    out
}

/// `0.95 -> "95"`, `0.975 -> "97.5"`.
pub fn fmt_pct(fraction: f64) -> String {
    let pct = (fraction * 100.0 * 1000.0).round() / 1000.0;
    format!("{pct}")
}

fn push_line(out: &mut String, line: String) {
    out.push_str(line.trim_end());
    out.push('\n');
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let mut out = String::new();
    for (i, ch) in s.chars().enumerate() {
        if i + 1 >= max {
            break;
        }
        out.push(ch);
    }
    out.push('.');
    out
}
