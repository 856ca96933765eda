//! HTML report documents.
//!
//! Each report is one self-contained file: embedded CSS, inline SVG charts,
//! no external assets.

use std::collections::BTreeMap;
use std::path::Path;

use chrono::{DateTime, Utc};

use crate::domain::{
    CleaningOptions, FilterCounts, ForceMetrics, Level, ProjectionResult, RegressionModel, ResidualRecord,
};
use crate::error::AppError;
use crate::report::format::{describe_cleaning, fmt_pct};
use crate::report::{Rankings, ResidualAnalysis};

/// One fitted level as shown in the batch report.
#[derive(Debug, Clone, Copy)]
pub struct LevelSection<'a> {
    pub model: &'a RegressionModel,
    pub analysis: &'a ResidualAnalysis,
    pub rankings: &'a Rankings,
    /// Pre-rendered SVG markup, if a chart is available.
    pub chart_svg: Option<&'a str>,
}

/// Everything the batch report shows.
#[derive(Debug, Clone)]
pub struct BatchReport<'a> {
    pub generated_at: DateTime<Utc>,
    pub input: &'a Path,
    pub cleaning: &'a CleaningOptions,
    pub neutral_band: f64,
    pub counts: &'a BTreeMap<Level, FilterCounts>,
    pub levels: Vec<LevelSection<'a>>,
    /// One line over every retained row, if it could be fitted.
    pub pooled: Option<&'a RegressionModel>,
    pub failures: &'a [(Level, AppError)],
}

/// Render the batch transfer-efficiency report.
pub fn render_batch_report(report: &BatchReport<'_>) -> String {
    let mut body = String::new();

    body.push_str("<h1>CMJ &rarr; Bat Speed Transfer Efficiency Report</h1>\n");
    body.push_str(&format!(
        "<p class=\"meta\"><b>Input:</b> {} &middot; <b>Generated:</b> {}</p>\n",
        escape_html(&report.input.display().to_string()),
        report.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    body.push_str(&format!(
        "<p><b>Filters:</b> {}. <b>Neutral band:</b> &plusmn;{:.2} mph.</p>\n",
        escape_html(&describe_cleaning(report.cleaning)),
        report.neutral_band
    ));

    body.push_str("<h2>Filter counts</h2>\n");
    body.push_str(&counts_table(report.counts));

    body.push_str("<h2>Level summaries</h2>\n");
    for level in Level::ALL {
        if let Some(section) = report.levels.iter().find(|s| s.model.level == level) {
            body.push_str(&level_section(section));
        } else if let Some((_, err)) = report.failures.iter().find(|(l, _)| *l == level) {
            body.push_str(&format!(
                "<section>\n<h3>{}</h3>\n<p class=\"warn\"><i>{}</i></p>\n</section>\n",
                level.display_name(),
                escape_html(&err.to_string())
            ));
        }
    }

    if let Some(m) = report.pooled {
        body.push_str("<h2>All levels pooled</h2>\n");
        body.push_str(&format!(
            "<p><b>Rows used:</b> {} &middot; <b>Model:</b> {} &middot; <b>r:</b> {:.3} \
             &middot; <b>R&sup2;:</b> {:.3} &middot; <b>CMJ range:</b> [{:.2}, {:.2}]</p>\n",
            m.n_samples,
            escape_html(&model_equation(m)),
            m.r,
            m.r_squared(),
            m.cmj_min,
            m.cmj_max
        ));
    }

    body.push_str(
        "<p class=\"footer\">Residual = actual &minus; predicted bat speed. \
         Positive = over-performer, negative = under-performer.</p>\n",
    );

    page("CMJ to Bat Speed Transfer Report", &body)
}

/// Render the single-athlete projection report.
pub fn render_projection_report(
    p: &ProjectionResult,
    model: &RegressionModel,
    input: &Path,
    generated_at: DateTime<Utc>,
) -> String {
    let mut body = String::new();

    body.push_str(&format!(
        "<h1>Bat Speed Projection: {}</h1>\n",
        p.level.display_name()
    ));
    body.push_str(&format!(
        "<p class=\"meta\"><b>Input:</b> {} &middot; <b>Generated:</b> {}</p>\n",
        escape_html(&input.display().to_string()),
        generated_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));

    let seed = p.seed.map(|s| s.to_string()).unwrap_or_else(|| "random".to_string());
    let rows = [
        ("Athlete CMJ", format!("{:.2}", p.query_cmj)),
        ("Model", model_equation(model)),
        ("Projected bat speed", format!("{:.2} mph", p.point_estimate)),
        ("Bootstrap mean", format!("{:.2} mph", p.bootstrap_mean)),
        (
            "Confidence interval",
            format!(
                "{}%: [{:.2}, {:.2}] mph",
                fmt_pct(p.confidence_level),
                p.ci_lower,
                p.ci_upper
            ),
        ),
        ("Resamples", p.bootstrap_samples.to_string()),
        ("Seed", seed),
        (
            "Observed CMJ range",
            format!("[{:.2}, {:.2}]", p.observed_cmj_min, p.observed_cmj_max),
        ),
    ];

    body.push_str("<table>\n");
    for (k, v) in rows {
        body.push_str(&format!("<tr><th>{k}</th><td>{}</td></tr>\n", escape_html(&v)));
    }
    body.push_str("</table>\n");

    if p.extrapolated {
        body.push_str(&format!(
            "<p class=\"warn\">CMJ {:.2} lies outside the observed range; this projection is an extrapolation.</p>\n",
            p.query_cmj
        ));
    }

    page("Bat Speed Projection", &body)
}

/// Everything the force-plate jump report shows.
#[derive(Debug, Clone, Copy)]
pub struct ForceReport<'a> {
    pub athlete: &'a str,
    pub input: &'a Path,
    pub generated_at: DateTime<Utc>,
    pub sampling_rate_hz: u32,
    pub samples: usize,
    pub metrics: &'a ForceMetrics,
    pub chart_svg: Option<&'a str>,
}

/// Render the single-jump force-plate report.
pub fn render_force_report(report: &ForceReport<'_>) -> String {
    let athlete = escape_html(report.athlete);
    let mut body = String::new();

    body.push_str(&format!("<h1>{athlete}: CMJ Report</h1>\n"));
    body.push_str(&format!(
        "<p class=\"meta\"><b>Input:</b> {} &middot; <b>Samples:</b> {} at {} Hz \
         &middot; <b>Generated:</b> {}</p>\n",
        escape_html(&report.input.display().to_string()),
        report.samples,
        report.sampling_rate_hz,
        report.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));

    if let Some(svg) = report.chart_svg {
        body.push_str(&format!("<div class=\"chart\">{svg}</div>\n"));
    }

    body.push_str("<h2>Key Metrics</h2>\n<table>\n");
    for (label, value) in report.metrics.labelled() {
        let value = value.map(|v| format!("{v:.2}")).unwrap_or_else(|| "n/a".to_string());
        body.push_str(&format!("<tr><th>{}</th><td>{value}</td></tr>\n", escape_html(label)));
    }
    body.push_str("</table>\n");

    page(&format!("{} CMJ Report", report.athlete), &body)
}

fn level_section(s: &LevelSection<'_>) -> String {
    let m = s.model;
    let a = s.analysis;
    let mut out = String::new();

    out.push_str("<section>\n");
    out.push_str(&format!("<h3>{}</h3>\n", m.level.display_name()));
    out.push_str(&format!(
        "<p><b>Rows used:</b> {} &middot; <b>Model:</b> {} &middot; <b>r:</b> {:.3} \
         &middot; <b>R&sup2;:</b> {:.3} &middot; <b>Residual SD:</b> {:.3} mph</p>\n",
        m.n_samples,
        escape_html(&model_equation(m)),
        m.r,
        m.r_squared(),
        m.residual_std
    ));
    out.push_str(&format!(
        "<p><b>Classification:</b> {} over &middot; {} under &middot; {} neutral</p>\n",
        a.over_count, a.under_count, a.neutral_count
    ));

    if let Some(svg) = s.chart_svg {
        out.push_str("<div class=\"chart\">\n");
        out.push_str(svg);
        out.push_str("\n</div>\n");
    }

    out.push_str("<h4>Top over-performers</h4>\n");
    out.push_str(&residual_table(&s.rankings.over));
    out.push_str("<h4>Top under-performers</h4>\n");
    out.push_str(&residual_table(&s.rankings.under));
    out.push_str("</section>\n");
    out
}

fn counts_table(counts: &BTreeMap<Level, FilterCounts>) -> String {
    let mut out = String::new();
    out.push_str("<table>\n<tr><th>Level</th><th>Raw</th><th>Missing</th><th>Below floor</th>");
    out.push_str("<th>Outliers</th><th>Retained</th></tr>\n");
    for (level, c) in counts {
        out.push_str(&format!(
            "<tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>\n",
            level.display_name(),
            c.rows_raw,
            c.dropped_missing,
            c.dropped_below_floor,
            c.dropped_outliers,
            c.rows_retained
        ));
    }
    out.push_str("</table>\n");
    out
}

fn residual_table(rows: &[ResidualRecord]) -> String {
    if rows.is_empty() {
        return "<p><i>None.</i></p>\n".to_string();
    }
    let mut out = String::new();
    out.push_str("<table>\n<tr><th>Athlete</th><th>CMJ</th><th>Actual</th><th>Predicted</th>");
    out.push_str("<th>Residual</th></tr>\n");
    for r in rows {
        let class = if r.residual < 0.0 { "neg" } else { "pos" };
        out.push_str(&format!(
            "<tr><td>{}</td><td>{:.2}</td><td>{:.2}</td><td>{:.2}</td><td class=\"{class}\">{:+.2}</td></tr>\n",
            escape_html(&r.label()),
            r.cmj_height,
            r.actual_bat_speed,
            r.predicted_bat_speed,
            r.residual
        ));
    }
    out.push_str("</table>\n");
    out
}

fn model_equation(m: &RegressionModel) -> String {
    format!(
        "bat_speed = {:.4} * cmj {} {:.4}",
        m.slope,
        if m.intercept < 0.0 { "-" } else { "+" },
        m.intercept.abs()
    )
}

fn page(title: &str, body: &str) -> String {
    format!(
        "<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n\
         <title>{}</title>\n<style>{}</style>\n</head>\n<body>\n{body}</body>\n</html>\n",
        escape_html(title),
        STYLES
    )
}

/// Escape HTML special characters.
pub fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

const STYLES: &str = r#"
body { font-family: -apple-system, 'Segoe UI', Roboto, Arial, sans-serif; margin: 28px; color: #222; }
h1 { font-size: 1.5em; }
section { border-top: 1px solid #ddd; margin-top: 18px; padding-top: 6px; }
table { border-collapse: collapse; margin: 8px 0 16px; }
th, td { border: 1px solid #ddd; padding: 4px 10px; text-align: right; }
th { background: #2f5d8a; color: #fff; }
td:first-child, th:first-child { text-align: left; }
tr:nth-child(even) { background: #f6f6f6; }
.pos { color: #1e7b1e; font-weight: bold; }
.neg { color: #b22222; font-weight: bold; }
.warn { color: #a0522d; }
.meta, .footer { color: #666; font-size: 0.9em; }
.chart svg { max-width: 100%; height: auto; }
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Classification, Cohort};
    use chrono::TimeZone;

    fn model(level: Level) -> RegressionModel {
        RegressionModel {
            level: level.into(),
            slope: 2.0,
            intercept: 20.0,
            r: 0.9,
            n_samples: 10,
            residual_std: 1.2,
            cmj_min: 30.0,
            cmj_max: 39.0,
        }
    }

    fn record(id: &str, residual: f64) -> ResidualRecord {
        ResidualRecord {
            line: 2,
            id: Some(id.to_string()),
            level: Level::College,
            cmj_height: 31.0,
            actual_bat_speed: 82.0 + residual,
            predicted_bat_speed: 82.0,
            residual,
            classification: Classification::from_residual(residual, 0.0),
        }
    }

    fn when() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 4, 5, 6, 7).unwrap()
    }

    #[test]
    fn force_report_lists_metrics_and_escapes_name() {
        let metrics = ForceMetrics {
            bw_n: 800.0,
            peak_force_n: 2400.0,
            peak_force_xbw: Some(3.0),
            net_peak_force_n: 1600.0,
            time_to_peak_ms: 350.0,
            rfd_0_50_n_per_s: 1000.0,
            rfd_0_100_n_per_s: 2000.0,
            rfd_0_200_n_per_s: 3000.0,
            impulse_0_200_ns: 170.0,
            net_impulse_0_200_ns: 10.0,
        };
        let html = render_force_report(&ForceReport {
            athlete: "Jo <Doe>",
            input: Path::new("jump.csv"),
            generated_at: when(),
            sampling_rate_hz: 1000,
            samples: 1500,
            metrics: &metrics,
            chart_svg: Some("<svg>curve</svg>"),
        });

        assert!(html.contains("<title>Jo &lt;Doe&gt; CMJ Report</title>"));
        assert!(html.contains("<h1>Jo &lt;Doe&gt;: CMJ Report</h1>"));
        assert!(html.contains("1500 at 1000 Hz"));
        assert!(html.contains("<tr><th>Peak Force (×BW)</th><td>3.00</td></tr>"));
        assert!(html.contains("<tr><th>Net Impulse 0–200 ms (N·s)</th><td>10.00</td></tr>"));
        assert!(html.contains("<svg>curve</svg>"));
        assert!(html.contains("2026-03-04 05:06:07 UTC"));
    }

    #[test]
    fn escape_html_special_chars() {
        assert_eq!(escape_html("<script>"), "&lt;script&gt;");
        assert_eq!(escape_html("a&b"), "a&amp;b");
        assert_eq!(escape_html("\"x\" 'y'"), "&quot;x&quot; &#39;y&#39;");
    }

    #[test]
    fn batch_report_has_sections_and_failures() {
        let m = model(Level::College);
        let analysis = ResidualAnalysis {
            level: Level::College.into(),
            records: vec![record("<A1>", 1.5), record("A2", -1.5)],
            mean_residual: 0.0,
            residual_std: 1.2,
            over_count: 1,
            under_count: 1,
            neutral_count: 0,
        };
        let rankings = Rankings {
            over: vec![analysis.records[0].clone()],
            under: vec![analysis.records[1].clone()],
        };
        let mut counts = BTreeMap::new();
        counts.insert(Level::College, FilterCounts { rows_raw: 2, rows_retained: 2, ..Default::default() });
        counts.insert(Level::HighSchool, FilterCounts { rows_raw: 1, rows_retained: 1, ..Default::default() });
        let failures = vec![(
            Level::HighSchool,
            AppError::InsufficientData { level: Level::HighSchool.into(), n: 1, required: 2 },
        )];
        let cleaning = CleaningOptions::default();
        let pooled = RegressionModel { level: Cohort::AllLevels, r: 0.75, n_samples: 3, ..model(Level::College) };

        let html = render_batch_report(&BatchReport {
            generated_at: when(),
            input: Path::new("data/in.csv"),
            cleaning: &cleaning,
            neutral_band: 0.0,
            counts: &counts,
            levels: vec![LevelSection {
                model: &m,
                analysis: &analysis,
                rankings: &rankings,
                chart_svg: Some("<svg id=\"c\"></svg>"),
            }],
            pooled: Some(&pooled),
            failures: &failures,
        });

        assert!(html.starts_with("<!DOCTYPE html>"));
        assert!(html.contains("Generated:</b> 2026-03-04 05:06:07 UTC"));
        assert!(html.contains("<h3>College</h3>"));
        assert!(html.contains("bat_speed = 2.0000 * cmj + 20.0000"));
        assert!(html.contains("<svg id=\"c\"></svg>"));
        assert!(html.contains("&lt;A1&gt;"));
        assert!(!html.contains("<A1>"));
        assert!(html.contains("+1.50"));
        assert!(html.contains("Insufficient data for High School"));
        // High School is rendered before College.
        assert!(html.find("High School: 1 usable").unwrap() < html.find("<h3>College").unwrap());
        let pooled_at = html.find("<h2>All levels pooled</h2>").unwrap();
        assert!(pooled_at > html.find("<h3>College").unwrap());
        assert!(html[pooled_at..].contains("<b>Rows used:</b> 3"));
        assert!(html[pooled_at..].contains("<b>r:</b> 0.750"));
    }

    #[test]
    fn projection_report_flags_extrapolation() {
        let p = ProjectionResult {
            level: Level::Professional.into(),
            query_cmj: 55.0,
            point_estimate: 130.0,
            bootstrap_mean: 129.8,
            ci_lower: 126.0,
            ci_upper: 133.5,
            confidence_level: 0.9,
            bootstrap_samples: 500,
            seed: None,
            extrapolated: true,
            observed_cmj_min: 30.0,
            observed_cmj_max: 39.0,
        };
        let html = render_projection_report(&p, &model(Level::Professional), Path::new("in.csv"), when());
        assert!(html.contains("Bat Speed Projection: Professional"));
        assert!(html.contains("90%: [126.00, 133.50] mph"));
        assert!(html.contains("<td>random</td>"));
        assert!(html.contains("extrapolation"));
    }
}
