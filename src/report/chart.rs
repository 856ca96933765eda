//! SVG charts for the HTML reports: a scatter with the fitted regression line
//! per level, and the force-time curve of a single jump.
//!
//! Rendered with Plotters' SVG backend into a string so the HTML report can
//! embed it inline and stay a single self-contained file.

use plotters::prelude::*;

use crate::domain::{Classification, ForceMetrics, ForceTrace, RegressionModel};
use crate::error::AppError;
use crate::report::ResidualAnalysis;

const OVER_COLOR: RGBColor = RGBColor(34, 139, 34);
const UNDER_COLOR: RGBColor = RGBColor(200, 40, 40);
const NEUTRAL_COLOR: RGBColor = RGBColor(110, 110, 110);
const LINE_COLOR: RGBColor = RGBColor(30, 90, 200);
const BODYWEIGHT_COLOR: RGBColor = RGBColor(200, 120, 20);

/// Render the level's observations (colored by classification) and its fitted line.
pub fn render_level_chart(
    analysis: &ResidualAnalysis,
    model: &RegressionModel,
    width: u32,
    height: u32,
) -> Result<String, AppError> {
    let mut svg = String::new();
    draw_level_chart(&mut svg, analysis, model, width, height).map_err(|e| {
        AppError::Output(format!("Failed to render chart for {}: {e}", model.level))
    })?;
    Ok(svg)
}

fn draw_level_chart(
    svg: &mut String,
    analysis: &ResidualAnalysis,
    model: &RegressionModel,
    width: u32,
    height: u32,
) -> Result<(), Box<dyn std::error::Error>> {
    let (x0, x1) = pad(model.cmj_min, model.cmj_max);
    let (y0, y1) = y_bounds(analysis, model, x0, x1);

    let root = SVGBackend::with_string(svg, (width, height)).into_drawing_area();
    root.fill(&WHITE)?;

    let mut chart = ChartBuilder::on(&root)
        .caption(
            format!("{} (n={}, r={:.3})", model.level.display_name(), model.n_samples, model.r),
            ("sans-serif", 18),
        )
        .margin(12)
        .set_label_area_size(LabelAreaPosition::Left, 50)
        .set_label_area_size(LabelAreaPosition::Bottom, 40)
        .build_cartesian_2d(x0..x1, y0..y1)?;

    chart
        .configure_mesh()
        .x_desc("CMJ height")
        .y_desc("Bat speed (mph)")
        .x_labels(6)
        .y_labels(6)
        .draw()?;

    chart.draw_series(LineSeries::new(
        [(x0, model.predict(x0)), (x1, model.predict(x1))],
        LINE_COLOR.stroke_width(2),
    ))?;

    chart.draw_series(analysis.records.iter().map(|r| {
        let color = match r.classification {
            Classification::OverPerformer => OVER_COLOR,
            Classification::UnderPerformer => UNDER_COLOR,
            Classification::Neutral => NEUTRAL_COLOR,
        };
        Circle::new((r.cmj_height, r.actual_bat_speed), 3, color.mix(0.8).filled())
    }))?;

    root.present()?;
    Ok(())
}

/// Render a jump's force-time curve with its bodyweight estimate.
pub fn render_force_chart(
    trace: &ForceTrace,
    metrics: &ForceMetrics,
    title: &str,
    width: u32,
    height: u32,
) -> Result<String, AppError> {
    let mut svg = String::new();
    draw_force_chart(&mut svg, trace, metrics, title, width, height)
        .map_err(|e| AppError::Output(format!("Failed to render force chart: {e}")))?;
    Ok(svg)
}

fn draw_force_chart(
    svg: &mut String,
    trace: &ForceTrace,
    metrics: &ForceMetrics,
    title: &str,
    width: u32,
    height: u32,
) -> Result<(), Box<dyn std::error::Error>> {
    let samples = trace.samples();
    let (t_lo, t_hi) = samples
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), s| (lo.min(s.time_s), hi.max(s.time_s)));
    let (f_lo, f_hi) = samples
        .iter()
        .map(|s| s.force_n)
        .chain([metrics.bw_n])
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| (lo.min(v), hi.max(v)));
    let (x0, x1) = pad(t_lo, t_hi);
    let (y0, y1) = pad(f_lo, f_hi);

    let root = SVGBackend::with_string(svg, (width, height)).into_drawing_area();
    root.fill(&WHITE)?;

    let mut chart = ChartBuilder::on(&root)
        .caption(title, ("sans-serif", 18))
        .margin(12)
        .set_label_area_size(LabelAreaPosition::Left, 60)
        .set_label_area_size(LabelAreaPosition::Bottom, 40)
        .build_cartesian_2d(x0..x1, y0..y1)?;

    chart
        .configure_mesh()
        .x_desc("Time (s)")
        .y_desc("Force (N)")
        .x_labels(6)
        .y_labels(6)
        .draw()?;

    chart
        .draw_series(LineSeries::new(
            [(x0, metrics.bw_n), (x1, metrics.bw_n)],
            BODYWEIGHT_COLOR.stroke_width(1),
        ))?
        .label(format!("Bodyweight {:.1} N", metrics.bw_n))
        .legend(|(x, y)| PathElement::new([(x, y), (x + 16, y)], BODYWEIGHT_COLOR));

    chart.draw_series(LineSeries::new(
        samples.iter().map(|s| (s.time_s, s.force_n)),
        LINE_COLOR.stroke_width(2),
    ))?;

    chart
        .configure_series_labels()
        .background_style(WHITE.mix(0.8))
        .border_style(BLACK)
        .draw()?;

    root.present()?;
    Ok(())
}

fn y_bounds(analysis: &ResidualAnalysis, model: &RegressionModel, x0: f64, x1: f64) -> (f64, f64) {
    let line = [model.predict(x0), model.predict(x1)];
    let (lo, hi) = analysis
        .records
        .iter()
        .map(|r| r.actual_bat_speed)
        .chain(line)
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| (lo.min(v), hi.max(v)));
    pad(lo, hi)
}

/// Widen `[lo, hi]` by 5% each side; degenerate spans get a fixed margin.
fn pad(lo: f64, hi: f64) -> (f64, f64) {
    if !(lo.is_finite() && hi.is_finite()) {
        return (0.0, 1.0);
    }
    let span = hi - lo;
    let margin = if span > 0.0 { span * 0.05 } else { 1.0 };
    (lo - margin, hi + margin)
}
