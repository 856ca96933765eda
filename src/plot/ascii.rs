//! ASCII plotting for terminal output.
//!
//! This is intentionally "dumb" (fixed-size grid), optimized for:
//! - quick visual sanity checks in a terminal
//! - deterministic output (helpful for golden tests)
//!
//! Plot elements:
//! - observed athletes: `o`
//! - fitted regression line: `-`
//! - optional highlights: `O` (top over-performers), `U` (top under-performers)

use std::collections::HashSet;

use crate::domain::{RegressionModel, ResidualRecord};
use crate::report::Rankings;

/// Render one level's athletes and fitted line.
pub fn render_ascii_plot(
    records: &[ResidualRecord],
    model: &RegressionModel,
    width: usize,
    height: usize,
    rankings: Option<&Rankings>,
) -> String {
    let width = width.max(10);
    let height = height.max(5);

    let (x_min, x_max) = cmj_range(records)
        .or_else(|| valid_range(model.cmj_min, model.cmj_max))
        .unwrap_or((0.0, 1.0));
    let line = sample_line(model, x_min, x_max, width);

    // Determine y-range from observed points and the fitted line.
    let (y_min, y_max) = y_range(records, &line).unwrap_or((0.0, 1.0));
    let (y_min, y_max) = pad_range(y_min, y_max, 0.05);

    let mut grid = vec![vec![' '; width]; height];

    // Draw the line first (so points can overlay).
    draw_polyline(&mut grid, &line, x_min, x_max, y_min, y_max);

    // Highlight sets, keyed by CSV line (unique per athlete row).
    let (over_lines, under_lines): (HashSet<usize>, HashSet<usize>) = rankings
        .map(|r| {
            (
                r.over.iter().map(|x| x.line).collect(),
                r.under.iter().map(|x| x.line).collect(),
            )
        })
        .unwrap_or_default();

    for r in records {
        let x = map_x(r.cmj_height, x_min, x_max, width);
        let y = map_y(r.actual_bat_speed, y_min, y_max, height);

        let ch = if over_lines.contains(&r.line) {
            'O'
        } else if under_lines.contains(&r.line) {
            'U'
        } else {
            'o'
        };

        grid[y][x] = ch;
    }

    let mut out = String::new();
    out.push_str(&format!(
        "Plot: cmj=[{x_min:.2}, {x_max:.2}] | bat_speed=[{y_min:.2}, {y_max:.2}] mph\n"
    ));

    for row in grid {
        out.push_str(&row.into_iter().collect::<String>());
        out.push('\n');
    }

    out
}

fn cmj_range(records: &[ResidualRecord]) -> Option<(f64, f64)> {
    let (lo, hi) = records
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), r| {
            (lo.min(r.cmj_height), hi.max(r.cmj_height))
        });
    valid_range(lo, hi)
}

fn valid_range(lo: f64, hi: f64) -> Option<(f64, f64)> {
    if lo.is_finite() && hi.is_finite() && hi > lo {
        Some((lo, hi))
    } else {
        None
    }
}

fn sample_line(model: &RegressionModel, x_min: f64, x_max: f64, n: usize) -> Vec<(f64, f64)> {
    let n = n.max(2);
    (0..n)
        .map(|i| {
            let u = i as f64 / (n as f64 - 1.0);
            let x = x_min + u * (x_max - x_min);
            (x, model.predict(x))
        })
        .collect()
}

fn y_range(records: &[ResidualRecord], line: &[(f64, f64)]) -> Option<(f64, f64)> {
    let (lo, hi) = records
        .iter()
        .map(|r| r.actual_bat_speed)
        .chain(line.iter().map(|&(_, y)| y))
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), y| (lo.min(y), hi.max(y)));
    valid_range(lo, hi)
}

fn pad_range(min: f64, max: f64, frac: f64) -> (f64, f64) {
    let span = (max - min).abs();
    let pad = (span * frac).max(1e-12);
    (min - pad, max + pad)
}

fn map_x(x: f64, x_min: f64, x_max: f64, width: usize) -> usize {
    let u = ((x - x_min) / (x_max - x_min)).clamp(0.0, 1.0);
    (u * (width as f64 - 1.0)).round() as usize
}

fn map_y(y: f64, y_min: f64, y_max: f64, height: usize) -> usize {
    let u = ((y - y_min) / (y_max - y_min)).clamp(0.0, 1.0);
    // Largest value on row 0.
    (height as f64 - 1.0 - (u * (height as f64 - 1.0))).round() as usize
}

fn draw_polyline(grid: &mut [Vec<char>], pts: &[(f64, f64)], x_min: f64, x_max: f64, y_min: f64, y_max: f64) {
    let height = grid.len();
    let width = grid.first().map_or(0, Vec::len);
    if pts.len() < 2 || height == 0 || width == 0 {
        return;
    }

    let mut prev = None;
    for &(x, y) in pts {
        let col = map_x(x, x_min, x_max, width);
        let row = map_y(y, y_min, y_max, height);
        match prev {
            Some((c0, r0)) => draw_segment(grid, c0, r0, col, row, '-'),
            None => grid[row][col] = '-',
        }
        prev = Some((col, row));
    }
}

/// Integer line drawing (Bresenham-ish). Only fills blank cells.
fn draw_segment(grid: &mut [Vec<char>], x0: usize, y0: usize, x1: usize, y1: usize, ch: char) {
    let mut x0 = x0 as isize;
    let mut y0 = y0 as isize;
    let x1 = x1 as isize;
    let y1 = y1 as isize;

    let dx = (x1 - x0).abs();
    let sx = if x0 < x1 { 1 } else { -1 };
    let dy = -(y1 - y0).abs();
    let sy = if y0 < y1 { 1 } else { -1 };
    let mut err = dx + dy;

    loop {
        if let Some(cell) = grid
            .get_mut(y0 as usize)
            .and_then(|row| row.get_mut(x0 as usize))
            .filter(|c| **c == ' ')
        {
            *cell = ch;
        }

        if x0 == x1 && y0 == y1 {
            break;
        }
        let e2 = 2 * err;
        if e2 >= dy {
            err += dy;
            x0 += sx;
        }
        if e2 <= dx {
            err += dx;
            y0 += sy;
        }
    }
}
