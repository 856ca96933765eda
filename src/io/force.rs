//! Force-plate CSV loading.
//!
//! The export has one row per sample with `time_s` and `force_n` columns
//! (matched case-insensitively, other columns ignored). Unlike the athlete
//! table, a bad sample fails the whole load: a gap would shift every window.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use tracing::info;

use super::ingest::build_header_map;
use crate::domain::{ForceSample, ForceTrace};
use crate::error::AppError;

pub const TIME_COLUMN: &str = "time_s";
pub const FORCE_COLUMN: &str = "force_n";

/// Load a force trace from a CSV file.
pub fn load_force_trace(path: &Path) -> Result<ForceTrace, AppError> {
    let file = File::open(path)
        .map_err(|e| AppError::InputFormat(format!("Failed to open CSV '{}': {e}", path.display())))?;
    let trace = read_force_trace(file)?;
    info!(path = %path.display(), samples = trace.len(), "loaded force trace");
    Ok(trace)
}

/// Read a force trace from any CSV source.
pub fn read_force_trace<R: Read>(source: R) -> Result<ForceTrace, AppError> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(source);

    let headers = reader
        .headers()
        .map_err(|e| AppError::InputFormat(format!("Failed to read CSV headers: {e}")))?
        .clone();
    if headers.iter().all(|h| h.trim().is_empty()) {
        return Err(AppError::InputFormat("CSV looks empty or has no header row.".to_string()));
    }

    let header_map = build_header_map(&headers);
    let (Some(&time_idx), Some(&force_idx)) = (header_map.get(TIME_COLUMN), header_map.get(FORCE_COLUMN)) else {
        let available: Vec<&str> = headers.iter().map(|h| h.trim_start_matches('\u{feff}')).collect();
        return Err(AppError::InputFormat(format!(
            "CSV must have columns `{TIME_COLUMN}` and `{FORCE_COLUMN}`. Available: [{}]",
            available.join(", ")
        )));
    };

    let mut samples: Vec<ForceSample> = Vec::new();
    for (idx, result) in reader.records().enumerate() {
        let line = idx + 2;
        let record = result.map_err(|e| AppError::InputFormat(format!("line {line}: CSV parse error: {e}")))?;
        let time_s = parse_value(record.get(time_idx), TIME_COLUMN, line)?;
        let force_n = parse_value(record.get(force_idx), FORCE_COLUMN, line)?;

        if let Some(prev) = samples.last().map(|s| s.time_s).filter(|&prev| time_s < prev) {
            return Err(AppError::InputFormat(format!(
                "line {line}: `{TIME_COLUMN}` goes backwards ({time_s} after {prev})."
            )));
        }
        samples.push(ForceSample { time_s, force_n });
    }

    if samples.is_empty() {
        return Err(AppError::InputFormat("CSV looks empty: no force samples.".to_string()));
    }
    Ok(ForceTrace::new(samples))
}

fn parse_value(raw: Option<&str>, column: &str, line: usize) -> Result<f64, AppError> {
    let raw = raw.map(str::trim).unwrap_or_default();
    match raw.parse::<f64>() {
        Ok(v) if v.is_finite() => Ok(v),
        _ => Err(AppError::InputFormat(format!("line {line}: invalid `{column}` value '{raw}'."))),
    }
}
