//! CSV ingest.
//!
//! This module is responsible for turning an athlete-testing CSV into raw
//! `AthleteRecord`s that the cleaner can filter.
//!
//! Design goals:
//! - **Explicit schema**: which column holds the level, CMJ height, bat speed
//!   (and optionally an athlete id) comes from configuration; a mapped column
//!   missing from the header is a hard error (exit code 2)
//! - **Bat-speed fallback**: when the bat-speed column is absent or holds too
//!   few numbers, a configured fallback column (`hitting_max_hss` by default)
//!   is read instead
//! - **Row-level validation**: rows with an unusable level are skipped and
//!   reported; empty or non-numeric measurements are kept as missing so the
//!   cleaner can count them
//! - **Separation of concerns**: no filtering or fitting here

use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use csv::StringRecord;
use tracing::{debug, info, warn};

use crate::domain::{AthleteRecord, ColumnMap, Level};
use crate::error::AppError;

/// Row diagnostics beyond this count are only logged at debug level.
const MAX_LOGGED_ROW_ERRORS: usize = 5;

/// The primary bat-speed column needs more numeric values than this to be used
/// when a fallback column is available.
const MIN_PRIMARY_BAT_VALUES: usize = 10;

/// A row-level problem encountered during ingest.
#[derive(Debug, Clone, PartialEq)]
pub struct RowError {
    pub line: usize,
    pub message: String,
}

/// Ingest output: raw records plus what was skipped.
#[derive(Debug, Clone)]
pub struct IngestedData {
    pub records: Vec<AthleteRecord>,
    pub row_errors: Vec<RowError>,
    pub rows_read: usize,
    /// The column mapping that was applied (as configured).
    pub columns: ColumnMap,
    /// The column bat speed was actually read from.
    pub bat_speed_column: String,
}

/// Column indices resolved against the header row.
#[derive(Debug, Clone, Copy)]
struct ResolvedColumns {
    level: usize,
    cmj_height: usize,
    /// At least one of `bat_speed` and `bat_fallback` is present.
    bat_speed: Option<usize>,
    bat_fallback: Option<usize>,
    id: Option<usize>,
}

/// A parsed row before the bat-speed source is chosen.
struct ParsedRow {
    record: AthleteRecord,
    fallback_bat_speed: Option<f64>,
}

/// Load athlete records from a CSV file.
pub fn load_athlete_records(path: &Path, columns: &ColumnMap) -> Result<IngestedData, AppError> {
    let file = File::open(path)
        .map_err(|e| AppError::InputFormat(format!("Failed to open CSV '{}': {e}", path.display())))?;

    let data = read_athlete_records(file, columns)?;
    info!(
        path = %path.display(),
        rows_read = data.rows_read,
        records = data.records.len(),
        skipped = data.row_errors.len(),
        "loaded input"
    );
    Ok(data)
}

/// Read athlete records from any CSV source.
pub fn read_athlete_records<R: Read>(source: R, columns: &ColumnMap) -> Result<IngestedData, AppError> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(source);

    let headers = reader
        .headers()
        .map_err(|e| AppError::InputFormat(format!("Failed to read CSV headers: {e}")))?
        .clone();
    if headers.iter().all(|h| h.trim().is_empty()) {
        return Err(AppError::InputFormat(
            "CSV looks empty or has no header row.".to_string(),
        ));
    }

    let header_map = build_header_map(&headers);
    let resolved = resolve_columns(columns, &header_map, &headers)?;

    let mut rows = Vec::new();
    let mut row_errors = Vec::new();
    let mut rows_read = 0usize;

    for (idx, result) in reader.records().enumerate() {
        // +2 because the header is line 1 and CSV lines are 1-based.
        let line = idx + 2;
        rows_read += 1;

        let record = match result {
            Ok(r) => r,
            Err(e) => {
                row_errors.push(RowError {
                    line,
                    message: format!("CSV parse error: {e}"),
                });
                continue;
            }
        };

        match parse_row(&record, &resolved, line) {
            Ok(row) => rows.push(row),
            Err(message) => row_errors.push(RowError { line, message }),
        }
    }

    let (records, bat_speed_column) = choose_bat_speed(rows, &resolved, columns);

    for (i, e) in row_errors.iter().enumerate() {
        if i < MAX_LOGGED_ROW_ERRORS {
            warn!(line = e.line, "skipped row: {}", e.message);
        } else {
            debug!(line = e.line, "skipped row: {}", e.message);
        }
    }

    if records.is_empty() {
        return Err(AppError::InputFormat(format!(
            "No usable rows: {rows_read} row(s) read, none with a recognized level in column `{}`.",
            columns.level
        )));
    }

    Ok(IngestedData {
        records,
        row_errors,
        rows_read,
        columns: columns.clone(),
        bat_speed_column,
    })
}

/// Keep the primary bat-speed values, or switch every row to the fallback column.
fn choose_bat_speed(
    rows: Vec<ParsedRow>,
    cols: &ResolvedColumns,
    columns: &ColumnMap,
) -> (Vec<AthleteRecord>, String) {
    let primary_values = rows.iter().filter(|r| r.record.bat_speed.is_some()).count();
    let fallback = match (cols.bat_speed, cols.bat_fallback, &columns.bat_speed_fallback) {
        (None, Some(_), Some(name)) => Some(name),
        (Some(_), Some(_), Some(name)) if primary_values <= MIN_PRIMARY_BAT_VALUES => Some(name),
        _ => None,
    };

    match fallback {
        Some(name) => {
            warn!(
                primary = %columns.bat_speed,
                primary_values,
                fallback = %name,
                "bat speed column missing or sparse; reading the fallback column"
            );
            let records = rows
                .into_iter()
                .map(|r| AthleteRecord {
                    bat_speed: r.fallback_bat_speed,
                    ..r.record
                })
                .collect();
            (records, name.clone())
        }
        None => (
            rows.into_iter().map(|r| r.record).collect(),
            columns.bat_speed.clone(),
        ),
    }
}

pub(crate) fn build_header_map(headers: &StringRecord) -> HashMap<String, usize> {
    let mut map = HashMap::new();
    for (idx, name) in headers.iter().enumerate() {
        // First occurrence wins for duplicated headers.
        map.entry(normalize_header_name(name)).or_insert(idx);
    }
    map
}

fn normalize_header_name(name: &str) -> String {
    // Excel and other tools sometimes emit UTF-8 CSVs with a BOM prefix on the
    // first header. If we don't strip it, schema validation will incorrectly
    // report missing columns.
    let name = name.trim().trim_start_matches('\u{feff}').trim();
    name.to_lowercase()
}

fn resolve_columns(
    columns: &ColumnMap,
    header_map: &HashMap<String, usize>,
    headers: &StringRecord,
) -> Result<ResolvedColumns, AppError> {
    let lookup = |name: &str| header_map.get(&normalize_header_name(name)).copied();

    let mut missing = Vec::new();
    let mut require = |field: &str, name: &str| {
        let idx = lookup(name);
        if idx.is_none() {
            missing.push(format!("{field} -> `{name}`"));
        }
        idx
    };

    let level = require("level", &columns.level);
    let cmj_height = require("cmj_height", &columns.cmj_height);
    let id = match &columns.id {
        Some(name) => Some(require("id", name)),
        None => None,
    };

    let fallback_name = columns.bat_speed_fallback.as_deref().filter(|name| !name.trim().is_empty());
    let bat_fallback = fallback_name.and_then(lookup);
    let bat_speed = match (lookup(&columns.bat_speed), bat_fallback) {
        (None, None) => {
            let also = fallback_name.map(|name| format!(" (or fallback `{name}`)")).unwrap_or_default();
            missing.push(format!("bat_speed -> `{}`{also}", columns.bat_speed));
            None
        }
        (idx, _) => Some(idx),
    };

    match (level, cmj_height, bat_speed) {
        (Some(level), Some(cmj_height), Some(bat_speed)) if missing.is_empty() => Ok(ResolvedColumns {
            level,
            cmj_height,
            bat_speed,
            bat_fallback,
            id: id.flatten(),
        }),
        _ => {
            let available: Vec<&str> = headers.iter().map(|h| h.trim_start_matches('\u{feff}')).collect();
            Err(AppError::InputFormat(format!(
                "Missing required column(s): {}. Available columns: {}",
                missing.join(", "),
                available.join(", ")
            )))
        }
    }
}

fn parse_row(record: &StringRecord, cols: &ResolvedColumns, line: usize) -> Result<ParsedRow, String> {
    let label = get_optional(record, cols.level).ok_or_else(|| "Missing level value.".to_string())?;
    let level = Level::parse_label(label).ok_or_else(|| format!("Unrecognized level '{label}'."))?;
    let number = |idx: Option<usize>| parse_opt_f64(idx.and_then(|i| get_optional(record, i)));

    Ok(ParsedRow {
        record: AthleteRecord {
            line,
            id: cols.id.and_then(|idx| get_optional(record, idx)).map(str::to_string),
            level,
            cmj_height: parse_opt_f64(get_optional(record, cols.cmj_height)),
            bat_speed: number(cols.bat_speed),
        },
        fallback_bat_speed: number(cols.bat_fallback),
    })
}

fn get_optional(record: &StringRecord, idx: usize) -> Option<&str> {
    record.get(idx).map(str::trim).filter(|s| !s.is_empty())
}

fn parse_opt_f64(s: Option<&str>) -> Option<f64> {
    let v = s?.parse::<f64>().ok()?;
    if v.is_finite() { Some(v) } else { None }
}
