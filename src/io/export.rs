//! Export residuals, filter counts, and full runs.
//!
//! The exports are meant to be easy to consume in spreadsheets or downstream
//! scripts. A run's files go through `write_files_atomically`, so a failed run
//! leaves neither a half-written file nor a partial set of files behind.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::info;

use crate::domain::{Cohort, FilterCounts, Level, ResidualRecord};
use crate::error::AppError;

#[derive(Debug, Serialize)]
struct ResidualRow<'a> {
    athlete: String,
    line: usize,
    level: &'a str,
    cmj_height: f64,
    actual_bat_speed: f64,
    predicted_bat_speed: f64,
    residual: f64,
    classification: &'a str,
}

#[derive(Debug, Serialize)]
struct CountsRow<'a> {
    level: &'a str,
    rows_raw: usize,
    dropped_missing: usize,
    dropped_below_floor: usize,
    dropped_outliers: usize,
    rows_retained: usize,
}

/// Per-level residual export name, e.g. `residuals_high_school.csv`.
pub fn residuals_file_name(level: Cohort) -> String {
    format!("residuals_{}.csv", level.slug())
}

/// Force-plate report name for an athlete, e.g. `Jo_Doe_report.html`.
///
/// Anything outside ASCII letters, digits, `-`, `_` and `.` becomes `_`, so
/// the name stays inside the output directory.
pub fn force_report_file_name(athlete: &str) -> String {
    let stem: String = athlete
        .trim()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') { c } else { '_' })
        .collect();
    let stem = stem.trim_matches('.');
    let stem = if stem.is_empty() { "athlete" } else { stem };
    format!("{stem}_report.html")
}

/// Render residual records as CSV.
pub fn residuals_csv(records: &[ResidualRecord]) -> Result<Vec<u8>, AppError> {
    let mut wtr = csv::Writer::from_writer(Vec::new());
    for r in records {
        wtr.serialize(ResidualRow {
            athlete: r.label(),
            line: r.line,
            level: r.level.display_name(),
            cmj_height: r.cmj_height,
            actual_bat_speed: r.actual_bat_speed,
            predicted_bat_speed: r.predicted_bat_speed,
            residual: r.residual,
            classification: r.classification.display_name(),
        })
        .map_err(|e| AppError::Output(format!("Failed to encode residual row: {e}")))?;
    }
    finish_csv(wtr)
}

/// Render per-level filter counts as CSV (one row per level, in level order).
pub fn filter_counts_csv(counts: &BTreeMap<Level, FilterCounts>) -> Result<Vec<u8>, AppError> {
    let mut wtr = csv::Writer::from_writer(Vec::new());
    for (level, c) in counts {
        wtr.serialize(CountsRow {
            level: level.display_name(),
            rows_raw: c.rows_raw,
            dropped_missing: c.dropped_missing,
            dropped_below_floor: c.dropped_below_floor,
            dropped_outliers: c.dropped_outliers,
            rows_retained: c.rows_retained,
        })
        .map_err(|e| AppError::Output(format!("Failed to encode filter counts: {e}")))?;
    }
    finish_csv(wtr)
}

fn finish_csv(wtr: csv::Writer<Vec<u8>>) -> Result<Vec<u8>, AppError> {
    wtr.into_inner()
        .map_err(|e| AppError::Output(format!("Failed to flush CSV buffer: {e}")))
}

/// Pretty-printed JSON for any serializable value.
pub fn to_json_bytes<T: Serialize>(value: &T) -> Result<Vec<u8>, AppError> {
    let mut out = serde_json::to_vec_pretty(value)
        .map_err(|e| AppError::Output(format!("Failed to encode JSON: {e}")))?;
    out.push(b'\n');
    Ok(out)
}

/// Write every `(path, contents)` pair, or none of them.
///
/// Contents are first written to sibling `.tmp` files, then renamed into place.
/// A file being replaced is moved aside until every rename has succeeded. If
/// any step fails, the temporaries, the targets renamed so far and the
/// directories created here are removed, and replaced files are restored.
pub fn write_files_atomically(files: &[(PathBuf, Vec<u8>)]) -> Result<(), AppError> {
    let mut batch = WriteBatch::default();
    let result = batch.stage(files).and_then(|()| batch.commit());
    match result {
        Ok(()) => {
            batch.discard_backups();
            for (path, bytes) in files {
                info!(path = %path.display(), bytes = bytes.len(), "wrote file");
            }
            Ok(())
        }
        Err(e) => {
            batch.roll_back();
            Err(e)
        }
    }
}

/// Filesystem changes made so far by one `write_files_atomically` call.
#[derive(Debug, Default)]
struct WriteBatch {
    /// In creation order (outermost first).
    created_dirs: Vec<PathBuf>,
    /// `(temporary, target)` pairs still to be renamed.
    staged: Vec<(PathBuf, PathBuf)>,
    /// `(target, backup of the file it replaced)`.
    committed: Vec<(PathBuf, Option<PathBuf>)>,
}

impl WriteBatch {
    fn stage(&mut self, files: &[(PathBuf, Vec<u8>)]) -> Result<(), AppError> {
        for (path, contents) in files {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                self.create_dir(parent)?;
            }
            let tmp = sibling_path(path, ".tmp");
            fs::write(&tmp, contents).map_err(|e| {
                let _ = fs::remove_file(&tmp);
                AppError::Output(format!("Failed to write '{}': {e}", tmp.display()))
            })?;
            self.staged.push((tmp, path.clone()));
        }
        Ok(())
    }

    fn create_dir(&mut self, dir: &Path) -> Result<(), AppError> {
        let mut missing: Vec<PathBuf> = dir
            .ancestors()
            .take_while(|d| !d.as_os_str().is_empty() && !d.exists())
            .map(Path::to_path_buf)
            .collect();
        if missing.is_empty() {
            return Ok(());
        }
        fs::create_dir_all(dir).map_err(|e| {
            AppError::Output(format!("Failed to create directory '{}': {e}", dir.display()))
        })?;
        missing.reverse();
        self.created_dirs.extend(missing);
        Ok(())
    }

    fn commit(&mut self) -> Result<(), AppError> {
        let mut pending = std::mem::take(&mut self.staged).into_iter();
        while let Some((tmp, target)) = pending.next() {
            if let Err(e) = self.swap_in(&tmp, &target) {
                let _ = fs::remove_file(&tmp);
                // Hand the rest back so the rollback removes their temporaries.
                self.staged.extend(pending);
                return Err(e);
            }
        }
        Ok(())
    }

    fn swap_in(&mut self, tmp: &Path, target: &Path) -> Result<(), AppError> {
        let backup = match fs::symlink_metadata(target) {
            Ok(meta) if meta.is_file() => {
                let backup = sibling_path(target, ".bak");
                fs::rename(target, &backup).map_err(|e| {
                    AppError::Output(format!("Failed to move aside '{}': {e}", target.display()))
                })?;
                Some(backup)
            }
            _ => None,
        };

        if let Err(e) = fs::rename(tmp, target) {
            if let Some(backup) = &backup {
                let _ = fs::rename(backup, target);
            }
            return Err(AppError::Output(format!(
                "Failed to move '{}' into place: {e}",
                target.display()
            )));
        }
        self.committed.push((target.to_path_buf(), backup));
        Ok(())
    }

    fn discard_backups(&mut self) {
        for backup in self.committed.iter().filter_map(|(_, b)| b.as_ref()) {
            let _ = fs::remove_file(backup);
        }
    }

    fn roll_back(&mut self) {
        for (tmp, _) in self.staged.drain(..) {
            let _ = fs::remove_file(tmp);
        }
        for (target, backup) in self.committed.drain(..).rev() {
            let _ = fs::remove_file(&target);
            if let Some(backup) = backup {
                let _ = fs::rename(backup, &target);
            }
        }
        // Only empty directories go; `remove_dir` refuses the rest.
        for dir in self.created_dirs.drain(..).rev() {
            let _ = fs::remove_dir(dir);
        }
    }
}

fn sibling_path(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(suffix);
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Classification;

    fn record(line: usize, id: Option<&str>, residual: f64) -> ResidualRecord {
        ResidualRecord {
            line,
            id: id.map(str::to_string),
            level: Level::HighSchool,
            cmj_height: 30.0,
            actual_bat_speed: 70.0 + residual,
            predicted_bat_speed: 70.0,
            residual,
            classification: Classification::from_residual(residual, 0.0),
        }
    }

    #[test]
    fn residual_csv_has_header_and_labels() {
        let bytes = residuals_csv(&[record(2, Some("A1"), 1.5), record(3, None, -0.5)]).unwrap();
        let text = String::from_utf8(bytes).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(
            lines[0],
            "athlete,line,level,cmj_height,actual_bat_speed,predicted_bat_speed,residual,classification"
        );
        assert_eq!(lines[1], "A1,2,High School,30.0,71.5,70.0,1.5,over");
        assert_eq!(lines[2], "row 3,3,High School,30.0,69.5,70.0,-0.5,under");
    }

    #[test]
    fn counts_csv_follows_level_order() {
        let mut counts = BTreeMap::new();
        counts.insert(
            Level::Professional,
            FilterCounts { rows_raw: 5, rows_retained: 5, ..FilterCounts::default() },
        );
        counts.insert(
            Level::HighSchool,
            FilterCounts {
                rows_raw: 10,
                dropped_missing: 1,
                dropped_below_floor: 2,
                dropped_outliers: 1,
                rows_retained: 6,
            },
        );
        let text = String::from_utf8(filter_counts_csv(&counts).unwrap()).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(
            lines[0],
            "level,rows_raw,dropped_missing,dropped_below_floor,dropped_outliers,rows_retained"
        );
        assert_eq!(lines[1], "High School,10,1,2,1,6");
        assert_eq!(lines[2], "Professional,5,0,0,0,5");
    }

    fn file_names(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    #[test]
    fn atomic_write_creates_dirs_and_leaves_no_temp() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("out.csv");
        write_files_atomically(&[(path.clone(), b"a,b\n".to_vec())]).unwrap();
        assert_eq!(fs::read(&path).unwrap(), b"a,b\n");

        write_files_atomically(&[(path.clone(), b"c\n".to_vec())]).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "c\n");
        assert_eq!(file_names(&dir.path().join("nested")), ["out.csv"]);
    }

    #[test]
    fn failed_rename_undoes_the_whole_batch() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("reports");
        fs::create_dir(&out).unwrap();
        fs::write(out.join("a.csv"), "old\n").unwrap();
        // A directory squatting on a target path makes its rename fail.
        fs::create_dir(out.join("c.csv")).unwrap();

        let files = vec![
            (out.join("a.csv"), b"new\n".to_vec()),
            (out.join("deeper").join("b.csv"), b"b\n".to_vec()),
            (out.join("c.csv"), b"c\n".to_vec()),
        ];
        let err = write_files_atomically(&files).unwrap_err();
        assert!(matches!(err, AppError::Output(_)));
        assert!(err.to_string().contains("c.csv"), "{err}");

        assert_eq!(fs::read_to_string(out.join("a.csv")).unwrap(), "old\n");
        assert!(out.join("c.csv").is_dir());
        assert_eq!(file_names(&out), ["a.csv", "c.csv"]);
    }

    #[test]
    fn failed_batch_removes_directories_it_created() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        fs::create_dir(&blocker).unwrap();
        let out = dir.path().join("fresh").join("reports");

        let files = vec![(out.join("a.csv"), b"a\n".to_vec()), (blocker, b"x\n".to_vec())];
        assert!(write_files_atomically(&files).is_err());
        assert!(!dir.path().join("fresh").exists());
        assert_eq!(file_names(dir.path()), ["blocker"]);
    }

    #[test]
    fn json_is_pretty_and_newline_terminated() {
        let bytes = to_json_bytes(&record(2, Some("A1"), 1.0)).unwrap();
        let text = String::from_utf8(bytes).unwrap();
        assert!(text.contains("\"classification\": \"over_performer\""));
        assert!(text.ends_with("}\n"));
    }

    #[test]
    fn force_report_names_stay_in_the_directory() {
        assert_eq!(force_report_file_name("Jo Doe"), "Jo_Doe_report.html");
        assert_eq!(force_report_file_name(" ../etc/x "), "_etc_x_report.html");
        assert_eq!(force_report_file_name(".."), "athlete_report.html");
        assert_eq!(force_report_file_name(""), "athlete_report.html");
    }

    #[test]
    fn residuals_file_names_use_level_slug() {
        assert_eq!(residuals_file_name(Level::HighSchool.into()), "residuals_high_school.csv");
        assert_eq!(residuals_file_name(Cohort::AllLevels), "residuals_all.csv");
    }
}
