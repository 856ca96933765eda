//! Shared domain types.
//!
//! These types are intentionally kept lightweight and serializable so they can be:
//!
//! - used in-memory during cleaning and fitting
//! - exported to JSON/CSV
//! - handed to the report renderers as a stable, fully-populated structure

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize, Serializer};

/// Bat speeds below this are treated as sensor/entry errors.
pub const DEFAULT_MIN_BAT_SPEED: f64 = 40.0;
/// Outlier cut in standard deviations from the level mean.
pub const DEFAULT_Z_CUT: f64 = 3.0;
pub const DEFAULT_CONFIDENCE: f64 = 0.95;
pub const DEFAULT_BOOTSTRAP_ITERATIONS: usize = 1000;
pub const DEFAULT_TOP_N: usize = 15;
/// A straight line needs at least two points.
pub const MIN_SAMPLES: usize = 2;

pub const DEFAULT_LEVEL_COLUMN: &str = "playing_level";
pub const DEFAULT_CMJ_COLUMN: &str = "jump_height_(imp-mom)_[cm]_mean_cmj";
pub const DEFAULT_BAT_SPEED_COLUMN: &str = "bat_speed_mph";
/// Used when the primary bat-speed column is absent or nearly empty.
pub const DEFAULT_BAT_SPEED_FALLBACK_COLUMN: &str = "hitting_max_hss";

/// Competition level. A closed set: every level gets its own model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Level {
    HighSchool,
    College,
    Professional,
}

impl Level {
    pub const ALL: [Level; 3] = [Level::HighSchool, Level::College, Level::Professional];

    /// Human-readable label for terminal and report output.
    pub fn display_name(self) -> &'static str {
        match self {
            Level::HighSchool => "High School",
            Level::College => "College",
            Level::Professional => "Professional",
        }
    }

    /// File-name friendly tag (used for per-level exports).
    pub fn slug(self) -> &'static str {
        match self {
            Level::HighSchool => "high_school",
            Level::College => "college",
            Level::Professional => "professional",
        }
    }

    /// Parse a level label as it appears in source data or on the command line.
    ///
    /// Matching ignores case, whitespace, `_` and `-`, so `High School`,
    /// `high_school` and `HIGHSCHOOL` are all accepted. `HS` and `Pro` are
    /// accepted as short forms.
    pub fn parse_label(label: &str) -> Option<Level> {
        match label_key(label).as_str() {
            "highschool" | "hs" => Some(Level::HighSchool),
            "college" => Some(Level::College),
            "pro" | "professional" => Some(Level::Professional),
            _ => None,
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

fn label_key(label: &str) -> String {
    label
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '_' && *c != '-')
        .collect::<String>()
        .to_ascii_lowercase()
}

/// What a dataset or model covers: one level, or every level pooled.
///
/// Pooled rows are the union of the cleaned per-level datasets, so the floor
/// and the per-level outlier cut still apply to them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Cohort {
    Level(Level),
    AllLevels,
}

impl Cohort {
    pub fn display_name(self) -> &'static str {
        match self {
            Cohort::Level(level) => level.display_name(),
            Cohort::AllLevels => "All levels",
        }
    }

    pub fn slug(self) -> &'static str {
        match self {
            Cohort::Level(level) => level.slug(),
            Cohort::AllLevels => "all",
        }
    }

    pub fn as_level(self) -> Option<Level> {
        match self {
            Cohort::Level(level) => Some(level),
            Cohort::AllLevels => None,
        }
    }

    /// Parse a requested cohort: any level label, or `All` for the pooled data.
    pub fn parse_label(label: &str) -> Option<Cohort> {
        match label_key(label).as_str() {
            "all" | "alllevels" | "pooled" => Some(Cohort::AllLevels),
            _ => Level::parse_label(label).map(Cohort::Level),
        }
    }
}

impl From<Level> for Cohort {
    fn from(level: Level) -> Self {
        Cohort::Level(level)
    }
}

impl PartialEq<Level> for Cohort {
    fn eq(&self, other: &Level) -> bool {
        *self == Cohort::Level(*other)
    }
}

impl fmt::Display for Cohort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

/// Serialized as the slug, so a level reads the same as a plain `Level`.
impl Serialize for Cohort {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.slug())
    }
}

impl FromStr for Level {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Level::parse_label(s).ok_or_else(|| format!("unrecognized level '{}'", s.trim()))
    }
}

/// One raw row of input data.
///
/// Numeric fields are optional here: empty or unparseable cells are kept as
/// `None` and removed by the cleaner, so the drop is counted per level.
#[derive(Debug, Clone, PartialEq)]
pub struct AthleteRecord {
    /// 1-based CSV line number (header is line 1).
    pub line: usize,
    pub id: Option<String>,
    pub level: Level,
    pub cmj_height: Option<f64>,
    pub bat_speed: Option<f64>,
}

/// A cleaned observation with both numeric fields present.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AthletePoint {
    pub line: usize,
    pub id: Option<String>,
    pub level: Level,
    pub cmj_height: f64,
    pub bat_speed: f64,
}

impl AthletePoint {
    /// Identifier for display: the id column if present, else the CSV line.
    pub fn label(&self) -> String {
        match &self.id {
            Some(id) => id.clone(),
            None => format!("row {}", self.line),
        }
    }
}

/// All cleaned observations for one level (or all levels), in input order.
///
/// Fields are private so a dataset cannot change after the cleaner builds it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LevelDataset {
    level: Cohort,
    points: Vec<AthletePoint>,
}

impl LevelDataset {
    /// Build a dataset. Points belonging to another level are a caller bug.
    pub fn new(level: Level, points: Vec<AthletePoint>) -> Self {
        debug_assert!(points.iter().all(|p| p.level == level));
        Self {
            level: Cohort::Level(level),
            points,
        }
    }

    /// Pool points from every level, ordered by CSV line.
    pub fn pooled(mut points: Vec<AthletePoint>) -> Self {
        points.sort_by_key(|p| p.line);
        Self {
            level: Cohort::AllLevels,
            points,
        }
    }

    pub fn level(&self) -> Cohort {
        self.level
    }

    pub fn points(&self) -> &[AthletePoint] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn cmj_heights(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.cmj_height).collect()
    }

    pub fn bat_speeds(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.bat_speed).collect()
    }

    /// Observed `(min, max)` CMJ height, or `None` for an empty dataset.
    pub fn cmj_range(&self) -> Option<(f64, f64)> {
        let mut lo = f64::INFINITY;
        let mut hi = f64::NEG_INFINITY;
        for p in &self.points {
            lo = lo.min(p.cmj_height);
            hi = hi.max(p.cmj_height);
        }
        if lo.is_finite() && hi.is_finite() { Some((lo, hi)) } else { None }
    }
}

/// How many rows each cleaning step removed for one level.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FilterCounts {
    pub rows_raw: usize,
    pub dropped_missing: usize,
    pub dropped_below_floor: usize,
    pub dropped_outliers: usize,
    pub rows_retained: usize,
}

/// Fitted `bat_speed = slope * cmj + intercept` for one level or the pooled data.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RegressionModel {
    pub level: Cohort,
    pub slope: f64,
    pub intercept: f64,
    /// Pearson correlation coefficient.
    pub r: f64,
    pub n_samples: usize,
    /// Residual standard deviation with `n - 2` degrees of freedom.
    pub residual_std: f64,
    pub cmj_min: f64,
    pub cmj_max: f64,
}

impl RegressionModel {
    pub fn predict(&self, cmj_height: f64) -> f64 {
        self.slope * cmj_height + self.intercept
    }

    pub fn r_squared(&self) -> f64 {
        self.r * self.r
    }
}

/// Sign of a residual relative to the neutral band.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Classification {
    OverPerformer,
    UnderPerformer,
    Neutral,
}

impl Classification {
    /// Classify a residual; `|residual| <= band` is neutral.
    pub fn from_residual(residual: f64, band: f64) -> Self {
        if residual > band {
            Classification::OverPerformer
        } else if residual < -band {
            Classification::UnderPerformer
        } else {
            Classification::Neutral
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            Classification::OverPerformer => "over",
            Classification::UnderPerformer => "under",
            Classification::Neutral => "neutral",
        }
    }
}

/// Per-athlete residual against their level's model.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResidualRecord {
    pub line: usize,
    pub id: Option<String>,
    pub level: Level,
    pub cmj_height: f64,
    pub actual_bat_speed: f64,
    pub predicted_bat_speed: f64,
    pub residual: f64,
    pub classification: Classification,
}

impl ResidualRecord {
    pub fn label(&self) -> String {
        match &self.id {
            Some(id) => id.clone(),
            None => format!("row {}", self.line),
        }
    }
}

/// Single-athlete projection with a bootstrap confidence interval.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProjectionResult {
    pub level: Cohort,
    pub query_cmj: f64,
    pub point_estimate: f64,
    /// Mean of the bootstrap prediction distribution.
    pub bootstrap_mean: f64,
    pub ci_lower: f64,
    pub ci_upper: f64,
    pub confidence_level: f64,
    pub bootstrap_samples: usize,
    pub seed: Option<u64>,
    /// Query lies outside the observed CMJ range of the level.
    pub extrapolated: bool,
    pub observed_cmj_min: f64,
    pub observed_cmj_max: f64,
}

/// Which CSV column holds each semantic field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnMap {
    pub level: String,
    pub cmj_height: String,
    pub bat_speed: String,
    /// Read bat speed from here when `bat_speed` is missing or has too few values.
    pub bat_speed_fallback: Option<String>,
    /// Optional athlete identifier column, passed through to reports.
    pub id: Option<String>,
}

impl Default for ColumnMap {
    fn default() -> Self {
        Self {
            level: DEFAULT_LEVEL_COLUMN.to_string(),
            cmj_height: DEFAULT_CMJ_COLUMN.to_string(),
            bat_speed: DEFAULT_BAT_SPEED_COLUMN.to_string(),
            bat_speed_fallback: Some(DEFAULT_BAT_SPEED_FALLBACK_COLUMN.to_string()),
            id: None,
        }
    }
}

/// Thresholds used by the cleaner.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CleaningOptions {
    pub min_bat_speed: f64,
    pub z_cut: f64,
    /// Also drop CMJ-height outliers with the same z cut.
    pub filter_cmj_outliers: bool,
}

impl Default for CleaningOptions {
    fn default() -> Self {
        Self {
            min_bat_speed: DEFAULT_MIN_BAT_SPEED,
            z_cut: DEFAULT_Z_CUT,
            filter_cmj_outliers: false,
        }
    }
}

/// Bootstrap settings for a projection.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BootstrapOptions {
    pub confidence: f64,
    pub iterations: usize,
    /// Fixed seed for reproducible intervals; `None` draws from OS entropy.
    pub seed: Option<u64>,
}

impl Default for BootstrapOptions {
    fn default() -> Self {
        Self {
            confidence: DEFAULT_CONFIDENCE,
            iterations: DEFAULT_BOOTSTRAP_ITERATIONS,
            seed: None,
        }
    }
}

/// A full run's configuration as understood by the pipeline.
///
/// This is derived from CLI flags, an optional config file, and defaults.
#[derive(Debug, Clone)]
pub struct AnalysisConfig {
    pub input: PathBuf,
    pub columns: ColumnMap,
    pub cleaning: CleaningOptions,
    /// Residuals within `±neutral_band` mph are classified neutral.
    pub neutral_band: f64,
    /// Minimum cleaned records required to fit a level (never below 2).
    pub min_samples: usize,
    pub top_n: usize,

    pub out_dir: PathBuf,
    /// Write report/export files (terminal output is always printed).
    pub write_files: bool,
    pub export_json: Option<PathBuf>,

    pub plot: bool,
    pub plot_width: usize,
    pub plot_height: usize,
}

impl AnalysisConfig {
    /// Defaults for everything except the input path.
    pub fn new(input: impl Into<PathBuf>) -> Self {
        Self {
            input: input.into(),
            columns: ColumnMap::default(),
            cleaning: CleaningOptions::default(),
            neutral_band: 0.0,
            min_samples: MIN_SAMPLES,
            top_n: DEFAULT_TOP_N,
            out_dir: PathBuf::from("reports"),
            write_files: true,
            export_json: None,
            plot: true,
            plot_width: 80,
            plot_height: 20,
        }
    }

    /// Effective sample floor for fitting.
    pub fn required_samples(&self) -> usize {
        self.min_samples.max(MIN_SAMPLES)
    }
}

/// Single-athlete projection request.
#[derive(Debug, Clone)]
pub struct ProjectionRequest {
    /// Level name as typed by the user (or `All`); resolved against the input data.
    pub level: String,
    pub athlete_cmj: f64,
    pub bootstrap: BootstrapOptions,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn level_labels_parse_loosely() {
        assert_eq!(Level::parse_label("High School"), Some(Level::HighSchool));
        assert_eq!(Level::parse_label(" high_school "), Some(Level::HighSchool));
        assert_eq!(Level::parse_label("HS"), Some(Level::HighSchool));
        assert_eq!(Level::parse_label("college"), Some(Level::College));
        assert_eq!(Level::parse_label("Pro"), Some(Level::Professional));
        assert_eq!(Level::parse_label("PROFESSIONAL"), Some(Level::Professional));
        assert_eq!(Level::parse_label("Independent"), None);
        assert!("Minors".parse::<Level>().is_err());
        assert_eq!(Level::parse_label("All"), None);
    }

    #[test]
    fn cohort_accepts_all_and_levels() {
        assert_eq!(Cohort::parse_label("All"), Some(Cohort::AllLevels));
        assert_eq!(Cohort::parse_label(" all levels "), Some(Cohort::AllLevels));
        assert_eq!(Cohort::parse_label("pro"), Some(Cohort::Level(Level::Professional)));
        assert_eq!(Cohort::parse_label("Minors"), None);
        assert_eq!(Cohort::AllLevels.slug(), "all");
        assert_eq!(Cohort::AllLevels.as_level(), None);
        assert!(Cohort::Level(Level::College) == Level::College);
        assert!(Cohort::Level(Level::HighSchool) < Cohort::AllLevels);
        assert_eq!(serde_json::to_value(Cohort::Level(Level::HighSchool)).unwrap(), "high_school");
        assert_eq!(serde_json::to_value(Cohort::AllLevels).unwrap(), "all");
    }

    #[test]
    fn classification_respects_band() {
        assert_eq!(Classification::from_residual(0.0, 0.0), Classification::Neutral);
        assert_eq!(Classification::from_residual(0.1, 0.0), Classification::OverPerformer);
        assert_eq!(Classification::from_residual(-0.1, 0.0), Classification::UnderPerformer);
        assert_eq!(Classification::from_residual(0.4, 0.5), Classification::Neutral);
        assert_eq!(Classification::from_residual(-0.5, 0.5), Classification::Neutral);
        assert_eq!(Classification::from_residual(-0.6, 0.5), Classification::UnderPerformer);
    }

    #[test]
    fn dataset_range_and_columns() {
        let points = vec![
            AthletePoint { line: 2, id: None, level: Level::College, cmj_height: 35.0, bat_speed: 70.0 },
            AthletePoint { line: 3, id: Some("A7".into()), level: Level::College, cmj_height: 31.0, bat_speed: 66.0 },
        ];
        let ds = LevelDataset::new(Level::College, points);
        assert_eq!(ds.len(), 2);
        assert_eq!(ds.cmj_range(), Some((31.0, 35.0)));
        assert_eq!(ds.bat_speeds(), vec![70.0, 66.0]);
        assert_eq!(ds.points()[0].label(), "row 2");
        assert_eq!(ds.points()[1].label(), "A7");

        let empty = LevelDataset::new(Level::Professional, Vec::new());
        assert!(empty.is_empty());
        assert_eq!(empty.cmj_range(), None);
    }

    #[test]
    fn pooled_dataset_is_ordered_by_line() {
        let point = |line, level| AthletePoint { line, id: None, level, cmj_height: 30.0, bat_speed: 70.0 };
        let ds = LevelDataset::pooled(vec![
            point(5, Level::College),
            point(2, Level::Professional),
            point(3, Level::College),
        ]);
        assert_eq!(ds.level(), Cohort::AllLevels);
        let lines: Vec<usize> = ds.points().iter().map(|p| p.line).collect();
        assert_eq!(lines, vec![2, 3, 5]);
    }
}
