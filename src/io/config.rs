//! Optional TOML configuration file.
//!
//! Every key is optional. Values found here override built-in defaults and are
//! in turn overridden by explicit CLI flags:
//!
//! ```toml
//! [columns]
//! level = "playing_level"
//! cmj_height = "jump_height_(imp-mom)_[cm]_mean_cmj"
//! bat_speed = "bat_speed_mph"
//! bat_speed_fallback = "hitting_max_hss"   # "" disables the fallback
//! id = "athlete_uid"
//!
//! [cleaning]
//! min_bat_speed = 40.0
//! z_cut = 3.0
//! filter_cmj_outliers = false
//!
//! [analysis]
//! neutral_band = 0.0
//! min_samples = 20
//! top_n = 15
//! out_dir = "reports"
//!
//! [bootstrap]
//! confidence = 0.95
//! iterations = 1000
//! seed = 42
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::domain::{AnalysisConfig, BootstrapOptions};
use crate::error::AppError;

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub columns: ColumnsSection,
    pub cleaning: CleaningSection,
    pub analysis: AnalysisSection,
    pub bootstrap: BootstrapSection,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ColumnsSection {
    pub level: Option<String>,
    pub cmj_height: Option<String>,
    pub bat_speed: Option<String>,
    pub bat_speed_fallback: Option<String>,
    pub id: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CleaningSection {
    pub min_bat_speed: Option<f64>,
    pub z_cut: Option<f64>,
    pub filter_cmj_outliers: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AnalysisSection {
    pub neutral_band: Option<f64>,
    pub min_samples: Option<usize>,
    pub top_n: Option<usize>,
    pub out_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BootstrapSection {
    pub confidence: Option<f64>,
    pub iterations: Option<usize>,
    pub seed: Option<u64>,
}

impl FileConfig {
    /// Overlay file values onto `config`.
    pub fn apply(&self, config: &mut AnalysisConfig) {
        let cols = &self.columns;
        if let Some(v) = &cols.level {
            config.columns.level = v.clone();
        }
        if let Some(v) = &cols.cmj_height {
            config.columns.cmj_height = v.clone();
        }
        if let Some(v) = &cols.bat_speed {
            config.columns.bat_speed = v.clone();
        }
        if let Some(v) = &cols.bat_speed_fallback {
            config.columns.bat_speed_fallback = fallback_column(v);
        }
        if cols.id.is_some() {
            config.columns.id = cols.id.clone();
        }

        let cleaning = &self.cleaning;
        if let Some(v) = cleaning.min_bat_speed {
            config.cleaning.min_bat_speed = v;
        }
        if let Some(v) = cleaning.z_cut {
            config.cleaning.z_cut = v;
        }
        if let Some(v) = cleaning.filter_cmj_outliers {
            config.cleaning.filter_cmj_outliers = v;
        }

        let analysis = &self.analysis;
        if let Some(v) = analysis.neutral_band {
            config.neutral_band = v;
        }
        if let Some(v) = analysis.min_samples {
            config.min_samples = v;
        }
        if let Some(v) = analysis.top_n {
            config.top_n = v;
        }
        if let Some(v) = &analysis.out_dir {
            config.out_dir = v.clone();
        }
    }

    pub fn apply_bootstrap(&self, opts: &mut BootstrapOptions) {
        if let Some(v) = self.bootstrap.confidence {
            opts.confidence = v;
        }
        if let Some(v) = self.bootstrap.iterations {
            opts.iterations = v;
        }
        if self.bootstrap.seed.is_some() {
            opts.seed = self.bootstrap.seed;
        }
    }
}

/// An empty fallback column name turns the fallback off.
pub fn fallback_column(name: &str) -> Option<String> {
    let name = name.trim();
    if name.is_empty() { None } else { Some(name.to_string()) }
}

/// Read and parse a config file.
pub fn load_config_file(path: &Path) -> Result<FileConfig, AppError> {
    let text = fs::read_to_string(path)
        .map_err(|e| AppError::Config(format!("Failed to read config '{}': {e}", path.display())))?;
    parse_config(&text).map_err(|e| match e {
        AppError::Config(msg) => AppError::Config(format!("{}: {msg}", path.display())),
        other => other,
    })
}

pub fn parse_config(text: &str) -> Result<FileConfig, AppError> {
    toml::from_str(text).map_err(|e| AppError::Config(format!("invalid config file: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_changes_nothing() {
        let file = parse_config("").unwrap();
        assert_eq!(file, FileConfig::default());

        let mut config = AnalysisConfig::new("in.csv");
        let before = format!("{config:?}");
        file.apply(&mut config);
        assert_eq!(format!("{config:?}"), before);
    }

    #[test]
    fn sections_overlay_defaults() {
        let file = parse_config(
            r#"
[columns]
level = "Level"
id = "athlete_uid"

[cleaning]
z_cut = 2.5
filter_cmj_outliers = true

[analysis]
min_samples = 20
out_dir = "out"

[bootstrap]
iterations = 250
seed = 7
"#,
        )
        .unwrap();

        let mut config = AnalysisConfig::new("in.csv");
        file.apply(&mut config);
        assert_eq!(config.columns.level, "Level");
        assert_eq!(config.columns.bat_speed, "bat_speed_mph");
        assert_eq!(config.columns.id.as_deref(), Some("athlete_uid"));
        assert_eq!(config.columns.bat_speed_fallback.as_deref(), Some("hitting_max_hss"));
        assert_eq!(config.cleaning.z_cut, 2.5);
        assert_eq!(config.cleaning.min_bat_speed, 40.0);
        assert!(config.cleaning.filter_cmj_outliers);
        assert_eq!(config.min_samples, 20);
        assert_eq!(config.out_dir, PathBuf::from("out"));

        let mut opts = BootstrapOptions::default();
        file.apply_bootstrap(&mut opts);
        assert_eq!(opts.iterations, 250);
        assert_eq!(opts.seed, Some(7));
        assert_eq!(opts.confidence, 0.95);
    }

    #[test]
    fn empty_fallback_column_disables_it() {
        let file = parse_config("[columns]\nbat_speed_fallback = \"\"\n").unwrap();
        let mut config = AnalysisConfig::new("in.csv");
        file.apply(&mut config);
        assert_eq!(config.columns.bat_speed_fallback, None);

        let file = parse_config("[columns]\nbat_speed_fallback = \"max_hss\"\n").unwrap();
        file.apply(&mut config);
        assert_eq!(config.columns.bat_speed_fallback.as_deref(), Some("max_hss"));
    }

    #[test]
    fn unknown_keys_and_bad_types_are_config_errors() {
        assert!(matches!(parse_config("[cleaning]\nzcut = 2.0\n"), Err(AppError::Config(_))));
        assert!(matches!(parse_config("[analysis]\ntop_n = \"ten\"\n"), Err(AppError::Config(_))));
    }

    #[test]
    fn unreadable_file_is_a_config_error() {
        let err = load_config_file(Path::new("/no/such/config.toml")).unwrap_err();
        assert!(matches!(err, AppError::Config(_)));
        assert_eq!(err.exit_code(), 2);
    }
}
