//! Row cleaning: validity thresholds and per-level outlier removal.
//!
//! Steps run in a fixed order so results are reproducible:
//!
//! 1. drop rows missing CMJ height or bat speed
//! 2. drop rows below the bat-speed floor
//! 3. group by level (input order kept within each level)
//! 4. per level, drop rows whose bat speed is more than `z_cut` population
//!    standard deviations from the level mean (one pass, stats computed once)
//!
//! Levels whose rows are all removed are still returned (empty) so the failure
//! surfaces where a model is fitted, with the level named.

use std::collections::BTreeMap;

use tracing::debug;

use crate::domain::{
    AthletePoint, AthleteRecord, CleaningOptions, Cohort, FilterCounts, Level, LevelDataset,
};
use crate::math::{mean, std_dev};

/// Cleaner output: one dataset plus filter counts per level seen in the input.
#[derive(Debug, Clone, PartialEq)]
pub struct CleanedData {
    datasets: BTreeMap<Level, LevelDataset>,
    counts: BTreeMap<Level, FilterCounts>,
}

impl CleanedData {
    pub fn dataset(&self, level: Level) -> Option<&LevelDataset> {
        self.datasets.get(&level)
    }

    pub fn counts(&self, level: Level) -> Option<FilterCounts> {
        self.counts.get(&level).copied()
    }

    /// Levels present in the input, in `Level` order.
    pub fn levels(&self) -> Vec<Level> {
        self.datasets.keys().copied().collect()
    }

    pub fn datasets(&self) -> impl Iterator<Item = &LevelDataset> {
        self.datasets.values()
    }

    pub fn all_counts(&self) -> &BTreeMap<Level, FilterCounts> {
        &self.counts
    }

    /// Total rows retained across all levels.
    pub fn rows_retained(&self) -> usize {
        self.datasets.values().map(LevelDataset::len).sum()
    }

    /// Every retained row in one dataset, in input order.
    pub fn pooled(&self) -> LevelDataset {
        let points = self.datasets.values().flat_map(|ds| ds.points().iter().cloned()).collect();
        LevelDataset::pooled(points)
    }

    /// The dataset for a level, or the pooled dataset.
    ///
    /// `None` when the level is absent or nothing is retained for the pool.
    pub fn cohort(&self, cohort: Cohort) -> Option<LevelDataset> {
        match cohort {
            Cohort::Level(level) => self.dataset(level).cloned(),
            Cohort::AllLevels if self.datasets.is_empty() => None,
            Cohort::AllLevels => Some(self.pooled()),
        }
    }

    /// Filter counts for a level, or summed over every level.
    pub fn cohort_counts(&self, cohort: Cohort) -> Option<FilterCounts> {
        match cohort {
            Cohort::Level(level) => self.counts(level),
            Cohort::AllLevels => Some(self.counts.values().fold(FilterCounts::default(), |acc, c| {
                FilterCounts {
                    rows_raw: acc.rows_raw + c.rows_raw,
                    dropped_missing: acc.dropped_missing + c.dropped_missing,
                    dropped_below_floor: acc.dropped_below_floor + c.dropped_below_floor,
                    dropped_outliers: acc.dropped_outliers + c.dropped_outliers,
                    rows_retained: acc.rows_retained + c.rows_retained,
                }
            })),
        }
    }
}

/// Mean/SD band for one variable within one level.
#[derive(Debug, Clone, Copy)]
struct ZBand {
    mean: f64,
    sd: f64,
    z_cut: f64,
}

impl ZBand {
    fn from_values(values: &[f64], z_cut: f64) -> Option<Self> {
        Some(Self {
            mean: mean(values)?,
            sd: std_dev(values, 0)?,
            z_cut,
        })
    }

    fn contains(&self, v: f64) -> bool {
        // All values identical: nothing is an outlier.
        if self.sd == 0.0 {
            return true;
        }
        ((v - self.mean) / self.sd).abs() <= self.z_cut
    }
}

/// Clean raw records into per-level datasets.
pub fn clean(records: &[AthleteRecord], opts: &CleaningOptions) -> CleanedData {
    let mut grouped: BTreeMap<Level, Vec<AthletePoint>> = BTreeMap::new();
    let mut counts: BTreeMap<Level, FilterCounts> = BTreeMap::new();

    for rec in records {
        let c = counts.entry(rec.level).or_default();
        c.rows_raw += 1;
        let group = grouped.entry(rec.level).or_default();

        // 1) Missing values.
        let (Some(cmj_height), Some(bat_speed)) = (rec.cmj_height, rec.bat_speed) else {
            c.dropped_missing += 1;
            continue;
        };
        if !cmj_height.is_finite() || !bat_speed.is_finite() {
            c.dropped_missing += 1;
            continue;
        }

        // 2) Bat-speed floor.
        if bat_speed < opts.min_bat_speed {
            c.dropped_below_floor += 1;
            continue;
        }

        // 3) Grouping happens by pushing into the level's bucket.
        group.push(AthletePoint {
            line: rec.line,
            id: rec.id.clone(),
            level: rec.level,
            cmj_height,
            bat_speed,
        });
    }

    // 4) Per-level outlier pass.
    let mut datasets = BTreeMap::new();
    for (level, points) in grouped {
        let before = points.len();
        let kept = drop_outliers(points, opts);

        let c = counts.entry(level).or_default();
        c.dropped_outliers = before - kept.len();
        c.rows_retained = kept.len();

        datasets.insert(level, LevelDataset::new(level, kept));
    }

    CleanedData { datasets, counts }
}

fn drop_outliers(points: Vec<AthletePoint>, opts: &CleaningOptions) -> Vec<AthletePoint> {
    let bats: Vec<f64> = points.iter().map(|p| p.bat_speed).collect();
    let Some(bat_band) = ZBand::from_values(&bats, opts.z_cut) else {
        return points;
    };
    debug!(
        level = ?points.first().map(|p| p.level),
        mean = bat_band.mean,
        sd = bat_band.sd,
        z_cut = bat_band.z_cut,
        "bat speed outlier band"
    );

    let cmj_band = if opts.filter_cmj_outliers {
        let cmjs: Vec<f64> = points.iter().map(|p| p.cmj_height).collect();
        ZBand::from_values(&cmjs, opts.z_cut)
    } else {
        None
    };

    points
        .into_iter()
        .filter(|p| {
            bat_band.contains(p.bat_speed) && cmj_band.is_none_or(|b| b.contains(p.cmj_height))
        })
        .collect()
}
