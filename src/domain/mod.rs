//! Domain types used throughout the pipeline.
//!
//! This module defines:
//!
//! - competition levels (`Level`)
//! - raw and cleaned athlete observations (`AthleteRecord`, `AthletePoint`, `LevelDataset`)
//! - fit and analysis outputs (`RegressionModel`, `ResidualRecord`, `ProjectionResult`)
//! - run configuration (`AnalysisConfig`, `ColumnMap`, `CleaningOptions`, ...)
//! - force-plate jump traces and their metrics (`ForceTrace`, `ForceMetrics`)

pub mod force;
pub mod types;

pub use force::*;
pub use types::*;
