//! Application error type.
//!
//! Every failure the pipeline can surface is one `AppError` variant, and each
//! variant maps to a process exit code:
//!
//! - `2`: input, configuration, unknown-level and output errors
//! - `3`: not enough data left for a level
//! - `4`: degenerate or non-finite numerics

use crate::domain::Cohort;

#[derive(Debug, Clone, thiserror::Error)]
pub enum AppError {
    /// Input file missing/unreadable, required columns absent, or no usable rows.
    #[error("Input error: {0}")]
    InputFormat(String),

    #[error(
        "Insufficient data for {level}: {n} usable record(s) after cleaning (need at least {required})."
    )]
    InsufficientData {
        level: Cohort,
        n: usize,
        required: usize,
    },

    /// Zero variance in the predictor, so the slope is undefined.
    #[error("Degenerate input for {level}: {reason}")]
    DegenerateInput { level: Cohort, reason: String },

    #[error("Unknown level '{requested}'. Levels present in input: {available}.")]
    UnknownLevel { requested: String, available: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Numeric error: {0}")]
    Numeric(String),

    #[error("Output error: {0}")]
    Output(String),
}

impl AppError {
    pub fn exit_code(&self) -> u8 {
        match self {
            AppError::InputFormat(_)
            | AppError::UnknownLevel { .. }
            | AppError::Config(_)
            | AppError::Output(_) => 2,
            AppError::InsufficientData { .. } => 3,
            AppError::DegenerateInput { .. } | AppError::Numeric(_) => 4,
        }
    }

    /// The level (or pooled cohort) this error is attributed to, if any.
    pub fn level(&self) -> Option<Cohort> {
        match self {
            AppError::InsufficientData { level, .. } | AppError::DegenerateInput { level, .. } => {
                Some(*level)
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Level;

    #[test]
    fn exit_codes_by_kind() {
        assert_eq!(AppError::InputFormat("x".into()).exit_code(), 2);
        assert_eq!(
            AppError::InsufficientData { level: Level::College.into(), n: 1, required: 2 }.exit_code(),
            3
        );
        assert_eq!(
            AppError::DegenerateInput { level: Level::College.into(), reason: "x".into() }.exit_code(),
            4
        );
        assert_eq!(
            AppError::UnknownLevel { requested: "Minors".into(), available: "College".into() }
                .exit_code(),
            2
        );
    }

    #[test]
    fn messages_carry_context() {
        let err = AppError::InsufficientData { level: Level::HighSchool.into(), n: 1, required: 2 };
        let msg = err.to_string();
        assert!(msg.contains("High School"), "{msg}");
        assert!(msg.contains("1 usable"), "{msg}");

        let err = AppError::UnknownLevel {
            requested: "Minors".into(),
            available: "College, Professional".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("Minors") && msg.contains("College, Professional"), "{msg}");

        let err = AppError::DegenerateInput { level: Cohort::AllLevels, reason: "flat".into() };
        assert_eq!(err.to_string(), "Degenerate input for All levels: flat");
        assert_eq!(err.level(), Some(Cohort::AllLevels));
    }
}
