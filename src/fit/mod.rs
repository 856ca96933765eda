//! Model fitting.
//!
//! Responsibilities:
//!
//! - fit one OLS line per competition level, plus one over all levels pooled (`level`)
//! - project a single athlete with a bootstrap interval (`bootstrap`)

pub mod bootstrap;
pub mod level;

pub use bootstrap::*;
pub use level::*;
