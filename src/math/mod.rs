//! Mathematical utilities: closed-form line fitting and summary statistics.

pub mod ols;
pub mod stats;

pub use ols::*;
pub use stats::*;
