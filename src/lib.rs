//! `cmj-transfer` library crate.
//!
//! The binary (`transfer`) is a thin wrapper around this library so that:
//!
//! - core logic is testable without spawning processes
//! - the cleaning, fitting and bootstrap stages can be reused on their own
//! - the force-plate jump metrics can be computed without the athlete table
//! - code stays easy to navigate as the project grows

pub mod app;
pub mod clean;
pub mod cli;
pub mod domain;
pub mod error;
pub mod fit;
pub mod force;
pub mod io;
pub mod math;
pub mod plot;
pub mod report;
