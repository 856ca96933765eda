//! Input/output helpers.
//!
//! - CSV ingest + validation (`ingest`)
//! - force-plate trace loading (`force`)
//! - optional TOML configuration file (`config`)
//! - result exports (CSV/JSON) with atomic writes (`export`)

pub mod config;
pub mod export;
pub mod force;
pub mod ingest;

pub use config::*;
pub use export::*;
pub use force::*;
pub use ingest::*;
