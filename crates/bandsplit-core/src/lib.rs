//! Bandsplit Core - multiband crossover with per-band processing chains

pub mod config;
pub mod effect;
pub mod engine;
pub mod types;

pub use types::*;
