//! Crossover configuration
//!
//! - `CrossoverConfig`: persisted band layout and flags
//! - `HostConfig`: stream settings passed to `prepare`
//! - Generic YAML loading/saving
//!
//! # Usage
//!
//! ```ignore
//! use bandsplit_core::config::{load_config, save_config, CrossoverConfig};
//!
//! let config: CrossoverConfig = load_config(&config_path);
//! let engine = CrossoverEngine::from_config(&config);
//! save_config(&engine.to_config(), &config_path)?;
//! ```

mod crossover;
mod io;

pub use crossover::{ConfigError, CrossoverConfig, HostConfig, DEFAULT_MAX_BLOCK_SIZE};
pub use io::{load_config, save_config};
