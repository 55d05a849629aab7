//! Native DSP building blocks

pub mod filter_bank;

pub use filter_bank::{FilterBank, FilterKind};
