//! Real-time control plumbing for the crossover
//!
//! - `command`: lock-free command queue (control thread → audio thread)
//! - `processor`: audio-side owner of the engine and control-side handle
//! - `gc`: deferred release of chains dropped on the audio thread

pub mod command;
pub mod gc;
pub mod processor;

pub use command::{command_channel, CommandError, CrossoverCommand, COMMAND_QUEUE_CAPACITY};
pub use processor::{crossover_pair, CrossoverAtomics, CrossoverHandle, CrossoverProcessor};
