//! Lock-free command queue from the control thread to the audio thread
//!
//! Every mutating crossover operation has a command variant. The control
//! side pushes commands without blocking; the audio thread drains the whole
//! queue at the start of each block, so everything queued before a block
//! applies together and a partially applied cascade is never heard.

use thiserror::Error;

use crate::config::HostConfig;
use crate::effect::ChainHandle;

/// Commands sent from the control thread to the crossover processor
#[derive(Debug)]
pub enum CrossoverCommand {
    // ─────────────────────────────────────────────────────────────
    // Layout
    // ─────────────────────────────────────────────────────────────
    /// Move a crossover boundary (with ordering repair)
    SetCrossoverFrequency { index: usize, hz: f32 },
    /// Append a band at the top
    AddBand,
    /// Remove the top band
    RemoveBand,

    // ─────────────────────────────────────────────────────────────
    // Band flags
    // ─────────────────────────────────────────────────────────────
    SetActive { band: usize, active: bool },
    SetMuted { band: usize, muted: bool },
    SetSoloed { band: usize, soloed: bool },
    /// Set active, mute and solo of one band together
    SetFlags {
        band: usize,
        active: bool,
        muted: bool,
        soloed: bool,
    },

    /// Attach or detach a band's chain
    ///
    /// The replaced handle is dropped on the audio thread; the chain itself is
    /// released by the collector.
    SetChain {
        band: usize,
        chain: Option<ChainHandle>,
    },

    // ─────────────────────────────────────────────────────────────
    // Stream
    // ─────────────────────────────────────────────────────────────
    SetSampleRate(f32),
    Prepare(HostConfig),
    /// Clear filter state of all active bands
    Reset,
}

/// Errors returned when sending a command
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandError {
    /// The audio thread has not drained the queue fast enough
    #[error("Crossover command queue is full")]
    QueueFull,
}

/// Capacity of the command queue
///
/// Restoring a full layout is under 40 commands; a dragged crossover knob
/// sends one per UI frame.
pub const COMMAND_QUEUE_CAPACITY: usize = 256;

/// Create a new command channel (producer/consumer pair)
///
/// The producer belongs to the control thread, the consumer to the audio
/// thread.
pub fn command_channel() -> (
    rtrb::Producer<CrossoverCommand>,
    rtrb::Consumer<CrossoverCommand>,
) {
    rtrb::RingBuffer::new(COMMAND_QUEUE_CAPACITY)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_channel_roundtrip() {
        let (mut tx, mut rx) = command_channel();
        tx.push(CrossoverCommand::SetMuted {
            band: 1,
            muted: true,
        })
        .unwrap();

        let cmd = rx.pop().unwrap();
        assert!(matches!(
            cmd,
            CrossoverCommand::SetMuted {
                band: 1,
                muted: true
            }
        ));
        assert!(rx.pop().is_err());
    }

    #[test]
    fn test_command_channel_capacity() {
        let (mut tx, _rx) = command_channel();
        for _ in 0..COMMAND_QUEUE_CAPACITY {
            tx.push(CrossoverCommand::Reset).unwrap();
        }
        assert!(tx.push(CrossoverCommand::Reset).is_err());
    }

    #[test]
    fn test_command_size() {
        // HostConfig is the largest payload; keep commands within a cache line
        let size = std::mem::size_of::<CrossoverCommand>();
        assert!(size <= 32, "CrossoverCommand is {} bytes, expected <= 32", size);
    }
}
