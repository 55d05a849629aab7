//! Real-time side and control side of a crossover
//!
//! [`crossover_pair`] splits one [`CrossoverEngine`] into:
//!
//! - [`CrossoverProcessor`]: lives in the audio callback and owns the engine
//! - [`CrossoverHandle`]: lives on the control thread, sends commands and
//!   reads back published state
//!
//! ```text
//! Control thread                         Audio thread
//! ──────────────                         ────────────
//! CrossoverHandle ──[CrossoverCommand]──→ CrossoverProcessor
//!        ↑                                   │ drain commands
//!        │                                   │ process block
//!        └──────── CrossoverAtomics ←────────┘ publish state
//! ```
//!
//! Readback lags by at most one processed block.

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
use std::sync::Arc;

use super::command::{command_channel, CommandError, CrossoverCommand};
use crate::config::HostConfig;
use crate::effect::{ChainEvent, ChainHandle, CrossoverEngine};
use crate::types::{AudioBuffer, MAX_BANDS};

/// Lock-free crossover state for the control thread
///
/// Written by the processor after each block, read from anywhere.
/// Frequencies are stored as `f32` bit patterns.
#[derive(Debug)]
pub struct CrossoverAtomics {
    num_bands: AtomicUsize,
    soloed_count: AtomicUsize,
    sample_rate: AtomicU32,
    latency_samples: AtomicU32,
    crossovers: [AtomicU32; MAX_BANDS - 1],
    active: [AtomicBool; MAX_BANDS],
    muted: [AtomicBool; MAX_BANDS],
    soloed: [AtomicBool; MAX_BANDS],
}

impl CrossoverAtomics {
    fn new() -> Self {
        Self {
            num_bands: AtomicUsize::new(0),
            soloed_count: AtomicUsize::new(0),
            sample_rate: AtomicU32::new(0),
            latency_samples: AtomicU32::new(0),
            crossovers: std::array::from_fn(|_| AtomicU32::new(0)),
            active: std::array::from_fn(|_| AtomicBool::new(false)),
            muted: std::array::from_fn(|_| AtomicBool::new(false)),
            soloed: std::array::from_fn(|_| AtomicBool::new(false)),
        }
    }

    /// Copy the engine's current state (audio thread)
    fn publish(&self, engine: &CrossoverEngine) {
        let n = engine.num_bands();

        for (i, slot) in self.crossovers.iter().enumerate() {
            slot.store(engine.crossover_frequency(i).to_bits(), Ordering::Relaxed);
        }
        for i in 0..MAX_BANDS {
            self.active[i].store(engine.is_active(i), Ordering::Relaxed);
            self.muted[i].store(engine.is_muted(i), Ordering::Relaxed);
            self.soloed[i].store(engine.is_soloed(i), Ordering::Relaxed);
        }
        self.soloed_count.store(engine.soloed_count(), Ordering::Relaxed);
        self.sample_rate
            .store(engine.sample_rate().to_bits(), Ordering::Relaxed);
        self.latency_samples
            .store(engine.latency_samples(), Ordering::Relaxed);
        // Band count last, paired with the Acquire load in `num_bands`
        self.num_bands.store(n, Ordering::Release);
    }

    #[inline]
    pub fn num_bands(&self) -> usize {
        self.num_bands.load(Ordering::Acquire)
    }

    #[inline]
    pub fn soloed_count(&self) -> usize {
        self.soloed_count.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn sample_rate(&self) -> f32 {
        f32::from_bits(self.sample_rate.load(Ordering::Relaxed))
    }

    #[inline]
    pub fn latency_samples(&self) -> u32 {
        self.latency_samples.load(Ordering::Relaxed)
    }

    /// Crossover frequency `index`, 0.0 if out of range
    pub fn crossover_frequency(&self, index: usize) -> f32 {
        match self.crossovers.get(index) {
            Some(bits) if index + 1 < self.num_bands() => {
                f32::from_bits(bits.load(Ordering::Relaxed))
            }
            _ => 0.0,
        }
    }

    pub fn is_active(&self, band: usize) -> bool {
        self.flag(&self.active, band)
    }

    pub fn is_muted(&self, band: usize) -> bool {
        self.flag(&self.muted, band)
    }

    pub fn is_soloed(&self, band: usize) -> bool {
        self.flag(&self.soloed, band)
    }

    fn flag(&self, flags: &[AtomicBool; MAX_BANDS], band: usize) -> bool {
        band < self.num_bands() && flags[band].load(Ordering::Relaxed)
    }
}

/// Audio-thread owner of a crossover engine
pub struct CrossoverProcessor {
    engine: CrossoverEngine,
    commands: rtrb::Consumer<CrossoverCommand>,
    atomics: Arc<CrossoverAtomics>,
}

impl CrossoverProcessor {
    /// Apply every pending command (never blocks)
    pub fn process_commands(&mut self) {
        while let Ok(cmd) = self.commands.pop() {
            self.apply(cmd);
        }
    }

    fn apply(&mut self, cmd: CrossoverCommand) {
        let engine = &mut self.engine;
        match cmd {
            CrossoverCommand::SetCrossoverFrequency { index, hz } => {
                engine.set_crossover_frequency(index, hz)
            }
            CrossoverCommand::AddBand => engine.add_band(),
            CrossoverCommand::RemoveBand => engine.remove_band(),
            CrossoverCommand::SetActive { band, active } => engine.set_is_active(band, active),
            CrossoverCommand::SetMuted { band, muted } => engine.set_is_muted(band, muted),
            CrossoverCommand::SetSoloed { band, soloed } => engine.set_is_soloed(band, soloed),
            CrossoverCommand::SetFlags {
                band,
                active,
                muted,
                soloed,
            } => {
                engine.set_is_active(band, active);
                engine.set_is_muted(band, muted);
                engine.set_is_soloed(band, soloed);
            }
            CrossoverCommand::SetChain { band, chain } => {
                // Previous handle dropped here; release happens on the collector
                let _ = engine.set_chain(band, chain);
            }
            CrossoverCommand::SetSampleRate(hz) => engine.set_sample_rate(hz),
            CrossoverCommand::Prepare(host) => engine.prepare(&host),
            CrossoverCommand::Reset => engine.reset(),
        }
    }

    /// Drain commands, process one host buffer in place, publish state
    pub fn process_block(&mut self, buffer: &mut AudioBuffer, events: &[ChainEvent]) {
        self.process_commands();
        self.engine.process_block(buffer, events);
        self.atomics.publish(&self.engine);
    }

    /// The engine, for inspection on the audio thread
    pub fn engine(&self) -> &CrossoverEngine {
        &self.engine
    }

    /// Take the engine back, discarding any unapplied commands
    pub fn into_engine(self) -> CrossoverEngine {
        self.engine
    }
}

/// Control-thread side of a crossover
pub struct CrossoverHandle {
    commands: rtrb::Producer<CrossoverCommand>,
    atomics: Arc<CrossoverAtomics>,
}

impl CrossoverHandle {
    /// Queue a command for the next processed block
    pub fn send(&mut self, cmd: CrossoverCommand) -> Result<(), CommandError> {
        self.commands.push(cmd).map_err(|_| {
            log::warn!("Crossover command queue full, command dropped");
            CommandError::QueueFull
        })
    }

    pub fn set_crossover_frequency(&mut self, index: usize, hz: f32) -> Result<(), CommandError> {
        self.send(CrossoverCommand::SetCrossoverFrequency { index, hz })
    }

    pub fn add_band(&mut self) -> Result<(), CommandError> {
        self.send(CrossoverCommand::AddBand)
    }

    pub fn remove_band(&mut self) -> Result<(), CommandError> {
        self.send(CrossoverCommand::RemoveBand)
    }

    pub fn set_is_active(&mut self, band: usize, active: bool) -> Result<(), CommandError> {
        self.send(CrossoverCommand::SetActive { band, active })
    }

    pub fn set_is_muted(&mut self, band: usize, muted: bool) -> Result<(), CommandError> {
        self.send(CrossoverCommand::SetMuted { band, muted })
    }

    pub fn set_is_soloed(&mut self, band: usize, soloed: bool) -> Result<(), CommandError> {
        self.send(CrossoverCommand::SetSoloed { band, soloed })
    }

    /// Set active, mute and solo of one band in a single command
    pub fn set_flags(
        &mut self,
        band: usize,
        active: bool,
        muted: bool,
        soloed: bool,
    ) -> Result<(), CommandError> {
        self.send(CrossoverCommand::SetFlags {
            band,
            active,
            muted,
            soloed,
        })
    }

    pub fn set_chain(&mut self, band: usize, chain: Option<ChainHandle>) -> Result<(), CommandError> {
        self.send(CrossoverCommand::SetChain { band, chain })
    }

    pub fn set_sample_rate(&mut self, sample_rate: f32) -> Result<(), CommandError> {
        self.send(CrossoverCommand::SetSampleRate(sample_rate))
    }

    pub fn prepare(&mut self, host: HostConfig) -> Result<(), CommandError> {
        self.send(CrossoverCommand::Prepare(host))
    }

    pub fn reset(&mut self) -> Result<(), CommandError> {
        self.send(CrossoverCommand::Reset)
    }

    /// Published state (as of the last processed block)
    pub fn atomics(&self) -> &Arc<CrossoverAtomics> {
        &self.atomics
    }

    pub fn num_bands(&self) -> usize {
        self.atomics.num_bands()
    }

    pub fn soloed_count(&self) -> usize {
        self.atomics.soloed_count()
    }

    pub fn crossover_frequency(&self, index: usize) -> f32 {
        self.atomics.crossover_frequency(index)
    }

    pub fn is_active(&self, band: usize) -> bool {
        self.atomics.is_active(band)
    }

    pub fn is_muted(&self, band: usize) -> bool {
        self.atomics.is_muted(band)
    }

    pub fn is_soloed(&self, band: usize) -> bool {
        self.atomics.is_soloed(band)
    }

    pub fn latency_samples(&self) -> u32 {
        self.atomics.latency_samples()
    }
}

/// Split an engine into a connected control handle and audio processor
pub fn crossover_pair(engine: CrossoverEngine) -> (CrossoverHandle, CrossoverProcessor) {
    let (producer, consumer) = command_channel();
    let atomics = Arc::new(CrossoverAtomics::new());
    atomics.publish(&engine);

    let handle = CrossoverHandle {
        commands: producer,
        atomics: Arc::clone(&atomics),
    };
    let processor = CrossoverProcessor {
        engine,
        commands: consumer,
        atomics,
    };
    (handle, processor)
}
