//! Band processing - chains, bands, and the crossover that hosts them
//!
//! This module provides:
//! - The `ProcessingChain` seam for externally owned per-band chains
//! - Native LR24 filter banks (`native`)
//! - `Band`: one frequency-limited signal path
//! - `CrossoverEngine`: the fixed arena of bands with ordering, solo and mute
//! - `ChainParameters`: bypass/mute/solo holder with an injected observer

pub mod band;
pub mod multiband;
pub mod native;
pub mod params;

pub use band::{Band, BandType};
pub use multiband::{BandSlot, CrossoverEngine};
pub use params::{ChainParameters, ChainParamsObserver, ChainParamsState};

use std::sync::{Mutex, MutexGuard};

use basedrop::Shared;

use crate::engine::gc::gc_handle;
use crate::types::AudioBuffer;

/// A timestamped short message delivered to chains alongside audio
///
/// `frame` is relative to the start of the host buffer passed to
/// `CrossoverEngine::process_block`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChainEvent {
    /// Frame offset within the host buffer
    pub frame: u32,
    /// Raw message bytes (status, data1, data2)
    pub data: [u8; 3],
}

impl ChainEvent {
    /// Create a new event
    pub fn new(frame: u32, data: [u8; 3]) -> Self {
        Self { frame, data }
    }
}

/// Per-call context handed to a chain
///
/// When the host buffer is split into chunks, `events` holds only the events
/// inside the current chunk and `frame_offset` is the chunk's start within
/// the host buffer.
#[derive(Debug, Clone, Copy)]
pub struct ProcessContext<'a> {
    /// Events whose frame falls inside this chunk, sorted by frame
    pub events: &'a [ChainEvent],
    /// Offset of this chunk within the host buffer
    pub frame_offset: usize,
    /// Current sample rate in Hz
    pub sample_rate: f32,
}

impl<'a> ProcessContext<'a> {
    /// Context without events, starting at frame 0
    pub fn empty(sample_rate: f32) -> Self {
        Self {
            events: &[],
            frame_offset: 0,
            sample_rate,
        }
    }

    /// Position of an event relative to the start of this chunk
    #[inline]
    pub fn local_frame(&self, event: &ChainEvent) -> usize {
        (event.frame as usize).saturating_sub(self.frame_offset)
    }
}

/// A processing chain hosted by a band
///
/// Chains are owned and built outside the crossover (plugin hosts, native
/// effect racks, test doubles). The crossover only hands them the band's
/// filtered signal, in place.
pub trait ProcessingChain: Send {
    /// Process the buffer in place
    fn process(&mut self, buffer: &mut AudioBuffer, ctx: &ProcessContext<'_>);

    /// Clear any internal state (called by the owner, never by the crossover)
    fn reset(&mut self) {}

    /// Latency of this chain in samples
    fn latency_samples(&self) -> u32 {
        0
    }
}

/// Lock-protected chain storage behind a [`ChainHandle`]
pub type ChainCell = Mutex<Box<dyn ProcessingChain>>;

/// Shared, externally owned reference to a processing chain
///
/// Cloning is cheap. The engine's copy may be dropped on the audio thread:
/// the final release of the chain is deferred to the collector thread, so
/// detaching never frees memory inside the callback.
#[derive(Clone)]
pub struct ChainHandle {
    inner: Shared<ChainCell>,
}

impl ChainHandle {
    /// Wrap a chain in a new handle
    pub fn new<C: ProcessingChain + 'static>(chain: C) -> Self {
        let boxed: Box<dyn ProcessingChain> = Box::new(chain);
        Self {
            inner: Shared::new(&gc_handle(), Mutex::new(boxed)),
        }
    }

    /// Lock the chain for control-side access (blocks)
    ///
    /// A poisoned lock is recovered: the chain is still structurally valid.
    pub fn lock(&self) -> MutexGuard<'_, Box<dyn ProcessingChain>> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Try to lock the chain without blocking (RT-safe)
    pub fn try_lock(&self) -> Option<MutexGuard<'_, Box<dyn ProcessingChain>>> {
        self.inner.try_lock().ok()
    }

    /// Whether two handles refer to the same chain
    pub fn same_chain(&self, other: &ChainHandle) -> bool {
        std::ptr::eq(&*self.inner as *const ChainCell, &*other.inner as *const ChainCell)
    }
}

impl std::fmt::Debug for ChainHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChainHandle")
            .field("cell", &(&*self.inner as *const ChainCell))
            .finish()
    }
}
