//! A single frequency band
//!
//! A band owns two sets of LR24 edge filters, one prepared for a mono stream
//! and one for a stereo stream. Both stay current on every cutoff or sample
//! rate change, so switching layouts never recomputes anything.

use super::native::{FilterBank, FilterKind};
use super::{ChainHandle, ProcessContext};
use crate::types::{
    clamp_cutoff, AudioBuffer, DEFAULT_SAMPLE_RATE, MAX_CUTOFF_HZ, MIN_CUTOFF_HZ,
};

/// Sample rates closer than this are considered equal
const SAMPLE_RATE_TOLERANCE: f32 = 1.0e-3;

/// Position of a band in the crossover, which selects its filter combination
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BandType {
    /// Lowest band: low-pass at the high edge only
    Lower,
    /// Inner band: high-pass at the low edge, then low-pass at the high edge
    #[default]
    Middle,
    /// Highest band: high-pass at the low edge only
    Upper,
}

/// Edge filters for one channel layout
#[derive(Debug, Clone, PartialEq)]
struct EdgeFilters {
    /// High-pass at the band's low cutoff
    low_edge: FilterBank,
    /// Low-pass at the band's high cutoff
    high_edge: FilterBank,
}

impl EdgeFilters {
    fn new(low_cutoff: f32, high_cutoff: f32, num_channels: usize) -> Self {
        Self {
            low_edge: FilterBank::new(FilterKind::HighPass, low_cutoff, num_channels),
            high_edge: FilterBank::new(FilterKind::LowPass, high_cutoff, num_channels),
        }
    }

    fn process(&mut self, band_type: BandType, buffer: &mut AudioBuffer) {
        match band_type {
            BandType::Lower => self.high_edge.process_block(buffer),
            BandType::Middle => {
                self.low_edge.process_block(buffer);
                self.high_edge.process_block(buffer);
            }
            BandType::Upper => self.low_edge.process_block(buffer),
        }
    }

    fn set_sample_rate(&mut self, sample_rate: f32) {
        self.low_edge.set_sample_rate(sample_rate);
        self.high_edge.set_sample_rate(sample_rate);
    }

    fn prepare(&mut self, sample_rate: f32, max_block_size: usize) {
        let channels = self.low_edge.num_channels();
        self.low_edge.prepare(sample_rate, max_block_size, channels);
        self.high_edge.prepare(sample_rate, max_block_size, channels);
    }

    fn reset(&mut self) {
        self.low_edge.reset();
        self.high_edge.reset();
    }

    fn is_cleared(&self) -> bool {
        self.low_edge.is_cleared() && self.high_edge.is_cleared()
    }
}

/// One frequency-limited signal path with an optional chain
///
/// Invariant: `low_cutoff <= high_cutoff` after every setter.
#[derive(Debug, Clone)]
pub struct Band {
    low_cutoff: f32,
    high_cutoff: f32,
    band_type: BandType,
    active: bool,
    muted: bool,
    stereo: bool,
    sample_rate: f32,
    mono: EdgeFilters,
    stereo_filters: EdgeFilters,
    chain: Option<ChainHandle>,
}

impl Band {
    /// Create a band spanning `low_cutoff..high_cutoff`
    pub fn new(band_type: BandType, low_cutoff: f32, high_cutoff: f32) -> Self {
        let low = clamp_cutoff(low_cutoff);
        let high = clamp_cutoff(high_cutoff).max(low);
        Self {
            low_cutoff: low,
            high_cutoff: high,
            band_type,
            active: true,
            muted: false,
            stereo: true,
            sample_rate: DEFAULT_SAMPLE_RATE,
            mono: EdgeFilters::new(low, high, 1),
            stereo_filters: EdgeFilters::new(low, high, 2),
            chain: None,
        }
    }

    // ─────────────────────────────────────────────────────────────────────
    // Cutoffs
    // ─────────────────────────────────────────────────────────────────────

    /// Low edge in Hz
    pub fn low_cutoff(&self) -> f32 {
        self.low_cutoff
    }

    /// High edge in Hz
    pub fn high_cutoff(&self) -> f32 {
        self.high_cutoff
    }

    /// Set the low edge (clamped). Drags the high edge up if it would cross.
    pub fn set_low_cutoff(&mut self, hz: f32) {
        self.low_cutoff = clamp_cutoff(hz);
        self.mono.low_edge.set_cutoff_frequency(self.low_cutoff);
        self.stereo_filters.low_edge.set_cutoff_frequency(self.low_cutoff);

        if self.low_cutoff > self.high_cutoff {
            self.set_high_cutoff(self.low_cutoff);
        }
    }

    /// Set the high edge (clamped). Drags the low edge down if it would cross.
    pub fn set_high_cutoff(&mut self, hz: f32) {
        self.high_cutoff = clamp_cutoff(hz);
        self.mono.high_edge.set_cutoff_frequency(self.high_cutoff);
        self.stereo_filters
            .high_edge
            .set_cutoff_frequency(self.high_cutoff);

        if self.high_cutoff < self.low_cutoff {
            self.set_low_cutoff(self.high_cutoff);
        }
    }

    // ─────────────────────────────────────────────────────────────────────
    // Flags
    // ─────────────────────────────────────────────────────────────────────

    pub fn band_type(&self) -> BandType {
        self.band_type
    }

    pub fn set_band_type(&mut self, band_type: BandType) {
        self.band_type = band_type;
    }

    /// Whether the chain runs (an inactive band still passes its filtered signal)
    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn set_is_active(&mut self, active: bool) {
        self.active = active;
    }

    pub fn is_muted(&self) -> bool {
        self.muted
    }

    pub fn set_is_muted(&mut self, muted: bool) {
        self.muted = muted;
    }

    pub fn is_stereo(&self) -> bool {
        self.stereo
    }

    /// Select which filter set processes audio. Pure flag flip.
    pub fn set_is_stereo(&mut self, stereo: bool) {
        self.stereo = stereo;
    }

    // ─────────────────────────────────────────────────────────────────────
    // Chain
    // ─────────────────────────────────────────────────────────────────────

    pub fn chain(&self) -> Option<&ChainHandle> {
        self.chain.as_ref()
    }

    /// Attach (or with `None`, detach) a chain; returns the previous handle
    pub fn set_chain(&mut self, chain: Option<ChainHandle>) -> Option<ChainHandle> {
        std::mem::replace(&mut self.chain, chain)
    }

    /// Latency of the attached chain, 0 when none or when it is locked elsewhere
    pub fn latency_samples(&self) -> u32 {
        self.chain
            .as_ref()
            .and_then(|c| c.try_lock().map(|chain| chain.latency_samples()))
            .unwrap_or(0)
    }

    // ─────────────────────────────────────────────────────────────────────
    // Stream configuration
    // ─────────────────────────────────────────────────────────────────────

    pub fn sample_rate(&self) -> f32 {
        self.sample_rate
    }

    /// Update the sample rate, re-deriving filters only if it actually changed
    pub fn set_sample_rate(&mut self, sample_rate: f32) {
        if !(sample_rate.is_finite() && sample_rate > 0.0) {
            return;
        }
        if (sample_rate - self.sample_rate).abs() <= SAMPLE_RATE_TOLERANCE {
            return;
        }
        self.sample_rate = sample_rate;
        self.mono.set_sample_rate(sample_rate);
        self.stereo_filters.set_sample_rate(sample_rate);
    }

    /// Configure both filter sets for a new stream and clear their state
    pub fn prepare(&mut self, sample_rate: f32, max_block_size: usize) {
        if sample_rate.is_finite() && sample_rate > 0.0 {
            self.sample_rate = sample_rate;
        }
        self.mono.prepare(self.sample_rate, max_block_size);
        self.stereo_filters.prepare(self.sample_rate, max_block_size);
    }

    /// Return flags and chain to their defaults (used when the band leaves the active set)
    pub fn reset_to_defaults(&mut self) {
        self.active = true;
        self.muted = false;
        // Dropped here, released on the collector thread
        self.chain = None;
    }

    /// Clear the delay state of both filter sets
    pub fn reset(&mut self) {
        self.mono.reset();
        self.stereo_filters.reset();
    }

    /// Whether both filter sets hold no delay state
    pub fn is_cleared(&self) -> bool {
        self.mono.is_cleared() && self.stereo_filters.is_cleared()
    }

    // ─────────────────────────────────────────────────────────────────────
    // Processing
    // ─────────────────────────────────────────────────────────────────────

    /// Filter the buffer in place and hand it to the chain
    ///
    /// A muted band writes silence and skips everything else. The chain only
    /// runs when the band is active; if the chain is locked elsewhere it is
    /// skipped for this call and the filtered signal passes through.
    pub fn process_block(&mut self, buffer: &mut AudioBuffer, ctx: &ProcessContext<'_>) {
        if self.muted {
            buffer.fill_silence();
            return;
        }

        let filters = if self.stereo {
            &mut self.stereo_filters
        } else {
            &mut self.mono
        };
        filters.process(self.band_type, buffer);

        if !self.active {
            return;
        }

        if let Some(handle) = self.chain.as_ref() {
            match handle.try_lock() {
                Some(mut chain) => chain.process(buffer, ctx),
                None => log::trace!("band chain busy, passing filtered signal through"),
            }
        }
    }
}

impl Default for Band {
    fn default() -> Self {
        Self::new(BandType::Middle, MIN_CUTOFF_HZ, MAX_CUTOFF_HZ)
    }
}
