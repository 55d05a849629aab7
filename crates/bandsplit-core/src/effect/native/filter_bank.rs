//! Linkwitz-Riley filter bank
//!
//! One edge of a crossover: either the low-pass or the high-pass half of a
//! Linkwitz-Riley 24dB/oct split, for up to [`MAX_CHANNELS`] channels.
//!
//! ## How it works
//!
//! A Linkwitz-Riley filter is created by cascading two Butterworth filters.
//! For LR24 (24dB/octave slope), we cascade two 12dB/oct (2-pole) Butterworth
//! filters with Q=0.707 (1/√2). The low-pass and high-pass banks built at the
//! same cutoff sum flat in magnitude across the boundary.
//!
//! Each stage is a state-variable filter (SVF), which is numerically stable
//! under cutoff modulation and yields LP and HP from the same state update.
//!
//! The bank is a plain value: `Clone` duplicates coefficients, cutoff,
//! sample rate and delay state, so a clone processes identically to the
//! original from that point on.

use crate::types::{clamp_cutoff, AudioBuffer, DEFAULT_SAMPLE_RATE, MAX_CHANNELS};

/// Number of cascaded 2-pole stages (two stages = 4th order)
const LR_STAGES: usize = 2;

/// Delay-state values smaller than this are snapped to zero after each block
const SNAP_THRESHOLD: f32 = 1.0e-8;

/// Which half of the crossover split this bank realizes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FilterKind {
    /// Passes content below the cutoff
    #[default]
    LowPass,
    /// Passes content above the cutoff
    HighPass,
}

/// SVF coefficients shared by both cascaded stages
#[derive(Debug, Clone, Copy, Default, PartialEq)]
struct SvfCoefficients {
    k: f32,
    a1: f32,
    a2: f32,
    a3: f32,
}

impl SvfCoefficients {
    /// Butterworth (Q = 1/√2) coefficients for the given cutoff
    fn butterworth(cutoff: f32, sample_rate: f32) -> Self {
        // Keep the warped frequency below Nyquist for low host rates
        let cutoff = cutoff.min(sample_rate * 0.49);
        let q = std::f32::consts::FRAC_1_SQRT_2;

        let g = (std::f32::consts::PI * cutoff / sample_rate).tan();
        let k = 1.0 / q;
        let a1 = 1.0 / (1.0 + g * (g + k));
        let a2 = g * a1;
        let a3 = g * a2;
        Self { k, a1, a2, a3 }
    }
}

/// Per-channel integrator state of one 2-pole stage
#[derive(Debug, Clone, Copy, Default, PartialEq)]
struct SvfState {
    ic1eq: [f32; MAX_CHANNELS],
    ic2eq: [f32; MAX_CHANNELS],
}

impl SvfState {
    /// Run one sample through this stage, returns (lowpass, highpass)
    #[inline]
    fn tick(&mut self, c: &SvfCoefficients, ch: usize, input: f32) -> (f32, f32) {
        let v3 = input - self.ic2eq[ch];
        let v1 = c.a1 * self.ic1eq[ch] + c.a2 * v3;
        let v2 = self.ic2eq[ch] + c.a2 * self.ic1eq[ch] + c.a3 * v3;
        self.ic1eq[ch] = 2.0 * v1 - self.ic1eq[ch];
        self.ic2eq[ch] = 2.0 * v2 - self.ic2eq[ch];

        let low = v2;
        let high = input - c.k * v1 - v2;
        (low, high)
    }

    fn snap_to_zero(&mut self) {
        for v in self.ic1eq.iter_mut().chain(self.ic2eq.iter_mut()) {
            if v.abs() < SNAP_THRESHOLD {
                *v = 0.0;
            }
        }
    }
}

/// LR24 low-pass or high-pass filter for up to [`MAX_CHANNELS`] channels
///
/// All setters clamp; nothing here can fail.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterBank {
    kind: FilterKind,
    sample_rate: f32,
    cutoff: f32,
    /// Channels processed by `process_block`
    num_channels: usize,
    coefficients: SvfCoefficients,
    stages: [SvfState; LR_STAGES],
}

impl FilterBank {
    /// Create a bank of the given kind at the given cutoff
    pub fn new(kind: FilterKind, cutoff: f32, num_channels: usize) -> Self {
        let cutoff = clamp_cutoff(cutoff);
        Self {
            kind,
            sample_rate: DEFAULT_SAMPLE_RATE,
            cutoff,
            num_channels: num_channels.clamp(1, MAX_CHANNELS),
            coefficients: SvfCoefficients::butterworth(cutoff, DEFAULT_SAMPLE_RATE),
            stages: [SvfState::default(); LR_STAGES],
        }
    }

    /// Set cutoff frequency (clamped to the legal range) and recompute coefficients
    pub fn set_cutoff_frequency(&mut self, hz: f32) {
        self.cutoff = clamp_cutoff(hz);
        self.update_coefficients();
    }

    /// Current cutoff frequency in Hz
    pub fn cutoff_frequency(&self) -> f32 {
        self.cutoff
    }

    /// Change which half of the split this bank realizes
    pub fn set_kind(&mut self, kind: FilterKind) {
        self.kind = kind;
    }

    /// The half of the split this bank realizes
    pub fn kind(&self) -> FilterKind {
        self.kind
    }

    /// Current sample rate in Hz
    pub fn sample_rate(&self) -> f32 {
        self.sample_rate
    }

    /// Number of channels this bank processes
    pub fn num_channels(&self) -> usize {
        self.num_channels
    }

    /// Configure for a new stream
    ///
    /// Channel state is statically sized, so this only records the channel
    /// count (clamped to [`MAX_CHANNELS`]), re-derives coefficients and clears
    /// the delay lines. The block size is accepted for interface symmetry
    /// with the host bridge; processing is per-sample.
    pub fn prepare(&mut self, sample_rate: f32, _max_block_size: usize, num_channels: usize) {
        self.num_channels = num_channels.clamp(1, MAX_CHANNELS);
        self.set_sample_rate(sample_rate);
        self.reset();
    }

    /// Set sample rate and recompute coefficients
    ///
    /// Non-positive or non-finite rates are ignored.
    pub fn set_sample_rate(&mut self, sample_rate: f32) {
        if sample_rate.is_finite() && sample_rate > 0.0 {
            self.sample_rate = sample_rate;
            self.update_coefficients();
        }
    }

    /// Zero all delay state
    pub fn reset(&mut self) {
        self.stages = [SvfState::default(); LR_STAGES];
    }

    /// Whether all delay state is exactly zero
    pub fn is_cleared(&self) -> bool {
        self.stages == [SvfState::default(); LR_STAGES]
    }

    /// Filter the buffer in place; each channel is independent
    ///
    /// Channels beyond this bank's channel count are left untouched.
    pub fn process_block(&mut self, buffer: &mut AudioBuffer) {
        let channels = buffer.num_channels().min(self.num_channels);
        let coefficients = self.coefficients;
        let kind = self.kind;

        for ch in 0..channels {
            for sample in buffer.channel_mut(ch).iter_mut() {
                let mut x = *sample;
                for stage in self.stages.iter_mut() {
                    let (low, high) = stage.tick(&coefficients, ch, x);
                    x = match kind {
                        FilterKind::LowPass => low,
                        FilterKind::HighPass => high,
                    };
                }
                *sample = x;
            }
        }

        for stage in self.stages.iter_mut() {
            stage.snap_to_zero();
        }
    }

    fn update_coefficients(&mut self) {
        self.coefficients = SvfCoefficients::butterworth(self.cutoff, self.sample_rate);
    }
}

impl Default for FilterBank {
    fn default() -> Self {
        Self::new(FilterKind::LowPass, 1000.0, MAX_CHANNELS)
    }
}
