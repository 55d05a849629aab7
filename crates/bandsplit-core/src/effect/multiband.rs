//! Multiband Crossover Engine
//!
//! Splits one multichannel stream into N parallel bands, runs each band's
//! filter set and optional chain, and sums the results back.
//!
//! # Architecture
//!
//! ```text
//!         ┌→ Band 0 (LOWER:  LP@b0)        → [Chain] → ┐
//! Input → ├→ Band 1 (MIDDLE: HP@b0, LP@b1) → [Chain] → ├→ Sum → Output
//!         └→ Band N-1 (UPPER: HP@bN-2)     → [Chain] → ┘
//! ```
//!
//! All [`MAX_BANDS`] band slots are built up front. Adding or removing a band
//! only moves the active-count cursor over that arena, so the audio path
//! never allocates.
//!
//! # Boundary ordering
//!
//! Boundary `i` is shared by band `i` (its high cutoff) and band `i + 1`
//! (its low cutoff). Boundaries are kept non-decreasing: moving one past a
//! neighbour drags the neighbour to the same frequency, cascading as far as
//! needed. The most recent request always wins.
//!
//! # Solo
//!
//! Solo-in-place: while any band is soloed, only soloed bands are processed
//! and summed. Non-soloed bands are skipped entirely.

use super::band::{Band, BandType};
use super::{ChainEvent, ChainHandle, ProcessContext};
use crate::config::{CrossoverConfig, HostConfig};
use crate::types::{
    clamp_cutoff, AudioBuffer, DEFAULT_BANDS, DEFAULT_CROSSOVERS, DEFAULT_SAMPLE_RATE,
    MAX_BANDS, MAX_CHANNELS, MAX_CUTOFF_HZ, MIN_BANDS, MIN_CUTOFF_HZ, SCRATCH_FRAMES,
};

/// A band plus its solo flag and scratch buffer
#[derive(Debug)]
pub struct BandSlot {
    band: Band,
    soloed: bool,
    /// Working buffer, capacity [`SCRATCH_FRAMES`] x [`MAX_CHANNELS`]
    scratch: AudioBuffer,
}

impl BandSlot {
    fn new(band: Band) -> Self {
        Self {
            band,
            soloed: false,
            scratch: AudioBuffer::with_capacity(MAX_CHANNELS, SCRATCH_FRAMES),
        }
    }

    pub fn band(&self) -> &Band {
        &self.band
    }

    pub fn is_soloed(&self) -> bool {
        self.soloed
    }
}

/// The band/crossover engine
///
/// Every operation is total: out-of-range indices are ignored, out-of-range
/// frequencies are clamped and ordering conflicts are repaired.
#[derive(Debug)]
pub struct CrossoverEngine {
    slots: [BandSlot; MAX_BANDS],
    num_bands: usize,
    soloed_count: usize,
    sample_rate: f32,
    num_channels: usize,
}

impl CrossoverEngine {
    /// Create an engine with [`DEFAULT_BANDS`] bands at the default layout
    pub fn new() -> Self {
        Self::with_bands(DEFAULT_BANDS)
    }

    /// Create an engine with `num_bands` bands (clamped) at the default layout
    pub fn with_bands(num_bands: usize) -> Self {
        let num_bands = num_bands.clamp(MIN_BANDS, MAX_BANDS);

        let slots = std::array::from_fn(|i| {
            let low = if i == 0 { MIN_CUTOFF_HZ } else { DEFAULT_CROSSOVERS[i - 1] };
            let high = if i + 1 >= num_bands {
                MAX_CUTOFF_HZ
            } else {
                DEFAULT_CROSSOVERS[i]
            };
            let band_type = if i == 0 {
                BandType::Lower
            } else if i + 1 == num_bands {
                BandType::Upper
            } else {
                BandType::Middle
            };
            BandSlot::new(Band::new(band_type, low, high))
        });

        Self {
            slots,
            num_bands,
            soloed_count: 0,
            sample_rate: DEFAULT_SAMPLE_RATE,
            num_channels: MAX_CHANNELS,
        }
    }

    /// Build an engine from a configuration
    ///
    /// An invalid configuration is logged and replaced by defaults.
    pub fn from_config(config: &CrossoverConfig) -> Self {
        let config = match config.validate() {
            Ok(()) => config.clone(),
            Err(e) => {
                log::warn!("from_config: {}, using defaults", e);
                CrossoverConfig::default()
            }
        };

        let mut engine = Self::new();
        engine.prepare(&config.host());
        while engine.num_bands < config.num_bands {
            engine.add_band();
        }
        while engine.num_bands > config.num_bands {
            engine.remove_band();
        }
        for (i, &hz) in config
            .crossover_frequencies
            .iter()
            .take(engine.num_bands - 1)
            .enumerate()
        {
            engine.set_crossover_frequency(i, hz);
        }
        for &band in &config.muted {
            engine.set_is_muted(band, true);
        }
        for &band in &config.soloed {
            engine.set_is_soloed(band, true);
        }
        engine
    }

    /// Snapshot the current layout as a configuration
    pub fn to_config(&self) -> CrossoverConfig {
        let active = &self.slots[..self.num_bands];
        CrossoverConfig {
            num_bands: self.num_bands,
            crossover_frequencies: self.crossover_frequencies(),
            sample_rate: self.sample_rate,
            channels: self.num_channels,
            muted: (0..self.num_bands).filter(|&i| active[i].band.is_muted()).collect(),
            soloed: (0..self.num_bands).filter(|&i| active[i].soloed).collect(),
            ..CrossoverConfig::default()
        }
    }

    // ─────────────────────────────────────────────────────────────────────
    // Accessors
    // ─────────────────────────────────────────────────────────────────────

    /// Number of active bands
    pub fn num_bands(&self) -> usize {
        self.num_bands
    }

    /// Number of active bands currently soloed
    pub fn soloed_count(&self) -> usize {
        self.soloed_count
    }

    pub fn sample_rate(&self) -> f32 {
        self.sample_rate
    }

    pub fn num_channels(&self) -> usize {
        self.num_channels
    }

    fn slot(&self, index: usize) -> Option<&BandSlot> {
        self.slots[..self.num_bands].get(index)
    }

    fn slot_mut(&mut self, index: usize) -> Option<&mut BandSlot> {
        self.slots[..self.num_bands].get_mut(index)
    }

    /// Active band slot at `index`
    pub fn band_slot(&self, index: usize) -> Option<&BandSlot> {
        self.slot(index)
    }

    /// Low cutoff of a band, 0.0 if out of range
    pub fn low_cutoff(&self, index: usize) -> f32 {
        self.slot(index).map(|s| s.band.low_cutoff()).unwrap_or(0.0)
    }

    /// High cutoff of a band, 0.0 if out of range
    pub fn high_cutoff(&self, index: usize) -> f32 {
        self.slot(index).map(|s| s.band.high_cutoff()).unwrap_or(0.0)
    }

    pub fn band_type(&self, index: usize) -> Option<BandType> {
        self.slot(index).map(|s| s.band.band_type())
    }

    pub fn is_active(&self, index: usize) -> bool {
        self.slot(index).map(|s| s.band.is_active()).unwrap_or(false)
    }

    pub fn is_muted(&self, index: usize) -> bool {
        self.slot(index).map(|s| s.band.is_muted()).unwrap_or(false)
    }

    pub fn is_soloed(&self, index: usize) -> bool {
        self.slot(index).map(|s| s.soloed).unwrap_or(false)
    }

    pub fn chain(&self, index: usize) -> Option<&ChainHandle> {
        self.slot(index).and_then(|s| s.band.chain())
    }

    /// Crossover frequency between band `index` and `index + 1`, 0.0 if out of range
    pub fn crossover_frequency(&self, index: usize) -> f32 {
        if index + 1 < self.num_bands {
            self.slots[index].band.high_cutoff()
        } else {
            0.0
        }
    }

    /// All active crossover frequencies, lowest first
    pub fn crossover_frequencies(&self) -> Vec<f32> {
        (0..self.num_bands - 1)
            .map(|i| self.crossover_frequency(i))
            .collect()
    }

    /// Worst-case chain latency across active bands
    pub fn latency_samples(&self) -> u32 {
        self.slots[..self.num_bands]
            .iter()
            .map(|s| s.band.latency_samples())
            .max()
            .unwrap_or(0)
    }

    // ─────────────────────────────────────────────────────────────────────
    // Crossover configuration
    // ─────────────────────────────────────────────────────────────────────

    /// Move crossover `index` to `hz`, repairing ordering of every other boundary
    ///
    /// Out-of-range indices are ignored. Boundaries left on the wrong side of
    /// `hz` are moved to `hz` as well.
    pub fn set_crossover_frequency(&mut self, index: usize, hz: f32) {
        if index + 1 >= self.num_bands {
            return;
        }

        let hz = clamp_cutoff(hz);
        self.slots[index].band.set_high_cutoff(hz);
        self.slots[index + 1].band.set_low_cutoff(hz);

        for j in 0..self.num_bands - 1 {
            if j == index {
                continue;
            }
            // Below the moved boundary, look at the lower band's edge; above
            // it, the upper band's edge. A local repair inside a band may have
            // moved exactly that edge.
            let out_of_order = if j < index {
                self.slots[j].band.high_cutoff() > hz
            } else {
                self.slots[j + 1].band.low_cutoff() < hz
            };
            if out_of_order {
                self.set_crossover_frequency(j, hz);
            }
        }
    }

    /// Set a band's low cutoff, which is the boundary below it
    ///
    /// Band 0's low edge is fixed at the floor; setting it is a no-op.
    pub fn set_low_cutoff(&mut self, index: usize, hz: f32) {
        if index > 0 {
            self.set_crossover_frequency(index - 1, hz);
        }
    }

    /// Set a band's high cutoff, which is the boundary above it
    ///
    /// The top band's high edge is fixed at the ceiling; setting it is a no-op.
    pub fn set_high_cutoff(&mut self, index: usize, hz: f32) {
        self.set_crossover_frequency(index, hz);
    }

    /// Activate the next band slot as the new top band
    ///
    /// The new boundary goes halfway between the previous top boundary and
    /// the ceiling. If the previous top boundary already sits at the ceiling,
    /// it moves halfway between its lower neighbour (or the floor) and the
    /// ceiling, and the new boundary takes the ceiling.
    pub fn add_band(&mut self) {
        if self.num_bands >= MAX_BANDS {
            return;
        }

        let old_top = self.num_bands - 1;
        let previous_boundary = self.crossover_frequency(old_top - 1);

        self.slots[old_top].band.set_band_type(BandType::Middle);

        let new_top = self.num_bands;
        {
            let slot = &mut self.slots[new_top];
            slot.soloed = false;
            slot.band.set_band_type(BandType::Upper);
            slot.band.set_high_cutoff(MAX_CUTOFF_HZ);
        }
        self.num_bands += 1;

        let new_boundary = new_top - 1;
        if previous_boundary < MAX_CUTOFF_HZ {
            let hz = previous_boundary + (MAX_CUTOFF_HZ - previous_boundary) * 0.5;
            self.set_crossover_frequency(new_boundary, hz);
        } else {
            let below = if new_boundary >= 2 {
                self.crossover_frequency(new_boundary - 2)
            } else {
                MIN_CUTOFF_HZ
            };
            let moved = below + (MAX_CUTOFF_HZ - below) * 0.5;
            self.set_crossover_frequency(new_boundary - 1, moved);
            self.set_crossover_frequency(new_boundary, MAX_CUTOFF_HZ);
        }

        log::debug!(
            "add_band: {} bands, new boundary at {:.1} Hz",
            self.num_bands,
            self.crossover_frequency(new_boundary)
        );
        self.reset();
    }

    /// Deactivate the top band slot
    ///
    /// The removed slot returns to defaults: active, unmuted, unsoloed, no chain.
    pub fn remove_band(&mut self) {
        if self.num_bands <= MIN_BANDS {
            return;
        }

        let old_top = self.num_bands - 1;
        {
            let slot = &mut self.slots[old_top];
            if slot.soloed {
                slot.soloed = false;
                self.soloed_count -= 1;
            }
            slot.band.reset_to_defaults();
        }
        self.num_bands -= 1;

        let new_top = &mut self.slots[self.num_bands - 1].band;
        new_top.set_band_type(BandType::Upper);
        new_top.set_high_cutoff(MAX_CUTOFF_HZ);

        log::debug!("remove_band: {} bands", self.num_bands);
        self.reset();
    }

    // ─────────────────────────────────────────────────────────────────────
    // Band flags and chains
    // ─────────────────────────────────────────────────────────────────────

    /// Solo or unsolo a band; the soloed count moves by exactly one on change
    pub fn set_is_soloed(&mut self, index: usize, soloed: bool) {
        let Some(slot) = self.slot_mut(index) else {
            return;
        };
        if slot.soloed == soloed {
            return;
        }
        slot.soloed = soloed;
        if soloed {
            self.soloed_count += 1;
        } else {
            self.soloed_count -= 1;
        }
    }

    pub fn set_is_active(&mut self, index: usize, active: bool) {
        if let Some(slot) = self.slot_mut(index) {
            slot.band.set_is_active(active);
        }
    }

    pub fn set_is_muted(&mut self, index: usize, muted: bool) {
        if let Some(slot) = self.slot_mut(index) {
            slot.band.set_is_muted(muted);
        }
    }

    /// Attach or detach a band's chain, returning the previous handle
    pub fn set_chain(&mut self, index: usize, chain: Option<ChainHandle>) -> Option<ChainHandle> {
        self.slot_mut(index).and_then(|slot| slot.band.set_chain(chain))
    }

    // ─────────────────────────────────────────────────────────────────────
    // Stream configuration
    // ─────────────────────────────────────────────────────────────────────

    /// Apply host stream settings to every band slot and clear filter state
    pub fn prepare(&mut self, host: &HostConfig) {
        if host.sample_rate.is_finite() && host.sample_rate > 0.0 {
            self.sample_rate = host.sample_rate;
        }
        self.num_channels = host.channels.clamp(1, MAX_CHANNELS);
        let stereo = self.num_channels > 1;

        for slot in self.slots.iter_mut() {
            slot.band.prepare(self.sample_rate, host.max_block_size);
            slot.band.set_is_stereo(stereo);
            slot.scratch.set_num_channels(self.num_channels);
        }

        log::debug!(
            "prepare: {} Hz, {} channel(s), block {}",
            self.sample_rate,
            self.num_channels,
            host.max_block_size
        );
    }

    /// Forward a sample-rate change to every band slot
    pub fn set_sample_rate(&mut self, sample_rate: f32) {
        if !(sample_rate.is_finite() && sample_rate > 0.0) {
            return;
        }
        self.sample_rate = sample_rate;
        for slot in self.slots.iter_mut() {
            slot.band.set_sample_rate(sample_rate);
        }
    }

    /// Clear filter state of every active band
    pub fn reset(&mut self) {
        for slot in self.slots[..self.num_bands].iter_mut() {
            slot.band.reset();
        }
    }

    // ─────────────────────────────────────────────────────────────────────
    // Processing
    // ─────────────────────────────────────────────────────────────────────

    /// Process a host buffer in place
    ///
    /// The buffer is handled in chunks of at most [`SCRATCH_FRAMES`] frames.
    /// `events` must be sorted by frame; each chain sees only the events of
    /// the chunk it is processing.
    ///
    /// Only the channels the engine was prepared for are filtered and summed.
    /// Extra host channels come out silent.
    pub fn process_block(&mut self, buffer: &mut AudioBuffer, events: &[ChainEvent]) {
        let total = buffer.len();
        let channels = buffer.num_channels().min(self.num_channels);
        let solo_active = self.soloed_count > 0;
        let mut offset = 0;

        while offset < total {
            let len = (total - offset).min(SCRATCH_FRAMES);
            let ctx = ProcessContext {
                events: events_in_range(events, offset, offset + len),
                frame_offset: offset,
                sample_rate: self.sample_rate,
            };

            for slot in self.slots[..self.num_bands].iter_mut() {
                if solo_active && !slot.soloed {
                    continue;
                }
                slot.scratch.copy_range_from(buffer, offset, len);
                slot.scratch.set_num_channels(channels);
                slot.band.process_block(&mut slot.scratch, &ctx);
                // A chain may have resized its view of the scratch buffer
                slot.scratch.set_num_channels(channels);
                slot.scratch.set_len_from_capacity(len);
            }

            buffer.clear_range(offset, len);
            for slot in self.slots[..self.num_bands].iter() {
                if solo_active && !slot.soloed {
                    continue;
                }
                slot.scratch.add_into_range(buffer, offset);
            }

            offset += len;
        }
    }
}

impl Default for CrossoverEngine {
    fn default() -> Self {
        Self::new()
    }
}

/// Events with `start <= frame < end` from a frame-sorted slice
fn events_in_range(events: &[ChainEvent], start: usize, end: usize) -> &[ChainEvent] {
    let first = events.partition_point(|e| (e.frame as usize) < start);
    let last = events.partition_point(|e| (e.frame as usize) < end);
    &events[first..last.max(first)]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::effect::test_chains::{DcOffset, EventRecorder, Gain, OnePole, Resizer};
    use proptest::prelude::*;
    use std::sync::{Arc, Mutex};

    /// Check every structural invariant of the engine
    fn assert_invariants(engine: &CrossoverEngine) {
        let n = engine.num_bands();
        assert!((MIN_BANDS..=MAX_BANDS).contains(&n));

        assert_eq!(engine.band_type(0), Some(BandType::Lower));
        assert_eq!(engine.band_type(n - 1), Some(BandType::Upper));
        for i in 1..n - 1 {
            assert_eq!(engine.band_type(i), Some(BandType::Middle));
        }

        for i in 0..n - 1 {
            let b = engine.crossover_frequency(i);
            assert_eq!(b, engine.high_cutoff(i), "boundary {} vs band high", i);
            assert_eq!(b, engine.low_cutoff(i + 1), "boundary {} vs next band low", i);
            if i > 0 {
                assert!(engine.crossover_frequency(i - 1) <= b, "boundaries out of order");
            }
        }

        for i in 0..n {
            assert!(engine.low_cutoff(i) <= engine.high_cutoff(i));
        }

        let soloed = (0..n).filter(|&i| engine.is_soloed(i)).count();
        assert_eq!(engine.soloed_count(), soloed);
    }

    fn noise(len: usize, seed: u32) -> Vec<f32> {
        let mut state = seed.wrapping_mul(747796405).wrapping_add(2891336453);
        (0..len)
            .map(|_| {
                state ^= state << 13;
                state ^= state >> 17;
                state ^= state << 5;
                (state as f32 / u32::MAX as f32) * 2.0 - 1.0
            })
            .collect()
    }

    fn stereo_noise(len: usize) -> AudioBuffer {
        AudioBuffer::from_channels(&[&noise(len, 1), &noise(len, 2)])
    }

    #[test]
    fn test_default_layout() {
        let engine = CrossoverEngine::new();
        assert_eq!(engine.num_bands(), DEFAULT_BANDS);
        assert_eq!(engine.crossover_frequency(0), DEFAULT_CROSSOVERS[0]);
        assert_eq!(engine.crossover_frequency(1), DEFAULT_CROSSOVERS[1]);
        assert_eq!(engine.low_cutoff(0), MIN_CUTOFF_HZ);
        assert_eq!(engine.high_cutoff(2), MAX_CUTOFF_HZ);
        assert_invariants(&engine);
    }

    #[test]
    fn test_band_count_is_clamped() {
        assert_eq!(CrossoverEngine::with_bands(0).num_bands(), MIN_BANDS);
        assert_eq!(CrossoverEngine::with_bands(100).num_bands(), MAX_BANDS);
    }

    #[test]
    fn test_out_of_range_getters_return_defaults() {
        let engine = CrossoverEngine::new();
        assert_eq!(engine.crossover_frequency(2), 0.0);
        assert_eq!(engine.low_cutoff(3), 0.0);
        assert_eq!(engine.high_cutoff(99), 0.0);
        assert_eq!(engine.band_type(3), None);
        assert!(!engine.is_active(3));
        assert!(!engine.is_muted(3));
        assert!(!engine.is_soloed(3));
        assert!(engine.chain(3).is_none());
    }

    #[test]
    fn test_out_of_range_crossover_is_ignored() {
        let mut engine = CrossoverEngine::new();
        let before = engine.crossover_frequencies();
        engine.set_crossover_frequency(2, 5000.0);
        engine.set_crossover_frequency(usize::MAX - 1, 5000.0);
        assert_eq!(engine.crossover_frequencies(), before);
    }

    #[test]
    fn test_crossover_frequency_is_clamped() {
        let mut engine = CrossoverEngine::new();
        engine.set_crossover_frequency(0, 1.0);
        assert_eq!(engine.crossover_frequency(0), MIN_CUTOFF_HZ);
        engine.set_crossover_frequency(1, 1.0e6);
        assert_eq!(engine.crossover_frequency(1), MAX_CUTOFF_HZ);
        assert_invariants(&engine);
    }

    #[test]
    fn test_cascade_pushes_lower_boundary_down() {
        let mut engine = CrossoverEngine::new();
        engine.set_crossover_frequency(0, 5000.0);
        assert_eq!(engine.crossover_frequency(0), 5000.0);
        assert_eq!(engine.crossover_frequency(1), 5000.0);

        engine.set_crossover_frequency(1, 2000.0);
        assert_eq!(engine.crossover_frequency(0), 2000.0);
        assert_eq!(engine.crossover_frequency(1), 2000.0);
        assert_invariants(&engine);
    }

    #[test]
    fn test_cascade_across_many_boundaries() {
        let mut engine = CrossoverEngine::with_bands(MAX_BANDS);
        engine.set_crossover_frequency(0, 15000.0);
        for i in 0..5 {
            assert_eq!(engine.crossover_frequency(i), 15000.0);
        }
        assert_eq!(engine.crossover_frequency(5), 15000.0);
        assert_eq!(engine.crossover_frequency(6), 17000.0);
        assert_invariants(&engine);

        engine.set_crossover_frequency(6, 50.0);
        for i in 0..7 {
            assert_eq!(engine.crossover_frequency(i), 50.0);
        }
        assert_invariants(&engine);
    }

    #[test]
    fn test_idempotent_set() {
        let mut engine = CrossoverEngine::with_bands(5);
        engine.set_crossover_frequency(2, 4321.0);
        let before = engine.crossover_frequencies();
        for i in 0..4 {
            engine.set_crossover_frequency(i, engine.crossover_frequency(i));
        }
        assert_eq!(engine.crossover_frequencies(), before);
    }

    #[test]
    fn test_band_edge_setters_route_to_boundaries() {
        let mut engine = CrossoverEngine::new();
        engine.set_low_cutoff(1, 300.0);
        assert_eq!(engine.crossover_frequency(0), 300.0);
        engine.set_high_cutoff(1, 4000.0);
        assert_eq!(engine.crossover_frequency(1), 4000.0);

        // Outer edges are fixed
        engine.set_low_cutoff(0, 500.0);
        engine.set_high_cutoff(2, 500.0);
        assert_eq!(engine.low_cutoff(0), MIN_CUTOFF_HZ);
        assert_eq!(engine.high_cutoff(2), MAX_CUTOFF_HZ);
        assert_invariants(&engine);
    }

    #[test]
    fn test_add_band_places_boundary_halfway_to_ceiling() {
        let mut engine = CrossoverEngine::new();
        engine.add_band();

        assert_eq!(engine.num_bands(), 4);
        let expected = 1000.0 + (MAX_CUTOFF_HZ - 1000.0) * 0.5;
        assert_eq!(engine.crossover_frequency(2), expected);
        assert_eq!(engine.band_type(2), Some(BandType::Middle));
        assert_eq!(engine.band_type(3), Some(BandType::Upper));
        assert_invariants(&engine);
    }

    #[test]
    fn test_add_band_with_top_boundary_at_ceiling() {
        let mut engine = CrossoverEngine::new();
        engine.set_crossover_frequency(1, MAX_CUTOFF_HZ);
        engine.add_band();

        let b0 = DEFAULT_CROSSOVERS[0];
        assert_eq!(engine.crossover_frequency(0), b0);
        assert_eq!(engine.crossover_frequency(1), b0 + (MAX_CUTOFF_HZ - b0) * 0.5);
        assert_eq!(engine.crossover_frequency(2), MAX_CUTOFF_HZ);
        assert_invariants(&engine);
    }

    #[test]
    fn test_add_band_from_two_bands_at_ceiling() {
        let mut engine = CrossoverEngine::with_bands(2);
        engine.set_crossover_frequency(0, MAX_CUTOFF_HZ);
        engine.add_band();

        assert_eq!(
            engine.crossover_frequency(0),
            MIN_CUTOFF_HZ + (MAX_CUTOFF_HZ - MIN_CUTOFF_HZ) * 0.5
        );
        assert_eq!(engine.crossover_frequency(1), MAX_CUTOFF_HZ);
        assert_invariants(&engine);
    }

    #[test]
    fn test_add_band_at_max_is_noop() {
        let mut engine = CrossoverEngine::with_bands(MAX_BANDS);
        let before = engine.crossover_frequencies();
        engine.add_band();
        assert_eq!(engine.num_bands(), MAX_BANDS);
        assert_eq!(engine.crossover_frequencies(), before);
    }

    #[test]
    fn test_remove_band_at_min_is_noop() {
        let mut engine = CrossoverEngine::with_bands(MIN_BANDS);
        engine.remove_band();
        assert_eq!(engine.num_bands(), MIN_BANDS);
        assert_invariants(&engine);
    }

    #[test]
    fn test_topology_change_clears_filter_state() {
        let mut engine = CrossoverEngine::with_bands(4);
        let mut buffer = stereo_noise(1024);
        engine.process_block(&mut buffer, &[]);

        engine.remove_band();
        assert!((0..3).all(|i| engine.slots[i].band.is_cleared()));
        let mut silent = AudioBuffer::silence(2, 1024);
        engine.process_block(&mut silent, &[]);
        assert!(silent[0].iter().chain(silent[1].iter()).all(|s| *s == 0.0));

        // The slot that left the active set still holds its old state
        let mut buffer = stereo_noise(1024);
        engine.process_block(&mut buffer, &[]);
        assert!(!engine.slots[3].band.is_cleared());

        engine.add_band();
        assert!((0..4).all(|i| engine.slots[i].band.is_cleared()));
        let mut silent = AudioBuffer::silence(2, 1024);
        engine.process_block(&mut silent, &[]);
        assert!(silent[0].iter().chain(silent[1].iter()).all(|s| *s == 0.0));
    }

    #[test]
    fn test_add_then_remove_restores_defaults() {
        let mut engine = CrossoverEngine::new();
        engine.add_band();
        let top = engine.num_bands() - 1;
        engine.set_chain(top, Some(ChainHandle::new(Gain(2.0))));
        engine.set_is_muted(top, true);
        engine.set_is_active(top, false);

        engine.remove_band();
        assert_eq!(engine.num_bands(), DEFAULT_BANDS);
        assert_invariants(&engine);

        let slot = &engine.slots[top];
        assert!(slot.band.chain().is_none());
        assert!(!slot.band.is_muted());
        assert!(slot.band.is_active());
    }

    #[test]
    fn test_remove_soloed_top_band_keeps_count() {
        let mut engine = CrossoverEngine::with_bands(4);
        engine.set_is_soloed(3, true);
        engine.set_is_soloed(1, true);
        assert_eq!(engine.soloed_count(), 2);

        engine.remove_band();
        assert_eq!(engine.soloed_count(), 1);
        assert_invariants(&engine);
    }

    #[test]
    fn test_solo_count_moves_by_one() {
        let mut engine = CrossoverEngine::new();
        engine.set_is_soloed(1, true);
        engine.set_is_soloed(1, true);
        assert_eq!(engine.soloed_count(), 1);
        engine.set_is_soloed(5, true);
        assert_eq!(engine.soloed_count(), 1);
        engine.set_is_soloed(1, false);
        engine.set_is_soloed(1, false);
        assert_eq!(engine.soloed_count(), 0);
    }

    #[test]
    fn test_solo_outputs_only_soloed_band() {
        let mut engine = CrossoverEngine::new();
        let mut reference = engine.slots[1].band.clone();
        engine.set_is_soloed(1, true);

        let input = stereo_noise(SCRATCH_FRAMES);
        let mut output = input.clone();
        engine.process_block(&mut output, &[]);

        let mut expected = input.clone();
        reference.process_block(&mut expected, &ProcessContext::empty(DEFAULT_SAMPLE_RATE));
        assert_eq!(output[0], expected[0]);
        assert_eq!(output[1], expected[1]);
    }

    #[test]
    fn test_unsolo_restores_full_sum() {
        let mut engine = CrossoverEngine::new();
        let mut reference = CrossoverEngine::new();
        let input = stereo_noise(1024);

        engine.set_is_soloed(1, true);
        let mut scratch = input.clone();
        engine.process_block(&mut scratch, &[]);
        engine.set_is_soloed(1, false);
        engine.reset();

        let mut a = input.clone();
        let mut b = input.clone();
        engine.process_block(&mut a, &[]);
        reference.process_block(&mut b, &[]);
        assert_eq!(a[0], b[0]);
        assert_eq!(a[1], b[1]);
    }

    #[test]
    fn test_muted_band_is_exact_silence() {
        let mut engine = CrossoverEngine::new();
        engine.set_chain(1, Some(ChainHandle::new(DcOffset(0.25))));
        engine.set_is_muted(1, true);
        engine.set_is_soloed(1, true);

        let mut buffer = stereo_noise(2000);
        engine.process_block(&mut buffer, &[]);
        assert!(buffer[0].iter().chain(buffer[1].iter()).all(|s| *s == 0.0));
    }

    #[test]
    fn test_all_bands_muted_is_silent() {
        let mut engine = CrossoverEngine::with_bands(5);
        for i in 0..5 {
            engine.set_is_muted(i, true);
        }
        let mut buffer = stereo_noise(300);
        engine.process_block(&mut buffer, &[]);
        assert_eq!(buffer.peak(), 0.0);
    }

    #[test]
    fn test_bands_sum_to_allpass_magnitude() {
        // Two bands are a pure LR24 split: energy is preserved
        let mut engine = CrossoverEngine::with_bands(2);
        engine.set_crossover_frequency(0, 1000.0);
        let sine: Vec<f32> = (0..9600)
            .map(|i| (2.0 * std::f32::consts::PI * 1000.0 * i as f32 / DEFAULT_SAMPLE_RATE).sin())
            .collect();
        let mut buffer = AudioBuffer::from_channels(&[&sine]);
        engine.prepare(&HostConfig {
            channels: 1,
            ..HostConfig::default()
        });
        engine.process_block(&mut buffer, &[]);

        let rms = |s: &[f32]| (s.iter().map(|x| x * x).sum::<f32>() / s.len() as f32).sqrt();
        let ratio = rms(&buffer[0][4800..]) / rms(&sine[4800..]);
        assert!((ratio - 1.0).abs() < 0.02, "got {}", ratio);
    }

    #[test]
    fn test_chunking_equivalence() {
        let build = || {
            let mut engine = CrossoverEngine::new();
            engine.set_chain(0, Some(ChainHandle::new(OnePole { state: 0.0 })));
            engine.set_chain(2, Some(ChainHandle::new(Gain(0.5))));
            engine
        };
        let input = stereo_noise(2 * SCRATCH_FRAMES + 37);

        let mut whole = build();
        let mut one_call = input.clone();
        whole.process_block(&mut one_call, &[]);

        let mut split = build();
        let mut offset = 0;
        for len in [SCRATCH_FRAMES, SCRATCH_FRAMES, 37] {
            let mut part = AudioBuffer::with_capacity(2, len);
            part.copy_range_from(&input, offset, len);
            split.process_block(&mut part, &[]);
            for ch in 0..2 {
                assert_eq!(part[ch], one_call[ch][offset..offset + len]);
            }
            offset += len;
        }
    }

    #[test]
    fn test_events_reach_chain_per_chunk() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut engine = CrossoverEngine::new();
        engine.set_chain(
            0,
            Some(ChainHandle::new(EventRecorder {
                seen: Arc::clone(&seen),
            })),
        );

        let events = [
            ChainEvent::new(10, [0x90, 60, 100]),
            ChainEvent::new(600, [0x80, 60, 0]),
            ChainEvent::new(1100, [0xB0, 1, 64]),
            ChainEvent::new(5000, [0xB0, 1, 0]),
        ];
        let mut buffer = stereo_noise(1200);
        engine.process_block(&mut buffer, &events);

        let seen = seen.lock().unwrap();
        let frames: Vec<usize> = seen.iter().map(|(f, _)| *f).collect();
        assert_eq!(frames, vec![10, 600, 1100]);
    }

    #[test]
    fn test_soloed_out_bands_skip_chains() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut engine = CrossoverEngine::new();
        engine.set_chain(
            2,
            Some(ChainHandle::new(EventRecorder {
                seen: Arc::clone(&seen),
            })),
        );
        engine.set_is_soloed(0, true);

        let mut buffer = stereo_noise(64);
        engine.process_block(&mut buffer, &[ChainEvent::new(0, [0x90, 1, 1])]);
        assert!(seen.lock().unwrap().is_empty());
    }

    #[test]
    fn test_chain_resizing_scratch_stays_inside_host_buffer() {
        let mut engine = CrossoverEngine::new();
        let mut reference = CrossoverEngine::new();
        engine.set_chain(0, Some(ChainHandle::new(Resizer)));

        let input = stereo_noise(100);
        let mut a = input.clone();
        let mut b = input.clone();
        engine.process_block(&mut a, &[]);
        reference.process_block(&mut b, &[]);
        assert_eq!(a[0], b[0]);
        assert_eq!(a[1], b[1]);
    }

    #[test]
    fn test_mono_engine_silences_extra_host_channel() {
        let host = HostConfig {
            channels: 1,
            ..HostConfig::default()
        };
        let mut engine = CrossoverEngine::new();
        engine.prepare(&host);
        engine.set_chain(1, Some(ChainHandle::new(Resizer)));
        let mut reference = CrossoverEngine::new();
        reference.prepare(&host);

        let left = noise(700, 3);
        let mut stereo = AudioBuffer::from_channels(&[&left[..], &left[..]]);
        engine.process_block(&mut stereo, &[]);
        let mut mono = AudioBuffer::from_channels(&[&left[..]]);
        reference.process_block(&mut mono, &[]);

        assert_eq!(stereo[0], mono[0]);
        assert!(stereo[1].iter().all(|s| *s == 0.0));
    }

    #[test]
    fn test_prepare_reaches_inactive_slots() {
        let mut engine = CrossoverEngine::new();
        engine.prepare(&HostConfig {
            sample_rate: 44100.0,
            max_block_size: 256,
            channels: 1,
        });

        for slot in engine.slots.iter() {
            assert_eq!(slot.band.sample_rate(), 44100.0);
            assert!(!slot.band.is_stereo());
        }
        engine.add_band();
        assert_eq!(engine.band_slot(3).unwrap().band().sample_rate(), 44100.0);
    }

    #[test]
    fn test_latency_is_worst_band() {
        let mut engine = CrossoverEngine::new();
        assert_eq!(engine.latency_samples(), 0);
        engine.set_chain(1, Some(ChainHandle::new(Gain(1.0))));
        assert_eq!(engine.latency_samples(), 7);
    }

    #[test]
    fn test_config_roundtrip() {
        let mut engine = CrossoverEngine::with_bands(4);
        engine.set_crossover_frequency(1, 800.0);
        engine.set_is_muted(2, true);
        engine.set_is_soloed(3, true);

        let config = engine.to_config();
        let rebuilt = CrossoverEngine::from_config(&config);
        assert_eq!(rebuilt.num_bands(), 4);
        assert_eq!(rebuilt.crossover_frequencies(), engine.crossover_frequencies());
        assert!(rebuilt.is_muted(2));
        assert!(rebuilt.is_soloed(3));
        assert_invariants(&rebuilt);
    }

    #[test]
    fn test_events_in_range() {
        let events = [
            ChainEvent::new(0, [0; 3]),
            ChainEvent::new(511, [0; 3]),
            ChainEvent::new(512, [0; 3]),
        ];
        assert_eq!(events_in_range(&events, 0, 512).len(), 2);
        assert_eq!(events_in_range(&events, 512, 1024).len(), 1);
        assert!(events_in_range(&events, 2000, 2100).is_empty());
    }

    #[derive(Debug, Clone)]
    enum Op {
        SetCrossover(usize, f32),
        Add,
        Remove,
        Solo(usize, bool),
    }

    fn op_strategy() -> impl Strategy<Value = Op> {
        prop_oneof![
            6 => (0usize..MAX_BANDS, 0.0f32..25000.0).prop_map(|(i, hz)| Op::SetCrossover(i, hz)),
            1 => Just(Op::Add),
            1 => Just(Op::Remove),
            2 => (0usize..MAX_BANDS, any::<bool>()).prop_map(|(i, s)| Op::Solo(i, s)),
        ]
    }

    proptest! {
        #[test]
        fn prop_invariants_hold_after_every_op(
            bands in MIN_BANDS..=MAX_BANDS,
            ops in prop::collection::vec(op_strategy(), 1..64),
        ) {
            let mut engine = CrossoverEngine::with_bands(bands);
            for op in ops {
                match op {
                    Op::SetCrossover(i, hz) => {
                        engine.set_crossover_frequency(i, hz);
                        if i + 1 < engine.num_bands() {
                            prop_assert_eq!(engine.crossover_frequency(i), clamp_cutoff(hz));
                        }
                    }
                    Op::Add => engine.add_band(),
                    Op::Remove => engine.remove_band(),
                    Op::Solo(i, s) => engine.set_is_soloed(i, s),
                }
                assert_invariants(&engine);
            }
        }

        #[test]
        fn prop_set_to_current_value_changes_nothing(
            bands in MIN_BANDS..=MAX_BANDS,
            moves in prop::collection::vec((0usize..MAX_BANDS, 20.0f32..20000.0), 0..16),
            probe in 0usize..MAX_BANDS,
        ) {
            let mut engine = CrossoverEngine::with_bands(bands);
            for (i, hz) in moves {
                engine.set_crossover_frequency(i, hz);
            }
            let before = engine.crossover_frequencies();
            engine.set_crossover_frequency(probe, engine.crossover_frequency(probe));
            prop_assert_eq!(engine.crossover_frequencies(), before);
        }
    }
}
