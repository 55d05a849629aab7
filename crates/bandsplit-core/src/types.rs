//! Common types for Bandsplit
//!
//! This module contains the engine-wide constants and the planar audio
//! buffer used by the crossover, its bands and the chains they drive.

use std::ops::{Index, IndexMut};

/// Audio sample type (32-bit float for processing)
pub type Sample = f32;

/// Default sample rate used until the host reports one
pub const DEFAULT_SAMPLE_RATE: f32 = 48000.0;

/// Lowest legal cutoff / crossover frequency in Hz
pub const MIN_CUTOFF_HZ: f32 = 20.0;

/// Highest legal cutoff / crossover frequency in Hz (the ceiling)
pub const MAX_CUTOFF_HZ: f32 = 20000.0;

/// Smallest number of active bands
///
/// Two is the smallest count where a LOWER and an UPPER band can coexist.
pub const MIN_BANDS: usize = 2;

/// Size of the pre-built band arena
pub const MAX_BANDS: usize = 8;

/// Band count of a default-constructed crossover
pub const DEFAULT_BANDS: usize = 3;

/// Maximum channel count for filter state and scratch buffers
pub const MAX_CHANNELS: usize = 2;

/// Per-band scratch capacity in frames. Host buffers longer than this are
/// processed in chunks of this size.
pub const SCRATCH_FRAMES: usize = 512;

/// Default crossover layout. An engine with N bands uses the first N-1 entries.
pub const DEFAULT_CROSSOVERS: [f32; MAX_BANDS - 1] =
    [120.0, 1000.0, 3000.0, 6000.0, 10000.0, 14000.0, 17000.0];

/// Clamp a frequency to the legal cutoff range
#[inline]
pub fn clamp_cutoff(hz: f32) -> f32 {
    if hz.is_nan() {
        return MIN_CUTOFF_HZ;
    }
    hz.clamp(MIN_CUTOFF_HZ, MAX_CUTOFF_HZ)
}

/// A planar multichannel buffer with a fixed capacity
///
/// Storage for every channel is allocated once by the constructors. After
/// that the working length and channel count only move inside the
/// pre-allocated capacity, so every method except the constructors is safe
/// to call from the audio callback.
#[derive(Debug, Clone)]
pub struct AudioBuffer {
    channels: [Vec<Sample>; MAX_CHANNELS],
    num_channels: usize,
    len: usize,
}

impl AudioBuffer {
    /// Create a buffer able to hold `frames` frames, with zero working length
    pub fn with_capacity(num_channels: usize, frames: usize) -> Self {
        Self {
            channels: std::array::from_fn(|_| vec![0.0; frames]),
            num_channels: num_channels.clamp(1, MAX_CHANNELS),
            len: 0,
        }
    }

    /// Create a buffer filled with `frames` frames of silence
    pub fn silence(num_channels: usize, frames: usize) -> Self {
        let mut buffer = Self::with_capacity(num_channels, frames);
        buffer.len = frames;
        buffer
    }

    /// Create a buffer from separate channel slices
    ///
    /// Channels beyond [`MAX_CHANNELS`] are dropped; all slices must have
    /// the same length.
    pub fn from_channels(channels: &[&[Sample]]) -> Self {
        let frames = channels.first().map(|c| c.len()).unwrap_or(0);
        let mut buffer = Self::silence(channels.len(), frames);
        for (dst, src) in buffer.channels.iter_mut().zip(channels.iter()) {
            assert_eq!(src.len(), frames, "Channel lengths must match");
            dst.copy_from_slice(src);
        }
        buffer
    }

    /// Create a buffer from interleaved samples [c0, c1, c0, c1, ...]
    pub fn from_interleaved(interleaved: &[Sample], num_channels: usize) -> Self {
        assert!(num_channels > 0, "Channel count must be positive");
        assert!(
            interleaved.len() % num_channels == 0,
            "Interleaved buffer length must be a multiple of the channel count"
        );
        let frames = interleaved.len() / num_channels;
        let mut buffer = Self::silence(num_channels, frames);
        for (frame, chunk) in interleaved.chunks_exact(num_channels).enumerate() {
            for (ch, &sample) in chunk.iter().enumerate().take(MAX_CHANNELS) {
                buffer.channels[ch][frame] = sample;
            }
        }
        buffer
    }

    /// Write the working frames to an interleaved output buffer
    ///
    /// `output_channels` may exceed the buffer's channel count; extra output
    /// channels repeat the last channel (mono fans out to stereo).
    pub fn write_interleaved(&self, output: &mut [Sample], output_channels: usize) {
        assert!(output.len() >= self.len * output_channels);
        for frame in 0..self.len {
            for ch in 0..output_channels {
                let src = ch.min(self.num_channels - 1);
                output[frame * output_channels + ch] = self.channels[src][frame];
            }
        }
    }

    /// Number of frames in the working region
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Check if the working region is empty
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of frames the buffer can hold without allocating
    #[inline]
    pub fn capacity(&self) -> usize {
        self.channels[0].len()
    }

    /// Number of channels in use
    #[inline]
    pub fn num_channels(&self) -> usize {
        self.num_channels
    }

    /// Set the channel count in use (clamped to 1..=MAX_CHANNELS, never allocates)
    pub fn set_num_channels(&mut self, num_channels: usize) {
        self.num_channels = num_channels.clamp(1, MAX_CHANNELS);
    }

    /// Set the working length of a pre-allocated buffer (real-time safe)
    ///
    /// Lengths beyond capacity are clamped.
    #[inline]
    pub fn set_len_from_capacity(&mut self, new_len: usize) {
        debug_assert!(
            new_len <= self.capacity(),
            "set_len_from_capacity called with len > capacity"
        );
        self.len = new_len.min(self.capacity());
    }

    /// Working frames of one channel
    #[inline]
    pub fn channel(&self, ch: usize) -> &[Sample] {
        &self.channels[ch][..self.len]
    }

    /// Mutable working frames of one channel
    #[inline]
    pub fn channel_mut(&mut self, ch: usize) -> &mut [Sample] {
        &mut self.channels[ch][..self.len]
    }

    /// Fill the working region of every channel with silence
    pub fn fill_silence(&mut self) {
        for ch in 0..self.num_channels {
            self.channel_mut(ch).fill(0.0);
        }
    }

    /// Copy `len` frames starting at `offset` in `src` into this buffer
    ///
    /// Sets the working length to `len` and adopts the source channel count.
    /// Never allocates; `len` must fit this buffer's capacity.
    pub fn copy_range_from(&mut self, src: &AudioBuffer, offset: usize, len: usize) {
        self.set_num_channels(src.num_channels);
        self.set_len_from_capacity(len);
        let len = self.len;
        for ch in 0..self.num_channels {
            self.channels[ch][..len].copy_from_slice(&src.channels[ch][offset..offset + len]);
        }
    }

    /// Add this buffer's working frames into `dst` starting at `offset`
    ///
    /// Frames that would land past the end of `dst` are dropped.
    pub fn add_into_range(&self, dst: &mut AudioBuffer, offset: usize) {
        let channels = self.num_channels.min(dst.num_channels);
        let len = self.len.min(dst.len.saturating_sub(offset));
        for ch in 0..channels {
            let out = &mut dst.channels[ch][offset..offset + len];
            for (o, s) in out.iter_mut().zip(self.channels[ch][..len].iter()) {
                *o += *s;
            }
        }
    }

    /// Silence `len` frames of every channel starting at `offset`
    pub fn clear_range(&mut self, offset: usize, len: usize) {
        for ch in 0..self.num_channels {
            self.channels[ch][offset..offset + len].fill(0.0);
        }
    }

    /// Get the peak amplitude across all channels
    pub fn peak(&self) -> Sample {
        (0..self.num_channels)
            .flat_map(|ch| self.channel(ch).iter())
            .map(|s| s.abs())
            .fold(0.0, Sample::max)
    }
}

impl Index<usize> for AudioBuffer {
    type Output = [Sample];

    #[inline]
    fn index(&self, ch: usize) -> &Self::Output {
        self.channel(ch)
    }
}

impl IndexMut<usize> for AudioBuffer {
    #[inline]
    fn index_mut(&mut self, ch: usize) -> &mut Self::Output {
        self.channel_mut(ch)
    }
}

impl Default for AudioBuffer {
    fn default() -> Self {
        Self::with_capacity(MAX_CHANNELS, 0)
    }
}
