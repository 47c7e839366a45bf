//! Sliding-window RMS estimation.
//!
//! Each channel keeps the last `W` samples in a [`RingBuffer`]. The window
//! is split into `S` consecutive sub-windows of `W / S` samples, oldest
//! first, and every sub-window carries a running sum of squares that is
//! updated incrementally on each insertion.
//!
//! ## Numeric policy
//!
//! - Samples are `u16` millivolts. Negative readings are clamped to zero and
//!   readings above `u16::MAX` saturate, *before* squaring.
//! - Sums of squares are `u64`. One square is below 2^32, so a sub-window
//!   can hold more than 2^32 maximal samples before overflowing; any
//!   window that fits in RAM is safe.
//! - A magnitude is `floor(sqrt(sum / (W / S)))`, computed with integer
//!   division and an integer square root. Both truncate, and
//!   `floor(sqrt(floor(x))) == floor(sqrt(x))`, so the result equals the
//!   truncated real-valued RMS. It never exceeds `u16::MAX`.

mod aggregator;
mod ring;


pub use aggregator::RmsAggregator;
pub use ring::RingBuffer;

use crate::config::{CHANNELS, RMS_PAYLOAD_LEN, SUB_WINDOWS, WINDOW_LEN};

/// A clamped, non-negative voltage reading (mV).
pub type Sample = u16;

/// Accumulator width for sums of squares.
pub type SquareSum = u64;

/// Aggregator with the device's sampling geometry.
pub type MonitorAggregator = RmsAggregator<WINDOW_LEN, SUB_WINDOWS, CHANNELS>;

/// RMS vector with the device's sampling geometry.
pub type MonitorVector = RmsVector<SUB_WINDOWS, CHANNELS>;

/// Clamp a signed millivolt reading into the sample range.
pub fn clamp_sample(millivolts: i32) -> Sample {
    millivolts.clamp(0, Sample::MAX as i32) as Sample
}

/// `S` RMS magnitudes for each of `C` channels, oldest sub-window first.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RmsVector<const S: usize, const C: usize> {
    values: [[u16; S]; C],
}

impl<const S: usize, const C: usize> RmsVector<S, C> {
    /// All-zero vector.
    pub const fn zeroed() -> Self {
        Self {
            values: [[0; S]; C],
        }
    }

    /// Build from per-channel magnitudes.
    pub const fn from_channels(values: [[u16; S]; C]) -> Self {
        Self { values }
    }

    /// Number of magnitudes (`S * C`).
    pub const fn len(&self) -> usize {
        S * C
    }

    pub const fn is_empty(&self) -> bool {
        S * C == 0
    }

    /// Magnitudes of one channel, oldest sub-window first.
    pub fn channel(&self, channel: usize) -> Option<&[u16; S]> {
        self.values.get(channel)
    }

    /// Flattened, channel-major (channel 0's sub-windows, then channel 1's, ...).
    pub fn iter(&self) -> impl Iterator<Item = u16> + '_ {
        self.values.iter().flat_map(|ch| ch.iter().copied())
    }

    pub(crate) fn set(&mut self, channel: usize, sub_window: usize, magnitude: u16) {
        self.values[channel][sub_window] = magnitude;
    }

    /// Serialise as little-endian u16s, channel-major.
    /// Returns the number of bytes written, or 0 if `buf` is too small.
    pub fn serialize(&self, buf: &mut [u8]) -> usize {
        let total = S * C * 2;
        if buf.len() < total {
            return 0;
        }
        for (chunk, value) in buf.chunks_exact_mut(2).zip(self.iter()) {
            chunk.copy_from_slice(&value.to_le_bytes());
        }
        total
    }
}

impl MonitorVector {
    /// Fixed-size wire form of the device's RMS vector.
    pub fn to_payload(&self) -> [u8; RMS_PAYLOAD_LEN] {
        let mut payload = [0u8; RMS_PAYLOAD_LEN];
        self.serialize(&mut payload);
        payload
    }
}

impl<const S: usize, const C: usize> Default for RmsVector<S, C> {
    fn default() -> Self {
        Self::zeroed()
    }
}
