//! Per-tick sampling of the analog channels into the RMS aggregator.
//!
//! The converter itself is abstracted behind [`AnalogSource`]; the
//! firmware implements it over the nRF52840 SAADC, tests over plain arrays.

use crate::error::SampleError;
use crate::rms::{clamp_sample, RmsAggregator, Sample};

/// Anything that can produce a millivolt reading for a channel.
pub trait AnalogSource {
    fn read_channel(&mut self, channel: usize) -> Result<i32, SampleError>;
}

/// Reads every channel once per tick and forwards the clamped values.
///
/// A failed conversion falls back to the raw count; a failed read falls
/// back to the last value seen on that channel. The tick never aborts.
pub struct Sampler<const C: usize> {
    last: [i32; C],
}

impl<const C: usize> Sampler<C> {
    pub const fn new() -> Self {
        Self { last: [0; C] }
    }

    /// Sample all channels into `aggregator`. Returns what was fed in.
    pub fn sample<A, const W: usize, const S: usize>(
        &mut self,
        source: &mut A,
        aggregator: &mut RmsAggregator<W, S, C>,
    ) -> [Sample; C]
    where
        A: AnalogSource + ?Sized,
    {
        let mut fed = [0; C];
        for (channel, slot) in fed.iter_mut().enumerate() {
            let millivolts = match source.read_channel(channel) {
                Ok(mv) => mv,
                Err(SampleError::Conversion { raw }) => {
                    warn!("ch{}: conversion failed, using raw {}", channel, raw);
                    raw
                }
                Err(SampleError::Read) => {
                    warn!(
                        "ch{}: read failed, reusing {} mV",
                        channel, self.last[channel]
                    );
                    self.last[channel]
                }
            };
            self.last[channel] = millivolts;
            aggregator.add_sample(channel, millivolts);
            *slot = clamp_sample(millivolts);
        }
        fed
    }

    /// Last reading seen per channel, before clamping.
    pub fn last_readings(&self) -> &[i32; C] {
        &self.last
    }
}

impl<const C: usize> Default for Sampler<C> {
    fn default() -> Self {
        Self::new()
    }
}

/// Scale a raw converter count to millivolts.
///
/// Fails for resolutions the SAADC cannot produce, and for counts pinned
/// at the `i16` rails, which a single-ended 8..14 bit conversion never
/// yields and which mean the result register was not written.
pub fn raw_to_millivolts(raw: i16, full_scale_mv: i32, resolution_bits: u8) -> Result<i32, SampleError> {
    if !(8..=14).contains(&resolution_bits) || raw == i16::MIN || raw == i16::MAX {
        return Err(SampleError::Conversion { raw: raw.into() });
    }
    Ok(i32::from(raw) * full_scale_mv >> resolution_bits)
}
