use super::{clamp_sample, RingBuffer, RmsVector, Sample, SquareSum};

/// Incremental per-channel RMS over `S` rolling sub-windows of a
/// `W`-sample window.
///
/// Sub-window `i` covers the samples aged `i * W/S .. (i + 1) * W/S` from
/// the oldest one, so sub-window `0` is the oldest second of data and
/// sub-window `S - 1` ends with the newest sample. Inserting a sample
/// slides every boundary by one: each sub-window loses its oldest member
/// and gains the oldest member of the next one, and the last sub-window
/// gains the new sample. That is `S` subtractions and `S` additions,
/// independent of `W` and of the data.
pub struct RmsAggregator<const W: usize, const S: usize, const C: usize> {
    rings: [RingBuffer<Sample, W>; C],
    sums: [[SquareSum; S]; C],
    rms: RmsVector<S, C>,
}

impl<const W: usize, const S: usize, const C: usize> RmsAggregator<W, S, C> {
    const GEOMETRY: () = {
        assert!(S > 0 && C > 0, "need at least one sub-window and one channel");
        assert!(W % S == 0, "sub-windows must tile the window");
    };

    /// Samples per sub-window.
    pub const SUB_LEN: usize = W / S;

    /// Create an aggregator whose window is primed with zeros.
    pub const fn new() -> Self {
        let () = Self::GEOMETRY;
        Self {
            rings: [const { RingBuffer::filled(0) }; C],
            sums: [[0; S]; C],
            rms: RmsVector::zeroed(),
        }
    }

    /// Feed one reading for `channel`. Negative values count as zero.
    ///
    /// Out-of-range channels are ignored.
    pub fn add_sample(&mut self, channel: usize, value: i32) {
        if channel >= C {
            warn!("add_sample: channel {} out of range", channel);
            return;
        }
        let value = clamp_sample(value);

        let ring = &mut self.rings[channel];
        let sums = &mut self.sums[channel];
        for (i, sum) in sums.iter_mut().enumerate() {
            let leaving = square(ring.from_oldest(i * Self::SUB_LEN));
            let entering = if i + 1 < S {
                square(ring.from_oldest((i + 1) * Self::SUB_LEN))
            } else {
                square(value)
            };
            // `leaving` is a member of this sub-window, so it is part of `sum`.
            *sum = *sum - leaving + entering;
        }
        ring.push(value);

        for (i, &sum) in sums.iter().enumerate() {
            self.rms.set(channel, i, magnitude(sum, Self::SUB_LEN));
        }
    }

    /// Copy of the current RMS vector. Pure; calling it twice without an
    /// `add_sample` in between yields identical vectors.
    pub fn snapshot(&self) -> RmsVector<S, C> {
        self.rms
    }

    /// Running sums of squares for `channel`, oldest sub-window first.
    pub fn partial_sums(&self, channel: usize) -> Option<&[SquareSum; S]> {
        self.sums.get(channel)
    }

    /// Sample window for `channel`.
    pub fn window(&self, channel: usize) -> Option<&RingBuffer<Sample, W>> {
        self.rings.get(channel)
    }
}

impl<const W: usize, const S: usize, const C: usize> Default for RmsAggregator<W, S, C> {
    fn default() -> Self {
        Self::new()
    }
}

fn square(sample: Sample) -> SquareSum {
    let s = SquareSum::from(sample);
    s * s
}

/// Truncated RMS of a sub-window given its sum of squares.
fn magnitude(sum: SquareSum, count: usize) -> u16 {
    let mean = sum / count as SquareSum;
    u16::try_from(mean.isqrt()).unwrap_or(u16::MAX)
}
