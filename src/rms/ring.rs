//! Fixed-capacity ring buffer holding the most recent `N` samples.
//!
//! The buffer is primed with a fill value at construction, so its length
//! is always exactly `N`. The write index always points at the oldest
//! entry, which is the one the next `push` overwrites.

/// Overwriting FIFO of `N` copyable values.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RingBuffer<T, const N: usize> {
    buf: [T; N],
    idx: usize,
}

impl<T: Copy, const N: usize> RingBuffer<T, N> {
    const NON_EMPTY: () = assert!(N > 0, "ring buffer capacity must be non-zero");

    /// Create a buffer with every slot set to `value`.
    pub const fn filled(value: T) -> Self {
        let () = Self::NON_EMPTY;
        Self {
            buf: [value; N],
            idx: 0,
        }
    }

    /// Capacity (and length) of the buffer.
    pub const fn capacity(&self) -> usize {
        N
    }

    /// Position the next `push` writes to. Always in `[0, N)`.
    pub fn index(&self) -> usize {
        self.idx
    }

    /// Insert `value`, overwriting and returning the oldest entry.
    pub fn push(&mut self, value: T) -> T {
        let evicted = core::mem::replace(&mut self.buf[self.idx], value);
        self.idx = (self.idx + 1) % N;
        evicted
    }

    /// Entry `age` places after the oldest one (`0` = oldest,
    /// `N - 1` = newest). Wraps for `age >= N`.
    pub fn from_oldest(&self, age: usize) -> T {
        self.buf[(self.idx + age) % N]
    }

    /// Most recently inserted entry.
    pub fn newest(&self) -> T {
        self.from_oldest(N - 1)
    }

    /// Iterate oldest-first.
    pub fn iter(&self) -> impl Iterator<Item = T> + '_ {
        (0..N).map(move |age| self.from_oldest(age))
    }

    /// Raw storage in slot order (not age order).
    pub fn as_slice(&self) -> &[T] {
        &self.buf
    }
}

impl<T: Copy + Default, const N: usize> Default for RingBuffer<T, N> {
    fn default() -> Self {
        Self::filled(T::default())
    }
}

#[cfg(test)]
mod tests {
    use super::RingBuffer;

    #[test]
    fn primed_buffer_has_full_length() {
        let ring: RingBuffer<u16, 4> = RingBuffer::default();
        assert_eq!(ring.capacity(), 4);
        assert_eq!(ring.iter().count(), 4);
        assert!(ring.iter().all(|v| v == 0));
    }

    #[test]
    fn push_returns_evicted_oldest() {
        let mut ring: RingBuffer<u16, 3> = RingBuffer::filled(9);
        assert_eq!(ring.push(1), 9);
        assert_eq!(ring.push(2), 9);
        assert_eq!(ring.push(3), 9);
        assert_eq!(ring.push(4), 1);
        assert_eq!(ring.newest(), 4);
        assert_eq!(ring.from_oldest(0), 2);
    }

    #[test]
    fn index_wraps_within_capacity() {
        let mut ring: RingBuffer<u8, 5> = RingBuffer::default();
        for i in 0..23u8 {
            ring.push(i);
            assert!(ring.index() < 5);
        }
        assert_eq!(ring.index(), 23 % 5);
    }
}
