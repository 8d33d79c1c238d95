//! Fixed-capacity circular history used by the detectors.
//!
//! Every detector keeps a short rolling window of recent per-frame values
//! (feature vectors or RMS levels).  When the window is full, a new value
//! **overwrites** the oldest one, so the most recent `capacity` values are
//! always available in chronological order.
//!
//! # Example
//!
//! ```rust
//! use voice_quality::audio::RingBuffer;
//!
//! let mut history = RingBuffer::new(3);
//! for rms in [0.1_f32, 0.2, 0.3, 0.4] {
//!     history.push(rms); // 0.1 is overwritten by 0.4
//! }
//! assert_eq!(history.to_vec(), vec![0.2, 0.3, 0.4]);
//! assert_eq!(history.last(), Some(0.4));
//! ```

// ---------------------------------------------------------------------------
// RingBuffer
// ---------------------------------------------------------------------------

/// A fixed-capacity circular buffer.
///
/// Generic over `T: Copy + Default`; the detectors store `f32` RMS levels and
/// whole [`FeatureVector`](crate::audio::FeatureVector)s.
///
/// ## Overflow behaviour
///
/// When [`push`](Self::push) would exceed `capacity`, the oldest value is
/// silently overwritten.  The buffer never allocates beyond its initial
/// capacity.
#[derive(Debug, Clone)]
pub struct RingBuffer<T> {
    buf: Vec<T>,
    capacity: usize,
    /// Index of the *next* write position (wraps around `capacity`).
    write_pos: usize,
    /// Number of valid values currently stored (≤ `capacity`).
    len: usize,
}

impl<T: Copy + Default> RingBuffer<T> {
    /// Create a new ring buffer with the given `capacity`.
    ///
    /// # Panics
    ///
    /// Panics if `capacity == 0`.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "RingBuffer capacity must be > 0");
        Self {
            buf: vec![T::default(); capacity],
            capacity,
            write_pos: 0,
            len: 0,
        }
    }

    /// Append one value, overwriting the oldest when full.
    pub fn push(&mut self, item: T) {
        self.buf[self.write_pos] = item;
        self.write_pos = (self.write_pos + 1) % self.capacity;
        if self.len < self.capacity {
            self.len += 1;
        }
    }

    /// Append every value of `data` in order.
    pub fn push_slice(&mut self, data: &[T]) {
        for &item in data {
            self.push(item);
        }
    }

    /// Index of the oldest stored value inside `buf`.
    fn read_pos(&self) -> usize {
        // Until the buffer has been filled once, valid data starts at 0.
        // Afterwards the oldest value sits where the next write goes.
        if self.len < self.capacity {
            0
        } else {
            self.write_pos
        }
    }

    /// Iterate over the stored values from oldest to newest.
    pub fn iter(&self) -> impl Iterator<Item = T> + '_ {
        let start = self.read_pos();
        (0..self.len).map(move |i| self.buf[(start + i) % self.capacity])
    }

    /// The most recently pushed value.
    pub fn last(&self) -> Option<T> {
        if self.len == 0 {
            return None;
        }
        Some(self.buf[(self.write_pos + self.capacity - 1) % self.capacity])
    }

    /// The value pushed `n` steps before the most recent one (`nth_back(0)`
    /// equals [`last`](Self::last)).
    pub fn nth_back(&self, n: usize) -> Option<T> {
        if n >= self.len {
            return None;
        }
        Some(self.buf[(self.write_pos + self.capacity - 1 - n) % self.capacity])
    }

    /// Copy the stored values out in chronological order.
    pub fn to_vec(&self) -> Vec<T> {
        self.iter().collect()
    }

    /// Mean of `f` over the stored values, `None` when empty.
    pub fn mean_by(&self, f: impl Fn(T) -> f32) -> Option<f32> {
        if self.len == 0 {
            return None;
        }
        Some(self.iter().map(f).sum::<f32>() / self.len as f32)
    }

    /// Discard all values and reset the write position.
    pub fn clear(&mut self) {
        self.write_pos = 0;
        self.len = 0;
    }

    /// Number of valid values currently stored.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns `true` when the buffer contains no values.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Maximum number of values the buffer can hold.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Returns `true` when the next push will overwrite the oldest value.
    pub fn is_full(&self) -> bool {
        self.len == self.capacity
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
