//! Fixed-capacity circular buffer with index wraparound.
//!
//! Both history buffers in the pipeline (frame summaries, head-pose
//! vectors) are bounded and overwrite-oldest; a growable Vec trimmed
//! every tick would churn allocations at the sampling rate for no gain.

/// Circular buffer that overwrites the oldest element when full.
#[derive(Debug, Clone)]
pub struct RingBuffer<T> {
    slots: Vec<Option<T>>,
    head: usize,
    len: usize,
}

impl<T: Clone> RingBuffer<T> {
    /// Create a buffer holding at most `capacity` elements.
    ///
    /// # Panics
    /// Panics if `capacity` is zero.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "ring buffer capacity must be non-zero");
        Self {
            slots: vec![None; capacity],
            head: 0,
            len: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn is_full(&self) -> bool {
        self.len == self.capacity()
    }

    /// Append an element, overwriting the oldest when full.
    pub fn push(&mut self, value: T) {
        let cap = self.capacity();
        self.slots[self.head] = Some(value);
        self.head = (self.head + 1) % cap;
        if self.len < cap {
            self.len += 1;
        }
    }

    /// Iterate in chronological order, oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        let cap = self.capacity();
        let start = (self.head + cap - self.len) % cap;
        (0..self.len).filter_map(move |i| self.slots[(start + i) % cap].as_ref())
    }

    /// Iterate over the newest `n` elements in chronological order.
    pub fn iter_recent(&self, n: usize) -> impl Iterator<Item = &T> {
        let skip = self.len.saturating_sub(n);
        self.iter().skip(skip)
    }

    pub fn clear(&mut self) {
        for slot in &mut self.slots {
            *slot = None;
        }
        self.head = 0;
        self.len = 0;
    }
}
