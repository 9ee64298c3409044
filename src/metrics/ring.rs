//! Fixed-capacity ring buffer for rolling sample windows.

/// Ring buffer holding the most recent `capacity` values.
///
/// Pushing into a full buffer evicts and returns the oldest value.
#[derive(Debug, Clone)]
pub struct RingBuffer<T> {
    /// Storage, grows up to capacity then is overwritten in place
    slots: Vec<T>,
    /// Maximum number of values held
    capacity: usize,
    /// Slot holding the oldest value once the buffer is full
    next: usize,
}

impl<T: Copy> RingBuffer<T> {
    /// Create an empty buffer. A zero capacity is treated as one.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            slots: Vec::with_capacity(capacity),
            capacity,
            next: 0,
        }
    }

    /// Append a value, returning the evicted oldest value if the buffer was full.
    pub fn push(&mut self, value: T) -> Option<T> {
        if self.slots.len() < self.capacity {
            self.slots.push(value);
            return None;
        }

        let evicted = std::mem::replace(&mut self.slots[self.next], value);
        self.next = (self.next + 1) % self.capacity;
        Some(evicted)
    }

    /// Values from oldest to newest.
    pub fn iter(&self) -> impl Iterator<Item = T> + '_ {
        let (newer, older) = self.slots.split_at(self.next);
        older.iter().chain(newer.iter()).copied()
    }

    /// Values in the chronological index range `[start, end)`.
    pub fn range(&self, start: usize, end: usize) -> impl Iterator<Item = T> + '_ {
        let end = end.min(self.len());
        self.iter().skip(start).take(end.saturating_sub(start))
    }

    /// Most recent value.
    pub fn latest(&self) -> Option<T> {
        if self.slots.is_empty() {
            None
        } else {
            let newest = (self.next + self.slots.len() - 1) % self.slots.len();
            Some(self.slots[newest])
        }
    }

    /// Number of values held.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Check if the buffer is empty.
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Check if the next push will evict.
    pub fn is_full(&self) -> bool {
        self.slots.len() == self.capacity
    }

    /// Maximum number of values held.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Drop every value.
    pub fn clear(&mut self) {
        self.slots.clear();
        self.next = 0;
    }
}

/// Arithmetic mean of a sequence of integer samples, 0.0 when empty.
pub fn mean<I>(values: I) -> f64
where
    I: IntoIterator,
    I::Item: Into<f64>,
{
    let (sum, count) = values
        .into_iter()
        .fold((0.0, 0usize), |(sum, count), v| (sum + v.into(), count + 1));
    if count == 0 {
        0.0
    } else {
        sum / count as f64
    }
}
