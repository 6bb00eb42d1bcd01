//! Fixed-capacity rolling window of RTT samples

/// Ring buffer of the most recent RTT samples in milliseconds.
///
/// Pushing into a full window overwrites the oldest sample. Iteration is
/// always oldest to newest, which jitter depends on.
#[derive(Debug, Clone)]
pub struct SampleWindow {
    samples: Vec<u64>,
    capacity: usize,
    /// Index of the oldest sample once the buffer has wrapped
    head: usize,
}

impl SampleWindow {
    /// Creates an empty window. A capacity of 0 is raised to 1.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            samples: Vec::with_capacity(capacity),
            capacity,
            head: 0,
        }
    }

    pub fn push(&mut self, rtt_ms: u64) {
        if self.samples.len() < self.capacity {
            self.samples.push(rtt_ms);
        } else {
            self.samples[self.head] = rtt_ms;
            self.head = (self.head + 1) % self.capacity;
        }
    }

    /// Most recently pushed sample
    pub fn last(&self) -> Option<u64> {
        if self.samples.is_empty() {
            None
        } else if self.samples.len() < self.capacity {
            self.samples.last().copied()
        } else {
            let idx = (self.head + self.capacity - 1) % self.capacity;
            Some(self.samples[idx])
        }
    }

    /// Samples from oldest to newest
    pub fn iter(&self) -> impl Iterator<Item = u64> + '_ {
        let (newer, older) = self.samples.split_at(self.head);
        older.iter().chain(newer.iter()).copied()
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&mut self) {
        self.samples.clear();
        self.head = 0;
    }
}
