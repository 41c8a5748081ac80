/// Rolling window of the last N utilization samples.
///
/// Slots start at zero and are overwritten round-robin, so the mean of a
/// window that has not filled up yet is diluted by the unused slots.
#[derive(Debug, Clone)]
pub struct Window {
    slots:  Vec<f64>,
    cursor: usize,
}

impl Window {
    /// A window of `capacity` slots. A capacity of zero is treated as one.
    pub fn new(capacity: usize) -> Self {
        Self {
            slots:  vec![0.0; capacity.max(1)],
            cursor: 0,
        }
    }

    /// Record a sample, overwriting the oldest one.
    pub fn push(&mut self, value: f64) {
        self.slots[self.cursor] = value;
        self.cursor = (self.cursor + 1) % self.slots.len();
    }

    /// Arithmetic mean over every slot.
    pub fn mean(&self) -> f64 {
        self.slots.iter().sum::<f64>() / self.slots.len() as f64
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }
}
