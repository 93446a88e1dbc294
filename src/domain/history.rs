// History buffer - fixed-size sliding window of recent readings
use super::telemetry::Reading;
use std::collections::VecDeque;

#[derive(Debug, Clone)]
pub struct HistoryBuffer {
    readings: VecDeque<Reading>,
    capacity: usize,
}

impl HistoryBuffer {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            readings: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append a reading, evicting the oldest one when full.
    pub fn push(&mut self, reading: Reading) {
        if self.readings.len() == self.capacity {
            self.readings.pop_front();
        }
        self.readings.push_back(reading);
    }

    /// Readings in chronological order.
    pub fn snapshot(&self) -> Vec<Reading> {
        self.readings.iter().cloned().collect()
    }

    pub fn latest(&self) -> Option<&Reading> {
        self.readings.back()
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.readings.len()
    }

    #[cfg(test)]
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
