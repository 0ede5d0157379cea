//! Fixed-capacity window of per-tick samples.

use std::collections::VecDeque;

/// Circular buffer of the last `capacity` samples with a running sum.
///
/// Pushing evicts the oldest sample once full, both in O(1).
#[derive(Debug, Clone)]
pub struct RollingWindow {
    samples: VecDeque<u64>,
    capacity: usize,
    sum: u64,
}

impl RollingWindow {
    /// A zero capacity is treated as one.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            samples: VecDeque::with_capacity(capacity),
            capacity,
            sum: 0,
        }
    }

    pub fn push(&mut self, sample: u64) {
        if self.samples.len() == self.capacity {
            if let Some(evicted) = self.samples.pop_front() {
                self.sum -= evicted;
            }
        }
        self.samples.push_back(sample);
        self.sum += sample;
    }

    /// Mean over the samples collected so far, not the nominal capacity.
    pub fn average(&self) -> f64 {
        if self.samples.is_empty() {
            0.0
        } else {
            self.sum as f64 / self.samples.len() as f64
        }
    }

    pub fn sum(&self) -> u64 {
        self.sum
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
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_average_over_full_window() {
        let mut window = RollingWindow::new(5);
        for delta in [10, 20, 10, 20, 10] {
            window.push(delta);
        }
        assert_eq!(window.average(), 14.0);
    }

    #[test]
    fn test_average_over_partial_window() {
        let mut window = RollingWindow::new(5);
        window.push(10);
        window.push(20);
        assert_eq!(window.average(), 15.0);
        assert_eq!(window.len(), 2);
    }

    #[test]
    fn test_eviction_keeps_sum() {
        let mut window = RollingWindow::new(3);
        for delta in [1, 2, 3, 4, 5] {
            window.push(delta);
        }
        assert_eq!(window.len(), 3);
        assert_eq!(window.sum(), 12);
        assert_eq!(window.average(), 4.0);
    }

    #[test]
    fn test_empty_window() {
        let window = RollingWindow::new(0);
        assert_eq!(window.capacity(), 1);
        assert!(window.is_empty());
        assert_eq!(window.average(), 0.0);
    }
}
