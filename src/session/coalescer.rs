//! Debounced batch of recent-sample projections
//!
//! Every push moves the deadline to `now + debounce`; the owner flushes once
//! the deadline passes with no further pushes. The buffer holds no timer of
//! its own, so whoever owns it decides where the flush runs.

use std::time::Duration;
use tokio::time::Instant;

use crate::types::RecentSample;

#[derive(Debug)]
pub struct CoalescingBuffer {
    pending: Vec<RecentSample>,
    deadline: Option<Instant>,
    debounce: Duration,
}

impl CoalescingBuffer {
    pub fn new(debounce: Duration) -> Self {
        Self {
            pending: Vec::new(),
            deadline: None,
            debounce,
        }
    }

    /// Buffer a projection and restart the quiet period.
    pub fn push(&mut self, sample: RecentSample) {
        self.pending.push(sample);
        self.deadline = Some(Instant::now() + self.debounce);
    }

    /// When the next flush is due, if anything is pending.
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Take everything pending and disarm the deadline.
    pub fn take(&mut self) -> Vec<RecentSample> {
        self.deadline = None;
        std::mem::take(&mut self.pending)
    }

    /// Drop everything pending.
    pub fn clear(&mut self) {
        self.deadline = None;
        self.pending.clear();
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn recent(ts: f64) -> RecentSample {
        RecentSample {
            session_id: "s".to_string(),
            device_id: "d".to_string(),
            timestamp: ts,
            delta_z: 0.0,
            raw_acceleration: 0.0,
            frequency: None,
            amplitude: None,
        }
    }

    #[test]
    fn test_empty_buffer_has_no_deadline() {
        let buffer = CoalescingBuffer::new(Duration::from_millis(100));
        assert!(buffer.deadline().is_none());
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_push_extends_deadline() {
        let mut buffer = CoalescingBuffer::new(Duration::from_millis(100));
        buffer.push(recent(1.0));
        let first = buffer.deadline().unwrap();
        std::thread::sleep(Duration::from_millis(5));
        buffer.push(recent(2.0));
        let second = buffer.deadline().unwrap();
        assert!(second > first);
        assert_eq!(buffer.len(), 2);
    }

    #[test]
    fn test_take_drains_in_arrival_order() {
        let mut buffer = CoalescingBuffer::new(Duration::from_millis(100));
        for ts in [3.0, 1.0, 2.0] {
            buffer.push(recent(ts));
        }
        let batch: Vec<f64> = buffer.take().iter().map(|r| r.timestamp).collect();
        assert_eq!(batch, vec![3.0, 1.0, 2.0]);
        assert!(buffer.is_empty());
        assert!(buffer.deadline().is_none());
    }

    #[test]
    fn test_clear_disarms() {
        let mut buffer = CoalescingBuffer::new(Duration::from_millis(100));
        buffer.push(recent(1.0));
        buffer.clear();
        assert!(buffer.is_empty());
        assert!(buffer.deadline().is_none());
    }
}
