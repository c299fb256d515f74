use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use crate::agents::TesterRole;

/// Moving average of recent completion durations per role.
#[derive(Debug)]
pub struct DurationStats {
    window: usize,
    samples: HashMap<TesterRole, VecDeque<Duration>>,
}

impl DurationStats {
    pub fn new(window: usize) -> Self {
        Self { window: window.max(1), samples: HashMap::new() }
    }

    pub fn record(&mut self, role: TesterRole, duration: Duration) {
        let samples = self.samples.entry(role).or_default();
        if samples.len() == self.window {
            samples.pop_front();
        }
        samples.push_back(duration);
    }

    pub fn average(&self, role: TesterRole) -> Option<Duration> {
        let samples = self.samples.get(&role).filter(|s| !s.is_empty())?;
        let total: Duration = samples.iter().sum();
        Some(total / samples.len() as u32)
    }
}

/// Estimated wait for the job at `position` (1-based) in its role's queue.
pub fn queued_wait(position: usize, average: Duration, slots: usize) -> Duration {
    average.mul_f64(position as f64 / slots.max(1) as f64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_average_over_window() {
        let mut stats = DurationStats::new(2);
        assert!(stats.average(TesterRole::Fuzz).is_none());
        stats.record(TesterRole::Fuzz, Duration::from_secs(10));
        stats.record(TesterRole::Fuzz, Duration::from_secs(20));
        assert_eq!(stats.average(TesterRole::Fuzz), Some(Duration::from_secs(15)));
        stats.record(TesterRole::Fuzz, Duration::from_secs(40));
        assert_eq!(stats.average(TesterRole::Fuzz), Some(Duration::from_secs(30)));
        assert!(stats.average(TesterRole::Recon).is_none());
    }

    #[test]
    fn test_queued_wait_scales_with_slots() {
        let avg = Duration::from_secs(60);
        assert_eq!(queued_wait(3, avg, 1), Duration::from_secs(180));
        assert_eq!(queued_wait(3, avg, 2), Duration::from_secs(90));
        assert_eq!(queued_wait(1, avg, 0), Duration::from_secs(60));
    }
}
