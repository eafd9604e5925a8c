//! Tick performance monitoring
//!
//! Keeps a rolling window of tick durations measured against the tick budget
//! (`1 / tick_rate`) and reports status changes through tracing.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// Fraction-of-budget thresholds between status levels
const EXCELLENT_THRESHOLD: f64 = 0.3;
const WARNING_THRESHOLD: f64 = 0.7;
const CRITICAL_THRESHOLD: f64 = 0.9;
const OVERLOADED_THRESHOLD: f64 = 1.5;

/// Samples needed before the status moves off its initial value
const MIN_SAMPLES: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum PerformanceStatus {
    Excellent,
    Good,
    /// Over 70% of the tick budget
    Warning,
    /// Close to or over budget
    Critical,
    /// Sustained overload
    Overloaded,
}

impl PerformanceStatus {
    pub fn is_degraded(&self) -> bool {
        *self >= PerformanceStatus::Warning
    }

    fn from_budget_ratio(ratio: f64) -> Self {
        if ratio < EXCELLENT_THRESHOLD {
            PerformanceStatus::Excellent
        } else if ratio < WARNING_THRESHOLD {
            PerformanceStatus::Good
        } else if ratio < CRITICAL_THRESHOLD {
            PerformanceStatus::Warning
        } else if ratio < OVERLOADED_THRESHOLD {
            PerformanceStatus::Critical
        } else {
            PerformanceStatus::Overloaded
        }
    }
}

/// Rolling tick-duration monitor
pub struct PerformanceMonitor {
    tick_durations: VecDeque<Duration>,
    max_samples: usize,
    target_tick_duration: Duration,
    status: PerformanceStatus,
    tick_start: Option<Instant>,
    last_entity_count: usize,
}

impl PerformanceMonitor {
    pub fn new(tick_rate: u32) -> Self {
        let max_samples = (tick_rate.max(1) as usize) * 2;
        Self {
            tick_durations: VecDeque::with_capacity(max_samples),
            max_samples,
            target_tick_duration: Duration::from_secs_f64(1.0 / tick_rate.max(1) as f64),
            status: PerformanceStatus::Excellent,
            tick_start: None,
            last_entity_count: 0,
        }
    }

    pub fn tick_start(&mut self) {
        self.tick_start = Some(Instant::now());
    }

    /// Stop timing the current tick. Returns its duration.
    pub fn tick_end(&mut self, entity_count: usize) -> Duration {
        let Some(start) = self.tick_start.take() else {
            return Duration::ZERO;
        };
        let duration = start.elapsed();
        self.last_entity_count = entity_count;
        self.record_tick(duration);
        duration
    }

    /// Record one sample; logs when the status level changes
    pub fn record_tick(&mut self, duration: Duration) {
        self.tick_durations.push_back(duration);
        while self.tick_durations.len() > self.max_samples {
            self.tick_durations.pop_front();
        }
        if self.tick_durations.len() < MIN_SAMPLES {
            return;
        }

        let next = PerformanceStatus::from_budget_ratio(self.budget_ratio());
        if next != self.status {
            if next > self.status && next.is_degraded() {
                tracing::warn!("Tick performance degraded: {}", self.describe(next));
            } else {
                tracing::info!("Tick performance now {}", self.describe(next));
            }
            self.status = next;
        }
    }

    pub fn average_tick_duration(&self) -> Duration {
        if self.tick_durations.is_empty() {
            return Duration::ZERO;
        }
        let sum: Duration = self.tick_durations.iter().sum();
        sum / self.tick_durations.len() as u32
    }

    pub fn p95_tick_duration(&self) -> Duration {
        let mut sorted: Vec<Duration> = self.tick_durations.iter().copied().collect();
        sorted.sort_unstable();
        let idx = (sorted.len() as f64 * 0.95) as usize;
        sorted
            .get(idx.min(sorted.len().saturating_sub(1)))
            .copied()
            .unwrap_or(Duration::ZERO)
    }

    pub fn status(&self) -> PerformanceStatus {
        self.status
    }

    fn budget_ratio(&self) -> f64 {
        self.average_tick_duration().as_secs_f64() / self.target_tick_duration.as_secs_f64()
    }

    pub fn budget_usage_percent(&self) -> f64 {
        self.budget_ratio() * 100.0
    }

    pub fn last_entity_count(&self) -> usize {
        self.last_entity_count
    }

    fn describe(&self, status: PerformanceStatus) -> String {
        format!(
            "{:?} - {:.1}% budget, p95 {:?}, {} entities",
            status,
            self.budget_usage_percent(),
            self.p95_tick_duration(),
            self.last_entity_count
        )
    }

    pub fn status_message(&self) -> String {
        self.describe(self.status)
    }
}

impl Default for PerformanceMonitor {
    fn default() -> Self {
        Self::new(60)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn monitor_with(samples: usize, each: Duration) -> PerformanceMonitor {
        let mut monitor = PerformanceMonitor::new(60);
        for _ in 0..samples {
            monitor.record_tick(each);
        }
        monitor
    }

    #[test]
    fn test_initial_status() {
        assert_eq!(PerformanceMonitor::new(60).status(), PerformanceStatus::Excellent);
    }

    #[test]
    fn test_not_enough_samples_keeps_status() {
        let monitor = monitor_with(MIN_SAMPLES - 1, Duration::from_millis(30));
        assert_eq!(monitor.status(), PerformanceStatus::Excellent);
    }

    #[test]
    fn test_status_levels() {
        // Budget at 60 Hz is ~16.67ms
        let cases = [
            (2, PerformanceStatus::Excellent),
            (8, PerformanceStatus::Good),
            (13, PerformanceStatus::Warning),
            (18, PerformanceStatus::Critical),
            (30, PerformanceStatus::Overloaded),
        ];
        for (ms, expected) in cases {
            let monitor = monitor_with(20, Duration::from_millis(ms));
            assert_eq!(monitor.status(), expected, "{ms}ms");
        }
    }

    #[test]
    fn test_recovers_after_window_rolls() {
        let mut monitor = monitor_with(120, Duration::from_millis(30));
        assert!(monitor.status().is_degraded());
        for _ in 0..120 {
            monitor.record_tick(Duration::from_millis(1));
        }
        assert_eq!(monitor.status(), PerformanceStatus::Excellent);
    }

    #[test]
    fn test_tick_timing() {
        let mut monitor = PerformanceMonitor::new(60);
        assert_eq!(monitor.tick_end(3), Duration::ZERO);
        monitor.tick_start();
        std::thread::sleep(Duration::from_millis(1));
        assert!(monitor.tick_end(10) >= Duration::from_millis(1));
        assert_eq!(monitor.last_entity_count(), 10);
    }

    #[test]
    fn test_p95() {
        let mut monitor = PerformanceMonitor::new(60);
        for ms in 1..=100u64 {
            monitor.record_tick(Duration::from_millis(ms));
        }
        // Window holds the last 120 samples, all 100 here
        assert_eq!(monitor.p95_tick_duration(), Duration::from_millis(96));
    }
}
