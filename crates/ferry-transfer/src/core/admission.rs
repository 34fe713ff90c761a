//! Throughput-trend admission.
//!
//! Instead of a fixed concurrency limit, a direction admits another transfer
//! only while its measured aggregate speed keeps climbing. The state here is
//! the decision half of that policy; the directory owns the queue and applies
//! the decisions under its lock.

use serde::Serialize;

/// The two most recent aggregate speed samples of a direction.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SpeedTrend {
    pub previous: f64,
    pub current:  f64,
}

impl SpeedTrend {
    /// Starts at `0 -> 1` so the first real sample compares against 1 byte/ms.
    pub fn new() -> Self {
        Self {
            previous: 0.0,
            current:  1.0,
        }
    }

    pub fn advance(&mut self, sample: f64) {
        self.previous = self.current;
        self.current = sample;
    }

    pub fn is_climbing(&self, growth_factor: f64) -> bool {
        self.current > self.previous * growth_factor
    }
}

impl Default for SpeedTrend {
    fn default() -> Self {
        Self::new()
    }
}

/// Admission gate plus speed trend for one direction.
///
/// `admit_more` is forced to `false` by every promotion, so one open gate
/// yields at most one promotion.
#[derive(Debug, Clone, PartialEq)]
pub struct AdmissionState {
    trend:         SpeedTrend,
    admit_more:    bool,
    growth_factor: f64,
}

impl AdmissionState {
    pub fn new(growth_factor: f64) -> Self {
        Self {
            trend: SpeedTrend::new(),
            admit_more: true,
            growth_factor,
        }
    }

    pub fn admit_more(&self) -> bool {
        self.admit_more
    }

    pub fn trend(&self) -> SpeedTrend {
        self.trend
    }

    /// Consume the gate for a new submission. Returns whether it was open.
    pub fn take_gate(&mut self) -> bool {
        std::mem::replace(&mut self.admit_more, false)
    }

    /// A transfer finished its warm-up. Returns whether to promote the queue head.
    pub fn threshold_crossed(&mut self, aggregate: f64, has_queued: bool) -> bool {
        self.trend.advance(aggregate);
        if self.trend.is_climbing(self.growth_factor) {
            self.admit_more = true;
            self.promote(has_queued)
        } else {
            self.admit_more = false;
            false
        }
    }

    /// A transfer reached a terminal state. Opens the gate and re-samples.
    pub fn transfer_ended(&mut self, aggregate: f64) {
        self.admit_more = true;
        self.trend.advance(aggregate);
    }

    /// Re-sample after the settle delay.
    pub fn settled(&mut self, aggregate: f64) {
        self.trend.advance(aggregate);
    }

    /// Close the gate if there is something to promote. Returns whether to promote.
    pub fn promote(&mut self, has_queued: bool) -> bool {
        if has_queued {
            self.admit_more = false;
        }
        has_queued
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trend_starts_at_one() {
        let mut trend = SpeedTrend::new();
        assert!(trend.is_climbing(1.4));
        trend.advance(1.3);
        assert!(!trend.is_climbing(1.4));
        trend.advance(2.0);
        assert!(trend.is_climbing(1.4));
    }

    #[test]
    fn test_gate_is_consumed_once() {
        let mut state = AdmissionState::new(1.4);
        assert!(state.take_gate());
        assert!(!state.take_gate());
        assert!(!state.admit_more());
    }

    #[test]
    fn test_climbing_promotes_exactly_one() {
        let mut state = AdmissionState::new(1.4);
        state.take_gate();
        assert!(state.threshold_crossed(10.0, true));
        assert!(!state.admit_more());
        assert_eq!(state.trend(), SpeedTrend { previous: 1.0, current: 10.0 });
    }

    #[test]
    fn test_climbing_with_empty_queue_leaves_gate_open() {
        let mut state = AdmissionState::new(1.4);
        state.take_gate();
        assert!(!state.threshold_crossed(10.0, false));
        assert!(state.admit_more());
    }

    #[test]
    fn test_flat_throughput_closes_gate() {
        let mut state = AdmissionState::new(1.4);
        state.threshold_crossed(10.0, false);
        assert!(!state.threshold_crossed(13.0, true));
        assert!(!state.admit_more());
    }

    #[test]
    fn test_transfer_ended_opens_gate() {
        let mut state = AdmissionState::new(1.4);
        state.take_gate();
        state.transfer_ended(3.0);
        assert!(state.admit_more());
        state.settled(4.0);
        assert_eq!(state.trend(), SpeedTrend { previous: 3.0, current: 4.0 });
        assert!(state.promote(true));
        assert!(!state.admit_more());
    }

    #[test]
    fn test_promote_without_queue_keeps_gate() {
        let mut state = AdmissionState::new(1.4);
        state.transfer_ended(0.0);
        assert!(!state.promote(false));
        assert!(state.admit_more());
    }
}
