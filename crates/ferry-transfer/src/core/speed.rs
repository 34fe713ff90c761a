//! Sliding-window speed estimation.
//!
//! Two measurements feed admission:
//! - a per-record moving average over the last *W* distinguishable clock ticks
//!   ([`SpeedWindow`] fed by [`TickSampler`]);
//! - a per-direction aggregate over the interval since the previous aggregate
//!   sample ([`aggregate_speed`]).
//!
//! Speeds are in bytes per millisecond.

use std::collections::VecDeque;

use serde::Serialize;

use crate::data::TransferRecord;

/// Bytes observed over one tick interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SpeedSample {
    pub bytes:  u64,
    pub millis: u64,
}

impl SpeedSample {
    pub fn new(bytes: u64, millis: u64) -> Self {
        Self { bytes, millis }
    }
}

/// Fixed-capacity FIFO of samples with running totals.
///
/// The totals always equal the sum of the retained samples.
#[derive(Debug, Clone)]
pub struct SpeedWindow {
    samples:      VecDeque<SpeedSample>,
    capacity:     usize,
    total_bytes:  u64,
    total_millis: u64,
}

impl SpeedWindow {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            samples: VecDeque::with_capacity(capacity),
            capacity,
            total_bytes: 0,
            total_millis: 0,
        }
    }

    /// Append a sample, evicting the oldest when full, and return the new speed.
    pub fn push(&mut self, sample: SpeedSample) -> f64 {
        if self.samples.len() == self.capacity {
            if let Some(oldest) = self.samples.pop_front() {
                self.total_bytes -= oldest.bytes;
                self.total_millis -= oldest.millis;
            }
        }
        self.total_bytes += sample.bytes;
        self.total_millis += sample.millis;
        self.samples.push_back(sample);
        self.speed()
    }

    pub fn speed(&self) -> f64 {
        if self.total_millis == 0 {
            0.0
        } else {
            self.total_bytes as f64 / self.total_millis as f64
        }
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

    pub fn total_bytes(&self) -> u64 {
        self.total_bytes
    }

    pub fn total_millis(&self) -> u64 {
        self.total_millis
    }

    pub fn samples(&self) -> impl Iterator<Item = &SpeedSample> {
        self.samples.iter()
    }
}

/// Accumulates bytes between distinguishable clock ticks.
///
/// Bytes read within the same millisecond as the previous tick are carried
/// over to the next sample rather than producing one.
#[derive(Debug, Clone)]
pub struct TickSampler {
    last_tick:     u64,
    pending_bytes: u64,
}

impl TickSampler {
    pub fn new(start_ms: u64) -> Self {
        Self {
            last_tick:     start_ms,
            pending_bytes: 0,
        }
    }

    pub fn record(&mut self, bytes: u64, now_ms: u64) -> Option<SpeedSample> {
        self.pending_bytes += bytes;
        if now_ms == self.last_tick {
            return None;
        }
        let sample = SpeedSample::new(
            std::mem::take(&mut self.pending_bytes),
            now_ms.saturating_sub(self.last_tick),
        );
        self.last_tick = now_ms;
        Some(sample)
    }

    pub fn pending_bytes(&self) -> u64 {
        self.pending_bytes
    }
}

/// Per-engine measurement state: tick sampling into the record's window plus
/// the one-shot warm-up trigger.
#[derive(Debug, Clone)]
pub struct TransferMeter {
    sampler:    TickSampler,
    warm_up_ms: u64,
    warmed_up:  bool,
}

impl TransferMeter {
    pub fn new(started_at: u64, warm_up_ms: u64) -> Self {
        Self {
            sampler: TickSampler::new(started_at),
            warm_up_ms,
            warmed_up: false,
        }
    }

    /// Account `bytes` at `now_ms`. Returns `true` exactly once, the first time
    /// the record has been active for longer than the warm-up interval.
    pub fn observe(&mut self, record: &TransferRecord, bytes: u64, now_ms: u64) -> bool {
        if let Some(sample) = self.sampler.record(bytes, now_ms) {
            record.record_sample(sample);
        }
        if self.warmed_up || now_ms.saturating_sub(record.started_at()) <= self.warm_up_ms {
            return false;
        }
        self.warmed_up = true;
        true
    }
}

/// Sum of per-record throughput since each record's previous aggregate sample.
///
/// Every call advances the sample point of each record it visits, so callers
/// must take exactly one aggregate per decision.
pub fn aggregate_speed<I>(records: I, now_ms: u64) -> f64
where
    I: IntoIterator,
    I::Item: AsRef<TransferRecord>,
{
    records
        .into_iter()
        .map(|record| record.as_ref().take_aggregate_sample(now_ms))
        .sum::<f64>()
        .max(0.0)
}
