//! Per-direction scheduling state.
//!
//! A directory holds the active and queued transfers of one [`Direction`]
//! together with its [`AdmissionState`]. Every decision and the promotion it
//! implies happen under the directory's single mutex; the caller starts the
//! engine for a returned [`Promotion`] after the lock is released.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::task::AbortHandle;
use tracing::debug;

use crate::core::{AdmissionState, aggregate_speed};
use crate::data::{Direction, DirectorySnapshot, TransferId, TransferRecord, TransferSnapshot};

/// A transfer that has just been moved to the active list.
#[derive(Debug)]
pub struct Promotion<J> {
    pub record: Arc<TransferRecord>,
    pub job:    J,
}

/// What the service must do after a transfer of this direction ended.
#[derive(Debug)]
pub enum TransferEnded<J> {
    /// Nothing else was active, so the queue head was promoted at once.
    Promoted(Promotion<J>),
    /// Nothing active and nothing queued.
    Idle,
    /// Other transfers are still running; re-sample after the settle delay.
    Settle,
}

struct DirectoryState<J> {
    active:       Vec<Arc<TransferRecord>>,
    queued:       VecDeque<(Arc<TransferRecord>, J)>,
    admission:    AdmissionState,
    settle_tasks: Vec<AbortHandle>,
}

impl<J> DirectoryState<J> {
    fn aggregate(&self, now_ms: u64) -> f64 {
        aggregate_speed(&self.active, now_ms)
    }

    fn promote_head(&mut self, now_ms: u64) -> Option<Promotion<J>> {
        if !self.admission.promote(!self.queued.is_empty()) {
            return None;
        }
        let (record, job) = self.queued.pop_front()?;
        record.mark_started(now_ms);
        self.active.push(Arc::clone(&record));
        Some(Promotion { record, job })
    }
}

pub struct TransferDirectory<J> {
    direction: Direction,
    state:     Mutex<DirectoryState<J>>,
}

impl<J> TransferDirectory<J> {
    pub fn new(direction: Direction, growth_factor: f64) -> Self {
        Self {
            direction,
            state: Mutex::new(DirectoryState {
                active:       Vec::new(),
                queued:       VecDeque::new(),
                admission:    AdmissionState::new(growth_factor),
                settle_tasks: Vec::new(),
            }),
        }
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    fn lock(&self) -> MutexGuard<'_, DirectoryState<J>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Admit `record` now or append it to the queue.
    ///
    /// An open gate is consumed by the admission. `immediate` bypasses the gate
    /// without consuming it.
    pub fn enqueue(
        &self,
        record: Arc<TransferRecord>,
        job: J,
        immediate: bool,
        now_ms: u64,
    ) -> Option<Promotion<J>> {
        let mut state = self.lock();
        if immediate || state.admission.take_gate() {
            debug!(
                direction = %self.direction,
                id = %record.id(),
                immediate,
                active = state.active.len() + 1,
                "admitted"
            );
            record.mark_started(now_ms);
            state.active.push(Arc::clone(&record));
            return Some(Promotion { record, job });
        }
        debug!(
            direction = %self.direction,
            id = %record.id(),
            position = state.queued.len(),
            "queued"
        );
        state.queued.push_back((record, job));
        None
    }

    /// A transfer has been active longer than the warm-up interval.
    pub fn on_threshold_crossed(&self, now_ms: u64) -> Option<Promotion<J>> {
        let mut state = self.lock();
        let aggregate = state.aggregate(now_ms);
        let has_queued = !state.queued.is_empty();
        let promote = state.admission.threshold_crossed(aggregate, has_queued);
        let trend = state.admission.trend();
        debug!(
            direction = %self.direction,
            prev = trend.previous,
            curr = trend.current,
            admit_more = state.admission.admit_more(),
            "threshold crossed"
        );
        if !promote {
            return None;
        }
        let promotion = state.promote_head(now_ms);
        log_promotion(self.direction, promotion.as_ref(), "climbing throughput");
        promotion
    }

    /// A transfer of this direction reached its terminal state and has
    /// already been removed.
    pub fn on_transfer_ended(&self, now_ms: u64) -> TransferEnded<J> {
        let mut state = self.lock();
        let aggregate = state.aggregate(now_ms);
        state.admission.transfer_ended(aggregate);
        let trend = state.admission.trend();
        debug!(
            direction = %self.direction,
            prev = trend.previous,
            curr = trend.current,
            active = state.active.len(),
            queued = state.queued.len(),
            "transfer ended"
        );
        if !state.active.is_empty() {
            return TransferEnded::Settle;
        }
        match state.promote_head(now_ms) {
            Some(promotion) => {
                log_promotion(self.direction, Some(&promotion), "directory idle");
                TransferEnded::Promoted(promotion)
            }
            None => TransferEnded::Idle,
        }
    }

    /// Re-sample after the settle delay and promote the queue head, if any.
    pub fn settle(&self, now_ms: u64) -> Option<Promotion<J>> {
        let mut state = self.lock();
        let aggregate = state.aggregate(now_ms);
        state.admission.settled(aggregate);
        state.settle_tasks.retain(|task| !task.is_finished());
        let promotion = state.promote_head(now_ms);
        log_promotion(self.direction, promotion.as_ref(), "settled");
        promotion
    }

    /// Drop `record` from the active list and the queue.
    pub fn remove(&self, record: &Arc<TransferRecord>) -> bool {
        let mut state = self.lock();
        let before = state.active.len() + state.queued.len();
        state.active.retain(|r| !Arc::ptr_eq(r, record));
        state.queued.retain(|(r, _)| !Arc::ptr_eq(r, record));
        before != state.active.len() + state.queued.len()
    }

    /// Take a still-queued transfer out of the queue.
    pub fn take_queued(&self, id: TransferId) -> Option<(Arc<TransferRecord>, J)> {
        let mut state = self.lock();
        let index = state.queued.iter().position(|(r, _)| r.id() == id)?;
        state.queued.remove(index)
    }

    /// Take every queued transfer, in queue order.
    pub fn drain_queued(&self) -> Vec<(Arc<TransferRecord>, J)> {
        self.lock().queued.drain(..).collect()
    }

    pub fn track_settle(&self, task: AbortHandle) {
        let mut state = self.lock();
        state.settle_tasks.retain(|task| !task.is_finished());
        state.settle_tasks.push(task);
    }

    pub fn cancel_settles(&self) {
        for task in self.lock().settle_tasks.drain(..) {
            task.abort();
        }
    }

    pub fn active_len(&self) -> usize {
        self.lock().active.len()
    }

    pub fn queued_len(&self) -> usize {
        self.lock().queued.len()
    }

    pub fn admit_more(&self) -> bool {
        self.lock().admission.admit_more()
    }

    pub fn snapshot(&self) -> DirectorySnapshot {
        let state = self.lock();
        DirectorySnapshot {
            direction:  self.direction,
            active:     state.active.iter().map(|r| TransferSnapshot::from(&**r)).collect(),
            queued:     state
                .queued
                .iter()
                .map(|(r, _)| TransferSnapshot::from(&**r))
                .collect(),
            trend:      state.admission.trend(),
            admit_more: state.admission.admit_more(),
        }
    }
}

fn log_promotion<J>(direction: Direction, promotion: Option<&Promotion<J>>, reason: &str) {
    if let Some(promotion) = promotion {
        debug!(%direction, id = %promotion.record.id(), reason, "promoted from queue");
    }
}

impl<J> std::fmt::Debug for TransferDirectory<J> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.lock();
        f.debug_struct("TransferDirectory")
            .field("direction", &self.direction)
            .field("active", &state.active.len())
            .field("queued", &state.queued.len())
            .field("admission", &state.admission)
            .finish()
    }
}
