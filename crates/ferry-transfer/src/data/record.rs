use std::fmt;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use serde::{Deserialize, Serialize};
use tokio::sync::Notify;

use crate::core::{SpeedSample, SpeedWindow};

/// Identifier assigned to a transfer when it is submitted.
///
/// Ids increase monotonically per service and start at 1; 0 means unassigned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TransferId(u64);

impl TransferId {
    pub const UNASSIGNED: TransferId = TransferId(0);

    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }

    pub fn is_assigned(&self) -> bool {
        self.0 != 0
    }
}

impl fmt::Display for TransferId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Direction of a transfer. Each direction has its own queue and speed history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Remote URL to local file.
    Download,
    /// Local file to remote URL.
    Upload,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Download => write!(f, "download"),
            Direction::Upload => write!(f, "upload"),
        }
    }
}

/// Live state of one queued or running transfer.
///
/// Shared via `Arc` between the registry, the directory and the engine task.
/// Timestamps are clock milliseconds, 0 until set.
pub struct TransferRecord {
    id:          AtomicU64,
    direction:   Direction,
    source:      String,
    destination: String,
    background:  bool,

    queued_at:  AtomicU64,
    started_at: AtomicU64,
    ended_at:   AtomicU64,

    /// Aggregate sample point, advanced by every aggregate speed computation.
    last_sample_at:    AtomicU64,
    last_sample_bytes: AtomicU64,

    bytes_transferred: AtomicU64,
    total_bytes:       AtomicU64,

    window: Mutex<SpeedWindow>,
    /// `f64` bits of the current window speed.
    speed:  AtomicU64,

    abort_requested: AtomicBool,
    abort_signal:    Notify,
    terminal:        AtomicBool,
}

impl TransferRecord {
    pub fn new(
        direction: Direction,
        source: impl Into<String>,
        destination: impl Into<String>,
        window: usize,
    ) -> Self {
        Self {
            id: AtomicU64::new(0),
            direction,
            source: source.into(),
            destination: destination.into(),
            background: false,
            queued_at: AtomicU64::new(0),
            started_at: AtomicU64::new(0),
            ended_at: AtomicU64::new(0),
            last_sample_at: AtomicU64::new(0),
            last_sample_bytes: AtomicU64::new(0),
            bytes_transferred: AtomicU64::new(0),
            total_bytes: AtomicU64::new(0),
            window: Mutex::new(SpeedWindow::new(window)),
            speed: AtomicU64::new(0f64.to_bits()),
            abort_requested: AtomicBool::new(false),
            abort_signal: Notify::new(),
            terminal: AtomicBool::new(false),
        }
    }

    #[must_use]
    pub fn with_background(mut self, background: bool) -> Self {
        self.background = background;
        self
    }

    pub fn id(&self) -> TransferId {
        TransferId(self.id.load(Ordering::Acquire))
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn destination(&self) -> &str {
        &self.destination
    }

    pub fn is_background(&self) -> bool {
        self.background
    }

    /// Give the record its id and enqueue timestamp.
    pub fn assign(&self, id: TransferId, now_ms: u64) {
        self.id.store(id.0, Ordering::Release);
        self.queued_at.store(now_ms, Ordering::Release);
    }

    pub fn queued_at(&self) -> u64 {
        self.queued_at.load(Ordering::Acquire)
    }

    pub fn started_at(&self) -> u64 {
        self.started_at.load(Ordering::Acquire)
    }

    pub fn mark_started(&self, now_ms: u64) {
        self.started_at.store(now_ms, Ordering::Release);
    }

    pub fn ended_at(&self) -> u64 {
        self.ended_at.load(Ordering::Acquire)
    }

    pub fn mark_ended(&self, now_ms: u64) {
        self.ended_at.store(now_ms, Ordering::Release);
    }

    pub fn bytes_transferred(&self) -> u64 {
        self.bytes_transferred.load(Ordering::Acquire)
    }

    /// Add to the byte counter and return the new total.
    pub fn add_bytes(&self, bytes: u64) -> u64 {
        self.bytes_transferred.fetch_add(bytes, Ordering::AcqRel) + bytes
    }

    /// Total size in bytes, 0 while unknown.
    pub fn total_bytes(&self) -> u64 {
        self.total_bytes.load(Ordering::Acquire)
    }

    pub fn set_total_bytes(&self, total: u64) {
        self.total_bytes.store(total, Ordering::Release);
    }

    /// Push a tick sample into the speed window and return the updated speed.
    pub fn record_sample(&self, sample: SpeedSample) -> f64 {
        let speed = self
            .window
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push(sample);
        self.speed.store(speed.to_bits(), Ordering::Release);
        speed
    }

    /// Moving-average speed over the last window of ticks, in bytes/ms.
    pub fn speed(&self) -> f64 {
        f64::from_bits(self.speed.load(Ordering::Acquire))
    }

    pub fn window_len(&self) -> usize {
        self.window
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .len()
    }

    /// Ask the owning engine to stop at its next chunk boundary.
    pub fn request_abort(&self) {
        self.abort_requested.store(true, Ordering::Release);
        self.abort_signal.notify_one();
    }

    pub fn is_abort_requested(&self) -> bool {
        self.abort_requested.load(Ordering::Acquire)
    }

    /// Resolves once an abort has been requested.
    pub async fn aborted(&self) {
        while !self.is_abort_requested() {
            self.abort_signal.notified().await;
        }
    }

    /// Claim the single terminal transition. Only the first caller gets `true`.
    pub fn mark_terminal(&self) -> bool {
        !self.terminal.swap(true, Ordering::AcqRel)
    }

    pub fn is_terminal(&self) -> bool {
        self.terminal.load(Ordering::Acquire)
    }

    /// Throughput since the previous aggregate sample point; advances the point.
    pub(crate) fn take_aggregate_sample(&self, now_ms: u64) -> f64 {
        let started = self.started_at();
        if started == 0 {
            return 0.0;
        }
        let bytes = self.bytes_transferred();
        let (since, base_bytes) = match self.last_sample_at.load(Ordering::Acquire) {
            0 => (started, 0),
            at => (at, self.last_sample_bytes.load(Ordering::Acquire)),
        };
        let elapsed = now_ms.saturating_sub(since);
        if elapsed == 0 {
            return 0.0;
        }
        self.last_sample_at.store(now_ms, Ordering::Release);
        self.last_sample_bytes.store(bytes, Ordering::Release);
        bytes.saturating_sub(base_bytes) as f64 / elapsed as f64
    }
}

impl fmt::Debug for TransferRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransferRecord")
            .field("id", &self.id())
            .field("direction", &self.direction)
            .field("source", &self.source)
            .field("destination", &self.destination)
            .field("bytes_transferred", &self.bytes_transferred())
            .field("total_bytes", &self.total_bytes())
            .field("abort_requested", &self.is_abort_requested())
            .finish()
    }
}
