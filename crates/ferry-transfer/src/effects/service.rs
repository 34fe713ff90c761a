use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use tracing::{info, warn};

use super::directory::{Promotion, TransferDirectory, TransferEnded};
use super::download::{self, DownloadJob};
use super::http::{HttpClient, UploadResponse};
use super::registry::TransferRegistry;
use super::upload::{self, UploadJob};
use crate::core::{Clock, SystemClock};
use crate::data::{
    Direction, DownloadRequest, ServiceSnapshot, TransferCallbacks, TransferConfig,
    TransferFailure, TransferId, TransferOutcome, TransferRecord, UploadRequest,
};
use crate::error::{Error, Result};

/// Entry point for submitting and controlling transfers.
///
/// Owns one directory per direction, the duplicate registry, the HTTP client
/// and the clock. Engines run as tokio tasks, so submissions must happen inside
/// a Tokio runtime. Dropping the service cancels pending settle re-checks;
/// transfers already running finish on their own.
pub struct TransferService<C> {
    inner: Arc<ServiceInner<C>>,
}

pub(crate) struct ServiceInner<C> {
    client:    C,
    config:    TransferConfig,
    clock:     Arc<dyn Clock>,
    registry:  TransferRegistry,
    downloads: TransferDirectory<DownloadJob>,
    uploads:   TransferDirectory<UploadJob>,
    next_id:   AtomicU64,
    this:      Weak<ServiceInner<C>>,
}

impl<C: HttpClient> TransferService<C> {
    /// Create a service with the default configuration and the system clock.
    pub fn new(client: C) -> Self {
        Self::with_config(client, TransferConfig::default())
    }

    pub fn with_config(client: C, config: TransferConfig) -> Self {
        Self::with_clock(client, config, Arc::new(SystemClock))
    }

    /// Create a service reading timestamps from `clock`.
    pub fn with_clock(client: C, config: TransferConfig, clock: Arc<dyn Clock>) -> Self {
        let growth = config.growth_factor;
        let inner = Arc::new_cyclic(|this| ServiceInner {
            client,
            config,
            clock,
            registry: TransferRegistry::new(),
            downloads: TransferDirectory::new(Direction::Download, growth),
            uploads: TransferDirectory::new(Direction::Upload, growth),
            next_id: AtomicU64::new(1),
            this: this.clone(),
        });
        Self { inner }
    }

    /// Submit a download.
    ///
    /// Returns [`Error::DuplicateFound`] without invoking any callback when the
    /// same source and destination are already in flight.
    pub fn submit_download(&self, request: DownloadRequest) -> Result<TransferId> {
        let inner = &self.inner;
        let record = Arc::new(
            TransferRecord::new(
                Direction::Download,
                request.source,
                request.destination.to_string_lossy(),
                inner.config.window_for(Direction::Download),
            )
            .with_background(request.background),
        );
        let id = inner.register(&record)?;
        let job = DownloadJob {
            destination: request.destination,
            headers:     request.headers,
            callbacks:   request.callbacks,
        };
        if let Some(promotion) = inner
            .downloads
            .enqueue(record, job, request.immediate, inner.now())
        {
            inner.launch_download(promotion);
        }
        Ok(id)
    }

    /// Submit a multipart upload of a local file.
    pub fn submit_upload(&self, request: UploadRequest) -> Result<TransferId> {
        let inner = &self.inner;
        let record = Arc::new(TransferRecord::new(
            Direction::Upload,
            request.source.to_string_lossy(),
            request.destination,
            inner.config.window_for(Direction::Upload),
        ));
        let id = inner.register(&record)?;
        let job = UploadJob {
            source:     request.source,
            headers:    request.headers,
            field_name: request.field_name,
            file_name:  request.file_name,
            mime_type:  request.mime_type,
            callbacks:  request.callbacks,
        };
        if let Some(promotion) = inner.uploads.enqueue(record, job, false, inner.now()) {
            inner.launch_upload(promotion);
        }
        Ok(id)
    }

    /// Request abort of one transfer. Returns `false` if it is not in flight.
    ///
    /// A queued transfer fails with [`Error::Aborted`] right away; an active one
    /// stops at its next chunk boundary.
    pub fn abort(&self, id: TransferId) -> bool {
        let Some(direction) = self.inner.registry.abort(id) else {
            return false;
        };
        match direction {
            Direction::Download => {
                if let Some((record, job)) = self.inner.downloads.take_queued(id) {
                    self.inner.finish(&record, &job.callbacks, Err(Error::Aborted));
                }
            }
            Direction::Upload => {
                if let Some((record, job)) = self.inner.uploads.take_queued(id) {
                    self.inner.finish(&record, &job.callbacks, Err(Error::Aborted));
                }
            }
        }
        true
    }

    /// Request abort of every transfer in flight. Returns how many were signalled.
    pub fn abort_all(&self) -> usize {
        let count = self.inner.registry.abort_all();
        for (record, job) in self.inner.downloads.drain_queued() {
            self.inner.finish(&record, &job.callbacks, Err(Error::Aborted));
        }
        for (record, job) in self.inner.uploads.drain_queued() {
            self.inner.finish(&record, &job.callbacks, Err(Error::Aborted));
        }
        if count > 0 {
            info!(count, "abort requested for all transfers");
        }
        count
    }

    pub fn snapshot(&self) -> ServiceSnapshot {
        ServiceSnapshot {
            downloads: self.inner.downloads.snapshot(),
            uploads:   self.inner.uploads.snapshot(),
        }
    }

    pub fn config(&self) -> &TransferConfig {
        &self.inner.config
    }

    /// Number of transfers submitted and not yet terminal.
    pub fn in_flight(&self) -> usize {
        self.inner.registry.len()
    }

    pub fn is_idle(&self) -> bool {
        self.inner.registry.is_empty()
    }
}

impl<C> Drop for TransferService<C> {
    fn drop(&mut self) {
        self.inner.downloads.cancel_settles();
        self.inner.uploads.cancel_settles();
    }
}

impl<C> std::fmt::Debug for TransferService<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransferService")
            .field("config", &self.inner.config)
            .field("downloads", &self.inner.downloads)
            .field("uploads", &self.inner.uploads)
            .finish_non_exhaustive()
    }
}

impl<C: HttpClient> ServiceInner<C> {
    pub(crate) fn client(&self) -> &C {
        &self.client
    }

    pub(crate) fn config(&self) -> &TransferConfig {
        &self.config
    }

    pub(crate) fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    pub(crate) fn now(&self) -> u64 {
        self.clock.now_ms()
    }

    fn downloads(&self) -> &TransferDirectory<DownloadJob> {
        &self.downloads
    }

    fn uploads(&self) -> &TransferDirectory<UploadJob> {
        &self.uploads
    }

    fn register(&self, record: &Arc<TransferRecord>) -> Result<TransferId> {
        self.registry.try_insert(record)?;
        let id = TransferId::new(self.next_id.fetch_add(1, Ordering::Relaxed));
        record.assign(id, self.now());
        Ok(id)
    }

    fn launch_download(&self, promotion: Promotion<DownloadJob>) {
        if let Some(service) = self.this.upgrade() {
            tokio::spawn(download::run(service, promotion.record, promotion.job));
        }
    }

    fn launch_upload(&self, promotion: Promotion<UploadJob>) {
        if let Some(service) = self.this.upgrade() {
            tokio::spawn(upload::run(service, promotion.record, promotion.job));
        }
    }

    /// Warm-up hook called by the engines.
    pub(crate) fn threshold_crossed(&self, direction: Direction) {
        let now = self.now();
        match direction {
            Direction::Download => {
                if let Some(promotion) = self.downloads.on_threshold_crossed(now) {
                    self.launch_download(promotion);
                }
            }
            Direction::Upload => {
                if let Some(promotion) = self.uploads.on_threshold_crossed(now) {
                    self.launch_upload(promotion);
                }
            }
        }
    }

    /// The single terminal transition of a transfer.
    ///
    /// Unregisters the record, reports the result and lets the admission
    /// controller react. Later calls for the same record are ignored.
    pub(crate) fn finish(
        &self,
        record: &Arc<TransferRecord>,
        callbacks: &TransferCallbacks,
        result: Result<Option<UploadResponse>>,
    ) {
        if !record.mark_terminal() {
            return;
        }
        record.mark_ended(self.now());
        let direction = record.direction();
        match direction {
            Direction::Download => self.downloads.remove(record),
            Direction::Upload => self.uploads.remove(record),
        };
        self.registry.remove(record);

        match result {
            Ok(response) => {
                let (status, body) = match response {
                    Some(response) => (Some(response.status), Some(response.body)),
                    None => (None, None),
                };
                let outcome = TransferOutcome::new(record, status, body);
                info!(
                    %direction,
                    id = %outcome.id,
                    bytes = outcome.bytes_transferred,
                    active_ms = outcome.active_ms,
                    queued_ms = outcome.queued_ms,
                    average_speed = outcome.average_speed,
                    "transfer finished"
                );
                callbacks.success(outcome);
            }
            Err(err) => {
                warn!(
                    %direction,
                    id = %record.id(),
                    code = err.code().as_u8(),
                    bytes = record.bytes_transferred(),
                    error = %err,
                    "transfer failed"
                );
                callbacks.error(TransferFailure::new(record.id(), &err));
            }
        }

        // a transfer that never left the queue never contributed throughput
        if record.started_at() != 0 {
            self.transfer_ended(direction);
        }
    }

    fn transfer_ended(&self, direction: Direction) {
        let now = self.now();
        match direction {
            Direction::Download => match self.downloads.on_transfer_ended(now) {
                TransferEnded::Promoted(promotion) => self.launch_download(promotion),
                TransferEnded::Settle => self.schedule_settle(Self::downloads, Self::launch_download),
                TransferEnded::Idle => {}
            },
            Direction::Upload => match self.uploads.on_transfer_ended(now) {
                TransferEnded::Promoted(promotion) => self.launch_upload(promotion),
                TransferEnded::Settle => self.schedule_settle(Self::uploads, Self::launch_upload),
                TransferEnded::Idle => {}
            },
        }
    }

    fn schedule_settle<J: Send + 'static>(
        &self,
        directory: fn(&Self) -> &TransferDirectory<J>,
        launch: fn(&Self, Promotion<J>),
    ) {
        let service = self.this.clone();
        let delay = self.config.settle_delay_duration();
        let task = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let Some(service) = service.upgrade() else {
                return;
            };
            if let Some(promotion) = directory(&service).settle(service.now()) {
                launch(&service, promotion);
            }
        });
        directory(self).track_settle(task.abort_handle());
    }
}
