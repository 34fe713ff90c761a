//! Download engine.
//!
//! `Requesting -> Streaming -> Finalizing`, any step may fail or be aborted.
//! The body is streamed into a [`PartialFile`] next to the destination and
//! renamed into place once flushed. A failed stream discards the partial file.

use std::path::PathBuf;
use std::sync::Arc;

use bytes::Bytes;
use ferry_fs::PartialFile;
use futures_util::StreamExt;
use tracing::{Instrument, debug, info, info_span, warn};
use url::Url;

use super::http::{BoxStream, HttpClient};
use super::service::ServiceInner;
use crate::core::TransferMeter;
use crate::data::{Direction, TransferCallbacks, TransferRecord};
use crate::error::{Error, Result};

/// Everything a queued download needs once it is admitted.
#[derive(Debug)]
pub(crate) struct DownloadJob {
    pub(crate) destination: PathBuf,
    pub(crate) headers:     Vec<(String, String)>,
    pub(crate) callbacks:   TransferCallbacks,
}

pub(crate) async fn run<C: HttpClient>(
    service: Arc<ServiceInner<C>>,
    record: Arc<TransferRecord>,
    job: DownloadJob,
) {
    let span = info_span!(
        "download",
        id = %record.id(),
        source = record.source(),
        background = record.is_background(),
    );
    async {
        info!(destination = %job.destination.display(), "download started");
        let result = transfer(&service, &record, &job).await.map(|()| None);
        service.finish(&record, &job.callbacks, result);
    }
    .instrument(span)
    .await
}

/// Partial files are hidden and keyed by transfer id so that concurrent
/// downloads into one directory never collide.
fn partial_name(record: &TransferRecord) -> String {
    format!(".ferry-download-{}.part", record.id())
}

async fn transfer<C: HttpClient>(
    service: &ServiceInner<C>,
    record: &TransferRecord,
    job: &DownloadJob,
) -> Result<()> {
    let url = Url::parse(record.source())
        .map_err(|e| Error::InsufficientData(format!("invalid source url {:?}: {e}", record.source())))?;
    if record.is_abort_requested() {
        return Err(Error::Aborted);
    }

    let response = tokio::select! {
        biased;
        _ = record.aborted() => return Err(Error::Aborted),
        response = service.client().get(url.as_str(), &job.headers) => {
            response.map_err(Error::transport)?
        }
    };
    if !response.is_success() {
        return Err(Error::status_code(response.status, response.reason));
    }
    record.set_total_bytes(response.content_length.unwrap_or(0));
    debug!(status = response.status, total = record.total_bytes(), "response received");

    let mut partial = PartialFile::create(&job.destination, partial_name(record)).await?;
    let streamed = stream_body(service, record, response.body, &mut partial, &job.callbacks).await;
    if let Err(err) = streamed {
        if let Err(e) = partial.discard().await {
            warn!(error = %e, "failed to discard partial download");
        }
        return Err(err);
    }

    let placed = partial.commit().await?;
    debug!(path = %placed.display(), bytes = record.bytes_transferred(), "download committed");
    Ok(())
}

async fn stream_body<C: HttpClient>(
    service: &ServiceInner<C>,
    record: &TransferRecord,
    mut body: BoxStream<'static, std::result::Result<Bytes, C::Error>>,
    partial: &mut PartialFile,
    callbacks: &TransferCallbacks,
) -> Result<()> {
    let mut meter = TransferMeter::new(record.started_at(), service.config().warm_up_ms);
    let chunk_size = service.config().effective_chunk_size();

    loop {
        let chunk = tokio::select! {
            biased;
            _ = record.aborted() => return Err(Error::Aborted),
            next = body.next() => match next {
                Some(chunk) => chunk.map_err(Error::transport)?,
                None => return Ok(()),
            },
        };
        for piece in chunk.chunks(chunk_size) {
            if record.is_abort_requested() {
                return Err(Error::Aborted);
            }
            partial.write(piece).await?;
            let bytes = record.add_bytes(piece.len() as u64);
            if meter.observe(record, piece.len() as u64, service.now()) {
                service.threshold_crossed(Direction::Download);
            }
            callbacks.progress(bytes, record.total_bytes());
        }
    }
}
