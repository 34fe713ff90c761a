//! Upload engine.
//!
//! The source file is handed to the HTTP client as a streaming multipart body.
//! Progress is measured on that stream as the transport pulls from it, so the
//! counters reflect bytes actually handed over rather than the file size.

use std::io;
use std::path::PathBuf;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use bytes::Bytes;
use futures_util::Stream;
use tokio::fs::File;
use tokio::io::{AsyncRead, ReadBuf};
use tracing::{Instrument, debug, info, info_span};
use url::Url;

use super::http::{HttpClient, MultipartUpload, UploadResponse};
use super::service::ServiceInner;
use crate::core::{Clock, TransferMeter};
use crate::data::{Direction, TransferCallbacks, TransferRecord};
use crate::error::{Error, Result};

#[derive(Debug)]
pub(crate) struct UploadJob {
    pub(crate) source:     PathBuf,
    pub(crate) headers:    Vec<(String, String)>,
    pub(crate) field_name: String,
    pub(crate) file_name:  String,
    pub(crate) mime_type:  String,
    pub(crate) callbacks:  TransferCallbacks,
}

pub(crate) async fn run<C: HttpClient>(
    service: Arc<ServiceInner<C>>,
    record: Arc<TransferRecord>,
    job: UploadJob,
) {
    let span = info_span!(
        "upload",
        id = %record.id(),
        destination = record.destination(),
    );
    async {
        info!(source = %job.source.display(), "upload started");
        let result = transfer(&service, &record, &job).await.map(Some);
        service.finish(&record, &job.callbacks, result);
    }
    .instrument(span)
    .await
}

async fn transfer<C: HttpClient>(
    service: &Arc<ServiceInner<C>>,
    record: &Arc<TransferRecord>,
    job: &UploadJob,
) -> Result<UploadResponse> {
    let url = Url::parse(record.destination()).map_err(|e| {
        Error::InsufficientData(format!("invalid destination url {:?}: {e}", record.destination()))
    })?;
    let file = File::open(&job.source)
        .await
        .map_err(|e| Error::file(&job.source, e))?;
    let length = file
        .metadata()
        .await
        .map_err(|e| Error::file(&job.source, e))?
        .len();
    if record.is_abort_requested() {
        return Err(Error::Aborted);
    }

    let weak = Arc::downgrade(service);
    let body = ProgressBody {
        inner:     FileChunks::new(file, service.config().effective_chunk_size()),
        record:    Arc::clone(record),
        declared:  length,
        meter:     TransferMeter::new(record.started_at(), service.config().warm_up_ms),
        clock:     Arc::clone(service.clock()),
        callbacks: job.callbacks.clone(),
        on_warm_up: Box::new(move || {
            if let Some(service) = weak.upgrade() {
                service.threshold_crossed(Direction::Upload);
            }
        }),
        first:     true,
        done:      false,
    };
    let upload = MultipartUpload {
        field_name:     job.field_name.clone(),
        file_name:      job.file_name.clone(),
        mime_type:      job.mime_type.clone(),
        content_length: length,
        body:           Box::pin(body),
    };

    let response = tokio::select! {
        biased;
        _ = record.aborted() => return Err(Error::Aborted),
        response = service.client().upload(url.as_str(), &job.headers, upload) => {
            response.map_err(|e| {
                if record.is_abort_requested() {
                    Error::Aborted
                } else {
                    Error::transport(e)
                }
            })?
        }
    };
    debug!(status = response.status, bytes = record.bytes_transferred(), "upload response");
    if !response.is_success() {
        return Err(Error::status_code(response.status, response.reason));
    }
    Ok(response)
}

/// Reads a file as a stream of owned chunks.
struct FileChunks {
    file: File,
    buf:  Vec<u8>,
    done: bool,
}

impl FileChunks {
    fn new(file: File, chunk_size: usize) -> Self {
        Self {
            file,
            buf: vec![0; chunk_size.max(1)],
            done: false,
        }
    }
}

impl Stream for FileChunks {
    type Item = io::Result<Bytes>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if this.done {
            return Poll::Ready(None);
        }
        let mut buf = ReadBuf::new(&mut this.buf);
        match Pin::new(&mut this.file).poll_read(cx, &mut buf) {
            Poll::Pending => Poll::Pending,
            Poll::Ready(Err(e)) => {
                this.done = true;
                Poll::Ready(Some(Err(e)))
            }
            Poll::Ready(Ok(())) if buf.filled().is_empty() => {
                this.done = true;
                Poll::Ready(None)
            }
            Poll::Ready(Ok(())) => Poll::Ready(Some(Ok(Bytes::copy_from_slice(buf.filled())))),
        }
    }
}

/// Body decorator that counts bytes as the transport consumes them and turns
/// an abort request into a stream error.
struct ProgressBody<S> {
    inner:      S,
    record:     Arc<TransferRecord>,
    declared:   u64,
    meter:      TransferMeter,
    clock:      Arc<dyn Clock>,
    callbacks:  TransferCallbacks,
    on_warm_up: Box<dyn Fn() + Send + Sync>,
    first:      bool,
    done:       bool,
}

impl<S> Stream for ProgressBody<S>
where
    S: Stream<Item = io::Result<Bytes>> + Unpin,
{
    type Item = io::Result<Bytes>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if this.done {
            return Poll::Ready(None);
        }
        if this.record.is_abort_requested() {
            this.done = true;
            return Poll::Ready(Some(Err(io::Error::new(
                io::ErrorKind::Interrupted,
                "transfer aborted",
            ))));
        }
        let chunk = match Pin::new(&mut this.inner).poll_next(cx) {
            Poll::Ready(Some(Ok(chunk))) => chunk,
            Poll::Ready(None) => {
                this.done = true;
                debug!(bytes = this.record.bytes_transferred(), "upload body handed over");
                return Poll::Ready(None);
            }
            other => return other,
        };

        if this.first {
            this.first = false;
            this.record.set_total_bytes(this.declared);
        }
        let len = chunk.len() as u64;
        let bytes = this.record.add_bytes(len);
        if this.meter.observe(&this.record, len, this.clock.now_ms()) {
            (this.on_warm_up)();
        }
        this.callbacks.progress(bytes, this.record.total_bytes());
        Poll::Ready(Some(Ok(chunk)))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use futures_util::{StreamExt, stream};

    use super::*;
    use crate::core::ManualClock;
    use crate::data::TransferId;

    fn started_record() -> Arc<TransferRecord> {
        let record = TransferRecord::new(Direction::Upload, "/tmp/src", "http://h/u", 150);
        record.assign(TransferId::new(1), 1_000);
        record.mark_started(1_000);
        Arc::new(record)
    }

    fn progress_body(
        chunks: Vec<&'static [u8]>,
        record: Arc<TransferRecord>,
        clock: Arc<ManualClock>,
        seen: Arc<Mutex<Vec<(u64, u64)>>>,
    ) -> ProgressBody<impl Stream<Item = io::Result<Bytes>> + Unpin> {
        let declared = chunks.iter().map(|c| c.len() as u64).sum();
        ProgressBody {
            inner: stream::iter(chunks.into_iter().map(|c| Ok(Bytes::from_static(c)))),
            record,
            declared,
            meter: TransferMeter::new(1_000, 1_000),
            clock,
            callbacks: TransferCallbacks::new()
                .on_progress(move |bytes, total| seen.lock().unwrap().push((bytes, total))),
            on_warm_up: Box::new(|| {}),
            first: true,
            done: false,
        }
    }

    #[tokio::test]
    async fn test_progress_body_counts_handed_over_bytes() {
        let record = started_record();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let body = progress_body(
            vec![b"abc", b"defg"],
            Arc::clone(&record),
            Arc::new(ManualClock::new(1_000)),
            Arc::clone(&seen),
        );

        let chunks: Vec<_> = body.map(|c| c.unwrap()).collect().await;
        assert_eq!(chunks.concat(), b"abcdefg");
        assert_eq!(record.bytes_transferred(), 7);
        assert_eq!(record.total_bytes(), 7);
        assert_eq!(*seen.lock().unwrap(), vec![(3, 7), (7, 7)]);
    }

    #[tokio::test]
    async fn test_progress_body_yields_error_on_abort() {
        let record = started_record();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut body = progress_body(
            vec![b"abc", b"def"],
            Arc::clone(&record),
            Arc::new(ManualClock::new(1_000)),
            seen,
        );

        assert!(body.next().await.unwrap().is_ok());
        record.request_abort();
        let err = body.next().await.unwrap().unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::Interrupted);
        assert!(body.next().await.is_none());
        assert_eq!(record.bytes_transferred(), 3);
    }

    #[tokio::test]
    async fn test_file_chunks_reads_whole_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.bin");
        let data: Vec<u8> = (0..10_000u32).map(|i| (i % 251) as u8).collect();
        std::fs::write(&path, &data).unwrap();

        let file = File::open(&path).await.unwrap();
        let chunks: Vec<Bytes> = FileChunks::new(file, 4_096)
            .map(|c| c.unwrap())
            .collect()
            .await;
        assert!(chunks.iter().all(|c| c.len() <= 4_096));
        assert_eq!(chunks.concat(), data);
    }
}
