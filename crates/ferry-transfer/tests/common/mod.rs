#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use bytes::Bytes;
use ferry_transfer::{
    HttpClient, HttpResponse, MultipartUpload, TransferCallbacks, TransferFailure,
    TransferOutcome, UploadResponse,
};
use futures_util::{StreamExt, stream};
use tokio::sync::{Notify, mpsc};

#[derive(Debug, Clone, thiserror::Error)]
#[error("{0}")]
pub struct MockError(pub String);

pub type ChunkSender = mpsc::UnboundedSender<Result<Bytes, MockError>>;

enum Route {
    Body {
        status:         u16,
        reason:         String,
        content_length: Option<u64>,
        chunks:         Vec<Bytes>,
    },
    Channel {
        content_length: Option<u64>,
        receiver:       mpsc::UnboundedReceiver<Result<Bytes, MockError>>,
    },
    Fail(String),
}

#[derive(Debug, Clone)]
pub struct RecordedUpload {
    pub url:        String,
    pub headers:    Vec<(String, String)>,
    pub field_name: String,
    pub file_name:  String,
    pub mime_type:  String,
    pub declared:   u64,
    pub body:       Vec<u8>,
}

#[derive(Default)]
struct MockState {
    routes:          Mutex<HashMap<String, Route>>,
    requests:        Mutex<Vec<(String, Vec<(String, String)>)>>,
    uploads:         Mutex<Vec<RecordedUpload>>,
    upload_response: Mutex<Option<(u16, String, String)>>,
    upload_hold:     Mutex<Option<Arc<Notify>>>,
}

/// In-memory [`HttpClient`] with per-URL canned responses.
#[derive(Clone, Default)]
pub struct MockClient {
    state: Arc<MockState>,
}

impl MockClient {
    pub fn new() -> Self {
        Self::default()
    }

    fn route(&self, url: &str, route: Route) {
        self.state.routes.lock().unwrap().insert(url.to_string(), route);
    }

    /// Serve `body` in one chunk with a `Content-Length`.
    pub fn serve(&self, url: &str, body: &[u8]) {
        self.serve_chunks(url, vec![body.to_vec()], Some(body.len() as u64));
    }

    pub fn serve_chunks(&self, url: &str, chunks: Vec<Vec<u8>>, content_length: Option<u64>) {
        self.route(url, Route::Body {
            status: 200,
            reason: "OK".to_string(),
            content_length,
            chunks: chunks.into_iter().map(Bytes::from).collect(),
        });
    }

    pub fn serve_status(&self, url: &str, status: u16, reason: &str) {
        self.route(url, Route::Body {
            status,
            reason: reason.to_string(),
            content_length: None,
            chunks: Vec::new(),
        });
    }

    /// Serve a body fed chunk by chunk through the returned sender. Dropping
    /// the sender ends the body. The route answers a single request.
    pub fn serve_channel(&self, url: &str, content_length: Option<u64>) -> ChunkSender {
        let (sender, receiver) = mpsc::unbounded_channel();
        self.route(url, Route::Channel {
            content_length,
            receiver,
        });
        sender
    }

    pub fn fail(&self, url: &str, message: &str) {
        self.route(url, Route::Fail(message.to_string()));
    }

    pub fn respond_upload(&self, status: u16, reason: &str, body: &str) {
        *self.state.upload_response.lock().unwrap() =
            Some((status, reason.to_string(), body.to_string()));
    }

    /// Make uploads stall after the first body chunk until notified.
    pub fn hold_uploads(&self) -> Arc<Notify> {
        let notify = Arc::new(Notify::new());
        *self.state.upload_hold.lock().unwrap() = Some(Arc::clone(&notify));
        notify
    }

    pub fn requests(&self) -> Vec<(String, Vec<(String, String)>)> {
        self.state.requests.lock().unwrap().clone()
    }

    pub fn uploads(&self) -> Vec<RecordedUpload> {
        self.state.uploads.lock().unwrap().clone()
    }
}

impl HttpClient for MockClient {
    type Error = MockError;

    async fn get(
        &self,
        url: &str,
        headers: &[(String, String)],
    ) -> Result<HttpResponse<MockError>, MockError> {
        self.state
            .requests
            .lock()
            .unwrap()
            .push((url.to_string(), headers.to_vec()));

        let route = {
            let mut routes = self.state.routes.lock().unwrap();
            match routes.get(url) {
                Some(Route::Channel { .. }) => routes.remove(url),
                Some(Route::Body {
                    status,
                    reason,
                    content_length,
                    chunks,
                }) => Some(Route::Body {
                    status:         *status,
                    reason:         reason.clone(),
                    content_length: *content_length,
                    chunks:         chunks.clone(),
                }),
                Some(Route::Fail(message)) => Some(Route::Fail(message.clone())),
                None => None,
            }
        };

        match route {
            Some(Route::Body {
                status,
                reason,
                content_length,
                chunks,
            }) => Ok(HttpResponse {
                status,
                reason,
                content_length,
                body: Box::pin(stream::iter(chunks.into_iter().map(Ok))),
            }),
            Some(Route::Channel {
                content_length,
                receiver,
            }) => Ok(HttpResponse {
                status: 200,
                reason: "OK".to_string(),
                content_length,
                body: Box::pin(stream::unfold(receiver, |mut receiver| async move {
                    receiver.recv().await.map(|item| (item, receiver))
                })),
            }),
            Some(Route::Fail(message)) => Err(MockError(message)),
            None => Ok(HttpResponse {
                status:         404,
                reason:         "Not Found".to_string(),
                content_length: None,
                body:           Box::pin(stream::empty()),
            }),
        }
    }

    async fn upload(
        &self,
        url: &str,
        headers: &[(String, String)],
        upload: MultipartUpload,
    ) -> Result<UploadResponse, MockError> {
        let hold = self.state.upload_hold.lock().unwrap().clone();
        let MultipartUpload {
            field_name,
            file_name,
            mime_type,
            content_length,
            mut body,
        } = upload;

        let mut received = Vec::new();
        let mut first = true;
        while let Some(chunk) = body.next().await {
            let chunk = chunk.map_err(|e| MockError(e.to_string()))?;
            received.extend_from_slice(&chunk);
            if first {
                first = false;
                if let Some(hold) = &hold {
                    hold.notified().await;
                }
            }
        }

        self.state.uploads.lock().unwrap().push(RecordedUpload {
            url: url.to_string(),
            headers: headers.to_vec(),
            field_name,
            file_name,
            mime_type,
            declared: content_length,
            body: received,
        });

        let (status, reason, body) = self
            .state
            .upload_response
            .lock()
            .unwrap()
            .clone()
            .unwrap_or((200, "OK".to_string(), String::new()));
        Ok(UploadResponse {
            status,
            reason,
            body,
        })
    }
}

#[derive(Debug, Clone)]
pub enum Event {
    Progress(u64, u64),
    Success(TransferOutcome),
    Error(TransferFailure),
}

/// Collects every callback invocation of the transfers it is attached to.
#[derive(Clone, Default)]
pub struct Events {
    events: Arc<Mutex<Vec<Event>>>,
}

impl Events {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn callbacks(&self) -> TransferCallbacks {
        let progress = Arc::clone(&self.events);
        let success = Arc::clone(&self.events);
        let error = Arc::clone(&self.events);
        TransferCallbacks::new()
            .on_progress(move |bytes, total| {
                progress.lock().unwrap().push(Event::Progress(bytes, total))
            })
            .on_success(move |outcome| success.lock().unwrap().push(Event::Success(outcome)))
            .on_error(move |failure| error.lock().unwrap().push(Event::Error(failure)))
    }

    pub fn all(&self) -> Vec<Event> {
        self.events.lock().unwrap().clone()
    }

    pub fn progress(&self) -> Vec<(u64, u64)> {
        self.all()
            .into_iter()
            .filter_map(|e| match e {
                Event::Progress(bytes, total) => Some((bytes, total)),
                _ => None,
            })
            .collect()
    }

    pub fn successes(&self) -> Vec<TransferOutcome> {
        self.all()
            .into_iter()
            .filter_map(|e| match e {
                Event::Success(outcome) => Some(outcome),
                _ => None,
            })
            .collect()
    }

    pub fn failures(&self) -> Vec<TransferFailure> {
        self.all()
            .into_iter()
            .filter_map(|e| match e {
                Event::Error(failure) => Some(failure),
                _ => None,
            })
            .collect()
    }

    /// Number of terminal callbacks received.
    pub fn terminal(&self) -> usize {
        self.successes().len() + self.failures().len()
    }

    pub fn bytes(&self) -> u64 {
        self.progress().last().map(|(bytes, _)| *bytes).unwrap_or(0)
    }
}

/// Poll `condition` until it holds, failing the test after five seconds.
pub async fn wait_until(mut condition: impl FnMut() -> bool) {
    let waited = tokio::time::timeout(Duration::from_secs(5), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await;
    assert!(waited.is_ok(), "condition not reached in time");
}

pub fn chunk(data: &[u8]) -> Result<Bytes, MockError> {
    Ok(Bytes::copy_from_slice(data))
}
