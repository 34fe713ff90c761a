use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::outcome::{TransferFailure, TransferOutcome};

type ProgressFn = Arc<dyn Fn(u64, u64) + Send + Sync>;
type SuccessFn = Arc<dyn Fn(TransferOutcome) + Send + Sync>;
type ErrorFn = Arc<dyn Fn(TransferFailure) + Send + Sync>;

/// Per-transfer callbacks.
///
/// Exactly one of `on_success` / `on_error` is invoked per accepted transfer.
/// `on_progress` receives `(bytes_transferred, total_bytes)` where a total of
/// 0 means the size is unknown. Callbacks run on the transfer's task and
/// should return quickly.
#[derive(Clone, Default)]
pub struct TransferCallbacks {
    on_progress: Option<ProgressFn>,
    on_success:  Option<SuccessFn>,
    on_error:    Option<ErrorFn>,
}

impl TransferCallbacks {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn on_progress(mut self, f: impl Fn(u64, u64) + Send + Sync + 'static) -> Self {
        self.on_progress = Some(Arc::new(f));
        self
    }

    #[must_use]
    pub fn on_success(mut self, f: impl Fn(TransferOutcome) + Send + Sync + 'static) -> Self {
        self.on_success = Some(Arc::new(f));
        self
    }

    #[must_use]
    pub fn on_error(mut self, f: impl Fn(TransferFailure) + Send + Sync + 'static) -> Self {
        self.on_error = Some(Arc::new(f));
        self
    }

    pub(crate) fn progress(&self, bytes: u64, total: u64) {
        if let Some(ref callback) = self.on_progress {
            callback(bytes, total);
        }
    }

    pub(crate) fn success(&self, outcome: TransferOutcome) {
        if let Some(ref callback) = self.on_success {
            callback(outcome);
        }
    }

    pub(crate) fn error(&self, failure: TransferFailure) {
        if let Some(ref callback) = self.on_error {
            callback(failure);
        }
    }
}

impl fmt::Debug for TransferCallbacks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransferCallbacks")
            .field("on_progress", &self.on_progress.is_some())
            .field("on_success", &self.on_success.is_some())
            .field("on_error", &self.on_error.is_some())
            .finish()
    }
}

/// A request to download `source` into the file `destination`.
///
/// # Examples
///
/// ```
/// use ferry_transfer::DownloadRequest;
///
/// let request = DownloadRequest::new("https://example.com/a.bin", "/tmp/a.bin")
///     .header("Authorization", "Bearer token")
///     .immediate(true);
/// assert_eq!(request.headers.len(), 1);
/// ```
#[derive(Debug, Clone)]
pub struct DownloadRequest {
    pub source:      String,
    pub destination: PathBuf,
    pub headers:     Vec<(String, String)>,
    /// Host hint that the transfer runs without a visible UI.
    pub background:  bool,
    /// Start right away, bypassing the queue without consuming the gate.
    pub immediate:   bool,
    pub callbacks:   TransferCallbacks,
}

impl DownloadRequest {
    pub fn new(source: impl Into<String>, destination: impl Into<PathBuf>) -> Self {
        Self {
            source:      source.into(),
            destination: destination.into(),
            headers:     Vec::new(),
            background:  false,
            immediate:   false,
            callbacks:   TransferCallbacks::default(),
        }
    }

    #[must_use]
    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((key.into(), value.into()));
        self
    }

    #[must_use]
    pub fn headers<K, V>(mut self, headers: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.headers
            .extend(headers.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    #[must_use]
    pub fn background(mut self, background: bool) -> Self {
        self.background = background;
        self
    }

    #[must_use]
    pub fn immediate(mut self, immediate: bool) -> Self {
        self.immediate = immediate;
        self
    }

    #[must_use]
    pub fn callbacks(mut self, callbacks: TransferCallbacks) -> Self {
        self.callbacks = callbacks;
        self
    }
}

/// A request to upload the file `source` to the URL `destination` as a
/// multipart form.
#[derive(Debug, Clone)]
pub struct UploadRequest {
    pub source:      PathBuf,
    pub destination: String,
    pub headers:     Vec<(String, String)>,
    /// Form field carrying the file. Default: `file`
    pub field_name:  String,
    /// Default: the source's file name
    pub file_name:   String,
    /// Default: `application/octet-stream`
    pub mime_type:   String,
    pub callbacks:   TransferCallbacks,
}

impl UploadRequest {
    pub fn new(source: impl Into<PathBuf>, destination: impl Into<String>) -> Self {
        let source = source.into();
        let file_name = default_file_name(&source);
        Self {
            source,
            destination: destination.into(),
            headers: Vec::new(),
            field_name: "file".to_string(),
            file_name,
            mime_type: "application/octet-stream".to_string(),
            callbacks: TransferCallbacks::default(),
        }
    }

    #[must_use]
    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((key.into(), value.into()));
        self
    }

    #[must_use]
    pub fn field_name(mut self, field_name: impl Into<String>) -> Self {
        self.field_name = field_name.into();
        self
    }

    #[must_use]
    pub fn file_name(mut self, file_name: impl Into<String>) -> Self {
        self.file_name = file_name.into();
        self
    }

    #[must_use]
    pub fn mime_type(mut self, mime_type: impl Into<String>) -> Self {
        self.mime_type = mime_type.into();
        self
    }

    #[must_use]
    pub fn callbacks(mut self, callbacks: TransferCallbacks) -> Self {
        self.callbacks = callbacks;
        self
    }
}

fn default_file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "upload".to_string())
}
