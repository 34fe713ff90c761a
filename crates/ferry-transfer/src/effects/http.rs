use std::fmt;
use std::future::Future;
use std::io;
use std::pin::Pin;

use bytes::Bytes;
use futures_util::Stream;

/// A boxed stream type for HTTP response bodies.
pub type BoxStream<'a, T> = Pin<Box<dyn Stream<Item = T> + Send + 'a>>;

/// Outgoing multipart file body. `Sync` so HTTP clients can wrap it freely.
pub type UploadBody = Pin<Box<dyn Stream<Item = io::Result<Bytes>> + Send + Sync>>;

/// Response head plus streaming body of a GET.
pub struct HttpResponse<E> {
    pub status:         u16,
    /// Reason phrase, used as the failure message for non-success statuses.
    pub reason:         String,
    /// Declared `Content-Length`, if any.
    pub content_length: Option<u64>,
    pub body:           BoxStream<'static, Result<Bytes, E>>,
}

impl<E> HttpResponse<E> {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

impl<E> fmt::Debug for HttpResponse<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpResponse")
            .field("status", &self.status)
            .field("reason", &self.reason)
            .field("content_length", &self.content_length)
            .finish_non_exhaustive()
    }
}

/// A single-file multipart form.
pub struct MultipartUpload {
    pub field_name:     String,
    pub file_name:      String,
    pub mime_type:      String,
    /// Declared length of `body`.
    pub content_length: u64,
    pub body:           UploadBody,
}

impl fmt::Debug for MultipartUpload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MultipartUpload")
            .field("field_name", &self.field_name)
            .field("file_name", &self.file_name)
            .field("mime_type", &self.mime_type)
            .field("content_length", &self.content_length)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadResponse {
    pub status: u16,
    pub reason: String,
    pub body:   String,
}

impl UploadResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Asynchronous HTTP client abstraction.
///
/// Implementations own connection setup, TLS, redirects and timeouts. Dropping
/// a returned future or body stream must cancel the underlying request.
///
/// # Implementations
///
/// - [`ReqwestClient`]: Production implementation using `reqwest`
/// - Mock implementations for testing
pub trait HttpClient: Send + Sync + 'static {
    /// Error type for transport-level failures.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Issue a GET with `headers` and return the response head and body.
    ///
    /// Non-success statuses are returned as responses, not errors.
    fn get(
        &self,
        url: &str,
        headers: &[(String, String)],
    ) -> impl Future<Output = Result<HttpResponse<Self::Error>, Self::Error>> + Send;

    /// POST `upload` as `multipart/form-data`, streaming its body.
    fn upload(
        &self,
        url: &str,
        headers: &[(String, String)],
        upload: MultipartUpload,
    ) -> impl Future<Output = Result<UploadResponse, Self::Error>> + Send;
}

#[cfg(feature = "reqwest")]
mod reqwest_impl {
    use reqwest::multipart::{Form, Part};

    use super::*;
    use crate::data::HttpConfig;

    /// Production HTTP client implementation using reqwest.
    #[derive(Debug, Clone)]
    pub struct ReqwestClient {
        client: reqwest::Client,
    }

    impl ReqwestClient {
        /// Create a client with [`HttpConfig::default`].
        pub fn new() -> crate::Result<Self> {
            Self::with_config(&HttpConfig::default())
        }

        pub fn with_config(config: &HttpConfig) -> crate::Result<Self> {
            let client = reqwest::Client::builder()
                .connect_timeout(config.connect_timeout())
                .user_agent(config.user_agent.as_str())
                .build()
                .map_err(crate::Error::transport)?;
            Ok(Self { client })
        }

        pub fn from_client(client: reqwest::Client) -> Self {
            Self { client }
        }
    }

    fn with_headers(
        mut request: reqwest::RequestBuilder,
        headers: &[(String, String)],
    ) -> reqwest::RequestBuilder {
        for (key, value) in headers {
            request = request.header(key.as_str(), value.as_str());
        }
        request
    }

    impl HttpClient for ReqwestClient {
        type Error = reqwest::Error;

        async fn get(
            &self,
            url: &str,
            headers: &[(String, String)],
        ) -> Result<HttpResponse<Self::Error>, Self::Error> {
            let response = with_headers(self.client.get(url), headers).send().await?;
            let status = response.status();
            Ok(HttpResponse {
                status:         status.as_u16(),
                reason:         status.canonical_reason().unwrap_or_default().to_string(),
                content_length: response.content_length(),
                body:           Box::pin(response.bytes_stream()),
            })
        }

        async fn upload(
            &self,
            url: &str,
            headers: &[(String, String)],
            upload: MultipartUpload,
        ) -> Result<UploadResponse, Self::Error> {
            let part = Part::stream_with_length(
                reqwest::Body::wrap_stream(upload.body),
                upload.content_length,
            )
            .file_name(upload.file_name)
            .mime_str(&upload.mime_type)?;
            let form = Form::new().part(upload.field_name, part);

            let response = with_headers(self.client.post(url), headers)
                .multipart(form)
                .send()
                .await?;
            let status = response.status();
            let reason = status.canonical_reason().unwrap_or_default().to_string();
            let body = response.text().await?;
            Ok(UploadResponse {
                status: status.as_u16(),
                reason,
                body,
            })
        }
    }
}

#[cfg(feature = "reqwest")]
pub use reqwest_impl::ReqwestClient;
