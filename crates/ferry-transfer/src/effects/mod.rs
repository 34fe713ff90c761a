//! I/O and task orchestration.
//!
//! The [`TransferService`] owns one [`TransferDirectory`] per direction and the
//! process-wide [`TransferRegistry`]; the download and upload engines run as
//! tokio tasks and report back to it.

mod directory;
mod download;
mod http;
mod registry;
mod service;
mod upload;

pub use directory::{Promotion, TransferDirectory, TransferEnded};
pub use http::{BoxStream, HttpClient, HttpResponse, MultipartUpload, UploadBody, UploadResponse};
pub use registry::TransferRegistry;
pub use service::TransferService;

#[cfg(feature = "reqwest")]
pub use http::ReqwestClient;
