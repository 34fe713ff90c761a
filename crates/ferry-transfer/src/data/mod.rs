//! Data types shared by the admission engine and the stream engines.
//!
//! [`TransferRecord`] is the only mutable type here; its counters are atomics
//! written by the owning engine and read by speed sampling.

pub mod config;
pub mod outcome;
pub mod record;
pub mod request;

pub use config::{HttpConfig, TransferConfig};
pub use outcome::{
    DirectorySnapshot, ErrorCode, ServiceSnapshot, TransferFailure, TransferOutcome,
    TransferSnapshot,
};
pub use record::{Direction, TransferId, TransferRecord};
pub use request::{DownloadRequest, TransferCallbacks, UploadRequest};
