//! Throughput-aware HTTP transfers.
//!
//! # Architecture
//!
//! This crate follows the three-layer pattern:
//! - [`data`] - Records, requests, configuration and result types
//! - [`core`] - Speed estimation and admission decisions
//! - [`effects`] - HTTP, filesystem and task orchestration
//!
//! # Key Features
//!
//! - **Trend Admission**: a queued transfer starts only while adding concurrency
//!   still raises the measured aggregate throughput of its direction
//! - **Partial Files**: downloads stream into a partial file next to the
//!   destination and are renamed into place on success
//! - **Cooperative Abort**: abort flags are observed at chunk boundaries and
//!   every terminal path runs one cleanup routine
//! - **Duplicate Suppression**: one live transfer per (source, destination)

pub mod core;
pub mod data;
pub mod effects;
mod error;

pub use self::core::{Clock, ManualClock, SpeedSample, SpeedWindow, SystemClock};
pub use data::{
    Direction, DirectorySnapshot, DownloadRequest, ErrorCode, HttpConfig, ServiceSnapshot,
    TransferCallbacks, TransferConfig, TransferFailure, TransferId, TransferOutcome,
    TransferRecord, TransferSnapshot, UploadRequest,
};
pub use effects::{
    BoxStream, HttpClient, HttpResponse, MultipartUpload, TransferService, UploadBody,
    UploadResponse,
};

#[cfg(feature = "reqwest")]
pub use effects::ReqwestClient;

pub use error::{Error, Result};
