//! Error types for ferry-transfer.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::data::ErrorCode;

#[derive(Debug, Error)]
pub enum Error {
    /// The request could not be built, e.g. an unparsable URL.
    #[error("insufficient data: {0}")]
    InsufficientData(String),

    /// A local file could not be created, read or written.
    #[error("file not found: {}", path.display())]
    FileNotFound {
        path:   PathBuf,
        #[source]
        source: io::Error,
    },

    #[error(transparent)]
    Fs(#[from] ferry_fs::Error),

    /// Transport failure (`status` is `None`) or non-success HTTP status.
    #[error("request failure: {message}")]
    RequestFailure {
        status:  Option<u16>,
        message: String,
    },

    #[error("duplicate request found")]
    DuplicateFound,

    #[error("transfer aborted")]
    Aborted,
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn code(&self) -> ErrorCode {
        match self {
            Error::InsufficientData(_) => ErrorCode::InsufficientData,
            Error::FileNotFound { .. } | Error::Fs(_) => ErrorCode::FileNotFound,
            Error::RequestFailure { .. } => ErrorCode::RequestFailure,
            Error::DuplicateFound => ErrorCode::DuplicateFound,
            Error::Aborted => ErrorCode::Aborted,
        }
    }

    /// HTTP status retained by a request failure, if the server answered.
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::RequestFailure { status, .. } => *status,
            _ => None,
        }
    }

    pub(crate) fn transport(err: impl std::error::Error) -> Self {
        Error::RequestFailure {
            status:  None,
            message: err.to_string(),
        }
    }

    pub(crate) fn status_code(status: u16, reason: impl Into<String>) -> Self {
        Error::RequestFailure {
            status:  Some(status),
            message: reason.into(),
        }
    }

    pub(crate) fn file(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Error::FileNotFound {
            path: path.into(),
            source,
        }
    }
}
