use std::fmt;

use serde::{Serialize, Serializer};

use super::record::{Direction, TransferId, TransferRecord};
use crate::core::SpeedTrend;
use crate::error::Error;

/// Stable numeric error codes delivered to hosts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    InsufficientData,
    FileNotFound,
    RequestFailure,
    DuplicateFound,
    Aborted,
}

impl ErrorCode {
    pub const fn as_u8(&self) -> u8 {
        match self {
            ErrorCode::InsufficientData => 1,
            ErrorCode::FileNotFound => 2,
            ErrorCode::RequestFailure => 3,
            ErrorCode::DuplicateFound => 4,
            ErrorCode::Aborted => 5,
        }
    }

    pub const fn message(&self) -> &'static str {
        match self {
            ErrorCode::InsufficientData => "Insufficient data",
            ErrorCode::FileNotFound => "File not found",
            ErrorCode::RequestFailure => "Request failure",
            ErrorCode::DuplicateFound => "Duplicate request found",
            ErrorCode::Aborted => "Transfer aborted",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

impl Serialize for ErrorCode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(self.as_u8())
    }
}

/// What `on_error` receives.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransferFailure {
    pub id:      TransferId,
    pub code:    ErrorCode,
    pub message: String,
    /// HTTP status when the server answered with a non-success status.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status:  Option<u16>,
}

impl TransferFailure {
    pub fn new(id: TransferId, error: &Error) -> Self {
        let message = match error {
            Error::RequestFailure { message, .. } if !message.is_empty() => message.clone(),
            Error::InsufficientData(detail) => detail.clone(),
            Error::FileNotFound { .. } | Error::Fs(_) => error.to_string(),
            _ => error.code().message().to_string(),
        };
        Self {
            id,
            code: error.code(),
            message,
            status: error.status(),
        }
    }
}

/// What `on_success` receives.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransferOutcome {
    pub id:                TransferId,
    pub direction:         Direction,
    pub source:            String,
    pub destination:       String,
    pub bytes_transferred: u64,
    /// `None` when the size was never announced.
    pub total_bytes:       Option<u64>,
    /// From admission to completion.
    pub active_ms:         u64,
    /// From submission to admission.
    pub queued_ms:         u64,
    /// Bytes per millisecond over the active time.
    pub average_speed:     f64,
    /// Final HTTP status of an upload.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status:            Option<u16>,
    /// Response body returned by the upload endpoint.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response:          Option<String>,
}

impl TransferOutcome {
    pub(crate) fn new(record: &TransferRecord, status: Option<u16>, response: Option<String>) -> Self {
        let started = record.started_at();
        let active_ms = record.ended_at().saturating_sub(started);
        let bytes = record.bytes_transferred();
        Self {
            id: record.id(),
            direction: record.direction(),
            source: record.source().to_string(),
            destination: record.destination().to_string(),
            bytes_transferred: bytes,
            total_bytes: Some(record.total_bytes()).filter(|total| *total > 0),
            active_ms,
            queued_ms: started.saturating_sub(record.queued_at()),
            average_speed: if active_ms == 0 {
                0.0
            } else {
                bytes as f64 / active_ms as f64
            },
            status,
            response,
        }
    }
}

/// Point-in-time view of one transfer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransferSnapshot {
    pub id:                TransferId,
    pub source:            String,
    pub destination:       String,
    pub bytes_transferred: u64,
    pub total_bytes:       u64,
    pub speed:             f64,
    pub abort_requested:   bool,
}

impl From<&TransferRecord> for TransferSnapshot {
    fn from(record: &TransferRecord) -> Self {
        Self {
            id:                record.id(),
            source:            record.source().to_string(),
            destination:       record.destination().to_string(),
            bytes_transferred: record.bytes_transferred(),
            total_bytes:       record.total_bytes(),
            speed:             record.speed(),
            abort_requested:   record.is_abort_requested(),
        }
    }
}

/// Point-in-time view of one direction's admission state.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DirectorySnapshot {
    pub direction:  Direction,
    pub active:     Vec<TransferSnapshot>,
    /// In promotion order.
    pub queued:     Vec<TransferSnapshot>,
    pub trend:      SpeedTrend,
    pub admit_more: bool,
}

impl DirectorySnapshot {
    pub fn active_ids(&self) -> Vec<TransferId> {
        self.active.iter().map(|t| t.id).collect()
    }

    pub fn queued_ids(&self) -> Vec<TransferId> {
        self.queued.iter().map(|t| t.id).collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ServiceSnapshot {
    pub downloads: DirectorySnapshot,
    pub uploads:   DirectorySnapshot,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_serializes_numeric_code() {
        let failure = TransferFailure::new(
            TransferId::new(3),
            &Error::RequestFailure {
                status:  Some(404),
                message: "Not Found".to_string(),
            },
        );
        let json = serde_json::to_value(&failure).unwrap();
        assert_eq!(json["id"], 3);
        assert_eq!(json["code"], 3);
        assert_eq!(json["message"], "Not Found");
        assert_eq!(json["status"], 404);
    }

    #[test]
    fn test_failure_messages() {
        let aborted = TransferFailure::new(TransferId::new(1), &Error::Aborted);
        assert_eq!(aborted.message, "Transfer aborted");
        assert!(serde_json::to_value(&aborted).unwrap().get("status").is_none());

        let empty = TransferFailure::new(
            TransferId::new(1),
            &Error::RequestFailure {
                status:  Some(500),
                message: String::new(),
            },
        );
        assert_eq!(empty.message, "Request failure");
    }

    #[test]
    fn test_outcome_statistics() {
        let record = TransferRecord::new(Direction::Download, "http://h/a", "/tmp/a", 10);
        record.assign(TransferId::new(9), 1_000);
        record.mark_started(1_500);
        record.add_bytes(4_000);
        record.mark_ended(3_500);

        let outcome = TransferOutcome::new(&record, None, None);
        assert_eq!(outcome.queued_ms, 500);
        assert_eq!(outcome.active_ms, 2_000);
        assert_eq!(outcome.average_speed, 2.0);
        assert_eq!(outcome.total_bytes, None);
    }
}
