//! Error taxonomy for a sync pass.

use thiserror::Error;

/// Failures reported by a [`MeasurementSource`](crate::source::MeasurementSource).
#[derive(Debug, Error)]
pub enum SourceError {
    /// Credentials were rejected. Never retried.
    #[error("authentication failed: {0}")]
    Authentication(String),

    /// Connectivity failure, timeout, or a retryable HTTP status.
    #[error("transient network error: {0}")]
    TransientNetwork(String),

    /// The service answered with something we cannot use.
    #[error("remote service error: {0}")]
    RemoteService(String),
}

impl SourceError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::TransientNetwork(_))
    }
}

/// A single payload could not be turned into a record.
#[derive(Debug, Error, PartialEq)]
#[error("malformed record: field '{field}' {reason}")]
pub struct MalformedRecordError {
    pub field: &'static str,
    pub reason: String,
}

impl MalformedRecordError {
    pub fn new(field: &'static str, reason: impl Into<String>) -> Self {
        Self {
            field,
            reason: reason.into(),
        }
    }
}

/// Local store failures. Writes surface as [`StoreError::Write`] and are fatal for a pass.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to open store at {path}: {source}")]
    Open {
        path: String,
        #[source]
        source: rusqlite::Error,
    },

    #[error("store write failed: {0}")]
    Write(#[source] rusqlite::Error),

    #[error("store read failed: {0}")]
    Read(#[source] rusqlite::Error),

    #[error("stored row is corrupt: {0}")]
    Corrupt(String),
}

/// Outcome of an aborted sync pass.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("authentication failed: {0}")]
    Authentication(String),

    #[error("remote service error: {0}")]
    RemoteService(String),

    #[error("gave up after {attempts} attempts: {last}")]
    RetriesExhausted { attempts: u32, last: String },

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl SyncError {
    pub fn is_authentication(&self) -> bool {
        matches!(self, Self::Authentication(_))
    }
}
