//! Reconciliation error types.

use bucketwatch_core::{ValidationError, WatchId};
use bucketwatch_state::StateError;
use thiserror::Error;

/// Errors that abort a whole run (or prevent one from starting).
#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error("watch {0} is already running")]
    AlreadyRunning(WatchId),

    #[error("invalid watch configuration: {0}")]
    Validation(#[from] ValidationError),

    #[error("listing bucket {bucket} failed: {source}")]
    Listing {
        bucket: String,
        #[source]
        source: ListError,
    },

    #[error("loading snapshot for watch {watch_id} failed: {source}")]
    Snapshot {
        watch_id: WatchId,
        #[source]
        source: StateError,
    },

    #[error("state store error: {0}")]
    State(#[from] StateError),
}

impl ReconcileError {
    /// True when the requested watch does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self, ReconcileError::State(e) if e.is_not_found())
    }
}

pub type ReconcileResult<T> = Result<T, ReconcileError>;

/// Errors raised by object listers.
#[derive(Debug, Error)]
pub enum ListError {
    #[error("bucket not found: {0}")]
    BucketNotFound(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("unexpected status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("decode error: {0}")]
    Decode(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type ListResult<T> = Result<T, ListError>;

/// Errors raised while delivering a notification.
#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("publish to {topic} rejected with status {status}: {body}")]
    Rejected {
        topic: String,
        status: u16,
        body: String,
    },

    #[error("decode error: {0}")]
    Decode(String),
}

pub type NotifyResult<T> = Result<T, NotifyError>;
