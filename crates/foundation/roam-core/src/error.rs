//! Error taxonomy shared by adapters and the feed engine

use std::fmt;

use crate::model::{LogId, TripId};

/// Result type for feed operations
pub type Result<T> = std::result::Result<T, FeedError>;

/// Errors surfaced to the presentation layer.
///
/// `Clone` so a single in-flight fetch can hand its outcome to every caller
/// that joined it.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FeedError {
    /// Transport failure; the caller may retry
    #[error("Network error: {0}")]
    Network(String),

    /// Session is invalid; the caller must re-authenticate
    #[error("Authentication error: {0}")]
    Auth(String),

    #[error("Feed session closed")]
    SessionClosed,

    #[error("Internal error: {0}")]
    Internal(String),
}

impl FeedError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, FeedError::Network(_))
    }

    pub fn is_auth(&self) -> bool {
        matches!(self, FeedError::Auth(_))
    }
}

/// Inconsistency found while merging; logged, never a failure
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IntegrityWarning {
    /// Log points at a trip that was not delivered (likely deleted)
    MissingTrip { log_id: LogId, trip_id: TripId },
    /// The same id arrived more than once in one fetch
    DuplicateEntry { id: String },
}

impl fmt::Display for IntegrityWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IntegrityWarning::MissingTrip { log_id, trip_id } => {
                write!(f, "log {} references missing trip {}", log_id, trip_id)
            }
            IntegrityWarning::DuplicateEntry { id } => write!(f, "duplicate entry {}", id),
        }
    }
}
