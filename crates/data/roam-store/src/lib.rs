//! # Roam Store
//!
//! Adapters between a backing store and the feed engine.
//!
//! - [`EntrySource`] fetches raw logs, trips and trip creations for a viewer
//!   (or public content in discovery mode)
//! - [`SocialGraph`] answers who a viewer follows
//! - [`MemoryStore`] implements both in memory, with cursor pagination and
//!   push notices; used by tests, fixtures and the CLI

pub mod cursor;
pub mod dataset;
pub mod fixtures;
pub mod memory;
pub mod source;

pub use cursor::PageKey;
pub use dataset::{Dataset, Follow, LogRecord, TripRecord};
pub use memory::{MemoryStore, StoreSettings};
pub use source::{ActivityKind, ActivityNotice, EntrySource, SocialGraph};

/// Result type for store operations
pub type Result<T> = std::result::Result<T, StoreError>;

/// Errors raised while loading or mutating a store
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Unknown user: {0}")]
    UnknownUser(String),

    #[error("Unknown place: {0}")]
    UnknownPlace(String),

    #[error("Unknown trip: {0}")]
    UnknownTrip(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
