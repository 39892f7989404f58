//! # Roam Core
//!
//! Shared data model for the Roam travel journal feed.
//!
//! ```text
//! ┌──────────────┐   ┌──────────────┐   ┌──────────────┐
//! │   RAW DATA   │   │  FEED ENTRY  │   │    PHOTO     │
//! │ Log / Trip / │──►│ Trip / Log / │──►│  RESOLUTION  │
//! │ TripCreation │   │ TripCreated  │   │  (fallbacks) │
//! └──────────────┘   └──────────────┘   └──────────────┘
//! ```
//!
//! Raw records come from a backing store and are read-only projections.
//! Feed entries are built from them by the merge engine in `roam-feed` and
//! are never mutated after construction.

pub mod entry;
pub mod error;
pub mod model;
pub mod photo;

pub use entry::{feed_order, Cursor, FeedEntry, FeedPage, FeedScope, LogSummary, TripEntry};
pub use error::{FeedError, IntegrityWarning, Result};
pub use model::{
    Coordinates, DateRange, Log, LogId, Place, PlaceId, RawFeed, Trip, TripCreation, TripId, User,
    UserId,
};
pub use photo::{EntryPhotoResolver, PhotoChain, PhotoResolver, PhotoSource, PlacePhotoResolver};
