//! # Roam Feed
//!
//! Feed aggregation engine: turns raw activity (logs, trips, trip creation
//! events) into an ordered, de-duplicated, paginated feed per viewer and
//! keeps it live.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                          FEED ENGINE                                │
//! ├─────────────────────────────────────────────────────────────────────┤
//! │                                                                     │
//! │  EntrySource ──► merge ──► FeedPage ──► FeedSession ──► snapshots   │
//! │   (fetch_raw)   (group,                  (paging,        (watch)    │
//! │                  order)                   dedup)                    │
//! │       ▲                                      │                      │
//! │       └──────── realtime watcher ◄───────────┘                      │
//! │                 (new_posts_available)                               │
//! │                                                                     │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Guarantees
//!
//! - logs filed under a visible trip only appear inside that trip
//! - a trip with logs never shows its "trip created" notice
//! - no entry id appears twice across pages
//! - entries are newest first, ties broken by id
//! - realtime updates never reorder what the viewer is looking at

pub mod engine;
pub mod merge;
pub mod paging;
mod realtime;
pub mod session;
pub mod state;

#[cfg(test)]
mod testing;

pub use engine::FeedEngine;
pub use merge::{merge, merge_page, merge_report, Merged};
pub use paging::{append_page, AppendStats};
pub use session::FeedSession;
pub use state::{FeedSnapshot, LoadOutcome, Phase, SessionOptions};
