//! Session state, snapshots and outcomes

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use roam_config::{RealtimeMode, RoamConfig};
use roam_core::{Cursor, FeedEntry, FeedError, FeedScope};

/// Controller state machine
///
/// ```text
/// Empty ──► Loading ──► Loaded ◄──► LoadingMore
///                         ▲ │
///                         │ ▼
///                      Refreshing
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Phase {
    #[default]
    Empty,
    Loading,
    Loaded,
    LoadingMore,
    Refreshing,
    /// Session ended; nothing is applied any more
    Closed,
}

/// Per-session tuning
#[derive(Debug, Clone, PartialEq)]
pub struct SessionOptions {
    /// `load_feed` on a loaded feed older than this refetches
    pub stale_after: Option<Duration>,
    pub realtime_mode: RealtimeMode,
    pub poll_interval: Duration,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self::from(&RoamConfig::default())
    }
}

impl From<&RoamConfig> for SessionOptions {
    fn from(config: &RoamConfig) -> Self {
        Self {
            stale_after: config.feed.stale_after(),
            realtime_mode: config.realtime.mode,
            poll_interval: config.realtime.poll_interval(),
        }
    }
}

/// Read-only view handed to the presentation layer
#[derive(Debug, Clone, Default)]
pub struct FeedSnapshot {
    pub phase: Phase,
    pub has_loaded_once: bool,
    /// Initial load or refresh in flight
    pub is_loading: bool,
    pub is_loading_more: bool,
    pub is_discovery_mode: bool,
    pub entries: Arc<Vec<FeedEntry>>,
    pub has_more: bool,
    pub new_posts_available: bool,
    /// Bumped by `show_new_posts`; a change means "scroll to top"
    pub scroll_to_top: u64,
    /// Error of the last failed operation, cleared by the next success
    pub last_error: Option<FeedError>,
}

/// Result of a feed operation that did not fail
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    /// Entries were replaced by a fresh first page
    Loaded { entries: usize },
    /// A page was appended
    Appended { added: usize },
    /// Feed already loaded and fresh
    Unchanged,
    /// No further pages
    Exhausted,
    /// Rejected because a conflicting fetch is in flight
    Busy,
    /// `load_more_feed` before the first page loaded
    NotReady,
    /// Session ended while the fetch was in flight; result dropped
    Discarded,
}

#[derive(Debug, Default)]
pub(crate) struct SessionState {
    pub phase: Phase,
    pub entries: Arc<Vec<FeedEntry>>,
    pub cursor: Option<Cursor>,
    pub has_more: bool,
    pub scope: FeedScope,
    pub has_loaded_once: bool,
    /// Wall clock of the last successful first-page fetch
    pub last_fetch_at: Option<DateTime<Utc>>,
    /// Newest activity timestamp seen; realtime checks ask for newer items
    pub watermark: Option<DateTime<Utc>>,
    pub loaded_at: Option<Instant>,
    pub scroll_to_top: u64,
    pub last_error: Option<FeedError>,
}

impl SessionState {
    pub fn is_stale(&self, stale_after: Option<Duration>) -> bool {
        match (stale_after, self.loaded_at) {
            (Some(window), Some(at)) => at.elapsed() >= window,
            (Some(_), None) => true,
            (None, _) => false,
        }
    }

    pub fn snapshot(&self, new_posts_available: bool) -> FeedSnapshot {
        FeedSnapshot {
            phase: self.phase,
            has_loaded_once: self.has_loaded_once,
            is_loading: matches!(self.phase, Phase::Loading | Phase::Refreshing),
            is_loading_more: self.phase == Phase::LoadingMore,
            is_discovery_mode: self.scope.is_discovery(),
            entries: Arc::clone(&self.entries),
            has_more: self.has_more,
            new_posts_available,
            scroll_to_top: self.scroll_to_top,
            last_error: self.last_error.clone(),
        }
    }
}
