//! Adapter traits consumed by the feed engine

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use roam_core::{Cursor, RawFeed, Result, UserId};
use tokio::sync::broadcast;

/// Raw feed data for a viewer.
///
/// Implementations have no side effects beyond the fetch. Transport
/// failures map to `FeedError::Network`, invalid sessions to
/// `FeedError::Auth`.
#[async_trait]
pub trait EntrySource: Send + Sync {
    /// Fetch one page of raw activity for `viewer`.
    ///
    /// - `since`: only items with a sort timestamp strictly after it
    /// - `cursor`: continue after a previous page
    ///
    /// When the viewer follows nobody, or nobody they follow has content,
    /// returns public content with `scope = Discovery`.
    async fn fetch_raw(
        &self,
        viewer: &str,
        since: Option<DateTime<Utc>>,
        cursor: Option<&Cursor>,
    ) -> Result<RawFeed>;

    /// Push channel of new activity, if the source supports one
    fn watch(&self) -> Option<broadcast::Receiver<ActivityNotice>> {
        None
    }
}

/// Follow graph
#[async_trait]
pub trait SocialGraph: Send + Sync {
    /// Users `viewer` follows
    async fn following(&self, viewer: &str) -> Result<Vec<UserId>>;

    /// True when the viewer's feed should fall back to discovery content
    async fn is_discovery_eligible(&self, viewer: &str) -> Result<bool>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivityKind {
    Log,
    TripCreated,
}

/// Something new was written to the store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivityNotice {
    pub author_id: UserId,
    pub kind: ActivityKind,
    pub at: DateTime<Utc>,
}
