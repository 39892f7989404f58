//! Feed entries - the renderable units of an aggregated feed

use std::cmp::Ordering;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{DateRange, Log, LogId, Place, TripCreation, TripId, User};

/// Opaque pagination token
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Cursor(String);

impl Cursor {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Cursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Whose content a page was built from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedScope {
    /// Activity of the users the viewer follows
    #[default]
    Following,
    /// Public activity shown when the viewer has nothing to follow
    Discovery,
}

impl FeedScope {
    pub fn is_discovery(&self) -> bool {
        matches!(self, FeedScope::Discovery)
    }
}

/// Condensed log shown inside a trip card
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogSummary {
    pub id: LogId,
    pub place: Place,
    pub rating: u8,
    pub note: Option<String>,
    pub photo_urls: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl From<&Log> for LogSummary {
    fn from(log: &Log) -> Self {
        Self {
            id: log.id.clone(),
            place: log.place.clone(),
            rating: log.rating,
            note: log.note.clone(),
            photo_urls: log.photo_urls.clone(),
            created_at: log.created_at,
        }
    }
}

/// A trip with the logs grouped under it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TripEntry {
    pub id: TripId,
    pub user: User,
    pub name: String,
    pub cover_photo_url: Option<String>,
    pub date_range: Option<DateRange>,
    /// Most recent first
    pub log_summaries: Vec<LogSummary>,
    pub latest_activity_at: DateTime<Utc>,
}

impl TripEntry {
    pub fn contains_log(&self, log_id: &str) -> bool {
        self.log_summaries.iter().any(|s| s.id == log_id)
    }

    /// Build a new trip entry with `other`'s summaries folded in.
    ///
    /// Summaries already present are kept once; ordering and
    /// `latest_activity_at` are recomputed.
    pub fn combined_with(&self, other: &TripEntry) -> TripEntry {
        let mut log_summaries = self.log_summaries.clone();
        for summary in &other.log_summaries {
            if !self.contains_log(&summary.id) {
                log_summaries.push(summary.clone());
            }
        }
        log_summaries.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| a.id.cmp(&b.id)));

        TripEntry {
            latest_activity_at: self.latest_activity_at.max(other.latest_activity_at),
            log_summaries,
            ..self.clone()
        }
    }
}

/// One renderable unit of the feed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FeedEntry {
    Trip(TripEntry),
    Log(Log),
    TripCreated(TripCreation),
}

impl FeedEntry {
    pub fn id(&self) -> &str {
        match self {
            FeedEntry::Trip(t) => &t.id,
            FeedEntry::Log(l) => &l.id,
            FeedEntry::TripCreated(c) => &c.id,
        }
    }

    /// Timestamp the feed is ordered by
    pub fn sort_timestamp(&self) -> DateTime<Utc> {
        match self {
            FeedEntry::Trip(t) => t.latest_activity_at,
            FeedEntry::Log(l) => l.created_at,
            FeedEntry::TripCreated(c) => c.created_at,
        }
    }

    pub fn user(&self) -> &User {
        match self {
            FeedEntry::Trip(t) => &t.user,
            FeedEntry::Log(l) => &l.user,
            FeedEntry::TripCreated(c) => &c.user,
        }
    }

    /// Trip this entry belongs to, if any
    pub fn trip_id(&self) -> Option<&str> {
        match self {
            FeedEntry::Trip(t) => Some(&t.id),
            FeedEntry::Log(l) => l.trip_id.as_deref(),
            FeedEntry::TripCreated(c) => Some(&c.trip_id),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            FeedEntry::Trip(_) => "trip",
            FeedEntry::Log(_) => "log",
            FeedEntry::TripCreated(_) => "trip_created",
        }
    }

    pub fn as_trip(&self) -> Option<&TripEntry> {
        match self {
            FeedEntry::Trip(t) => Some(t),
            _ => None,
        }
    }
}

/// Feed ordering: newest first, ties broken by id ascending
pub fn feed_order(a: &FeedEntry, b: &FeedEntry) -> Ordering {
    b.sort_timestamp()
        .cmp(&a.sort_timestamp())
        .then_with(|| a.id().cmp(b.id()))
}

/// One merged page
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeedPage {
    /// Reverse-chronological
    pub entries: Vec<FeedEntry>,
    pub cursor: Option<Cursor>,
    pub has_more: bool,
    pub scope: FeedScope,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Coordinates;
    use chrono::TimeZone;

    fn user() -> User {
        User {
            id: "u1".into(),
            username: "aki".into(),
            avatar_url: None,
            is_public: true,
        }
    }

    fn place() -> Place {
        Place {
            id: "p1".into(),
            name: "Ichiran".into(),
            address: "Shibuya".into(),
            coordinates: Coordinates {
                latitude: 35.66,
                longitude: 139.70,
            },
            photo_reference: None,
            city_name: "Tokyo".into(),
        }
    }

    fn log(id: &str, day: u32) -> Log {
        Log {
            id: id.into(),
            user: user(),
            place: place(),
            rating: 4,
            note: None,
            tags: vec![],
            photo_urls: vec![],
            created_at: Utc.with_ymd_and_hms(2024, 5, day, 12, 0, 0).unwrap(),
            trip_id: None,
        }
    }

    #[test]
    fn test_feed_order_newest_first_then_id() {
        let mut entries = vec![
            FeedEntry::Log(log("b", 1)),
            FeedEntry::Log(log("c", 2)),
            FeedEntry::Log(log("a", 1)),
        ];
        entries.sort_by(feed_order);

        let ids: Vec<_> = entries.iter().map(|e| e.id()).collect();
        assert_eq!(ids, vec!["c", "a", "b"]);
    }

    #[test]
    fn test_combined_trip_keeps_summaries_once() {
        let trip = TripEntry {
            id: "t1".into(),
            user: user(),
            name: "Tokyo Trip".into(),
            cover_photo_url: None,
            date_range: None,
            log_summaries: vec![LogSummary::from(&log("l3", 3))],
            latest_activity_at: Utc.with_ymd_and_hms(2024, 5, 3, 12, 0, 0).unwrap(),
        };
        let older = TripEntry {
            log_summaries: vec![
                LogSummary::from(&log("l1", 1)),
                LogSummary::from(&log("l3", 3)),
            ],
            latest_activity_at: Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap(),
            ..trip.clone()
        };

        let combined = trip.combined_with(&older);
        let ids: Vec<_> = combined.log_summaries.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["l3", "l1"]);
        assert_eq!(combined.latest_activity_at, trip.latest_activity_at);
    }

    #[test]
    fn test_entry_serializes_with_kind_tag() {
        let entry = FeedEntry::Log(log("l1", 1));
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["kind"], "log");
        assert_eq!(json["id"], "l1");
    }
}
