//! Raw records as delivered by a backing store.
//!
//! Users and places are externally owned projections. Logs, trips and trip
//! creation events are the inputs of the merge engine.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::entry::{Cursor, FeedScope};

pub type UserId = String;
pub type PlaceId = String;
pub type LogId = String;
pub type TripId = String;

/// Byline projection of an account
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub username: String,
    #[serde(default)]
    pub avatar_url: Option<String>,
    /// Public accounts are eligible for discovery feeds
    #[serde(default)]
    pub is_public: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

/// Location projection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Place {
    pub id: PlaceId,
    pub name: String,
    #[serde(default)]
    pub address: String,
    pub coordinates: Coordinates,
    /// Provider photo reference, resolved to a URL at render time
    #[serde(default)]
    pub photo_reference: Option<String>,
    #[serde(default)]
    pub city_name: String,
}

/// A rated visit to a place
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Log {
    pub id: LogId,
    pub user: User,
    pub place: Place,
    pub rating: u8,
    #[serde(default)]
    pub note: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub photo_urls: Vec<String>,
    pub created_at: DateTime<Utc>,
    /// Parent trip, if the log was filed under one
    #[serde(default)]
    pub trip_id: Option<TripId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    #[serde(default)]
    pub end: Option<NaiveDate>,
}

/// Trip record; carries no logs of its own
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trip {
    pub id: TripId,
    pub user: User,
    pub name: String,
    #[serde(default)]
    pub cover_photo_url: Option<String>,
    #[serde(default)]
    pub date_range: Option<DateRange>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// "User started a trip" activity event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TripCreation {
    pub id: String,
    pub user: User,
    pub trip_id: TripId,
    pub trip_name: String,
    pub created_at: DateTime<Utc>,
}

/// One adapter fetch: raw inputs for a single feed page
#[derive(Debug, Clone, Default)]
pub struct RawFeed {
    pub logs: Vec<Log>,
    pub trips: Vec<Trip>,
    pub trip_creations: Vec<TripCreation>,
    pub next_cursor: Option<Cursor>,
    pub has_more: bool,
    pub scope: FeedScope,
}

impl RawFeed {
    /// True when the fetch returned no activity at all
    pub fn is_empty(&self) -> bool {
        self.logs.is_empty() && self.trip_creations.is_empty()
    }

    /// Number of activity items (logs and trip creations)
    pub fn activity_count(&self) -> usize {
        self.logs.len() + self.trip_creations.len()
    }

    /// Timestamp the newest entry built from this page sorts at. A log filed
    /// under a trip on the page counts at the trip's latest activity.
    pub fn newest_activity(&self) -> Option<DateTime<Utc>> {
        self.logs
            .iter()
            .map(|l| self.log_activity_at(l))
            .chain(self.trip_creations.iter().map(|c| c.created_at))
            .max()
    }

    fn log_activity_at(&self, log: &Log) -> DateTime<Utc> {
        log.trip_id
            .as_deref()
            .and_then(|id| self.trips.iter().find(|t| t.id == id))
            .map_or(log.created_at, |trip| trip.updated_at.max(log.created_at))
    }
}
