//! JSON datasets for seeding a [`MemoryStore`](crate::MemoryStore).
//!
//! Records are normalized: logs and trips reference users and places by id
//! and are resolved when loaded.

use chrono::{DateTime, Utc};
use roam_core::{DateRange, Place, User};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Dataset {
    pub users: Vec<User>,
    pub places: Vec<Place>,
    pub follows: Vec<Follow>,
    pub trips: Vec<TripRecord>,
    pub logs: Vec<LogRecord>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Follow {
    pub follower: String,
    pub followee: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TripRecord {
    pub id: String,
    pub user_id: String,
    pub name: String,
    #[serde(default)]
    pub cover_photo_url: Option<String>,
    #[serde(default)]
    pub date_range: Option<DateRange>,
    pub created_at: DateTime<Utc>,
    /// Defaults to `created_at`
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogRecord {
    pub id: String,
    pub user_id: String,
    pub place_id: String,
    pub rating: u8,
    #[serde(default)]
    pub note: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub photo_urls: Vec<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub trip_id: Option<String>,
}

impl Dataset {
    pub fn from_json(json: &str) -> crate::Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_path(path: impl AsRef<Path>) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    pub fn to_json(&self) -> crate::Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
