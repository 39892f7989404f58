//! Builders for sample data, used by tests and the CLI demo

use chrono::{DateTime, Duration, Utc};
use roam_core::{Coordinates, Log, Place, Trip, User};

use crate::dataset::{Dataset, Follow, LogRecord, TripRecord};

/// 2024-05-01T12:00:00Z
const MAY_FIRST_NOON: i64 = 1_714_564_800;

/// Noon UTC on day `d` of May 2024. `d` is clamped to 1..=31.
pub fn day(d: u32) -> DateTime<Utc> {
    let d = i64::from(d.clamp(1, 31));
    DateTime::<Utc>::UNIX_EPOCH + Duration::seconds(MAY_FIRST_NOON) + Duration::days(d - 1)
}

pub fn user(id: &str, is_public: bool) -> User {
    User {
        id: id.to_string(),
        username: id.to_string(),
        avatar_url: None,
        is_public,
    }
}

pub fn place(id: &str, name: &str, city: &str) -> Place {
    Place {
        id: id.to_string(),
        name: name.to_string(),
        address: format!("{}, {}", name, city),
        coordinates: Coordinates {
            latitude: 35.68,
            longitude: 139.69,
        },
        photo_reference: None,
        city_name: city.to_string(),
    }
}

/// Standalone log at a generic place
pub fn log(id: &str, author: &User, at: DateTime<Utc>) -> Log {
    Log {
        id: id.to_string(),
        user: author.clone(),
        place: place(&format!("place-{}", id), &format!("Place {}", id), "Tokyo"),
        rating: 4,
        note: None,
        tags: Vec::new(),
        photo_urls: Vec::new(),
        created_at: at,
        trip_id: None,
    }
}

/// Log filed under `trip_id`
pub fn trip_log(id: &str, author: &User, trip_id: &str, at: DateTime<Utc>) -> Log {
    Log {
        trip_id: Some(trip_id.to_string()),
        ..log(id, author, at)
    }
}

pub fn trip(id: &str, author: &User, name: &str, at: DateTime<Utc>) -> Trip {
    Trip {
        id: id.to_string(),
        user: author.clone(),
        name: name.to_string(),
        cover_photo_url: None,
        date_range: None,
        created_at: at,
        updated_at: at,
    }
}

/// Viewer `mika` follows `aki`, who started "Tokyo Trip" on day 1, logged
/// two places under it on days 2 and 3 and an untripped place on day 4.
/// `ren` is a public account nobody follows.
pub fn tokyo_dataset() -> Dataset {
    let record = |id: &str, user_id: &str, place_id: &str, d: u32, trip_id: Option<&str>| {
        LogRecord {
            id: id.to_string(),
            user_id: user_id.to_string(),
            place_id: place_id.to_string(),
            rating: 5,
            note: None,
            tags: Vec::new(),
            photo_urls: Vec::new(),
            created_at: day(d),
            trip_id: trip_id.map(String::from),
        }
    };

    Dataset {
        users: vec![user("mika", false), user("aki", true), user("ren", true)],
        places: vec![
            place("ichiran", "Ichiran Shibuya", "Tokyo"),
            place("sensoji", "Senso-ji", "Tokyo"),
            place("kinkakuji", "Kinkaku-ji", "Kyoto"),
            place("dotonbori", "Dotonbori", "Osaka"),
        ],
        follows: vec![Follow {
            follower: "mika".into(),
            followee: "aki".into(),
        }],
        trips: vec![TripRecord {
            id: "tokyo-trip".into(),
            user_id: "aki".into(),
            name: "Tokyo Trip".into(),
            cover_photo_url: None,
            date_range: None,
            created_at: day(1),
            updated_at: None,
        }],
        logs: vec![
            record("aki-ichiran", "aki", "ichiran", 2, Some("tokyo-trip")),
            record("aki-sensoji", "aki", "sensoji", 3, Some("tokyo-trip")),
            record("aki-kinkakuji", "aki", "kinkakuji", 4, None),
            record("ren-dotonbori", "ren", "dotonbori", 5, None),
        ],
    }
}
