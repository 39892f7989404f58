//! Terminal and JSON rendering of feed snapshots

use roam_core::{FeedEntry, PhotoChain, PhotoSource};
use roam_feed::FeedSnapshot;
use serde::Serialize;

/// JSON shape printed by `--json`
#[derive(Serialize)]
pub struct FeedReport<'a> {
    pub viewer: &'a str,
    pub discovery: bool,
    pub has_more: bool,
    pub new_posts_available: bool,
    pub entries: &'a [FeedEntry],
}

impl<'a> FeedReport<'a> {
    pub fn new(viewer: &'a str, snapshot: &'a FeedSnapshot) -> Self {
        Self {
            viewer,
            discovery: snapshot.is_discovery_mode,
            has_more: snapshot.has_more,
            new_posts_available: snapshot.new_posts_available,
            entries: &snapshot.entries,
        }
    }
}

pub fn print_json(viewer: &str, snapshot: &FeedSnapshot) -> anyhow::Result<()> {
    println!(
        "{}",
        serde_json::to_string_pretty(&FeedReport::new(viewer, snapshot))?
    );
    Ok(())
}

pub fn print_feed(viewer: &str, snapshot: &FeedSnapshot, photos: &PhotoChain) {
    let heading = if snapshot.is_discovery_mode {
        "Discover"
    } else {
        "Following"
    };
    println!("═══ {} · {} ({} entries) ═══", heading, viewer, snapshot.entries.len());

    if snapshot.entries.is_empty() {
        println!("  (nothing here yet)");
    }
    for entry in snapshot.entries.iter() {
        print_entry(entry, photos);
    }

    if snapshot.has_more {
        println!("  … more available");
    }
}

pub fn print_entry(entry: &FeedEntry, photos: &PhotoChain) {
    let when = entry.sort_timestamp().format("%Y-%m-%d %H:%M");
    match entry {
        FeedEntry::Trip(trip) => {
            println!(
                "  ✈ {}  @{} · {} ({} logs)",
                when,
                trip.user.username,
                trip.name,
                trip.log_summaries.len()
            );
            for summary in &trip.log_summaries {
                println!("      · {} {}", summary.place.name, stars(summary.rating));
            }
        }
        FeedEntry::Log(log) => {
            println!(
                "  ● {}  @{} · {}, {} {}",
                when,
                log.user.username,
                log.place.name,
                log.place.city_name,
                stars(log.rating)
            );
            if let Some(note) = &log.note {
                println!("      \"{}\"", note);
            }
        }
        FeedEntry::TripCreated(created) => {
            println!(
                "  ＋ {}  @{} started a trip: {}",
                when, created.user.username, created.trip_name
            );
        }
    }

    match photos.resolve(entry) {
        Some(PhotoSource::Url(url)) => println!("      photo: {}", url),
        Some(PhotoSource::PlaceReference(reference)) => {
            println!("      photo ref: {}", reference)
        }
        None => {}
    }
}

fn stars(rating: u8) -> String {
    "★".repeat(rating.min(5) as usize)
}
