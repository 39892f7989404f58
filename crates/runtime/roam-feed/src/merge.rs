//! Merge & grouping
//!
//! ```text
//!  logs ──┬─ trip known ──► grouped ──► Trip entry (summaries newest first)
//!         └─ no/missing trip ─────────► Log entry
//!  creations ─ trip has grouped logs? ─ yes ─► suppressed
//!                                     └ no ──► TripCreated entry
//! ```
//!
//! Output is sorted newest first, ties by id ascending.

use std::collections::{BTreeMap, HashMap, HashSet};

use roam_core::{
    feed_order, FeedEntry, FeedPage, IntegrityWarning, Log, LogSummary, RawFeed, Trip,
    TripCreation, TripEntry, TripId,
};

/// Merge result with the inconsistencies found along the way
#[derive(Debug, Clone, Default)]
pub struct Merged {
    pub entries: Vec<FeedEntry>,
    pub warnings: Vec<IntegrityWarning>,
}

/// Merge raw inputs into ordered feed entries; warnings are logged
pub fn merge(logs: Vec<Log>, trips: Vec<Trip>, creations: Vec<TripCreation>) -> Vec<FeedEntry> {
    let merged = merge_report(logs, trips, creations);
    for warning in &merged.warnings {
        tracing::warn!(%warning, "feed data integrity");
    }
    merged.entries
}

/// Merge one adapter page
pub fn merge_page(raw: RawFeed) -> FeedPage {
    FeedPage {
        entries: merge(raw.logs, raw.trips, raw.trip_creations),
        cursor: raw.next_cursor,
        has_more: raw.has_more,
        scope: raw.scope,
    }
}

pub fn merge_report(
    logs: Vec<Log>,
    trips: Vec<Trip>,
    creations: Vec<TripCreation>,
) -> Merged {
    let mut warnings = Vec::new();

    let mut trips_by_id: BTreeMap<TripId, Trip> = BTreeMap::new();
    for trip in trips {
        if trips_by_id.contains_key(&trip.id) {
            warnings.push(IntegrityWarning::DuplicateEntry { id: trip.id });
            continue;
        }
        trips_by_id.insert(trip.id.clone(), trip);
    }

    let mut seen_logs = HashSet::new();
    let mut grouped: HashMap<TripId, Vec<Log>> = HashMap::new();
    let mut ungrouped = Vec::new();
    for log in logs {
        if !seen_logs.insert(log.id.clone()) {
            warnings.push(IntegrityWarning::DuplicateEntry { id: log.id });
            continue;
        }
        match &log.trip_id {
            Some(trip_id) if trips_by_id.contains_key(trip_id) => {
                grouped.entry(trip_id.clone()).or_default().push(log);
            }
            Some(trip_id) => {
                warnings.push(IntegrityWarning::MissingTrip {
                    log_id: log.id.clone(),
                    trip_id: trip_id.clone(),
                });
                ungrouped.push(log);
            }
            None => ungrouped.push(log),
        }
    }

    let active_trips: HashSet<TripId> = grouped.keys().cloned().collect();
    let mut entries = Vec::with_capacity(active_trips.len() + ungrouped.len() + creations.len());

    // A trip with no grouped logs is never emitted on its own
    for (trip_id, trip) in trips_by_id {
        if let Some(logs) = grouped.remove(&trip_id) {
            entries.push(FeedEntry::Trip(trip_entry(trip, logs)));
        }
    }

    let mut seen_creations = HashSet::new();
    for creation in creations {
        if active_trips.contains(&creation.trip_id) {
            continue;
        }
        if !seen_creations.insert(creation.id.clone()) {
            warnings.push(IntegrityWarning::DuplicateEntry { id: creation.id });
            continue;
        }
        entries.push(FeedEntry::TripCreated(creation));
    }

    entries.extend(ungrouped.into_iter().map(FeedEntry::Log));
    entries.sort_by(feed_order);

    Merged { entries, warnings }
}

fn trip_entry(trip: Trip, mut logs: Vec<Log>) -> TripEntry {
    logs.sort_by(|a, b| {
        b.created_at
            .cmp(&a.created_at)
            .then_with(|| a.id.cmp(&b.id))
    });

    let latest_activity_at = logs
        .iter()
        .map(|l| l.created_at)
        .max()
        .map_or(trip.updated_at, |newest| newest.max(trip.updated_at));

    TripEntry {
        id: trip.id,
        user: trip.user,
        name: trip.name,
        cover_photo_url: trip.cover_photo_url,
        date_range: trip.date_range,
        log_summaries: logs.iter().map(LogSummary::from).collect(),
        latest_activity_at,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use roam_store::fixtures::{day, log, trip, trip_log, user};

    fn creation(id: &str, trip: &Trip) -> TripCreation {
        TripCreation {
            id: id.into(),
            user: trip.user.clone(),
            trip_id: trip.id.clone(),
            trip_name: trip.name.clone(),
            created_at: trip.created_at,
        }
    }

    fn ids(entries: &[FeedEntry]) -> Vec<&str> {
        entries.iter().map(|e| e.id()).collect()
    }

    #[test]
    fn test_tokyo_scenario() {
        let aki = user("aki", true);
        let tokyo = trip("tokyo", &aki, "Tokyo Trip", day(1));

        let entries = merge(
            vec![
                trip_log("day2", &aki, "tokyo", day(2)),
                trip_log("day3", &aki, "tokyo", day(3)),
                log("day4", &aki, day(4)),
            ],
            vec![tokyo.clone()],
            vec![creation("created-tokyo", &tokyo)],
        );

        assert_eq!(ids(&entries), vec!["day4", "tokyo"]);
        let trip = entries[1].as_trip().unwrap();
        assert_eq!(trip.name, "Tokyo Trip");
        let summaries: Vec<_> = trip.log_summaries.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(summaries, vec!["day3", "day2"]);
        assert_eq!(trip.latest_activity_at, day(3));
        assert!(!entries
            .iter()
            .any(|e| matches!(e, FeedEntry::TripCreated(_))));
    }

    #[test]
    fn test_grouped_logs_never_standalone() {
        let aki = user("aki", true);
        let t1 = trip("t1", &aki, "Kyoto", day(1));
        let t2 = trip("t2", &aki, "Osaka", day(1));

        let entries = merge(
            vec![
                trip_log("a", &aki, "t1", day(2)),
                trip_log("b", &aki, "t2", day(3)),
                trip_log("c", &aki, "t1", day(5)),
                log("d", &aki, day(4)),
            ],
            vec![t1, t2],
            vec![],
        );

        let standalone: Vec<_> = entries
            .iter()
            .filter_map(|e| match e {
                FeedEntry::Log(l) => Some(l.id.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(standalone, vec!["d"]);
        assert_eq!(ids(&entries), vec!["t1", "d", "t2"]);
    }

    #[test]
    fn test_creation_suppressed_regardless_of_order() {
        let aki = user("aki", true);
        let t1 = trip("t1", &aki, "Kyoto", day(8));

        let entries = merge(
            vec![trip_log("a", &aki, "t1", day(2))],
            vec![t1.clone()],
            vec![creation("c1", &t1)],
        );
        assert_eq!(ids(&entries), vec!["t1"]);
        // updated_at later than any log wins
        assert_eq!(entries[0].sort_timestamp(), day(8));
    }

    #[test]
    fn test_empty_trip_with_creation_emits_notice() {
        let aki = user("aki", true);
        let t1 = trip("t1", &aki, "Kyoto", day(2));
        let t2 = trip("t2", &aki, "Nara", day(3));

        let entries = merge(vec![], vec![t1.clone(), t2], vec![creation("c1", &t1)]);

        // t2 has neither logs nor a creation event: invisible
        assert_eq!(ids(&entries), vec!["c1"]);
        assert!(matches!(entries[0], FeedEntry::TripCreated(_)));
    }

    #[test]
    fn test_missing_trip_falls_back_to_standalone() {
        let aki = user("aki", true);
        let merged = merge_report(vec![trip_log("a", &aki, "deleted", day(2))], vec![], vec![]);

        assert_eq!(ids(&merged.entries), vec!["a"]);
        assert!(matches!(merged.entries[0], FeedEntry::Log(_)));
        assert_eq!(
            merged.warnings,
            vec![IntegrityWarning::MissingTrip {
                log_id: "a".into(),
                trip_id: "deleted".into()
            }]
        );
    }

    #[test]
    fn test_equal_timestamps_sort_by_id() {
        let aki = user("aki", true);
        let entries = merge(
            vec![
                log("m", &aki, day(2)),
                log("b", &aki, day(2)),
                log("x", &aki, day(2)),
            ],
            vec![],
            vec![],
        );
        assert_eq!(ids(&entries), vec!["b", "m", "x"]);
    }

    #[test]
    fn test_duplicate_log_kept_once() {
        let aki = user("aki", true);
        let merged = merge_report(
            vec![log("a", &aki, day(2)), log("a", &aki, day(2))],
            vec![],
            vec![],
        );
        assert_eq!(merged.entries.len(), 1);
        assert_eq!(
            merged.warnings,
            vec![IntegrityWarning::DuplicateEntry { id: "a".into() }]
        );
    }

    #[test]
    fn test_merge_page_carries_paging_fields() {
        let aki = user("aki", true);
        let raw = RawFeed {
            logs: vec![log("a", &aki, day(2))],
            has_more: true,
            next_cursor: Some(roam_core::Cursor::new("next")),
            ..RawFeed::default()
        };
        let page = merge_page(raw);
        assert!(page.has_more);
        assert_eq!(page.cursor.as_ref().map(|c| c.as_str()), Some("next"));
        assert_eq!(page.entries.len(), 1);
    }
}
