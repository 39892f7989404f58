//! Appending pages to an already visible feed

use std::collections::{HashMap, HashSet};

use roam_core::FeedEntry;

/// What happened to an appended page
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AppendStats {
    /// New entries pushed to the end
    pub added: usize,
    /// Trips already shown that received older log summaries in place
    pub merged_trips: usize,
    /// Entries dropped as duplicates of something already shown
    pub dropped: usize,
}

/// Append `incoming` to `entries`, de-duplicating by id.
///
/// - a trip already shown absorbs the incoming trip's summaries in place
/// - a log already grouped into a shown trip is dropped
/// - a trip-created notice for a trip already shown is dropped
/// - any other repeated id is dropped
pub fn append_page(entries: &mut Vec<FeedEntry>, incoming: Vec<FeedEntry>) -> AppendStats {
    let mut stats = AppendStats::default();

    let mut positions: HashMap<String, usize> = HashMap::new();
    let mut grouped_logs: HashSet<String> = HashSet::new();
    let mut shown_trips: HashSet<String> = HashSet::new();
    for (pos, entry) in entries.iter().enumerate() {
        positions.insert(entry.id().to_string(), pos);
        if let FeedEntry::Trip(trip) = entry {
            shown_trips.insert(trip.id.clone());
            grouped_logs.extend(trip.log_summaries.iter().map(|s| s.id.clone()));
        }
    }

    for entry in incoming {
        if let FeedEntry::Trip(trip) = &entry {
            let existing = positions.get(&trip.id).and_then(|&pos| {
                entries[pos].as_trip().map(|shown| (pos, shown.combined_with(trip)))
            });
            if let Some((pos, combined)) = existing {
                grouped_logs.extend(combined.log_summaries.iter().map(|s| s.id.clone()));
                entries[pos] = FeedEntry::Trip(combined);
                stats.merged_trips += 1;
                continue;
            }
        }

        let duplicate = match &entry {
            FeedEntry::Log(log) => grouped_logs.contains(&log.id),
            FeedEntry::TripCreated(created) => shown_trips.contains(&created.trip_id),
            FeedEntry::Trip(_) => false,
        } || positions.contains_key(entry.id());

        if duplicate {
            tracing::debug!(id = entry.id(), kind = entry.kind(), "dropping duplicate entry");
            stats.dropped += 1;
            continue;
        }

        if let FeedEntry::Trip(trip) = &entry {
            shown_trips.insert(trip.id.clone());
            grouped_logs.extend(trip.log_summaries.iter().map(|s| s.id.clone()));
        }
        positions.insert(entry.id().to_string(), entries.len());
        entries.push(entry);
        stats.added += 1;
    }

    stats
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::merge::merge;
    use roam_core::TripCreation;
    use roam_store::fixtures::{day, log, trip, trip_log, user};

    #[test]
    fn test_no_id_appears_twice() {
        let aki = user("aki", true);
        let mut entries = merge(
            vec![log("a", &aki, day(5)), log("b", &aki, day(4))],
            vec![],
            vec![],
        );
        let next = merge(
            vec![log("b", &aki, day(4)), log("c", &aki, day(3))],
            vec![],
            vec![],
        );

        let stats = append_page(&mut entries, next);
        let ids: Vec<_> = entries.iter().map(|e| e.id()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
        assert_eq!(stats.added, 1);
        assert_eq!(stats.dropped, 1);
    }

    #[test]
    fn test_trip_split_across_pages_is_combined() {
        let aki = user("aki", true);
        let tokyo = trip("tokyo", &aki, "Tokyo Trip", day(1));

        let mut entries = merge(
            vec![trip_log("l3", &aki, "tokyo", day(3))],
            vec![tokyo.clone()],
            vec![],
        );
        let older = merge(
            vec![
                trip_log("l2", &aki, "tokyo", day(2)),
                log("solo", &aki, day(2)),
            ],
            vec![tokyo],
            vec![],
        );

        let stats = append_page(&mut entries, older);
        assert_eq!(stats.merged_trips, 1);
        assert_eq!(stats.added, 1);

        let ids: Vec<_> = entries.iter().map(|e| e.id()).collect();
        assert_eq!(ids, vec!["tokyo", "solo"]);
        let summaries: Vec<_> = entries[0]
            .as_trip()
            .unwrap()
            .log_summaries
            .iter()
            .map(|s| s.id.as_str())
            .collect();
        assert_eq!(summaries, vec!["l3", "l2"]);
    }

    #[test]
    fn test_grouped_log_and_stale_creation_dropped() {
        let aki = user("aki", true);
        let tokyo = trip("tokyo", &aki, "Tokyo Trip", day(1));
        let mut entries = merge(
            vec![trip_log("l3", &aki, "tokyo", day(3))],
            vec![tokyo.clone()],
            vec![],
        );

        // Older page delivered the log without its trip, plus the creation
        let older = vec![
            FeedEntry::Log(trip_log("l3", &aki, "tokyo", day(3))),
            FeedEntry::TripCreated(TripCreation {
                id: "created-tokyo".into(),
                user: aki.clone(),
                trip_id: "tokyo".into(),
                trip_name: "Tokyo Trip".into(),
                created_at: day(1),
            }),
        ];

        let stats = append_page(&mut entries, older);
        assert_eq!(stats.dropped, 2);
        assert_eq!(entries.len(), 1);
    }
}
