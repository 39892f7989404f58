//! In-memory backing store
//!
//! Holds users, follows, trips, logs and trip creation events and serves
//! them through [`EntrySource`] with keyset pagination over activity
//! (logs and trip creations, newest first).

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use roam_core::{
    Cursor, FeedError, FeedScope, Log, Place, PlaceId, RawFeed, Trip, TripCreation, TripId, User,
    UserId,
};
use tokio::sync::{broadcast, Mutex, RwLock};
use uuid::Uuid;

use crate::cursor::PageKey;
use crate::dataset::Dataset;
use crate::source::{ActivityKind, ActivityNotice, EntrySource, SocialGraph};
use crate::{Result, StoreError};

const NOTICE_CAPACITY: usize = 64;

/// Paging limits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreSettings {
    /// Activity items per page
    pub page_size: usize,
    /// Total public items served in discovery mode
    pub discovery_limit: usize,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            page_size: 20,
            discovery_limit: 50,
        }
    }
}

#[derive(Default)]
struct Inner {
    users: HashMap<UserId, User>,
    places: HashMap<PlaceId, Place>,
    follows: HashMap<UserId, BTreeSet<UserId>>,
    trips: HashMap<TripId, Trip>,
    logs: Vec<Log>,
    creations: Vec<TripCreation>,
}

/// One pageable item, keyed by the timestamp its feed entry sorts at
enum Activity<'a> {
    Log(&'a Log, DateTime<Utc>),
    Creation(&'a TripCreation),
}

impl Activity<'_> {
    fn at(&self) -> DateTime<Utc> {
        match self {
            Activity::Log(_, at) => *at,
            Activity::Creation(c) => c.created_at,
        }
    }

    fn id(&self) -> &str {
        match self {
            Activity::Log(l, _) => &l.id,
            Activity::Creation(c) => &c.id,
        }
    }
}

impl Inner {
    fn following(&self, viewer: &str) -> Vec<UserId> {
        self.follows
            .get(viewer)
            .map(|s| s.iter().cloned().collect())
            .unwrap_or_default()
    }

    fn has_activity(&self, author: &str) -> bool {
        self.logs.iter().any(|l| l.user.id == author)
            || self.creations.iter().any(|c| c.user.id == author)
    }

    fn is_discovery_eligible(&self, viewer: &str) -> bool {
        !self
            .following(viewer)
            .iter()
            .any(|author| self.has_activity(author))
    }

    fn trip_has_logs(&self, trip_id: &str) -> bool {
        self.logs
            .iter()
            .any(|l| l.trip_id.as_deref() == Some(trip_id))
    }

    /// Latest activity per trip: `max(updated_at, newest log)`
    fn trip_activity(&self) -> HashMap<&str, DateTime<Utc>> {
        let mut latest: HashMap<&str, DateTime<Utc>> = self
            .trips
            .values()
            .map(|t| (t.id.as_str(), t.updated_at))
            .collect();
        for log in &self.logs {
            if let Some(at) = log.trip_id.as_deref().and_then(|id| latest.get_mut(id)) {
                *at = (*at).max(log.created_at);
            }
        }
        latest
    }

    /// Activity by `authors`, newest first. Creation events for trips that
    /// already have logs are dropped; the trip is represented by its logs.
    ///
    /// A log filed under a known trip is keyed at the trip's latest
    /// activity, the timestamp its trip card sorts at, so a trip travels on
    /// the page of its newest activity.
    fn activity_for(&self, authors: &HashSet<&str>) -> Vec<Activity<'_>> {
        let trip_activity = self.trip_activity();
        let mut activity: Vec<Activity<'_>> = self
            .logs
            .iter()
            .filter(|l| authors.contains(l.user.id.as_str()))
            .map(|l| {
                let at = l
                    .trip_id
                    .as_deref()
                    .and_then(|id| trip_activity.get(id))
                    .map_or(l.created_at, |&trip_at| trip_at.max(l.created_at));
                Activity::Log(l, at)
            })
            .chain(
                self.creations
                    .iter()
                    .filter(|c| authors.contains(c.user.id.as_str()))
                    .filter(|c| !self.trip_has_logs(&c.trip_id))
                    .map(Activity::Creation),
            )
            .collect();

        activity.sort_by(|a, b| b.at().cmp(&a.at()).then_with(|| a.id().cmp(b.id())));
        activity
    }
}

/// In-memory [`EntrySource`] and [`SocialGraph`]
pub struct MemoryStore {
    settings: StoreSettings,
    inner: RwLock<Inner>,
    failures: Mutex<VecDeque<FeedError>>,
    notices: broadcast::Sender<ActivityNotice>,
    fetches: AtomicUsize,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new(StoreSettings::default())
    }
}

impl MemoryStore {
    pub fn new(settings: StoreSettings) -> Self {
        let (notices, _) = broadcast::channel(NOTICE_CAPACITY);
        Self {
            settings,
            inner: RwLock::new(Inner::default()),
            failures: Mutex::new(VecDeque::new()),
            notices,
            fetches: AtomicUsize::new(0),
        }
    }

    pub fn settings(&self) -> StoreSettings {
        self.settings
    }

    // ============== Writes ==============

    pub async fn add_user(&self, user: User) {
        self.inner.write().await.users.insert(user.id.clone(), user);
    }

    pub async fn add_place(&self, place: Place) {
        self.inner.write().await.places.insert(place.id.clone(), place);
    }

    pub async fn follow(&self, follower: &str, followee: &str) {
        self.inner
            .write()
            .await
            .follows
            .entry(follower.to_string())
            .or_default()
            .insert(followee.to_string());
    }

    pub async fn unfollow(&self, follower: &str, followee: &str) {
        if let Some(set) = self.inner.write().await.follows.get_mut(follower) {
            set.remove(followee);
        }
    }

    /// Insert a trip and record its creation event
    pub async fn add_trip(&self, trip: Trip) -> TripCreation {
        let creation = TripCreation {
            id: Uuid::new_v4().to_string(),
            user: trip.user.clone(),
            trip_id: trip.id.clone(),
            trip_name: trip.name.clone(),
            created_at: trip.created_at,
        };

        {
            let mut inner = self.inner.write().await;
            inner.trips.insert(trip.id.clone(), trip);
            inner.creations.push(creation.clone());
        }

        self.notify(&creation.user.id, ActivityKind::TripCreated, creation.created_at);
        creation
    }

    /// Insert a log. A log filed under a known trip bumps the trip's
    /// `updated_at`; a log whose trip is unknown is stored as-is.
    pub async fn add_log(&self, log: Log) {
        let (author, at) = (log.user.id.clone(), log.created_at);
        {
            let mut inner = self.inner.write().await;
            if let Some(trip) = log.trip_id.as_ref().and_then(|id| inner.trips.get_mut(id)) {
                trip.updated_at = trip.updated_at.max(log.created_at);
            }
            inner.logs.push(log);
        }
        self.notify(&author, ActivityKind::Log, at);
    }

    /// Delete a trip and its creation events; its logs stay behind
    pub async fn remove_trip(&self, trip_id: &str) -> Option<Trip> {
        let mut inner = self.inner.write().await;
        inner.creations.retain(|c| c.trip_id != trip_id);
        inner.trips.remove(trip_id)
    }

    /// Load a normalized dataset; trips get creation events
    pub async fn load_dataset(&self, dataset: Dataset) -> Result<()> {
        for user in dataset.users {
            self.add_user(user).await;
        }
        for place in dataset.places {
            self.add_place(place).await;
        }
        for follow in dataset.follows {
            self.follow(&follow.follower, &follow.followee).await;
        }

        for record in dataset.trips {
            let user = self.user(&record.user_id).await?;
            self.add_trip(Trip {
                id: record.id,
                user,
                name: record.name,
                cover_photo_url: record.cover_photo_url,
                date_range: record.date_range,
                created_at: record.created_at,
                updated_at: record.updated_at.unwrap_or(record.created_at),
            })
            .await;
        }

        for record in dataset.logs {
            let user = self.user(&record.user_id).await?;
            let place = self
                .inner
                .read()
                .await
                .places
                .get(&record.place_id)
                .cloned()
                .ok_or_else(|| StoreError::UnknownPlace(record.place_id.clone()))?;
            self.add_log(Log {
                id: record.id,
                user,
                place,
                rating: record.rating,
                note: record.note,
                tags: record.tags,
                photo_urls: record.photo_urls,
                created_at: record.created_at,
                trip_id: record.trip_id,
            })
            .await;
        }

        Ok(())
    }

    // ============== Reads ==============

    pub async fn user(&self, id: &str) -> Result<User> {
        self.inner
            .read()
            .await
            .users
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::UnknownUser(id.to_string()))
    }

    pub async fn trip(&self, id: &str) -> Result<Trip> {
        self.inner
            .read()
            .await
            .trips
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::UnknownTrip(id.to_string()))
    }

    pub async fn log_count(&self) -> usize {
        self.inner.read().await.logs.len()
    }

    // ============== Test hooks ==============

    /// Queue an error for the next `fetch_raw`
    pub async fn fail_next_fetch(&self, error: FeedError) {
        self.failures.lock().await.push_back(error);
    }

    /// Number of `fetch_raw` calls served so far
    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    fn notify(&self, author: &str, kind: ActivityKind, at: DateTime<Utc>) {
        // No receivers is fine
        let _ = self.notices.send(ActivityNotice {
            author_id: author.to_string(),
            kind,
            at,
        });
    }
}

#[async_trait]
impl EntrySource for MemoryStore {
    async fn fetch_raw(
        &self,
        viewer: &str,
        since: Option<DateTime<Utc>>,
        cursor: Option<&Cursor>,
    ) -> roam_core::Result<RawFeed> {
        self.fetches.fetch_add(1, Ordering::SeqCst);

        if let Some(error) = self.failures.lock().await.pop_front() {
            tracing::debug!(viewer, %error, "injected fetch failure");
            return Err(error);
        }

        let after = cursor.map(PageKey::decode).transpose()?;
        let inner = self.inner.read().await;

        let following = inner.following(viewer);
        let (scope, authors): (FeedScope, HashSet<&str>) = if inner.is_discovery_eligible(viewer) {
            let public = inner
                .users
                .values()
                .filter(|u| u.is_public && u.id != viewer)
                .map(|u| u.id.as_str())
                .collect();
            (FeedScope::Discovery, public)
        } else {
            (
                FeedScope::Following,
                following.iter().map(String::as_str).collect(),
            )
        };

        let mut activity = inner.activity_for(&authors);
        if scope.is_discovery() {
            activity.truncate(self.settings.discovery_limit);
        }

        let mut page: Vec<Activity<'_>> = activity
            .into_iter()
            .filter(|a| since.map_or(true, |s| a.at() > s))
            .filter(|a| after.as_ref().map_or(true, |k| k.precedes(a.at(), a.id())))
            .collect();

        let has_more = page.len() > self.settings.page_size;
        page.truncate(self.settings.page_size);

        let next_cursor = match page.last() {
            Some(last) if has_more => Some(PageKey::new(last.at(), last.id()).encode()),
            _ => None,
        };

        let mut raw = RawFeed {
            next_cursor,
            has_more,
            scope,
            ..RawFeed::default()
        };
        let mut trips: BTreeMap<&str, &Trip> = BTreeMap::new();
        for item in page {
            match item {
                Activity::Log(log, _) => {
                    if let Some(trip) = log.trip_id.as_deref().and_then(|id| inner.trips.get(id)) {
                        trips.insert(&trip.id, trip);
                    }
                    raw.logs.push(log.clone());
                }
                Activity::Creation(creation) => raw.trip_creations.push(creation.clone()),
            }
        }
        raw.trips = trips.into_values().cloned().collect();

        tracing::debug!(
            viewer,
            scope = ?raw.scope,
            logs = raw.logs.len(),
            trips = raw.trips.len(),
            creations = raw.trip_creations.len(),
            has_more = raw.has_more,
            "fetched raw page"
        );

        Ok(raw)
    }

    fn watch(&self) -> Option<broadcast::Receiver<ActivityNotice>> {
        Some(self.notices.subscribe())
    }
}

#[async_trait]
impl SocialGraph for MemoryStore {
    async fn following(&self, viewer: &str) -> roam_core::Result<Vec<UserId>> {
        Ok(self.inner.read().await.following(viewer))
    }

    async fn is_discovery_eligible(&self, viewer: &str) -> roam_core::Result<bool> {
        Ok(self.inner.read().await.is_discovery_eligible(viewer))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{day, log, tokyo_dataset, trip, trip_log, user};

    async fn store_with(page_size: usize) -> MemoryStore {
        let store = MemoryStore::new(StoreSettings {
            page_size,
            discovery_limit: 3,
        });
        store.load_dataset(tokyo_dataset()).await.unwrap();
        store
    }

    fn ids(raw: &RawFeed) -> Vec<&str> {
        raw.logs
            .iter()
            .map(|l| l.id.as_str())
            .chain(raw.trip_creations.iter().map(|c| c.id.as_str()))
            .collect()
    }

    #[tokio::test]
    async fn test_following_scope_returns_followed_activity() {
        let store = store_with(20).await;
        let raw = store.fetch_raw("mika", None, None).await.unwrap();

        assert_eq!(raw.scope, FeedScope::Following);
        assert_eq!(raw.logs.len(), 3);
        assert!(raw.logs.iter().all(|l| l.user.id == "aki"));
        // tokyo-trip already has logs, so its creation event is dropped
        assert!(raw.trip_creations.is_empty());
        assert_eq!(raw.trips.len(), 1);
        assert_eq!(raw.trips[0].id, "tokyo-trip");
        assert!(!raw.has_more);
        assert!(raw.next_cursor.is_none());
    }

    #[tokio::test]
    async fn test_cursor_pages_do_not_overlap() {
        let store = store_with(2).await;

        let first = store.fetch_raw("mika", None, None).await.unwrap();
        // Both trip logs sort at the trip's latest activity (day 3), ties by id
        assert_eq!(ids(&first), vec!["aki-kinkakuji", "aki-ichiran"]);
        assert!(first.has_more);

        let second = store
            .fetch_raw("mika", None, first.next_cursor.as_ref())
            .await
            .unwrap();
        assert_eq!(ids(&second), vec!["aki-sensoji"]);
        assert!(!second.has_more);
        // The trip travels with every page that carries one of its logs
        assert_eq!(second.trips.len(), 1);
    }

    #[tokio::test]
    async fn test_trip_logs_page_at_trip_activity() {
        let store = MemoryStore::new(StoreSettings {
            page_size: 1,
            discovery_limit: 10,
        });
        let aki = user("aki", true);
        store.add_user(aki.clone()).await;
        store.follow("mika", "aki").await;
        store
            .add_trip(Trip {
                updated_at: day(8),
                ..trip("t", &aki, "Hakone", day(1))
            })
            .await;
        store.add_log(trip_log("t-onsen", &aki, "t", day(2))).await;
        store.add_log(log("solo5", &aki, day(5))).await;

        // The trip was touched on day 8, so its old log leads the feed
        let first = store.fetch_raw("mika", None, None).await.unwrap();
        assert_eq!(ids(&first), vec!["t-onsen"]);
        assert_eq!(first.newest_activity(), Some(day(8)));

        let second = store
            .fetch_raw("mika", None, first.next_cursor.as_ref())
            .await
            .unwrap();
        assert_eq!(ids(&second), vec!["solo5"]);

        // A trip update counts as newer activity for realtime checks
        let since = store.fetch_raw("mika", Some(day(6)), None).await.unwrap();
        assert_eq!(ids(&since), vec!["t-onsen"]);
    }

    #[tokio::test]
    async fn test_since_filters_older_activity() {
        let store = store_with(20).await;
        let raw = store.fetch_raw("mika", Some(day(3)), None).await.unwrap();
        assert_eq!(ids(&raw), vec!["aki-kinkakuji"]);
    }

    #[tokio::test]
    async fn test_discovery_when_following_nobody() {
        let store = store_with(20).await;
        store.add_user(user("newbie", false)).await;

        let raw = store.fetch_raw("newbie", None, None).await.unwrap();
        assert_eq!(raw.scope, FeedScope::Discovery);
        // discovery_limit = 3 caps the public set
        assert_eq!(raw.activity_count(), 3);
        assert!(raw.logs.iter().all(|l| l.user.is_public));
        assert!(store.is_discovery_eligible("newbie").await.unwrap());
    }

    #[tokio::test]
    async fn test_discovery_when_followed_users_are_quiet() {
        let store = store_with(20).await;
        store.add_user(user("quiet", true)).await;
        store.add_user(user("viewer", false)).await;
        store.follow("viewer", "quiet").await;

        let raw = store.fetch_raw("viewer", None, None).await.unwrap();
        assert_eq!(raw.scope, FeedScope::Discovery);
        assert!(!raw.is_empty());
        assert!(raw.logs.iter().all(|l| l.user.id != "quiet"));
    }

    #[tokio::test]
    async fn test_private_users_never_discovered() {
        let store = MemoryStore::default();
        let private = user("hidden", false);
        store.add_user(private.clone()).await;
        store.add_user(user("viewer", false)).await;
        store.add_log(log("secret", &private, day(1))).await;

        let raw = store.fetch_raw("viewer", None, None).await.unwrap();
        assert_eq!(raw.scope, FeedScope::Discovery);
        assert!(raw.is_empty());
    }

    #[tokio::test]
    async fn test_empty_trip_surfaces_creation_event() {
        let store = MemoryStore::default();
        let aki = user("aki", true);
        store.add_user(aki.clone()).await;
        store.follow("mika", "aki").await;
        let creation = store.add_trip(trip("kyoto", &aki, "Kyoto", day(6))).await;

        let raw = store.fetch_raw("mika", None, None).await.unwrap();
        assert_eq!(raw.trip_creations, vec![creation]);

        store.add_log(trip_log("first", &aki, "kyoto", day(7))).await;
        let raw = store.fetch_raw("mika", None, None).await.unwrap();
        assert!(raw.trip_creations.is_empty());
        assert_eq!(store.trip("kyoto").await.unwrap().updated_at, day(7));
    }

    #[tokio::test]
    async fn test_injected_failures_are_served_in_order() {
        let store = store_with(20).await;
        store
            .fail_next_fetch(FeedError::Network("timeout".into()))
            .await;
        store.fail_next_fetch(FeedError::Auth("expired".into())).await;

        let first = store.fetch_raw("mika", None, None).await.unwrap_err();
        assert!(first.is_retryable());
        let second = store.fetch_raw("mika", None, None).await.unwrap_err();
        assert!(second.is_auth());
        assert!(store.fetch_raw("mika", None, None).await.is_ok());
        assert_eq!(store.fetch_count(), 3);
    }

    #[tokio::test]
    async fn test_writes_are_pushed_to_watchers() {
        let store = MemoryStore::default();
        let mut rx = store.watch().unwrap();
        let aki = user("aki", true);

        store.add_log(log("l1", &aki, day(9))).await;
        let notice = rx.recv().await.unwrap();
        assert_eq!(notice.author_id, "aki");
        assert_eq!(notice.kind, ActivityKind::Log);
        assert_eq!(notice.at, day(9));
    }

    #[tokio::test]
    async fn test_dataset_with_unknown_user_fails() {
        let mut dataset = tokyo_dataset();
        dataset.logs[0].user_id = "ghost".into();

        let store = MemoryStore::default();
        let err = store.load_dataset(dataset).await.unwrap_err();
        assert!(matches!(err, StoreError::UnknownUser(id) if id == "ghost"));
    }

    #[tokio::test]
    async fn test_dataset_json_roundtrip_loads() {
        let json = tokyo_dataset().to_json().unwrap();
        let store = MemoryStore::default();
        store
            .load_dataset(Dataset::from_json(&json).unwrap())
            .await
            .unwrap();
        assert_eq!(store.log_count().await, 4);
    }
}
