//! Per-viewer feed session
//!
//! Owns the pagination state machine for one viewer. Concurrency rules:
//!
//! - `load_feed` / `refresh_feed` / `show_new_posts` share one in-flight
//!   first-page fetch; callers arriving while it runs join its result
//! - `load_more_feed` holds the cursor gate; a load-more issued while a
//!   load-more or reload is in flight returns [`LoadOutcome::Busy`]
//! - a reload issued during a load-more waits for it to finish
//! - the realtime watcher only ever sets `new_posts_available`
//! - after [`FeedSession::close`] in-flight results are dropped

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;

use chrono::{DateTime, Utc};
use futures::future::{BoxFuture, FutureExt, Shared};
use roam_core::{FeedError, RawFeed, Result, UserId};
use roam_store::EntrySource;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::merge::merge_page;
use crate::paging::append_page;
use crate::realtime;
use crate::state::{FeedSnapshot, LoadOutcome, Phase, SessionOptions, SessionState};

type InFlight = Shared<BoxFuture<'static, Result<LoadOutcome>>>;

pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Result of trying to raise the new-posts flag
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Flag {
    Raised,
    /// A reload landed after the probe read its watermark
    Superseded,
    Closed,
}

/// Shared between the session handle, reload tasks and the realtime watcher
pub(crate) struct SessionCore {
    pub(crate) viewer: UserId,
    pub(crate) source: Arc<dyn EntrySource>,
    pub(crate) options: SessionOptions,
    state: Mutex<SessionState>,
    reload: Mutex<Option<InFlight>>,
    cursor_gate: tokio::sync::Mutex<()>,
    new_posts: AtomicBool,
    /// Bumped on close; results fetched under an older generation are dropped
    generation: AtomicU64,
    /// Bumped on every applied first page
    reload_epoch: AtomicU64,
    /// Bumped every time the new-posts flag is raised
    flag_seq: AtomicU64,
    closed: AtomicBool,
    snapshots: watch::Sender<FeedSnapshot>,
}

impl SessionCore {
    fn ensure_open(&self) -> Result<()> {
        if self.is_closed() {
            return Err(FeedError::SessionClosed);
        }
        Ok(())
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    pub(crate) fn new_posts_pending(&self) -> bool {
        self.new_posts.load(Ordering::SeqCst)
    }

    /// Mutate state and publish a snapshot. With `generation` set, the
    /// update is skipped (returns `None`) if the session was closed since.
    fn update<R>(&self, generation: Option<u64>, f: impl FnOnce(&mut SessionState) -> R) -> Option<R> {
        let snapshot;
        let result;
        {
            let mut state = lock(&self.state);
            if let Some(generation) = generation {
                if self.generation.load(Ordering::SeqCst) != generation {
                    return None;
                }
            }
            result = f(&mut state);
            snapshot = state.snapshot(self.new_posts_pending());
        }
        self.snapshots.send_replace(snapshot);
        Some(result)
    }

    fn publish(&self) {
        let snapshot = lock(&self.state).snapshot(self.new_posts_pending());
        self.snapshots.send_replace(snapshot);
    }

    /// Watermark and reload epoch for a realtime check; `None` before the
    /// first successful load
    pub(crate) fn watch_point(&self) -> Option<(Option<DateTime<Utc>>, u64)> {
        let state = lock(&self.state);
        state
            .has_loaded_once
            .then(|| (state.watermark, self.reload_epoch.load(Ordering::SeqCst)))
    }

    /// Raise the banner unless a reload landed since `epoch` was read
    pub(crate) fn flag_new_posts(&self, epoch: u64) -> Flag {
        self.update(None, |state| {
            if state.phase == Phase::Closed {
                Flag::Closed
            } else if self.reload_epoch.load(Ordering::SeqCst) != epoch {
                Flag::Superseded
            } else {
                self.flag_seq.fetch_add(1, Ordering::SeqCst);
                self.new_posts.store(true, Ordering::SeqCst);
                Flag::Raised
            }
        })
        .unwrap_or(Flag::Closed)
    }

    /// Start or join the in-flight first-page fetch
    async fn reload(self: &Arc<Self>) -> Result<LoadOutcome> {
        let in_flight = {
            let mut slot = lock(&self.reload);
            match slot.as_ref() {
                Some(existing) => {
                    tracing::debug!(viewer = %self.viewer, "joining in-flight reload");
                    existing.clone()
                }
                None => {
                    let task = tokio::spawn(Arc::clone(self).run_reload());
                    let core = Arc::clone(self);
                    let shared = async move {
                        match task.await {
                            Ok(outcome) => outcome,
                            Err(e) => {
                                *lock(&core.reload) = None;
                                Err(FeedError::Internal(format!("reload task failed: {}", e)))
                            }
                        }
                    }
                    .boxed()
                    .shared();
                    *slot = Some(shared.clone());
                    shared
                }
            }
        };
        in_flight.await
    }

    async fn run_reload(self: Arc<Self>) -> Result<LoadOutcome> {
        let generation = self.generation.load(Ordering::SeqCst);
        let outcome = {
            let _gate = self.cursor_gate.lock().await;
            let started = self.update(Some(generation), |state| {
                state.phase = if state.has_loaded_once {
                    Phase::Refreshing
                } else {
                    Phase::Loading
                };
            });

            match started {
                Some(()) => {
                    tracing::debug!(viewer = %self.viewer, "fetching first page");
                    let flags_before = self.flag_seq.load(Ordering::SeqCst);
                    let result = self.source.fetch_raw(&self.viewer, None, None).await;
                    self.apply_first_page(generation, flags_before, result)
                }
                None => Ok(LoadOutcome::Discarded),
            }
        };

        *lock(&self.reload) = None;
        outcome
    }

    /// `flags_before` is the flag sequence read before the fetch started; a
    /// banner raised after that may cover posts this page never saw
    fn apply_first_page(
        &self,
        generation: u64,
        flags_before: u64,
        result: Result<RawFeed>,
    ) -> Result<LoadOutcome> {
        match result {
            Ok(raw) => {
                let watermark = raw.newest_activity();
                let page = merge_page(raw);
                let count = page.entries.len();
                let scope = page.scope;

                let applied = self.update(Some(generation), |state| {
                    state.phase = Phase::Loaded;
                    state.entries = Arc::new(page.entries);
                    state.cursor = page.cursor;
                    state.has_more = page.has_more;
                    state.scope = page.scope;
                    state.has_loaded_once = true;
                    state.last_fetch_at = Some(Utc::now());
                    state.watermark = watermark;
                    state.loaded_at = Some(Instant::now());
                    state.last_error = None;
                    self.reload_epoch.fetch_add(1, Ordering::SeqCst);
                    if self.flag_seq.load(Ordering::SeqCst) == flags_before {
                        self.new_posts.store(false, Ordering::SeqCst);
                    }
                });

                match applied {
                    Some(()) => {
                        tracing::info!(viewer = %self.viewer, entries = count, scope = ?scope, "feed loaded");
                        Ok(LoadOutcome::Loaded { entries: count })
                    }
                    None => {
                        tracing::debug!(viewer = %self.viewer, "session closed, discarding first page");
                        Ok(LoadOutcome::Discarded)
                    }
                }
            }
            Err(error) => {
                let applied = self.update(Some(generation), |state| {
                    state.phase = if state.has_loaded_once {
                        Phase::Loaded
                    } else {
                        Phase::Empty
                    };
                    state.last_error = Some(error.clone());
                });
                if applied.is_none() {
                    return Ok(LoadOutcome::Discarded);
                }
                tracing::warn!(viewer = %self.viewer, %error, "feed reload failed");
                Err(error)
            }
        }
    }

    async fn load_more(&self) -> Result<LoadOutcome> {
        if lock(&self.reload).is_some() {
            return Ok(LoadOutcome::Busy);
        }
        let Ok(_gate) = self.cursor_gate.try_lock() else {
            return Ok(LoadOutcome::Busy);
        };

        let generation = self.generation.load(Ordering::SeqCst);
        let cursor = {
            let mut state = lock(&self.state);
            match state.phase {
                Phase::Loaded => {}
                Phase::Empty => return Ok(LoadOutcome::NotReady),
                Phase::Closed => return Err(FeedError::SessionClosed),
                Phase::Loading | Phase::Refreshing | Phase::LoadingMore => {
                    return Ok(LoadOutcome::Busy)
                }
            }
            if !state.has_more {
                return Ok(LoadOutcome::Exhausted);
            }
            state.phase = Phase::LoadingMore;
            state.cursor.clone()
        };
        self.publish();

        tracing::debug!(viewer = %self.viewer, cursor = ?cursor, "fetching next page");
        let result = self
            .source
            .fetch_raw(&self.viewer, None, cursor.as_ref())
            .await;

        match result {
            Ok(raw) => {
                let page = merge_page(raw);
                let applied = self.update(Some(generation), |state| {
                    let mut entries = state.entries.as_ref().clone();
                    let stats = append_page(&mut entries, page.entries);
                    state.entries = Arc::new(entries);
                    state.cursor = page.cursor;
                    state.has_more = page.has_more;
                    state.scope = page.scope;
                    state.phase = Phase::Loaded;
                    state.last_error = None;
                    stats
                });

                match applied {
                    Some(stats) => {
                        tracing::info!(
                            viewer = %self.viewer,
                            added = stats.added,
                            merged_trips = stats.merged_trips,
                            dropped = stats.dropped,
                            "page appended"
                        );
                        Ok(LoadOutcome::Appended { added: stats.added })
                    }
                    None => Ok(LoadOutcome::Discarded),
                }
            }
            Err(error) => {
                // Prior entries stay; back to Loaded so the caller can retry
                let applied = self.update(Some(generation), |state| {
                    state.phase = Phase::Loaded;
                    state.last_error = Some(error.clone());
                });
                if applied.is_none() {
                    return Ok(LoadOutcome::Discarded);
                }
                tracing::warn!(viewer = %self.viewer, %error, "load more failed");
                Err(error)
            }
        }
    }
}

/// Feed session for one viewer, tied to a login.
///
/// Dropping the session closes it.
pub struct FeedSession {
    core: Arc<SessionCore>,
    watcher: Mutex<Option<JoinHandle<()>>>,
}

impl FeedSession {
    pub fn new(
        viewer: impl Into<UserId>,
        source: Arc<dyn EntrySource>,
        options: SessionOptions,
    ) -> Self {
        let (snapshots, _) = watch::channel(FeedSnapshot::default());
        Self {
            core: Arc::new(SessionCore {
                viewer: viewer.into(),
                source,
                options,
                state: Mutex::new(SessionState::default()),
                reload: Mutex::new(None),
                cursor_gate: tokio::sync::Mutex::new(()),
                new_posts: AtomicBool::new(false),
                generation: AtomicU64::new(0),
                reload_epoch: AtomicU64::new(0),
                flag_seq: AtomicU64::new(0),
                closed: AtomicBool::new(false),
                snapshots,
            }),
            watcher: Mutex::new(None),
        }
    }

    pub fn viewer(&self) -> &str {
        &self.core.viewer
    }

    /// Current read-only state
    pub fn snapshot(&self) -> FeedSnapshot {
        lock(&self.core.state).snapshot(self.core.new_posts_pending())
    }

    /// Receive a snapshot after every state change
    pub fn subscribe(&self) -> watch::Receiver<FeedSnapshot> {
        self.core.snapshots.subscribe()
    }

    /// Load the first page. No-op when already loaded and fresh.
    pub async fn load_feed(&self) -> Result<LoadOutcome> {
        self.core.ensure_open()?;
        let fresh = {
            let state = lock(&self.core.state);
            matches!(state.phase, Phase::Loaded | Phase::LoadingMore)
                && !state.is_stale(self.core.options.stale_after)
        };
        if fresh {
            return Ok(LoadOutcome::Unchanged);
        }
        self.core.reload().await
    }

    /// Fetch and append the next page
    pub async fn load_more_feed(&self) -> Result<LoadOutcome> {
        self.core.ensure_open()?;
        self.core.load_more().await
    }

    /// Replace the feed with a fresh first page. Clears the new-posts flag
    /// unless it was raised after the fetch started.
    pub async fn refresh_feed(&self) -> Result<LoadOutcome> {
        self.core.ensure_open()?;
        self.core.reload().await
    }

    /// Refresh and ask the presentation layer to scroll to the top
    pub async fn show_new_posts(&self) -> Result<LoadOutcome> {
        self.core.ensure_open()?;
        let outcome = self.core.reload().await?;
        if matches!(outcome, LoadOutcome::Loaded { .. }) {
            let generation = self.core.generation.load(Ordering::SeqCst);
            self.core.update(Some(generation), |state| {
                state.scroll_to_top += 1;
            });
        }
        Ok(outcome)
    }

    /// Start watching for content newer than the loaded feed. Idempotent.
    pub fn subscribe_to_realtime_updates(&self) -> Result<()> {
        self.core.ensure_open()?;
        let mut watcher = lock(&self.watcher);
        if watcher.as_ref().is_some_and(|h| !h.is_finished()) {
            return Ok(());
        }
        *watcher = Some(realtime::spawn_watcher(&self.core));
        tracing::debug!(viewer = %self.core.viewer, "realtime watcher started");
        Ok(())
    }

    /// End the session: stop the watcher and drop in-flight results
    pub fn close(&self) {
        if self.core.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        if let Some(handle) = lock(&self.watcher).take() {
            handle.abort();
        }
        self.core.update(None, |state| {
            self.core.generation.fetch_add(1, Ordering::SeqCst);
            state.phase = Phase::Closed;
        });
        tracing::info!(viewer = %self.core.viewer, "feed session closed");
    }

    pub fn is_closed(&self) -> bool {
        self.core.is_closed()
    }
}

impl Drop for FeedSession {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for FeedSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FeedSession")
            .field("viewer", &self.core.viewer)
            .field("closed", &self.is_closed())
            .finish()
    }
}
