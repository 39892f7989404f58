//! Test helpers

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use roam_core::{Cursor, RawFeed};
use roam_store::{ActivityNotice, EntrySource, MemoryStore};
use tokio::sync::{broadcast, Semaphore};

use crate::session::lock;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Park {
    Never,
    BeforeRead,
    /// Read the store, then wait; the caller sees data as of the read
    AfterRead { first_pages_only: bool },
}

/// Wraps a [`MemoryStore`] and can park fetches until a permit is released.
/// Parked fetches resume in arrival order.
pub(crate) struct GatedSource {
    inner: Arc<MemoryStore>,
    park: Mutex<Park>,
    permits: Semaphore,
    started: AtomicUsize,
    parked: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl GatedSource {
    pub fn new(inner: Arc<MemoryStore>) -> Self {
        Self {
            inner,
            park: Mutex::new(Park::Never),
            permits: Semaphore::new(0),
            started: AtomicUsize::new(0),
            parked: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    /// Park every fetch before it reads the store
    pub fn hold(&self) {
        *lock(&self.park) = Park::BeforeRead;
    }

    /// Park first-page fetches after they read the store
    pub fn park_first_pages_after_read(&self) {
        *lock(&self.park) = Park::AfterRead {
            first_pages_only: true,
        };
    }

    /// Park every fetch after it reads the store
    pub fn park_all_after_read(&self) {
        *lock(&self.park) = Park::AfterRead {
            first_pages_only: false,
        };
    }

    pub fn release(&self, n: usize) {
        self.permits.add_permits(n);
    }

    pub fn started(&self) -> usize {
        self.started.load(Ordering::SeqCst)
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub async fn wait_started(&self, n: usize) {
        while self.started() < n {
            tokio::task::yield_now().await;
        }
    }

    /// Wait until `n` fetches in total have parked
    pub async fn wait_parked(&self, n: usize) {
        while self.parked.load(Ordering::SeqCst) < n {
            tokio::task::yield_now().await;
        }
    }

    async fn wait_for_permit(&self) {
        self.parked.fetch_add(1, Ordering::SeqCst);
        if let Ok(permit) = self.permits.acquire().await {
            permit.forget();
        }
    }
}

#[async_trait]
impl EntrySource for GatedSource {
    async fn fetch_raw(
        &self,
        viewer: &str,
        since: Option<DateTime<Utc>>,
        cursor: Option<&Cursor>,
    ) -> roam_core::Result<RawFeed> {
        self.started.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        let park = *lock(&self.park);
        if park == Park::BeforeRead {
            self.wait_for_permit().await;
        }

        let result = self.inner.fetch_raw(viewer, since, cursor).await;
        if let Park::AfterRead { first_pages_only } = park {
            if !first_pages_only || (since.is_none() && cursor.is_none()) {
                self.wait_for_permit().await;
            }
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }

    fn watch(&self) -> Option<broadcast::Receiver<ActivityNotice>> {
        self.inner.watch()
    }
}
