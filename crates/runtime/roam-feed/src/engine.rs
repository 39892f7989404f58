//! Session registry
//!
//! One [`FeedSession`] per logged-in viewer. Feed operations are addressed
//! by viewer id and start a session on first use.
//!
//! The entry source decides each page's scope. An attached [`SocialGraph`]
//! answers the same question up front, without fetching a page.

use std::collections::HashMap;
use std::sync::Arc;

use roam_config::RoamConfig;
use roam_core::{Result, UserId};
use roam_store::{EntrySource, SocialGraph};
use tokio::sync::RwLock;

use crate::session::FeedSession;
use crate::state::{FeedSnapshot, LoadOutcome, SessionOptions};

pub struct FeedEngine {
    source: Arc<dyn EntrySource>,
    options: SessionOptions,
    social: Option<Arc<dyn SocialGraph>>,
    sessions: RwLock<HashMap<UserId, Arc<FeedSession>>>,
}

impl FeedEngine {
    pub fn new(source: Arc<dyn EntrySource>, options: SessionOptions) -> Self {
        Self {
            source,
            options,
            social: None,
            sessions: RwLock::new(HashMap::new()),
        }
    }

    pub fn with_social_graph(mut self, graph: Arc<dyn SocialGraph>) -> Self {
        self.social = Some(graph);
        self
    }

    pub fn from_config(source: Arc<dyn EntrySource>, config: &RoamConfig) -> Self {
        Self::new(source, SessionOptions::from(config))
    }

    // ============== Sessions ==============

    /// Session for `viewer`, created on login. Idempotent.
    pub async fn start_session(&self, viewer: &str) -> Arc<FeedSession> {
        if let Some(session) = self.sessions.read().await.get(viewer) {
            return Arc::clone(session);
        }

        let mut sessions = self.sessions.write().await;
        let session = sessions.entry(viewer.to_string()).or_insert_with(|| {
            tracing::info!(viewer, "feed session started");
            Arc::new(FeedSession::new(
                viewer,
                Arc::clone(&self.source),
                self.options.clone(),
            ))
        });
        Arc::clone(session)
    }

    pub async fn session(&self, viewer: &str) -> Option<Arc<FeedSession>> {
        self.sessions.read().await.get(viewer).cloned()
    }

    /// Close and forget the viewer's session (logout)
    pub async fn end_session(&self, viewer: &str) -> bool {
        match self.sessions.write().await.remove(viewer) {
            Some(session) => {
                session.close();
                true
            }
            None => false,
        }
    }

    /// Close every session
    pub async fn shutdown(&self) {
        let sessions: Vec<_> = self.sessions.write().await.drain().collect();
        for (_, session) in &sessions {
            session.close();
        }
        tracing::info!(closed = sessions.len(), "feed engine shut down");
    }

    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Current snapshot of a viewer's feed
    pub async fn state(&self, viewer: &str) -> Option<FeedSnapshot> {
        self.session(viewer).await.map(|s| s.snapshot())
    }

    // ============== Social graph ==============

    /// Whether `viewer` would get the discovery feed. `None` without a graph.
    pub async fn is_discovery_eligible(&self, viewer: &str) -> Result<Option<bool>> {
        match &self.social {
            Some(graph) => graph.is_discovery_eligible(viewer).await.map(Some),
            None => Ok(None),
        }
    }

    /// Accounts `viewer` follows. `None` without a graph.
    pub async fn following(&self, viewer: &str) -> Result<Option<Vec<UserId>>> {
        match &self.social {
            Some(graph) => graph.following(viewer).await.map(Some),
            None => Ok(None),
        }
    }

    // ============== Feed operations ==============

    pub async fn load_feed(&self, viewer: &str) -> Result<LoadOutcome> {
        self.start_session(viewer).await.load_feed().await
    }

    pub async fn load_more_feed(&self, viewer: &str) -> Result<LoadOutcome> {
        self.start_session(viewer).await.load_more_feed().await
    }

    pub async fn refresh_feed(&self, viewer: &str) -> Result<LoadOutcome> {
        self.start_session(viewer).await.refresh_feed().await
    }

    pub async fn show_new_posts(&self, viewer: &str) -> Result<LoadOutcome> {
        self.start_session(viewer).await.show_new_posts().await
    }

    pub async fn subscribe_to_realtime_updates(&self, viewer: &str) -> Result<()> {
        self.start_session(viewer)
            .await
            .subscribe_to_realtime_updates()
    }
}
