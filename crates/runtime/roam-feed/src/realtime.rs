//! Realtime "new posts" watcher
//!
//! ```text
//! push notice / poll tick
//!        │
//!        ▼
//!  fetch_raw(since = watermark) ── non-empty ──► new_posts_available = true
//! ```
//!
//! The watcher never touches the visible entries; the viewer pulls new
//! content in with `show_new_posts`.

use std::sync::{Arc, Weak};
use std::time::Duration;

use roam_config::RealtimeMode;
use roam_store::ActivityNotice;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::session::{Flag, SessionCore};

pub(crate) fn spawn_watcher(core: &Arc<SessionCore>) -> JoinHandle<()> {
    let mode = core.options.realtime_mode;
    let push = match mode {
        RealtimeMode::Poll => None,
        RealtimeMode::Push | RealtimeMode::Auto => core.source.watch(),
    };
    if push.is_none() && mode == RealtimeMode::Push {
        tracing::warn!(viewer = %core.viewer, "source has no push channel, falling back to polling");
    }

    let every = core.options.poll_interval;
    let session = Arc::downgrade(core);
    tokio::spawn(async move {
        match push {
            Some(notices) => watch_push(session, notices, every).await,
            None => watch_poll(session, every).await,
        }
    })
}

async fn watch_push(
    session: Weak<SessionCore>,
    mut notices: broadcast::Receiver<ActivityNotice>,
    every: Duration,
) {
    loop {
        match notices.recv().await {
            Ok(notice) => {
                tracing::trace!(author = %notice.author_id, kind = ?notice.kind, "activity notice");
            }
            // Missed notices still mean something changed
            Err(RecvError::Lagged(skipped)) => {
                tracing::debug!(skipped, "realtime receiver lagged");
            }
            Err(RecvError::Closed) => {
                tracing::debug!("push channel closed, polling instead");
                return watch_poll(session, every).await;
            }
        }

        if !check(&session).await {
            return;
        }
    }
}

async fn watch_poll(session: Weak<SessionCore>, every: Duration) {
    let mut ticker = tokio::time::interval(every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // First tick fires immediately
    ticker.tick().await;

    loop {
        ticker.tick().await;
        if !check(&session).await {
            return;
        }
    }
}

/// One "anything newer?" check. Returns false once the session is gone.
///
/// A reload that lands while the fetch is out invalidates its watermark; the
/// check then repeats against the reloaded page instead of dropping what it
/// found.
async fn check(session: &Weak<SessionCore>) -> bool {
    let Some(core) = session.upgrade() else {
        return false;
    };

    loop {
        if core.is_closed() {
            return false;
        }
        if core.new_posts_pending() {
            return true;
        }
        // Nothing to compare against before the first page
        let Some((since, epoch)) = core.watch_point() else {
            return true;
        };

        let raw = match core.source.fetch_raw(&core.viewer, since, None).await {
            Ok(raw) if !raw.is_empty() => raw,
            Ok(_) => return true,
            Err(error) => {
                tracing::warn!(viewer = %core.viewer, %error, "realtime check failed");
                return true;
            }
        };

        match core.flag_new_posts(epoch) {
            Flag::Raised => {
                tracing::info!(
                    viewer = %core.viewer,
                    items = raw.activity_count(),
                    "new posts available"
                );
                return true;
            }
            Flag::Superseded => {
                tracing::debug!(viewer = %core.viewer, "feed reloaded during check, checking again");
            }
            Flag::Closed => return false,
        }
    }
}
