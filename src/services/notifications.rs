//! Background notification feed.
//!
//! The poller keeps the last fetched list of reminders, the unread badge
//! count and at most one pending "due now" alert. While a user is logged in
//! a periodic task refetches the list; [`NotificationPoller::follow_session`]
//! starts that task on login and stops it on logout.
//!
//! Mark-read is optimistic: the item leaves the local list before the remote
//! call and is put back if that call fails. Results of fetches that were in
//! flight while the poller stopped are dropped, as are results fetched for a
//! mode that is no longer selected.

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::{
    sync::{watch, Mutex, RwLock},
    task::JoinHandle,
    time::MissedTickBehavior,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::{
    api::ApiError,
    models::{
        notification::{unread_count, Notification, NotificationMode},
        user::UserProfile,
    },
};

pub const DEFAULT_SNOOZE_MINUTES: u32 = 60;

/// Where the feed comes from. The HTTP client implements this; tests swap in
/// an in-memory source.
#[async_trait]
pub trait NotificationSource: Send + Sync {
    async fn fetch(&self, mode: NotificationMode) -> Result<Vec<Notification>, ApiError>;
    async fn mark_read(&self, id: i64) -> Result<(), ApiError>;
    async fn snooze(&self, id: i64, minutes: u32) -> Result<(), ApiError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollerState {
    Idle,
    Polling,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FetchOutcome {
    pub unread: usize,
    pub due_alert: Option<Notification>,
    /// The poller stopped or switched mode while the fetch was in flight.
    pub discarded: bool,
}

#[derive(Debug, Default)]
struct Feed {
    mode: NotificationMode,
    items: Vec<Notification>,
    unread: usize,
    alert: Option<Notification>,
    generation: u64,
}

/// Timer task plus the token that stops it.
struct PollHandle {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl PollHandle {
    async fn stop(self) {
        self.cancel.cancel();
        if let Err(err) = self.task.await {
            if !err.is_cancelled() {
                warn!("notification poll task ended abnormally: {err}");
            }
        }
    }
}

struct Inner {
    source: Arc<dyn NotificationSource>,
    interval: Duration,
    feed: RwLock<Feed>,
    timer: Mutex<Option<PollHandle>>,
    state: watch::Sender<PollerState>,
}

#[derive(Clone)]
pub struct NotificationPoller {
    inner: Arc<Inner>,
}

impl NotificationPoller {
    pub fn new(source: Arc<dyn NotificationSource>, interval: Duration) -> Self {
        let (state, _) = watch::channel(PollerState::Idle);
        Self {
            inner: Arc::new(Inner {
                source,
                interval,
                feed: RwLock::new(Feed::default()),
                timer: Mutex::new(None),
                state,
            }),
        }
    }

    pub fn state(&self) -> PollerState {
        *self.inner.state.borrow()
    }

    pub fn watch_state(&self) -> watch::Receiver<PollerState> {
        self.inner.state.subscribe()
    }

    pub async fn mode(&self) -> NotificationMode {
        self.inner.feed.read().await.mode
    }

    pub async fn items(&self) -> Vec<Notification> {
        self.inner.feed.read().await.items.clone()
    }

    pub async fn unread_count(&self) -> usize {
        self.inner.feed.read().await.unread
    }

    /// Hands out the pending due alert once.
    pub async fn take_alert(&self) -> Option<Notification> {
        self.inner.feed.write().await.alert.take()
    }

    pub async fn fetch_due(&self) -> Result<FetchOutcome, ApiError> {
        let (mode, generation) = {
            let feed = self.inner.feed.read().await;
            (feed.mode, feed.generation)
        };
        let items = self.inner.source.fetch(mode).await?;
        Ok(self.apply(items, mode, generation, Utc::now()).await)
    }

    /// Replaces the list with a fetch result. At most one due alert is raised
    /// per call: the first unread item scheduled within the due window.
    async fn apply(
        &self,
        items: Vec<Notification>,
        mode: NotificationMode,
        generation: u64,
        now: DateTime<Utc>,
    ) -> FetchOutcome {
        let mut feed = self.inner.feed.write().await;
        if feed.generation != generation || feed.mode != mode {
            debug!("dropping stale notification fetch");
            return FetchOutcome {
                unread: feed.unread,
                due_alert: None,
                discarded: true,
            };
        }
        feed.unread = unread_count(&items);
        feed.items = items;
        let due_alert = feed.items.iter().find(|n| n.is_due(now)).cloned();
        if let Some(due) = &due_alert {
            info!(id = due.id, "notification due now");
            feed.alert = Some(due.clone());
        }
        FetchOutcome {
            unread: feed.unread,
            due_alert,
            discarded: false,
        }
    }

    pub async fn mark_read(&self, id: i64) -> Result<(), ApiError> {
        let removed = {
            let mut feed = self.inner.feed.write().await;
            let removed = feed
                .items
                .iter()
                .position(|n| n.id == id)
                .map(|pos| (pos, feed.items.remove(pos)));
            if let Some((_, item)) = &removed {
                if !item.is_read {
                    feed.unread = feed.unread.saturating_sub(1);
                }
            }
            if feed.alert.as_ref().is_some_and(|alert| alert.id == id) {
                feed.alert = None;
            }
            removed
        };

        if let Err(err) = self.inner.source.mark_read(id).await {
            warn!(id, "mark read failed, restoring item: {err}");
            if let Some((pos, item)) = removed {
                let mut feed = self.inner.feed.write().await;
                if !feed.items.iter().any(|n| n.id == item.id) {
                    if !item.is_read {
                        feed.unread += 1;
                    }
                    let pos = pos.min(feed.items.len());
                    feed.items.insert(pos, item);
                }
            }
            return Err(err);
        }
        Ok(())
    }

    /// Marks everything currently listed as read, then reloads the upcoming
    /// list.
    pub async fn mark_all_read(&self) -> Result<FetchOutcome, ApiError> {
        let ids: Vec<i64> = {
            let feed = self.inner.feed.read().await;
            feed.items.iter().map(|n| n.id).collect()
        };
        for id in &ids {
            self.inner.source.mark_read(*id).await?;
        }
        {
            let mut feed = self.inner.feed.write().await;
            feed.unread = 0;
            feed.alert = None;
            feed.mode = NotificationMode::Upcoming;
        }
        info!(count = ids.len(), "marked all notifications read");
        self.fetch_due().await
    }

    pub async fn snooze(&self, id: i64, minutes: u32) -> Result<FetchOutcome, ApiError> {
        self.inner.source.snooze(id, minutes).await?;
        info!(id, minutes, "notification snoozed");
        self.fetch_due().await
    }

    pub async fn set_mode(&self, mode: NotificationMode) -> Result<FetchOutcome, ApiError> {
        self.inner.feed.write().await.mode = mode;
        self.fetch_due().await
    }

    /// Refetch on demand, e.g. after a reminder was created. No-op while idle.
    pub async fn refresh(&self) {
        if self.state() != PollerState::Polling {
            return;
        }
        if let Err(err) = self.fetch_due().await {
            warn!("notification refresh failed: {err}");
        }
    }

    pub async fn start(&self) {
        let mut timer = self.inner.timer.lock().await;
        if timer.is_some() {
            return;
        }
        let cancel = CancellationToken::new();
        let task = tokio::spawn(poll_loop(self.clone(), cancel.clone()));
        *timer = Some(PollHandle { cancel, task });
        self.inner.state.send_replace(PollerState::Polling);
        info!(interval_secs = self.inner.interval.as_secs(), "notification polling started");
    }

    pub async fn stop(&self) {
        let handle = self.inner.timer.lock().await.take();
        let was_running = handle.is_some();
        if let Some(handle) = handle {
            handle.stop().await;
        }
        {
            let mut feed = self.inner.feed.write().await;
            feed.generation = feed.generation.wrapping_add(1);
            feed.items.clear();
            feed.unread = 0;
            feed.alert = None;
            feed.mode = NotificationMode::Upcoming;
        }
        self.inner.state.send_replace(PollerState::Idle);
        if was_running {
            info!("notification polling stopped");
        }
    }

    /// Ties polling to the session: running while someone is logged in,
    /// idle otherwise. Ends when the session store goes away.
    pub fn follow_session(
        &self,
        mut session: watch::Receiver<Option<UserProfile>>,
    ) -> JoinHandle<()> {
        let poller = self.clone();
        tokio::spawn(async move {
            loop {
                let logged_in = session.borrow_and_update().is_some();
                if logged_in {
                    poller.start().await;
                } else {
                    poller.stop().await;
                }
                if session.changed().await.is_err() {
                    poller.stop().await;
                    break;
                }
            }
        })
    }
}

async fn poll_loop(poller: NotificationPoller, cancel: CancellationToken) {
    let mut ticker = tokio::time::interval(poller.inner.interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    result = poller.fetch_due() => match result {
                        Ok(outcome) => debug!(unread = outcome.unread, "notifications polled"),
                        Err(err) => warn!("notification poll failed: {err}"),
                    },
                }
            }
        }
    }
    debug!("notification poll loop exited");
}
