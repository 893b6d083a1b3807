//! Subscription interface over the state board.
//!
//! Consumers hold a [`StateGroupFeed`] and register with
//! [`StateGroupFeed::on_state_groups_changed`]; whether updates come from
//! polling ([`PollingFeed`]) or from an external push source ([`PushFeed`])
//! is invisible to them.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Notify, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::{PartStateAggregator, StateBoard};
use crate::errors::TrackerError;
use crate::models::StateGroup;
use crate::session::Session;

/// Latest state of a feed.
#[derive(Debug, Clone)]
pub enum FeedEvent {
    /// Nothing fetched yet.
    Pending,
    Updated(Arc<StateBoard>),
    /// The last refresh failed; consumers keep showing their previous board.
    Failed(Arc<TrackerError>),
}

impl FeedEvent {
    pub fn board(&self) -> Option<&StateBoard> {
        match self {
            Self::Updated(board) => Some(board),
            _ => None,
        }
    }
}

pub type FeedCallback = Box<dyn Fn(&FeedEvent) + Send + 'static>;

/// Source of state board updates.
pub trait StateGroupFeed: Send + Sync {
    /// A receiver that observes every update published after this call,
    /// starting from the current value.
    fn subscribe(&self) -> watch::Receiver<FeedEvent>;

    /// Invoke `callback` on every update until the returned
    /// [`Subscription`] is dropped or the feed goes away.
    ///
    /// Must be called from within a tokio runtime.
    fn on_state_groups_changed(&self, callback: FeedCallback) -> Subscription {
        let mut rx = self.subscribe();
        let token = CancellationToken::new();
        let cancelled = token.clone();
        let handle = tokio::spawn(async move {
            let current = rx.borrow_and_update().clone();
            if !matches!(current, FeedEvent::Pending) {
                callback(&current);
            }
            loop {
                tokio::select! {
                    _ = cancelled.cancelled() => break,
                    changed = rx.changed() => {
                        if changed.is_err() {
                            break;
                        }
                        let event = rx.borrow_and_update().clone();
                        callback(&event);
                    }
                }
            }
        });
        Subscription { token, handle }
    }
}

/// Handle for a registered callback; dropping it stops delivery.
pub struct Subscription {
    token: CancellationToken,
    handle: JoinHandle<()>,
}

impl Subscription {
    pub fn unsubscribe(self) {}

    pub fn is_active(&self) -> bool {
        !self.handle.is_finished()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.token.cancel();
        self.handle.abort();
    }
}

/// Default feed: polls the aggregator on a fixed interval.
pub struct PollingFeed {
    rx: watch::Receiver<FeedEvent>,
    refresh: Arc<Notify>,
    token: CancellationToken,
}

impl PollingFeed {
    /// Start polling immediately, then every `interval`.
    pub fn spawn(aggregator: PartStateAggregator, session: Session, interval: Duration) -> Self {
        let (tx, rx) = watch::channel(FeedEvent::Pending);
        let refresh = Arc::new(Notify::new());
        let token = CancellationToken::new();

        let notified = refresh.clone();
        let cancelled = token.clone();
        tokio::spawn(async move {
            loop {
                let event = tokio::select! {
                    _ = cancelled.cancelled() => break,
                    result = aggregator.board(&session) => match result {
                        Ok(board) => FeedEvent::Updated(Arc::new(board)),
                        Err(err) => {
                            warn!(error = %err, "state board poll failed");
                            FeedEvent::Failed(Arc::new(err))
                        }
                    },
                };
                tx.send_replace(event);

                tokio::select! {
                    _ = cancelled.cancelled() => break,
                    _ = tokio::time::sleep(interval) => {}
                    _ = notified.notified() => debug!("state board refresh requested"),
                }
            }
            debug!("state board polling stopped");
        });

        Self { rx, refresh, token }
    }

    /// Poll now instead of waiting for the next tick.
    pub fn refresh(&self) {
        self.refresh.notify_one();
    }

    pub fn stop(&self) {
        self.token.cancel();
    }
}

impl StateGroupFeed for PollingFeed {
    fn subscribe(&self) -> watch::Receiver<FeedEvent> {
        self.rx.clone()
    }
}

impl Drop for PollingFeed {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

/// Feed driven by an external publisher (event stream, websocket bridge).
pub struct PushFeed {
    tx: watch::Sender<FeedEvent>,
}

impl Default for PushFeed {
    fn default() -> Self {
        Self::new()
    }
}

impl PushFeed {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(FeedEvent::Pending);
        Self { tx }
    }

    pub fn publish(&self, groups: Vec<StateGroup>) {
        let board = StateBoard::from_groups(groups);
        self.tx.send_replace(FeedEvent::Updated(Arc::new(board)));
    }

    pub fn publish_error(&self, err: TrackerError) {
        self.tx.send_replace(FeedEvent::Failed(Arc::new(err)));
    }
}

impl StateGroupFeed for PushFeed {
    fn subscribe(&self) -> watch::Receiver<FeedEvent> {
        self.tx.subscribe()
    }
}
