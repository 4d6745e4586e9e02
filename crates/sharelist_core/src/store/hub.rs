//! Snapshot fan-out shared by the bundled stores.
//!
//! # Invariants
//! - One latest-value `watch` channel per subscription. A snapshot not yet
//!   read is replaced by the next one, so an idle subscriber holds at most one
//!   pending snapshot.
//! - Snapshots are observed in the order `publish` is called for that list;
//!   superseded ones may be skipped.
//! - A cancelled subscription is unregistered and its sender dropped, so no
//!   event can be observed after `cancel` returns.
//! - Senders whose receiver is gone are pruned on the next publish.

use crate::model::list::{ListDocument, ListId};
use log::debug;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::watch;

/// One change-stream event: the full document, or `None` once it is absent.
pub type Snapshot = Option<ListDocument>;

type SubscriberId = u64;

#[derive(Default)]
struct HubState {
    next_id: SubscriberId,
    subscribers: HashMap<ListId, Vec<(SubscriberId, watch::Sender<Snapshot>)>>,
}

/// Registry of live subscriptions keyed by list id.
#[derive(Clone, Default)]
pub(crate) struct SubscriberHub {
    state: Arc<Mutex<HubState>>,
}

impl SubscriberHub {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Registers a subscriber with `initial` pending as its first event.
    pub(crate) fn register(&self, list_id: &ListId, initial: Snapshot) -> Subscription {
        let (sender, mut receiver) = watch::channel(initial);
        receiver.mark_changed();

        let mut state = self.lock();
        let subscriber_id = state.next_id;
        state.next_id += 1;
        state
            .subscribers
            .entry(list_id.clone())
            .or_default()
            .push((subscriber_id, sender));

        debug!(
            "event=subscribe module=store status=ok list_id={} subscriber_id={}",
            list_id, subscriber_id
        );

        Subscription {
            list_id: list_id.clone(),
            subscriber_id,
            receiver,
            hub: self.clone(),
            cancelled: false,
        }
    }

    /// Replaces the pending snapshot of every live subscriber of `list_id`.
    pub(crate) fn publish(&self, list_id: &ListId, snapshot: &Snapshot) {
        let mut state = self.lock();
        let Some(subscribers) = state.subscribers.get_mut(list_id) else {
            return;
        };
        subscribers.retain(|(_, sender)| sender.send(snapshot.clone()).is_ok());
        let delivered = subscribers.len();
        if subscribers.is_empty() {
            state.subscribers.remove(list_id);
        }

        debug!(
            "event=snapshot_publish module=store status=ok list_id={} present={} delivered={}",
            list_id,
            snapshot.is_some(),
            delivered
        );
    }

    pub(crate) fn subscriber_count(&self, list_id: &ListId) -> usize {
        self.lock().subscribers.get(list_id).map_or(0, Vec::len)
    }

    fn unregister(&self, list_id: &ListId, subscriber_id: SubscriberId) {
        let mut state = self.lock();
        if let Some(subscribers) = state.subscribers.get_mut(list_id) {
            subscribers.retain(|(id, _)| *id != subscriber_id);
            if subscribers.is_empty() {
                state.subscribers.remove(list_id);
            }
        }
    }

    fn lock(&self) -> MutexGuard<'_, HubState> {
        // A panic while holding the lock cannot leave the registry half-updated.
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Handle to one list's change stream.
///
/// Only the newest unread snapshot is kept; a reader that falls behind skips
/// straight to the latest state. Dropping the handle cancels it.
pub struct Subscription {
    list_id: ListId,
    subscriber_id: SubscriberId,
    receiver: watch::Receiver<Snapshot>,
    hub: SubscriberHub,
    cancelled: bool,
}

impl Subscription {
    pub fn list_id(&self) -> &ListId {
        &self.list_id
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled
    }

    /// Waits for the next snapshot. Returns `None` once cancelled.
    pub async fn next(&mut self) -> Option<Snapshot> {
        if self.cancelled {
            return None;
        }
        self.receiver.changed().await.ok()?;
        Some(self.receiver.borrow_and_update().clone())
    }

    /// Returns the pending snapshot without waiting.
    pub fn try_next(&mut self) -> Option<Snapshot> {
        if self.cancelled || !self.receiver.has_changed().unwrap_or(false) {
            return None;
        }
        Some(self.receiver.borrow_and_update().clone())
    }

    /// Stops the stream and discards the pending snapshot. Idempotent.
    pub fn cancel(&mut self) {
        if self.cancelled {
            return;
        }
        self.cancelled = true;
        self.hub.unregister(&self.list_id, self.subscriber_id);
        self.receiver.mark_unchanged();

        debug!(
            "event=unsubscribe module=store status=ok list_id={} subscriber_id={}",
            self.list_id, self.subscriber_id
        );
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.cancel();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("list_id", &self.list_id)
            .field("subscriber_id", &self.subscriber_id)
            .field("cancelled", &self.cancelled)
            .finish()
    }
}
