//! In-process list store.
//!
//! Clones share one document map and one subscriber hub, so several
//! synchronizers built from clones behave like clients of one backend.

use super::hub::SubscriberHub;
use super::{ListFilter, ListStore, StoreError, StoreResult, Subscription};
use crate::model::list::{ListDocument, ListId, ListPatch, NewList};
use async_trait::async_trait;
use log::{debug, warn};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Default)]
struct MemoryState {
    documents: BTreeMap<ListId, ListDocument>,
    failing_writes: u32,
    failing_subscribes: u32,
}

/// Shared in-memory store with snapshot fan-out.
#[derive(Clone, Default)]
pub struct MemoryListStore {
    state: Arc<Mutex<MemoryState>>,
    hub: SubscriberHub,
}

impl MemoryListStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next `count` writes (`create`, `update`, `delete`) fail with
    /// `StoreError::Unavailable`.
    pub fn fail_next_writes(&self, count: u32) {
        self.lock().failing_writes = count;
    }

    /// Makes the next `count` `subscribe` calls fail with
    /// `StoreError::Unavailable`.
    pub fn fail_next_subscribes(&self, count: u32) {
        self.lock().failing_subscribes = count;
    }

    /// Number of live subscriptions for `id`.
    pub fn subscriber_count(&self, id: &ListId) -> usize {
        self.hub.subscriber_count(id)
    }

    pub fn len(&self) -> usize {
        self.lock().documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().documents.is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl MemoryState {
    fn take_injected_failure(&mut self, operation: &str) -> StoreResult<()> {
        if self.failing_writes == 0 {
            return Ok(());
        }
        self.failing_writes -= 1;
        warn!("event=store_write module=store status=error backend=memory op={operation} error_code=injected_failure");
        Err(StoreError::Unavailable(format!(
            "injected failure for `{operation}`"
        )))
    }
}

#[async_trait]
impl ListStore for MemoryListStore {
    async fn create(&self, draft: NewList) -> StoreResult<ListId> {
        let mut state = self.lock();
        state.take_injected_failure("create")?;

        let id = ListId::generate();
        let document = ListDocument::from_new(id.clone(), draft);
        state.documents.insert(id.clone(), document.clone());
        self.hub.publish(&id, &Some(document));

        debug!("event=store_write module=store status=ok backend=memory op=create list_id={id}");
        Ok(id)
    }

    async fn get(&self, id: &ListId) -> StoreResult<Option<ListDocument>> {
        Ok(self.lock().documents.get(id).cloned())
    }

    async fn update(&self, id: &ListId, patch: ListPatch) -> StoreResult<()> {
        let mut state = self.lock();
        state.take_injected_failure("update")?;

        let fields = patch.field_names();
        let document = state
            .documents
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(id.clone()))?;
        patch.apply_to(document);
        let snapshot = Some(document.clone());
        self.hub.publish(id, &snapshot);

        debug!("event=store_write module=store status=ok backend=memory op=update list_id={id} fields={fields}");
        Ok(())
    }

    async fn delete(&self, id: &ListId) -> StoreResult<()> {
        let mut state = self.lock();
        state.take_injected_failure("delete")?;

        if state.documents.remove(id).is_none() {
            return Err(StoreError::NotFound(id.clone()));
        }
        self.hub.publish(id, &None);

        debug!("event=store_write module=store status=ok backend=memory op=delete list_id={id}");
        Ok(())
    }

    async fn query(&self, filter: &ListFilter) -> StoreResult<Vec<ListDocument>> {
        Ok(self
            .lock()
            .documents
            .values()
            .filter(|document| filter.matches(document))
            .cloned()
            .collect())
    }

    fn subscribe(&self, id: &ListId) -> StoreResult<Subscription> {
        // Hold the document lock so no write lands between the read and the
        // registration.
        let mut state = self.lock();
        if state.failing_subscribes > 0 {
            state.failing_subscribes -= 1;
            warn!("event=subscribe module=store status=error backend=memory list_id={id} error_code=injected_failure");
            return Err(StoreError::Unavailable(format!(
                "injected failure for `subscribe` on {id}"
            )));
        }
        let current = state.documents.get(id).cloned();
        Ok(self.hub.register(id, current))
    }
}
