//! List synchronizer state machine.
//!
//! # Responsibility
//! - Bind to one list (by creating it or by id) and consume its snapshot
//!   stream.
//! - Apply optimistic local mutations and write the changed fields back.
//! - Expose the reconciled view, the last remote snapshot and the edit
//!   capability to the presentation layer.
//!
//! # Invariants
//! - States move `Unbound -> Subscribed -> Detached`; a detached synchronizer
//!   may bind again, which starts a fresh subscription.
//! - Mutations without edit capability are rejected before any local change
//!   or store call.
//! - A present snapshot replaces `tasks` and `collaborators` wholesale and
//!   clears the dirty marker; an absent snapshot ends the binding's ability
//!   to edit (no retry).
//! - A failed write never rolls back the optimistic local view.
//! - There is no conflict detection: concurrent writers race and the last
//!   write to land wins in full.

use crate::access::capability::Capability;
use crate::access::collaborators;
use crate::model::list::{ListDocument, ListId, ListPatch, NewList};
use crate::model::principal::{IdentityProvider, Principal};
use crate::model::task::{self, Task, TaskId};
use crate::model::validation::ValidationError;
use crate::store::{ListStore, Snapshot, StoreError, Subscription};
use crate::sync::selection::Selection;
use log::{debug, info, warn};
use std::collections::BTreeSet;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::Arc;

pub type SyncResult<T> = Result<T, SyncError>;

/// Errors surfaced by synchronizer operations.
#[derive(Debug)]
pub enum SyncError {
    /// Mutation input was rejected by a pure transform.
    Validation(ValidationError),
    /// Store call failed. Local optimistic state is kept.
    Store(StoreError),
    /// Bound document is absent or was deleted.
    NotFound(ListId),
    /// Current principal lacks edit capability on the bound list.
    PermissionDenied {
        principal: Option<Principal>,
        list_id: ListId,
    },
    /// Operation needs a known principal.
    Unauthenticated,
    /// Operation needs a bound list.
    NotBound,
    /// Already subscribed; detach first.
    AlreadyBound(ListId),
    /// The list was created but its change stream could not be opened.
    /// `bind(list_id)` can retry.
    SubscribeFailed { list_id: ListId, source: StoreError },
}

impl Display for SyncError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::Store(err) => write!(f, "{err}"),
            Self::NotFound(id) => write!(f, "list not found: {id}"),
            Self::PermissionDenied { principal, list_id } => match principal {
                Some(principal) => write!(
                    f,
                    "{} may not edit list {list_id}",
                    principal.redacted()
                ),
                None => write!(f, "anonymous session may not edit list {list_id}"),
            },
            Self::Unauthenticated => write!(f, "no authenticated principal"),
            Self::NotBound => write!(f, "synchronizer is not bound to a list"),
            Self::AlreadyBound(id) => write!(f, "synchronizer already bound to list {id}"),
            Self::SubscribeFailed { list_id, source } => write!(
                f,
                "list {list_id} was created but could not be subscribed: {source}"
            ),
        }
    }
}

impl Error for SyncError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Store(err) => Some(err),
            Self::SubscribeFailed { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl From<ValidationError> for SyncError {
    fn from(value: ValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<StoreError> for SyncError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::NotFound(id) => Self::NotFound(id),
            other => Self::Store(other),
        }
    }
}

/// Coarse lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    Unbound,
    Subscribed,
    Detached,
}

/// Local edit applied optimistically and written back as whole fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mutation {
    AddTask(String),
    ToggleTask(TaskId),
    RemoveTasks(BTreeSet<TaskId>),
    MarkDone(BTreeSet<TaskId>),
    InviteCollaborator(String),
    RemoveCollaborator(String),
}

impl Mutation {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::AddTask(_) => "add_task",
            Self::ToggleTask(_) => "toggle_task",
            Self::RemoveTasks(_) => "remove_tasks",
            Self::MarkDone(_) => "mark_done",
            Self::InviteCollaborator(_) => "invite_collaborator",
            Self::RemoveCollaborator(_) => "remove_collaborator",
        }
    }

    /// Runs the pure transform against `document` and returns the fields to
    /// overwrite.
    fn to_patch(&self, document: &ListDocument) -> Result<ListPatch, ValidationError> {
        let tasks = &document.tasks;
        let patch = match self {
            Self::AddTask(text) => ListPatch::tasks(task::add_task(tasks, text)?),
            Self::ToggleTask(id) => ListPatch::tasks(task::toggle_task(tasks, *id)),
            Self::RemoveTasks(ids) => ListPatch::tasks(task::remove_tasks(tasks, ids)),
            Self::MarkDone(ids) => ListPatch::tasks(task::mark_done(tasks, ids)),
            Self::InviteCollaborator(email) => {
                ListPatch::collaborators(collaborators::invite(&document.collaborators, email)?)
            }
            Self::RemoveCollaborator(email) => {
                ListPatch::collaborators(collaborators::remove(&document.collaborators, email))
            }
        };
        Ok(patch)
    }
}

/// Write produced by an optimistic mutation, not yet sent to the store.
///
/// Owns everything it needs, so it can be awaited inline or moved to another
/// task while the synchronizer keeps serving reads.
#[must_use = "a pending write does nothing until committed"]
pub struct PendingWrite<S: ListStore + ?Sized> {
    store: Arc<S>,
    list_id: ListId,
    patch: ListPatch,
    sequence: u64,
    kind: &'static str,
}

impl<S: ListStore + ?Sized> PendingWrite<S> {
    pub fn list_id(&self) -> &ListId {
        &self.list_id
    }

    /// Per-synchronizer write number, matching `dirty_since` markers.
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    pub fn patch(&self) -> &ListPatch {
        &self.patch
    }

    /// Sends the changed fields to the store. No retry on failure.
    pub async fn commit(self) -> Result<u64, StoreError> {
        let fields = self.patch.field_names();
        match self.store.update(&self.list_id, self.patch).await {
            Ok(()) => {
                debug!(
                    "event=list_write module=sync status=ok list_id={} op={} seq={} fields={}",
                    self.list_id, self.kind, self.sequence, fields
                );
                Ok(self.sequence)
            }
            Err(err) => {
                warn!(
                    "event=list_write module=sync status=error list_id={} op={} seq={} error={}",
                    self.list_id, self.kind, self.sequence, err
                );
                Err(err)
            }
        }
    }
}

struct ActiveBinding {
    list_id: ListId,
    subscription: Subscription,
    local_view: Option<ListDocument>,
    last_known_remote: Option<ListDocument>,
    dirty_since: Option<u64>,
    capability: Capability,
    missing: bool,
}

enum Binding {
    Unbound,
    Subscribed(Box<ActiveBinding>),
    Detached(ListId),
}

/// Synchronizes one client's view of one list with the shared store.
pub struct ListSynchronizer<S: ListStore + ?Sized> {
    store: Arc<S>,
    principal: Option<Principal>,
    binding: Binding,
    selection: Selection,
    write_sequence: u64,
}

impl<S: ListStore + ?Sized> ListSynchronizer<S> {
    pub fn new(store: Arc<S>, principal: Option<Principal>) -> Self {
        Self {
            store,
            principal,
            binding: Binding::Unbound,
            selection: Selection::new(),
            write_sequence: 0,
        }
    }

    pub fn with_identity(store: Arc<S>, identity: &dyn IdentityProvider) -> Self {
        Self::new(store, identity.current_principal())
    }

    pub fn state(&self) -> SyncState {
        match self.binding {
            Binding::Unbound => SyncState::Unbound,
            Binding::Subscribed(_) => SyncState::Subscribed,
            Binding::Detached(_) => SyncState::Detached,
        }
    }

    pub fn principal(&self) -> Option<&Principal> {
        self.principal.as_ref()
    }

    /// Id of the current or most recent binding.
    pub fn list_id(&self) -> Option<&ListId> {
        match &self.binding {
            Binding::Unbound => None,
            Binding::Subscribed(active) => Some(&active.list_id),
            Binding::Detached(id) => Some(id),
        }
    }

    /// Reconciled view: last snapshot plus optimistic local edits.
    pub fn local_view(&self) -> Option<&ListDocument> {
        self.active().and_then(|active| active.local_view.as_ref())
    }

    pub fn last_known_remote(&self) -> Option<&ListDocument> {
        self.active()
            .and_then(|active| active.last_known_remote.as_ref())
    }

    /// Sequence number of the first local write not yet superseded by a
    /// remote snapshot.
    pub fn dirty_since(&self) -> Option<u64> {
        self.active().and_then(|active| active.dirty_since)
    }

    pub fn tasks(&self) -> &[Task] {
        self.local_view()
            .map(|document| document.tasks.as_slice())
            .unwrap_or_default()
    }

    pub fn collaborators(&self) -> Option<&BTreeSet<Principal>> {
        self.local_view().map(|document| &document.collaborators)
    }

    pub fn capability(&self) -> Capability {
        self.active()
            .map_or(Capability::ReadOnly, |active| active.capability)
    }

    pub fn can_edit(&self) -> bool {
        self.capability().can_edit()
    }

    /// True once the bound document was reported absent.
    pub fn is_missing(&self) -> bool {
        self.active().is_some_and(|active| active.missing)
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    /// Selecting is local and allowed in read-only mode; bulk actions are not.
    pub fn toggle_select(&mut self, id: TaskId) -> bool {
        self.selection.toggle(id)
    }

    pub fn clear_selection(&mut self) {
        self.selection.clear();
    }

    /// Updates the session principal and re-derives edit capability.
    pub fn set_principal(&mut self, principal: Option<Principal>) {
        self.principal = principal;
        let principal = self.principal.clone();
        if let Some(active) = self.active_mut_opt() {
            active.capability = derive_capability(principal.as_ref(), active);
            debug!(
                "event=principal_change module=sync status=ok list_id={} capability={}",
                active.list_id,
                active.capability.as_str()
            );
        }
    }

    /// Persists a new list owned by the current principal and binds to it.
    ///
    /// # Errors
    /// - `Unauthenticated` without a principal.
    /// - `Validation` for a blank title.
    /// - `Store` when the create call fails; the state is left unchanged.
    /// - `SubscribeFailed` when the list exists but its stream could not be
    ///   opened; the state is left unchanged and the error carries the new id.
    pub async fn create_list(&mut self, title: &str) -> SyncResult<ListId> {
        self.ensure_bindable()?;
        let owner = self.principal.clone().ok_or(SyncError::Unauthenticated)?;
        let draft = NewList::new(title, owner)?;

        let list_id = match self.store.create(draft.clone()).await {
            Ok(id) => id,
            Err(err) => {
                warn!("event=list_create module=sync status=error error={err}");
                return Err(SyncError::Store(err));
            }
        };

        let subscription = match self.store.subscribe(&list_id) {
            Ok(subscription) => subscription,
            Err(source) => {
                warn!(
                    "event=list_create module=sync status=error list_id={list_id} error_code=subscribe_failed error={source}"
                );
                return Err(SyncError::SubscribeFailed { list_id, source });
            }
        };
        let seeded = ListDocument::from_new(list_id.clone(), draft);
        self.binding = Binding::Subscribed(Box::new(ActiveBinding {
            list_id: list_id.clone(),
            subscription,
            local_view: Some(seeded),
            last_known_remote: None,
            dirty_since: None,
            capability: Capability::Owner,
            missing: false,
        }));
        self.selection.clear();

        info!("event=list_create module=sync status=ok list_id={list_id}");
        Ok(list_id)
    }

    /// Starts listening to `list_id`. Capability stays read-only until the
    /// first snapshot arrives.
    pub fn bind(&mut self, list_id: ListId) -> SyncResult<()> {
        self.ensure_bindable()?;
        let subscription = self.store.subscribe(&list_id)?;
        info!("event=list_bind module=sync status=ok list_id={list_id}");

        self.binding = Binding::Subscribed(Box::new(ActiveBinding {
            list_id,
            subscription,
            local_view: None,
            last_known_remote: None,
            dirty_since: None,
            capability: Capability::ReadOnly,
            missing: false,
        }));
        self.selection.clear();
        Ok(())
    }

    /// Waits for and applies the next remote snapshot.
    ///
    /// Returns `Ok(false)` once detached (the stream is closed).
    ///
    /// # Errors
    /// - `NotFound` when the snapshot reports the document absent, and on
    ///   every call after that for the same binding.
    pub async fn next_snapshot(&mut self) -> SyncResult<bool> {
        let active = match &mut self.binding {
            Binding::Unbound => return Err(SyncError::NotBound),
            Binding::Detached(_) => return Ok(false),
            Binding::Subscribed(active) => active,
        };
        if active.missing {
            return Err(SyncError::NotFound(active.list_id.clone()));
        }
        let Some(snapshot) = active.subscription.next().await else {
            return Ok(false);
        };
        self.apply_snapshot(snapshot)?;
        Ok(true)
    }

    /// Applies the pending snapshot, if any, without waiting. Unread
    /// snapshots collapse to the latest, so this returns 0 or 1.
    pub fn drain_snapshots(&mut self) -> SyncResult<usize> {
        let mut applied = 0;
        loop {
            let active = match &mut self.binding {
                Binding::Unbound => return Err(SyncError::NotBound),
                Binding::Detached(_) => return Ok(applied),
                Binding::Subscribed(active) => active,
            };
            if active.missing {
                return Err(SyncError::NotFound(active.list_id.clone()));
            }
            let Some(snapshot) = active.subscription.try_next() else {
                return Ok(applied);
            };
            self.apply_snapshot(snapshot)?;
            applied += 1;
        }
    }

    /// Applies `mutation` locally and returns the write to send.
    ///
    /// The local view already reflects the mutation when this returns.
    pub fn stage(&mut self, mutation: Mutation) -> SyncResult<PendingWrite<S>> {
        let principal = self.principal.clone();
        let active = match &mut self.binding {
            Binding::Subscribed(active) => active,
            Binding::Unbound | Binding::Detached(_) => return Err(SyncError::NotBound),
        };
        if active.missing {
            return Err(SyncError::NotFound(active.list_id.clone()));
        }
        let local_view = match active.local_view.as_mut() {
            Some(document) if active.capability.can_edit() => document,
            _ => {
                warn!(
                    "event=list_mutation module=sync status=rejected list_id={} op={} error_code=permission_denied",
                    active.list_id,
                    mutation.kind()
                );
                return Err(SyncError::PermissionDenied {
                    principal,
                    list_id: active.list_id.clone(),
                });
            }
        };

        let patch = mutation.to_patch(local_view)?;
        patch.clone().apply_to(local_view);

        self.write_sequence += 1;
        let sequence = self.write_sequence;
        active.dirty_since.get_or_insert(sequence);

        debug!(
            "event=list_mutation module=sync status=ok list_id={} op={} seq={}",
            active.list_id,
            mutation.kind(),
            sequence
        );

        Ok(PendingWrite {
            store: Arc::clone(&self.store),
            list_id: active.list_id.clone(),
            patch,
            sequence,
            kind: mutation.kind(),
        })
    }

    /// Applies `mutation` locally, then awaits the store write.
    ///
    /// A store failure is returned but the optimistic change stays in the
    /// local view. Returns the write's sequence number.
    pub async fn apply(&mut self, mutation: Mutation) -> SyncResult<u64> {
        let pending = self.stage(mutation)?;
        pending.commit().await.map_err(SyncError::from)
    }

    pub async fn add_task(&mut self, text: &str) -> SyncResult<u64> {
        self.apply(Mutation::AddTask(text.to_string())).await
    }

    pub async fn toggle_task(&mut self, id: TaskId) -> SyncResult<u64> {
        self.apply(Mutation::ToggleTask(id)).await
    }

    pub async fn remove_tasks(&mut self, ids: BTreeSet<TaskId>) -> SyncResult<u64> {
        self.apply(Mutation::RemoveTasks(ids)).await
    }

    pub async fn mark_done(&mut self, ids: BTreeSet<TaskId>) -> SyncResult<u64> {
        self.apply(Mutation::MarkDone(ids)).await
    }

    pub async fn invite(&mut self, email: &str) -> SyncResult<u64> {
        self.apply(Mutation::InviteCollaborator(email.to_string()))
            .await
    }

    pub async fn remove_collaborator(&mut self, email: &str) -> SyncResult<u64> {
        self.apply(Mutation::RemoveCollaborator(email.to_string()))
            .await
    }

    /// Removes the selected tasks and clears the selection.
    ///
    /// Returns `Ok(None)` without writing when nothing is selected.
    pub async fn delete_selected(&mut self) -> SyncResult<Option<u64>> {
        self.apply_to_selection(Mutation::RemoveTasks).await
    }

    /// Marks the selected tasks done and clears the selection.
    pub async fn mark_selected_done(&mut self) -> SyncResult<Option<u64>> {
        self.apply_to_selection(Mutation::MarkDone).await
    }

    /// Ends the subscription. Idempotent.
    pub fn detach(&mut self) {
        let binding = std::mem::replace(&mut self.binding, Binding::Unbound);
        self.binding = match binding {
            Binding::Subscribed(mut active) => {
                active.subscription.cancel();
                info!(
                    "event=list_detach module=sync status=ok list_id={}",
                    active.list_id
                );
                Binding::Detached(active.list_id)
            }
            other => other,
        };
        self.selection.clear();
    }

    async fn apply_to_selection(
        &mut self,
        mutation: fn(BTreeSet<TaskId>) -> Mutation,
    ) -> SyncResult<Option<u64>> {
        if !self.can_edit() {
            // Route through `stage` for the uniform rejection path.
            let ids = self.selection.ids().clone();
            return self.stage(mutation(ids)).map(|_| None);
        }
        if self.selection.is_empty() {
            return Ok(None);
        }
        let ids = self.selection.ids().clone();
        let pending = self.stage(mutation(ids))?;
        self.selection.clear();
        pending.commit().await.map(Some).map_err(SyncError::from)
    }

    fn apply_snapshot(&mut self, snapshot: Snapshot) -> SyncResult<()> {
        let principal = self.principal.clone();
        let Some(active) = self.active_mut_opt() else {
            return Ok(());
        };

        let Some(document) = snapshot else {
            active.missing = true;
            active.capability = Capability::ReadOnly;
            warn!(
                "event=snapshot_apply module=sync status=error list_id={} error_code=list_not_found",
                active.list_id
            );
            return Err(SyncError::NotFound(active.list_id.clone()));
        };

        active.local_view = Some(document.clone());
        active.last_known_remote = Some(document);
        active.dirty_since = None;
        active.capability = derive_capability(principal.as_ref(), active);

        debug!(
            "event=snapshot_apply module=sync status=ok list_id={} tasks={} capability={}",
            active.list_id,
            active.local_view.as_ref().map_or(0, |view| view.tasks.len()),
            active.capability.as_str()
        );
        if !active.capability.can_edit() {
            info!(
                "event=snapshot_apply module=sync status=read_only list_id={}",
                active.list_id
            );
        }
        Ok(())
    }

    fn ensure_bindable(&self) -> SyncResult<()> {
        match &self.binding {
            Binding::Subscribed(active) => Err(SyncError::AlreadyBound(active.list_id.clone())),
            Binding::Unbound | Binding::Detached(_) => Ok(()),
        }
    }

    fn active(&self) -> Option<&ActiveBinding> {
        match &self.binding {
            Binding::Subscribed(active) => Some(active),
            Binding::Unbound | Binding::Detached(_) => None,
        }
    }

    fn active_mut_opt(&mut self) -> Option<&mut ActiveBinding> {
        match &mut self.binding {
            Binding::Subscribed(active) => Some(active),
            Binding::Unbound | Binding::Detached(_) => None,
        }
    }
}

fn derive_capability(principal: Option<&Principal>, active: &ActiveBinding) -> Capability {
    if active.missing {
        return Capability::ReadOnly;
    }
    match &active.local_view {
        Some(document) => Capability::for_document(principal, document),
        None => Capability::ReadOnly,
    }
}
