use sharelist_core::{
    Capability, ListId, ListStore, ListSynchronizer, MemoryListStore, Mutation, Principal,
    SqliteListStore, StaticIdentity, StoreError, SyncError, SyncState, TaskId,
};
use std::collections::BTreeSet;
use std::sync::Arc;

const OWNER: &str = "o@x.com";
const COLLABORATOR: &str = "c@x.com";
const STRANGER: &str = "z@x.com";

fn client(store: &Arc<MemoryListStore>, principal: &str) -> ListSynchronizer<MemoryListStore> {
    ListSynchronizer::new(Arc::clone(store), Some(Principal::new(principal)))
}

/// Binds a second client to `id` and applies the queued initial snapshot.
fn joined(
    store: &Arc<MemoryListStore>,
    principal: &str,
    id: &ListId,
) -> ListSynchronizer<MemoryListStore> {
    let mut sync = client(store, principal);
    sync.bind(id.clone()).unwrap();
    sync.drain_snapshots().unwrap();
    sync
}

fn task_texts(sync: &ListSynchronizer<MemoryListStore>) -> Vec<&str> {
    sync.tasks().iter().map(|task| task.text.as_str()).collect()
}

#[tokio::test]
async fn owner_creates_empty_private_list() {
    let store = Arc::new(MemoryListStore::new());
    let mut owner = client(&store, OWNER);

    let id = owner.create_list("Groceries").await.unwrap();

    let document = store.get(&id).await.unwrap().unwrap();
    assert_eq!(document.title, "Groceries");
    assert_eq!(document.owner_id, Principal::new(OWNER));
    assert!(document.tasks.is_empty());
    assert!(document.collaborators.is_empty());
    assert_eq!(owner.state(), SyncState::Subscribed);
    assert_eq!(owner.capability(), Capability::Owner);
    assert!(owner.can_edit());
}

#[tokio::test]
async fn owner_adds_and_toggles_a_task() {
    let store = Arc::new(MemoryListStore::new());
    let mut owner = client(&store, OWNER);
    let id = owner.create_list("Groceries").await.unwrap();

    owner.add_task("Milk").await.unwrap();
    let milk = owner.tasks()[0].clone();
    assert_eq!(milk.text, "Milk");
    assert!(!milk.done);

    owner.toggle_task(milk.id).await.unwrap();

    let document = store.get(&id).await.unwrap().unwrap();
    assert_eq!(document.tasks.len(), 1);
    assert_eq!(document.tasks[0].id, milk.id);
    assert!(document.tasks[0].done);
    assert_eq!(document.title, "Groceries");
    assert!(document.collaborators.is_empty());
}

#[tokio::test]
async fn invited_collaborator_edits_and_stranger_is_rejected() {
    let store = Arc::new(MemoryListStore::new());
    let mut owner = client(&store, OWNER);
    let id = owner.create_list("Groceries").await.unwrap();

    owner.invite(COLLABORATOR).await.unwrap();
    let document = store.get(&id).await.unwrap().unwrap();
    assert!(document.is_shared_with(&Principal::new(COLLABORATOR)));
    assert_eq!(document.collaborators.len(), 1);

    let mut collaborator = joined(&store, COLLABORATOR, &id);
    assert_eq!(collaborator.capability(), Capability::Collaborator);
    collaborator.add_task("Eggs").await.unwrap();

    let mut stranger = joined(&store, STRANGER, &id);
    assert!(!stranger.can_edit());
    let before = store.get(&id).await.unwrap();

    let err = stranger.add_task("Spam").await.unwrap_err();
    assert!(matches!(
        err,
        SyncError::PermissionDenied { principal: Some(p), list_id }
            if p == Principal::new(STRANGER) && list_id == id
    ));
    assert_eq!(store.get(&id).await.unwrap(), before);
    assert_eq!(stranger.dirty_since(), None);
}

#[tokio::test]
async fn removed_collaborator_loses_edit_on_next_snapshot() {
    let store = Arc::new(MemoryListStore::new());
    let mut owner = client(&store, OWNER);
    let id = owner.create_list("Groceries").await.unwrap();
    owner.invite(COLLABORATOR).await.unwrap();

    let mut collaborator = joined(&store, COLLABORATOR, &id);
    assert!(collaborator.can_edit());

    owner.remove_collaborator(COLLABORATOR).await.unwrap();
    assert!(store.get(&id).await.unwrap().unwrap().collaborators.is_empty());

    assert!(collaborator.next_snapshot().await.unwrap());
    assert!(!collaborator.can_edit());
    assert_eq!(collaborator.capability(), Capability::ReadOnly);
    assert!(matches!(
        collaborator.add_task("Eggs").await.unwrap_err(),
        SyncError::PermissionDenied { .. }
    ));
}

#[tokio::test]
async fn concurrent_writers_lose_the_unseen_update() {
    let store = Arc::new(MemoryListStore::new());
    let mut first = client(&store, OWNER);
    let id = first.create_list("Groceries").await.unwrap();
    first.invite(COLLABORATOR).await.unwrap();
    first.add_task("T1").await.unwrap();
    first.drain_snapshots().unwrap();

    let mut second = joined(&store, COLLABORATOR, &id);
    assert_eq!(task_texts(&second), ["T1"]);

    first.add_task("T2").await.unwrap();
    // `second` has not applied the T2 snapshot and writes from its stale view.
    second.add_task("T3").await.unwrap();

    let stored = store.get(&id).await.unwrap().unwrap();
    let texts: Vec<&str> = stored.tasks.iter().map(|task| task.text.as_str()).collect();
    assert_eq!(texts, ["T1", "T3"]);

    first.drain_snapshots().unwrap();
    second.drain_snapshots().unwrap();
    assert_eq!(task_texts(&first), ["T1", "T3"]);
    assert_eq!(task_texts(&second), ["T1", "T3"]);
}

#[tokio::test]
async fn failed_write_keeps_optimistic_state_until_next_snapshot() {
    let store = Arc::new(MemoryListStore::new());
    let mut owner = client(&store, OWNER);
    let id = owner.create_list("Groceries").await.unwrap();
    owner.drain_snapshots().unwrap();

    store.fail_next_writes(1);
    let err = owner.add_task("Milk").await.unwrap_err();
    assert!(matches!(err, SyncError::Store(StoreError::Unavailable(_))));

    assert_eq!(task_texts(&owner), ["Milk"]);
    assert!(owner.dirty_since().is_some());
    assert!(owner.last_known_remote().unwrap().tasks.is_empty());
    assert!(store.get(&id).await.unwrap().unwrap().tasks.is_empty());

    let mut other = joined(&store, OWNER, &id);
    other.add_task("Eggs").await.unwrap();

    assert_eq!(owner.drain_snapshots().unwrap(), 1);
    assert_eq!(task_texts(&owner), ["Eggs"]);
    assert_eq!(owner.dirty_since(), None);
}

#[tokio::test]
async fn dirty_marker_tracks_first_unconfirmed_write() {
    let store = Arc::new(MemoryListStore::new());
    let mut owner = client(&store, OWNER);
    owner.create_list("Groceries").await.unwrap();
    owner.drain_snapshots().unwrap();

    let first = owner.add_task("Milk").await.unwrap();
    let second = owner.add_task("Eggs").await.unwrap();
    assert!(second > first);
    assert_eq!(owner.dirty_since(), Some(first));

    // Both echoes collapse into the latest snapshot.
    assert_eq!(owner.drain_snapshots().unwrap(), 1);
    assert_eq!(owner.dirty_since(), None);
    assert_eq!(owner.local_view(), owner.last_known_remote());
}

#[tokio::test]
async fn deleted_list_reports_not_found_and_stops_editing() {
    let store = Arc::new(MemoryListStore::new());
    let mut owner = client(&store, OWNER);
    let id = owner.create_list("Groceries").await.unwrap();
    owner.drain_snapshots().unwrap();

    store.delete(&id).await.unwrap();

    let err = owner.next_snapshot().await.unwrap_err();
    assert!(matches!(err, SyncError::NotFound(missing) if missing == id));
    assert!(owner.is_missing());
    assert!(!owner.can_edit());
    assert!(matches!(
        owner.add_task("Milk").await.unwrap_err(),
        SyncError::NotFound(_)
    ));
    assert!(matches!(
        owner.next_snapshot().await.unwrap_err(),
        SyncError::NotFound(_)
    ));
}

#[tokio::test]
async fn binding_unknown_id_reports_not_found() {
    let store = Arc::new(MemoryListStore::new());
    let mut sync = client(&store, OWNER);
    sync.bind(ListId::new("does-not-exist")).unwrap();

    assert!(matches!(
        sync.drain_snapshots().unwrap_err(),
        SyncError::NotFound(_)
    ));
    assert!(sync.local_view().is_none());
}

#[tokio::test]
async fn detach_is_idempotent_and_ignores_later_writes() {
    let store = Arc::new(MemoryListStore::new());
    let mut owner = client(&store, OWNER);
    let id = owner.create_list("Groceries").await.unwrap();
    let mut viewer = joined(&store, OWNER, &id);
    assert_eq!(store.subscriber_count(&id), 2);
    owner.add_task("Bread").await.unwrap();
    viewer.drain_snapshots().unwrap();
    assert!(viewer.toggle_select(viewer.tasks()[0].id));

    viewer.detach();
    viewer.detach();
    owner.add_task("Milk").await.unwrap();

    assert_eq!(viewer.state(), SyncState::Detached);
    assert!(viewer.selection().is_empty());
    assert_eq!(viewer.list_id(), Some(&id));
    assert_eq!(store.subscriber_count(&id), 1);
    assert!(!viewer.next_snapshot().await.unwrap());
    assert_eq!(viewer.drain_snapshots().unwrap(), 0);
    assert!(viewer.tasks().is_empty());
    assert!(matches!(
        viewer.add_task("Eggs").await.unwrap_err(),
        SyncError::NotBound
    ));
}

#[tokio::test]
async fn detached_client_can_bind_again() {
    let store = Arc::new(MemoryListStore::new());
    let mut owner = client(&store, OWNER);
    let id = owner.create_list("Groceries").await.unwrap();
    owner.add_task("Milk").await.unwrap();
    owner.detach();

    owner.bind(id.clone()).unwrap();
    assert_eq!(owner.drain_snapshots().unwrap(), 1);
    assert_eq!(task_texts(&owner), ["Milk"]);
    assert!(owner.can_edit());
}

#[tokio::test]
async fn principal_change_rederives_capability() {
    let store = Arc::new(MemoryListStore::new());
    let mut owner = client(&store, OWNER);
    let id = owner.create_list("Groceries").await.unwrap();

    let mut session = joined(&store, STRANGER, &id);
    assert!(!session.can_edit());

    session.set_principal(Some(Principal::new(OWNER)));
    assert_eq!(session.capability(), Capability::Owner);

    session.set_principal(None);
    assert!(!session.can_edit());
    assert!(matches!(
        session.add_task("Milk").await.unwrap_err(),
        SyncError::PermissionDenied { principal: None, .. }
    ));
}

#[tokio::test]
async fn identity_provider_supplies_principal() {
    let store = Arc::new(MemoryListStore::new());
    let mut signed_in =
        ListSynchronizer::with_identity(Arc::clone(&store), &StaticIdentity::signed_in(OWNER));
    assert_eq!(signed_in.principal(), Some(&Principal::new(OWNER)));
    signed_in.create_list("Groceries").await.unwrap();

    let mut anonymous =
        ListSynchronizer::with_identity(Arc::clone(&store), &StaticIdentity::anonymous());
    assert!(matches!(
        anonymous.create_list("Chores").await.unwrap_err(),
        SyncError::Unauthenticated
    ));
}

#[tokio::test]
async fn bulk_actions_apply_to_selection_and_clear_it() {
    let store = Arc::new(MemoryListStore::new());
    let mut owner = client(&store, OWNER);
    let id = owner.create_list("Groceries").await.unwrap();
    for text in ["Milk", "Eggs", "Bread"] {
        owner.add_task(text).await.unwrap();
    }
    let ids: Vec<TaskId> = owner.tasks().iter().map(|task| task.id).collect();

    assert_eq!(owner.delete_selected().await.unwrap(), None);

    assert!(owner.toggle_select(ids[0]));
    assert!(owner.toggle_select(ids[1]));
    assert!(owner.mark_selected_done().await.unwrap().is_some());
    assert!(owner.selection().is_empty());

    let document = store.get(&id).await.unwrap().unwrap();
    let done: Vec<bool> = document.tasks.iter().map(|task| task.done).collect();
    assert_eq!(done, [true, true, false]);

    owner.toggle_select(ids[2]);
    owner.delete_selected().await.unwrap();
    let document = store.get(&id).await.unwrap().unwrap();
    assert_eq!(document.tasks.len(), 2);
    assert!(document.tasks.iter().all(|task| task.id != ids[2]));
}

#[tokio::test]
async fn read_only_bulk_action_is_rejected() {
    let store = Arc::new(MemoryListStore::new());
    let mut owner = client(&store, OWNER);
    let id = owner.create_list("Groceries").await.unwrap();
    owner.add_task("Milk").await.unwrap();

    let mut stranger = joined(&store, STRANGER, &id);
    stranger.toggle_select(stranger.tasks()[0].id);

    assert!(matches!(
        stranger.delete_selected().await.unwrap_err(),
        SyncError::PermissionDenied { .. }
    ));
    assert_eq!(store.get(&id).await.unwrap().unwrap().tasks.len(), 1);
}

#[tokio::test]
async fn staged_write_can_be_committed_on_another_task() {
    let store = Arc::new(MemoryListStore::new());
    let mut owner = client(&store, OWNER);
    let id = owner.create_list("Groceries").await.unwrap();

    let pending = owner
        .stage(Mutation::AddTask("Milk".to_string()))
        .unwrap();
    assert_eq!(pending.list_id(), &id);
    assert_eq!(task_texts(&owner), ["Milk"]);
    assert!(store.get(&id).await.unwrap().unwrap().tasks.is_empty());

    let sequence = pending.sequence();
    let committed = tokio::spawn(pending.commit()).await.unwrap().unwrap();
    assert_eq!(committed, sequence);
    assert_eq!(store.get(&id).await.unwrap().unwrap().tasks.len(), 1);
}

#[tokio::test]
async fn invalid_invitee_is_rejected_before_writing() {
    let store = Arc::new(MemoryListStore::new());
    let mut owner = client(&store, OWNER);
    let id = owner.create_list("Groceries").await.unwrap();

    let err = owner.invite("not-an-email").await.unwrap_err();
    assert!(matches!(err, SyncError::Validation(_)));
    assert!(owner.collaborators().unwrap().is_empty());
    assert!(store.get(&id).await.unwrap().unwrap().collaborators.is_empty());
}

#[tokio::test]
async fn synchronizer_runs_over_a_trait_object_store() {
    let store: Arc<dyn ListStore> = Arc::new(SqliteListStore::open_in_memory().unwrap());
    let mut owner = ListSynchronizer::new(Arc::clone(&store), Some(Principal::new(OWNER)));
    let id = owner.create_list("Groceries").await.unwrap();

    owner.add_task("Milk").await.unwrap();
    owner
        .remove_tasks(owner.tasks().iter().map(|task| task.id).collect::<BTreeSet<_>>())
        .await
        .unwrap();

    assert_eq!(owner.drain_snapshots().unwrap(), 1);
    assert!(owner.tasks().is_empty());
    assert!(store.get(&id).await.unwrap().unwrap().tasks.is_empty());
}

#[tokio::test]
async fn created_list_id_survives_a_failed_subscribe() {
    let store = Arc::new(MemoryListStore::new());
    let mut owner = client(&store, OWNER);
    store.fail_next_subscribes(1);

    let err = owner.create_list("Groceries").await.unwrap_err();
    let (list_id, source) = match err {
        SyncError::SubscribeFailed { list_id, source } => (list_id, source),
        other => panic!("unexpected error: {other}"),
    };
    assert!(matches!(source, StoreError::Unavailable(_)));
    assert_eq!(owner.state(), SyncState::Unbound);
    assert!(store.get(&list_id).await.unwrap().is_some());

    owner.bind(list_id.clone()).unwrap();
    assert_eq!(owner.drain_snapshots().unwrap(), 1);
    assert_eq!(owner.capability(), Capability::Owner);
}
