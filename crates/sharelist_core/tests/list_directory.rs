use sharelist_core::model::task::{add_task, toggle_task};
use sharelist_core::{
    DirectoryError, ListDirectory, ListId, ListPatch, ListStore, MemoryListStore, Principal,
    ValidationError,
};

fn principal(value: &str) -> Principal {
    Principal::new(value)
}

#[tokio::test]
async fn owned_and_shared_lists_are_separate_views() {
    let store = MemoryListStore::new();
    let directory = ListDirectory::new(store.clone());

    let mine = directory
        .create_list(&principal("o@x.com"), "Groceries")
        .await
        .unwrap();
    let theirs = directory
        .create_list(&principal("t@x.com"), "Chores")
        .await
        .unwrap();
    store
        .update(
            &theirs.id,
            ListPatch::collaborators([principal("o@x.com")].into()),
        )
        .await
        .unwrap();

    let owned = directory.owned_lists(&principal("o@x.com")).await.unwrap();
    let shared = directory.shared_lists(&principal("o@x.com")).await.unwrap();

    assert_eq!(owned.len(), 1);
    assert_eq!(owned[0].id, mine.id);
    assert_eq!(shared.len(), 1);
    assert_eq!(shared[0].id, theirs.id);
    assert_eq!(shared[0].owner_id, principal("t@x.com"));
}

#[tokio::test]
async fn summaries_are_sorted_and_count_pending_tasks() {
    let store = MemoryListStore::new();
    let directory = ListDirectory::new(store.clone());
    let owner = principal("o@x.com");

    directory.create_list(&owner, "Work").await.unwrap();
    let home = directory.create_list(&owner, "Home").await.unwrap();

    let tasks = add_task(&add_task(&[], "Sweep").unwrap(), "Dust").unwrap();
    let tasks = toggle_task(&tasks, tasks[0].id);
    store.update(&home.id, ListPatch::tasks(tasks)).await.unwrap();

    let owned = directory.owned_lists(&owner).await.unwrap();
    let titles: Vec<&str> = owned.iter().map(|summary| summary.title.as_str()).collect();
    assert_eq!(titles, ["Home", "Work"]);
    assert_eq!(owned[0].task_count, 2);
    assert_eq!(owned[0].pending_count, 1);
}

#[tokio::test]
async fn blank_title_is_rejected() {
    let directory = ListDirectory::new(MemoryListStore::new());
    let err = directory
        .create_list(&principal("o@x.com"), "  ")
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        DirectoryError::Validation(ValidationError::EmptyTitle)
    ));
}

#[tokio::test]
async fn only_the_owner_may_delete() {
    let store = MemoryListStore::new();
    let directory = ListDirectory::new(store.clone());
    let list = directory
        .create_list(&principal("o@x.com"), "Groceries")
        .await
        .unwrap();
    store
        .update(
            &list.id,
            ListPatch::collaborators([principal("c@x.com")].into()),
        )
        .await
        .unwrap();

    let err = directory
        .delete_list(&principal("c@x.com"), &list.id)
        .await
        .unwrap_err();
    assert!(matches!(err, DirectoryError::PermissionDenied(id) if id == list.id));
    assert_eq!(store.len(), 1);

    directory
        .delete_list(&principal("o@x.com"), &list.id)
        .await
        .unwrap();
    assert!(store.is_empty());
}

#[tokio::test]
async fn deleting_unknown_list_is_not_found() {
    let directory = ListDirectory::new(MemoryListStore::new());
    let err = directory
        .delete_list(&principal("o@x.com"), &ListId::new("missing"))
        .await
        .unwrap_err();
    assert!(matches!(err, DirectoryError::NotFound(_)));
}
