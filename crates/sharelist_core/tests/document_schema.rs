use serde_json::json;
use sharelist_core::{Capability, ListDocument, ListId, NewList, Principal, Task, TaskId};

#[test]
fn list_document_serializes_with_camel_case_owner() {
    let draft = NewList::new("Groceries", Principal::new("o@x.com")).unwrap();
    let mut document = ListDocument::from_new(ListId::new("l1"), draft);
    document.collaborators.insert(Principal::new("c@x.com"));
    document.tasks.push(Task {
        id: TaskId::new(1),
        text: "Milk".to_string(),
        done: true,
    });

    let value = serde_json::to_value(&document).unwrap();
    assert_eq!(
        value,
        json!({
            "id": "l1",
            "title": "Groceries",
            "ownerId": "o@x.com",
            "collaborators": ["c@x.com"],
            "tasks": [{"id": 1, "text": "Milk", "done": true}],
        })
    );
}

#[test]
fn missing_arrays_default_to_empty() {
    let document: ListDocument = serde_json::from_value(json!({
        "id": "l1",
        "title": "Groceries",
        "ownerId": "o@x.com",
    }))
    .unwrap();

    assert!(document.collaborators.is_empty());
    assert!(document.tasks.is_empty());
    assert!(document.is_owned_by(&Principal::new("o@x.com")));
}

#[test]
fn duplicate_collaborators_collapse_on_read() {
    let document: ListDocument = serde_json::from_value(json!({
        "id": "l1",
        "title": "Groceries",
        "ownerId": "o@x.com",
        "collaborators": ["c@x.com", "c@x.com"],
        "tasks": [],
    }))
    .unwrap();

    assert_eq!(document.collaborators.len(), 1);
}

#[test]
fn stored_principals_are_trimmed_on_read() {
    let document: ListDocument = serde_json::from_value(json!({
        "id": "l1",
        "title": "Groceries",
        "ownerId": "o@x.com ",
        "collaborators": [" c@x.com"],
    }))
    .unwrap();

    let collaborator = Principal::new("c@x.com");
    assert!(document.is_shared_with(&collaborator));
    assert!(document.is_owned_by(&Principal::new("o@x.com")));
    assert_eq!(
        Capability::for_document(Some(&collaborator), &document),
        Capability::Collaborator
    );
}
