//! List directory use-case service.
//!
//! # Responsibility
//! - Enumerate lists owned by, or shared with, a principal.
//! - Create and delete lists from the directory view.
//!
//! # Invariants
//! - Only the owner may delete a list.
//! - Summaries are sorted by `title ASC, id ASC`.

use crate::model::list::{ListDocument, ListId, NewList};
use crate::model::principal::Principal;
use crate::model::task::pending;
use crate::model::validation::ValidationError;
use crate::store::{ListFilter, ListStore, StoreError};
use log::{info, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Service error for directory use-cases.
#[derive(Debug)]
pub enum DirectoryError {
    /// Title input is blank.
    Validation(ValidationError),
    /// Target list does not exist.
    NotFound(ListId),
    /// Principal is not the list owner.
    PermissionDenied(ListId),
    /// Persistence-layer failure.
    Store(StoreError),
}

impl Display for DirectoryError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::NotFound(id) => write!(f, "list not found: {id}"),
            Self::PermissionDenied(id) => write!(f, "only the owner may delete list {id}"),
            Self::Store(err) => write!(f, "{err}"),
        }
    }
}

impl Error for DirectoryError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Store(err) => Some(err),
            _ => None,
        }
    }
}

impl From<StoreError> for DirectoryError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::NotFound(id) => Self::NotFound(id),
            other => Self::Store(other),
        }
    }
}

impl From<ValidationError> for DirectoryError {
    fn from(value: ValidationError) -> Self {
        Self::Validation(value)
    }
}

/// Directory row for one list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListSummary {
    pub id: ListId,
    pub title: String,
    pub owner_id: Principal,
    pub task_count: usize,
    pub pending_count: usize,
}

impl From<&ListDocument> for ListSummary {
    fn from(document: &ListDocument) -> Self {
        Self {
            id: document.id.clone(),
            title: document.title.clone(),
            owner_id: document.owner_id.clone(),
            task_count: document.tasks.len(),
            pending_count: pending(&document.tasks).count(),
        }
    }
}

/// Directory facade over a list store.
pub struct ListDirectory<S: ListStore> {
    store: S,
}

impl<S: ListStore> ListDirectory<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Lists created by `principal`.
    pub async fn owned_lists(
        &self,
        principal: &Principal,
    ) -> Result<Vec<ListSummary>, DirectoryError> {
        self.summaries(ListFilter::OwnedBy(principal.clone())).await
    }

    /// Lists where `principal` is a collaborator.
    pub async fn shared_lists(
        &self,
        principal: &Principal,
    ) -> Result<Vec<ListSummary>, DirectoryError> {
        self.summaries(ListFilter::SharedWith(principal.clone()))
            .await
    }

    /// Creates a private, empty list owned by `principal`.
    pub async fn create_list(
        &self,
        principal: &Principal,
        title: &str,
    ) -> Result<ListSummary, DirectoryError> {
        let draft = NewList::new(title, principal.clone())?;
        let id = self.store.create(draft.clone()).await?;
        info!("event=directory_create module=directory status=ok list_id={id}");
        Ok(ListSummary::from(&ListDocument::from_new(id, draft)))
    }

    /// Deletes a list owned by `principal`. Subscribers receive an absent
    /// snapshot.
    pub async fn delete_list(
        &self,
        principal: &Principal,
        id: &ListId,
    ) -> Result<(), DirectoryError> {
        let document = self
            .store
            .get(id)
            .await?
            .ok_or_else(|| DirectoryError::NotFound(id.clone()))?;
        if !document.is_owned_by(principal) {
            warn!(
                "event=directory_delete module=directory status=rejected list_id={id} error_code=not_owner"
            );
            return Err(DirectoryError::PermissionDenied(id.clone()));
        }

        self.store.delete(id).await?;
        info!("event=directory_delete module=directory status=ok list_id={id}");
        Ok(())
    }

    async fn summaries(&self, filter: ListFilter) -> Result<Vec<ListSummary>, DirectoryError> {
        let documents = self.store.query(&filter).await?;
        let mut summaries: Vec<ListSummary> = documents.iter().map(ListSummary::from).collect();
        summaries.sort_by(|a, b| a.title.cmp(&b.title).then_with(|| a.id.cmp(&b.id)));
        info!(
            "event=directory_query module=directory status=ok filter={} count={}",
            filter.kind(),
            summaries.len()
        );
        Ok(summaries)
    }
}
