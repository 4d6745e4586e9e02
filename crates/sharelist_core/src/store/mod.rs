//! List store contract and bundled implementations.
//!
//! # Responsibility
//! - Define the async persistence/sync contract the core depends on.
//! - Ship an in-process store and a SQLite store, both broadcasting
//!   snapshots to subscribers after every write.
//!
//! # Invariants
//! - Writes overwrite whole fields; there is no compare-and-swap, so the last
//!   write to land wins.
//! - Every subscriber of one list observes that list's writes in the same
//!   order, starting with the state at subscription time. A write not yet
//!   read is superseded by the next one.
//! - `update`/`delete` on a missing document fail with `StoreError::NotFound`.

use crate::db::DbError;
use crate::model::list::{ListDocument, ListId, ListPatch, NewList};
use crate::model::principal::Principal;
use async_trait::async_trait;
use std::error::Error;
use std::fmt::{Display, Formatter};

mod hub;
mod memory;
mod sqlite;

pub use hub::{Snapshot, Subscription};
pub use memory::MemoryListStore;
pub use sqlite::SqliteListStore;

pub type StoreResult<T> = Result<T, StoreError>;

/// Failure reported by a store operation.
#[derive(Debug)]
pub enum StoreError {
    /// Target document does not exist (never created or deleted).
    NotFound(ListId),
    /// Store could not be reached or refused the write.
    Unavailable(String),
    /// SQLite backend failure.
    Db(DbError),
    /// Persisted row could not be decoded into a list document.
    InvalidData(String),
    /// JSON encoding of a document field failed.
    Serialization(serde_json::Error),
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotFound(id) => write!(f, "list not found: {id}"),
            Self::Unavailable(message) => write!(f, "store unavailable: {message}"),
            Self::Db(err) => write!(f, "{err}"),
            Self::InvalidData(message) => write!(f, "invalid persisted list data: {message}"),
            Self::Serialization(err) => write!(f, "list serialization failed: {err}"),
        }
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            Self::Serialization(err) => Some(err),
            Self::NotFound(_) | Self::Unavailable(_) | Self::InvalidData(_) => None,
        }
    }
}

impl From<DbError> for StoreError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(value: serde_json::Error) -> Self {
        Self::Serialization(value)
    }
}

/// Query predicate over the list collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListFilter {
    /// Lists whose `ownerId` equals the principal.
    OwnedBy(Principal),
    /// Lists whose `collaborators` contain the principal.
    SharedWith(Principal),
}

impl ListFilter {
    pub fn matches(&self, document: &ListDocument) -> bool {
        match self {
            Self::OwnedBy(principal) => document.is_owned_by(principal),
            Self::SharedWith(principal) => document.is_shared_with(principal),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::OwnedBy(_) => "owned_by",
            Self::SharedWith(_) => "shared_with",
        }
    }
}

/// Persistence and change-stream contract for list documents.
#[async_trait]
pub trait ListStore: Send + Sync {
    /// Persists a new document with empty tasks and collaborators.
    async fn create(&self, draft: NewList) -> StoreResult<ListId>;

    /// Point read; `None` when the document does not exist.
    async fn get(&self, id: &ListId) -> StoreResult<Option<ListDocument>>;

    /// Overwrites the fields present in `patch`.
    async fn update(&self, id: &ListId, patch: ListPatch) -> StoreResult<()>;

    async fn delete(&self, id: &ListId) -> StoreResult<()>;

    /// Returns matching documents ordered by id.
    async fn query(&self, filter: &ListFilter) -> StoreResult<Vec<ListDocument>>;

    /// Starts a change stream for `id`. The current state (present or absent)
    /// is pending as the first snapshot.
    fn subscribe(&self, id: &ListId) -> StoreResult<Subscription>;
}
