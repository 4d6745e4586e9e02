//! Core domain logic for shared to-do lists.
//! This crate is the single source of truth for list, task and access
//! invariants.

pub mod access;
pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod service;
pub mod store;
pub mod sync;

pub use access::capability::{can_edit, Capability};
pub use config::{ConfigError, CoreConfig};
pub use logging::{default_log_level, init_logging, logging_status, LoggingError};
pub use model::list::{ListDocument, ListId, ListPatch, NewList};
pub use model::principal::{IdentityProvider, Principal, StaticIdentity};
pub use model::task::{Task, TaskId};
pub use model::validation::ValidationError;
pub use service::directory::{DirectoryError, ListDirectory, ListSummary};
pub use store::{
    ListFilter, ListStore, MemoryListStore, Snapshot, SqliteListStore, StoreError, StoreResult,
    Subscription,
};
pub use sync::selection::Selection;
pub use sync::synchronizer::{
    ListSynchronizer, Mutation, PendingWrite, SyncError, SyncResult, SyncState,
};

/// Minimal health-check API for host integration.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::{core_version, ping};

    #[test]
    fn ping_returns_pong() {
        assert_eq!(ping(), "pong");
    }

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
