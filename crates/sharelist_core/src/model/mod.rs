//! Shared list domain model.
//!
//! # Responsibility
//! - Define the list document, task record and principal types.
//! - Provide the pure task mutators used by the synchronizer.
//!
//! # Invariants
//! - A `ListDocument` is the only unit of persistence; tasks never exist on
//!   their own in storage.
//! - Field names of the persisted schema (`title`, `ownerId`,
//!   `collaborators`, `tasks`, task `id`/`text`/`done`) are stable.

pub mod list;
pub mod principal;
pub mod task;
pub mod validation;
