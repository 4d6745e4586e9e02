//! Access control for shared lists.
//!
//! Three tiers only: owner, collaborator, everyone else (read-only).
//! Per-task permissions are out of scope.

pub mod capability;
pub mod collaborators;
