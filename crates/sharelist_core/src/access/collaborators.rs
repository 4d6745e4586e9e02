//! Collaborator set transforms.
//!
//! # Invariants
//! - The set never holds duplicates.
//! - Only structurally valid emails (`local@domain`, no whitespace) enter
//!   the set through `invite`.
//! - The owner identity is not special-cased; owner capability does not
//!   depend on set membership.

use crate::model::principal::Principal;
use crate::model::validation::ValidationError;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeSet;

static EMAIL_SHAPE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^@\s]+@[^@\s]+$").expect("valid email shape regex"));

/// Validates an invitee identity and returns it as a principal.
///
/// # Errors
/// - `ValidationError::InvalidEmail` when the trimmed input is empty or not
///   shaped like `local@domain`.
pub fn parse_invitee(email: &str) -> Result<Principal, ValidationError> {
    let trimmed = email.trim();
    if trimmed.is_empty() || !EMAIL_SHAPE_RE.is_match(trimmed) {
        return Err(ValidationError::InvalidEmail(email.to_string()));
    }
    Ok(Principal::new(trimmed))
}

/// Returns `collaborators ∪ {email}`.
pub fn invite(
    collaborators: &BTreeSet<Principal>,
    email: &str,
) -> Result<BTreeSet<Principal>, ValidationError> {
    let invitee = parse_invitee(email)?;
    let mut updated = collaborators.clone();
    updated.insert(invitee);
    Ok(updated)
}

/// Returns `collaborators` without `email`. Absent values are a no-op.
pub fn remove(collaborators: &BTreeSet<Principal>, email: &str) -> BTreeSet<Principal> {
    let target = Principal::new(email);
    collaborators
        .iter()
        .filter(|member| **member != target)
        .cloned()
        .collect()
}
