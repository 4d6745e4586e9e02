//! Principal identity and the external identity contract.
//!
//! # Responsibility
//! - Represent an authenticated user as an email-equivalent string.
//! - Define how the core asks the outside world who the current user is.
//!
//! # Invariants
//! - Principals compare by exact string equality after outer trimming.
//! - Full principal values never appear in log lines; use `redacted()`.

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// Identity string of a logged-in user.
///
/// Deserialization goes through `Principal::new`, so stored values are
/// trimmed the same way as caller input.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "String")]
pub struct Principal(String);

impl Principal {
    pub fn new(value: impl Into<String>) -> Self {
        let value = value.into();
        let trimmed = value.trim();
        if trimmed.len() == value.len() {
            Self(value)
        } else {
            Self(trimmed.to_string())
        }
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    /// Log-safe form: keeps the first character of the local part and the
    /// domain, e.g. `o***@x.com`.
    pub fn redacted(&self) -> String {
        match self.0.split_once('@') {
            Some((local, domain)) => {
                let head = local.chars().next().map(String::from).unwrap_or_default();
                format!("{head}***@{domain}")
            }
            None => "***".to_string(),
        }
    }
}

impl Display for Principal {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Principal {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for Principal {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

/// Source of the current session's principal.
///
/// Authentication itself lives outside the core; implementations only report
/// the outcome.
pub trait IdentityProvider {
    /// Returns `None` while the session is unauthenticated.
    fn current_principal(&self) -> Option<Principal>;
}

/// Fixed identity for hosts that resolve sign-in before building the core.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StaticIdentity {
    principal: Option<Principal>,
}

impl StaticIdentity {
    pub fn signed_in(principal: impl Into<Principal>) -> Self {
        Self {
            principal: Some(principal.into()),
        }
    }

    pub fn anonymous() -> Self {
        Self::default()
    }
}

impl IdentityProvider for StaticIdentity {
    fn current_principal(&self) -> Option<Principal> {
        self.principal.clone()
    }
}
