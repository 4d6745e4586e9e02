//! Input validation errors shared by pure domain transforms.

use std::error::Error;
use std::fmt::{Display, Formatter};

/// Rejected input to a pure transform. Always recoverable; no state changes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Task text is blank after trimming.
    EmptyTaskText,
    /// List title is blank after trimming.
    EmptyTitle,
    /// Collaborator identity is empty or not shaped like `local@domain`.
    InvalidEmail(String),
}

impl Display for ValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyTaskText => write!(f, "task text must not be blank"),
            Self::EmptyTitle => write!(f, "list title must not be blank"),
            Self::InvalidEmail(value) => write!(f, "invalid collaborator email: `{value}`"),
        }
    }
}

impl Error for ValidationError {}
