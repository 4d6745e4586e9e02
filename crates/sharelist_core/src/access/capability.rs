//! Edit-capability evaluation for one list document.

use crate::model::list::ListDocument;
use crate::model::principal::Principal;
use std::collections::BTreeSet;

/// Access tier of a principal relative to one list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Capability {
    Owner,
    Collaborator,
    ReadOnly,
}

impl Capability {
    /// Derives the tier for `principal`. Owner wins over collaborator when the
    /// owner also appears in the collaborator set; unknown principals are
    /// read-only.
    pub fn evaluate(
        principal: Option<&Principal>,
        owner_id: &Principal,
        collaborators: &BTreeSet<Principal>,
    ) -> Self {
        match principal {
            Some(principal) if principal == owner_id => Self::Owner,
            Some(principal) if collaborators.contains(principal) => Self::Collaborator,
            _ => Self::ReadOnly,
        }
    }

    pub fn for_document(principal: Option<&Principal>, document: &ListDocument) -> Self {
        Self::evaluate(principal, &document.owner_id, &document.collaborators)
    }

    pub fn can_edit(self) -> bool {
        !matches!(self, Self::ReadOnly)
    }

    /// Stable label used in log lines.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Owner => "owner",
            Self::Collaborator => "collaborator",
            Self::ReadOnly => "read_only",
        }
    }
}

/// True iff `principal` owns the list or is one of its collaborators.
pub fn can_edit(
    principal: &Principal,
    owner_id: &Principal,
    collaborators: &BTreeSet<Principal>,
) -> bool {
    principal == owner_id || collaborators.contains(principal)
}
