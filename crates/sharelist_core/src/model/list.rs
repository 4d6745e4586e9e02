//! List document model.
//!
//! # Responsibility
//! - Define the unit of sharing and synchronization (`ListDocument`).
//! - Define creation drafts and partial-field updates used by stores.
//!
//! # Invariants
//! - `id` and `owner_id` never change after creation.
//! - `title` is trimmed and non-empty at creation and fixed afterwards.
//! - Updates overwrite whole fields (`tasks` and/or `collaborators`), never
//!   individual elements.

use crate::model::principal::Principal;
use crate::model::task::Task;
use crate::model::validation::ValidationError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Opaque store-assigned list identifier.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ListId(String);

impl ListId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Fresh random id, used by the shipped stores on `create`.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().simple().to_string())
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl Display for ListId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Shared to-do list as persisted by the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListDocument {
    pub id: ListId,
    pub title: String,
    pub owner_id: Principal,
    #[serde(default)]
    pub collaborators: BTreeSet<Principal>,
    #[serde(default)]
    pub tasks: Vec<Task>,
}

impl ListDocument {
    /// Materializes a freshly created document from its draft.
    pub fn from_new(id: ListId, draft: NewList) -> Self {
        Self {
            id,
            title: draft.title,
            owner_id: draft.owner_id,
            collaborators: BTreeSet::new(),
            tasks: Vec::new(),
        }
    }

    pub fn is_owned_by(&self, principal: &Principal) -> bool {
        &self.owner_id == principal
    }

    pub fn is_shared_with(&self, principal: &Principal) -> bool {
        self.collaborators.contains(principal)
    }
}

/// Validated creation request: empty task and collaborator sets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewList {
    title: String,
    owner_id: Principal,
}

impl NewList {
    /// # Errors
    /// - `ValidationError::EmptyTitle` when `title` is blank after trimming.
    pub fn new(title: &str, owner_id: Principal) -> Result<Self, ValidationError> {
        let trimmed = title.trim();
        if trimmed.is_empty() {
            return Err(ValidationError::EmptyTitle);
        }
        Ok(Self {
            title: trimmed.to_string(),
            owner_id,
        })
    }

    pub fn title(&self) -> &str {
        self.title.as_str()
    }

    pub fn owner_id(&self) -> &Principal {
        &self.owner_id
    }
}

/// Whole-field overwrite for an existing document.
///
/// `None` leaves the stored field as it is.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListPatch {
    pub tasks: Option<Vec<Task>>,
    pub collaborators: Option<BTreeSet<Principal>>,
}

impl ListPatch {
    pub fn tasks(tasks: Vec<Task>) -> Self {
        Self {
            tasks: Some(tasks),
            collaborators: None,
        }
    }

    pub fn collaborators(collaborators: BTreeSet<Principal>) -> Self {
        Self {
            tasks: None,
            collaborators: Some(collaborators),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_none() && self.collaborators.is_none()
    }

    /// Names of the fields this patch overwrites, for log lines.
    pub fn field_names(&self) -> &'static str {
        match (self.tasks.is_some(), self.collaborators.is_some()) {
            (true, true) => "tasks,collaborators",
            (true, false) => "tasks",
            (false, true) => "collaborators",
            (false, false) => "none",
        }
    }

    pub fn apply_to(self, document: &mut ListDocument) {
        if let Some(tasks) = self.tasks {
            document.tasks = tasks;
        }
        if let Some(collaborators) = self.collaborators {
            document.collaborators = collaborators;
        }
    }
}
