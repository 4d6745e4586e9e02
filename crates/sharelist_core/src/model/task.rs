//! Task record and pure list mutators.
//!
//! # Responsibility
//! - Define the task shape persisted inside a list document.
//! - Provide add/toggle/remove/bulk-complete transforms over task sequences.
//!
//! # Invariants
//! - Every transform is pure: it takes the current sequence and returns a new
//!   one, leaving persistence to the caller.
//! - No transform reorders tasks it does not remove.
//! - Task ids are unique within one sequence and never reused by `add_task`.

use crate::model::validation::ValidationError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt::{Display, Formatter};
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

static LAST_ISSUED_TASK_ID: AtomicI64 = AtomicI64::new(0);

/// Client-generated task identifier, based on epoch milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(i64);

impl TaskId {
    pub fn new(value: i64) -> Self {
        Self(value)
    }

    pub fn value(self) -> i64 {
        self.0
    }

    /// Issues a fresh id for appending to `existing`.
    ///
    /// The result is never an id already present in `existing`. Normally it is
    /// at least the current clock reading, strictly greater than every id
    /// issued earlier in this process, and strictly greater than every id in
    /// `existing`. When `existing` already holds `i64::MAX`, the lowest free
    /// positive id is used instead.
    pub fn generate(existing: &[Task]) -> Self {
        let floor = match existing.iter().map(|task| task.id.0).max() {
            None => 0,
            Some(max) => match max.checked_add(1) {
                Some(floor) => floor,
                None => return Self::lowest_unused(existing),
            },
        };
        let now = now_epoch_ms();

        let mut previous = LAST_ISSUED_TASK_ID.load(Ordering::Relaxed);
        loop {
            let candidate = now.max(floor).max(previous.saturating_add(1));
            if candidate == i64::MAX {
                // Not recorded: the process counter stays below the maximum.
                return Self(candidate);
            }
            match LAST_ISSUED_TASK_ID.compare_exchange_weak(
                previous,
                candidate,
                Ordering::AcqRel,
                Ordering::Relaxed,
            ) {
                Ok(_) => return Self(candidate),
                Err(actual) => previous = actual,
            }
        }
    }

    fn lowest_unused(existing: &[Task]) -> Self {
        let used: BTreeSet<i64> = existing.iter().map(|task| task.id.0).collect();
        let mut candidate: i64 = 1;
        for id in used.range(1..) {
            if *id != candidate {
                break;
            }
            candidate = candidate.saturating_add(1);
        }
        Self(candidate)
    }
}

impl Display for TaskId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One actionable item inside a list document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub text: String,
    #[serde(default)]
    pub done: bool,
}

impl Task {
    /// Builds a pending task from already-trimmed text.
    ///
    /// # Errors
    /// - `ValidationError::EmptyTaskText` when `text` is blank after trimming.
    pub fn new(id: TaskId, text: &str) -> Result<Self, ValidationError> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Err(ValidationError::EmptyTaskText);
        }
        Ok(Self {
            id,
            text: trimmed.to_string(),
            done: false,
        })
    }
}

/// Appends a new pending task with trimmed `text` and a fresh id.
///
/// Does not deduplicate by text.
pub fn add_task(tasks: &[Task], text: &str) -> Result<Vec<Task>, ValidationError> {
    let task = Task::new(TaskId::generate(tasks), text)?;
    let mut updated = Vec::with_capacity(tasks.len() + 1);
    updated.extend_from_slice(tasks);
    updated.push(task);
    Ok(updated)
}

/// Flips `done` on the task with `id`. Unknown ids leave the input unchanged.
pub fn toggle_task(tasks: &[Task], id: TaskId) -> Vec<Task> {
    tasks
        .iter()
        .map(|task| {
            if task.id == id {
                Task {
                    done: !task.done,
                    ..task.clone()
                }
            } else {
                task.clone()
            }
        })
        .collect()
}

/// Drops every task whose id is in `ids`.
pub fn remove_tasks(tasks: &[Task], ids: &BTreeSet<TaskId>) -> Vec<Task> {
    tasks
        .iter()
        .filter(|task| !ids.contains(&task.id))
        .cloned()
        .collect()
}

/// Sets `done = true` on every task whose id is in `ids`.
pub fn mark_done(tasks: &[Task], ids: &BTreeSet<TaskId>) -> Vec<Task> {
    tasks
        .iter()
        .map(|task| {
            if ids.contains(&task.id) {
                Task {
                    done: true,
                    ..task.clone()
                }
            } else {
                task.clone()
            }
        })
        .collect()
}

/// Tasks still open, in list order.
pub fn pending(tasks: &[Task]) -> impl Iterator<Item = &Task> {
    tasks.iter().filter(|task| !task.done)
}

/// Completed tasks, in list order.
pub fn completed(tasks: &[Task]) -> impl Iterator<Item = &Task> {
    tasks.iter().filter(|task| task.done)
}

fn now_epoch_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| i64::try_from(elapsed.as_millis()).unwrap_or(i64::MAX))
        .unwrap_or(0)
}
