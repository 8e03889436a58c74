//! Task domain model.
//!
//! # Responsibility
//! - Define the canonical task record shared by store and services.
//! - Validate field-level invariants before persistence.
//!
//! # Invariants
//! - `uuid` is stable and never reused for another task.
//! - `assigned_owner = None` always pairs with the `"unassigned"` name cache.

use crate::model::owner::OwnerId;
use crate::model::{now_epoch_ms, ValidationError};
use crate::policy::UNASSIGNED_NAME;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Stable identifier for a task record.
pub type TaskId = Uuid;

/// Canonical task record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    /// Stable global ID used for linking and pending-set membership.
    pub uuid: TaskId,
    /// Display name. Must not be blank.
    pub name: String,
    /// Free-form details. May be empty.
    pub description: String,
    /// Due date in epoch milliseconds.
    pub deadline: i64,
    /// Completion flag. Completed tasks are never pending for any owner.
    pub completed: bool,
    /// Referenced owner, or `None` when unassigned.
    pub assigned_owner: Option<OwnerId>,
    /// Denormalized cache of the referenced owner's display name.
    pub assigned_owner_name: String,
    /// Creation time in epoch milliseconds, assigned at construction.
    pub created_at: i64,
}

impl Task {
    /// Creates an unassigned, not-completed task with a generated stable ID.
    pub fn new(name: impl Into<String>, deadline: i64) -> Self {
        Self {
            uuid: Uuid::new_v4(),
            name: name.into(),
            description: String::new(),
            deadline,
            completed: false,
            assigned_owner: None,
            assigned_owner_name: UNASSIGNED_NAME.to_string(),
            created_at: now_epoch_ms(),
        }
    }

    /// Checks field-level invariants.
    ///
    /// # Errors
    /// - `EmptyTaskName` when `name` is blank after trimming.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.name.trim().is_empty() {
            return Err(ValidationError::EmptyTaskName);
        }
        Ok(())
    }
}
