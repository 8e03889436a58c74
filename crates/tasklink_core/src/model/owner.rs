//! Owner domain model.
//!
//! # Responsibility
//! - Define the canonical owner record, including the pending-task set.
//! - Validate name and email before persistence.
//!
//! # Invariants
//! - `uuid` is stable and never reused for another owner.
//! - `email` must be globally unique; uniqueness is enforced by the store.
//! - `pending_tasks` has set semantics; insertion order is irrelevant.

use crate::model::task::TaskId;
use crate::model::{now_epoch_ms, ValidationError};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use uuid::Uuid;

/// Stable identifier for an owner record.
pub type OwnerId = Uuid;

static EMAIL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("valid email regex"));

/// Canonical owner record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Owner {
    /// Stable global ID referenced by `Task.assigned_owner`.
    pub uuid: OwnerId,
    /// Display name mirrored into assigned tasks' name cache.
    pub name: String,
    /// Contact address. Globally unique across owners.
    pub email: String,
    /// Ids of tasks assigned to this owner and not yet completed.
    pub pending_tasks: BTreeSet<TaskId>,
    /// Creation time in epoch milliseconds, assigned at construction.
    pub created_at: i64,
}

impl Owner {
    /// Creates an owner with a generated stable ID and no pending tasks.
    pub fn new(name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            uuid: Uuid::new_v4(),
            name: name.into(),
            email: email.into(),
            pending_tasks: BTreeSet::new(),
            created_at: now_epoch_ms(),
        }
    }

    /// Checks field-level invariants.
    ///
    /// # Errors
    /// - `EmptyOwnerName` when `name` is blank after trimming.
    /// - `EmptyEmail` when `email` is blank after trimming.
    /// - `InvalidEmail` when `email` does not match the address shape.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.name.trim().is_empty() {
            return Err(ValidationError::EmptyOwnerName);
        }
        let email = self.email.trim();
        if email.is_empty() {
            return Err(ValidationError::EmptyEmail);
        }
        if !EMAIL_RE.is_match(email) {
            return Err(ValidationError::InvalidEmail(email.to_string()));
        }
        Ok(())
    }
}
