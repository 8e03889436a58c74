//! Consistency policy for task/owner cross references.
//!
//! # Responsibility
//! - Decide what "pending" and "unassigned" mean, in one place.
//! - Compute the pending-set membership change implied by a task
//!   transition, for the services that apply it.
//!
//! # Invariants
//! - Functions here are pure; all store effects live in the service layer.
//! - A task is pending for exactly one owner, or none.

use crate::model::owner::{Owner, OwnerId};
use crate::model::task::Task;

/// Display-name cache value for tasks without an owner.
pub const UNASSIGNED_NAME: &str = "unassigned";

/// Whether the task must appear in its owner's pending set.
pub fn is_pending(task: &Task) -> bool {
    task.assigned_owner.is_some() && !task.completed
}

/// Resolves the display-name cache value for a task's owner reference.
pub fn resolve_owner_name(owner: Option<&Owner>) -> String {
    match owner {
        Some(owner) => owner.name.clone(),
        None => UNASSIGNED_NAME.to_string(),
    }
}

/// Pending-set updates required by one task transition.
///
/// `remove_from` and `add_to` never name the same owner: when the task
/// stays pending for the same owner, the result is a single idempotent
/// add, so no removal is ever observable in between.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingChange {
    /// Owner whose pending set must drop the task id, if any.
    pub remove_from: Option<OwnerId>,
    /// Owner whose pending set must contain the task id, if any.
    pub add_to: Option<OwnerId>,
}

/// Computes the membership change for a task moving between states.
///
/// `old_owner` is the assignment before the transition (`None` for a
/// freshly created task); `new_owner` and `new_completed` describe the
/// desired state. Membership is reconciled to the target rather than
/// pulled and re-added, so an unchanged pending assignment yields no
/// removal step.
pub fn pending_transition(
    old_owner: Option<OwnerId>,
    new_owner: Option<OwnerId>,
    new_completed: bool,
) -> PendingChange {
    let add_to = if new_completed { None } else { new_owner };
    let remove_from = old_owner.filter(|old| add_to != Some(*old));
    PendingChange { remove_from, add_to }
}
