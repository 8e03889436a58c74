//! Task use-case service.
//!
//! # Responsibility
//! - Provide create/replace/delete entry points that keep the owner-side
//!   pending sets consistent with task assignment.
//! - Pass reads through to the repository unmodified.
//!
//! # Invariants
//! - A referenced owner must exist at the moment the reference is written.
//! - Pending-set membership is reconciled to the target state computed by
//!   `policy::pending_transition`; the old==new case never removes first.
//! - On delete, the pending link is removed before the task row, so a
//!   failure in between leaves a stale-but-recoverable link, never a
//!   dangling one.

use crate::model::owner::{Owner, OwnerId};
use crate::model::task::{Task, TaskId};
use crate::model::ValidationError;
use crate::policy::{is_pending, pending_transition, resolve_owner_name};
use crate::repo::owner_repo::OwnerRepository;
use crate::repo::task_repo::{TaskFilter, TaskListQuery, TaskRepository};
use crate::repo::RepoError;
use log::info;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::Instant;

/// Full desired state for a task create or replace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskRequest {
    pub name: String,
    pub description: String,
    /// Due date in epoch milliseconds.
    pub deadline: i64,
    pub completed: bool,
    /// Desired owner reference; `None` leaves the task unassigned.
    pub assigned_owner: Option<OwnerId>,
}

impl TaskRequest {
    /// Minimal request: named, open, unassigned.
    pub fn new(name: impl Into<String>, deadline: i64) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            deadline,
            completed: false,
            assigned_owner: None,
        }
    }
}

/// Errors from task use-case operations.
#[derive(Debug)]
pub enum TaskServiceError {
    /// Target task does not exist.
    TaskNotFound(TaskId),
    /// Referenced owner does not exist.
    AssigneeNotFound(OwnerId),
    /// Request fields fail validation.
    Invalid(ValidationError),
    /// Persistence-layer failure.
    Repo(RepoError),
}

impl Display for TaskServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::TaskNotFound(id) => write!(f, "task not found: {id}"),
            Self::AssigneeNotFound(id) => write!(f, "assigned owner does not exist: {id}"),
            Self::Invalid(err) => write!(f, "{err}"),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for TaskServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Invalid(err) => Some(err),
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RepoError> for TaskServiceError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::NotFound(id) => Self::TaskNotFound(id),
            RepoError::Validation(err) => Self::Invalid(err),
            other => Self::Repo(other),
        }
    }
}

/// Use-case service for task mutations and reads.
pub struct TaskService<T: TaskRepository, O: OwnerRepository> {
    tasks: T,
    owners: O,
}

impl<T: TaskRepository, O: OwnerRepository> TaskService<T, O> {
    /// Creates a service over the provided repository implementations.
    pub fn new(tasks: T, owners: O) -> Self {
        Self { tasks, owners }
    }

    /// Creates a task and, when it is pending, records it in the owner's
    /// pending set.
    ///
    /// # Contract
    /// - Fails with `AssigneeNotFound` before any mutation when the
    ///   referenced owner is missing.
    /// - A completed or unassigned task touches no pending set.
    pub fn create_task(&self, request: &TaskRequest) -> Result<Task, TaskServiceError> {
        let started_at = Instant::now();

        let mut task = Task::new(request.name.trim(), request.deadline);
        task.description = request.description.trim().to_string();
        task.completed = request.completed;
        task.validate().map_err(TaskServiceError::Invalid)?;

        let owner = self.resolve_assignee(request.assigned_owner)?;
        task.assigned_owner = request.assigned_owner;
        task.assigned_owner_name = resolve_owner_name(owner.as_ref());

        self.tasks.create_task(&task)?;
        if is_pending(&task) {
            if let Some(owner_id) = task.assigned_owner {
                self.owners.add_pending_task(owner_id, task.uuid)?;
            }
        }

        info!(
            "event=task_create module=service status=ok task={} pending={} duration_ms={}",
            task.uuid,
            is_pending(&task),
            started_at.elapsed().as_millis()
        );
        Ok(task)
    }

    /// Replaces the full state of an existing task and reconciles both
    /// owners' pending sets to the new assignment.
    ///
    /// Order of effects: pending id leaves the old owner, joins the new
    /// owner, then the task row is written.
    pub fn replace_task(
        &self,
        id: TaskId,
        request: &TaskRequest,
    ) -> Result<Task, TaskServiceError> {
        let started_at = Instant::now();

        let old = self
            .tasks
            .get_task(id)?
            .ok_or(TaskServiceError::TaskNotFound(id))?;

        let mut next = Task {
            uuid: id,
            name: request.name.trim().to_string(),
            description: request.description.trim().to_string(),
            deadline: request.deadline,
            completed: request.completed,
            assigned_owner: request.assigned_owner,
            assigned_owner_name: String::new(),
            created_at: old.created_at,
        };
        next.validate().map_err(TaskServiceError::Invalid)?;

        let owner = self.resolve_assignee(request.assigned_owner)?;
        next.assigned_owner_name = resolve_owner_name(owner.as_ref());

        let change = pending_transition(old.assigned_owner, next.assigned_owner, next.completed);
        if let Some(owner_id) = change.remove_from {
            self.owners.remove_pending_task(owner_id, id)?;
        }
        if let Some(owner_id) = change.add_to {
            self.owners.add_pending_task(owner_id, id)?;
        }
        self.tasks.replace_task(&next)?;

        info!(
            "event=task_replace module=service status=ok task={id} pending={} duration_ms={}",
            is_pending(&next),
            started_at.elapsed().as_millis()
        );
        Ok(next)
    }

    /// Deletes a task, removing its pending link first.
    pub fn delete_task(&self, id: TaskId) -> Result<(), TaskServiceError> {
        let started_at = Instant::now();

        let task = self
            .tasks
            .get_task(id)?
            .ok_or(TaskServiceError::TaskNotFound(id))?;

        if let Some(owner_id) = task.assigned_owner {
            self.owners.remove_pending_task(owner_id, id)?;
        }
        self.tasks.delete_task(id)?;

        info!(
            "event=task_delete module=service status=ok task={id} duration_ms={}",
            started_at.elapsed().as_millis()
        );
        Ok(())
    }

    /// Gets one task by id.
    pub fn get_task(&self, id: TaskId) -> Result<Option<Task>, TaskServiceError> {
        Ok(self.tasks.get_task(id)?)
    }

    /// Lists tasks using filter, sort and pagination options.
    pub fn list_tasks(&self, query: &TaskListQuery) -> Result<Vec<Task>, TaskServiceError> {
        Ok(self.tasks.list_tasks(query)?)
    }

    /// Counts tasks matching the filter.
    pub fn count_tasks(&self, filter: &TaskFilter) -> Result<u64, TaskServiceError> {
        Ok(self.tasks.count_tasks(filter)?)
    }

    fn resolve_assignee(
        &self,
        assigned_owner: Option<OwnerId>,
    ) -> Result<Option<Owner>, TaskServiceError> {
        match assigned_owner {
            None => Ok(None),
            Some(owner_id) => match self.owners.get_owner(owner_id) {
                Ok(Some(owner)) => Ok(Some(owner)),
                Ok(None) => Err(TaskServiceError::AssigneeNotFound(owner_id)),
                Err(RepoError::NotFound(_)) => Err(TaskServiceError::AssigneeNotFound(owner_id)),
                Err(err) => Err(TaskServiceError::Repo(err)),
            },
        }
    }
}
