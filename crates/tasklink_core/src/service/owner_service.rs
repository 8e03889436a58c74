//! Owner use-case service.
//!
//! # Responsibility
//! - Provide create/replace/delete entry points that keep task assignment
//!   consistent with the owner-side pending sets.
//! - Pass reads through to the repository unmodified.
//!
//! # Invariants
//! - Email uniqueness is checked before any bulk mutation on replace.
//! - Full replacement reconciles task assignment to the caller-supplied
//!   pending set: tasks leaving the set are unassigned first, then every
//!   task in the set is pointed at the owner with the fresh display name,
//!   and the owner record is persisted last.
//! - On delete, assigned tasks are released before the owner row goes, so
//!   no task is ever left referencing a deleted owner.

use crate::model::owner::{Owner, OwnerId};
use crate::model::task::TaskId;
use crate::model::ValidationError;
use crate::repo::owner_repo::{OwnerListQuery, OwnerRepository};
use crate::repo::task_repo::TaskRepository;
use crate::repo::RepoError;
use log::info;
use std::collections::BTreeSet;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::Instant;

/// Desired fields for owner creation. The pending set always starts empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OwnerCreateRequest {
    pub name: String,
    pub email: String,
}

/// Full desired state for an owner replacement, pending set included.
///
/// The pending set is taken as supplied (after deduplication); ids that
/// match no task are recorded anyway and update zero task rows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OwnerReplaceRequest {
    pub name: String,
    pub email: String,
    pub pending_tasks: Vec<TaskId>,
}

/// Errors from owner use-case operations.
#[derive(Debug)]
pub enum OwnerServiceError {
    /// Target owner does not exist.
    OwnerNotFound(OwnerId),
    /// Another owner already uses this email address.
    EmailTaken(String),
    /// Request fields fail validation.
    Invalid(ValidationError),
    /// Persistence-layer failure.
    Repo(RepoError),
}

impl Display for OwnerServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::OwnerNotFound(id) => write!(f, "owner not found: {id}"),
            Self::EmailTaken(email) => write!(f, "email already in use: `{email}`"),
            Self::Invalid(err) => write!(f, "{err}"),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for OwnerServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Invalid(err) => Some(err),
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RepoError> for OwnerServiceError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::NotFound(id) => Self::OwnerNotFound(id),
            RepoError::EmailTaken(email) => Self::EmailTaken(email),
            RepoError::Validation(err) => Self::Invalid(err),
            other => Self::Repo(other),
        }
    }
}

/// Use-case service for owner mutations and reads.
pub struct OwnerService<T: TaskRepository, O: OwnerRepository> {
    tasks: T,
    owners: O,
}

impl<T: TaskRepository, O: OwnerRepository> OwnerService<T, O> {
    /// Creates a service over the provided repository implementations.
    pub fn new(tasks: T, owners: O) -> Self {
        Self { tasks, owners }
    }

    /// Creates an owner with an empty pending set.
    pub fn create_owner(&self, request: &OwnerCreateRequest) -> Result<Owner, OwnerServiceError> {
        let started_at = Instant::now();

        let owner = Owner::new(request.name.trim(), request.email.trim());
        owner.validate().map_err(OwnerServiceError::Invalid)?;

        self.owners.create_owner(&owner)?;

        info!(
            "event=owner_create module=service status=ok owner={} duration_ms={}",
            owner.uuid,
            started_at.elapsed().as_millis()
        );
        Ok(owner)
    }

    /// Replaces the full state of an existing owner and reconciles task
    /// assignment to the supplied pending set.
    ///
    /// Effects, in order: tasks currently assigned but absent from the set
    /// are unassigned; every task in the set is assigned to this owner and
    /// picks up the (possibly renamed) display name; the owner row and its
    /// pending links are persisted last.
    pub fn replace_owner(
        &self,
        id: OwnerId,
        request: &OwnerReplaceRequest,
    ) -> Result<Owner, OwnerServiceError> {
        let started_at = Instant::now();

        let current = self
            .owners
            .get_owner(id)?
            .ok_or(OwnerServiceError::OwnerNotFound(id))?;

        let desired: BTreeSet<TaskId> = request.pending_tasks.iter().copied().collect();
        let next = Owner {
            uuid: id,
            name: request.name.trim().to_string(),
            email: request.email.trim().to_string(),
            pending_tasks: desired.clone(),
            created_at: current.created_at,
        };
        next.validate().map_err(OwnerServiceError::Invalid)?;

        if next.email != current.email && self.owners.email_in_use(&next.email, Some(id))? {
            return Err(OwnerServiceError::EmailTaken(next.email));
        }

        let currently_assigned = self.tasks.ids_assigned_to(id)?;
        let to_unassign: Vec<TaskId> = currently_assigned
            .iter()
            .filter(|task| !desired.contains(task))
            .copied()
            .collect();
        let released = self.tasks.unassign_many(&to_unassign)?;

        // The whole desired set is written, not just the newcomers, so
        // tasks that stay assigned pick up a renamed owner immediately.
        let to_assign: Vec<TaskId> = desired.iter().copied().collect();
        let claimed = self.tasks.assign_many(&to_assign, id, &next.name)?;

        self.owners.replace_owner_row(&next)?;
        self.owners.set_pending_tasks(id, &desired)?;

        info!(
            "event=owner_replace module=service status=ok owner={id} released={released} claimed={claimed} duration_ms={}",
            started_at.elapsed().as_millis()
        );
        Ok(next)
    }

    /// Deletes an owner, releasing every task assigned to them first.
    pub fn delete_owner(&self, id: OwnerId) -> Result<(), OwnerServiceError> {
        let started_at = Instant::now();

        self.owners
            .get_owner(id)?
            .ok_or(OwnerServiceError::OwnerNotFound(id))?;

        let released = self.tasks.unassign_all_of(id)?;
        self.owners.delete_owner(id)?;

        info!(
            "event=owner_delete module=service status=ok owner={id} released={released} duration_ms={}",
            started_at.elapsed().as_millis()
        );
        Ok(())
    }

    /// Gets one owner by id, pending set included.
    pub fn get_owner(&self, id: OwnerId) -> Result<Option<Owner>, OwnerServiceError> {
        Ok(self.owners.get_owner(id)?)
    }

    /// Lists owners using filter and pagination options.
    pub fn list_owners(&self, query: &OwnerListQuery) -> Result<Vec<Owner>, OwnerServiceError> {
        Ok(self.owners.list_owners(query)?)
    }

    /// Counts owners, optionally restricted to an exact email.
    pub fn count_owners(&self, email: Option<&str>) -> Result<u64, OwnerServiceError> {
        Ok(self.owners.count_owners(email)?)
    }
}
