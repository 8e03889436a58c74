//! Core domain logic for tasklink.
//! This crate is the single source of truth for the task/owner
//! cross-reference invariants.

pub mod db;
pub mod logging;
pub mod model;
pub mod policy;
pub mod repo;
pub mod service;

pub use logging::{default_log_level, init_logging, logging_status};
pub use model::owner::{Owner, OwnerId};
pub use model::task::{Task, TaskId};
pub use model::ValidationError;
pub use policy::{
    is_pending, pending_transition, resolve_owner_name, PendingChange, UNASSIGNED_NAME,
};
pub use repo::owner_repo::{OwnerListQuery, OwnerRepository, SqliteOwnerRepository};
pub use repo::task_repo::{
    AssignmentFilter, SqliteTaskRepository, TaskFilter, TaskListQuery, TaskRepository, TaskSort,
    TASKS_DEFAULT_LIMIT,
};
pub use repo::{RepoError, RepoResult};
pub use service::owner_service::{
    OwnerCreateRequest, OwnerReplaceRequest, OwnerService, OwnerServiceError,
};
pub use service::task_service::{TaskRequest, TaskService, TaskServiceError};

/// Minimal health-check API for early integration.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
