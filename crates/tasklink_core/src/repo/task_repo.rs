//! Task repository contract and SQLite implementation.
//!
//! # Responsibility
//! - Provide per-record CRUD plus bulk assignment updates over `tasks`.
//! - Keep SQL details inside the core persistence boundary.
//!
//! # Invariants
//! - Write paths call `Task::validate()` before SQL mutations.
//! - Bulk updates are atomic per matched row, not across rows.
//! - Read paths reject invalid persisted state instead of masking it.

use crate::model::owner::OwnerId;
use crate::model::task::{Task, TaskId};
use crate::policy::UNASSIGNED_NAME;
use crate::repo::{bool_to_int, int_to_bool, parse_uuid, RepoError, RepoResult};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, Row};

const TASK_SELECT_SQL: &str = "SELECT
    uuid,
    name,
    description,
    deadline,
    completed,
    assigned_owner,
    assigned_owner_name,
    created_at
FROM tasks";

/// Default page size for task listings.
pub const TASKS_DEFAULT_LIMIT: u32 = 100;

/// Assignment predicate for task queries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AssignmentFilter {
    /// No assignment constraint.
    #[default]
    Any,
    /// Only tasks without an owner.
    Unassigned,
    /// Only tasks assigned to the given owner.
    To(OwnerId),
}

/// Filter options shared by task listing and counting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TaskFilter {
    pub completed: Option<bool>,
    pub assignment: AssignmentFilter,
    /// Upper bound on `deadline`, inclusive, in epoch milliseconds.
    pub due_before: Option<i64>,
}

/// Sort orders for task listings. Uuid breaks ties deterministically.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TaskSort {
    #[default]
    CreatedDesc,
    CreatedAsc,
    DeadlineAsc,
    DeadlineDesc,
    NameAsc,
    NameDesc,
}

/// Query options for listing tasks.
#[derive(Debug, Clone, Default)]
pub struct TaskListQuery {
    pub filter: TaskFilter,
    pub sort: TaskSort,
    /// Maximum rows to return. Defaults to `TASKS_DEFAULT_LIMIT`.
    pub limit: Option<u32>,
    pub offset: u32,
}

/// Repository interface for task persistence.
pub trait TaskRepository {
    /// Persists one task row.
    fn create_task(&self, task: &Task) -> RepoResult<TaskId>;
    /// Replaces all mutable fields of an existing task row.
    fn replace_task(&self, task: &Task) -> RepoResult<()>;
    /// Gets one task by id.
    fn get_task(&self, id: TaskId) -> RepoResult<Option<Task>>;
    /// Lists tasks using filter, sort and pagination options.
    fn list_tasks(&self, query: &TaskListQuery) -> RepoResult<Vec<Task>>;
    /// Counts tasks matching the filter.
    fn count_tasks(&self, filter: &TaskFilter) -> RepoResult<u64>;
    /// Hard-deletes one task row.
    fn delete_task(&self, id: TaskId) -> RepoResult<()>;
    /// Ids of all tasks currently assigned to the owner, queried fresh.
    fn ids_assigned_to(&self, owner: OwnerId) -> RepoResult<Vec<TaskId>>;
    /// Points every listed task at the owner and refreshes the name cache.
    /// Ids matching no row are silently skipped. Returns rows changed.
    fn assign_many(&self, ids: &[TaskId], owner: OwnerId, owner_name: &str) -> RepoResult<usize>;
    /// Clears assignment and name cache for every listed task.
    /// Returns rows changed.
    fn unassign_many(&self, ids: &[TaskId]) -> RepoResult<usize>;
    /// Clears assignment for every task currently pointing at the owner.
    /// Returns rows changed.
    fn unassign_all_of(&self, owner: OwnerId) -> RepoResult<usize>;
}

/// SQLite-backed task repository.
pub struct SqliteTaskRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteTaskRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }
}

impl TaskRepository for SqliteTaskRepository<'_> {
    fn create_task(&self, task: &Task) -> RepoResult<TaskId> {
        task.validate()?;

        self.conn.execute(
            "INSERT INTO tasks (
                uuid,
                name,
                description,
                deadline,
                completed,
                assigned_owner,
                assigned_owner_name,
                created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8);",
            params![
                task.uuid.to_string(),
                task.name.as_str(),
                task.description.as_str(),
                task.deadline,
                bool_to_int(task.completed),
                task.assigned_owner.map(|id| id.to_string()),
                task.assigned_owner_name.as_str(),
                task.created_at,
            ],
        )?;

        Ok(task.uuid)
    }

    fn replace_task(&self, task: &Task) -> RepoResult<()> {
        task.validate()?;

        let changed = self.conn.execute(
            "UPDATE tasks
             SET
                name = ?1,
                description = ?2,
                deadline = ?3,
                completed = ?4,
                assigned_owner = ?5,
                assigned_owner_name = ?6
             WHERE uuid = ?7;",
            params![
                task.name.as_str(),
                task.description.as_str(),
                task.deadline,
                bool_to_int(task.completed),
                task.assigned_owner.map(|id| id.to_string()),
                task.assigned_owner_name.as_str(),
                task.uuid.to_string(),
            ],
        )?;

        if changed == 0 {
            return Err(RepoError::NotFound(task.uuid));
        }

        Ok(())
    }

    fn get_task(&self, id: TaskId) -> RepoResult<Option<Task>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{TASK_SELECT_SQL} WHERE uuid = ?1;"))?;

        let mut rows = stmt.query([id.to_string()])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_task_row(row)?));
        }

        Ok(None)
    }

    fn list_tasks(&self, query: &TaskListQuery) -> RepoResult<Vec<Task>> {
        let mut sql = format!("{TASK_SELECT_SQL} WHERE 1 = 1");
        let mut bind_values: Vec<Value> = Vec::new();
        push_filter_sql(&mut sql, &mut bind_values, &query.filter);

        sql.push_str(match query.sort {
            TaskSort::CreatedDesc => " ORDER BY created_at DESC, uuid ASC",
            TaskSort::CreatedAsc => " ORDER BY created_at ASC, uuid ASC",
            TaskSort::DeadlineAsc => " ORDER BY deadline ASC, uuid ASC",
            TaskSort::DeadlineDesc => " ORDER BY deadline DESC, uuid ASC",
            TaskSort::NameAsc => " ORDER BY name ASC, uuid ASC",
            TaskSort::NameDesc => " ORDER BY name DESC, uuid ASC",
        });

        let limit = query.limit.unwrap_or(TASKS_DEFAULT_LIMIT);
        sql.push_str(" LIMIT ?");
        bind_values.push(Value::Integer(i64::from(limit)));
        if query.offset > 0 {
            sql.push_str(" OFFSET ?");
            bind_values.push(Value::Integer(i64::from(query.offset)));
        }

        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(bind_values))?;
        let mut tasks = Vec::new();

        while let Some(row) = rows.next()? {
            tasks.push(parse_task_row(row)?);
        }

        Ok(tasks)
    }

    fn count_tasks(&self, filter: &TaskFilter) -> RepoResult<u64> {
        let mut sql = "SELECT COUNT(*) FROM tasks WHERE 1 = 1".to_string();
        let mut bind_values: Vec<Value> = Vec::new();
        push_filter_sql(&mut sql, &mut bind_values, filter);

        let count = self
            .conn
            .query_row(&sql, params_from_iter(bind_values), |row| {
                row.get::<_, i64>(0)
            })?;
        Ok(count as u64)
    }

    fn delete_task(&self, id: TaskId) -> RepoResult<()> {
        let changed = self
            .conn
            .execute("DELETE FROM tasks WHERE uuid = ?1;", [id.to_string()])?;

        if changed == 0 {
            return Err(RepoError::NotFound(id));
        }

        Ok(())
    }

    fn ids_assigned_to(&self, owner: OwnerId) -> RepoResult<Vec<TaskId>> {
        let mut stmt = self.conn.prepare(
            "SELECT uuid FROM tasks WHERE assigned_owner = ?1 ORDER BY uuid ASC;",
        )?;
        let mut rows = stmt.query([owner.to_string()])?;
        let mut ids = Vec::new();

        while let Some(row) = rows.next()? {
            let text: String = row.get(0)?;
            ids.push(parse_uuid(&text, "tasks.uuid")?);
        }

        Ok(ids)
    }

    fn assign_many(&self, ids: &[TaskId], owner: OwnerId, owner_name: &str) -> RepoResult<usize> {
        if ids.is_empty() {
            return Ok(0);
        }

        let sql = format!(
            "UPDATE tasks
             SET assigned_owner = ?1, assigned_owner_name = ?2
             WHERE uuid IN ({});",
            id_placeholders(3, ids.len())
        );
        let mut bind_values: Vec<Value> = vec![
            Value::Text(owner.to_string()),
            Value::Text(owner_name.to_string()),
        ];
        bind_values.extend(ids.iter().map(|id| Value::Text(id.to_string())));

        let changed = self.conn.execute(&sql, params_from_iter(bind_values))?;
        Ok(changed)
    }

    fn unassign_many(&self, ids: &[TaskId]) -> RepoResult<usize> {
        if ids.is_empty() {
            return Ok(0);
        }

        let sql = format!(
            "UPDATE tasks
             SET assigned_owner = NULL, assigned_owner_name = ?1
             WHERE uuid IN ({});",
            id_placeholders(2, ids.len())
        );
        let mut bind_values: Vec<Value> = vec![Value::Text(UNASSIGNED_NAME.to_string())];
        bind_values.extend(ids.iter().map(|id| Value::Text(id.to_string())));

        let changed = self.conn.execute(&sql, params_from_iter(bind_values))?;
        Ok(changed)
    }

    fn unassign_all_of(&self, owner: OwnerId) -> RepoResult<usize> {
        let changed = self.conn.execute(
            "UPDATE tasks
             SET assigned_owner = NULL, assigned_owner_name = ?1
             WHERE assigned_owner = ?2;",
            params![UNASSIGNED_NAME, owner.to_string()],
        )?;
        Ok(changed)
    }
}

fn push_filter_sql(sql: &mut String, bind_values: &mut Vec<Value>, filter: &TaskFilter) {
    if let Some(completed) = filter.completed {
        sql.push_str(" AND completed = ?");
        bind_values.push(Value::Integer(bool_to_int(completed)));
    }

    match filter.assignment {
        AssignmentFilter::Any => {}
        AssignmentFilter::Unassigned => sql.push_str(" AND assigned_owner IS NULL"),
        AssignmentFilter::To(owner) => {
            sql.push_str(" AND assigned_owner = ?");
            bind_values.push(Value::Text(owner.to_string()));
        }
    }

    if let Some(due_before) = filter.due_before {
        sql.push_str(" AND deadline <= ?");
        bind_values.push(Value::Integer(due_before));
    }
}

fn id_placeholders(first: usize, count: usize) -> String {
    (0..count)
        .map(|offset| format!("?{}", first + offset))
        .collect::<Vec<_>>()
        .join(", ")
}

fn parse_task_row(row: &Row<'_>) -> RepoResult<Task> {
    let uuid_text: String = row.get("uuid")?;
    let uuid = parse_uuid(&uuid_text, "tasks.uuid")?;

    let assigned_owner = match row.get::<_, Option<String>>("assigned_owner")? {
        Some(text) => Some(parse_uuid(&text, "tasks.assigned_owner")?),
        None => None,
    };

    let completed = int_to_bool(row.get("completed")?, "tasks.completed")?;

    let task = Task {
        uuid,
        name: row.get("name")?,
        description: row.get("description")?,
        deadline: row.get("deadline")?,
        completed,
        assigned_owner,
        assigned_owner_name: row.get("assigned_owner_name")?,
        created_at: row.get("created_at")?,
    };
    task.validate()?;
    Ok(task)
}
