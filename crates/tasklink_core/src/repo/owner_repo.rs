//! Owner repository contract and SQLite implementation.
//!
//! # Responsibility
//! - Provide per-record CRUD over `owners` plus pending-set membership ops.
//! - Own whole-set pending replacement with atomic semantics.
//!
//! # Invariants
//! - Write paths call `Owner::validate()` before SQL mutations.
//! - `add_pending_task` is an idempotent set-add.
//! - `set_pending_tasks` replaces the whole membership in a single
//!   transaction; partial link states are never visible.
//! - Email uniqueness is enforced by the store and surfaced as `EmailTaken`.

use crate::model::owner::{Owner, OwnerId};
use crate::model::task::TaskId;
use crate::repo::{parse_uuid, RepoError, RepoResult};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, ErrorCode, Row};
use std::collections::BTreeSet;

const OWNER_SELECT_SQL: &str = "SELECT
    uuid,
    name,
    email,
    created_at
FROM owners";

/// Query options for listing owners. No default limit is applied.
#[derive(Debug, Clone, Default)]
pub struct OwnerListQuery {
    /// Exact email match filter.
    pub email: Option<String>,
    pub limit: Option<u32>,
    pub offset: u32,
}

/// Repository interface for owner persistence.
pub trait OwnerRepository {
    /// Persists the owner row and any pending links it carries.
    fn create_owner(&self, owner: &Owner) -> RepoResult<OwnerId>;
    /// Replaces name and email of an existing owner row.
    fn replace_owner_row(&self, owner: &Owner) -> RepoResult<()>;
    /// Gets one owner by id, pending set included.
    fn get_owner(&self, id: OwnerId) -> RepoResult<Option<Owner>>;
    /// Lists owners using filter and pagination options.
    fn list_owners(&self, query: &OwnerListQuery) -> RepoResult<Vec<Owner>>;
    /// Counts owners, optionally restricted to an exact email.
    fn count_owners(&self, email: Option<&str>) -> RepoResult<u64>;
    /// Hard-deletes the owner row; pending links go with it.
    fn delete_owner(&self, id: OwnerId) -> RepoResult<()>;
    /// Whether another owner (excluding `exclude`) already uses the email.
    fn email_in_use(&self, email: &str, exclude: Option<OwnerId>) -> RepoResult<bool>;
    /// Adds one task id to the owner's pending set. Idempotent.
    fn add_pending_task(&self, owner: OwnerId, task: TaskId) -> RepoResult<()>;
    /// Removes one task id from the owner's pending set. Missing ids are
    /// a no-op.
    fn remove_pending_task(&self, owner: OwnerId, task: TaskId) -> RepoResult<()>;
    /// Replaces the owner's whole pending set in one transaction.
    fn set_pending_tasks(&self, owner: OwnerId, tasks: &BTreeSet<TaskId>) -> RepoResult<()>;
}

/// SQLite-backed owner repository.
pub struct SqliteOwnerRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteOwnerRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }

    fn pending_tasks_of(&self, id: &str) -> RepoResult<BTreeSet<TaskId>> {
        let mut stmt = self
            .conn
            .prepare("SELECT task_uuid FROM owner_pending_tasks WHERE owner_uuid = ?1;")?;
        let mut rows = stmt.query([id])?;
        let mut pending = BTreeSet::new();

        while let Some(row) = rows.next()? {
            let text: String = row.get(0)?;
            pending.insert(parse_uuid(&text, "owner_pending_tasks.task_uuid")?);
        }

        Ok(pending)
    }
}

impl OwnerRepository for SqliteOwnerRepository<'_> {
    fn create_owner(&self, owner: &Owner) -> RepoResult<OwnerId> {
        owner.validate()?;

        let tx = self.conn.unchecked_transaction()?;
        let inserted = tx.execute(
            "INSERT INTO owners (uuid, name, email, created_at)
             VALUES (?1, ?2, ?3, ?4);",
            params![
                owner.uuid.to_string(),
                owner.name.as_str(),
                owner.email.as_str(),
                owner.created_at,
            ],
        );
        map_email_conflict(inserted, &owner.email)?;

        for task in &owner.pending_tasks {
            tx.execute(
                "INSERT OR IGNORE INTO owner_pending_tasks (owner_uuid, task_uuid)
                 VALUES (?1, ?2);",
                params![owner.uuid.to_string(), task.to_string()],
            )?;
        }
        tx.commit()?;

        Ok(owner.uuid)
    }

    fn replace_owner_row(&self, owner: &Owner) -> RepoResult<()> {
        owner.validate()?;

        let changed = map_email_conflict(
            self.conn.execute(
                "UPDATE owners SET name = ?1, email = ?2 WHERE uuid = ?3;",
                params![
                    owner.name.as_str(),
                    owner.email.as_str(),
                    owner.uuid.to_string(),
                ],
            ),
            &owner.email,
        )?;

        if changed == 0 {
            return Err(RepoError::NotFound(owner.uuid));
        }

        Ok(())
    }

    fn get_owner(&self, id: OwnerId) -> RepoResult<Option<Owner>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{OWNER_SELECT_SQL} WHERE uuid = ?1;"))?;

        let mut rows = stmt.query([id.to_string()])?;
        if let Some(row) = rows.next()? {
            let mut owner = parse_owner_row(row)?;
            owner.pending_tasks = self.pending_tasks_of(&id.to_string())?;
            return Ok(Some(owner));
        }

        Ok(None)
    }

    fn list_owners(&self, query: &OwnerListQuery) -> RepoResult<Vec<Owner>> {
        let mut sql = format!("{OWNER_SELECT_SQL} WHERE 1 = 1");
        let mut bind_values: Vec<Value> = Vec::new();

        if let Some(email) = &query.email {
            sql.push_str(" AND email = ?");
            bind_values.push(Value::Text(email.clone()));
        }

        sql.push_str(" ORDER BY created_at DESC, uuid ASC");

        if let Some(limit) = query.limit {
            sql.push_str(" LIMIT ?");
            bind_values.push(Value::Integer(i64::from(limit)));
            if query.offset > 0 {
                sql.push_str(" OFFSET ?");
                bind_values.push(Value::Integer(i64::from(query.offset)));
            }
        } else if query.offset > 0 {
            sql.push_str(" LIMIT -1 OFFSET ?");
            bind_values.push(Value::Integer(i64::from(query.offset)));
        }

        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(bind_values))?;
        let mut owners = Vec::new();

        while let Some(row) = rows.next()? {
            owners.push(parse_owner_row(row)?);
        }

        for owner in &mut owners {
            owner.pending_tasks = self.pending_tasks_of(&owner.uuid.to_string())?;
        }

        Ok(owners)
    }

    fn count_owners(&self, email: Option<&str>) -> RepoResult<u64> {
        let count = match email {
            Some(email) => self.conn.query_row(
                "SELECT COUNT(*) FROM owners WHERE email = ?1;",
                [email],
                |row| row.get::<_, i64>(0),
            )?,
            None => self
                .conn
                .query_row("SELECT COUNT(*) FROM owners;", [], |row| {
                    row.get::<_, i64>(0)
                })?,
        };
        Ok(count as u64)
    }

    fn delete_owner(&self, id: OwnerId) -> RepoResult<()> {
        let changed = self
            .conn
            .execute("DELETE FROM owners WHERE uuid = ?1;", [id.to_string()])?;

        if changed == 0 {
            return Err(RepoError::NotFound(id));
        }

        Ok(())
    }

    fn email_in_use(&self, email: &str, exclude: Option<OwnerId>) -> RepoResult<bool> {
        let count = match exclude {
            Some(id) => self.conn.query_row(
                "SELECT COUNT(*) FROM owners WHERE email = ?1 AND uuid <> ?2;",
                params![email, id.to_string()],
                |row| row.get::<_, i64>(0),
            )?,
            None => self.conn.query_row(
                "SELECT COUNT(*) FROM owners WHERE email = ?1;",
                [email],
                |row| row.get::<_, i64>(0),
            )?,
        };
        Ok(count > 0)
    }

    fn add_pending_task(&self, owner: OwnerId, task: TaskId) -> RepoResult<()> {
        self.conn.execute(
            "INSERT OR IGNORE INTO owner_pending_tasks (owner_uuid, task_uuid)
             VALUES (?1, ?2);",
            params![owner.to_string(), task.to_string()],
        )?;
        Ok(())
    }

    fn remove_pending_task(&self, owner: OwnerId, task: TaskId) -> RepoResult<()> {
        self.conn.execute(
            "DELETE FROM owner_pending_tasks WHERE owner_uuid = ?1 AND task_uuid = ?2;",
            params![owner.to_string(), task.to_string()],
        )?;
        Ok(())
    }

    fn set_pending_tasks(&self, owner: OwnerId, tasks: &BTreeSet<TaskId>) -> RepoResult<()> {
        let owner_text = owner.to_string();
        let tx = self.conn.unchecked_transaction()?;

        tx.execute(
            "DELETE FROM owner_pending_tasks WHERE owner_uuid = ?1;",
            [owner_text.as_str()],
        )?;
        for task in tasks {
            tx.execute(
                "INSERT OR IGNORE INTO owner_pending_tasks (owner_uuid, task_uuid)
                 VALUES (?1, ?2);",
                params![owner_text.as_str(), task.to_string()],
            )?;
        }
        tx.commit()?;

        Ok(())
    }
}

fn map_email_conflict(result: rusqlite::Result<usize>, email: &str) -> RepoResult<usize> {
    match result {
        Ok(changed) => Ok(changed),
        Err(rusqlite::Error::SqliteFailure(err, _))
            if err.code == ErrorCode::ConstraintViolation =>
        {
            Err(RepoError::EmailTaken(email.to_string()))
        }
        Err(err) => Err(err.into()),
    }
}

fn parse_owner_row(row: &Row<'_>) -> RepoResult<Owner> {
    let uuid_text: String = row.get("uuid")?;
    let uuid = parse_uuid(&uuid_text, "owners.uuid")?;

    let owner = Owner {
        uuid,
        name: row.get("name")?,
        email: row.get("email")?,
        pending_tasks: BTreeSet::new(),
        created_at: row.get("created_at")?,
    };
    owner.validate()?;
    Ok(owner)
}
