//! Diesel row models and domain conversions for task persistence.

use super::schema::{task_history, tasks, users};
use crate::task::{
    domain::{
        HistoryEntryId, NewHistoryEntry, PersistedTaskData, Task, TaskDraft, TaskHistoryEntry,
        TaskId, TaskName, TaskStatus, TrackedField, User, UserId,
    },
    ports::{StoreError, StoreResult},
};
use chrono::{DateTime, Utc};
use diesel::prelude::*;

/// Query result row for task records.
#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = tasks)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct TaskRow {
    /// Task identifier.
    pub id: i64,
    /// Task name.
    pub name: String,
    /// Optional description.
    pub description: Option<String>,
    /// Status code.
    pub status: String,
    /// Optional assignee.
    pub assigned_to: Option<i64>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last update timestamp.
    pub updated_at: DateTime<Utc>,
}

/// Insert model for task records; the identifier comes from the sequence.
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = tasks)]
pub struct NewTaskRow {
    /// Task name.
    pub name: String,
    /// Optional description.
    pub description: Option<String>,
    /// Status code.
    pub status: String,
    /// Optional assignee.
    pub assigned_to: Option<i64>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last update timestamp.
    pub updated_at: DateTime<Utc>,
}

impl NewTaskRow {
    /// Builds the insert row for a draft.
    pub fn from_draft(draft: &TaskDraft) -> Self {
        Self {
            name: draft.name().as_str().to_owned(),
            description: draft.description().map(str::to_owned),
            status: draft.status().as_str().to_owned(),
            assigned_to: draft.assigned_to().map(UserId::value),
            created_at: draft.created_at(),
            updated_at: draft.created_at(),
        }
    }
}

/// Full-row changeset; `None` writes `NULL`.
#[derive(Debug, Clone, AsChangeset)]
#[diesel(table_name = tasks)]
#[diesel(treat_none_as_null = true)]
pub struct TaskChangeset {
    /// Task name.
    pub name: String,
    /// Optional description.
    pub description: Option<String>,
    /// Status code.
    pub status: String,
    /// Optional assignee.
    pub assigned_to: Option<i64>,
    /// Last update timestamp.
    pub updated_at: DateTime<Utc>,
}

impl TaskChangeset {
    /// Builds the changeset carrying every mutable column of `task`.
    pub fn from_task(task: &Task) -> Self {
        Self {
            name: task.name().as_str().to_owned(),
            description: task.description().map(str::to_owned),
            status: task.status().as_str().to_owned(),
            assigned_to: task.assigned_to().map(UserId::value),
            updated_at: task.updated_at(),
        }
    }
}

/// Query result row for history entries.
#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = task_history)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct HistoryRow {
    /// Entry identifier.
    pub id: i64,
    /// Live task reference.
    pub task_id: Option<i64>,
    /// Preserved task identifier.
    pub task_id_snapshot: Option<i64>,
    /// Acting user.
    pub changed_by: Option<i64>,
    /// Acting user name.
    pub changed_by_username: Option<String>,
    /// Recording timestamp.
    pub recorded_at: DateTime<Utc>,
    /// Changed field name.
    pub field: String,
    /// Serialised old value.
    pub old_value: Option<String>,
    /// Serialised new value.
    pub new_value: Option<String>,
}

/// Insert model for history entries.
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = task_history)]
pub struct NewHistoryRow {
    /// Live task reference.
    pub task_id: Option<i64>,
    /// Preserved task identifier.
    pub task_id_snapshot: Option<i64>,
    /// Acting user.
    pub changed_by: Option<i64>,
    /// Acting user name.
    pub changed_by_username: Option<String>,
    /// Recording timestamp.
    pub recorded_at: DateTime<Utc>,
    /// Changed field name.
    pub field: String,
    /// Serialised old value.
    pub old_value: Option<String>,
    /// Serialised new value.
    pub new_value: Option<String>,
}

impl NewHistoryRow {
    /// Builds the insert row for a recorded change.
    pub fn from_entry(entry: &NewHistoryEntry) -> Self {
        Self {
            task_id: entry.task.map(TaskId::value),
            task_id_snapshot: entry.task_id_snapshot,
            changed_by: entry.changed_by.map(UserId::value),
            changed_by_username: entry.changed_by_username.clone(),
            recorded_at: entry.timestamp,
            field: entry.field.as_str().to_owned(),
            old_value: entry.old_value.clone(),
            new_value: entry.new_value.clone(),
        }
    }
}

/// Query result row for user lookups.
#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = users)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct UserRow {
    /// User identifier.
    pub id: i64,
    /// Login name.
    pub username: String,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        Self::new(UserId::new(row.id), row.username)
    }
}

/// Reconstructs a task, rejecting rows that violate domain invariants.
pub fn row_to_task(row: TaskRow) -> StoreResult<Task> {
    let TaskRow {
        id,
        name,
        description,
        status,
        assigned_to,
        created_at,
        updated_at,
    } = row;

    let data = PersistedTaskData {
        id: TaskId::new(id),
        name: TaskName::new(name).map_err(StoreError::persistence)?,
        description,
        status: TaskStatus::try_from(status.as_str()).map_err(StoreError::persistence)?,
        assigned_to: assigned_to.map(UserId::new),
        created_at,
        updated_at,
    };
    Ok(Task::from_persisted(data))
}

/// Reconstructs a history entry, rejecting unknown field names.
pub fn row_to_entry(row: HistoryRow) -> StoreResult<TaskHistoryEntry> {
    let field = TrackedField::try_from(row.field.as_str()).map_err(StoreError::persistence)?;
    let record = NewHistoryEntry {
        task: row.task_id.map(TaskId::new),
        task_id_snapshot: row.task_id_snapshot,
        changed_by: row.changed_by.map(UserId::new),
        changed_by_username: row.changed_by_username,
        timestamp: row.recorded_at,
        field,
        old_value: row.old_value,
        new_value: row.new_value,
    };
    Ok(TaskHistoryEntry::from_parts(HistoryEntryId::new(row.id), record))
}
