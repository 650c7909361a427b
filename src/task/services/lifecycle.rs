//! Service layer for audited task creation, update, deletion and lookup.
//!
//! Every mutation runs as one named unit of work inside a single store
//! transaction: snapshot before, mutate, snapshot after, diff, record.

use super::audit::{AuditRecorder, TaskReference};
use crate::task::{
    domain::{
        Actor, AuditContext, FieldViolation, HistoryFilter, Task, TaskDomainError, TaskDraft, TaskFilter,
        TaskHistoryEntry, TaskId, TaskName, TaskPatch, TaskSnapshot, TaskStatus, UserId,
        ValidationError, deletion_changes, detect_changes,
    },
    ports::{StoreError, StoreTransaction, TaskUnitOfWork},
};
use mockable::Clock;
use serde::{Deserialize, Deserializer};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

/// Inbound payload for creating a task.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct CreateTaskRequest {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    assigned_to: Option<UserId>,
}

impl CreateTaskRequest {
    /// Creates a request with the required name.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::default()
        }
    }

    /// Sets the description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Sets the status code.
    #[must_use]
    pub fn with_status(mut self, status: impl Into<String>) -> Self {
        self.status = Some(status.into());
        self
    }

    /// Sets the assignee.
    #[must_use]
    pub const fn with_assignee(mut self, user: UserId) -> Self {
        self.assigned_to = Some(user);
        self
    }

    fn validate(self) -> Result<ValidatedCreate, ValidationError> {
        let mut violations = Vec::new();
        let name = match self.name {
            Some(raw) => TaskName::new(raw)
                .map_err(|err| violations.push(name_violation(&err)))
                .ok(),
            None => {
                violations.push(FieldViolation::new("name", "this field is required"));
                None
            }
        };
        let status = parse_status(self.status.as_deref(), &mut violations);

        match (name, ValidationError::from_violations(violations)) {
            (Some(task_name), None) => Ok(ValidatedCreate {
                name: task_name,
                description: self.description,
                status: status.unwrap_or_default(),
                assigned_to: self.assigned_to,
            }),
            (_, Some(err)) => Err(err),
            (None, None) => Err(ValidationError::field("name", "this field is required")),
        }
    }
}

/// Create input that passed validation and still lacks a timestamp.
struct ValidatedCreate {
    name: TaskName,
    description: Option<String>,
    status: TaskStatus,
    assigned_to: Option<UserId>,
}

impl ValidatedCreate {
    fn into_draft(self, clock: &impl Clock) -> TaskDraft {
        TaskDraft::new(self.name, clock)
            .with_description(self.description)
            .with_status(self.status)
            .with_assignee(self.assigned_to)
    }
}

/// Inbound partial payload for updating a task.
///
/// Omitted fields stay untouched. For `description` and `assigned_to` an
/// explicit `null` clears the value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct UpdateTaskRequest {
    #[serde(default)]
    name: Option<String>,
    #[serde(default, deserialize_with = "present")]
    description: Option<Option<String>>,
    #[serde(default)]
    status: Option<String>,
    #[serde(default, deserialize_with = "present")]
    assigned_to: Option<Option<UserId>>,
}

fn present<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    T::deserialize(deserializer).map(Some)
}

impl UpdateTaskRequest {
    /// Creates a request that changes nothing.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the name.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Replaces or clears the description.
    #[must_use]
    pub fn with_description(mut self, description: Option<String>) -> Self {
        self.description = Some(description);
        self
    }

    /// Replaces the status code.
    #[must_use]
    pub fn with_status(mut self, status: impl Into<String>) -> Self {
        self.status = Some(status.into());
        self
    }

    /// Replaces or clears the assignee.
    #[must_use]
    pub const fn with_assignee(mut self, user: Option<UserId>) -> Self {
        self.assigned_to = Some(user);
        self
    }

    fn into_patch(self) -> Result<TaskPatch, ValidationError> {
        let mut violations = Vec::new();
        let name = self.name.and_then(|raw| {
            TaskName::new(raw)
                .map_err(|err| violations.push(name_violation(&err)))
                .ok()
        });
        let status = parse_status(self.status.as_deref(), &mut violations);

        ValidationError::from_violations(violations).map_or_else(
            || {
                Ok(TaskPatch {
                    name,
                    description: self.description,
                    status,
                    assigned_to: self.assigned_to,
                })
            },
            Err,
        )
    }
}

fn name_violation(err: &TaskDomainError) -> FieldViolation {
    FieldViolation::new("name", err.to_string())
}

fn parse_status(raw: Option<&str>, violations: &mut Vec<FieldViolation>) -> Option<TaskStatus> {
    let code = raw?;
    TaskStatus::try_from(code)
        .map_err(|err| violations.push(FieldViolation::new("status", err.to_string())))
        .ok()
}

/// Service-level errors for task operations.
#[derive(Debug, Error)]
pub enum TaskServiceError {
    /// Input validation failed.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// The targeted task does not exist.
    #[error("task not found: {0}")]
    NotFound(TaskId),

    /// The acting user cannot be attributed in the audit trail.
    #[error("actor {user} cannot be recorded: {reason}")]
    InvalidActor {
        /// Identifier the request claimed.
        user: UserId,
        /// Why attribution was refused.
        reason: &'static str,
    },

    /// The store failed; the whole operation was rolled back.
    #[error(transparent)]
    Store(StoreError),
}

impl From<StoreError> for TaskServiceError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::TaskNotFound(id) => Self::NotFound(id),
            StoreError::Persistence(_) => Self::Store(err),
        }
    }
}

/// Result type for task service operations.
pub type TaskServiceResult<T> = Result<T, TaskServiceError>;

/// Outcome of a mutation: the resulting value and the number of audit
/// entries written alongside it.
struct Audited<T> {
    value: T,
    entries: usize,
}

/// Audited task orchestration service.
#[derive(Clone)]
pub struct TaskService<S, C>
where
    S: TaskUnitOfWork,
    C: Clock + Send + Sync + 'static,
{
    store: Arc<S>,
    clock: Arc<C>,
}

impl<S, C> TaskService<S, C>
where
    S: TaskUnitOfWork,
    C: Clock + Send + Sync + 'static,
{
    /// Creates a new task service.
    #[must_use]
    pub const fn new(store: Arc<S>, clock: Arc<C>) -> Self {
        Self { store, clock }
    }

    /// Creates a task and records one history entry per non-null field.
    ///
    /// # Errors
    ///
    /// Returns [`TaskServiceError::Validation`] for a missing or blank name,
    /// an unknown status code or an unknown assignee,
    /// [`TaskServiceError::InvalidActor`] for an unrecordable actor, and
    /// [`TaskServiceError::Store`] when persistence fails.
    #[instrument(skip_all, fields(correlation_id = ?context.correlation_id()))]
    pub async fn create(
        &self,
        request: CreateTaskRequest,
        context: &AuditContext,
    ) -> TaskServiceResult<Task> {
        let input = request.validate()?;
        let context = context.clone();
        let clock = Arc::clone(&self.clock);
        let created = self
            .store
            .transaction(move |tx| create_within(tx, input, &*clock, &context))
            .await
            .inspect_err(|err| log_failure("create", err))?;

        info!(task_id = %created.value.id(), audit_entries = created.entries, "task created");
        Ok(created.value)
    }

    /// Applies a partial update and records one entry per changed field.
    ///
    /// # Errors
    ///
    /// Returns [`TaskServiceError::NotFound`] when the task does not exist,
    /// [`TaskServiceError::Validation`] for invalid input,
    /// [`TaskServiceError::InvalidActor`] for an unrecordable actor, and
    /// [`TaskServiceError::Store`] when persistence fails.
    #[instrument(skip_all, fields(task_id = %id, correlation_id = ?context.correlation_id()))]
    pub async fn update(
        &self,
        id: TaskId,
        request: UpdateTaskRequest,
        context: &AuditContext,
    ) -> TaskServiceResult<Task> {
        let patch = request.into_patch()?;
        let context = context.clone();
        let clock = Arc::clone(&self.clock);
        let updated = self
            .store
            .transaction(move |tx| update_within(tx, id, patch, &*clock, &context))
            .await
            .inspect_err(|err| log_failure("update", err))?;

        if updated.entries == 0 {
            debug!("update changed no tracked field");
        } else {
            info!(audit_entries = updated.entries, "task updated");
        }
        Ok(updated.value)
    }

    /// Records the final value of every tracked field and removes the task.
    ///
    /// # Errors
    ///
    /// Returns [`TaskServiceError::NotFound`] when the task does not exist,
    /// [`TaskServiceError::InvalidActor`] for an unrecordable actor, and
    /// [`TaskServiceError::Store`] when persistence fails.
    #[instrument(skip_all, fields(task_id = %id, correlation_id = ?context.correlation_id()))]
    pub async fn delete(&self, id: TaskId, context: &AuditContext) -> TaskServiceResult<()> {
        let context = context.clone();
        let clock = Arc::clone(&self.clock);
        let deleted = self
            .store
            .transaction(move |tx| delete_within(tx, id, &*clock, &context))
            .await
            .inspect_err(|err| log_failure("delete", err))?;

        info!(audit_entries = deleted.entries, "task deleted");
        Ok(deleted.value)
    }

    /// Retrieves a task by identifier.
    ///
    /// # Errors
    ///
    /// Returns [`TaskServiceError::NotFound`] when the task does not exist
    /// and [`TaskServiceError::Store`] when the lookup fails.
    pub async fn get(&self, id: TaskId) -> TaskServiceResult<Task> {
        self.store
            .transaction(move |tx| -> TaskServiceResult<Task> {
                tx.tasks()
                    .find(id)?
                    .ok_or(TaskServiceError::NotFound(id))
            })
            .await
    }

    /// Lists tasks matching `filter`, ordered by identifier.
    ///
    /// # Errors
    ///
    /// Returns [`TaskServiceError::Store`] when the query fails.
    pub async fn list(&self, filter: &TaskFilter) -> TaskServiceResult<Vec<Task>> {
        let filter = filter.clone();
        self.store
            .transaction(move |tx| -> TaskServiceResult<Vec<Task>> {
                Ok(tx.tasks().list_tasks(&filter)?)
            })
            .await
    }

    /// Lists history entries matching `filter`, oldest first.
    ///
    /// # Errors
    ///
    /// Returns [`TaskServiceError::Store`] when the query fails.
    pub async fn history(&self, filter: &HistoryFilter) -> TaskServiceResult<Vec<TaskHistoryEntry>> {
        let filter = filter.clone();
        self.store
            .transaction(move |tx| -> TaskServiceResult<Vec<TaskHistoryEntry>> {
                Ok(tx.history().list_entries(&filter)?)
            })
            .await
    }
}

fn create_within(
    tx: &mut dyn StoreTransaction,
    input: ValidatedCreate,
    clock: &impl Clock,
    context: &AuditContext,
) -> TaskServiceResult<Audited<Task>> {
    ensure_actor_recordable(tx, context)?;
    ensure_assignee_exists(tx, input.assigned_to)?;
    let created = tx.tasks().insert(&input.into_draft(clock))?;

    let changes = detect_changes(&TaskSnapshot::absent(), &TaskSnapshot::of(&created));
    let written = AuditRecorder::new(context, created.created_at()).record(
        tx.history(),
        TaskReference::live(created.id()),
        &changes,
    )?;
    Ok(Audited {
        value: created,
        entries: written.len(),
    })
}

fn update_within(
    tx: &mut dyn StoreTransaction,
    id: TaskId,
    patch: TaskPatch,
    clock: &impl Clock,
    context: &AuditContext,
) -> TaskServiceResult<Audited<Task>> {
    ensure_actor_recordable(tx, context)?;
    let current = tx
        .tasks()
        .find_for_update(id)?
        .ok_or(TaskServiceError::NotFound(id))?;
    if let Some(assignee) = patch.assigned_to {
        ensure_assignee_exists(tx, assignee)?;
    }
    let before = TaskSnapshot::of(&current);

    let mut changed = current;
    changed.apply(patch, clock);
    tx.tasks().update(&changed)?;

    let stored = tx
        .tasks()
        .find(id)?
        .ok_or(TaskServiceError::NotFound(id))?;
    let changes = detect_changes(&before, &TaskSnapshot::of(&stored));
    let written = AuditRecorder::new(context, stored.updated_at()).record(
        tx.history(),
        TaskReference::live(id),
        &changes,
    )?;
    Ok(Audited {
        value: stored,
        entries: written.len(),
    })
}

fn delete_within(
    tx: &mut dyn StoreTransaction,
    id: TaskId,
    clock: &impl Clock,
    context: &AuditContext,
) -> TaskServiceResult<Audited<()>> {
    ensure_actor_recordable(tx, context)?;
    let current = tx
        .tasks()
        .find_for_update(id)?
        .ok_or(TaskServiceError::NotFound(id))?;
    // Stamped under the row lock so the entries sort after every earlier writer.
    let timestamp = clock.utc();

    let changes = deletion_changes(&TaskSnapshot::of(&current));
    let written = AuditRecorder::new(context, timestamp).record(
        tx.history(),
        TaskReference::live(id),
        &changes,
    )?;
    tx.tasks().delete(id)?;
    Ok(Audited {
        value: (),
        entries: written.len(),
    })
}

/// Both stores enforce what the `PostgreSQL` schema does: a known user id
/// and a username that fits the history column.
fn ensure_actor_recordable(
    tx: &mut dyn StoreTransaction,
    context: &AuditContext,
) -> TaskServiceResult<()> {
    let Some(actor) = context.actor() else {
        return Ok(());
    };
    if actor.username().chars().count() > Actor::MAX_USERNAME_CHARS {
        return Err(TaskServiceError::InvalidActor {
            user: actor.user_id(),
            reason: "username exceeds 150 characters",
        });
    }
    if tx.users().find_user(actor.user_id())?.is_none() {
        return Err(TaskServiceError::InvalidActor {
            user: actor.user_id(),
            reason: "no such user",
        });
    }
    Ok(())
}

fn ensure_assignee_exists(
    tx: &mut dyn StoreTransaction,
    assignee: Option<UserId>,
) -> TaskServiceResult<()> {
    let Some(user) = assignee else {
        return Ok(());
    };
    if tx.users().find_user(user)?.is_none() {
        return Err(ValidationError::field(
            "assigned_to",
            format!("user {user} does not exist"),
        )
        .into());
    }
    Ok(())
}

fn log_failure(operation: &'static str, err: &TaskServiceError) {
    match err {
        TaskServiceError::Store(store_err) => {
            warn!(operation, error = %store_err, "task operation rolled back");
        }
        TaskServiceError::Validation(_)
        | TaskServiceError::NotFound(_)
        | TaskServiceError::InvalidActor { .. } => {
            debug!(operation, error = %err, "task operation rejected");
        }
    }
}
