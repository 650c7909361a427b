//! History entries, acting users and the audit context of a request.

use super::{HistoryEntryId, TaskId, TrackedField, UserId};
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

/// User account as seen by the task core.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct User {
    /// Account identifier.
    pub id: UserId,
    /// Login name at lookup time.
    pub username: String,
}

impl User {
    /// Creates a user value.
    #[must_use]
    pub fn new(id: UserId, username: impl Into<String>) -> Self {
        Self {
            id,
            username: username.into(),
        }
    }
}

/// Authenticated user performing a mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor {
    user_id: UserId,
    username: String,
}

impl Actor {
    /// Longest username the audit trail can record.
    pub const MAX_USERNAME_CHARS: usize = 150;

    /// Creates an actor from an authenticated identity.
    #[must_use]
    pub fn new(user_id: UserId, username: impl Into<String>) -> Self {
        Self {
            user_id,
            username: username.into(),
        }
    }

    /// Returns the acting user's identifier.
    #[must_use]
    pub const fn user_id(&self) -> UserId {
        self.user_id
    }

    /// Returns the acting user's name at request time.
    #[must_use]
    pub fn username(&self) -> &str {
        &self.username
    }
}

impl From<&User> for Actor {
    fn from(user: &User) -> Self {
        Self::new(user.id, user.username.clone())
    }
}

/// Audit context for a single task operation.
///
/// The actor ends up in every history entry the operation writes. The
/// correlation ID only travels through log spans.
///
/// # Example
///
/// ```
/// use task_audit::task::domain::{Actor, AuditContext, UserId};
/// use uuid::Uuid;
///
/// let context = AuditContext::for_actor(Actor::new(UserId::new(7), "alice"))
///     .with_correlation_id(Uuid::new_v4());
///
/// assert_eq!(context.actor().map(Actor::username), Some("alice"));
/// assert!(context.correlation_id().is_some());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuditContext {
    actor: Option<Actor>,
    correlation_id: Option<Uuid>,
}

impl AuditContext {
    /// Context for a request without an authenticated user.
    #[must_use]
    pub const fn anonymous() -> Self {
        Self {
            actor: None,
            correlation_id: None,
        }
    }

    /// Context for a request made by `actor`.
    #[must_use]
    pub const fn for_actor(actor: Actor) -> Self {
        Self {
            actor: Some(actor),
            correlation_id: None,
        }
    }

    /// Sets the correlation ID used in log spans.
    #[must_use]
    pub const fn with_correlation_id(mut self, id: Uuid) -> Self {
        self.correlation_id = Some(id);
        self
    }

    /// Returns the acting user, if authenticated.
    #[must_use]
    pub const fn actor(&self) -> Option<&Actor> {
        self.actor.as_ref()
    }

    /// Returns the correlation ID, if set.
    #[must_use]
    pub const fn correlation_id(&self) -> Option<Uuid> {
        self.correlation_id
    }
}

/// History record before the store has assigned its identifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewHistoryEntry {
    /// Live reference to the task; cleared by the store once the task is gone.
    pub task: Option<TaskId>,
    /// Plain copy of the task identifier that survives deletion.
    pub task_id_snapshot: Option<i64>,
    /// Acting user, `None` for anonymous requests.
    pub changed_by: Option<UserId>,
    /// Acting user's name at the time of the change.
    pub changed_by_username: Option<String>,
    /// When the change was recorded.
    pub timestamp: DateTime<Utc>,
    /// The changed field.
    pub field: TrackedField,
    /// Serialised value before the change.
    pub old_value: Option<String>,
    /// Serialised value after the change.
    pub new_value: Option<String>,
}

/// Immutable, persisted history entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaskHistoryEntry {
    id: HistoryEntryId,
    #[serde(flatten)]
    record: NewHistoryEntry,
}

impl TaskHistoryEntry {
    /// Combines a store-assigned identifier with the recorded data.
    #[must_use]
    pub const fn from_parts(id: HistoryEntryId, record: NewHistoryEntry) -> Self {
        Self { id, record }
    }

    /// Returns the entry identifier.
    #[must_use]
    pub const fn id(&self) -> HistoryEntryId {
        self.id
    }

    /// Returns the live task reference, `None` once the task is deleted.
    #[must_use]
    pub const fn task(&self) -> Option<TaskId> {
        self.record.task
    }

    /// Returns the preserved task identifier.
    #[must_use]
    pub const fn task_id_snapshot(&self) -> Option<i64> {
        self.record.task_id_snapshot
    }

    /// Returns the acting user.
    #[must_use]
    pub const fn changed_by(&self) -> Option<UserId> {
        self.record.changed_by
    }

    /// Returns the acting user's name as recorded.
    #[must_use]
    pub fn changed_by_username(&self) -> Option<&str> {
        self.record.changed_by_username.as_deref()
    }

    /// Returns the recording timestamp.
    #[must_use]
    pub const fn timestamp(&self) -> DateTime<Utc> {
        self.record.timestamp
    }

    /// Returns the changed field.
    #[must_use]
    pub const fn field(&self) -> TrackedField {
        self.record.field
    }

    /// Returns the serialised value before the change.
    #[must_use]
    pub fn old_value(&self) -> Option<&str> {
        self.record.old_value.as_deref()
    }

    /// Returns the serialised value after the change.
    #[must_use]
    pub fn new_value(&self) -> Option<&str> {
        self.record.new_value.as_deref()
    }

    /// Returns the recorded data.
    #[must_use]
    pub const fn record(&self) -> &NewHistoryEntry {
        &self.record
    }

    /// Drops the live task reference, keeping the snapshot id.
    #[must_use]
    pub fn detached(mut self) -> Self {
        self.record.task = None;
        self
    }
}
