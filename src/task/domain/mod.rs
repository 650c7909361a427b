//! Domain model for audited task management.
//!
//! The task domain models the task aggregate, the tracked-field snapshots
//! that feed the audit trail, and the read-side filters, while keeping all
//! infrastructure concerns outside of the domain boundary.

mod error;
mod filter;
mod history;
mod ids;
mod snapshot;
mod task;

pub use error::{
    FieldViolation, ParseTaskStatusError, ParseTrackedFieldError, TaskDomainError,
    ValidationError,
};
pub use filter::{HistoryFilter, TaskFilter, parse_timestamp};
pub use history::{Actor, AuditContext, NewHistoryEntry, TaskHistoryEntry, User};
pub use ids::{HistoryEntryId, TaskId, UserId};
pub use snapshot::{FieldChange, TaskSnapshot, TrackedField, deletion_changes, detect_changes};
pub use task::{PersistedTaskData, Task, TaskDraft, TaskName, TaskPatch, TaskStatus};
