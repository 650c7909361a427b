//! Audit recorder turning field changes into history entries.

use crate::task::{
    domain::{AuditContext, FieldChange, NewHistoryEntry, TaskHistoryEntry, TaskId},
    ports::{HistoryStore, StoreResult},
};
use chrono::{DateTime, Utc};

/// Task targeted by a batch of history entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaskReference {
    /// Live reference, cleared by the store once the task is deleted.
    pub task: Option<TaskId>,
    /// Plain identifier copy kept after deletion.
    pub task_id_snapshot: Option<i64>,
}

impl TaskReference {
    /// References an existing task, capturing its identifier as snapshot.
    #[must_use]
    pub const fn live(id: TaskId) -> Self {
        Self {
            task: Some(id),
            task_id_snapshot: Some(id.value()),
        }
    }
}

/// Persists one history entry per field change, stamped with one instant.
#[derive(Debug, Clone, Copy)]
pub struct AuditRecorder<'a> {
    context: &'a AuditContext,
    timestamp: DateTime<Utc>,
}

impl<'a> AuditRecorder<'a> {
    /// Creates a recorder for the acting context and recording time.
    #[must_use]
    pub const fn new(context: &'a AuditContext, timestamp: DateTime<Utc>) -> Self {
        Self { context, timestamp }
    }

    /// Builds the entries for `changes` without persisting them.
    ///
    /// Anonymous contexts leave both `changed_by` and `changed_by_username`
    /// empty.
    #[must_use]
    pub fn entries(&self, target: TaskReference, changes: &[FieldChange]) -> Vec<NewHistoryEntry> {
        let actor = self.context.actor();
        changes
            .iter()
            .map(|change| NewHistoryEntry {
                task: target.task,
                task_id_snapshot: target.task_id_snapshot,
                changed_by: actor.map(|who| who.user_id()),
                changed_by_username: actor.map(|who| who.username().to_owned()),
                timestamp: self.timestamp,
                field: change.field,
                old_value: change.old_value.clone(),
                new_value: change.new_value.clone(),
            })
            .collect()
    }

    /// Appends one entry per change. An empty change set touches nothing.
    ///
    /// # Errors
    ///
    /// Propagates the history store failure; callers abort the surrounding
    /// transaction.
    pub fn record(
        &self,
        history: &mut dyn HistoryStore,
        target: TaskReference,
        changes: &[FieldChange],
    ) -> StoreResult<Vec<TaskHistoryEntry>> {
        if changes.is_empty() {
            return Ok(Vec::new());
        }
        history.append(&self.entries(target, changes))
    }
}
