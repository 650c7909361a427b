//! Field snapshots and change detection for audited task fields.
//!
//! A [`TaskSnapshot`] holds the serialised form of every tracked field at one
//! instant. Comparing two snapshots yields the [`FieldChange`] set that the
//! audit trail records. Relational fields are reduced to the referenced
//! identifier before comparison, so only identity changes count.

use super::{ParseTrackedFieldError, Task};
use serde::{Serialize, Serializer};
use std::fmt;

/// A task field eligible for audit logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TrackedField {
    /// The task name.
    Name,
    /// The task description.
    Description,
    /// The workflow status.
    Status,
    /// The assigned user reference.
    AssignedTo,
}

impl TrackedField {
    /// Every tracked field in recording order.
    pub const ALL: [Self; 4] = [Self::Name, Self::Description, Self::Status, Self::AssignedTo];

    /// Returns the field name as stored in history entries.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Name => "name",
            Self::Description => "description",
            Self::Status => "status",
            Self::AssignedTo => "assigned_to",
        }
    }
}

impl TryFrom<&str> for TrackedField {
    type Error = ParseTrackedFieldError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::ALL
            .into_iter()
            .find(|field| field.as_str() == value)
            .ok_or_else(|| ParseTrackedFieldError(value.to_owned()))
    }
}

impl fmt::Display for TrackedField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for TrackedField {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// Serialised values of every tracked field at one instant.
///
/// `None` stands for both "absent" and "null"; the two are never told apart.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskSnapshot {
    name: Option<String>,
    description: Option<String>,
    status: Option<String>,
    assigned_to: Option<String>,
}

impl TaskSnapshot {
    /// Snapshot of a task that does not exist (yet or any more).
    #[must_use]
    pub fn absent() -> Self {
        Self::default()
    }

    /// Captures the tracked fields of `task`.
    #[must_use]
    pub fn of(task: &Task) -> Self {
        Self {
            name: Some(task.name().as_str().to_owned()),
            description: task.description().map(str::to_owned),
            status: Some(task.status().as_str().to_owned()),
            assigned_to: task.assigned_to().map(|user| user.value().to_string()),
        }
    }

    /// Returns the serialised value of `field`.
    #[must_use]
    pub fn value(&self, field: TrackedField) -> Option<&str> {
        match field {
            TrackedField::Name => self.name.as_deref(),
            TrackedField::Description => self.description.as_deref(),
            TrackedField::Status => self.status.as_deref(),
            TrackedField::AssignedTo => self.assigned_to.as_deref(),
        }
    }
}

/// One field whose serialised value differs between two snapshots.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldChange {
    /// The changed field.
    pub field: TrackedField,
    /// Serialised value before the change.
    pub old_value: Option<String>,
    /// Serialised value after the change.
    pub new_value: Option<String>,
}

impl FieldChange {
    fn between(field: TrackedField, before: &TaskSnapshot, after: &TaskSnapshot) -> Self {
        Self {
            field,
            old_value: before.value(field).map(str::to_owned),
            new_value: after.value(field).map(str::to_owned),
        }
    }
}

/// Returns one change per tracked field whose serialised value differs.
///
/// Equal values, including `null == null`, produce nothing. Changes come back
/// in [`TrackedField::ALL`] order.
#[must_use]
pub fn detect_changes(before: &TaskSnapshot, after: &TaskSnapshot) -> Vec<FieldChange> {
    TrackedField::ALL
        .into_iter()
        .filter(|field| before.value(*field) != after.value(*field))
        .map(|field| FieldChange::between(field, before, after))
        .collect()
}

/// Returns the removal record for every tracked field, null or not.
#[must_use]
pub fn deletion_changes(before: &TaskSnapshot) -> Vec<FieldChange> {
    let gone = TaskSnapshot::absent();
    TrackedField::ALL
        .into_iter()
        .map(|field| FieldChange::between(field, before, &gone))
        .collect()
}
