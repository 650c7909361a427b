//! Read-side filters for task listings and the history query surface.

use super::{Task, TaskHistoryEntry, TaskId, TaskStatus, TrackedField, UserId};
use chrono::{DateTime, NaiveDateTime, Utc};

const OFFSET_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f%z", "%Y-%m-%d %H:%M:%S%.f%z"];
const NAIVE_FORMATS: [&str; 4] = [
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

/// Parses an ISO-8601 date-time.
///
/// Accepts RFC 3339 and offset forms, and naive date-times which are taken
/// as UTC. Date-only values and anything else return `None`.
#[must_use]
pub fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    let trimmed = value.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(parsed.with_timezone(&Utc));
    }
    OFFSET_FORMATS
        .iter()
        .find_map(|format| DateTime::parse_from_str(trimmed, format).ok())
        .map(|parsed| parsed.with_timezone(&Utc))
        .or_else(|| {
            NAIVE_FORMATS
                .iter()
                .find_map(|format| NaiveDateTime::parse_from_str(trimmed, format).ok())
                .map(|naive| naive.and_utc())
        })
}

fn contains_ignore_case(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

/// Filter for task listings. Unset fields do not constrain the result.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskFilter {
    /// Exact task identifier.
    pub id: Option<TaskId>,
    /// Case-insensitive substring of the name.
    pub name: Option<String>,
    /// Case-insensitive substring of the description.
    pub description: Option<String>,
    /// Exact status.
    pub status: Option<TaskStatus>,
    /// Exact assignee.
    pub assigned_to: Option<UserId>,
    /// Case-insensitive free text matched against name or description.
    pub search: Option<String>,
}

impl TaskFilter {
    /// Creates an empty filter.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Restricts to one task identifier.
    #[must_use]
    pub const fn with_id(mut self, id: TaskId) -> Self {
        self.id = Some(id);
        self
    }

    /// Restricts to names containing `fragment`.
    #[must_use]
    pub fn with_name(mut self, fragment: impl Into<String>) -> Self {
        self.name = Some(fragment.into());
        self
    }

    /// Restricts to descriptions containing `fragment`.
    #[must_use]
    pub fn with_description(mut self, fragment: impl Into<String>) -> Self {
        self.description = Some(fragment.into());
        self
    }

    /// Restricts to one status.
    #[must_use]
    pub const fn with_status(mut self, status: TaskStatus) -> Self {
        self.status = Some(status);
        self
    }

    /// Restricts to tasks assigned to `user`.
    #[must_use]
    pub const fn with_assignee(mut self, user: UserId) -> Self {
        self.assigned_to = Some(user);
        self
    }

    /// Restricts to tasks where every term of `text` appears in the name or
    /// the description. See [`Self::search_terms`].
    #[must_use]
    pub fn with_search(mut self, text: impl Into<String>) -> Self {
        self.search = Some(text.into());
        self
    }

    /// Terms of the free-text search, split on whitespace and commas.
    ///
    /// A search with no terms does not constrain the listing.
    ///
    /// ```
    /// use task_audit::task::domain::TaskFilter;
    ///
    /// let filter = TaskFilter::new().with_search(" deploy,api  web ");
    /// assert_eq!(filter.search_terms().collect::<Vec<_>>(), ["deploy", "api", "web"]);
    /// ```
    pub fn search_terms(&self) -> impl Iterator<Item = &str> {
        self.search
            .as_deref()
            .into_iter()
            .flat_map(|text| text.split(|ch: char| ch.is_whitespace() || ch == ','))
            .filter(|term| !term.is_empty())
    }

    /// Returns `true` when `task` satisfies every set constraint.
    #[must_use]
    pub fn matches(&self, task: &Task) -> bool {
        let description = task.description().unwrap_or_default();
        self.id.is_none_or(|id| task.id() == id)
            && self
                .name
                .as_deref()
                .is_none_or(|fragment| contains_ignore_case(task.name().as_str(), fragment))
            && self.description.as_deref().is_none_or(|fragment| {
                task.description()
                    .is_some_and(|text| contains_ignore_case(text, fragment))
            })
            && self.status.is_none_or(|status| task.status() == status)
            && self
                .assigned_to
                .is_none_or(|user| task.assigned_to() == Some(user))
            && self.search_terms().all(|term| {
                contains_ignore_case(task.name().as_str(), term)
                    || contains_ignore_case(description, term)
            })
    }
}

/// Filter for the history query surface. Unset fields do not constrain the
/// result; timestamp bounds are inclusive.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HistoryFilter {
    /// Live task reference.
    pub task: Option<TaskId>,
    /// Preserved task identifier.
    pub task_id_snapshot: Option<i64>,
    /// Acting user identifier.
    pub changed_by: Option<UserId>,
    /// Acting user name, exact match.
    pub changed_by_username: Option<String>,
    /// Changed field.
    pub field: Option<TrackedField>,
    /// Serialised old value, exact match.
    pub old_value: Option<String>,
    /// Serialised new value, exact match.
    pub new_value: Option<String>,
    /// Inclusive lower timestamp bound.
    pub timestamp_from: Option<DateTime<Utc>>,
    /// Inclusive upper timestamp bound.
    pub timestamp_to: Option<DateTime<Utc>>,
}

impl HistoryFilter {
    /// Creates an empty filter.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Restricts to entries still linked to `task`.
    #[must_use]
    pub const fn with_task(mut self, task: TaskId) -> Self {
        self.task = Some(task);
        self
    }

    /// Restricts to entries whose preserved task id equals `snapshot`.
    #[must_use]
    pub const fn with_task_id_snapshot(mut self, snapshot: i64) -> Self {
        self.task_id_snapshot = Some(snapshot);
        self
    }

    /// Restricts to entries written by `user`.
    #[must_use]
    pub const fn with_changed_by(mut self, user: UserId) -> Self {
        self.changed_by = Some(user);
        self
    }

    /// Restricts to entries written under `username`.
    #[must_use]
    pub fn with_changed_by_username(mut self, username: impl Into<String>) -> Self {
        self.changed_by_username = Some(username.into());
        self
    }

    /// Restricts to one tracked field.
    #[must_use]
    pub const fn with_field(mut self, field: TrackedField) -> Self {
        self.field = Some(field);
        self
    }

    /// Restricts to entries with this old value.
    #[must_use]
    pub fn with_old_value(mut self, value: impl Into<String>) -> Self {
        self.old_value = Some(value.into());
        self
    }

    /// Restricts to entries with this new value.
    #[must_use]
    pub fn with_new_value(mut self, value: impl Into<String>) -> Self {
        self.new_value = Some(value.into());
        self
    }

    /// Sets the inclusive lower bound.
    #[must_use]
    pub const fn with_timestamp_from(mut self, from: DateTime<Utc>) -> Self {
        self.timestamp_from = Some(from);
        self
    }

    /// Sets the inclusive upper bound.
    #[must_use]
    pub const fn with_timestamp_to(mut self, to: DateTime<Utc>) -> Self {
        self.timestamp_to = Some(to);
        self
    }

    /// Sets the lower bound from ISO-8601 text; malformed text is ignored.
    #[must_use]
    pub fn with_timestamp_from_str(mut self, raw: &str) -> Self {
        match parse_timestamp(raw) {
            Some(from) => self.timestamp_from = Some(from),
            None => tracing::debug!(bound = raw, "ignoring malformed timestamp_from"),
        }
        self
    }

    /// Sets the upper bound from ISO-8601 text; malformed text is ignored.
    #[must_use]
    pub fn with_timestamp_to_str(mut self, raw: &str) -> Self {
        match parse_timestamp(raw) {
            Some(to) => self.timestamp_to = Some(to),
            None => tracing::debug!(bound = raw, "ignoring malformed timestamp_to"),
        }
        self
    }

    /// Returns `true` when `entry` satisfies every set constraint.
    #[must_use]
    pub fn matches(&self, entry: &TaskHistoryEntry) -> bool {
        self.task.is_none_or(|task| entry.task() == Some(task))
            && self
                .task_id_snapshot
                .is_none_or(|snapshot| entry.task_id_snapshot() == Some(snapshot))
            && self
                .changed_by
                .is_none_or(|user| entry.changed_by() == Some(user))
            && self
                .changed_by_username
                .as_deref()
                .is_none_or(|username| entry.changed_by_username() == Some(username))
            && self.field.is_none_or(|field| entry.field() == field)
            && self
                .old_value
                .as_deref()
                .is_none_or(|value| entry.old_value() == Some(value))
            && self
                .new_value
                .as_deref()
                .is_none_or(|value| entry.new_value() == Some(value))
            && self
                .timestamp_from
                .is_none_or(|from| entry.timestamp() >= from)
            && self.timestamp_to.is_none_or(|to| entry.timestamp() <= to)
    }
}
