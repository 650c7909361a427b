//! Store ports for task state, the history log and user lookup.
//!
//! The three capabilities are separate traits, but they are only ever
//! reached through a [`StoreTransaction`] handed out by a
//! [`TaskUnitOfWork`]. Everything done through one transaction commits or
//! rolls back together.

use crate::task::domain::{
    HistoryFilter, NewHistoryEntry, Task, TaskDraft, TaskFilter, TaskHistoryEntry, TaskId, User,
    UserId,
};
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Durable current state of tasks.
pub trait TaskStore {
    /// Persists a draft and returns the task with its assigned identifier.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Persistence`] when the write fails.
    fn insert(&mut self, draft: &TaskDraft) -> StoreResult<Task>;

    /// Finds a task by identifier.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Persistence`] when the lookup fails.
    fn find(&mut self, id: TaskId) -> StoreResult<Option<Task>>;

    /// Finds a task and locks it for the rest of the transaction.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Persistence`] when the lookup fails.
    fn find_for_update(&mut self, id: TaskId) -> StoreResult<Option<Task>>;

    /// Overwrites the stored state of an existing task.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::TaskNotFound`] when the task does not exist.
    fn update(&mut self, task: &Task) -> StoreResult<()>;

    /// Removes a task permanently.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::TaskNotFound`] when the task does not exist.
    fn delete(&mut self, id: TaskId) -> StoreResult<()>;

    /// Lists tasks matching `filter`, ordered by identifier.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Persistence`] when the query fails.
    fn list_tasks(&mut self, filter: &TaskFilter) -> StoreResult<Vec<Task>>;
}

/// Append-only log of field-level task changes.
pub trait HistoryStore {
    /// Appends entries in order and returns them with assigned identifiers.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Persistence`] when the write fails.
    fn append(&mut self, entries: &[NewHistoryEntry]) -> StoreResult<Vec<TaskHistoryEntry>>;

    /// Lists entries matching `filter`, ordered by timestamp then identifier.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Persistence`] when the query fails.
    fn list_entries(&mut self, filter: &HistoryFilter) -> StoreResult<Vec<TaskHistoryEntry>>;
}

/// Read-only view of user accounts.
pub trait UserDirectory {
    /// Finds a user by identifier.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Persistence`] when the lookup fails.
    fn find_user(&mut self, id: UserId) -> StoreResult<Option<User>>;
}

/// Capabilities available inside one atomic transaction.
pub trait StoreTransaction {
    /// Task state capability.
    fn tasks(&mut self) -> &mut dyn TaskStore;

    /// History log capability.
    fn history(&mut self) -> &mut dyn HistoryStore;

    /// User lookup capability.
    fn users(&mut self) -> &mut dyn UserDirectory;
}

/// Runs units of work atomically against the task and history stores.
#[async_trait]
pub trait TaskUnitOfWork: Send + Sync {
    /// Runs `work` inside one transaction.
    ///
    /// The transaction commits when `work` returns `Ok` and rolls back,
    /// leaving both stores untouched, when it returns `Err`.
    ///
    /// # Errors
    ///
    /// Returns the error produced by `work`, or a [`StoreError`] converted
    /// into `E` when the transaction itself cannot be started or committed.
    async fn transaction<T, E, F>(&self, work: F) -> Result<T, E>
    where
        F: FnOnce(&mut dyn StoreTransaction) -> Result<T, E> + Send + 'static,
        T: Send + 'static,
        E: From<StoreError> + Send + 'static;
}

/// Errors returned by store implementations.
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    /// The task was not found.
    #[error("task not found: {0}")]
    TaskNotFound(TaskId),

    /// Persistence-layer failure.
    #[error("persistence error: {0}")]
    Persistence(Arc<dyn std::error::Error + Send + Sync>),
}

impl StoreError {
    /// Wraps a persistence error.
    pub fn persistence(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Persistence(Arc::new(err))
    }
}
