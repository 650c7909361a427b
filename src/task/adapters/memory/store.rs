//! In-memory task and history store for tests and embedding.

use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, RwLock};

use crate::task::{
    domain::{
        HistoryEntryId, HistoryFilter, NewHistoryEntry, Task, TaskDraft, TaskFilter,
        TaskHistoryEntry, TaskId, User, UserId,
    },
    ports::{
        HistoryStore, StoreError, StoreResult, StoreTransaction, TaskStore, TaskUnitOfWork,
        UserDirectory,
    },
};

/// Thread-safe in-memory store.
///
/// A transaction holds the write lock for its whole duration and works on a
/// copy of the state, which replaces the shared state only on success.
#[derive(Debug, Clone, Default)]
pub struct InMemoryTaskStore {
    state: Arc<RwLock<InMemoryState>>,
}

#[derive(Debug, Clone, Default)]
struct InMemoryState {
    tasks: BTreeMap<TaskId, Task>,
    history: Vec<TaskHistoryEntry>,
    users: HashMap<UserId, User>,
    last_task_id: i64,
    last_entry_id: i64,
    last_user_id: i64,
}

impl InMemoryTaskStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a user account so tasks can be assigned to it.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Persistence`] if the state lock is poisoned.
    pub fn register_user(&self, username: impl Into<String>) -> StoreResult<User> {
        let mut state = self.state.write().map_err(|err| {
            StoreError::persistence(std::io::Error::other(err.to_string()))
        })?;
        state.last_user_id += 1;
        let user = User::new(UserId::new(state.last_user_id), username);
        state.users.insert(user.id, user.clone());
        Ok(user)
    }

    fn run<T, E, F>(&self, work: F) -> Result<T, E>
    where
        F: FnOnce(&mut dyn StoreTransaction) -> Result<T, E>,
        E: From<StoreError>,
    {
        let mut shared = self.state.write().map_err(|err| {
            StoreError::persistence(std::io::Error::other(err.to_string()))
        })?;
        let mut working = InMemoryTransaction {
            state: InMemoryState::clone(&shared),
        };
        let value = work(&mut working)?;
        *shared = working.state;
        Ok(value)
    }
}

#[async_trait]
impl TaskUnitOfWork for InMemoryTaskStore {
    async fn transaction<T, E, F>(&self, work: F) -> Result<T, E>
    where
        F: FnOnce(&mut dyn StoreTransaction) -> Result<T, E> + Send + 'static,
        T: Send + 'static,
        E: From<StoreError> + Send + 'static,
    {
        self.run(work)
    }
}

struct InMemoryTransaction {
    state: InMemoryState,
}

impl StoreTransaction for InMemoryTransaction {
    fn tasks(&mut self) -> &mut dyn TaskStore {
        self
    }

    fn history(&mut self) -> &mut dyn HistoryStore {
        self
    }

    fn users(&mut self) -> &mut dyn UserDirectory {
        self
    }
}

impl TaskStore for InMemoryTransaction {
    fn insert(&mut self, draft: &TaskDraft) -> StoreResult<Task> {
        self.state.last_task_id += 1;
        let task = draft.clone().into_task(TaskId::new(self.state.last_task_id));
        self.state.tasks.insert(task.id(), task.clone());
        Ok(task)
    }

    fn find(&mut self, id: TaskId) -> StoreResult<Option<Task>> {
        Ok(self.state.tasks.get(&id).cloned())
    }

    fn find_for_update(&mut self, id: TaskId) -> StoreResult<Option<Task>> {
        // The transaction already holds the exclusive lock.
        self.find(id)
    }

    fn update(&mut self, task: &Task) -> StoreResult<()> {
        let stored = self
            .state
            .tasks
            .get_mut(&task.id())
            .ok_or(StoreError::TaskNotFound(task.id()))?;
        *stored = task.clone();
        Ok(())
    }

    fn delete(&mut self, id: TaskId) -> StoreResult<()> {
        self.state
            .tasks
            .remove(&id)
            .map(|_| ())
            .ok_or(StoreError::TaskNotFound(id))
    }

    fn list_tasks(&mut self, filter: &TaskFilter) -> StoreResult<Vec<Task>> {
        Ok(self
            .state
            .tasks
            .values()
            .filter(|task| filter.matches(task))
            .cloned()
            .collect())
    }
}

impl HistoryStore for InMemoryTransaction {
    fn append(&mut self, entries: &[NewHistoryEntry]) -> StoreResult<Vec<TaskHistoryEntry>> {
        let mut appended = Vec::with_capacity(entries.len());
        for record in entries {
            self.state.last_entry_id += 1;
            let id = HistoryEntryId::new(self.state.last_entry_id);
            let entry = TaskHistoryEntry::from_parts(id, record.clone());
            self.state.history.push(entry.clone());
            appended.push(entry);
        }
        Ok(appended)
    }

    fn list_entries(&mut self, filter: &HistoryFilter) -> StoreResult<Vec<TaskHistoryEntry>> {
        let tasks = &self.state.tasks;
        let mut found: Vec<TaskHistoryEntry> = self
            .state
            .history
            .iter()
            .map(|entry| resolve_task_reference(tasks, entry))
            .filter(|entry| filter.matches(entry))
            .collect();
        found.sort_by_key(|entry| (entry.timestamp(), entry.id()));
        Ok(found)
    }
}

impl UserDirectory for InMemoryTransaction {
    fn find_user(&mut self, id: UserId) -> StoreResult<Option<User>> {
        Ok(self.state.users.get(&id).cloned())
    }
}

/// Clears the live task reference of entries whose task no longer exists,
/// mirroring `ON DELETE SET NULL` without touching the stored entry.
fn resolve_task_reference(
    tasks: &BTreeMap<TaskId, Task>,
    entry: &TaskHistoryEntry,
) -> TaskHistoryEntry {
    match entry.task() {
        Some(id) if !tasks.contains_key(&id) => entry.clone().detached(),
        _ => entry.clone(),
    }
}
