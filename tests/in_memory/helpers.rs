//! Shared fixtures for in-memory task audit integration tests.

use std::sync::Arc;

use mockable::DefaultClock;
use rstest::fixture;
use task_audit::task::{
    adapters::memory::InMemoryTaskStore,
    domain::{Actor, AuditContext, HistoryFilter, TaskHistoryEntry, TaskId, User},
    services::TaskService,
};

/// Service type used across in-memory integration tests.
pub type TestService = TaskService<InMemoryTaskStore, DefaultClock>;

/// A service over a fresh store with two registered users.
pub struct Workspace {
    pub store: InMemoryTaskStore,
    pub service: Arc<TestService>,
    pub alice: User,
    pub bob: User,
}

impl Workspace {
    /// Audit context acting as `user`.
    #[must_use]
    pub fn acting_as(user: &User) -> AuditContext {
        AuditContext::for_actor(Actor::from(user))
    }

    /// Every entry ever recorded for `id`, including those of deleted tasks.
    ///
    /// # Errors
    ///
    /// Returns an error if the history query fails.
    pub async fn history_of(&self, id: TaskId) -> Result<Vec<TaskHistoryEntry>, eyre::Report> {
        Ok(self
            .service
            .history(&HistoryFilter::new().with_task_id_snapshot(id.value()))
            .await?)
    }
}

/// Provides a fresh workspace for each test.
#[fixture]
pub fn workspace() -> Workspace {
    let store = InMemoryTaskStore::new();
    let alice = store.register_user("alice").expect("register alice");
    let bob = store.register_user("bob").expect("register bob");
    let service = Arc::new(TaskService::new(
        Arc::new(store.clone()),
        Arc::new(DefaultClock),
    ));
    Workspace {
        store,
        service,
        alice,
        bob,
    }
}
