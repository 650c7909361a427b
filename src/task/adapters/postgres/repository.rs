//! `PostgreSQL` unit of work for task and history storage.

use super::{
    models::{
        HistoryRow, NewHistoryRow, NewTaskRow, TaskChangeset, TaskRow, UserRow, row_to_entry,
        row_to_task,
    },
    schema::{task_history, tasks, users},
};
use crate::task::{
    domain::{
        HistoryFilter, NewHistoryEntry, Task, TaskDraft, TaskFilter, TaskHistoryEntry, TaskId,
        User, UserId,
    },
    ports::{
        HistoryStore, StoreError, StoreResult, StoreTransaction, TaskStore, TaskUnitOfWork,
        UserDirectory,
    },
};
use async_trait::async_trait;
use diesel::connection::SimpleConnection;
use diesel::pg::PgConnection;
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, Pool};

/// `PostgreSQL` connection pool type used by task adapters.
pub type TaskPgPool = Pool<ConnectionManager<PgConnection>>;

/// Schema for the `users`, `tasks` and `task_history` tables.
pub const SCHEMA_SQL: &str =
    include_str!("../../../../migrations/2026-10-01-000000_create_task_tables/up.sql");

/// `PostgreSQL`-backed task and history store.
///
/// Each unit of work runs on one pooled connection inside a database
/// transaction on the blocking thread pool.
#[derive(Debug, Clone)]
pub struct PostgresTaskStore {
    pool: TaskPgPool,
}

impl PostgresTaskStore {
    /// Creates a new store from a `PostgreSQL` connection pool.
    #[must_use]
    pub const fn new(pool: TaskPgPool) -> Self {
        Self { pool }
    }

    /// Returns a reference to the connection pool.
    #[must_use]
    pub const fn pool(&self) -> &TaskPgPool {
        &self.pool
    }

    /// Creates the task tables when they do not exist yet.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Persistence`] when the schema cannot be applied.
    pub async fn apply_schema(&self) -> StoreResult<()> {
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || {
            let mut connection = pool.get().map_err(StoreError::persistence)?;
            connection
                .batch_execute(SCHEMA_SQL)
                .map_err(StoreError::persistence)
        })
        .await
        .map_err(StoreError::persistence)?
    }
}

#[async_trait]
impl TaskUnitOfWork for PostgresTaskStore {
    async fn transaction<T, E, F>(&self, work: F) -> Result<T, E>
    where
        F: FnOnce(&mut dyn StoreTransaction) -> Result<T, E> + Send + 'static,
        T: Send + 'static,
        E: From<StoreError> + Send + 'static,
    {
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || {
            let mut connection = pool.get().map_err(StoreError::persistence)?;
            connection
                .transaction::<T, TransactionFailure<E>, _>(|tx_conn| {
                    let mut tx = PgStoreTransaction {
                        connection: tx_conn,
                    };
                    work(&mut tx).map_err(TransactionFailure::Work)
                })
                .map_err(TransactionFailure::into_inner)
        })
        .await
        .map_err(|err| E::from(StoreError::persistence(err)))?
    }
}

/// Failure inside a Diesel transaction: either the unit of work rejected the
/// operation or the database did.
enum TransactionFailure<E> {
    Work(E),
    Database(diesel::result::Error),
}

impl<E> From<diesel::result::Error> for TransactionFailure<E> {
    fn from(err: diesel::result::Error) -> Self {
        Self::Database(err)
    }
}

impl<E: From<StoreError>> TransactionFailure<E> {
    fn into_inner(self) -> E {
        match self {
            Self::Work(err) => err,
            Self::Database(err) => E::from(StoreError::persistence(err)),
        }
    }
}

struct PgStoreTransaction<'c> {
    connection: &'c mut PgConnection,
}

impl StoreTransaction for PgStoreTransaction<'_> {
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

impl TaskStore for PgStoreTransaction<'_> {
    fn insert(&mut self, draft: &TaskDraft) -> StoreResult<Task> {
        let connection = &mut *self.connection;
        let row = diesel::insert_into(tasks::table)
            .values(&NewTaskRow::from_draft(draft))
            .returning(TaskRow::as_returning())
            .get_result::<TaskRow>(connection)
            .map_err(StoreError::persistence)?;
        row_to_task(row)
    }

    fn find(&mut self, id: TaskId) -> StoreResult<Option<Task>> {
        let connection = &mut *self.connection;
        tasks::table
            .find(id.value())
            .select(TaskRow::as_select())
            .first::<TaskRow>(connection)
            .optional()
            .map_err(StoreError::persistence)?
            .map(row_to_task)
            .transpose()
    }

    fn find_for_update(&mut self, id: TaskId) -> StoreResult<Option<Task>> {
        let connection = &mut *self.connection;
        tasks::table
            .find(id.value())
            .for_update()
            .select(TaskRow::as_select())
            .first::<TaskRow>(connection)
            .optional()
            .map_err(StoreError::persistence)?
            .map(row_to_task)
            .transpose()
    }

    fn update(&mut self, task: &Task) -> StoreResult<()> {
        let connection = &mut *self.connection;
        let updated = diesel::update(tasks::table.find(task.id().value()))
            .set(&TaskChangeset::from_task(task))
            .execute(connection)
            .map_err(StoreError::persistence)?;
        if updated == 0 {
            return Err(StoreError::TaskNotFound(task.id()));
        }
        Ok(())
    }

    fn delete(&mut self, id: TaskId) -> StoreResult<()> {
        let connection = &mut *self.connection;
        let deleted = diesel::delete(tasks::table.find(id.value()))
            .execute(connection)
            .map_err(StoreError::persistence)?;
        if deleted == 0 {
            return Err(StoreError::TaskNotFound(id));
        }
        Ok(())
    }

    fn list_tasks(&mut self, filter: &TaskFilter) -> StoreResult<Vec<Task>> {
        let connection = &mut *self.connection;
        let mut query = tasks::table
            .select(TaskRow::as_select())
            .order(tasks::id.asc())
            .into_boxed();

        if let Some(id) = filter.id {
            query = query.filter(tasks::id.eq(id.value()));
        }
        if let Some(fragment) = filter.name.as_deref() {
            query = query.filter(tasks::name.ilike(contains_pattern(fragment)));
        }
        if let Some(fragment) = filter.description.as_deref() {
            query = query.filter(tasks::description.ilike(contains_pattern(fragment)));
        }
        if let Some(status) = filter.status {
            query = query.filter(tasks::status.eq(status.as_str()));
        }
        if let Some(user) = filter.assigned_to {
            query = query.filter(tasks::assigned_to.eq(user.value()));
        }
        for term in filter.search_terms() {
            let pattern = contains_pattern(term);
            query = query.filter(
                tasks::name
                    .ilike(pattern.clone())
                    .or(tasks::description.assume_not_null().ilike(pattern)),
            );
        }

        query
            .load::<TaskRow>(connection)
            .map_err(StoreError::persistence)?
            .into_iter()
            .map(row_to_task)
            .collect()
    }
}

impl HistoryStore for PgStoreTransaction<'_> {
    fn append(&mut self, entries: &[NewHistoryEntry]) -> StoreResult<Vec<TaskHistoryEntry>> {
        if entries.is_empty() {
            return Ok(Vec::new());
        }
        let connection = &mut *self.connection;
        let rows: Vec<NewHistoryRow> = entries.iter().map(NewHistoryRow::from_entry).collect();
        diesel::insert_into(task_history::table)
            .values(&rows)
            .returning(HistoryRow::as_returning())
            .get_results::<HistoryRow>(connection)
            .map_err(StoreError::persistence)?
            .into_iter()
            .map(row_to_entry)
            .collect()
    }

    fn list_entries(&mut self, filter: &HistoryFilter) -> StoreResult<Vec<TaskHistoryEntry>> {
        let connection = &mut *self.connection;
        let mut query = task_history::table
            .select(HistoryRow::as_select())
            .order((task_history::recorded_at.asc(), task_history::id.asc()))
            .into_boxed();

        if let Some(task) = filter.task {
            query = query.filter(task_history::task_id.eq(task.value()));
        }
        if let Some(snapshot) = filter.task_id_snapshot {
            query = query.filter(task_history::task_id_snapshot.eq(snapshot));
        }
        if let Some(user) = filter.changed_by {
            query = query.filter(task_history::changed_by.eq(user.value()));
        }
        if let Some(username) = filter.changed_by_username.as_deref() {
            query = query.filter(task_history::changed_by_username.eq(username.to_owned()));
        }
        if let Some(field) = filter.field {
            query = query.filter(task_history::field.eq(field.as_str()));
        }
        if let Some(value) = filter.old_value.as_deref() {
            query = query.filter(task_history::old_value.eq(value.to_owned()));
        }
        if let Some(value) = filter.new_value.as_deref() {
            query = query.filter(task_history::new_value.eq(value.to_owned()));
        }
        if let Some(from) = filter.timestamp_from {
            query = query.filter(task_history::recorded_at.ge(from));
        }
        if let Some(to) = filter.timestamp_to {
            query = query.filter(task_history::recorded_at.le(to));
        }

        query
            .load::<HistoryRow>(connection)
            .map_err(StoreError::persistence)?
            .into_iter()
            .map(row_to_entry)
            .collect()
    }
}

impl UserDirectory for PgStoreTransaction<'_> {
    fn find_user(&mut self, id: UserId) -> StoreResult<Option<User>> {
        let connection = &mut *self.connection;
        let row = users::table
            .find(id.value())
            .select(UserRow::as_select())
            .first::<UserRow>(connection)
            .optional()
            .map_err(StoreError::persistence)?;
        Ok(row.map(User::from))
    }
}

/// Builds an `ILIKE` pattern matching `fragment` anywhere, with `LIKE`
/// metacharacters in the fragment taken literally.
pub(super) fn contains_pattern(fragment: &str) -> String {
    let mut pattern = String::with_capacity(fragment.len() + 2);
    pattern.push('%');
    for ch in fragment.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(ch);
    }
    pattern.push('%');
    pattern
}
