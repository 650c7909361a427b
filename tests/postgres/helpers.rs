//! Shared harness for `PostgreSQL` integration tests.

use std::sync::Arc;

use diesel::connection::SimpleConnection;
use diesel::prelude::*;
use diesel::sql_types::{BigInt, Text};
use mockable::DefaultClock;
use pg_embedded_setup_unpriv::TestCluster;
use task_audit::config::StoreConfig;
use task_audit::task::{
    adapters::postgres::{PostgresTaskStore, SCHEMA_SQL},
    domain::{User, UserId},
    services::TaskService,
};
use tokio::runtime::Runtime;
use uuid::Uuid;

/// Template database holding the migrated schema.
pub const TEMPLATE_DB: &str = "task_audit_test_template";

/// Service type used across `PostgreSQL` integration tests.
pub type PgService = TaskService<PostgresTaskStore, DefaultClock>;

/// Drops a per-test database when the test finishes, including on panic.
pub struct DatabaseGuard {
    cluster: &'static TestCluster,
    name: String,
}

impl Drop for DatabaseGuard {
    fn drop(&mut self) {
        drop(self.cluster.drop_database(self.name.as_str()));
    }
}

/// A fresh database with a store, a service and a runtime to drive them.
///
/// Fields drop in declaration order, so every pooled connection is closed
/// before the database itself is dropped.
pub struct PgHarness {
    pub runtime: Runtime,
    pub store: PostgresTaskStore,
    pub service: Arc<PgService>,
    _database: DatabaseGuard,
}

#[derive(QueryableByName)]
struct InsertedId {
    #[diesel(sql_type = BigInt)]
    id: i64,
}

impl PgHarness {
    /// Clones the template into a new database and connects to it.
    ///
    /// # Errors
    ///
    /// Returns an error if the template, the database or the pool cannot be
    /// prepared.
    pub fn create(cluster: &'static TestCluster) -> Result<Self, eyre::Report> {
        ensure_template(cluster)?;
        let name = format!("task_audit_{}", Uuid::new_v4().simple());
        cluster
            .create_database_from_template(name.as_str(), TEMPLATE_DB)
            .map_err(|err| eyre::eyre!("failed to create {name}: {err}"))?;
        let url = cluster.connection().database_url(&name);
        let database = DatabaseGuard { cluster, name };

        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .enable_all()
            .build()?;
        let mut config = StoreConfig::new(url);
        config.max_connections = 4;
        let store = config.connect()?;
        let service = Arc::new(TaskService::new(
            Arc::new(store.clone()),
            Arc::new(DefaultClock),
        ));
        Ok(Self {
            runtime,
            store,
            service,
            _database: database,
        })
    }

    /// Inserts a user account directly, as the authentication subsystem would.
    ///
    /// # Errors
    ///
    /// Returns an error if the insert fails.
    pub fn seed_user(&self, username: &str) -> Result<User, eyre::Report> {
        let mut connection = self.store.pool().get()?;
        let inserted: InsertedId =
            diesel::sql_query("INSERT INTO users (username) VALUES ($1) RETURNING id")
                .bind::<Text, _>(username)
                .get_result(&mut connection)?;
        Ok(User::new(UserId::new(inserted.id), username))
    }
}

/// Creates the template database with the schema applied, once per cluster.
fn ensure_template(cluster: &TestCluster) -> Result<(), eyre::Report> {
    cluster
        .ensure_template_exists(TEMPLATE_DB, |db_name| {
            let url = cluster.connection().database_url(db_name);
            let mut connection =
                PgConnection::establish(&url).map_err(|err| eyre::eyre!("{err}"))?;
            connection
                .batch_execute(SCHEMA_SQL)
                .map_err(|err| eyre::eyre!("schema migration failed: {err}"))?;
            Ok(())
        })
        .map_err(|err| eyre::eyre!("template setup failed: {err}"))
}
