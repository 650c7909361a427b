//! `PostgreSQL` adapters for task and history persistence.

mod models;
mod repository;
mod schema;

pub use repository::{PostgresTaskStore, SCHEMA_SQL, TaskPgPool};
