//! Port contracts for task and history persistence.
//!
//! Ports define infrastructure-agnostic interfaces used by task services.

pub mod store;

pub use store::{
    HistoryStore, StoreError, StoreResult, StoreTransaction, TaskStore, TaskUnitOfWork,
    UserDirectory,
};
