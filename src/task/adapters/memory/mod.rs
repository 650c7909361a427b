//! In-memory adapters for task and history persistence.

mod store;

pub use store::InMemoryTaskStore;
