//! Task lifecycle with field-level change history.
//!
//! Mutations go through [`services::TaskService`], which snapshots the task,
//! applies the change, diffs the tracked fields and records one history entry
//! per difference inside the same store transaction. The module follows
//! hexagonal architecture:
//!
//! - Domain types in [`domain`]
//! - Port contracts in [`ports`]
//! - Adapter implementations in [`adapters`]
//! - Orchestration services in [`services`]

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod services;
