//! Task tracking with a field-level audit trail.
//!
//! Every create, update and delete of a task runs as one atomic unit of work
//! that also appends one history entry per changed field, attributed to the
//! acting user. History survives task deletion.
//!
//! # Architecture
//!
//! The crate follows hexagonal architecture principles:
//!
//! - **Domain**: tasks, snapshots, change detection and history records
//! - **Ports**: task, history and user capabilities plus the unit of work
//! - **Adapters**: in-memory and `PostgreSQL` stores
//!
//! # Modules
//!
//! - [`task`]: task lifecycle and audit recording
//! - [`config`]: environment-driven store configuration
//! - [`telemetry`]: tracing subscriber setup

pub mod config;
pub mod task;
pub mod telemetry;
