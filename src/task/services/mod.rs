//! Application services for audited task orchestration.

mod audit;
mod lifecycle;

pub use audit::{AuditRecorder, TaskReference};
pub use lifecycle::{
    CreateTaskRequest, TaskService, TaskServiceError, TaskServiceResult, UpdateTaskRequest,
};
