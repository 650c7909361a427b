//! Concurrent mutation tests for the in-memory unit of work.

use std::sync::Arc;

use super::helpers::{Workspace, workspace};
use rstest::rstest;
use task_audit::task::{
    domain::{AuditContext, TaskHistoryEntry, TrackedField},
    services::{CreateTaskRequest, UpdateTaskRequest},
};

#[rstest]
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_renames_form_an_unbroken_chain(
    workspace: Workspace,
) -> Result<(), eyre::Report> {
    let context = Arc::new(Workspace::acting_as(&workspace.alice));
    let created = workspace
        .service
        .create(CreateTaskRequest::new("v0"), &context)
        .await?;

    let mut handles = Vec::new();
    for version in 1..=16 {
        let service = Arc::clone(&workspace.service);
        let task_context = Arc::clone(&context);
        let id = created.id();
        handles.push(tokio::spawn(async move {
            service
                .update(
                    id,
                    UpdateTaskRequest::new().with_name(format!("v{version}")),
                    &task_context,
                )
                .await
        }));
    }
    for handle in handles {
        handle.await??;
    }

    let mut renames: Vec<TaskHistoryEntry> = workspace
        .history_of(created.id())
        .await?
        .into_iter()
        .filter(|entry| entry.field() == TrackedField::Name)
        .collect();
    renames.sort_by_key(TaskHistoryEntry::id);

    eyre::ensure!(renames.len() == 17, "expected 17 name entries, got {}", renames.len());
    let chained = renames.windows(2).all(|pair| match pair {
        [earlier, later] => earlier.new_value() == later.old_value(),
        _ => true,
    });
    eyre::ensure!(chained, "every rename must start from the previous value");
    let current = workspace.service.get(created.id()).await?;
    let last = renames
        .last()
        .ok_or_else(|| eyre::eyre!("expected rename entries"))?;
    eyre::ensure!(
        last.new_value() == Some(current.name().as_str()),
        "latest entry must match the stored name"
    );
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_creates_each_get_their_own_entries(
    workspace: Workspace,
) -> Result<(), eyre::Report> {
    let mut handles = Vec::new();
    for index in 0..12 {
        let service = Arc::clone(&workspace.service);
        handles.push(tokio::spawn(async move {
            service
                .create(
                    CreateTaskRequest::new(format!("task {index}")),
                    &AuditContext::anonymous(),
                )
                .await
        }));
    }
    let mut ids = Vec::new();
    for handle in handles {
        ids.push(handle.await??.id());
    }
    ids.sort();
    ids.dedup();

    eyre::ensure!(ids.len() == 12, "task identifiers must be unique");
    for id in ids {
        let entries = workspace.history_of(id).await?;
        eyre::ensure!(entries.len() == 2, "task {id} has {} entries", entries.len());
    }
    let extra = workspace.store.register_user("carol")?;
    eyre::ensure!(extra.username == "carol", "store still usable after concurrent writes");
    Ok(())
}
