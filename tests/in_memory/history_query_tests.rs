//! In-memory integration tests for the history query surface.

use super::helpers::{Workspace, workspace};
use chrono::{Duration, SecondsFormat};
use rstest::rstest;
use task_audit::task::{
    domain::{HistoryFilter, TrackedField},
    services::{CreateTaskRequest, UpdateTaskRequest},
};

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn history_filters_by_actor_and_field(workspace: Workspace) -> Result<(), eyre::Report> {
    let alice = Workspace::acting_as(&workspace.alice);
    let bob = Workspace::acting_as(&workspace.bob);
    let created = workspace
        .service
        .create(CreateTaskRequest::new("Shared"), &alice)
        .await?;
    workspace
        .service
        .update(
            created.id(),
            UpdateTaskRequest::new().with_status("w_toku"),
            &bob,
        )
        .await?;

    let by_bob = workspace
        .service
        .history(&HistoryFilter::new().with_changed_by(workspace.bob.id))
        .await?;
    let by_alice_name = workspace
        .service
        .history(&HistoryFilter::new().with_changed_by_username("alice"))
        .await?;
    let status_changes = workspace
        .service
        .history(
            &HistoryFilter::new()
                .with_task(created.id())
                .with_field(TrackedField::Status)
                .with_new_value("w_toku"),
        )
        .await?;

    eyre::ensure!(by_bob.len() == 1, "bob wrote one entry, found {}", by_bob.len());
    eyre::ensure!(by_alice_name.len() == 2, "alice wrote two entries");
    eyre::ensure!(
        status_changes
            .iter()
            .map(|entry| entry.old_value())
            .collect::<Vec<_>>()
            == vec![Some("nowy")],
        "expected a single nowy -> w_toku entry"
    );
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn timestamp_bounds_are_inclusive(workspace: Workspace) -> Result<(), eyre::Report> {
    let context = Workspace::acting_as(&workspace.alice);
    let created = workspace
        .service
        .create(CreateTaskRequest::new("Timed"), &context)
        .await?;
    let stamp = created.created_at();
    let exact = stamp.to_rfc3339_opts(SecondsFormat::Nanos, true);

    let inclusive = workspace
        .service
        .history(
            &HistoryFilter::new()
                .with_timestamp_from_str(&exact)
                .with_timestamp_to_str(&exact),
        )
        .await?;
    let after = workspace
        .service
        .history(&HistoryFilter::new().with_timestamp_from(stamp + Duration::seconds(1)))
        .await?;
    let before = workspace
        .service
        .history(&HistoryFilter::new().with_timestamp_to(stamp - Duration::seconds(1)))
        .await?;

    eyre::ensure!(inclusive.len() == 2, "both creation entries fall on the bound");
    eyre::ensure!(after.is_empty(), "no entries after the creation instant");
    eyre::ensure!(before.is_empty(), "no entries before the creation instant");
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn malformed_bounds_do_not_restrict(workspace: Workspace) -> Result<(), eyre::Report> {
    let context = Workspace::acting_as(&workspace.alice);
    workspace
        .service
        .create(CreateTaskRequest::new("Anything"), &context)
        .await?;

    let everything = workspace
        .service
        .history(
            &HistoryFilter::new()
                .with_timestamp_from_str("last tuesday")
                .with_timestamp_to_str("2024-02-30T00:00:00Z"),
        )
        .await?;

    eyre::ensure!(everything.len() == 2, "malformed bounds must be ignored");
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn deleted_task_history_is_found_by_snapshot_only(
    workspace: Workspace,
) -> Result<(), eyre::Report> {
    let context = Workspace::acting_as(&workspace.alice);
    let created = workspace
        .service
        .create(CreateTaskRequest::new("Ephemeral"), &context)
        .await?;
    workspace.service.delete(created.id(), &context).await?;

    let by_task = workspace
        .service
        .history(&HistoryFilter::new().with_task(created.id()))
        .await?;
    let by_snapshot = workspace
        .service
        .history(&HistoryFilter::new().with_task_id_snapshot(created.id().value()))
        .await?;

    eyre::ensure!(by_task.is_empty(), "live reference must be cleared");
    eyre::ensure!(by_snapshot.len() == 6, "found {} entries", by_snapshot.len());
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn history_is_ordered_by_timestamp_then_id(workspace: Workspace) -> Result<(), eyre::Report> {
    let context = Workspace::acting_as(&workspace.alice);
    for name in ["one", "two", "three"] {
        workspace
            .service
            .create(CreateTaskRequest::new(name), &context)
            .await?;
    }

    let history = workspace.service.history(&HistoryFilter::new()).await?;

    let ordered = history.windows(2).all(|pair| match pair {
        [first, second] => (first.timestamp(), first.id()) < (second.timestamp(), second.id()),
        _ => true,
    });
    eyre::ensure!(ordered, "history must be strictly ordered");
    Ok(())
}
