//! `PostgreSQL` integration tests for the audited task store.

use std::sync::Arc;

use super::helpers::PgHarness;
use mockable::DefaultClock;
use pg_embedded_setup_unpriv::{TestCluster, test_support::shared_test_cluster};
use rstest::rstest;
use task_audit::task::{
    adapters::postgres::SCHEMA_SQL,
    domain::{
        Actor, AuditContext, HistoryFilter, TaskDraft, TaskFilter, TaskName, TrackedField, UserId,
    },
    ports::{StoreError, TaskUnitOfWork},
    services::{CreateTaskRequest, TaskServiceError, UpdateTaskRequest},
};

#[rstest]
fn lifecycle_is_audited_and_survives_deletion(
    shared_test_cluster: &'static TestCluster,
) -> Result<(), eyre::Report> {
    let pg = PgHarness::create(shared_test_cluster)?;
    let alice = pg.seed_user("alice")?;
    let context = AuditContext::for_actor(Actor::from(&alice));

    let created = pg.runtime.block_on(pg.service.create(
        CreateTaskRequest::new("Fix bug")
            .with_description("Crash on login")
            .with_assignee(alice.id),
        &context,
    ))?;
    let updated = pg.runtime.block_on(pg.service.update(
        created.id(),
        UpdateTaskRequest::new()
            .with_status("w_toku")
            .with_description(None),
        &context,
    ))?;
    eyre::ensure!(updated.description().is_none(), "description should be cleared");
    eyre::ensure!(
        pg.runtime.block_on(pg.service.get(created.id()))? == updated,
        "stored task must match the update result"
    );

    pg.runtime
        .block_on(pg.service.delete(created.id(), &context))?;

    let history = pg.runtime.block_on(
        pg.service
            .history(&HistoryFilter::new().with_task_id_snapshot(created.id().value())),
    )?;
    eyre::ensure!(history.len() == 10, "expected 10 entries, found {}", history.len());
    eyre::ensure!(
        history.iter().all(|entry| entry.task().is_none()),
        "deleting the task must clear live references"
    );
    eyre::ensure!(
        history
            .iter()
            .all(|entry| entry.changed_by_username() == Some("alice")),
        "every entry is attributed to alice"
    );
    let status_change = history
        .iter()
        .find(|entry| entry.field() == TrackedField::Status && entry.old_value() == Some("nowy"))
        .ok_or_else(|| eyre::eyre!("missing status change"))?;
    eyre::ensure!(status_change.new_value() == Some("w_toku"), "wrong new status");
    Ok(())
}

#[rstest]
fn failed_unit_of_work_rolls_back(
    shared_test_cluster: &'static TestCluster,
) -> Result<(), eyre::Report> {
    let pg = PgHarness::create(shared_test_cluster)?;
    let draft = TaskDraft::new(TaskName::new("Phantom")?, &DefaultClock);

    let result: Result<(), StoreError> = pg.runtime.block_on(pg.store.transaction(move |tx| {
        let inserted = tx.tasks().insert(&draft)?;
        Err(StoreError::TaskNotFound(inserted.id()))
    }));

    eyre::ensure!(
        matches!(result, Err(StoreError::TaskNotFound(_))),
        "work error must be returned"
    );
    let tasks = pg.runtime.block_on(pg.service.list(&TaskFilter::new()))?;
    eyre::ensure!(tasks.is_empty(), "rolled back insert must not be visible");
    Ok(())
}

#[rstest]
fn unknown_assignee_leaves_no_rows(
    shared_test_cluster: &'static TestCluster,
) -> Result<(), eyre::Report> {
    let pg = PgHarness::create(shared_test_cluster)?;
    let alice = pg.seed_user("alice")?;
    let ghost = UserId::new(alice.id.value() + 1);

    let result = pg.runtime.block_on(pg.service.create(
        CreateTaskRequest::new("Nobody's").with_assignee(ghost),
        &AuditContext::anonymous(),
    ));

    eyre::ensure!(
        matches!(&result, Err(TaskServiceError::Validation(err)) if err.fields() == vec!["assigned_to"]),
        "expected assigned_to violation, got {result:?}"
    );
    let history = pg
        .runtime
        .block_on(pg.service.history(&HistoryFilter::new()))?;
    eyre::ensure!(history.is_empty(), "no entries may be written");
    Ok(())
}

#[rstest]
fn search_treats_like_metacharacters_literally(
    shared_test_cluster: &'static TestCluster,
) -> Result<(), eyre::Report> {
    let pg = PgHarness::create(shared_test_cluster)?;
    let context = AuditContext::anonymous();
    for name in ["100% done", "1000 done", "Under_score"] {
        pg.runtime
            .block_on(pg.service.create(CreateTaskRequest::new(name), &context))?;
    }

    let percent = pg
        .runtime
        .block_on(pg.service.list(&TaskFilter::new().with_search("100%")))?;
    let underscore = pg
        .runtime
        .block_on(pg.service.list(&TaskFilter::new().with_name("UNDER_")))?;

    eyre::ensure!(
        percent.iter().map(|task| task.name().as_str()).collect::<Vec<_>>() == vec!["100% done"],
        "percent sign must match literally"
    );
    eyre::ensure!(underscore.len() == 1, "underscore must match literally");
    Ok(())
}

#[rstest]
fn schema_can_be_applied_repeatedly(
    shared_test_cluster: &'static TestCluster,
) -> Result<(), eyre::Report> {
    let pg = PgHarness::create(shared_test_cluster)?;

    pg.runtime.block_on(pg.store.apply_schema())?;

    eyre::ensure!(SCHEMA_SQL.contains("task_history"), "schema must define history");
    Ok(())
}

#[rstest]
fn search_requires_every_term(
    shared_test_cluster: &'static TestCluster,
) -> Result<(), eyre::Report> {
    let pg = PgHarness::create(shared_test_cluster)?;
    let context = AuditContext::anonymous();
    pg.runtime.block_on(pg.service.create(
        CreateTaskRequest::new("Deploy the api").with_description("Blue-green"),
        &context,
    ))?;
    pg.runtime.block_on(pg.service.create(
        CreateTaskRequest::new("Deploy web").with_description("api gateway"),
        &context,
    ))?;

    let names = |search: &str| -> Result<Vec<String>, eyre::Report> {
        let tasks = pg
            .runtime
            .block_on(pg.service.list(&TaskFilter::new().with_search(search)))?;
        Ok(tasks
            .iter()
            .map(|task| task.name().as_str().to_owned())
            .collect())
    };

    eyre::ensure!(names("deploy api")?.len() == 2, "both tasks mention deploy and api");
    eyre::ensure!(
        names("web, GATEWAY")? == vec!["Deploy web".to_owned()],
        "terms may be found in different columns"
    );
    eyre::ensure!(names("deploy cli")?.is_empty(), "every term must match");
    Ok(())
}

#[rstest]
fn unknown_actor_is_rejected_before_any_write(
    shared_test_cluster: &'static TestCluster,
) -> Result<(), eyre::Report> {
    let pg = PgHarness::create(shared_test_cluster)?;
    let alice = pg.seed_user("alice")?;
    let ghost = UserId::new(alice.id.value() + 1);
    let context = AuditContext::for_actor(Actor::new(ghost, "ghost"));

    let result = pg
        .runtime
        .block_on(pg.service.create(CreateTaskRequest::new("Haunted"), &context));

    eyre::ensure!(
        matches!(
            &result,
            Err(TaskServiceError::InvalidActor { user, reason: "no such user" }) if *user == ghost
        ),
        "expected unknown actor rejection, got {result:?}"
    );
    let tasks = pg.runtime.block_on(pg.service.list(&TaskFilter::new()))?;
    eyre::ensure!(tasks.is_empty(), "no task may be written");
    Ok(())
}

#[rstest]
fn concurrent_renames_form_an_unbroken_chain(
    shared_test_cluster: &'static TestCluster,
) -> Result<(), eyre::Report> {
    let pg = PgHarness::create(shared_test_cluster)?;
    let created = pg.runtime.block_on(
        pg.service
            .create(CreateTaskRequest::new("Rename 0"), &AuditContext::anonymous()),
    )?;
    let id = created.id();

    let handles: Vec<_> = (1..=8)
        .map(|round| {
            let service = Arc::clone(&pg.service);
            pg.runtime.spawn(async move {
                service
                    .update(
                        id,
                        UpdateTaskRequest::new().with_name(format!("Rename {round}")),
                        &AuditContext::anonymous(),
                    )
                    .await
            })
        })
        .collect();
    pg.runtime.block_on(async {
        for handle in handles {
            handle.await??;
        }
        Ok::<(), eyre::Report>(())
    })?;

    let renames = pg.runtime.block_on(
        pg.service.history(
            &HistoryFilter::new()
                .with_task_id_snapshot(id.value())
                .with_field(TrackedField::Name),
        ),
    )?;
    eyre::ensure!(renames.len() == 9, "expected 9 name entries, found {}", renames.len());
    eyre::ensure!(
        renames
            .iter()
            .zip(renames.iter().skip(1))
            .all(|(earlier, later)| later.old_value() == earlier.new_value()),
        "each rename must start from the previous committed name"
    );
    let current = pg.runtime.block_on(pg.service.get(id))?;
    eyre::ensure!(
        renames.last().and_then(|entry| entry.new_value()) == Some(current.name().as_str()),
        "latest entry must describe the stored name"
    );
    Ok(())
}
