//! Given steps for task audit BDD scenarios.

use super::world::{TaskAuditWorld, run_async};
use eyre::WrapErr;
use rstest_bdd_macros::given;
use task_audit::task::services::CreateTaskRequest;

#[given(r#"a user "{username}""#)]
fn a_user(world: &mut TaskAuditWorld, username: String) -> Result<(), eyre::Report> {
    let user = world
        .store
        .register_user(username.clone())
        .wrap_err("register scenario user")?;
    world.users.insert(username, user);
    Ok(())
}

#[given(r#""{username}" has created a task named "{name}""#)]
fn user_has_created_task(
    world: &mut TaskAuditWorld,
    username: String,
    name: String,
) -> Result<(), eyre::Report> {
    let context = world.context_for(&username)?;
    let created = run_async(world.service.create(CreateTaskRequest::new(name), &context))
        .wrap_err("create task in scenario setup")?;
    world.task = Some(created);
    Ok(())
}
