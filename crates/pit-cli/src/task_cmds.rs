//! CLI handlers for `pit task` subcommands.

use anyhow::{Context as _, Result};

use pit_api::models::TaskState;
use pit_api::queries::tasks::TaskPatch;
use pit_core::ordering::{self, BucketKey, DropTarget, TaskBoard};
use pit_core::state::PlanTracker;

use crate::TaskCommands;
use crate::context::{Context, user_error};

pub async fn run_task_command(command: TaskCommands, ctx: &Context) -> Result<()> {
    match command {
        TaskCommands::Add {
            plan_id,
            description,
            section,
        } => {
            let tracker = load(ctx, plan_id).await?;
            let bucket = section.map_or(BucketKey::Unassigned, BucketKey::Section);
            let task = ordering::add_task(&tracker, &description, bucket)
                .await
                .map_err(user_error)?;
            println!("Task #{} added at position {}.", task.id, task.order);
            Ok(())
        }
        TaskCommands::Move {
            plan_id,
            task_id,
            section,
            unassigned,
            before,
        } => cmd_move(ctx, plan_id, task_id, section, unassigned, before).await,
        TaskCommands::Remove { plan_id, task_id } => {
            let tracker = load(ctx, plan_id).await?;
            ordering::remove_task(&tracker, task_id)
                .await
                .map_err(user_error)?;
            println!("Task #{task_id} removed.");
            Ok(())
        }
        TaskCommands::SetState {
            plan_id,
            task_id,
            state,
        } => {
            let state: TaskState = state
                .parse()
                .with_context(|| format!("unknown task state {state:?}"))?;
            let tracker = load(ctx, plan_id).await?;
            let patch = TaskPatch {
                state: Some(state),
                ..TaskPatch::default()
            };
            let task = ordering::update_task(&tracker, task_id, &patch)
                .await
                .map_err(user_error)?;
            println!("Task #{} is {}.", task.id, task.state);
            Ok(())
        }
    }
}

async fn load(ctx: &Context, plan_id: i64) -> Result<PlanTracker> {
    PlanTracker::load(ctx.transport.clone(), ctx.viewer, plan_id)
        .await
        .map_err(user_error)
}

async fn cmd_move(
    ctx: &Context,
    plan_id: i64,
    task_id: i64,
    section: Option<i64>,
    unassigned: bool,
    before: Option<i64>,
) -> Result<()> {
    let tracker = load(ctx, plan_id).await?;

    let bucket = match (section, unassigned) {
        (Some(id), _) => BucketKey::Section(id),
        (None, true) => BucketKey::Unassigned,
        (None, false) => {
            let board = TaskBoard::from_plan(&tracker.plan());
            let task = board
                .task(task_id)
                .ok_or(pit_core::WorkflowError::UnknownTask(task_id))
                .map_err(user_error)?;
            board.bucket_of(task)
        }
    };

    match ordering::move_task(&tracker, task_id, DropTarget { bucket, before })
        .await
        .map_err(user_error)?
    {
        Some(plan) => {
            let order = plan
                .tasks
                .iter()
                .find(|t| t.id == task_id)
                .map(|t| t.order)
                .unwrap_or_default();
            println!("Task #{task_id} moved to position {order}.");
        }
        None => println!("Task #{task_id} is already there."),
    }
    Ok(())
}
