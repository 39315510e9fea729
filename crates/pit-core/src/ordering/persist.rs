//! Sending task changes and reconciling the cached plan.
//!
//! A move is applied to the cached plan speculatively, then one partial
//! update per changed task is sent concurrently. If every update succeeds
//! the server copies replace the speculative ones. If any fails, the
//! speculative order is thrown away and the plan is refetched; when even
//! the refetch fails, the pre-move snapshot is restored.

use futures::future::join_all;
use tracing::{debug, info, warn};

use pit_api::error::ApiError;
use pit_api::models::{Plan, PlanTask, TaskState};
use pit_api::queries::tasks::{self as api, NewTask, TaskPatch};
use pit_api::transport::Transport;

use super::{BucketKey, DropTarget, TaskBoard, TaskChange};
use crate::checklist::Readiness;
use crate::error::WorkflowError;
use crate::permissions::{PermissionContext, require, resolve};
use crate::state::PlanTracker;
use crate::state::dispatch::ensure_structure_editable;

async fn send_changes(
    transport: &dyn Transport,
    changes: &[TaskChange],
) -> Result<Vec<PlanTask>, ApiError> {
    let updates = changes.iter().map(|c| {
        let patch = TaskPatch::placement(c.order, c.subject.clone());
        async move { api::update_task(transport, c.id, &patch).await }
    });
    join_all(updates).await.into_iter().collect()
}

/// Replace tasks of `plan` with server copies and restore global order.
fn merge_confirmed(plan: &mut Plan, confirmed: Vec<PlanTask>) {
    for task in confirmed {
        if let Some(slot) = plan.tasks.iter_mut().find(|t| t.id == task.id) {
            *slot = task;
        }
    }
    plan.tasks.sort_by_key(|t| t.order);
}

async fn resync(tracker: &PlanTracker, snapshot: Plan, source: ApiError) -> WorkflowError {
    warn!(plan_id = snapshot.id, error = %source, "task order update failed, reloading plan");
    if let Err(e) = tracker.refetch().await {
        warn!(plan_id = snapshot.id, error = %e, "plan reload failed, restoring previous order");
        tracker.apply(snapshot);
    }
    WorkflowError::OrderingDesync { source }
}

/// Persist a planned reorder on top of `speculative`.
async fn commit(
    tracker: &PlanTracker,
    snapshot: Plan,
    mut speculative: Plan,
    changes: &[TaskChange],
) -> Result<Plan, WorkflowError> {
    tracker.apply(speculative.clone());
    match send_changes(tracker.transport().as_ref(), changes).await {
        Ok(confirmed) => {
            merge_confirmed(&mut speculative, confirmed);
            tracker.apply(speculative.clone());
            Ok(speculative)
        }
        Err(e) => Err(resync(tracker, snapshot, e).await),
    }
}

/// Drop `task_id` on `target` and save the new order.
///
/// Returns `Ok(None)` without sending anything when the drop changes
/// nothing.
pub async fn move_task(
    tracker: &PlanTracker,
    task_id: i64,
    target: DropTarget,
) -> Result<Option<Plan>, WorkflowError> {
    let snapshot = tracker.plan();
    ensure_structure_editable(tracker.viewer(), &snapshot)?;

    let board = TaskBoard::from_plan(&snapshot);
    let Some(reorder) = board.plan_move(task_id, target)? else {
        debug!(plan_id = snapshot.id, task_id, "drop changes nothing");
        return Ok(None);
    };

    debug!(
        plan_id = snapshot.id,
        task_id,
        changed = reorder.changes.len(),
        "saving task move"
    );
    let mut speculative = snapshot.clone();
    speculative.tasks = reorder.tasks;
    let plan = commit(tracker, snapshot, speculative, &reorder.changes).await?;
    info!(plan_id = plan.id, task_id, "task moved");
    Ok(Some(plan))
}

/// Append a task to the end of the plan, in `bucket`.
pub async fn add_task(
    tracker: &PlanTracker,
    description: &str,
    bucket: BucketKey,
) -> Result<PlanTask, WorkflowError> {
    let plan = tracker.plan();
    ensure_structure_editable(tracker.viewer(), &plan)?;

    let board = TaskBoard::from_plan(&plan);
    let request = NewTask {
        plan: plan.id,
        description: description.to_owned(),
        subject: board.subject_for(bucket)?,
        order: board.next_order(),
        state: None,
    };
    let task = api::create_task(tracker.transport().as_ref(), &request).await?;
    info!(plan_id = plan.id, task_id = task.id, order = task.order, "task added");

    let mut updated = plan;
    updated.tasks.push(task.clone());
    updated.tasks.sort_by_key(|t| t.order);
    tracker.apply(updated);
    Ok(task)
}

/// Delete a task and close the gap in the order sequence.
pub async fn remove_task(tracker: &PlanTracker, task_id: i64) -> Result<Plan, WorkflowError> {
    let snapshot = tracker.plan();
    ensure_structure_editable(tracker.viewer(), &snapshot)?;

    let reorder = TaskBoard::from_plan(&snapshot).plan_removal(task_id)?;
    api::delete_task(tracker.transport().as_ref(), task_id).await?;
    info!(plan_id = snapshot.id, task_id, "task removed");

    let mut speculative = snapshot.clone();
    speculative.tasks = reorder.tasks;
    if reorder.changes.is_empty() {
        tracker.apply(speculative.clone());
        return Ok(speculative);
    }
    // The deletion itself is done; the snapshot to fall back on no longer
    // contains the task.
    let mut fallback = snapshot;
    fallback.tasks.retain(|t| t.id != task_id);
    commit(tracker, fallback, speculative, &reorder.changes).await
}

/// Update a task's content or progress.
///
/// Placement (`order`, `subject`) only changes through [`move_task`].
/// Description edits follow the plan's structural lock. Progress and
/// evidence may be updated by the owner until the plan is evaluated.
/// Teachers give feedback and validate tasks.
pub async fn update_task(
    tracker: &PlanTracker,
    task_id: i64,
    patch: &TaskPatch,
) -> Result<PlanTask, WorkflowError> {
    let plan = tracker.plan();
    let viewer = tracker.viewer();
    if !plan.tasks.iter().any(|t| t.id == task_id) {
        return Err(WorkflowError::UnknownTask(task_id));
    }
    if patch.is_empty() {
        return Err(WorkflowError::NoOp);
    }
    require(
        patch.order.is_none() && patch.subject.is_none(),
        "change task placement outside a move",
    )?;

    let caps = resolve(&PermissionContext::for_plan(viewer, &plan, Readiness::complete()));
    if patch.description.is_some() {
        ensure_structure_editable(viewer, &plan)?;
    }
    if patch.teacher_feedback.is_some() || patch.state == Some(TaskState::Validated) {
        require(caps.can_review_task, "give task feedback")?;
    }
    if patch.state.is_some() || patch.evidence_link.is_some() {
        require(caps.can_update_task_progress, "update task progress")?;
    }

    let task = api::update_task(tracker.transport().as_ref(), task_id, patch).await?;
    debug!(plan_id = plan.id, task_id, state = %task.state, "task updated");

    let mut updated = plan;
    merge_confirmed(&mut updated, vec![task.clone()]);
    tracker.apply(updated);
    Ok(task)
}
