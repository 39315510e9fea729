//! Plan actions with semantic names.
//!
//! Each function checks the viewer's capabilities and the plan's status
//! locally, sends the request only when both allow it, and returns the plan
//! as the server sees it afterwards.

use tracing::{info, warn};

use pit_api::models::{Plan, PlanStatus, Role, Viewer};
use pit_api::queries::plans::{self as api, GeneratePlanRequest, PlanPatch, TeacherDecision};
use pit_api::transport::Transport;

use super::PlanStateMachine;
use crate::checklist::Readiness;
use crate::error::WorkflowError;
use crate::permissions::{PermissionContext, require, resolve};

/// Shown when a teacher tries to evaluate a plan that is still being drafted.
pub const EVALUATION_TOO_EARLY: &str =
    "Wait for the student to conclude or self-evaluate the plan before recording the evaluation.";

/// Fail unless `viewer` may restructure `plan` (objectives, tasks).
pub fn ensure_structure_editable(viewer: &Viewer, plan: &Plan) -> Result<(), WorkflowError> {
    let ctx = PermissionContext::for_plan(viewer, plan, Readiness::complete());
    if resolve(&ctx).can_edit_structure {
        return Ok(());
    }
    require(
        resolve(&ctx.at_plan_status(PlanStatus::Draft)).can_edit_structure,
        "edit plan",
    )?;
    Err(WorkflowError::NotYet(format!(
        "The plan is {} and can no longer be changed.",
        plan.status
    )))
}

fn log_outcome(action: &str, before: PlanStatus, after: &Plan) {
    if before != after.status && !PlanStateMachine::is_valid_transition(before, after.status) {
        warn!(
            plan_id = after.id,
            from = %before,
            to = %after.status,
            action,
            "server moved plan along an unexpected edge"
        );
    } else {
        info!(plan_id = after.id, status = %after.status, action, "plan updated");
    }
}

/// Submit a draft plan for teacher approval: `draft -> submitted`.
///
/// Only the owner may submit, and only once `readiness` reports nothing
/// mandatory pending.
pub async fn submit_plan(
    transport: &dyn Transport,
    viewer: &Viewer,
    plan: &Plan,
    readiness: Readiness,
) -> Result<Plan, WorkflowError> {
    let ctx = PermissionContext::for_plan(viewer, plan, readiness);
    if !resolve(&ctx).can_submit_plan {
        let as_ready_draft = ctx.at_plan_status(PlanStatus::Draft).when_ready();
        require(resolve(&as_ready_draft).can_submit_plan, "submit plan")?;
        if plan.status != PlanStatus::Draft {
            return Err(WorkflowError::InvalidTransition {
                from: plan.status,
                to: PlanStatus::Submitted,
            });
        }
        readiness.require()?;
    }

    let updated = api::submit_plan(transport, plan.id).await?;
    log_outcome("submit", plan.status, &updated);
    Ok(updated)
}

/// Approve a submitted plan: `submitted -> approved`.
pub async fn approve_plan(
    transport: &dyn Transport,
    viewer: &Viewer,
    plan: &Plan,
) -> Result<Plan, WorkflowError> {
    let ctx = PermissionContext::for_plan(viewer, plan, Readiness::complete());
    if !resolve(&ctx).can_approve_plan {
        let as_submitted = ctx.at_plan_status(PlanStatus::Submitted);
        require(resolve(&as_submitted).can_approve_plan, "approve plan")?;
        return Err(WorkflowError::InvalidTransition {
            from: plan.status,
            to: PlanStatus::Approved,
        });
    }

    let updated = api::teacher_decision(transport, plan.id, TeacherDecision::Approve).await?;
    log_outcome("approve", plan.status, &updated);
    Ok(updated)
}

/// Record the student's self-evaluation. An approved plan becomes
/// `concluded`; later statuses keep their status.
pub async fn record_self_evaluation(
    transport: &dyn Transport,
    viewer: &Viewer,
    plan: &Plan,
    text: &str,
) -> Result<Plan, WorkflowError> {
    let ctx = PermissionContext::for_plan(viewer, plan, Readiness::complete());
    if !resolve(&ctx).can_self_evaluate {
        let as_approved = ctx.at_plan_status(PlanStatus::Approved);
        require(resolve(&as_approved).can_self_evaluate, "record self-evaluation")?;
        return Err(WorkflowError::NotYet(
            "The plan must be approved before it can be self-evaluated.".to_owned(),
        ));
    }

    let updated = api::record_self_evaluation(transport, plan.id, text).await?;
    log_outcome("self_evaluation", plan.status, &updated);
    Ok(updated)
}

/// Record the teacher's evaluation, moving the plan to `evaluated`.
///
/// Plans still in `draft` or `submitted` are refused with
/// [`EVALUATION_TOO_EARLY`] and nothing is sent.
pub async fn record_teacher_evaluation(
    transport: &dyn Transport,
    viewer: &Viewer,
    plan: &Plan,
    text: &str,
) -> Result<Plan, WorkflowError> {
    let ctx = PermissionContext::for_plan(viewer, plan, Readiness::complete());
    if !resolve(&ctx).can_evaluate {
        let as_concluded = ctx.at_plan_status(PlanStatus::Concluded);
        require(resolve(&as_concluded).can_evaluate, "record teacher evaluation")?;
        return Err(WorkflowError::NotYet(EVALUATION_TOO_EARLY.to_owned()));
    }

    let updated = api::record_teacher_evaluation(transport, plan.id, text).await?;
    log_outcome("teacher_evaluation", plan.status, &updated);
    Ok(updated)
}

/// Change the plan's free-text fields while it is still being drafted.
pub async fn update_plan_fields(
    transport: &dyn Transport,
    viewer: &Viewer,
    plan: &Plan,
    patch: &PlanPatch,
) -> Result<Plan, WorkflowError> {
    ensure_structure_editable(viewer, plan)?;
    if patch.is_empty() {
        return Err(WorkflowError::NoOp);
    }
    Ok(api::update_plan(transport, plan.id, patch).await?)
}

/// Generate the plan for a reference date.
///
/// Students may only generate their own plan. Teachers and admins must
/// name the student; the server refuses staff requests without one.
pub async fn generate_plan(
    transport: &dyn Transport,
    viewer: &Viewer,
    request: &GeneratePlanRequest,
) -> Result<Plan, WorkflowError> {
    match viewer.role {
        Role::Student if !viewer.is_superuser => {
            require(
                request.student_id.is_none_or(|id| id == viewer.id),
                "generate a plan for another student",
            )?;
        }
        Role::Guardian if !viewer.is_superuser => {
            return Err(WorkflowError::Forbidden("generate plan".to_owned()));
        }
        _ => {
            if request.student_id.is_none() {
                return Err(WorkflowError::MissingField("student_id"));
            }
        }
    }

    let plan = api::generate_plan(transport, request).await?;
    info!(
        plan_id = plan.id,
        student_class_id = request.student_class_id,
        "plan generated"
    );
    Ok(plan)
}
