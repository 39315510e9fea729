//! Permission resolver.
//!
//! A pure function from (role, ownership, entity state) to the set of
//! actions a viewer may take. Nothing is cached; callers rebuild the context
//! from current data at every decision point.

use pit_api::models::{
    ChecklistMark, ChecklistState, ChecklistStatus, Plan, PlanStatus, Role, Viewer,
};

use crate::checklist::Readiness;
use crate::error::WorkflowError;

/// Inputs to [`resolve`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PermissionContext {
    pub role: Role,
    pub is_superuser: bool,
    /// Viewer is the student who owns the entity.
    pub is_owner: bool,
    pub plan_status: Option<PlanStatus>,
    pub checklist_state: Option<ChecklistState>,
    /// The mark under consideration has been validated by a teacher.
    pub mark_validated: bool,
    /// Every mandatory item is done.
    pub ready: bool,
}

impl PermissionContext {
    pub fn for_plan(viewer: &Viewer, plan: &Plan, readiness: Readiness) -> Self {
        Self {
            role: viewer.role,
            is_superuser: viewer.is_superuser,
            is_owner: plan.is_owned_by(viewer),
            plan_status: Some(plan.status),
            checklist_state: None,
            mark_validated: false,
            ready: readiness.is_ready(),
        }
    }

    /// Context for a checklist, optionally narrowed to one of its marks.
    pub fn for_checklist(
        viewer: &Viewer,
        status: &ChecklistStatus,
        mark: Option<&ChecklistMark>,
    ) -> Self {
        Self {
            role: viewer.role,
            is_superuser: viewer.is_superuser,
            is_owner: status.is_owned_by(viewer),
            plan_status: None,
            checklist_state: Some(status.state),
            mark_validated: mark.is_some_and(|m| m.teacher_validated),
            ready: Readiness::from_marks(&status.marks).is_ready(),
        }
    }

    /// The same viewer facing the entity in `status` instead.
    pub fn at_plan_status(self, status: PlanStatus) -> Self {
        Self {
            plan_status: Some(status),
            ..self
        }
    }

    /// The same viewer with nothing mandatory left pending.
    pub fn when_ready(self) -> Self {
        Self {
            ready: true,
            ..self
        }
    }

    /// Teachers, admins and superusers.
    pub fn is_staff(&self) -> bool {
        self.is_superuser || matches!(self.role, Role::Teacher | Role::Admin)
    }

    fn is_student_owner(&self) -> bool {
        self.role == Role::Student && self.is_owner
    }
}

/// Actions available to a viewer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Capabilities {
    pub can_edit_structure: bool,
    pub can_change_own_mark: bool,
    pub can_validate_mark: bool,
    pub can_submit_plan: bool,
    pub can_evaluate: bool,
    pub can_self_evaluate: bool,
    pub can_approve_plan: bool,
    /// Update task state or evidence.
    pub can_update_task_progress: bool,
    /// Give task feedback or validate a task.
    pub can_review_task: bool,
    pub can_submit_checklist: bool,
    pub can_edit_notes: bool,
}

/// Compute the capability set for `ctx`.
pub fn resolve(ctx: &PermissionContext) -> Capabilities {
    let staff = ctx.is_staff();
    let student_owner = ctx.is_student_owner();

    let plan = ctx.plan_status;
    let past_drafting = plan.is_some_and(|s| !s.is_drafting());

    let checklist = ctx.checklist_state;
    let checklist_open = matches!(
        checklist,
        Some(ChecklistState::Draft | ChecklistState::NeedsRevision)
    );

    Capabilities {
        can_edit_structure: ctx.is_owner && plan.is_some_and(PlanStatus::is_drafting),
        can_submit_plan: ctx.is_owner && plan == Some(PlanStatus::Draft) && ctx.ready,
        can_self_evaluate: ctx.is_owner && past_drafting,
        can_evaluate: staff && past_drafting,
        can_approve_plan: staff && plan == Some(PlanStatus::Submitted),
        can_update_task_progress: plan.is_some()
            && (staff || (ctx.is_owner && plan != Some(PlanStatus::Evaluated))),
        can_review_task: staff && plan.is_some(),
        can_change_own_mark: student_owner && !ctx.mark_validated && checklist_open,
        can_validate_mark: staff && checklist.is_some(),
        can_edit_notes: student_owner && checklist_open,
        can_submit_checklist: student_owner
            && checklist == Some(ChecklistState::Draft)
            && ctx.ready,
    }
}

/// Turn a capability check into a local rejection.
pub(crate) fn require(allowed: bool, action: &str) -> Result<(), WorkflowError> {
    if allowed {
        Ok(())
    } else {
        Err(WorkflowError::Forbidden(action.to_owned()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plan_ctx(role: Role, is_owner: bool, status: PlanStatus, ready: bool) -> PermissionContext {
        PermissionContext {
            role,
            is_superuser: false,
            is_owner,
            plan_status: Some(status),
            checklist_state: None,
            mark_validated: false,
            ready,
        }
    }

    fn checklist_ctx(
        role: Role,
        is_owner: bool,
        state: ChecklistState,
        mark_validated: bool,
    ) -> PermissionContext {
        PermissionContext {
            role,
            is_superuser: false,
            is_owner,
            plan_status: None,
            checklist_state: Some(state),
            mark_validated,
            ready: true,
        }
    }

    #[test]
    fn owner_edits_structure_only_while_drafting() {
        for status in PlanStatus::LIFECYCLE {
            let caps = resolve(&plan_ctx(Role::Student, true, status, true));
            assert_eq!(caps.can_edit_structure, status.is_drafting(), "{status}");
        }
        let caps = resolve(&plan_ctx(Role::Student, false, PlanStatus::Draft, true));
        assert!(!caps.can_edit_structure);
    }

    #[test]
    fn submit_requires_owner_draft_and_readiness() {
        assert!(resolve(&plan_ctx(Role::Student, true, PlanStatus::Draft, true)).can_submit_plan);
        assert!(!resolve(&plan_ctx(Role::Student, true, PlanStatus::Draft, false)).can_submit_plan);
        assert!(
            !resolve(&plan_ctx(Role::Student, true, PlanStatus::Submitted, true)).can_submit_plan
        );
        assert!(!resolve(&plan_ctx(Role::Teacher, false, PlanStatus::Draft, true)).can_submit_plan);
    }

    #[test]
    fn evaluation_only_after_drafting() {
        for status in PlanStatus::LIFECYCLE {
            let teacher = resolve(&plan_ctx(Role::Teacher, false, status, true));
            let student = resolve(&plan_ctx(Role::Student, true, status, true));
            assert_eq!(teacher.can_evaluate, !status.is_drafting(), "{status}");
            assert_eq!(student.can_self_evaluate, !status.is_drafting(), "{status}");
            assert!(!student.can_evaluate);
            assert!(!teacher.can_self_evaluate);
        }
    }

    #[test]
    fn approval_is_staff_on_submitted() {
        assert!(resolve(&plan_ctx(Role::Admin, false, PlanStatus::Submitted, false)).can_approve_plan);
        assert!(!resolve(&plan_ctx(Role::Teacher, false, PlanStatus::Draft, true)).can_approve_plan);
        assert!(
            !resolve(&plan_ctx(Role::Student, true, PlanStatus::Submitted, true)).can_approve_plan
        );
    }

    #[test]
    fn owner_tracks_task_progress_until_evaluated() {
        for status in PlanStatus::LIFECYCLE {
            let owner = resolve(&plan_ctx(Role::Student, true, status, true));
            let teacher = resolve(&plan_ctx(Role::Teacher, false, status, true));
            assert_eq!(
                owner.can_update_task_progress,
                status != PlanStatus::Evaluated,
                "{status}"
            );
            assert!(!owner.can_review_task);
            assert!(teacher.can_update_task_progress);
            assert!(teacher.can_review_task);
        }
        let other = resolve(&plan_ctx(Role::Student, false, PlanStatus::Draft, true));
        assert!(!other.can_update_task_progress);
    }

    #[test]
    fn hypothetical_contexts_change_only_one_input() {
        let ctx = plan_ctx(Role::Student, true, PlanStatus::Evaluated, false);
        assert!(!resolve(&ctx).can_submit_plan);
        assert!(!resolve(&ctx.at_plan_status(PlanStatus::Draft)).can_submit_plan);
        assert!(resolve(&ctx.at_plan_status(PlanStatus::Draft).when_ready()).can_submit_plan);
        assert!(!ctx.when_ready().at_plan_status(PlanStatus::Draft).is_staff());
    }

    #[test]
    fn superuser_counts_as_staff() {
        let mut ctx = plan_ctx(Role::Guardian, false, PlanStatus::Approved, true);
        assert!(!resolve(&ctx).can_evaluate);
        ctx.is_superuser = true;
        assert!(resolve(&ctx).can_evaluate);
    }

    #[test]
    fn guardian_has_no_capabilities() {
        let caps = resolve(&checklist_ctx(Role::Guardian, false, ChecklistState::Draft, false));
        assert_eq!(caps, Capabilities::default());
        let caps = resolve(&plan_ctx(Role::Guardian, false, PlanStatus::Approved, true));
        assert_eq!(caps, Capabilities::default());
    }

    #[test]
    fn validated_mark_is_read_only_for_student() {
        let open = resolve(&checklist_ctx(Role::Student, true, ChecklistState::Draft, false));
        let locked = resolve(&checklist_ctx(Role::Student, true, ChecklistState::Draft, true));
        assert!(open.can_change_own_mark);
        assert!(!locked.can_change_own_mark);
        assert!(!locked.can_validate_mark);
    }

    #[test]
    fn submitted_checklist_freezes_student_edits() {
        let caps = resolve(&checklist_ctx(Role::Student, true, ChecklistState::Submitted, false));
        assert!(!caps.can_change_own_mark);
        assert!(!caps.can_edit_notes);
        assert!(!caps.can_submit_checklist);

        let caps = resolve(&checklist_ctx(
            Role::Student,
            true,
            ChecklistState::NeedsRevision,
            false,
        ));
        assert!(caps.can_change_own_mark);
        assert!(caps.can_edit_notes);
        assert!(!caps.can_submit_checklist);
    }

    #[test]
    fn other_students_cannot_touch_a_checklist() {
        let caps = resolve(&checklist_ctx(Role::Student, false, ChecklistState::Draft, false));
        assert_eq!(caps, Capabilities::default());
    }

    #[test]
    fn teacher_validates_in_any_checklist_state() {
        for state in [
            ChecklistState::Draft,
            ChecklistState::Submitted,
            ChecklistState::Validated,
            ChecklistState::NeedsRevision,
        ] {
            let caps = resolve(&checklist_ctx(Role::Teacher, false, state, true));
            assert!(caps.can_validate_mark);
            assert!(!caps.can_change_own_mark);
        }
    }

    #[test]
    fn require_maps_to_forbidden() {
        assert!(require(true, "x").is_ok());
        assert!(matches!(require(false, "submit plan"), Err(WorkflowError::Forbidden(a)) if a == "submit plan"));
    }
}
