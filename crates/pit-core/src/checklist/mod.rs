//! Checklist mark transitions.
//!
//! A mark *displays* `VALIDATED` whenever a teacher has validated it,
//! regardless of its stored `mark_status`. Students move their own marks
//! between the three working states; teachers may also validate.

pub mod tracker;

use pit_api::models::{ChecklistMark, MarkStatus, Role};
use pit_api::queries::checklists::MarkUpdate;

use crate::error::WorkflowError;
use crate::permissions::{PermissionContext, resolve};

pub use tracker::{ChecklistTracker, MarkActivity, start_checklist};

/// State shown for `mark`.
pub fn display_state(mark: &ChecklistMark) -> MarkStatus {
    if mark.teacher_validated {
        MarkStatus::Validated
    } else {
        mark.mark_status.unwrap_or_default()
    }
}

/// A mark counts as done once it is completed or validated.
pub fn is_done(mark: &ChecklistMark) -> bool {
    matches!(
        display_state(mark),
        MarkStatus::Completed | MarkStatus::Validated
    )
}

/// Update to send for an accepted mark change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MarkPatch {
    pub mark_status: MarkStatus,
    /// Only set by teachers.
    pub teacher_validated: Option<bool>,
}

impl MarkPatch {
    /// State the mark will display once the server accepts the patch.
    pub fn resulting_display(&self) -> MarkStatus {
        if self.teacher_validated == Some(true) {
            MarkStatus::Validated
        } else {
            self.mark_status
        }
    }

    pub fn to_update(self) -> MarkUpdate {
        MarkUpdate {
            mark_status: Some(self.mark_status),
            teacher_validated: self.teacher_validated,
            comment: None,
        }
    }
}

/// Why a mark change was refused locally.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MarkRejection {
    /// The viewer may not change this mark at all.
    Forbidden,
    /// A teacher validated the mark; students can no longer change it.
    Locked,
    /// The mark already displays the requested state.
    NoOp,
}

impl From<MarkRejection> for WorkflowError {
    fn from(r: MarkRejection) -> Self {
        match r {
            MarkRejection::Forbidden => Self::Forbidden("change checklist mark".to_owned()),
            MarkRejection::Locked => Self::Locked,
            MarkRejection::NoOp => Self::NoOp,
        }
    }
}

/// Decide what to send when the viewer described by `ctx` picks `target`
/// for `mark`.
pub fn plan_mark_change(
    ctx: &PermissionContext,
    mark: &ChecklistMark,
    target: MarkStatus,
) -> Result<MarkPatch, MarkRejection> {
    let ctx = PermissionContext {
        mark_validated: mark.teacher_validated,
        ..*ctx
    };
    let caps = resolve(&ctx);

    let patch = if caps.can_validate_mark {
        match target {
            MarkStatus::Validated => MarkPatch {
                mark_status: MarkStatus::Completed,
                teacher_validated: Some(true),
            },
            other => MarkPatch {
                mark_status: other,
                teacher_validated: Some(false),
            },
        }
    } else if ctx.role == Role::Student && ctx.is_owner {
        if mark.teacher_validated {
            return Err(MarkRejection::Locked);
        }
        if !caps.can_change_own_mark {
            return Err(MarkRejection::Forbidden);
        }
        let mark_status = match target {
            MarkStatus::Validated => MarkStatus::Completed,
            other => other,
        };
        MarkPatch {
            mark_status,
            teacher_validated: None,
        }
    } else {
        return Err(MarkRejection::Forbidden);
    };

    let current = display_state(mark);
    if target == current || patch.resulting_display() == current {
        return Err(MarkRejection::NoOp);
    }
    Ok(patch)
}

/// Submission readiness of a checklist: every mark is mandatory.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Readiness {
    pub total: usize,
    pub pending: usize,
}

impl Readiness {
    pub fn from_marks(marks: &[ChecklistMark]) -> Self {
        Self {
            total: marks.len(),
            pending: marks.iter().filter(|m| !is_done(m)).count(),
        }
    }

    /// Readiness from externally computed completion counts.
    pub fn from_counts(total: usize, done: usize) -> Self {
        Self {
            total,
            pending: total.saturating_sub(done),
        }
    }

    /// Nothing mandatory left pending.
    pub fn complete() -> Self {
        Self::default()
    }

    pub fn is_ready(&self) -> bool {
        self.pending == 0
    }

    pub fn require(&self) -> Result<(), WorkflowError> {
        if self.is_ready() {
            Ok(())
        } else {
            Err(WorkflowError::NotReady {
                pending: self.pending,
            })
        }
    }
}
