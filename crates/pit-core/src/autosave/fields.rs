//! Committers for the autosaved text fields.

use std::sync::Arc;

use async_trait::async_trait;

use pit_api::error::ApiError;
use pit_api::models::{ChecklistStatus, Plan, Viewer};
use pit_api::queries::checklists::{self, StatusPatch};
use pit_api::queries::plans::{self, PlanPatch};
use pit_api::transport::Transport;

use super::FieldCommitter;
use crate::error::WorkflowError;
use crate::permissions::{PermissionContext, require, resolve};
use crate::state::dispatch::ensure_structure_editable;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PlanField {
    GeneralObjectives,
}

/// Saves a plan's general objectives.
pub struct PlanObjectives {
    transport: Arc<dyn Transport>,
    plan_id: i64,
}

impl PlanObjectives {
    /// Fails when `viewer` may not edit `plan`; nothing is ever sent then.
    pub fn new(
        transport: Arc<dyn Transport>,
        viewer: &Viewer,
        plan: &Plan,
    ) -> Result<Self, WorkflowError> {
        ensure_structure_editable(viewer, plan)?;
        Ok(Self {
            transport,
            plan_id: plan.id,
        })
    }

    pub fn plan_id(&self) -> i64 {
        self.plan_id
    }
}

#[async_trait]
impl FieldCommitter for PlanObjectives {
    type Field = PlanField;

    async fn commit(&self, field: PlanField, value: String) -> Result<String, ApiError> {
        match field {
            PlanField::GeneralObjectives => {
                let plan =
                    plans::update_plan(self.transport.as_ref(), self.plan_id, &PlanPatch::objectives(value))
                        .await?;
                Ok(plan.general_objectives)
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NotesField {
    StudentNotes,
}

/// Saves the student's notes on a checklist.
pub struct ChecklistNotes {
    transport: Arc<dyn Transport>,
    status_id: i64,
}

impl ChecklistNotes {
    pub fn new(
        transport: Arc<dyn Transport>,
        viewer: &Viewer,
        status: &ChecklistStatus,
    ) -> Result<Self, WorkflowError> {
        let caps = resolve(&PermissionContext::for_checklist(viewer, status, None));
        require(caps.can_edit_notes, "edit checklist notes")?;
        Ok(Self {
            transport,
            status_id: status.id,
        })
    }

    pub fn status_id(&self) -> i64 {
        self.status_id
    }
}

#[async_trait]
impl FieldCommitter for ChecklistNotes {
    type Field = NotesField;

    async fn commit(&self, field: NotesField, value: String) -> Result<String, ApiError> {
        match field {
            NotesField::StudentNotes => {
                let patch = StatusPatch {
                    student_notes: Some(value),
                    ..StatusPatch::default()
                };
                let status =
                    checklists::update_status(self.transport.as_ref(), self.status_id, &patch).await?;
                Ok(status.student_notes)
            }
        }
    }
}
