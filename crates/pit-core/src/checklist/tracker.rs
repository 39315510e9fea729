//! Cached checklist with per-mark request tracking.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::watch;
use tracing::{debug, info, warn};

use pit_api::models::{ChecklistMark, ChecklistState, ChecklistStatus, MarkStatus, Role, Viewer};
use pit_api::queries::checklists::{self as api, NewChecklistStatus, StatusPatch};
use pit_api::transport::Transport;

use super::{Readiness, plan_mark_change};
use crate::error::WorkflowError;
use crate::permissions::{Capabilities, PermissionContext, require, resolve};

/// Request state of one mark.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum MarkActivity {
    #[default]
    Idle,
    Pending,
    Failed(String),
}

/// A checklist status held in a watch channel, updated only from server
/// responses.
///
/// Marks are independent: a failed or slow update on one mark never blocks
/// another.
pub struct ChecklistTracker {
    transport: Arc<dyn Transport>,
    viewer: Viewer,
    status: watch::Sender<ChecklistStatus>,
    activity: watch::Sender<HashMap<i64, MarkActivity>>,
}

impl ChecklistTracker {
    /// Track `status` as fetched elsewhere.
    pub fn new(transport: Arc<dyn Transport>, viewer: Viewer, status: ChecklistStatus) -> Self {
        let (status, _) = watch::channel(status);
        let (activity, _) = watch::channel(HashMap::new());
        Self {
            transport,
            viewer,
            status,
            activity,
        }
    }

    /// Fetch checklist status `id` and track it.
    pub async fn load(
        transport: Arc<dyn Transport>,
        viewer: Viewer,
        id: i64,
    ) -> Result<Self, WorkflowError> {
        let status = api::get_status(transport.as_ref(), id).await?;
        Ok(Self::new(transport, viewer, status))
    }

    /// Snapshot of the cached status.
    pub fn status(&self) -> ChecklistStatus {
        self.status.borrow().clone()
    }

    /// Watch the cached status.
    pub fn subscribe(&self) -> watch::Receiver<ChecklistStatus> {
        self.status.subscribe()
    }

    /// Watch per-mark request state. Idle marks are absent.
    pub fn subscribe_activity(&self) -> watch::Receiver<HashMap<i64, MarkActivity>> {
        self.activity.subscribe()
    }

    /// Request state of one mark.
    pub fn activity(&self, mark_id: i64) -> MarkActivity {
        self.activity
            .borrow()
            .get(&mark_id)
            .cloned()
            .unwrap_or_default()
    }

    /// Mandatory items still pending in the cached status.
    pub fn readiness(&self) -> Readiness {
        Readiness::from_marks(&self.status.borrow().marks)
    }

    /// Capabilities for the checklist, or for one of its marks.
    pub fn capabilities(&self, mark_id: Option<i64>) -> Capabilities {
        let status = self.status.borrow();
        let mark = mark_id.and_then(|id| status.mark(id));
        resolve(&PermissionContext::for_checklist(&self.viewer, &status, mark))
    }

    fn set_activity(&self, mark_id: i64, activity: MarkActivity) {
        self.activity.send_modify(|map| {
            if activity == MarkActivity::Idle {
                map.remove(&mark_id);
            } else {
                map.insert(mark_id, activity);
            }
        });
    }

    /// Move one mark to `target`.
    ///
    /// Rejected changes (forbidden, locked, no-op) send nothing. On success
    /// the returned mark replaces the cached one, and the whole status is
    /// refetched to pick up the server-computed completion percentage.
    pub async fn set_mark(
        &self,
        mark_id: i64,
        target: MarkStatus,
    ) -> Result<ChecklistMark, WorkflowError> {
        let patch = {
            let status = self.status.borrow();
            let mark = status
                .mark(mark_id)
                .ok_or(WorkflowError::UnknownMark(mark_id))?;
            let ctx = PermissionContext::for_checklist(&self.viewer, &status, Some(mark));
            plan_mark_change(&ctx, mark, target)?
        };

        debug!(mark_id, %target, "updating checklist mark");
        self.set_activity(mark_id, MarkActivity::Pending);

        let update = patch.to_update();
        let updated = match api::update_mark(self.transport.as_ref(), mark_id, &update).await {
            Ok(mark) => mark,
            Err(e) => {
                warn!(mark_id, error = %e, "mark update failed");
                self.set_activity(mark_id, MarkActivity::Failed(e.user_message()));
                return Err(e.into());
            }
        };

        self.status.send_modify(|status| {
            if let Some(slot) = status.marks.iter_mut().find(|m| m.id == mark_id) {
                *slot = updated.clone();
            }
        });
        self.set_activity(mark_id, MarkActivity::Idle);
        self.refetch().await;

        Ok(updated)
    }

    /// Reload the status from the server. Failures keep the cached copy.
    pub async fn refetch(&self) {
        let id = self.status.borrow().id;
        match api::get_status(self.transport.as_ref(), id).await {
            Ok(fresh) => {
                self.status.send_replace(fresh);
            }
            Err(e) => warn!(checklist_id = id, error = %e, "checklist refetch failed"),
        }
    }

    /// Submit the checklist for teacher review.
    ///
    /// Only the owning student may submit a draft checklist, and only once
    /// every mark is done.
    pub async fn submit(&self) -> Result<ChecklistStatus, WorkflowError> {
        let id = {
            let status = self.status.borrow();
            let ctx = PermissionContext::for_checklist(&self.viewer, &status, None);
            if !resolve(&ctx).can_submit_checklist {
                require(resolve(&ctx.when_ready()).can_submit_checklist, "submit checklist")?;
                Readiness::from_marks(&status.marks).require()?;
            }
            status.id
        };

        let patch = StatusPatch {
            state: Some(ChecklistState::Submitted),
            student_notes: None,
        };
        let updated = api::update_status(self.transport.as_ref(), id, &patch).await?;
        info!(checklist_id = id, state = %updated.state, "checklist submitted");
        self.status.send_replace(updated.clone());
        Ok(updated)
    }

    /// Apply a status that was saved elsewhere (e.g. by notes autosave).
    pub fn apply(&self, status: ChecklistStatus) {
        self.status.send_replace(status);
    }
}

/// Create the viewer's checklist for `template` in `student_class`.
///
/// Only students own checklists. The server returns the existing status if
/// one was already started.
pub async fn start_checklist(
    transport: Arc<dyn Transport>,
    viewer: Viewer,
    template: i64,
    student_class: i64,
) -> Result<ChecklistTracker, WorkflowError> {
    require(viewer.role == Role::Student, "start checklist")?;
    let status = api::create_status(
        transport.as_ref(),
        &NewChecklistStatus {
            template,
            student_class,
        },
    )
    .await?;
    info!(checklist_id = status.id, template, "checklist started");
    Ok(ChecklistTracker::new(transport, viewer, status))
}
