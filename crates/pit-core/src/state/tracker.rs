//! Cached plan with a pending-action indicator.

use std::fmt;
use std::sync::Arc;

use tokio::sync::watch;

use pit_api::models::{Plan, Viewer};
use pit_api::queries::plans::{self as api, PlanPatch};
use pit_api::transport::Transport;

use super::dispatch;
use crate::checklist::Readiness;
use crate::error::WorkflowError;
use crate::permissions::{Capabilities, PermissionContext, resolve};

/// A plan action awaiting its server response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlanAction {
    Submit,
    Approve,
    SelfEvaluate,
    TeacherEvaluate,
    UpdateFields,
}

impl fmt::Display for PlanAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Submit => "submit",
            Self::Approve => "approve",
            Self::SelfEvaluate => "self_evaluate",
            Self::TeacherEvaluate => "teacher_evaluate",
            Self::UpdateFields => "update_fields",
        };
        f.write_str(s)
    }
}

/// Holds the last plan the server returned.
///
/// Status changes are never applied optimistically: the cached plan only
/// changes when a response arrives. While requests are in flight,
/// [`PlanTracker::pending`] reports the most recent one still running.
pub struct PlanTracker {
    transport: Arc<dyn Transport>,
    viewer: Viewer,
    plan: watch::Sender<Plan>,
    pending: watch::Sender<Vec<PlanAction>>,
}

impl PlanTracker {
    /// Track `plan` as fetched elsewhere.
    pub fn new(transport: Arc<dyn Transport>, viewer: Viewer, plan: Plan) -> Self {
        let (plan, _) = watch::channel(plan);
        let (pending, _) = watch::channel(Vec::new());
        Self {
            transport,
            viewer,
            plan,
            pending,
        }
    }

    /// Fetch plan `id` and track it.
    pub async fn load(
        transport: Arc<dyn Transport>,
        viewer: Viewer,
        id: i64,
    ) -> Result<Self, WorkflowError> {
        let plan = api::get_plan(transport.as_ref(), id).await?;
        Ok(Self::new(transport, viewer, plan))
    }

    /// Snapshot of the cached plan.
    pub fn plan(&self) -> Plan {
        self.plan.borrow().clone()
    }

    pub fn viewer(&self) -> &Viewer {
        &self.viewer
    }

    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }

    /// Watch the cached plan.
    pub fn subscribe(&self) -> watch::Receiver<Plan> {
        self.plan.subscribe()
    }

    /// Most recent action still waiting for its response.
    pub fn pending(&self) -> Option<PlanAction> {
        self.pending.borrow().last().copied()
    }

    /// Capabilities of the viewer on the cached plan.
    pub fn capabilities(&self, readiness: Readiness) -> Capabilities {
        resolve(&PermissionContext::for_plan(
            &self.viewer,
            &self.plan.borrow(),
            readiness,
        ))
    }

    /// Replace the cached plan with a server copy obtained elsewhere.
    pub fn apply(&self, plan: Plan) {
        self.plan.send_replace(plan);
    }

    /// Reload the plan and replace the cached copy.
    pub async fn refetch(&self) -> Result<Plan, WorkflowError> {
        let id = self.plan.borrow().id;
        let plan = api::get_plan(self.transport.as_ref(), id).await?;
        self.plan.send_replace(plan.clone());
        Ok(plan)
    }

    fn begin(&self, action: PlanAction) -> Plan {
        self.pending.send_modify(|actions| actions.push(action));
        self.plan()
    }

    fn finish(
        &self,
        action: PlanAction,
        result: Result<Plan, WorkflowError>,
    ) -> Result<Plan, WorkflowError> {
        self.pending.send_modify(|actions| {
            if let Some(pos) = actions.iter().position(|a| *a == action) {
                actions.remove(pos);
            }
        });
        let updated = result?;
        self.plan.send_replace(updated.clone());
        Ok(updated)
    }

    /// See [`dispatch::submit_plan`].
    pub async fn submit(&self, readiness: Readiness) -> Result<Plan, WorkflowError> {
        let plan = self.begin(PlanAction::Submit);
        let result =
            dispatch::submit_plan(self.transport.as_ref(), &self.viewer, &plan, readiness).await;
        self.finish(PlanAction::Submit, result)
    }

    /// See [`dispatch::approve_plan`].
    pub async fn approve(&self) -> Result<Plan, WorkflowError> {
        let plan = self.begin(PlanAction::Approve);
        let result = dispatch::approve_plan(self.transport.as_ref(), &self.viewer, &plan).await;
        self.finish(PlanAction::Approve, result)
    }

    /// See [`dispatch::record_self_evaluation`].
    pub async fn record_self_evaluation(&self, text: &str) -> Result<Plan, WorkflowError> {
        let plan = self.begin(PlanAction::SelfEvaluate);
        let result =
            dispatch::record_self_evaluation(self.transport.as_ref(), &self.viewer, &plan, text)
                .await;
        self.finish(PlanAction::SelfEvaluate, result)
    }

    /// See [`dispatch::record_teacher_evaluation`].
    pub async fn record_teacher_evaluation(&self, text: &str) -> Result<Plan, WorkflowError> {
        let plan = self.begin(PlanAction::TeacherEvaluate);
        let result =
            dispatch::record_teacher_evaluation(self.transport.as_ref(), &self.viewer, &plan, text)
                .await;
        self.finish(PlanAction::TeacherEvaluate, result)
    }

    /// See [`dispatch::update_plan_fields`].
    pub async fn update_fields(&self, patch: &PlanPatch) -> Result<Plan, WorkflowError> {
        let plan = self.begin(PlanAction::UpdateFields);
        let result =
            dispatch::update_plan_fields(self.transport.as_ref(), &self.viewer, &plan, patch).await;
        self.finish(PlanAction::UpdateFields, result)
    }
}
