//! Query functions for plan tasks.

use serde::Serialize;

use crate::error::ApiError;
use crate::models::{PlanTask, TaskState};
use crate::transport::{Method, Transport, delete, send_json};

/// Body of `POST /pit/tasks`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewTask {
    pub plan: i64,
    pub description: String,
    pub subject: String,
    pub order: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<TaskState>,
}

/// Partial update of a task.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TaskPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<TaskState>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub teacher_feedback: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub evidence_link: Option<String>,
}

impl TaskPatch {
    /// Placement update produced by a reorder.
    pub fn placement(order: u32, subject: impl Into<String>) -> Self {
        Self {
            order: Some(order),
            subject: Some(subject.into()),
            ..Self::default()
        }
    }

    /// `true` when no field is set.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Create a task in a plan.
pub async fn create_task(transport: &dyn Transport, task: &NewTask) -> Result<PlanTask, ApiError> {
    send_json(transport, Method::Post, "/pit/tasks", task).await
}

/// Partially update a task and return it as stored.
pub async fn update_task(
    transport: &dyn Transport,
    id: i64,
    patch: &TaskPatch,
) -> Result<PlanTask, ApiError> {
    send_json(transport, Method::Patch, &format!("/pit/tasks/{id}"), patch).await
}

/// Delete a task. Remaining tasks keep their orders.
pub async fn delete_task(transport: &dyn Transport, id: i64) -> Result<(), ApiError> {
    delete(transport, &format!("/pit/tasks/{id}")).await
}
