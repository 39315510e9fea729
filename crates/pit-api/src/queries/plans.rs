//! Query functions for work plans.

use chrono::NaiveDate;
use serde::Serialize;
use serde_json::json;

use crate::error::ApiError;
use crate::models::{Plan, PlanStatus};
use crate::transport::{Method, Transport, get_json, send_json};

use super::{results, with_query};

/// Partial update of a plan's free-text fields.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PlanPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub general_objectives: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub period_label: Option<String>,
}

impl PlanPatch {
    /// Patch that only replaces the general objectives.
    pub fn objectives(text: impl Into<String>) -> Self {
        Self {
            general_objectives: Some(text.into()),
            ..Self::default()
        }
    }

    /// `true` when no field is set.
    pub fn is_empty(&self) -> bool {
        self.general_objectives.is_none() && self.period_label.is_none()
    }
}

/// Body of `POST /pit/plans/generate`.
///
/// `student_id` may be left out only by a student generating their own
/// plan; staff must always name the student.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GeneratePlanRequest {
    pub student_class_id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub student_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_date: Option<NaiveDate>,
}

/// Filter for [`list_plans`].
#[derive(Debug, Clone, Default)]
pub struct PlanFilter {
    pub student: Option<i64>,
    pub student_class: Option<i64>,
    pub status: Option<PlanStatus>,
}

/// Teacher decision on a submitted plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TeacherDecision {
    Approve,
}

/// Fetch one plan with its sections, tasks and suggestions.
pub async fn get_plan(transport: &dyn Transport, id: i64) -> Result<Plan, ApiError> {
    get_json(transport, &format!("/pit/plans/{id}")).await
}

/// List the plans visible to the caller, narrowed by `filter`.
pub async fn list_plans(transport: &dyn Transport, filter: &PlanFilter) -> Result<Vec<Plan>, ApiError> {
    let path = with_query(
        "/pit/plans",
        &[
            ("student", filter.student.map(|v| v.to_string())),
            ("student_class", filter.student_class.map(|v| v.to_string())),
            ("status", filter.status.map(|v| v.to_string())),
        ],
    );
    let value = transport.request(Method::Get, &path, None).await?;
    results(value)
}

/// Partially update a plan's free-text fields.
pub async fn update_plan(
    transport: &dyn Transport,
    id: i64,
    patch: &PlanPatch,
) -> Result<Plan, ApiError> {
    send_json(transport, Method::Patch, &format!("/pit/plans/{id}"), patch).await
}

/// Generate a plan for the request's reference date. The server answers with
/// the created (or already existing) plan.
pub async fn generate_plan(
    transport: &dyn Transport,
    request: &GeneratePlanRequest,
) -> Result<Plan, ApiError> {
    send_json(transport, Method::Post, "/pit/plans/generate", request).await
}

/// Submit a draft plan for approval.
pub async fn submit_plan(transport: &dyn Transport, id: i64) -> Result<Plan, ApiError> {
    send_json(transport, Method::Post, &format!("/pit/plans/{id}/submit"), &json!({})).await
}

/// Record a teacher's decision on a submitted plan.
pub async fn teacher_decision(
    transport: &dyn Transport,
    id: i64,
    decision: TeacherDecision,
) -> Result<Plan, ApiError> {
    send_json(
        transport,
        Method::Post,
        &format!("/pit/plans/{id}/teacher-decision"),
        &json!({ "decision": decision }),
    )
    .await
}

/// Store the student's self-evaluation.
pub async fn record_self_evaluation(
    transport: &dyn Transport,
    id: i64,
    text: &str,
) -> Result<Plan, ApiError> {
    send_json(
        transport,
        Method::Post,
        &format!("/pit/plans/{id}/self-evaluation"),
        &json!({ "self_evaluation": text }),
    )
    .await
}

/// Store the teacher's evaluation.
pub async fn record_teacher_evaluation(
    transport: &dyn Transport,
    id: i64,
    text: &str,
) -> Result<Plan, ApiError> {
    send_json(
        transport,
        Method::Post,
        &format!("/pit/plans/{id}/teacher-evaluation"),
        &json!({ "teacher_evaluation": text }),
    )
    .await
}
