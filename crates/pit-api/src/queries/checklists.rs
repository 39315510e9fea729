//! Query functions for checklist templates, statuses and marks.

use serde::Serialize;

use crate::error::ApiError;
use crate::models::{ChecklistMark, ChecklistState, ChecklistStatus, ChecklistTemplate, MarkStatus};
use crate::transport::{Method, Transport, get_json, send_json};

use super::{results, with_query};

/// Body of `POST /checklists/statuses`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewChecklistStatus {
    pub template: i64,
    pub student_class: i64,
}

/// Partial update of a checklist status.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StatusPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<ChecklistState>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub student_notes: Option<String>,
}

/// Partial update of one mark.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MarkUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mark_status: Option<MarkStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub teacher_validated: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

/// Fetch every checklist template with its items.
pub async fn list_templates(transport: &dyn Transport) -> Result<Vec<ChecklistTemplate>, ApiError> {
    let value = transport
        .request(Method::Get, "/checklists/templates", None)
        .await?;
    results(value)
}

/// List checklist statuses visible to the caller, optionally for one class.
pub async fn list_statuses(
    transport: &dyn Transport,
    student_class: Option<i64>,
) -> Result<Vec<ChecklistStatus>, ApiError> {
    let path = with_query(
        "/checklists/statuses",
        &[("student_class", student_class.map(|v| v.to_string()))],
    );
    let value = transport.request(Method::Get, &path, None).await?;
    results(value)
}

/// Fetch one checklist status with its marks.
pub async fn get_status(transport: &dyn Transport, id: i64) -> Result<ChecklistStatus, ApiError> {
    get_json(transport, &format!("/checklists/statuses/{id}")).await
}

/// Create (or fetch the existing) status for a template in a class. New
/// statuses start with every mark at `NOT_STARTED`.
pub async fn create_status(
    transport: &dyn Transport,
    request: &NewChecklistStatus,
) -> Result<ChecklistStatus, ApiError> {
    send_json(transport, Method::Post, "/checklists/statuses", request).await
}

/// Partially update a checklist status (state, student notes).
pub async fn update_status(
    transport: &dyn Transport,
    id: i64,
    patch: &StatusPatch,
) -> Result<ChecklistStatus, ApiError> {
    send_json(transport, Method::Patch, &format!("/checklists/statuses/{id}"), patch).await
}

/// Partially update one mark and return it as stored.
pub async fn update_mark(
    transport: &dyn Transport,
    id: i64,
    update: &MarkUpdate,
) -> Result<ChecklistMark, ApiError> {
    send_json(transport, Method::Patch, &format!("/checklists/marks/{id}"), update).await
}
