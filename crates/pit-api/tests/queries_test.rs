//! Query functions against the in-memory backend.

use pit_api::models::{MarkStatus, PlanStatus, Role};
use pit_api::queries::checklists::{self, MarkUpdate, NewChecklistStatus};
use pit_api::queries::plans::{self, GeneratePlanRequest, PlanFilter, PlanPatch};
use pit_api::queries::tasks::{self, NewTask, TaskPatch};
use pit_api::transport::Method;
use pit_test_utils::{FakeBackend, fixtures};

#[tokio::test]
async fn list_plans_accepts_paginated_envelope() {
    let backend = FakeBackend::new();
    backend.seed_plan(fixtures::plan(1, 3, PlanStatus::Draft));
    backend.seed_plan(fixtures::plan(2, 4, PlanStatus::Draft));

    let all = plans::list_plans(&backend, &PlanFilter::default()).await.unwrap();
    assert_eq!(all.len(), 2);

    let mine = plans::list_plans(
        &backend,
        &PlanFilter {
            student: Some(4),
            ..PlanFilter::default()
        },
    )
    .await
    .unwrap();
    assert_eq!(mine.len(), 1);
    assert_eq!(backend.requests()[1].path, "/pit/plans?student=4");
}

#[tokio::test]
async fn patch_sends_only_changed_fields() {
    let backend = FakeBackend::new();
    backend.seed_plan(fixtures::plan(1, 3, PlanStatus::Draft));

    let plan = plans::update_plan(&backend, 1, &PlanPatch::objectives("  Ler mais  "))
        .await
        .unwrap();
    assert_eq!(plan.general_objectives, "Ler mais");
    let body = backend.requests()[0].body.clone().unwrap();
    assert_eq!(body, serde_json::json!({"general_objectives": "  Ler mais  "}));
}

#[tokio::test]
async fn generate_creates_draft_with_sections() {
    let backend = FakeBackend::new();
    backend.set_me(fixtures::user(3, Role::Student));
    backend.set_plan_sections(vec![fixtures::section(1, "Português", Some("PT"), 1)]);

    let plan = plans::generate_plan(
        &backend,
        &GeneratePlanRequest {
            student_class_id: fixtures::CLASS_ID,
            student_id: None,
            target_date: None,
        },
    )
    .await
    .unwrap();
    assert_eq!(plan.status, PlanStatus::Draft);
    assert_eq!(plan.owner_id(), Some(3));
    assert_eq!(plan.sections.len(), 1);
}

#[tokio::test]
async fn task_create_update_delete() {
    let backend = FakeBackend::new();
    backend.seed_plan(fixtures::plan(1, 3, PlanStatus::Draft));

    let task = tasks::create_task(
        &backend,
        &NewTask {
            plan: 1,
            description: "Ler".into(),
            subject: String::new(),
            order: 1,
            state: None,
        },
    )
    .await
    .unwrap();
    let updated = tasks::update_task(&backend, task.id, &TaskPatch::placement(1, "PT"))
        .await
        .unwrap();
    assert_eq!(updated.subject, "PT");
    tasks::delete_task(&backend, task.id).await.unwrap();
    assert!(backend.plan(1).unwrap().tasks.is_empty());
}

#[tokio::test]
async fn start_checklist_creates_not_started_marks() {
    let backend = FakeBackend::new();
    backend.set_me(fixtures::user(3, Role::Student));
    backend.seed_template(fixtures::template(9, 3));

    let templates = checklists::list_templates(&backend).await.unwrap();
    assert_eq!(templates.len(), 1);

    let status = checklists::create_status(
        &backend,
        &NewChecklistStatus {
            template: 9,
            student_class: fixtures::CLASS_ID,
        },
    )
    .await
    .unwrap();
    assert_eq!(status.marks.len(), 3);
    assert!(
        status
            .marks
            .iter()
            .all(|m| m.mark_status == Some(MarkStatus::NotStarted))
    );

    let listed = checklists::list_statuses(&backend, Some(fixtures::CLASS_ID))
        .await
        .unwrap();
    assert_eq!(listed.len(), 1);
}

#[tokio::test]
async fn mark_update_returns_normalized_mark() {
    let backend = FakeBackend::new();
    backend.seed_status(fixtures::checklist_status(
        2,
        3,
        &[MarkStatus::Completed, MarkStatus::NotStarted],
    ));

    let mark = checklists::update_mark(
        &backend,
        21,
        &MarkUpdate {
            mark_status: Some(MarkStatus::InProgress),
            teacher_validated: Some(true),
            comment: None,
        },
    )
    .await
    .unwrap();
    assert_eq!(mark.mark_status, Some(MarkStatus::InProgress));
    assert!(!mark.teacher_validated);
    assert_eq!(backend.requests_with(Method::Patch).len(), 1);
}
