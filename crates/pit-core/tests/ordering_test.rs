//! Task drag-and-drop persisted through the in-memory backend.

use std::sync::Arc;

use pit_api::models::{Plan, PlanStatus, TaskState};
use pit_api::queries::tasks::TaskPatch;
use pit_api::transport::{Method, Transport};
use pit_core::WorkflowError;
use pit_core::ordering::{
    BucketKey, DropTarget, TaskBoard, add_task, move_task, remove_task, update_task,
};
use pit_core::state::PlanTracker;
use pit_test_utils::FakeBackend;
use pit_test_utils::fixtures;

const STUDENT: i64 = 7;
const SECTION_A: BucketKey = BucketKey::Section(1);
const SECTION_B: BucketKey = BucketKey::Section(2);

fn setup(plan: Plan) -> (FakeBackend, PlanTracker) {
    let backend = FakeBackend::new();
    backend.seed_plan(plan.clone());
    let transport: Arc<dyn Transport> = Arc::new(backend.clone());
    let tracker = PlanTracker::new(transport, fixtures::student(STUDENT), plan);
    (backend, tracker)
}

fn ids(plan: &Plan) -> Vec<i64> {
    plan.tasks.iter().map(|t| t.id).collect()
}

fn orders(plan: &Plan) -> Vec<u32> {
    plan.tasks.iter().map(|t| t.order).collect()
}

#[tokio::test]
async fn drag_to_end_of_other_section() {
    let (backend, tracker) = setup(fixtures::board_plan(1, STUDENT));

    let plan = move_task(&tracker, 13, DropTarget::end_of(SECTION_B))
        .await
        .unwrap()
        .unwrap();

    assert_eq!(ids(&plan), vec![11, 12, 14, 15, 13, 16]);
    assert_eq!(orders(&plan), vec![1, 2, 3, 4, 5, 6]);
    assert_eq!(plan.tasks[4].subject, "MAT");

    // Only tasks whose order or subject changed were sent.
    let mut sent: Vec<String> = backend
        .requests_with(Method::Patch)
        .into_iter()
        .map(|r| r.path)
        .collect();
    sent.sort();
    assert_eq!(sent, vec!["/pit/tasks/13", "/pit/tasks/14", "/pit/tasks/15"]);

    let stored = backend.plan(1).unwrap();
    assert_eq!(ids(&stored), ids(&plan));
    assert_eq!(ids(&tracker.plan()), ids(&plan));
}

#[tokio::test]
async fn drop_before_task_in_another_section() {
    let (backend, tracker) = setup(fixtures::board_plan(1, STUDENT));

    let plan = move_task(
        &tracker,
        16,
        DropTarget {
            bucket: SECTION_A,
            before: Some(11),
        },
    )
    .await
    .unwrap()
    .unwrap();

    assert_eq!(ids(&plan), vec![16, 11, 12, 13, 14, 15]);
    assert!(TaskBoard::from_plan(&backend.plan(1).unwrap()).is_contiguous());
}

#[tokio::test]
async fn no_op_drag_sends_nothing() {
    let (backend, tracker) = setup(fixtures::board_plan(1, STUDENT));

    assert!(
        move_task(&tracker, 16, DropTarget::end_of(SECTION_A))
            .await
            .unwrap()
            .is_none()
    );
    assert!(
        move_task(
            &tracker,
            13,
            DropTarget {
                bucket: SECTION_A,
                before: Some(16),
            },
        )
        .await
        .unwrap()
        .is_none()
    );
    assert_eq!(backend.request_count(), 0);
}

#[tokio::test]
async fn failed_reorder_reloads_server_order() {
    let (backend, tracker) = setup(fixtures::board_plan(1, STUDENT));
    backend.fail_next(Method::Patch, "/pit/tasks/15", 500, "boom");

    let err = move_task(&tracker, 13, DropTarget::end_of(SECTION_B))
        .await
        .unwrap_err();
    assert!(matches!(err, WorkflowError::OrderingDesync { .. }));

    // The cache matches the server again, whatever was partly applied.
    assert_eq!(backend.requests_with(Method::Get).len(), 1);
    let stored = backend.plan(1).unwrap();
    assert_eq!(ids(&tracker.plan()), ids(&stored));
    assert_eq!(orders(&tracker.plan()), orders(&stored));
}

#[tokio::test]
async fn failed_reload_restores_snapshot() {
    let (backend, tracker) = setup(fixtures::board_plan(1, STUDENT));
    backend.fail_always(
        Method::Patch,
        "/pit/tasks/13",
        500,
        serde_json::json!({ "detail": "boom" }),
    );
    backend.fail_next(Method::Get, "/pit/plans/1", 503, "unavailable");

    let err = move_task(&tracker, 13, DropTarget::end_of(SECTION_B))
        .await
        .unwrap_err();
    assert!(matches!(err, WorkflowError::OrderingDesync { .. }));
    assert_eq!(ids(&tracker.plan()), vec![11, 12, 13, 14, 15, 16]);
    assert_eq!(tracker.plan().tasks[2].subject, "PT");
}

#[tokio::test]
async fn submitted_plan_cannot_be_reordered() {
    let mut plan = fixtures::board_plan(1, STUDENT);
    plan.status = PlanStatus::Submitted;
    let (backend, tracker) = setup(plan);

    let err = move_task(&tracker, 13, DropTarget::end_of(SECTION_B))
        .await
        .unwrap_err();
    assert!(matches!(err, WorkflowError::NotYet(_)));
    assert_eq!(backend.request_count(), 0);
}

#[tokio::test]
async fn added_task_goes_to_the_end() {
    let (backend, tracker) = setup(fixtures::board_plan(1, STUDENT));

    let task = add_task(&tracker, "Ler em voz alta", SECTION_B).await.unwrap();
    assert_eq!(task.order, 7);
    assert_eq!(task.subject, "MAT");
    assert_eq!(tracker.plan().tasks.last().map(|t| t.id), Some(task.id));
    assert!(TaskBoard::from_plan(&backend.plan(1).unwrap()).is_contiguous());

    assert!(matches!(
        add_task(&tracker, "x", BucketKey::Section(9)).await,
        Err(WorkflowError::UnknownSection(9))
    ));
}

#[tokio::test]
async fn removal_closes_the_gap() {
    let (backend, tracker) = setup(fixtures::board_plan(1, STUDENT));

    let plan = remove_task(&tracker, 12).await.unwrap();
    assert_eq!(ids(&plan), vec![11, 13, 14, 15, 16]);
    assert_eq!(orders(&plan), vec![1, 2, 3, 4, 5]);
    assert_eq!(backend.requests_with(Method::Delete).len(), 1);
    // Tasks 13..16 each moved up by one.
    assert_eq!(backend.requests_with(Method::Patch).len(), 4);
    assert!(TaskBoard::from_plan(&backend.plan(1).unwrap()).is_contiguous());
}

#[tokio::test]
async fn placement_only_changes_through_moves() {
    let (backend, tracker) = setup(fixtures::board_plan(1, STUDENT));

    let err = update_task(&tracker, 11, &TaskPatch::placement(3, "MAT"))
        .await
        .unwrap_err();
    assert!(matches!(err, WorkflowError::Forbidden(_)));

    let patch = TaskPatch {
        description: Some("Ler dois contos".to_owned()),
        ..TaskPatch::default()
    };
    let task = update_task(&tracker, 11, &patch).await.unwrap();
    assert_eq!(task.description, "Ler dois contos");
    assert_eq!(backend.write_count(), 1);
}

#[tokio::test]
async fn owner_reports_progress_until_the_plan_is_evaluated() {
    let mut plan = fixtures::board_plan(1, STUDENT);
    plan.status = PlanStatus::Approved;
    let (backend, tracker) = setup(plan);

    let done = TaskPatch {
        state: Some(TaskState::Done),
        ..TaskPatch::default()
    };
    let task = update_task(&tracker, 11, &done).await.unwrap();
    assert_eq!(task.state, TaskState::Done);

    let validated = TaskPatch {
        state: Some(TaskState::Validated),
        ..TaskPatch::default()
    };
    assert!(matches!(
        update_task(&tracker, 12, &validated).await,
        Err(WorkflowError::Forbidden(_))
    ));

    let mut evaluated = tracker.plan();
    evaluated.status = PlanStatus::Evaluated;
    tracker.apply(evaluated);
    backend.clear_log();
    assert!(matches!(
        update_task(&tracker, 12, &done).await,
        Err(WorkflowError::Forbidden(_))
    ));
    assert_eq!(backend.request_count(), 0);
}
