//! Autosave of plan objectives and checklist notes through the in-memory
//! backend, on a paused clock.

use std::sync::Arc;
use std::time::Duration;

use pit_api::models::{MarkStatus, PlanStatus};
use pit_api::transport::{Method, Transport};
use pit_core::WorkflowError;
use pit_core::autosave::{
    AutosaveConfig, AutosaveCoordinator, ChecklistNotes, NotesField, PlanField, PlanObjectives,
    SaveStatus,
};
use pit_test_utils::FakeBackend;
use pit_test_utils::fixtures;

const STUDENT: i64 = 7;

async fn advance(ms: u64) {
    tokio::time::sleep(Duration::from_millis(ms)).await;
}

fn plan_setup(status: PlanStatus) -> (FakeBackend, Arc<dyn Transport>) {
    let backend = FakeBackend::new();
    backend.seed_plan(fixtures::plan(1, STUDENT, status));
    let transport: Arc<dyn Transport> = Arc::new(backend.clone());
    (backend, transport)
}

fn objectives(
    backend: &FakeBackend,
    transport: Arc<dyn Transport>,
) -> AutosaveCoordinator<PlanObjectives> {
    let plan = backend.plan(1).unwrap();
    let committer = PlanObjectives::new(transport, &fixtures::student(STUDENT), &plan).unwrap();
    let coordinator = AutosaveCoordinator::new(committer, AutosaveConfig::default());
    coordinator.track(PlanField::GeneralObjectives, plan.general_objectives);
    coordinator
}

#[tokio::test(start_paused = true)]
async fn trimmed_value_becomes_baseline_without_resave() {
    let (backend, transport) = plan_setup(PlanStatus::Draft);
    let autosave = objectives(&backend, transport);

    autosave.change(PlanField::GeneralObjectives, "  Ler mais  ");
    assert_eq!(
        autosave.status(PlanField::GeneralObjectives),
        SaveStatus::Saving
    );
    advance(900).await;

    assert_eq!(backend.requests_with(Method::Patch).len(), 1);
    assert_eq!(backend.plan(1).unwrap().general_objectives, "Ler mais");
    assert_eq!(
        autosave.baseline(PlanField::GeneralObjectives).as_deref(),
        Some("Ler mais")
    );
    assert_eq!(autosave.status(PlanField::GeneralObjectives), SaveStatus::Saved);

    // The editor now shows the normalized text; that is not a new edit.
    autosave.change(PlanField::GeneralObjectives, "Ler mais");
    advance(3000).await;
    assert_eq!(backend.requests_with(Method::Patch).len(), 1);
    assert_eq!(autosave.status(PlanField::GeneralObjectives), SaveStatus::Idle);
}

#[tokio::test(start_paused = true)]
async fn rapid_typing_sends_one_request() {
    let (backend, transport) = plan_setup(PlanStatus::Draft);
    let autosave = objectives(&backend, transport);

    for text in ["L", "Le", "Ler", "Ler m", "Ler mais"] {
        autosave.change(PlanField::GeneralObjectives, text);
        advance(200).await;
    }
    advance(1000).await;

    let patches = backend.requests_with(Method::Patch);
    assert_eq!(patches.len(), 1);
    assert_eq!(
        patches[0].body,
        Some(serde_json::json!({ "general_objectives": "Ler mais" }))
    );
}

#[tokio::test(start_paused = true)]
async fn error_status_carries_server_message() {
    let (backend, transport) = plan_setup(PlanStatus::Draft);
    let autosave = objectives(&backend, transport);
    backend.fail_next(Method::Patch, "/pit/plans/1", 400, "Texto demasiado longo.");

    autosave.change(PlanField::GeneralObjectives, "x");
    let status = autosave.flush(PlanField::GeneralObjectives).await;
    assert_eq!(
        status,
        SaveStatus::Error("Texto demasiado longo.".to_owned())
    );
    assert_eq!(
        autosave.baseline(PlanField::GeneralObjectives).as_deref(),
        Some("")
    );
}

#[tokio::test(start_paused = true)]
async fn stale_response_after_reset_is_ignored() {
    let (backend, transport) = plan_setup(PlanStatus::Draft);
    backend.delay("/pit/plans/1", Duration::from_millis(500));
    let autosave = objectives(&backend, transport);

    autosave.change(PlanField::GeneralObjectives, "antigo");
    advance(900).await;
    assert_eq!(backend.requests_with(Method::Patch).len(), 1);

    autosave.reset([(PlanField::GeneralObjectives, "recarregado".to_owned())]);
    advance(1000).await;

    assert_eq!(
        autosave.baseline(PlanField::GeneralObjectives).as_deref(),
        Some("recarregado")
    );
    assert_eq!(autosave.status(PlanField::GeneralObjectives), SaveStatus::Idle);
}

#[tokio::test(start_paused = true)]
async fn locked_plan_refuses_autosave() {
    let (backend, transport) = plan_setup(PlanStatus::Approved);
    let plan = backend.plan(1).unwrap();

    let err = PlanObjectives::new(transport, &fixtures::student(STUDENT), &plan)
        .err()
        .unwrap();
    assert!(matches!(err, WorkflowError::NotYet(_)));
    assert_eq!(backend.request_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn checklist_notes_use_shorter_debounce() {
    let backend = FakeBackend::new();
    backend.seed_status(fixtures::checklist_status(5, STUDENT, &[MarkStatus::NotStarted]));
    let transport: Arc<dyn Transport> = Arc::new(backend.clone());
    let status = backend.status(5).unwrap();

    let committer = ChecklistNotes::new(transport.clone(), &fixtures::student(STUDENT), &status)
        .unwrap();
    let autosave = AutosaveCoordinator::new(committer, AutosaveConfig::notes());
    autosave.track(NotesField::StudentNotes, status.student_notes.clone());

    autosave.change(NotesField::StudentNotes, "Preciso de ajuda em frações ");
    advance(700).await;
    assert_eq!(backend.status(5).unwrap().student_notes, "Preciso de ajuda em frações");
    assert_eq!(autosave.status(NotesField::StudentNotes), SaveStatus::Saved);

    assert!(matches!(
        ChecklistNotes::new(transport, &fixtures::teacher(3), &status),
        Err(WorkflowError::Forbidden(_))
    ));
}
