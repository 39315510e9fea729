//! End-to-end tests for the `pit` binary against the fake backend served
//! over HTTP.

use std::process::Output;

use tokio::process::Command;

use pit_api::models::{ChecklistState, MarkStatus, PlanStatus, Role};
use pit_test_utils::fixtures;
use pit_test_utils::{FakeBackend, TestServer, serve};

const STUDENT: i64 = 7;
const TEACHER: i64 = 3;
const TOKEN: &str = "cli-token";

struct Harness {
    server: TestServer,
    config_home: tempfile::TempDir,
}

impl Harness {
    async fn new(me: i64, role: Role) -> Self {
        let backend = FakeBackend::new();
        backend.set_me(fixtures::user(me, role));
        Self {
            server: serve(backend, TOKEN).await,
            config_home: tempfile::TempDir::new().unwrap(),
        }
    }

    fn backend(&self) -> &FakeBackend {
        &self.server.backend
    }

    async fn pit(&self, args: &[&str]) -> Output {
        Command::new(env!("CARGO_BIN_EXE_pit"))
            .args(args)
            .env("PIT_API_URL", self.server.base_url())
            .env("PIT_TOKEN", TOKEN)
            .env_remove("PIT_REFRESH_TOKEN")
            .env("XDG_CONFIG_HOME", self.config_home.path())
            .env("RUST_LOG", "off")
            .output()
            .await
            .expect("failed to run pit")
    }
}

fn stdout(out: &Output) -> String {
    String::from_utf8_lossy(&out.stdout).into_owned()
}

fn stderr(out: &Output) -> String {
    String::from_utf8_lossy(&out.stderr).into_owned()
}

#[tokio::test]
async fn whoami_shows_role() {
    let h = Harness::new(STUDENT, Role::Student).await;
    let out = h.pit(&["whoami"]).await;
    assert!(out.status.success(), "stderr: {}", stderr(&out));
    let text = stdout(&out);
    assert!(text.contains("user7"), "unexpected output: {text}");
    assert!(text.contains("aluno"), "unexpected output: {text}");
}

#[tokio::test]
async fn plan_show_groups_tasks_by_section() {
    let h = Harness::new(STUDENT, Role::Student).await;
    h.backend().seed_plan(fixtures::board_plan(1, STUDENT));

    let out = h.pit(&["plan", "show", "1"]).await;
    assert!(out.status.success(), "stderr: {}", stderr(&out));
    let text = stdout(&out);
    assert!(text.contains("Português (PT)"));
    assert!(text.contains("Unassigned"));
    assert!(text.contains("Actions: edit, submit"));
}

#[tokio::test]
async fn student_submits_and_teacher_approves() {
    let h = Harness::new(STUDENT, Role::Student).await;
    h.backend().seed_plan(fixtures::plan(1, STUDENT, PlanStatus::Draft));

    let out = h.pit(&["plan", "submit", "1"]).await;
    assert!(out.status.success(), "stderr: {}", stderr(&out));
    assert_eq!(h.backend().plan(1).unwrap().status, PlanStatus::Submitted);

    h.backend().set_me(fixtures::user(TEACHER, Role::Teacher));
    let out = h.pit(&["plan", "approve", "1"]).await;
    assert!(out.status.success(), "stderr: {}", stderr(&out));
    assert_eq!(h.backend().plan(1).unwrap().status, PlanStatus::Approved);
}

#[tokio::test]
async fn submit_blocked_by_pending_checklist() {
    let h = Harness::new(STUDENT, Role::Student).await;
    h.backend().seed_plan(fixtures::plan(1, STUDENT, PlanStatus::Draft));
    h.backend().seed_status(fixtures::checklist_status(
        5,
        STUDENT,
        &[MarkStatus::Completed, MarkStatus::InProgress],
    ));

    let out = h.pit(&["plan", "submit", "1", "--checklist", "5"]).await;
    assert!(!out.status.success());
    assert!(stderr(&out).contains("1 mandatory item(s) still pending"));
    assert_eq!(h.backend().plan(1).unwrap().status, PlanStatus::Draft);
}

#[tokio::test]
async fn task_move_rewrites_subject() {
    let h = Harness::new(STUDENT, Role::Student).await;
    h.backend().seed_plan(fixtures::board_plan(1, STUDENT));

    let out = h.pit(&["task", "move", "1", "13", "--section", "2"]).await;
    assert!(out.status.success(), "stderr: {}", stderr(&out));
    assert!(stdout(&out).contains("moved to position 5"));

    let plan = h.backend().plan(1).unwrap();
    let task = plan.tasks.iter().find(|t| t.id == 13).unwrap();
    assert_eq!(task.subject, "MAT");
    assert_eq!(task.order, 5);
}

#[tokio::test]
async fn validated_mark_cannot_be_reopened_by_student() {
    let h = Harness::new(STUDENT, Role::Student).await;
    h.backend()
        .seed_status(fixtures::checklist_status(5, STUDENT, &[MarkStatus::Validated]));
    h.backend().clear_log();

    let out = h.pit(&["checklist", "mark", "5", "51", "in_progress"]).await;
    assert!(!out.status.success());
    assert!(stderr(&out).contains("validated by a teacher"));
    assert_eq!(h.backend().write_count(), 0);
}

#[tokio::test]
async fn notes_are_saved_trimmed() {
    let h = Harness::new(STUDENT, Role::Student).await;
    h.backend()
        .seed_status(fixtures::checklist_status(5, STUDENT, &[MarkStatus::NotStarted]));

    let out = h.pit(&["checklist", "notes", "5", " Preciso de ajuda "]).await;
    assert!(out.status.success(), "stderr: {}", stderr(&out));
    assert!(stdout(&out).contains("Notes saved."));
    let status = h.backend().status(5).unwrap();
    assert_eq!(status.student_notes, "Preciso de ajuda");
    assert_eq!(status.state, ChecklistState::Draft);
}

#[tokio::test]
async fn missing_token_is_reported() {
    let h = Harness::new(STUDENT, Role::Student).await;
    let out = Command::new(env!("CARGO_BIN_EXE_pit"))
        .args(["whoami"])
        .env("PIT_API_URL", h.server.base_url())
        .env_remove("PIT_TOKEN")
        .env("XDG_CONFIG_HOME", h.config_home.path())
        .output()
        .await
        .unwrap();
    assert!(!out.status.success());
    assert!(stderr(&out).contains("no access token"));
    assert_eq!(h.backend().request_count(), 0);
}

#[tokio::test]
async fn init_writes_config_file() {
    let h = Harness::new(STUDENT, Role::Student).await;
    let out = h
        .pit(&["--api-url", "https://school.example/api", "init", "--token", "abc"])
        .await;
    assert!(out.status.success(), "stderr: {}", stderr(&out));

    let written =
        std::fs::read_to_string(h.config_home.path().join("pit").join("config.toml")).unwrap();
    assert!(written.contains("https://school.example/api"));
    assert!(written.contains("abc"));

    let again = h.pit(&["init"]).await;
    assert!(!again.status.success());
    assert!(stderr(&again).contains("already exists"));
}
