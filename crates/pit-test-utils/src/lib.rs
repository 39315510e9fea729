//! Shared test utilities for pit integration tests.
//!
//! Provides an in-memory stand-in for the school platform API. Two modes:
//! - **Direct**: [`FakeBackend`] implements [`Transport`], so workflow code
//!   can run against it with no network at all.
//! - **HTTP**: [`serve`] puts the same backend behind an axum server on a
//!   loopback port, with bearer-token checks and a refresh endpoint, for
//!   exercising `HttpTransport`.
//!
//! The backend keeps a log of every request it receives so tests can assert
//! on exact request counts (including "zero requests").

pub mod fixtures;
mod server;

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Value, json};

use pit_api::error::ApiError;
use pit_api::models::{
    ChecklistMark, ChecklistState, ChecklistStatus, ChecklistTemplate, ClassSummary, MarkStatus,
    Plan, PlanSection, PlanStatus, PlanTask, TaskState, UserSummary,
};
use pit_api::transport::{Method, Transport};

pub use server::{REFRESH_TOKEN, TestServer, serve};

/// One request as the backend saw it.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedRequest {
    pub method: Method,
    /// Path including any query string.
    pub path: String,
    pub body: Option<Value>,
}

#[derive(Debug, Clone)]
struct FailRule {
    method: Method,
    path: String,
    status: u16,
    body: Value,
    /// `None` fails forever.
    remaining: Option<usize>,
}

#[derive(Default)]
struct State {
    me: Option<UserSummary>,
    plans: BTreeMap<i64, Plan>,
    statuses: BTreeMap<i64, ChecklistStatus>,
    templates: BTreeMap<i64, ChecklistTemplate>,
    plan_sections: Vec<PlanSection>,
    log: Vec<RecordedRequest>,
    failures: Vec<FailRule>,
    delays: HashMap<String, Duration>,
    next_id: i64,
}

impl State {
    fn alloc_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }
}

type Reply = Result<Value, (u16, Value)>;

/// In-memory platform API.
///
/// Cloning is cheap; all clones share the same state.
#[derive(Clone)]
pub struct FakeBackend {
    state: Arc<Mutex<State>>,
}

impl Default for FakeBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeBackend {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(State {
                next_id: 1000,
                ..State::default()
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().expect("fake backend state poisoned")
    }

    // -- seeding ------------------------------------------------------------

    pub fn set_me(&self, user: UserSummary) {
        self.lock().me = Some(user);
    }

    pub fn seed_plan(&self, plan: Plan) {
        self.lock().plans.insert(plan.id, plan);
    }

    pub fn seed_status(&self, status: ChecklistStatus) {
        self.lock().statuses.insert(status.id, status);
    }

    pub fn seed_template(&self, template: ChecklistTemplate) {
        self.lock().templates.insert(template.id, template);
    }

    /// Sections copied into every plan created through `/pit/plans/generate`.
    pub fn set_plan_sections(&self, sections: Vec<PlanSection>) {
        self.lock().plan_sections = sections;
    }

    // -- inspection ---------------------------------------------------------

    pub fn plan(&self, id: i64) -> Option<Plan> {
        self.lock().plans.get(&id).cloned()
    }

    pub fn status(&self, id: i64) -> Option<ChecklistStatus> {
        self.lock().statuses.get(&id).cloned()
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.lock().log.clone()
    }

    pub fn request_count(&self) -> usize {
        self.lock().log.len()
    }

    /// Requests made with `method`.
    pub fn requests_with(&self, method: Method) -> Vec<RecordedRequest> {
        self.lock()
            .log
            .iter()
            .filter(|r| r.method == method)
            .cloned()
            .collect()
    }

    /// Number of non-GET requests.
    pub fn write_count(&self) -> usize {
        self.lock()
            .log
            .iter()
            .filter(|r| r.method != Method::Get)
            .count()
    }

    pub fn clear_log(&self) {
        self.lock().log.clear();
    }

    // -- fault injection ----------------------------------------------------

    /// Fail the next `method path` request with `status` and a `detail` body.
    pub fn fail_next(&self, method: Method, path: &str, status: u16, detail: &str) {
        self.lock().failures.push(FailRule {
            method,
            path: path.to_owned(),
            status,
            body: json!({ "detail": detail }),
            remaining: Some(1),
        });
    }

    /// Fail every `method path` request with `status` and the given body.
    pub fn fail_always(&self, method: Method, path: &str, status: u16, body: Value) {
        self.lock().failures.push(FailRule {
            method,
            path: path.to_owned(),
            status,
            body,
            remaining: None,
        });
    }

    pub fn clear_failures(&self) {
        self.lock().failures.clear();
    }

    /// Hold responses for `path` for `delay` after the change is applied.
    pub fn delay(&self, path: &str, delay: Duration) {
        self.lock().delays.insert(path.to_owned(), delay);
    }

    // -- request handling ---------------------------------------------------

    /// Handle one request. Errors are `(status, body)` pairs.
    pub async fn handle(&self, method: Method, path: &str, body: Option<Value>) -> Reply {
        let (reply, delay) = {
            let mut state = self.lock();
            state.log.push(RecordedRequest {
                method,
                path: path.to_owned(),
                body: body.clone(),
            });
            let bare = path.split_once('?').map_or(path, |(p, _)| p);
            let delay = state.delays.get(bare).copied();
            let reply = match take_failure(&mut state, method, bare) {
                Some(err) => Err(err),
                None => route(&mut state, method, path, body.unwrap_or(Value::Null)),
            };
            (reply, delay)
        };

        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        reply
    }
}

#[async_trait]
impl Transport for FakeBackend {
    async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> Result<Value, ApiError> {
        self.handle(method, path, body).await.map_err(|(status, body)| {
            let bytes = serde_json::to_vec(&body).unwrap_or_default();
            ApiError::from_response(status, &bytes)
        })
    }
}

fn take_failure(state: &mut State, method: Method, path: &str) -> Option<(u16, Value)> {
    let idx = state
        .failures
        .iter()
        .position(|r| r.method == method && r.path == path)?;
    let rule = state.failures[idx].clone();
    match rule.remaining {
        Some(n) if n <= 1 => {
            state.failures.remove(idx);
        }
        Some(n) => state.failures[idx].remaining = Some(n - 1),
        None => {}
    }
    Some((rule.status, rule.body))
}

fn not_found() -> (u16, Value) {
    (404, json!({ "detail": "Not found." }))
}

fn bad_request(detail: &str) -> (u16, Value) {
    (400, json!({ "detail": detail }))
}

fn to_value<T: serde::Serialize>(v: &T) -> Reply {
    serde_json::to_value(v).map_err(|e| (500, json!({ "detail": e.to_string() })))
}

fn parse_id(raw: &str) -> Result<i64, (u16, Value)> {
    raw.parse().map_err(|_| not_found())
}

fn str_field(body: &Value, key: &str) -> Option<String> {
    body.get(key).and_then(Value::as_str).map(str::to_owned)
}

fn route(state: &mut State, method: Method, path: &str, body: Value) -> Reply {
    let (bare, query) = path.split_once('?').unwrap_or((path, ""));
    let segments: Vec<&str> = bare.trim_matches('/').split('/').collect();

    match (method, segments.as_slice()) {
        (Method::Get, ["me"]) => match &state.me {
            Some(me) => to_value(me),
            None => Err((401, json!({ "detail": "Authentication required." }))),
        },

        // -- plans ------------------------------------------------------------
        (Method::Get, ["pit", "plans"]) => {
            let student = query
                .split('&')
                .find_map(|kv| kv.strip_prefix("student="))
                .and_then(|v| v.parse::<i64>().ok());
            let plans: Vec<&Plan> = state
                .plans
                .values()
                .filter(|p| student.is_none() || p.owner_id() == student)
                .collect();
            Ok(json!({ "count": plans.len(), "results": to_value(&plans)? }))
        }
        (Method::Post, ["pit", "plans", "generate"]) => generate_plan(state, &body),
        (Method::Get, ["pit", "plans", id]) => {
            let id = parse_id(id)?;
            state.plans.get(&id).map_or(Err(not_found()), to_value)
        }
        (Method::Patch, ["pit", "plans", id]) => {
            let id = parse_id(id)?;
            let plan = state.plans.get_mut(&id).ok_or_else(not_found)?;
            if let Some(text) = str_field(&body, "general_objectives") {
                plan.general_objectives = text.trim().to_owned();
            }
            if let Some(label) = str_field(&body, "period_label") {
                plan.period_label = label;
            }
            to_value(plan)
        }
        (Method::Post, ["pit", "plans", id, action]) => {
            let id = parse_id(id)?;
            let plan = state.plans.get_mut(&id).ok_or_else(not_found)?;
            plan_action(plan, action, &body)?;
            to_value(plan)
        }

        // -- tasks ------------------------------------------------------------
        (Method::Post, ["pit", "tasks"]) => {
            let plan_id = body.get("plan").and_then(Value::as_i64).ok_or_else(|| {
                (400, json!({ "plan": ["This field is required."] }))
            })?;
            let description = str_field(&body, "description").unwrap_or_default();
            if description.trim().is_empty() {
                return Err((400, json!({ "description": ["This field may not be blank."] })));
            }
            let id = state.alloc_id();
            let plan = state.plans.get_mut(&plan_id).ok_or_else(not_found)?;
            let order = body
                .get("order")
                .and_then(Value::as_u64)
                .map_or(plan.tasks.len() as u32 + 1, |o| o as u32);
            let state_value = match body.get("state") {
                Some(v) => serde_json::from_value(v.clone()).map_err(|_| bad_request("bad state"))?,
                None => TaskState::Pending,
            };
            let task = PlanTask {
                id,
                plan: plan_id,
                description: description.trim().to_owned(),
                subject: str_field(&body, "subject").unwrap_or_default(),
                state: state_value,
                order,
                teacher_feedback: String::new(),
                evidence_link: String::new(),
            };
            plan.tasks.push(task.clone());
            plan.tasks.sort_by_key(|t| t.order);
            to_value(&task)
        }
        (Method::Patch, ["pit", "tasks", id]) => {
            let id = parse_id(id)?;
            let plan = state
                .plans
                .values_mut()
                .find(|p| p.tasks.iter().any(|t| t.id == id))
                .ok_or_else(not_found)?;
            let task = plan
                .tasks
                .iter_mut()
                .find(|t| t.id == id)
                .ok_or_else(not_found)?;
            apply_task_patch(task, &body)?;
            let updated = task.clone();
            plan.tasks.sort_by_key(|t| t.order);
            to_value(&updated)
        }
        (Method::Delete, ["pit", "tasks", id]) => {
            let id = parse_id(id)?;
            let plan = state
                .plans
                .values_mut()
                .find(|p| p.tasks.iter().any(|t| t.id == id))
                .ok_or_else(not_found)?;
            plan.tasks.retain(|t| t.id != id);
            Ok(Value::Null)
        }

        // -- checklists -------------------------------------------------------
        (Method::Get, ["checklists", "templates"]) => {
            let templates: Vec<&ChecklistTemplate> = state.templates.values().collect();
            to_value(&templates)
        }
        (Method::Get, ["checklists", "statuses"]) => {
            let class = query
                .split('&')
                .find_map(|kv| kv.strip_prefix("student_class="))
                .and_then(|v| v.parse::<i64>().ok());
            let statuses: Vec<&ChecklistStatus> = state
                .statuses
                .values()
                .filter(|s| class.is_none() || s.student_class_id == class)
                .collect();
            to_value(&statuses)
        }
        (Method::Post, ["checklists", "statuses"]) => create_status(state, &body),
        (Method::Get, ["checklists", "statuses", id]) => {
            let id = parse_id(id)?;
            state.statuses.get(&id).map_or(Err(not_found()), to_value)
        }
        (Method::Patch, ["checklists", "statuses", id]) => {
            let id = parse_id(id)?;
            let status = state.statuses.get_mut(&id).ok_or_else(not_found)?;
            if let Some(notes) = str_field(&body, "student_notes") {
                status.student_notes = notes.trim().to_owned();
            }
            if let Some(raw) = body.get("state") {
                status.state =
                    serde_json::from_value(raw.clone()).map_err(|_| bad_request("bad state"))?;
            }
            to_value(status)
        }
        (Method::Patch, ["checklists", "marks", id]) => {
            let id = parse_id(id)?;
            let status = state
                .statuses
                .values_mut()
                .find(|s| s.marks.iter().any(|m| m.id == id))
                .ok_or_else(not_found)?;
            let mark = status
                .marks
                .iter_mut()
                .find(|m| m.id == id)
                .ok_or_else(not_found)?;
            apply_mark_update(mark, &body)?;
            let updated = mark.clone();
            status.percent_complete = percent_complete(&status.marks);
            to_value(&updated)
        }

        _ => Err(not_found()),
    }
}

fn plan_action(plan: &mut Plan, action: &str, body: &Value) -> Result<(), (u16, Value)> {
    match action {
        "submit" => {
            if plan.status != PlanStatus::Draft {
                return Err(bad_request("Only draft plans can be submitted."));
            }
            plan.status = PlanStatus::Submitted;
        }
        "teacher-decision" => {
            if plan.status != PlanStatus::Submitted {
                return Err(bad_request("Only submitted plans can be approved."));
            }
            match str_field(body, "decision").as_deref() {
                Some("approve") => plan.status = PlanStatus::Approved,
                _ => return Err((400, json!({ "decision": ["Invalid decision."] }))),
            }
        }
        "self-evaluation" => {
            if plan.status.is_drafting() {
                return Err(bad_request("The plan is not approved yet."));
            }
            plan.self_evaluation = str_field(body, "self_evaluation").unwrap_or_default();
            if plan.status == PlanStatus::Approved {
                plan.status = PlanStatus::Concluded;
            }
        }
        "teacher-evaluation" => {
            if plan.status.is_drafting() {
                return Err(bad_request("The plan is not approved yet."));
            }
            plan.teacher_evaluation = str_field(body, "teacher_evaluation").unwrap_or_default();
            plan.status = PlanStatus::Evaluated;
        }
        _ => return Err(not_found()),
    }
    Ok(())
}

fn apply_task_patch(task: &mut PlanTask, body: &Value) -> Result<(), (u16, Value)> {
    if let Some(description) = str_field(body, "description") {
        if description.trim().is_empty() {
            return Err((400, json!({ "description": ["This field may not be blank."] })));
        }
        task.description = description.trim().to_owned();
    }
    if let Some(subject) = str_field(body, "subject") {
        task.subject = subject;
    }
    if let Some(order) = body.get("order").and_then(Value::as_u64) {
        task.order = order as u32;
    }
    if let Some(raw) = body.get("state") {
        task.state = serde_json::from_value(raw.clone()).map_err(|_| bad_request("bad state"))?;
    }
    if let Some(feedback) = str_field(body, "teacher_feedback") {
        task.teacher_feedback = feedback;
    }
    if let Some(link) = str_field(body, "evidence_link") {
        task.evidence_link = link;
    }
    Ok(())
}

/// Server-side mark normalization: a requested `VALIDATED` is stored as
/// `COMPLETED` plus the teacher flag, and any non-completed status clears it.
fn apply_mark_update(mark: &mut ChecklistMark, body: &Value) -> Result<(), (u16, Value)> {
    if let Some(raw) = body.get("mark_status") {
        let status: MarkStatus = serde_json::from_value(raw.clone())
            .map_err(|_| (400, json!({ "mark_status": ["Invalid status."] })))?;
        match status {
            MarkStatus::Validated => {
                mark.mark_status = Some(MarkStatus::Completed);
                mark.teacher_validated = true;
            }
            other => mark.mark_status = Some(other),
        }
    }
    if let Some(validated) = body.get("teacher_validated").and_then(Value::as_bool) {
        mark.teacher_validated = validated;
    }
    if mark.mark_status != Some(MarkStatus::Completed) {
        mark.teacher_validated = false;
    }
    if let Some(comment) = str_field(body, "comment") {
        mark.comment = comment;
    }
    Ok(())
}

fn percent_complete(marks: &[ChecklistMark]) -> f64 {
    if marks.is_empty() {
        return 0.0;
    }
    let done = marks
        .iter()
        .filter(|m| m.teacher_validated || m.mark_status == Some(MarkStatus::Completed))
        .count();
    (done as f64 / marks.len() as f64 * 100.0).round()
}

fn generate_plan(state: &mut State, body: &Value) -> Reply {
    let class_id = body
        .get("student_class_id")
        .and_then(Value::as_i64)
        .ok_or_else(|| (400, json!({ "student_class_id": ["This field is required."] })))?;
    let me_is_student = state
        .me
        .as_ref()
        .is_some_and(|m| m.role == Some(pit_api::models::Role::Student));
    let student_id = match body.get("student_id").and_then(Value::as_i64) {
        Some(id) => id,
        None if me_is_student => state.me.as_ref().map(|m| m.id).unwrap_or_default(),
        None => {
            return Err((
                400,
                json!({ "student_id": "Campo obrigatório para professores." }),
            ));
        }
    };

    if let Some(existing) = state
        .plans
        .values()
        .find(|p| p.owner_id() == Some(student_id) && p.status == PlanStatus::Draft)
    {
        return to_value(existing);
    }

    let id = state.alloc_id();
    let plan = Plan {
        id,
        status: PlanStatus::Draft,
        student: Some(fixtures::user(student_id, pit_api::models::Role::Student)),
        student_class: Some(ClassSummary {
            id: class_id,
            name: String::new(),
            year: None,
        }),
        period_label: str_field(body, "target_date").unwrap_or_default(),
        start_date: None,
        end_date: None,
        general_objectives: String::new(),
        self_evaluation: String::new(),
        teacher_evaluation: String::new(),
        tasks: Vec::new(),
        sections: state.plan_sections.clone(),
        suggestions: Vec::new(),
        created_at: None,
        updated_at: None,
    };
    state.plans.insert(id, plan.clone());
    to_value(&plan)
}

fn create_status(state: &mut State, body: &Value) -> Reply {
    let template_id = body
        .get("template")
        .and_then(Value::as_i64)
        .ok_or_else(|| (400, json!({ "template": ["This field is required."] })))?;
    let class_id = body.get("student_class").and_then(Value::as_i64);
    let template = state
        .templates
        .get(&template_id)
        .cloned()
        .ok_or_else(|| bad_request("Unknown template."))?;
    let student = state.me.clone();

    if let Some(existing) = state.statuses.values().find(|s| {
        s.template.id == template_id
            && s.student_class_id == class_id
            && s.student.as_ref().map(|u| u.id) == student.as_ref().map(|u| u.id)
    }) {
        return to_value(existing);
    }

    let id = state.alloc_id();
    let mut marks = Vec::with_capacity(template.items.len());
    for item in &template.items {
        marks.push(ChecklistMark {
            id: state.alloc_id(),
            item: item.clone(),
            mark_status: Some(MarkStatus::NotStarted),
            teacher_validated: false,
            comment: String::new(),
        });
    }
    let status = ChecklistStatus {
        id,
        template,
        student,
        student_class_id: class_id,
        state: ChecklistState::Draft,
        percent_complete: 0.0,
        student_notes: String::new(),
        marks,
        updated_at: None,
    };
    state.statuses.insert(id, status.clone());
    to_value(&status)
}
