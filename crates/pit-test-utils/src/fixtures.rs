//! Builders for the entities tests seed into a [`crate::FakeBackend`].

use pit_api::models::{
    ChecklistItem, ChecklistMark, ChecklistState, ChecklistStatus, ChecklistTemplate, ClassSummary,
    MarkStatus, Plan, PlanSection, PlanStatus, PlanTask, Role, TaskState, UserSummary, Viewer,
};

pub const CLASS_ID: i64 = 40;

pub fn user(id: i64, role: Role) -> UserSummary {
    UserSummary {
        id,
        username: format!("user{id}"),
        first_name: String::new(),
        last_name: String::new(),
        email: None,
        role: Some(role),
        is_superuser: false,
    }
}

pub fn student(id: i64) -> Viewer {
    Viewer::new(id, Role::Student)
}

pub fn teacher(id: i64) -> Viewer {
    Viewer::new(id, Role::Teacher)
}

pub fn guardian(id: i64) -> Viewer {
    Viewer::new(id, Role::Guardian)
}

pub fn section(id: i64, title: &str, area_code: Option<&str>, order: u32) -> PlanSection {
    PlanSection {
        id,
        title: title.to_owned(),
        area_code: area_code.map(str::to_owned),
        order,
    }
}

pub fn task(id: i64, plan: i64, description: &str, subject: &str, order: u32) -> PlanTask {
    PlanTask {
        id,
        plan,
        description: description.to_owned(),
        subject: subject.to_owned(),
        state: TaskState::Pending,
        order,
        teacher_feedback: String::new(),
        evidence_link: String::new(),
    }
}

/// An empty plan owned by `owner`.
pub fn plan(id: i64, owner: i64, status: PlanStatus) -> Plan {
    Plan {
        id,
        status,
        student: Some(user(owner, Role::Student)),
        student_class: Some(ClassSummary {
            id: CLASS_ID,
            name: "5.º A".to_owned(),
            year: Some(5),
        }),
        period_label: "Semana 12".to_owned(),
        start_date: None,
        end_date: None,
        general_objectives: String::new(),
        self_evaluation: String::new(),
        teacher_evaluation: String::new(),
        tasks: Vec::new(),
        sections: Vec::new(),
        suggestions: Vec::new(),
        created_at: None,
        updated_at: None,
    }
}

/// A draft plan with two sections and six tasks:
///
/// ```text
/// order  id  subject
///   1    11  PT     (section A)
///   2    12  MAT    (section B)
///   3    13  PT     (section A)
///   4    14  ""     (unassigned)
///   5    15  MAT    (section B)
///   6    16  PT     (section A)
/// ```
pub fn board_plan(id: i64, owner: i64) -> Plan {
    let mut plan = plan(id, owner, PlanStatus::Draft);
    plan.sections = vec![
        section(1, "Português", Some("PT"), 1),
        section(2, "Matemática", Some("MAT"), 2),
    ];
    plan.tasks = vec![
        task(11, id, "Ler um conto", "PT", 1),
        task(12, id, "Fichas de frações", "MAT", 2),
        task(13, id, "Escrever um resumo", "PT", 3),
        task(14, id, "Arrumar o portefólio", "", 4),
        task(15, id, "Problemas de áreas", "MAT", 5),
        task(16, id, "Ditado", "PT", 6),
    ];
    plan
}

pub fn template(id: i64, items: usize) -> ChecklistTemplate {
    ChecklistTemplate {
        id,
        name: format!("Lista {id}"),
        description: String::new(),
        items: (0..items)
            .map(|i| ChecklistItem {
                id: id * 100 + i as i64 + 1,
                code: format!("O{}", i + 1),
                text: format!("Objetivo {}", i + 1),
                order: i as u32 + 1,
                contracted_in_council: false,
            })
            .collect(),
    }
}

/// A draft checklist owned by `owner` with one mark per entry of `marks`.
/// Mark ids are `id * 10 + 1`, `id * 10 + 2`, ...
pub fn checklist_status(id: i64, owner: i64, marks: &[MarkStatus]) -> ChecklistStatus {
    let template = template(id, marks.len());
    let marks = template
        .items
        .iter()
        .zip(marks)
        .enumerate()
        .map(|(i, (item, status))| {
            let validated = *status == MarkStatus::Validated;
            ChecklistMark {
                id: id * 10 + i as i64 + 1,
                item: item.clone(),
                mark_status: Some(if validated {
                    MarkStatus::Completed
                } else {
                    *status
                }),
                teacher_validated: validated,
                comment: String::new(),
            }
        })
        .collect();
    ChecklistStatus {
        id,
        template,
        student: Some(user(owner, Role::Student)),
        student_class_id: Some(CLASS_ID),
        state: ChecklistState::Draft,
        percent_complete: 0.0,
        student_notes: String::new(),
        marks,
        updated_at: None,
    }
}
