use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

/// Lifecycle status of an individual work plan.
///
/// Variants are declared in lifecycle order, so the derived `Ord` follows
/// `draft < submitted < approved < concluded < evaluated`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanStatus {
    Draft,
    Submitted,
    Approved,
    Concluded,
    Evaluated,
}

impl PlanStatus {
    /// All statuses in lifecycle order.
    pub const LIFECYCLE: [PlanStatus; 5] = [
        Self::Draft,
        Self::Submitted,
        Self::Approved,
        Self::Concluded,
        Self::Evaluated,
    ];

    /// `true` while the plan is still in its initial drafting window
    /// (`draft` or `submitted`), where the student may restructure it.
    pub fn is_drafting(self) -> bool {
        matches!(self, Self::Draft | Self::Submitted)
    }
}

impl fmt::Display for PlanStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Draft => "draft",
            Self::Submitted => "submitted",
            Self::Approved => "approved",
            Self::Concluded => "concluded",
            Self::Evaluated => "evaluated",
        };
        f.write_str(s)
    }
}

impl FromStr for PlanStatus {
    type Err = PlanStatusParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draft" => Ok(Self::Draft),
            "submitted" => Ok(Self::Submitted),
            "approved" => Ok(Self::Approved),
            "concluded" => Ok(Self::Concluded),
            "evaluated" => Ok(Self::Evaluated),
            other => Err(PlanStatusParseError(other.to_owned())),
        }
    }
}

/// Error returned when parsing an invalid [`PlanStatus`] string.
#[derive(Debug, Clone)]
pub struct PlanStatusParseError(pub String);

impl fmt::Display for PlanStatusParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid plan status: {:?}", self.0)
    }
}

impl std::error::Error for PlanStatusParseError {}

// ---------------------------------------------------------------------------

/// Progress state of a single plan task.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskState {
    #[default]
    Pending,
    InProgress,
    Done,
    Validated,
}

impl TaskState {
    /// Done and validated tasks are not carried over into the next plan.
    pub fn is_finished(self) -> bool {
        matches!(self, Self::Done | Self::Validated)
    }
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::InProgress => "in_progress",
            Self::Done => "done",
            Self::Validated => "validated",
        };
        f.write_str(s)
    }
}

impl FromStr for TaskState {
    type Err = TaskStateParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "in_progress" => Ok(Self::InProgress),
            "done" => Ok(Self::Done),
            "validated" => Ok(Self::Validated),
            other => Err(TaskStateParseError(other.to_owned())),
        }
    }
}

/// Error returned when parsing an invalid [`TaskState`] string.
#[derive(Debug, Clone)]
pub struct TaskStateParseError(pub String);

impl fmt::Display for TaskStateParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid task state: {:?}", self.0)
    }
}

impl std::error::Error for TaskStateParseError {}

// ---------------------------------------------------------------------------

/// Review state of a student's checklist as a whole.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChecklistState {
    #[default]
    Draft,
    Submitted,
    Validated,
    NeedsRevision,
}

impl fmt::Display for ChecklistState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Draft => "draft",
            Self::Submitted => "submitted",
            Self::Validated => "validated",
            Self::NeedsRevision => "needs_revision",
        };
        f.write_str(s)
    }
}

impl FromStr for ChecklistState {
    type Err = ChecklistStateParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draft" => Ok(Self::Draft),
            "submitted" => Ok(Self::Submitted),
            "validated" => Ok(Self::Validated),
            "needs_revision" => Ok(Self::NeedsRevision),
            other => Err(ChecklistStateParseError(other.to_owned())),
        }
    }
}

/// Error returned when parsing an invalid [`ChecklistState`] string.
#[derive(Debug, Clone)]
pub struct ChecklistStateParseError(pub String);

impl fmt::Display for ChecklistStateParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid checklist state: {:?}", self.0)
    }
}

impl std::error::Error for ChecklistStateParseError {}

// ---------------------------------------------------------------------------

/// Status of a single checklist mark.
///
/// On the wire `mark_status` only carries the first three values; `Validated`
/// is what a mark *displays* once a teacher has validated it. Older records
/// may still carry `VALIDATED` in `mark_status`, so it is accepted on read.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MarkStatus {
    #[default]
    NotStarted,
    InProgress,
    Completed,
    Validated,
}

impl MarkStatus {
    /// Every value a mark can display, in progression order.
    pub const ALL: [MarkStatus; 4] = [
        Self::NotStarted,
        Self::InProgress,
        Self::Completed,
        Self::Validated,
    ];
}

impl fmt::Display for MarkStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::NotStarted => "NOT_STARTED",
            Self::InProgress => "IN_PROGRESS",
            Self::Completed => "COMPLETED",
            Self::Validated => "VALIDATED",
        };
        f.write_str(s)
    }
}

impl FromStr for MarkStatus {
    type Err = MarkStatusParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "NOT_STARTED" => Ok(Self::NotStarted),
            "IN_PROGRESS" => Ok(Self::InProgress),
            "COMPLETED" => Ok(Self::Completed),
            "VALIDATED" => Ok(Self::Validated),
            _ => Err(MarkStatusParseError(s.to_owned())),
        }
    }
}

/// Error returned when parsing an invalid [`MarkStatus`] string.
#[derive(Debug, Clone)]
pub struct MarkStatusParseError(pub String);

impl fmt::Display for MarkStatusParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid mark status: {:?}", self.0)
    }
}

impl std::error::Error for MarkStatusParseError {}

// ---------------------------------------------------------------------------

/// Role of an authenticated user. Wire values are the school platform's
/// Portuguese role codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    #[serde(rename = "aluno")]
    Student,
    #[serde(rename = "professor")]
    Teacher,
    #[serde(rename = "admin")]
    Admin,
    #[serde(rename = "encarregado")]
    Guardian,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Student => "aluno",
            Self::Teacher => "professor",
            Self::Admin => "admin",
            Self::Guardian => "encarregado",
        };
        f.write_str(s)
    }
}

impl FromStr for Role {
    type Err = RoleParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "aluno" | "student" => Ok(Self::Student),
            "professor" | "teacher" => Ok(Self::Teacher),
            "admin" => Ok(Self::Admin),
            "encarregado" | "guardian" => Ok(Self::Guardian),
            other => Err(RoleParseError(other.to_owned())),
        }
    }
}

/// Error returned when parsing an invalid [`Role`] string.
#[derive(Debug, Clone)]
pub struct RoleParseError(pub String);

impl fmt::Display for RoleParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid role: {:?}", self.0)
    }
}

impl std::error::Error for RoleParseError {}

// ---------------------------------------------------------------------------

/// Where a plan suggestion was imported from when the plan was generated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SuggestionOrigin {
    Template,
    Council,
    Pending,
    Manual,
}

impl fmt::Display for SuggestionOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Template => "template",
            Self::Council => "council",
            Self::Pending => "pending",
            Self::Manual => "manual",
        };
        f.write_str(s)
    }
}

// ---------------------------------------------------------------------------
// Entities
// ---------------------------------------------------------------------------

/// Public summary of a platform user, as embedded in plans and checklists.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserSummary {
    pub id: i64,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub role: Option<Role>,
    #[serde(default)]
    pub is_superuser: bool,
}

impl UserSummary {
    /// Full name, falling back to the username.
    pub fn display_name(&self) -> String {
        let full = format!("{} {}", self.first_name, self.last_name);
        let full = full.trim();
        if full.is_empty() {
            self.username.clone()
        } else {
            full.to_owned()
        }
    }
}

/// The identity currently acting through the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Viewer {
    pub id: i64,
    pub role: Role,
    pub is_superuser: bool,
}

impl Viewer {
    pub fn new(id: i64, role: Role) -> Self {
        Self {
            id,
            role,
            is_superuser: false,
        }
    }

    pub fn superuser(id: i64) -> Self {
        Self {
            id,
            role: Role::Admin,
            is_superuser: true,
        }
    }

    /// Resolve a viewer from the `/me` payload. Users without a role
    /// cannot act on plans or checklists.
    pub fn from_user(user: &UserSummary) -> Option<Self> {
        match (user.role, user.is_superuser) {
            (Some(role), is_superuser) => Some(Self {
                id: user.id,
                role,
                is_superuser,
            }),
            (None, true) => Some(Self::superuser(user.id)),
            (None, false) => None,
        }
    }
}

/// Short class reference embedded in a plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassSummary {
    pub id: i64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub year: Option<i32>,
}

/// An individual work plan (PIT) with its sections and ordered tasks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Plan {
    pub id: i64,
    pub status: PlanStatus,
    #[serde(default)]
    pub student: Option<UserSummary>,
    #[serde(default)]
    pub student_class: Option<ClassSummary>,
    #[serde(default)]
    pub period_label: String,
    #[serde(default)]
    pub start_date: Option<NaiveDate>,
    #[serde(default)]
    pub end_date: Option<NaiveDate>,
    #[serde(default)]
    pub general_objectives: String,
    #[serde(default)]
    pub self_evaluation: String,
    #[serde(default)]
    pub teacher_evaluation: String,
    #[serde(default)]
    pub tasks: Vec<PlanTask>,
    #[serde(default)]
    pub sections: Vec<PlanSection>,
    #[serde(default)]
    pub suggestions: Vec<PlanSuggestion>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Plan {
    /// Id of the owning student, if the payload carried one.
    pub fn owner_id(&self) -> Option<i64> {
        self.student.as_ref().map(|s| s.id)
    }

    pub fn is_owned_by(&self, viewer: &Viewer) -> bool {
        self.owner_id() == Some(viewer.id)
    }
}

/// One task of a plan. `subject` links it to a section's area code; an
/// empty subject means the task is unassigned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanTask {
    pub id: i64,
    pub plan: i64,
    pub description: String,
    #[serde(default)]
    pub subject: String,
    #[serde(default)]
    pub state: TaskState,
    #[serde(default)]
    pub order: u32,
    #[serde(default)]
    pub teacher_feedback: String,
    #[serde(default)]
    pub evidence_link: String,
}

/// A subject section of a plan, copied from the plan template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanSection {
    pub id: i64,
    pub title: String,
    #[serde(default)]
    pub area_code: Option<String>,
    #[serde(default)]
    pub order: u32,
}

impl PlanSection {
    /// Area code with `null` folded to the empty string.
    pub fn code(&self) -> &str {
        self.area_code.as_deref().unwrap_or("")
    }
}

/// A read-only suggestion imported into the plan on generation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanSuggestion {
    pub id: i64,
    pub text: String,
    pub origin: SuggestionOrigin,
    #[serde(default)]
    pub is_pending: bool,
    #[serde(default)]
    pub order: u32,
}

/// One objective of a checklist template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChecklistItem {
    pub id: i64,
    #[serde(default)]
    pub code: String,
    pub text: String,
    #[serde(default)]
    pub order: u32,
    #[serde(default)]
    pub contracted_in_council: bool,
}

/// A checklist template with its ordered items.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChecklistTemplate {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub items: Vec<ChecklistItem>,
}

/// A student's mark against one checklist item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChecklistMark {
    pub id: i64,
    pub item: ChecklistItem,
    #[serde(default)]
    pub mark_status: Option<MarkStatus>,
    #[serde(default)]
    pub teacher_validated: bool,
    #[serde(default)]
    pub comment: String,
}

/// A student's instance of a checklist template in one class.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChecklistStatus {
    pub id: i64,
    pub template: ChecklistTemplate,
    #[serde(default)]
    pub student: Option<UserSummary>,
    #[serde(default)]
    pub student_class_id: Option<i64>,
    #[serde(default)]
    pub state: ChecklistState,
    #[serde(default)]
    pub percent_complete: f64,
    #[serde(default)]
    pub student_notes: String,
    #[serde(default)]
    pub marks: Vec<ChecklistMark>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl ChecklistStatus {
    pub fn is_owned_by(&self, viewer: &Viewer) -> bool {
        self.student.as_ref().map(|s| s.id) == Some(viewer.id)
    }

    pub fn mark(&self, mark_id: i64) -> Option<&ChecklistMark> {
        self.marks.iter().find(|m| m.id == mark_id)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
