use pit_api::error::ApiError;
use pit_api::models::PlanStatus;

/// Errors from workflow operations.
///
/// Every variant except [`WorkflowError::Api`] and
/// [`WorkflowError::OrderingDesync`] is raised before any request is sent.
#[derive(Debug, thiserror::Error)]
pub enum WorkflowError {
    #[error("not allowed: {0}")]
    Forbidden(String),

    /// The action exists for this viewer but the entity is not there yet.
    #[error("{0}")]
    NotYet(String),

    #[error("invalid plan transition: {from} -> {to}")]
    InvalidTransition { from: PlanStatus, to: PlanStatus },

    #[error("{pending} mandatory item(s) still pending")]
    NotReady { pending: usize },

    #[error("missing required field: {0}")]
    MissingField(&'static str),

    #[error("nothing to change")]
    NoOp,

    #[error("this mark was validated by a teacher and can no longer be changed")]
    Locked,

    #[error("task {0} is not part of this plan")]
    UnknownTask(i64),

    #[error("section {0} is not part of this plan")]
    UnknownSection(i64),

    #[error("mark {0} is not part of this checklist")]
    UnknownMark(i64),

    #[error("task order could not be saved; the plan was reloaded")]
    OrderingDesync {
        #[source]
        source: ApiError,
    },

    #[error(transparent)]
    Api(#[from] ApiError),
}

impl WorkflowError {
    /// Text to show the person who triggered the operation.
    pub fn user_message(&self) -> String {
        match self {
            Self::Api(e) | Self::OrderingDesync { source: e } => e.user_message(),
            other => other.to_string(),
        }
    }

    /// `true` when the operation was refused locally and nothing was sent.
    pub fn is_local(&self) -> bool {
        !matches!(self, Self::Api(_) | Self::OrderingDesync { .. })
    }
}
