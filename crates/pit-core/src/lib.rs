//! Workflow engine for individual work plans (PIT) and self-assessment
//! checklists.
//!
//! - [`permissions`]: what a viewer may do with a plan or checklist.
//! - [`state`]: plan lifecycle transitions.
//! - [`checklist`]: checklist mark transitions and submission readiness.
//! - [`ordering`]: drag-and-drop reordering of plan tasks.
//! - [`autosave`]: debounced saving of free-text fields.

pub mod autosave;
pub mod checklist;
pub mod error;
pub mod ordering;
pub mod permissions;
pub mod state;

pub use error::WorkflowError;
