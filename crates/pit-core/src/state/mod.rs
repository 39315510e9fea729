//! Plan lifecycle.
//!
//! Plans only move forward. Every transition is performed by the server;
//! the client validates preconditions, sends the request, and adopts the
//! returned plan.

pub mod dispatch;
pub mod tracker;

use pit_api::models::PlanStatus;

pub use tracker::{PlanAction, PlanTracker};

/// The plan state machine.
///
/// ```text
/// draft     -> submitted   (student submits)
/// submitted -> approved    (teacher approves)
/// approved  -> concluded   (student self-evaluates)
/// approved  -> evaluated   (teacher evaluates)
/// concluded -> evaluated   (teacher evaluates)
/// concluded -> concluded   (self-evaluation re-recorded)
/// evaluated -> evaluated   (either evaluation re-recorded)
/// ```
pub struct PlanStateMachine;

impl PlanStateMachine {
    /// Check whether `from -> to` is an edge of the lifecycle graph.
    pub fn is_valid_transition(from: PlanStatus, to: PlanStatus) -> bool {
        matches!(
            (from, to),
            (PlanStatus::Draft, PlanStatus::Submitted)
                | (PlanStatus::Submitted, PlanStatus::Approved)
                | (PlanStatus::Approved, PlanStatus::Concluded)
                | (PlanStatus::Approved, PlanStatus::Evaluated)
                | (PlanStatus::Concluded, PlanStatus::Evaluated)
                | (PlanStatus::Concluded, PlanStatus::Concluded)
                | (PlanStatus::Evaluated, PlanStatus::Evaluated)
        )
    }

    /// Status the server moves a plan to when the student records a
    /// self-evaluation.
    pub fn after_self_evaluation(from: PlanStatus) -> Option<PlanStatus> {
        match from {
            PlanStatus::Approved => Some(PlanStatus::Concluded),
            PlanStatus::Concluded | PlanStatus::Evaluated => Some(from),
            PlanStatus::Draft | PlanStatus::Submitted => None,
        }
    }

    /// Status after a teacher evaluation.
    pub fn after_teacher_evaluation(from: PlanStatus) -> Option<PlanStatus> {
        (!from.is_drafting()).then_some(PlanStatus::Evaluated)
    }
}
