//! Fixed transition tables shared by the request and audit state machines.

use std::fmt;

use super::domain::EntityRef;
use super::error::WorkflowError;

/// A status enumeration with a fixed table of legal successor states.
pub trait WorkflowStatus: Copy + Eq + fmt::Debug + 'static {
    fn label(self) -> &'static str;

    /// Statuses reachable in exactly one step.
    fn successors(self) -> &'static [Self];

    fn is_terminal(self) -> bool {
        self.successors().is_empty()
    }

    fn can_transition_to(self, next: Self) -> bool {
        self.successors().contains(&next)
    }
}

/// Reject `action` unless `from -> to` is an edge of the table.
pub(crate) fn ensure_transition<S: WorkflowStatus>(
    entity: EntityRef,
    from: S,
    to: S,
    action: &'static str,
) -> Result<(), WorkflowError> {
    ensure_guard(entity, from, from.can_transition_to(to), action)
}

/// Reject `action` unless an auxiliary predicate over the entity holds.
pub(crate) fn ensure_guard<S: WorkflowStatus>(
    entity: EntityRef,
    current: S,
    holds: bool,
    action: &'static str,
) -> Result<(), WorkflowError> {
    if holds {
        Ok(())
    } else {
        Err(WorkflowError::InvalidTransition {
            entity,
            from: current.label(),
            action,
        })
    }
}
