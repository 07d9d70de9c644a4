use std::fmt;

use sea_orm::ActiveEnum;

/// Rejected status change, rendered the way API clients expect it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitionError {
    pub from: String,
    pub to: String,
}

impl fmt::Display for TransitionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Cannot change status from '{}' to '{}'.", self.from, self.to)
    }
}

impl std::error::Error for TransitionError {}

/// A status enum whose legal moves are a static whitelist.
pub trait StatusTransitions: ActiveEnum<Value = String> + Copy + PartialEq + 'static {
    /// Statuses reachable from `self` in one step.
    fn allowed_transitions(&self) -> &'static [Self];

    fn can_transition_to(&self, next: Self) -> bool {
        self.allowed_transitions().contains(&next)
    }

    fn is_terminal(&self) -> bool {
        self.allowed_transitions().is_empty()
    }

    fn transition_to(&self, next: Self) -> Result<Self, TransitionError> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            tracing::debug!(from = %self.to_value(), to = %next.to_value(), "rejected status transition");
            Err(TransitionError {
                from: self.to_value(),
                to: next.to_value(),
            })
        }
    }
}
