/// Target state definitions for tracking crawl progress
///
/// This module defines the states a crawl target moves through between
/// leaving the frontier and reaching a terminal outcome.
use crate::StencilError;
use std::fmt;

/// Represents the current state of a target in the crawl process
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TargetState {
    /// Target is waiting in the frontier
    Queued,

    /// A fetch attempt for the target is in flight
    Dispatched,

    /// The last attempt failed transiently and another one is scheduled
    Retrying,

    // ===== Terminal States =====
    /// Content was obtained (from the network or the content store)
    Succeeded,

    /// Permanent failure, or the retry budget was exhausted
    Failed,
}

impl TargetState {
    /// Returns true if this is a terminal state (no further processing needed)
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed)
    }

    /// Returns true if the state machine permits moving from `self` to `next`
    pub fn can_transition_to(&self, next: TargetState) -> bool {
        use TargetState::*;

        matches!(
            (self, next),
            (Queued, Dispatched)
                | (Dispatched, Succeeded)
                | (Dispatched, Retrying)
                | (Dispatched, Failed)
                | (Retrying, Dispatched)
                | (Retrying, Failed)
        )
    }

    /// Moves to `next`, rejecting transitions the state machine does not allow
    ///
    /// # Returns
    ///
    /// * `Ok(TargetState)` - The new state
    /// * `Err(StencilError::InvalidTransition)` - The move is illegal
    pub fn transition(self, next: TargetState) -> Result<TargetState, StencilError> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(StencilError::InvalidTransition {
                from: self,
                to: next,
            })
        }
    }

    /// Converts the state to the string used in logs and statistics
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Dispatched => "dispatched",
            Self::Retrying => "retrying",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for TargetState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
