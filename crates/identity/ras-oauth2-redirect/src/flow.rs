//! Phases of a single redirect callback.

use crate::error::{ErrorKind, RedirectError};
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallbackPhase {
    Idle,
    /// A state was parsed from the URL and its transaction is being claimed
    AwaitingTransaction { state: String },
    /// The transaction is consumed and the code is being exchanged
    ExchangingCode { state: String },
    Completed,
    Failed(ErrorKind),
}

impl CallbackPhase {
    pub fn is_terminal(&self) -> bool {
        matches!(self, CallbackPhase::Completed | CallbackPhase::Failed(_))
    }

    pub fn can_advance_to(&self, next: &CallbackPhase) -> bool {
        use CallbackPhase::*;

        match (self, next) {
            (Idle, AwaitingTransaction { .. }) | (Idle, Failed(_)) => true,
            (AwaitingTransaction { state }, ExchangingCode { state: next_state }) => {
                state == next_state
            }
            (AwaitingTransaction { .. }, Failed(_)) => true,
            (ExchangingCode { .. }, Completed) | (ExchangingCode { .. }, Failed(_)) => true,
            _ => false,
        }
    }
}

/// Tracks one callback invocation through its phases.
#[derive(Debug)]
pub struct CallbackFlow {
    phase: CallbackPhase,
}

impl Default for CallbackFlow {
    fn default() -> Self {
        Self::new()
    }
}

impl CallbackFlow {
    pub fn new() -> Self {
        Self {
            phase: CallbackPhase::Idle,
        }
    }

    pub fn phase(&self) -> &CallbackPhase {
        &self.phase
    }

    pub fn advance(&mut self, next: CallbackPhase) {
        debug_assert!(
            self.phase.can_advance_to(&next),
            "invalid callback transition {:?} -> {:?}",
            self.phase,
            next
        );
        debug!(from = ?self.phase, to = ?next, "Callback phase transition");
        self.phase = next;
    }

    /// Move to `Failed` and hand the error back
    pub fn fail(&mut self, error: RedirectError) -> RedirectError {
        self.advance(CallbackPhase::Failed(error.kind()));
        error
    }
}
