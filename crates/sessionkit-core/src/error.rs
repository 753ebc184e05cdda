use thiserror::Error;

/// Errors raised by session state transitions.
///
/// Mirrors the Python original's `SessionStateError`: every state rejects
/// the operations it doesn't support, naming the operation and the state
/// it was rejected from.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error("operation `{op}` is not valid for a session in state `{state}`")]
    InvalidTransition { op: &'static str, state: &'static str },

    #[error("session has no rule, so `{op}` cannot leave the working state")]
    NoRule { op: &'static str },
}
