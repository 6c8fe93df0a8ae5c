//! Error types for tree and dispatch operations.

use std::fmt;

/// Errors raised while operating on the widget tree or dispatching events.
///
/// All failures are synchronous and non-recoverable at the point raised;
/// they propagate to the request caller via `Result`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
    /// A referenced widget id does not exist in the current tree.
    NotFound(String),
    /// A handler or render call named a transition the target's kind
    /// does not expose.
    UnknownState {
        /// The target node's kind.
        kind: String,
        /// The transition name that was requested.
        state: String,
    },
    /// A transition ran but reported a failure of its own.
    Transition {
        /// The transition name that failed.
        state: String,
        /// Application-supplied failure message.
        message: String,
    },
}

impl CoreError {
    /// Convenience constructor for transition-level failures.
    #[must_use]
    pub fn transition(state: impl Into<String>, message: impl Into<String>) -> Self {
        CoreError::Transition {
            state: state.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for CoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CoreError::NotFound(id) => write!(f, "widget `{id}` not found in tree"),
            CoreError::UnknownState { kind, state } => {
                write!(f, "kind `{kind}` exposes no transition `{state}`")
            }
            CoreError::Transition { state, message } => {
                write!(f, "transition `{state}` failed: {message}")
            }
        }
    }
}

impl std::error::Error for CoreError {}
