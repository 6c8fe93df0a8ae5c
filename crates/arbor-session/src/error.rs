//! Error types for persistence and request processing.

use arbor_core::CoreError;
use std::fmt;

/// Errors that can occur against a snapshot store.
#[derive(Debug)]
pub enum StoreError {
    /// I/O failure in a file-backed store.
    Io(std::io::Error),
    /// Snapshot encode/decode failure.
    Serialization(String),
    /// The store's internal state is unusable (e.g. a poisoned lock).
    Corruption(String),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::Io(e) => write!(f, "I/O error: {e}"),
            StoreError::Serialization(msg) => write!(f, "serialization error: {msg}"),
            StoreError::Corruption(msg) => write!(f, "store corruption: {msg}"),
        }
    }
}

impl std::error::Error for StoreError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            StoreError::Io(e) => Some(e),
            StoreError::Serialization(_) | StoreError::Corruption(_) => None,
        }
    }
}

impl From<std::io::Error> for StoreError {
    fn from(e: std::io::Error) -> Self {
        StoreError::Io(e)
    }
}

/// Errors surfaced to the request caller.
///
/// All are synchronous and terminate the current request-processing call;
/// translating them into a failure presentation is the host's concern.
#[derive(Debug)]
pub enum SessionError {
    /// An address named a source widget that does not exist in the tree.
    UnknownSource(String),
    /// A render call named a widget that does not exist in the tree.
    UnknownWidget(String),
    /// An address was built without the required event type.
    MissingType,
    /// A structural stream line was unreadable or referenced a parent
    /// that was not materialized earlier in the stream.
    MalformedStructuralStream {
        /// The offending line.
        line: String,
        /// What was wrong with it.
        reason: String,
    },
    /// The snapshot store failed.
    Store(StoreError),
    /// Tree or dispatch failure bubbled up from the core.
    Core(CoreError),
}

impl SessionError {
    pub(crate) fn malformed(line: impl Into<String>, reason: impl Into<String>) -> Self {
        SessionError::MalformedStructuralStream {
            line: line.into(),
            reason: reason.into(),
        }
    }
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionError::UnknownSource(id) => write!(f, "unknown event source `{id}`"),
            SessionError::UnknownWidget(id) => write!(f, "unknown widget `{id}`"),
            SessionError::MissingType => write!(f, "address is missing the event type"),
            SessionError::MalformedStructuralStream { line, reason } => {
                write!(f, "malformed structural stream at `{line}`: {reason}")
            }
            SessionError::Store(e) => write!(f, "store error: {e}"),
            SessionError::Core(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for SessionError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SessionError::Store(e) => Some(e),
            SessionError::Core(e) => Some(e),
            _ => None,
        }
    }
}

impl From<StoreError> for SessionError {
    fn from(e: StoreError) -> Self {
        SessionError::Store(e)
    }
}

impl From<CoreError> for SessionError {
    fn from(e: CoreError) -> Self {
        SessionError::Core(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_formats() {
        assert_eq!(
            SessionError::UnknownSource("tom".into()).to_string(),
            "unknown event source `tom`"
        );
        assert_eq!(
            SessionError::UnknownWidget("ghost".into()).to_string(),
            "unknown widget `ghost`"
        );
        assert_eq!(
            SessionError::MissingType.to_string(),
            "address is missing the event type"
        );
        let err = SessionError::malformed("a|b", "expected 3 fields");
        assert_eq!(
            err.to_string(),
            "malformed structural stream at `a|b`: expected 3 fields"
        );
    }

    #[test]
    fn conversions() {
        let err: SessionError = CoreError::NotFound("x".into()).into();
        assert!(matches!(err, SessionError::Core(_)));
        let err: SessionError = StoreError::Serialization("bad".into()).into();
        assert!(matches!(err, SessionError::Store(_)));
    }
}
