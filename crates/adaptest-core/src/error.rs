//! Error types for the diagnostic engine.
//!
//! Session lifecycle violations are surfaced to callers as [`SessionError`].
//! Calibration anomalies ([`ItemParameterError`]) are absorbed by the item
//! model and estimator and only ever logged. Repository implementations
//! report failures through [`RepositoryError`].

use thiserror::Error;
use uuid::Uuid;

/// Errors returned by [`DiagnosticEngine`](crate::engine::DiagnosticEngine) operations.
#[derive(Debug, Error)]
pub enum SessionError {
    /// The user already has a session in progress.
    #[error("user {user_id} already has an active session ({session_id})")]
    ActiveSessionExists { user_id: String, session_id: Uuid },

    /// No session with this id exists.
    #[error("session not found: {0}")]
    SessionNotFound(Uuid),

    /// The session is terminal and cannot be advanced.
    #[error("session {0} is already finished")]
    SessionAlreadyCompleted(Uuid),

    /// The session was abandoned and has no report.
    #[error("session {0} was abandoned")]
    SessionAbandoned(Uuid),

    /// The item was already answered in this session.
    #[error("item {item_id} was already answered in session {session_id}")]
    DuplicateAnswer { session_id: Uuid, item_id: String },

    /// The answer does not belong to the item currently served.
    #[error("answer for item {got} but session {session_id} is waiting on {expected}")]
    UnexpectedItem {
        session_id: Uuid,
        expected: String,
        got: String,
    },

    /// The item is not in the session's pool.
    #[error("item not found in pool: {0}")]
    ItemNotFound(String),

    /// Another write to the session landed first.
    #[error("session {0} was modified concurrently, reload and retry")]
    StaleSession(Uuid),

    /// A collaborator failed.
    #[error("repository error: {0}")]
    Repository(#[source] anyhow::Error),
}

impl SessionError {
    /// Returns `true` for errors caused by the caller rather than the backend.
    pub fn is_lifecycle_violation(&self) -> bool {
        !matches!(self, SessionError::Repository(_))
    }
}

/// A 3PL parameter outside its valid range.
#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum ItemParameterError {
    #[error("discrimination must be finite and positive, got {0}")]
    Discrimination(f64),

    #[error("difficulty must be finite, got {0}")]
    Difficulty(f64),

    #[error("guessing must be in [0, 1), got {0}")]
    Guessing(f64),
}

/// Errors reported by repository implementations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Atomic create refused: an in-progress session already exists.
    #[error("user {user_id} already has an active session ({session_id})")]
    ActiveSessionExists { user_id: String, session_id: Uuid },

    /// Optimistic-lock check failed on save.
    #[error("version conflict on session {session_id}: expected {expected}, found {found}")]
    VersionConflict {
        session_id: Uuid,
        expected: u64,
        found: u64,
    },

    #[error("record not found: {0}")]
    NotFound(String),

    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}

impl From<RepositoryError> for SessionError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::ActiveSessionExists {
                user_id,
                session_id,
            } => SessionError::ActiveSessionExists {
                user_id,
                session_id,
            },
            RepositoryError::VersionConflict { session_id, .. } => {
                SessionError::StaleSession(session_id)
            }
            other => SessionError::Repository(anyhow::Error::new(other)),
        }
    }
}
