//! Collaborator traits for item, session, and domain storage.
//!
//! The engine is synchronous; implementations decide how storage latency is
//! absorbed. The in-memory implementations live in `adaptest-store`.

use uuid::Uuid;

use crate::error::RepositoryError;
use crate::model::{Domain, DomainFilter, Item};
use crate::session::DiagnosticSession;

pub type RepositoryResult<T> = Result<T, RepositoryError>;

// ---------------------------------------------------------------------------
// Item repository
// ---------------------------------------------------------------------------

/// Source of calibrated items and their exposure counts.
pub trait ItemRepository: Send + Sync {
    /// All published items matching `filter`.
    fn fetch_pool(&self, filter: &DomainFilter) -> RepositoryResult<Vec<Item>>;

    /// Count one more administration of `item_id`.
    fn record_exposure(&self, item_id: &str) -> RepositoryResult<()>;

    /// Times `item_id` has been administered across all sessions.
    fn exposure_count(&self, item_id: &str) -> RepositoryResult<u64>;
}

// ---------------------------------------------------------------------------
// Session repository
// ---------------------------------------------------------------------------

/// Persistence for diagnostic sessions.
///
/// `create` must be atomic with respect to the one-active-session-per-user
/// rule, and `save` must reject writes whose `version` is stale.
pub trait SessionRepository: Send + Sync {
    /// The user's in-progress session, if any.
    fn find_active(&self, user_id: &str) -> RepositoryResult<Option<DiagnosticSession>>;

    fn find_by_id(&self, id: Uuid) -> RepositoryResult<Option<DiagnosticSession>>;

    /// Insert a new session, failing with
    /// [`RepositoryError::ActiveSessionExists`] if the user already has one
    /// in progress.
    fn create(&self, session: &DiagnosticSession) -> RepositoryResult<DiagnosticSession>;

    /// Persist a modified session. The stored version must equal
    /// `session.version`; the returned record carries the bumped version.
    fn save(&self, session: &DiagnosticSession) -> RepositoryResult<DiagnosticSession>;
}

// ---------------------------------------------------------------------------
// Domain catalog
// ---------------------------------------------------------------------------

/// Blueprint domains with weights and coverage rules.
pub trait DomainCatalog: Send + Sync {
    fn list_domains(&self) -> RepositoryResult<Vec<Domain>>;
}
