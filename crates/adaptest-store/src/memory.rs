//! In-memory repositories.
//!
//! Suitable for tests, simulations, and single-process deployments. Each
//! store guards its state with one mutex, which makes the session store's
//! check-then-insert and version check atomic.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};

use uuid::Uuid;

use adaptest_core::error::RepositoryError;
use adaptest_core::model::{Domain, DomainFilter, Item};
use adaptest_core::session::{DiagnosticSession, SessionStatus};
use adaptest_core::traits::{DomainCatalog, ItemRepository, RepositoryResult, SessionRepository};

fn lock<'a, T>(mutex: &'a Mutex<T>, what: &str) -> RepositoryResult<MutexGuard<'a, T>> {
    mutex
        .lock()
        .map_err(|_| RepositoryError::Backend(anyhow::anyhow!("{what} lock poisoned")))
}

// ---------------------------------------------------------------------------
// Items
// ---------------------------------------------------------------------------

/// Item pool held in memory, with per-item exposure counters.
pub struct InMemoryItemRepository {
    items: Vec<Item>,
    exposures: HashMap<String, AtomicU64>,
}

impl InMemoryItemRepository {
    pub fn new(items: Vec<Item>) -> Self {
        let exposures = items
            .iter()
            .map(|i| (i.id.clone(), AtomicU64::new(0)))
            .collect();
        Self { items, exposures }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Snapshot of all exposure counters.
    pub fn exposure_snapshot(&self) -> HashMap<String, u64> {
        self.exposures
            .iter()
            .map(|(id, n)| (id.clone(), n.load(Ordering::Relaxed)))
            .collect()
    }
}

impl ItemRepository for InMemoryItemRepository {
    fn fetch_pool(&self, filter: &DomainFilter) -> RepositoryResult<Vec<Item>> {
        Ok(self
            .items
            .iter()
            .filter(|i| filter.matches(&i.domain))
            .cloned()
            .collect())
    }

    fn record_exposure(&self, item_id: &str) -> RepositoryResult<()> {
        let counter = self
            .exposures
            .get(item_id)
            .ok_or_else(|| RepositoryError::NotFound(format!("item {item_id}")))?;
        counter.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn exposure_count(&self, item_id: &str) -> RepositoryResult<u64> {
        Ok(self
            .exposures
            .get(item_id)
            .map(|n| n.load(Ordering::Relaxed))
            .unwrap_or(0))
    }
}

// ---------------------------------------------------------------------------
// Sessions
// ---------------------------------------------------------------------------

#[derive(Default)]
struct SessionState {
    sessions: HashMap<Uuid, DiagnosticSession>,
    /// user id → in-progress session id
    active: HashMap<String, Uuid>,
}

/// Session store enforcing one active session per user and optimistic
/// versioning on save.
#[derive(Default)]
pub struct InMemorySessionRepository {
    state: Mutex<SessionState>,
}

impl InMemorySessionRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored sessions, in any status.
    pub fn count(&self) -> RepositoryResult<usize> {
        Ok(lock(&self.state, "session")?.sessions.len())
    }

    /// All sessions belonging to `user_id`, oldest first.
    pub fn history(&self, user_id: &str) -> RepositoryResult<Vec<DiagnosticSession>> {
        let state = lock(&self.state, "session")?;
        let mut sessions: Vec<DiagnosticSession> = state
            .sessions
            .values()
            .filter(|s| s.user_id == user_id)
            .cloned()
            .collect();
        sessions.sort_by_key(|s| s.started_at);
        Ok(sessions)
    }
}

impl SessionRepository for InMemorySessionRepository {
    fn find_active(&self, user_id: &str) -> RepositoryResult<Option<DiagnosticSession>> {
        let state = lock(&self.state, "session")?;
        Ok(state
            .active
            .get(user_id)
            .and_then(|id| state.sessions.get(id))
            .cloned())
    }

    fn find_by_id(&self, id: Uuid) -> RepositoryResult<Option<DiagnosticSession>> {
        Ok(lock(&self.state, "session")?.sessions.get(&id).cloned())
    }

    fn create(&self, session: &DiagnosticSession) -> RepositoryResult<DiagnosticSession> {
        let mut state = lock(&self.state, "session")?;
        if let Some(existing) = state.active.get(&session.user_id) {
            return Err(RepositoryError::ActiveSessionExists {
                user_id: session.user_id.clone(),
                session_id: *existing,
            });
        }
        if state.sessions.contains_key(&session.id) {
            return Err(RepositoryError::Backend(anyhow::anyhow!(
                "session {} already exists",
                session.id
            )));
        }

        let mut stored = session.clone();
        stored.version = 1;
        if stored.status == SessionStatus::InProgress {
            state.active.insert(stored.user_id.clone(), stored.id);
        }
        state.sessions.insert(stored.id, stored.clone());
        tracing::debug!(session = %stored.id, user = %stored.user_id, "session created");
        Ok(stored)
    }

    fn save(&self, session: &DiagnosticSession) -> RepositoryResult<DiagnosticSession> {
        let mut state = lock(&self.state, "session")?;
        let found = state
            .sessions
            .get(&session.id)
            .map(|s| s.version)
            .ok_or_else(|| RepositoryError::NotFound(format!("session {}", session.id)))?;
        if found != session.version {
            return Err(RepositoryError::VersionConflict {
                session_id: session.id,
                expected: session.version,
                found,
            });
        }

        let mut stored = session.clone();
        stored.version += 1;
        if stored.status.is_terminal() {
            if state.active.get(&stored.user_id) == Some(&stored.id) {
                state.active.remove(&stored.user_id);
            }
        } else {
            state.active.insert(stored.user_id.clone(), stored.id);
        }
        state.sessions.insert(stored.id, stored.clone());
        Ok(stored)
    }
}

// ---------------------------------------------------------------------------
// Domains
// ---------------------------------------------------------------------------

/// Fixed domain catalog.
pub struct StaticDomainCatalog {
    domains: Vec<Domain>,
}

impl StaticDomainCatalog {
    pub fn new(domains: Vec<Domain>) -> Self {
        Self { domains }
    }
}

impl DomainCatalog for StaticDomainCatalog {
    fn list_domains(&self) -> RepositoryResult<Vec<Domain>> {
        Ok(self.domains.clone())
    }
}
