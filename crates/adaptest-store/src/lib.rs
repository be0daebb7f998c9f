//! adaptest-store — in-memory repositories.
//!
//! Implements the item, session, and domain repository traits from
//! `adaptest-core` with process-local state. [`MemoryStore`] wires all
//! three from a parsed item bank.

pub mod memory;

use std::sync::Arc;

use adaptest_core::config::AdaptestConfig;
use adaptest_core::parser::ItemBank;
use adaptest_core::DiagnosticEngine;

pub use memory::{InMemoryItemRepository, InMemorySessionRepository, StaticDomainCatalog};

/// The three repositories backing one item bank.
#[derive(Clone)]
pub struct MemoryStore {
    pub items: Arc<InMemoryItemRepository>,
    pub sessions: Arc<InMemorySessionRepository>,
    pub catalog: Arc<StaticDomainCatalog>,
}

impl MemoryStore {
    pub fn from_bank(bank: &ItemBank) -> Self {
        Self {
            items: Arc::new(InMemoryItemRepository::new(bank.items.clone())),
            sessions: Arc::new(InMemorySessionRepository::new()),
            catalog: Arc::new(StaticDomainCatalog::new(bank.domains.clone())),
        }
    }

    /// Build an engine over these repositories.
    pub fn engine(&self, config: AdaptestConfig) -> DiagnosticEngine {
        DiagnosticEngine::new(
            self.items.clone(),
            self.sessions.clone(),
            self.catalog.clone(),
            config,
        )
    }
}
