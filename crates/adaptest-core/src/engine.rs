//! Diagnostic session orchestrator.
//!
//! Coordinates the repositories, the ability estimator, and the item
//! selector across the four session operations. Every operation is
//! synchronous: load, apply one transition, save.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::AdaptestConfig;
use crate::error::SessionError;
use crate::estimator::AbilityEstimator;
use crate::model::{AbilityEstimate, Domain, Item, SessionConfig, SessionType, StopReason};
use crate::report::{build_report, DiagnosticReport};
use crate::selector::{ItemSelector, SelectionContext};
use crate::session::{AnswerRecord, DiagnosticSession, SessionProgress, SessionStatus};
use crate::traits::{DomainCatalog, ItemRepository, SessionRepository};

/// Returned by [`DiagnosticEngine::start_session`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StartedSession {
    pub session_id: Uuid,
    /// `None` when the pool was empty and the session completed immediately.
    pub first_item: Option<Item>,
    pub total_domains: usize,
}

/// What the caller should do after an answer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NextStep {
    Item { item: Item },
    Complete { reason: StopReason },
}

/// Returned by [`DiagnosticEngine::submit_answer`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnswerOutcome {
    pub is_correct: bool,
    pub current_ability: AbilityEstimate,
    pub next: NextStep,
}

impl AnswerOutcome {
    pub fn is_complete(&self) -> bool {
        matches!(self.next, NextStep::Complete { .. })
    }
}

/// Acknowledgement of an abandoned session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ack {
    pub session_id: Uuid,
    pub status: SessionStatus,
}

/// The adaptive diagnostic engine.
pub struct DiagnosticEngine {
    items: Arc<dyn ItemRepository>,
    sessions: Arc<dyn SessionRepository>,
    catalog: Arc<dyn DomainCatalog>,
    estimator: AbilityEstimator,
    selector: ItemSelector,
    config: AdaptestConfig,
}

impl DiagnosticEngine {
    pub fn new(
        items: Arc<dyn ItemRepository>,
        sessions: Arc<dyn SessionRepository>,
        catalog: Arc<dyn DomainCatalog>,
        config: AdaptestConfig,
    ) -> Self {
        Self {
            items,
            sessions,
            catalog,
            estimator: AbilityEstimator::new(config.estimator),
            selector: ItemSelector::new(config.selector),
            config,
        }
    }

    pub fn config(&self) -> &AdaptestConfig {
        &self.config
    }

    /// Begin a new attempt for `user_id`.
    ///
    /// `config_override` replaces the preset for `session_type`.
    pub fn start_session(
        &self,
        user_id: &str,
        session_type: SessionType,
        config_override: Option<SessionConfig>,
    ) -> Result<StartedSession, SessionError> {
        if let Some(active) = self.sessions.find_active(user_id)? {
            return Err(SessionError::ActiveSessionExists {
                user_id: user_id.to_string(),
                session_id: active.id,
            });
        }

        let config =
            config_override.unwrap_or_else(|| self.config.sessions.for_type(&session_type));
        let domains = self.domains_for(&session_type)?;
        let pool = self.items.fetch_pool(&session_type.domain_filter())?;

        // Nothing is stored until the first item is chosen.
        let mut session =
            DiagnosticSession::new(user_id, session_type, config, self.estimator.prior());
        let first_item = self.pick_next(&session, &pool, &domains)?;
        match &first_item {
            Some(item) => session.serve(item.id.clone())?,
            None => {
                tracing::warn!(session = %session.id, "empty item pool, completing immediately");
                session.complete(StopReason::PoolExhausted)?;
            }
        }

        // The repository's create is the atomic guard; find_active above is a fast path.
        let session = self.sessions.create(&session)?;
        if let Some(item) = &first_item {
            self.note_exposure(&item.id);
        }

        tracing::info!(
            session = %session.id,
            user = user_id,
            kind = %session.session_type,
            pool = pool.len(),
            "diagnostic session started"
        );

        Ok(StartedSession {
            session_id: session.id,
            first_item,
            total_domains: domains.len(),
        })
    }

    /// Score one answer and advance the session.
    pub fn submit_answer(
        &self,
        session_id: Uuid,
        item_id: &str,
        answer_index: usize,
        response_time_ms: u64,
    ) -> Result<AnswerOutcome, SessionError> {
        let mut session = self.load(session_id)?;
        if session.status.is_terminal() {
            return Err(SessionError::SessionAlreadyCompleted(session_id));
        }
        if session.has_answered(item_id) {
            return Err(SessionError::DuplicateAnswer {
                session_id,
                item_id: item_id.to_string(),
            });
        }
        if let Some(expected) = &session.pending_item {
            if expected != item_id {
                return Err(SessionError::UnexpectedItem {
                    session_id,
                    expected: expected.clone(),
                    got: item_id.to_string(),
                });
            }
        }

        let pool = self.items.fetch_pool(&session.session_type.domain_filter())?;
        let item = pool
            .iter()
            .find(|i| i.id == item_id)
            .cloned()
            .ok_or_else(|| SessionError::ItemNotFound(item_id.to_string()))?;

        let is_correct = item.is_correct(answer_index);
        let update = self.estimator.update(
            session.ability,
            session.total_information,
            is_correct,
            &item.params,
        );
        session.record_answer(
            AnswerRecord {
                item_id: item.id.clone(),
                domain: item.domain.clone(),
                params: item.params,
                chosen_option: answer_index,
                is_correct,
                response_time_ms,
                answered_at: Utc::now(),
                ability: update.estimate,
            },
            update.total_information,
        )?;

        tracing::debug!(
            session = %session_id,
            item = item_id,
            correct = is_correct,
            theta = update.estimate.theta,
            se = update.estimate.se,
            info = update.item_information,
            "answer recorded"
        );

        let answered = session.questions_answered();
        let next = match session.config.should_stop(answered, session.ability.se) {
            Some(reason) => {
                session.complete(reason)?;
                NextStep::Complete { reason }
            }
            None => {
                let domains = self.domains_for(&session.session_type)?;
                match self.pick_next(&session, &pool, &domains)? {
                    Some(next_item) => {
                        session.serve(next_item.id.clone())?;
                        NextStep::Item { item: next_item }
                    }
                    None => {
                        session.complete(StopReason::PoolExhausted)?;
                        NextStep::Complete {
                            reason: StopReason::PoolExhausted,
                        }
                    }
                }
            }
        };

        let session = self.sessions.save(&session)?;
        if let NextStep::Item { item } = &next {
            self.note_exposure(&item.id);
        }
        if let NextStep::Complete { reason } = &next {
            tracing::info!(
                session = %session.id,
                answered,
                theta = session.ability.theta,
                se = session.ability.se,
                reason = %reason,
                "diagnostic session completed"
            );
        }

        Ok(AnswerOutcome {
            is_correct,
            current_ability: session.ability,
            next,
        })
    }

    /// Finish the session (if still running) and build its report.
    pub fn complete_session(&self, session_id: Uuid) -> Result<DiagnosticReport, SessionError> {
        let mut session = self.load(session_id)?;
        match session.status {
            SessionStatus::Abandoned => return Err(SessionError::SessionAbandoned(session_id)),
            SessionStatus::InProgress => {
                session.complete(StopReason::Requested)?;
                session = self.sessions.save(&session)?;
                tracing::info!(session = %session_id, "diagnostic session completed on request");
            }
            SessionStatus::Completed => {}
        }

        let domains = self.domains_for(&session.session_type)?;
        Ok(build_report(&session, &domains, &self.config))
    }

    /// Terminate an in-progress session without a report.
    pub fn abandon_session(&self, session_id: Uuid) -> Result<Ack, SessionError> {
        let mut session = self.load(session_id)?;
        session.abandon()?;
        let session = self.sessions.save(&session)?;
        tracing::info!(
            session = %session_id,
            answered = session.questions_answered(),
            "diagnostic session abandoned"
        );
        Ok(Ack {
            session_id,
            status: session.status,
        })
    }

    pub fn session_progress(&self, session_id: Uuid) -> Result<SessionProgress, SessionError> {
        let session = self.load(session_id)?;
        Ok(SessionProgress::from(&session))
    }

    fn load(&self, session_id: Uuid) -> Result<DiagnosticSession, SessionError> {
        self.sessions
            .find_by_id(session_id)?
            .ok_or(SessionError::SessionNotFound(session_id))
    }

    /// Catalog domains relevant to `session_type`.
    fn domains_for(&self, session_type: &SessionType) -> Result<Vec<Domain>, SessionError> {
        let filter = session_type.domain_filter();
        Ok(self
            .catalog
            .list_domains()?
            .into_iter()
            .filter(|d| filter.matches(&d.code))
            .collect())
    }

    /// Count a served item once its session is stored. Failures are logged.
    fn note_exposure(&self, item_id: &str) {
        if let Err(e) = self.items.record_exposure(item_id) {
            tracing::warn!(item = item_id, "failed to record exposure: {e}");
        }
    }

    fn pick_next(
        &self,
        session: &DiagnosticSession,
        pool: &[Item],
        domains: &[Domain],
    ) -> Result<Option<Item>, SessionError> {
        let administered = session.administered();
        let mut exposures = HashMap::new();
        for item in pool.iter().filter(|i| !administered.contains(&i.id)) {
            exposures.insert(item.id.clone(), self.items.exposure_count(&item.id)?);
        }
        let ctx = SelectionContext {
            administered: &administered,
            tally: &session.domain_tally,
            domains,
            exposures: &exposures,
        };
        Ok(self
            .selector
            .select_next(pool, session.ability.theta, &ctx)
            .cloned())
    }
}
