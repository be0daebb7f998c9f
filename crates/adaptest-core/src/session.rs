//! Diagnostic session record and its state transitions.
//!
//! A [`DiagnosticSession`] is a plain value: the engine loads it from a
//! repository, applies one transition, and saves it back. Transitions out of
//! a terminal state are rejected.

use std::collections::{BTreeMap, HashSet};
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::SessionError;
use crate::estimator::ScoredResponse;
use crate::model::{AbilityEstimate, ItemParameters, SessionConfig, SessionType, StopReason};

/// Lifecycle state of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    InProgress,
    Completed,
    Abandoned,
}

impl SessionStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, SessionStatus::InProgress)
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionStatus::InProgress => write!(f, "in_progress"),
            SessionStatus::Completed => write!(f, "completed"),
            SessionStatus::Abandoned => write!(f, "abandoned"),
        }
    }
}

/// Answered and correct counts for one domain.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomainTally {
    pub answered: u32,
    pub correct: u32,
}

impl DomainTally {
    pub fn accuracy(&self) -> f64 {
        if self.answered == 0 {
            0.0
        } else {
            self.correct as f64 / self.answered as f64
        }
    }
}

/// One answered item, with the estimate it produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnswerRecord {
    pub item_id: String,
    pub domain: String,
    /// Calibration at the time the item was administered.
    pub params: ItemParameters,
    pub chosen_option: usize,
    pub is_correct: bool,
    pub response_time_ms: u64,
    pub answered_at: DateTime<Utc>,
    /// Estimate after this answer.
    pub ability: AbilityEstimate,
}

impl AnswerRecord {
    pub fn scored(&self) -> ScoredResponse {
        ScoredResponse {
            params: self.params,
            is_correct: self.is_correct,
        }
    }
}

/// One diagnostic attempt by one user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiagnosticSession {
    pub id: Uuid,
    pub user_id: String,
    pub session_type: SessionType,
    pub status: SessionStatus,
    pub config: SessionConfig,
    pub ability: AbilityEstimate,
    /// Sum of Fisher information over answered items.
    #[serde(default)]
    pub total_information: f64,
    #[serde(default)]
    pub answers: Vec<AnswerRecord>,
    #[serde(default)]
    pub domain_tally: BTreeMap<String, DomainTally>,
    /// Item currently served and awaiting an answer.
    #[serde(default)]
    pub pending_item: Option<String>,
    #[serde(default)]
    pub stop_reason: Option<StopReason>,
    pub started_at: DateTime<Utc>,
    #[serde(default)]
    pub finished_at: Option<DateTime<Utc>>,
    /// Optimistic-lock counter, bumped on every successful save.
    #[serde(default)]
    pub version: u64,
}

impl DiagnosticSession {
    /// A fresh in-progress session at the prior estimate.
    pub fn new(
        user_id: impl Into<String>,
        session_type: SessionType,
        config: SessionConfig,
        prior: AbilityEstimate,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id: user_id.into(),
            session_type,
            status: SessionStatus::InProgress,
            config,
            ability: prior,
            total_information: 0.0,
            answers: Vec::new(),
            domain_tally: BTreeMap::new(),
            pending_item: None,
            stop_reason: None,
            started_at: Utc::now(),
            finished_at: None,
            version: 0,
        }
    }

    pub fn questions_answered(&self) -> u32 {
        self.answers.len() as u32
    }

    pub fn correct_count(&self) -> u32 {
        self.answers.iter().filter(|a| a.is_correct).count() as u32
    }

    /// Raw proportion correct; 0 before any answer.
    pub fn accuracy(&self) -> f64 {
        if self.answers.is_empty() {
            0.0
        } else {
            self.correct_count() as f64 / self.answers.len() as f64
        }
    }

    pub fn has_answered(&self, item_id: &str) -> bool {
        self.answers.iter().any(|a| a.item_id == item_id)
    }

    /// Ids of every item served so far, answered or pending.
    pub fn administered(&self) -> HashSet<String> {
        self.answers
            .iter()
            .map(|a| a.item_id.clone())
            .chain(self.pending_item.iter().cloned())
            .collect()
    }

    fn ensure_in_progress(&self) -> Result<(), SessionError> {
        if self.status.is_terminal() {
            Err(SessionError::SessionAlreadyCompleted(self.id))
        } else {
            Ok(())
        }
    }

    /// Mark `item_id` as served.
    pub fn serve(&mut self, item_id: impl Into<String>) -> Result<(), SessionError> {
        self.ensure_in_progress()?;
        self.pending_item = Some(item_id.into());
        Ok(())
    }

    /// Append an answer and fold it into the tally and estimate.
    ///
    /// Rejects terminal sessions and items already answered.
    pub fn record_answer(
        &mut self,
        record: AnswerRecord,
        total_information: f64,
    ) -> Result<(), SessionError> {
        self.ensure_in_progress()?;
        if self.has_answered(&record.item_id) {
            return Err(SessionError::DuplicateAnswer {
                session_id: self.id,
                item_id: record.item_id,
            });
        }

        let tally = self.domain_tally.entry(record.domain.clone()).or_default();
        tally.answered += 1;
        if record.is_correct {
            tally.correct += 1;
        }

        if self.pending_item.as_deref() == Some(record.item_id.as_str()) {
            self.pending_item = None;
        }
        self.ability = record.ability;
        self.total_information = total_information;
        self.answers.push(record);
        Ok(())
    }

    /// `in_progress → completed`.
    pub fn complete(&mut self, reason: StopReason) -> Result<(), SessionError> {
        self.ensure_in_progress()?;
        self.status = SessionStatus::Completed;
        self.stop_reason = Some(reason);
        self.pending_item = None;
        self.finished_at = Some(Utc::now());
        Ok(())
    }

    /// `in_progress → abandoned`.
    pub fn abandon(&mut self) -> Result<(), SessionError> {
        self.ensure_in_progress()?;
        self.status = SessionStatus::Abandoned;
        self.pending_item = None;
        self.finished_at = Some(Utc::now());
        Ok(())
    }

    /// Responses of one domain, in answer order.
    pub fn responses_in(&self, domain: &str) -> Vec<ScoredResponse> {
        self.answers
            .iter()
            .filter(|a| a.domain == domain)
            .map(AnswerRecord::scored)
            .collect()
    }
}

/// Read-only view of how far a session has got.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionProgress {
    pub session_id: Uuid,
    pub status: SessionStatus,
    pub answered: u32,
    pub min_questions: u32,
    pub max_questions: u32,
    pub ability: AbilityEstimate,
    pub target_se: f64,
    pub pending_item: Option<String>,
}

impl From<&DiagnosticSession> for SessionProgress {
    fn from(s: &DiagnosticSession) -> Self {
        Self {
            session_id: s.id,
            status: s.status,
            answered: s.questions_answered(),
            min_questions: s.config.min_questions,
            max_questions: s.config.max_questions,
            ability: s.ability,
            target_se: s.config.target_se,
            pending_item: s.pending_item.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session() -> DiagnosticSession {
        DiagnosticSession::new(
            "user-1",
            SessionType::Full,
            SessionConfig::default(),
            AbilityEstimate::default(),
        )
    }

    fn answer(item_id: &str, domain: &str, correct: bool) -> AnswerRecord {
        AnswerRecord {
            item_id: item_id.into(),
            domain: domain.into(),
            params: ItemParameters::new(1.0, 0.0, 0.2),
            chosen_option: if correct { 0 } else { 1 },
            is_correct: correct,
            response_time_ms: 1200,
            answered_at: Utc::now(),
            ability: AbilityEstimate::new(0.1, 0.9),
        }
    }

    #[test]
    fn record_answer_updates_tally() {
        let mut s = session();
        s.serve("q1").unwrap();
        s.record_answer(answer("q1", "A", true), 0.3).unwrap();
        s.record_answer(answer("q2", "A", false), 0.6).unwrap();
        s.record_answer(answer("q3", "B", true), 0.9).unwrap();

        assert_eq!(s.questions_answered(), 3);
        assert_eq!(s.correct_count(), 2);
        assert_eq!(s.domain_tally["A"], DomainTally { answered: 2, correct: 1 });
        assert_eq!(s.domain_tally["B"], DomainTally { answered: 1, correct: 1 });
        assert!(s.pending_item.is_none());
        assert!((s.total_information - 0.9).abs() < 1e-12);
    }

    #[test]
    fn duplicate_answer_rejected() {
        let mut s = session();
        s.record_answer(answer("q1", "A", true), 0.3).unwrap();
        let err = s.record_answer(answer("q1", "A", true), 0.6).unwrap_err();
        assert!(matches!(err, SessionError::DuplicateAnswer { .. }));
        assert_eq!(s.questions_answered(), 1);
        assert_eq!(s.domain_tally["A"].answered, 1);
    }

    #[test]
    fn terminal_sessions_reject_transitions() {
        let mut s = session();
        s.complete(StopReason::MaxQuestions).unwrap();
        assert_eq!(s.status, SessionStatus::Completed);
        assert!(s.finished_at.is_some());
        assert!(matches!(
            s.record_answer(answer("q1", "A", true), 0.3),
            Err(SessionError::SessionAlreadyCompleted(_))
        ));
        assert!(s.abandon().is_err());
        assert!(s.complete(StopReason::Requested).is_err());
        assert!(s.serve("q9").is_err());

        let mut s = session();
        s.abandon().unwrap();
        assert_eq!(s.status, SessionStatus::Abandoned);
        assert!(s.complete(StopReason::Requested).is_err());
    }

    #[test]
    fn administered_includes_pending() {
        let mut s = session();
        s.record_answer(answer("q1", "A", true), 0.3).unwrap();
        s.serve("q2").unwrap();
        let ids = s.administered();
        assert!(ids.contains("q1"));
        assert!(ids.contains("q2"));
    }

    #[test]
    fn accuracy_of_empty_session_is_zero() {
        let s = session();
        assert_eq!(s.accuracy(), 0.0);
        assert_eq!(DomainTally::default().accuracy(), 0.0);
    }

    #[test]
    fn serde_roundtrip_keeps_status() {
        let mut s = session();
        s.record_answer(answer("q1", "A", true), 0.3).unwrap();
        s.complete(StopReason::PrecisionReached).unwrap();
        let json = serde_json::to_string(&s).unwrap();
        let back: DiagnosticSession = serde_json::from_str(&json).unwrap();
        assert_eq!(back.status, SessionStatus::Completed);
        assert_eq!(back.stop_reason, Some(StopReason::PrecisionReached));
        assert_eq!(back.answers.len(), 1);
    }
}
