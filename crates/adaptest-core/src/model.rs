//! Core data model types for adaptest.
//!
//! These are the fundamental types the engine reads: calibrated items,
//! blueprint domains, ability estimates, and session configuration.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ItemParameterError;

/// Calibrated 3PL parameters of a single item.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ItemParameters {
    /// Discrimination (a). Must be positive.
    pub discrimination: f64,
    /// Difficulty (b), on the θ scale.
    pub difficulty: f64,
    /// Pseudo-guessing lower asymptote (c), in `[0, 1)`.
    #[serde(default)]
    pub guessing: f64,
}

impl ItemParameters {
    pub fn new(discrimination: f64, difficulty: f64, guessing: f64) -> Self {
        Self {
            discrimination,
            difficulty,
            guessing,
        }
    }

    /// Check the 3PL invariants: finite values, `a > 0`, `0 <= c < 1`.
    pub fn validate(&self) -> Result<(), ItemParameterError> {
        let a = self.discrimination;
        let b = self.difficulty;
        let c = self.guessing;
        if !a.is_finite() || a <= 0.0 {
            return Err(ItemParameterError::Discrimination(a));
        }
        if !b.is_finite() {
            return Err(ItemParameterError::Difficulty(b));
        }
        if !c.is_finite() || !(0.0..1.0).contains(&c) {
            return Err(ItemParameterError::Guessing(c));
        }
        Ok(())
    }

    pub fn is_valid(&self) -> bool {
        self.validate().is_ok()
    }
}

/// A published test item.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Item {
    /// Stable identifier.
    pub id: String,
    /// Blueprint domain this item belongs to.
    pub domain: String,
    /// IRT calibration.
    pub params: ItemParameters,
    /// Index of the correct option.
    pub correct_option: usize,
    /// Number of answer options offered.
    #[serde(default = "default_option_count")]
    pub option_count: usize,
    /// Question payload. Opaque to the engine.
    #[serde(default)]
    pub content: serde_json::Value,
}

fn default_option_count() -> usize {
    4
}

impl Item {
    /// Whether `answer_index` is the keyed answer.
    pub fn is_correct(&self, answer_index: usize) -> bool {
        answer_index == self.correct_option
    }
}

/// A blueprint category with its exam weight and coverage requirement.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Domain {
    pub code: String,
    #[serde(default)]
    pub name: String,
    /// Share of the exam blueprint; all weights sum to 100.
    pub weight: f64,
    /// Pass/fail gating domain.
    #[serde(default)]
    pub is_critical: bool,
    /// Minimum number of items a critical domain must receive.
    #[serde(default)]
    pub min_coverage: u32,
}

impl Domain {
    /// Display name, falling back to the code.
    pub fn label(&self) -> &str {
        if self.name.is_empty() {
            &self.code
        } else {
            &self.name
        }
    }
}

/// Which subset of the bank a pool query should return.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum DomainFilter {
    #[default]
    All,
    Only(Vec<String>),
}

impl DomainFilter {
    pub fn matches(&self, domain: &str) -> bool {
        match self {
            DomainFilter::All => true,
            DomainFilter::Only(codes) => codes.iter().any(|c| c == domain),
        }
    }
}

/// Point estimate of latent ability with its standard error.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AbilityEstimate {
    pub theta: f64,
    pub se: f64,
}

impl AbilityEstimate {
    pub fn new(theta: f64, se: f64) -> Self {
        Self { theta, se }
    }
}

impl Default for AbilityEstimate {
    /// Population-centered prior.
    fn default() -> Self {
        Self { theta: 0.0, se: 1.0 }
    }
}

/// Kind of diagnostic attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SessionType {
    Full,
    Express,
    DomainScoped { domains: Vec<String> },
}

impl SessionType {
    /// The pool filter this session type draws from.
    pub fn domain_filter(&self) -> DomainFilter {
        match self {
            SessionType::DomainScoped { domains } => DomainFilter::Only(domains.clone()),
            _ => DomainFilter::All,
        }
    }
}

impl fmt::Display for SessionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionType::Full => write!(f, "full"),
            SessionType::Express => write!(f, "express"),
            SessionType::DomainScoped { domains } => write!(f, "domain({})", domains.join(",")),
        }
    }
}

impl FromStr for SessionType {
    type Err = String;

    /// Accepts `full`, `express`, or `domain:CODE[,CODE...]`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        const DOMAIN_PREFIX: &str = "domain:";

        let trimmed = s.trim();
        match trimmed.to_lowercase().as_str() {
            "full" => Ok(SessionType::Full),
            "express" => Ok(SessionType::Express),
            other if other.starts_with(DOMAIN_PREFIX) => {
                // Domain codes keep their original case.
                let domains: Vec<String> = trimmed[DOMAIN_PREFIX.len()..]
                    .split(',')
                    .map(|c| c.trim().to_string())
                    .filter(|c| !c.is_empty())
                    .collect();
                if domains.is_empty() {
                    return Err("domain session type needs at least one domain code".into());
                }
                Ok(SessionType::DomainScoped { domains })
            }
            other => Err(format!("unknown session type: {other}")),
        }
    }
}

/// Why a session stopped administering items.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// Reached `max_questions`.
    MaxQuestions,
    /// Reached `min_questions` with SE at or below the target.
    PrecisionReached,
    /// No eligible items remain.
    PoolExhausted,
    /// The caller completed the session early.
    Requested,
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StopReason::MaxQuestions => write!(f, "max_questions"),
            StopReason::PrecisionReached => write!(f, "precision_reached"),
            StopReason::PoolExhausted => write!(f, "pool_exhausted"),
            StopReason::Requested => write!(f, "requested"),
        }
    }
}

/// Length and precision bounds for one session.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SessionConfig {
    pub min_questions: u32,
    pub max_questions: u32,
    /// Stop once SE falls to or below this, after `min_questions`.
    pub target_se: f64,
}

impl SessionConfig {
    pub fn new(min_questions: u32, max_questions: u32, target_se: f64) -> Self {
        Self {
            min_questions,
            max_questions,
            target_se,
        }
    }

    /// Evaluate the stopping rule after an answer.
    pub fn should_stop(&self, answered: u32, se: f64) -> Option<StopReason> {
        if answered >= self.max_questions {
            Some(StopReason::MaxQuestions)
        } else if answered >= self.min_questions && se <= self.target_se {
            Some(StopReason::PrecisionReached)
        } else {
            None
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self::new(20, 50, 0.30)
    }
}
