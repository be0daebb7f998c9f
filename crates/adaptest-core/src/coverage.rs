//! Per-domain coverage analysis, readiness classification, and study
//! recommendations.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::estimator::{AbilityEstimator, EstimatorConfig};
use crate::model::Domain;
use crate::session::DiagnosticSession;

// ---------------------------------------------------------------------------
// Thresholds
// ---------------------------------------------------------------------------

/// Accuracy cut-offs for tagging a domain.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoverageThresholds {
    /// Accuracy below this is `study_required`.
    pub study_below: f64,
    /// Accuracy at or above this is `maintain`; in between is practice.
    pub maintain_at: f64,
}

impl Default for CoverageThresholds {
    fn default() -> Self {
        Self {
            study_below: 0.5,
            maintain_at: 0.75,
        }
    }
}

/// Minimum θ and accuracy for one readiness tier.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TierThreshold {
    pub min_theta: f64,
    pub min_accuracy: f64,
}

impl TierThreshold {
    fn admits(&self, theta: f64, accuracy: f64) -> bool {
        theta >= self.min_theta && accuracy >= self.min_accuracy
    }
}

/// Cut-offs for the three readiness tiers.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReadinessThresholds {
    pub high: TierThreshold,
    pub medium: TierThreshold,
    /// Weight of scaled θ in the readiness score; accuracy gets the rest.
    pub ability_weight: f64,
}

impl Default for ReadinessThresholds {
    fn default() -> Self {
        Self {
            high: TierThreshold {
                min_theta: 1.5,
                min_accuracy: 0.8,
            },
            medium: TierThreshold {
                min_theta: 0.5,
                min_accuracy: 0.6,
            },
            ability_weight: 0.6,
        }
    }
}

impl ReadinessThresholds {
    /// Classify a (θ, accuracy) pair.
    pub fn classify(&self, theta: f64, accuracy: f64) -> ReadinessLevel {
        if self.high.admits(theta, accuracy) {
            ReadinessLevel::High
        } else if self.medium.admits(theta, accuracy) {
            ReadinessLevel::Medium
        } else {
            ReadinessLevel::Low
        }
    }
}

// ---------------------------------------------------------------------------
// Domain results
// ---------------------------------------------------------------------------

/// What a learner should do about a domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DomainTag {
    StudyRequired,
    PracticeRecommended,
    Maintain,
}

impl fmt::Display for DomainTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DomainTag::StudyRequired => write!(f, "study_required"),
            DomainTag::PracticeRecommended => write!(f, "practice_recommended"),
            DomainTag::Maintain => write!(f, "maintain"),
        }
    }
}

/// Performance summary for one domain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DomainResult {
    pub code: String,
    pub name: String,
    /// Blueprint weight; 0 for domains missing from the catalog.
    pub weight: f64,
    pub is_critical: bool,
    pub answered: u32,
    pub correct: u32,
    pub accuracy: f64,
    /// θ re-estimated from this domain's responses alone.
    pub sub_ability: f64,
    pub tag: DomainTag,
}

fn tag_for(answered: u32, accuracy: f64, thresholds: &CoverageThresholds) -> DomainTag {
    if answered == 0 || accuracy < thresholds.study_below {
        DomainTag::StudyRequired
    } else if accuracy < thresholds.maintain_at {
        DomainTag::PracticeRecommended
    } else {
        DomainTag::Maintain
    }
}

/// Tally every catalog domain plus any domain the session touched.
///
/// Domains with no answers are reported with zero counts and
/// `study_required`.
pub fn analyze_domain_coverage(
    session: &DiagnosticSession,
    domains: &[Domain],
    estimator_config: &EstimatorConfig,
    thresholds: &CoverageThresholds,
) -> Vec<DomainResult> {
    let estimator = AbilityEstimator::new(*estimator_config);

    let mut codes: Vec<&str> = domains.iter().map(|d| d.code.as_str()).collect();
    let known: BTreeSet<&str> = codes.iter().copied().collect();
    for code in session.domain_tally.keys() {
        if !known.contains(code.as_str()) {
            codes.push(code.as_str());
        }
    }

    codes
        .into_iter()
        .map(|code| {
            let domain = domains.iter().find(|d| d.code == code);
            let tally = session.domain_tally.get(code).copied().unwrap_or_default();
            let accuracy = tally.accuracy();
            let responses = session.responses_in(code);
            let sub_ability = if responses.is_empty() {
                estimator.prior().theta
            } else {
                estimator.replay(&responses).theta
            };
            DomainResult {
                code: code.to_string(),
                name: domain.map(|d| d.label().to_string()).unwrap_or_else(|| code.to_string()),
                weight: domain.map(|d| d.weight).unwrap_or(0.0),
                is_critical: domain.map(|d| d.is_critical).unwrap_or(false),
                answered: tally.answered,
                correct: tally.correct,
                accuracy,
                sub_ability,
                tag: tag_for(tally.answered, accuracy, thresholds),
            }
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Readiness
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReadinessLevel {
    High,
    Medium,
    Low,
}

impl ReadinessLevel {
    pub fn message(&self) -> &'static str {
        match self {
            ReadinessLevel::High => "Well prepared: keep reviewing to maintain your level.",
            ReadinessLevel::Medium => {
                "Making progress: targeted practice on weaker domains should close the gap."
            }
            ReadinessLevel::Low => "Not yet ready: build fundamentals before attempting the exam.",
        }
    }
}

impl fmt::Display for ReadinessLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReadinessLevel::High => write!(f, "high"),
            ReadinessLevel::Medium => write!(f, "medium"),
            ReadinessLevel::Low => write!(f, "low"),
        }
    }
}

/// Coarse exam-readiness classification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Readiness {
    pub level: ReadinessLevel,
    /// 0–100 blend of scaled θ and accuracy.
    pub score: f64,
    pub message: String,
    /// Critical domains still tagged `study_required`.
    #[serde(default)]
    pub critical_gaps: Vec<String>,
}

/// Map θ linearly onto 0–100 across the estimator's range.
pub fn scaled_score(theta: f64, estimator: &EstimatorConfig) -> f64 {
    let span = estimator.theta_max - estimator.theta_min;
    if span <= 0.0 || !theta.is_finite() {
        return 0.0;
    }
    ((theta - estimator.theta_min) / span * 100.0).clamp(0.0, 100.0)
}

/// Classify readiness from overall θ and raw accuracy.
pub fn assess_readiness(
    theta: f64,
    accuracy: f64,
    domain_results: &[DomainResult],
    thresholds: &ReadinessThresholds,
    estimator: &EstimatorConfig,
) -> Readiness {
    let level = thresholds.classify(theta, accuracy);
    let w = thresholds.ability_weight;
    let score = w * scaled_score(theta, estimator) + (1.0 - w) * accuracy.clamp(0.0, 1.0) * 100.0;
    let critical_gaps = domain_results
        .iter()
        .filter(|d| d.is_critical && d.tag == DomainTag::StudyRequired)
        .map(|d| d.code.clone())
        .collect();
    Readiness {
        level,
        score,
        message: level.message().to_string(),
        critical_gaps,
    }
}

/// Readiness of a session, from its current estimate and accuracy.
pub fn assess_session_readiness(
    session: &DiagnosticSession,
    domain_results: &[DomainResult],
    thresholds: &ReadinessThresholds,
    estimator: &EstimatorConfig,
) -> Readiness {
    assess_readiness(
        session.ability.theta,
        session.accuracy(),
        domain_results,
        thresholds,
        estimator,
    )
}

// ---------------------------------------------------------------------------
// Recommendations
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    High,
    Medium,
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Priority::High => write!(f, "high"),
            Priority::Medium => write!(f, "medium"),
        }
    }
}

/// An actionable study suggestion for one domain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub domain: String,
    pub priority: Priority,
    pub tag: DomainTag,
    pub message: String,
}

/// One recommendation per domain needing work, most urgent first.
///
/// `maintain` domains produce nothing.
pub fn generate_recommendations(domain_results: &[DomainResult]) -> Vec<Recommendation> {
    let mut actionable: Vec<&DomainResult> = domain_results
        .iter()
        .filter(|d| d.tag != DomainTag::Maintain)
        .collect();
    actionable.sort_by(|x, y| {
        x.tag
            .cmp(&y.tag)
            .then_with(|| y.is_critical.cmp(&x.is_critical))
            .then_with(|| {
                y.weight
                    .partial_cmp(&x.weight)
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
            .then_with(|| x.code.cmp(&y.code))
    });

    actionable
        .into_iter()
        .map(|d| {
            let (priority, message) = match d.tag {
                DomainTag::StudyRequired if d.answered == 0 => (
                    Priority::High,
                    format!(
                        "No questions from {} were answered; study this domain before retesting.",
                        d.name
                    ),
                ),
                DomainTag::StudyRequired => (
                    Priority::High,
                    format!(
                        "Study {}: {:.0}% correct across {} question(s).",
                        d.name,
                        d.accuracy * 100.0,
                        d.answered
                    ),
                ),
                _ => (
                    Priority::Medium,
                    format!(
                        "Practice {}: {:.0}% correct across {} question(s).",
                        d.name,
                        d.accuracy * 100.0,
                        d.answered
                    ),
                ),
            };
            Recommendation {
                domain: d.code.clone(),
                priority,
                tag: d.tag,
                message,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{AbilityEstimate, ItemParameters, SessionConfig, SessionType};
    use crate::session::AnswerRecord;
    use chrono::Utc;

    fn domain(code: &str, weight: f64, critical: bool) -> Domain {
        Domain {
            code: code.into(),
            name: format!("Domain {code}"),
            weight,
            is_critical: critical,
            min_coverage: 0,
        }
    }

    fn session_with(answers: &[(&str, bool)]) -> DiagnosticSession {
        let mut s = DiagnosticSession::new(
            "u",
            SessionType::Full,
            SessionConfig::default(),
            AbilityEstimate::default(),
        );
        for (i, (domain, correct)) in answers.iter().enumerate() {
            s.record_answer(
                AnswerRecord {
                    item_id: format!("q{i}"),
                    domain: domain.to_string(),
                    params: ItemParameters::new(1.0, 0.0, 0.2),
                    chosen_option: 0,
                    is_correct: *correct,
                    response_time_ms: 1000,
                    answered_at: Utc::now(),
                    ability: AbilityEstimate::new(0.0, 0.9),
                },
                0.0,
            )
            .unwrap();
        }
        s
    }

    fn result<'a>(results: &'a [DomainResult], code: &str) -> &'a DomainResult {
        results.iter().find(|r| r.code == code).unwrap()
    }

    #[test]
    fn coverage_counts_answers_per_domain() {
        let s = session_with(&[("A", true), ("A", false), ("B", true)]);
        let domains = vec![domain("A", 60.0, false), domain("B", 40.0, false)];
        let results = analyze_domain_coverage(
            &s,
            &domains,
            &EstimatorConfig::default(),
            &CoverageThresholds::default(),
        );
        assert_eq!(result(&results, "A").answered, 2);
        assert_eq!(result(&results, "B").answered, 1);
        assert!((result(&results, "A").accuracy - 0.5).abs() < 1e-12);
    }

    #[test]
    fn untouched_domains_default_to_study_required() {
        let s = session_with(&[("A", true)]);
        let domains = vec![domain("A", 60.0, false), domain("C", 40.0, true)];
        let results = analyze_domain_coverage(
            &s,
            &domains,
            &EstimatorConfig::default(),
            &CoverageThresholds::default(),
        );
        let c = result(&results, "C");
        assert_eq!(c.answered, 0);
        assert_eq!(c.accuracy, 0.0);
        assert_eq!(c.tag, DomainTag::StudyRequired);
        assert_eq!(c.sub_ability, 0.0);
    }

    #[test]
    fn domains_outside_catalog_are_still_reported() {
        let s = session_with(&[("X", true)]);
        let results = analyze_domain_coverage(
            &s,
            &[],
            &EstimatorConfig::default(),
            &CoverageThresholds::default(),
        );
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].code, "X");
        assert_eq!(results[0].weight, 0.0);
    }

    #[test]
    fn tags_follow_accuracy_thresholds() {
        let t = CoverageThresholds::default();
        assert_eq!(tag_for(4, 0.25, &t), DomainTag::StudyRequired);
        assert_eq!(tag_for(4, 0.5, &t), DomainTag::PracticeRecommended);
        assert_eq!(tag_for(4, 0.75, &t), DomainTag::Maintain);
        assert_eq!(tag_for(0, 1.0, &t), DomainTag::StudyRequired);
    }

    #[test]
    fn sub_ability_reflects_domain_responses() {
        let s = session_with(&[("A", true), ("A", true), ("B", false), ("B", false)]);
        let domains = vec![domain("A", 50.0, false), domain("B", 50.0, false)];
        let results = analyze_domain_coverage(
            &s,
            &domains,
            &EstimatorConfig::default(),
            &CoverageThresholds::default(),
        );
        assert!(result(&results, "A").sub_ability > 0.0);
        assert!(result(&results, "B").sub_ability < 0.0);
    }

    #[test]
    fn readiness_tiers() {
        let t = ReadinessThresholds::default();
        assert_eq!(t.classify(1.8, 0.85), ReadinessLevel::High);
        assert_eq!(t.classify(0.8, 0.65), ReadinessLevel::Medium);
        assert_eq!(t.classify(-0.5, 0.35), ReadinessLevel::Low);
        // High θ alone is not enough.
        assert_eq!(t.classify(2.0, 0.7), ReadinessLevel::Medium);
    }

    #[test]
    fn readiness_thresholds_are_configurable() {
        let strict = ReadinessThresholds {
            high: TierThreshold {
                min_theta: 2.5,
                min_accuracy: 0.9,
            },
            ..Default::default()
        };
        assert_eq!(strict.classify(1.8, 0.85), ReadinessLevel::Medium);
    }

    #[test]
    fn readiness_score_and_gaps() {
        let results = vec![
            DomainResult {
                code: "CRIT".into(),
                name: "Critical".into(),
                weight: 30.0,
                is_critical: true,
                answered: 2,
                correct: 0,
                accuracy: 0.0,
                sub_ability: -1.0,
                tag: DomainTag::StudyRequired,
            },
            DomainResult {
                code: "A".into(),
                name: "A".into(),
                weight: 70.0,
                is_critical: false,
                answered: 2,
                correct: 0,
                accuracy: 0.0,
                sub_ability: -1.0,
                tag: DomainTag::StudyRequired,
            },
        ];
        let r = assess_readiness(
            0.0,
            0.5,
            &results,
            &ReadinessThresholds::default(),
            &EstimatorConfig::default(),
        );
        assert_eq!(r.level, ReadinessLevel::Low);
        // 0.6 * 50 + 0.4 * 50
        assert!((r.score - 50.0).abs() < 1e-9);
        assert_eq!(r.critical_gaps, vec!["CRIT".to_string()]);
        assert!(!r.message.is_empty());
    }

    #[test]
    fn scaled_score_spans_range() {
        let e = EstimatorConfig::default();
        assert_eq!(scaled_score(-3.0, &e), 0.0);
        assert_eq!(scaled_score(3.0, &e), 100.0);
        assert!((scaled_score(0.0, &e) - 50.0).abs() < 1e-12);
        assert_eq!(scaled_score(f64::NAN, &e), 0.0);
    }

    #[test]
    fn recommendations_skip_maintained_domains() {
        let make = |code: &str, tag: DomainTag, weight: f64| DomainResult {
            code: code.into(),
            name: code.into(),
            weight,
            is_critical: false,
            answered: 4,
            correct: 2,
            accuracy: 0.5,
            sub_ability: 0.0,
            tag,
        };
        let results = vec![
            make("keep", DomainTag::Maintain, 50.0),
            make("practice", DomainTag::PracticeRecommended, 30.0),
            make("study", DomainTag::StudyRequired, 20.0),
        ];
        let recs = generate_recommendations(&results);
        assert_eq!(recs.len(), 2);
        assert_eq!(recs[0].domain, "study");
        assert_eq!(recs[0].priority, Priority::High);
        assert_eq!(recs[1].domain, "practice");
        assert_eq!(recs[1].priority, Priority::Medium);
        assert!(recs.iter().all(|r| r.domain != "keep"));
    }

    #[test]
    fn untouched_domain_gets_specific_message() {
        let results = vec![DomainResult {
            code: "C".into(),
            name: "Cardiology".into(),
            weight: 10.0,
            is_critical: false,
            answered: 0,
            correct: 0,
            accuracy: 0.0,
            sub_ability: 0.0,
            tag: DomainTag::StudyRequired,
        }];
        let recs = generate_recommendations(&results);
        assert!(recs[0].message.contains("No questions from Cardiology"));
    }
}
