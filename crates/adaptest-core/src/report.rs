//! Final diagnostic report with JSON persistence and attempt-to-attempt
//! comparison.

use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::AdaptestConfig;
use crate::coverage::{
    analyze_domain_coverage, assess_session_readiness, generate_recommendations, scaled_score,
    DomainResult, Readiness, Recommendation,
};
use crate::model::{AbilityEstimate, Domain, SessionType, StopReason};
use crate::session::DiagnosticSession;

/// Everything a caller gets back when a session is completed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiagnosticReport {
    pub session_id: Uuid,
    pub user_id: String,
    pub session_type: SessionType,
    pub stop_reason: Option<StopReason>,
    pub questions_answered: u32,
    pub correct: u32,
    pub accuracy: f64,
    /// θ mapped onto 0–100.
    pub final_score: f64,
    pub ability: AbilityEstimate,
    pub domain_results: Vec<DomainResult>,
    pub readiness: Readiness,
    pub recommendations: Vec<Recommendation>,
    /// Mean response latency in milliseconds.
    pub avg_response_time_ms: u64,
    pub started_at: DateTime<Utc>,
    pub generated_at: DateTime<Utc>,
}

/// Assemble the report for a finished (or finishing) session.
pub fn build_report(
    session: &DiagnosticSession,
    domains: &[Domain],
    config: &AdaptestConfig,
) -> DiagnosticReport {
    let domain_results =
        analyze_domain_coverage(session, domains, &config.estimator, &config.coverage);
    let readiness =
        assess_session_readiness(session, &domain_results, &config.readiness, &config.estimator);
    let recommendations = generate_recommendations(&domain_results);

    let avg_response_time_ms = if session.answers.is_empty() {
        0
    } else {
        session
            .answers
            .iter()
            .map(|a| a.response_time_ms)
            .sum::<u64>()
            / session.answers.len() as u64
    };

    DiagnosticReport {
        session_id: session.id,
        user_id: session.user_id.clone(),
        session_type: session.session_type.clone(),
        stop_reason: session.stop_reason,
        questions_answered: session.questions_answered(),
        correct: session.correct_count(),
        accuracy: session.accuracy(),
        final_score: scaled_score(session.ability.theta, &config.estimator),
        ability: session.ability,
        domain_results,
        readiness,
        recommendations,
        avg_response_time_ms,
        started_at: session.started_at,
        generated_at: Utc::now(),
    }
}

impl DiagnosticReport {
    /// Save the report as JSON to a file.
    pub fn save_json(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self).context("failed to serialize report")?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, json)
            .with_context(|| format!("failed to write report to {}", path.display()))?;
        Ok(())
    }

    /// Load a report from a JSON file.
    pub fn load_json(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read report from {}", path.display()))?;
        let report: DiagnosticReport =
            serde_json::from_str(&content).context("failed to parse report JSON")?;
        Ok(report)
    }

    /// Compare this attempt against an earlier one.
    ///
    /// Domains whose accuracy moved by more than `threshold` are listed as
    /// gains or declines.
    pub fn compare(&self, baseline: &DiagnosticReport, threshold: f64) -> ProgressReport {
        let baseline_domains: HashMap<&str, &DomainResult> = baseline
            .domain_results
            .iter()
            .map(|d| (d.code.as_str(), d))
            .collect();
        let current_domains: HashMap<&str, &DomainResult> = self
            .domain_results
            .iter()
            .map(|d| (d.code.as_str(), d))
            .collect();

        let mut gains = Vec::new();
        let mut declines = Vec::new();
        let mut unchanged = 0usize;
        let mut new_domains = 0usize;

        for current in &self.domain_results {
            let Some(before) = baseline_domains.get(current.code.as_str()) else {
                new_domains += 1;
                continue;
            };
            // Untouched domains carry no signal either way.
            if before.answered == 0 || current.answered == 0 {
                unchanged += 1;
                continue;
            }
            let delta = current.accuracy - before.accuracy;
            let change = DomainChange {
                domain: current.code.clone(),
                baseline_accuracy: before.accuracy,
                current_accuracy: current.accuracy,
                delta,
            };
            if delta > threshold {
                gains.push(change);
            } else if delta < -threshold {
                declines.push(change);
            } else {
                unchanged += 1;
            }
        }

        let dropped_domains = baseline_domains
            .keys()
            .filter(|k| !current_domains.contains_key(*k))
            .count();

        ProgressReport {
            theta_delta: self.ability.theta - baseline.ability.theta,
            score_delta: self.final_score - baseline.final_score,
            baseline_level: baseline.readiness.level.to_string(),
            current_level: self.readiness.level.to_string(),
            gains,
            declines,
            unchanged,
            new_domains,
            dropped_domains,
        }
    }
}

/// Result of comparing two attempts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressReport {
    pub theta_delta: f64,
    pub score_delta: f64,
    pub baseline_level: String,
    pub current_level: String,
    /// Domains where accuracy went up.
    pub gains: Vec<DomainChange>,
    /// Domains where accuracy went down.
    pub declines: Vec<DomainChange>,
    pub unchanged: usize,
    /// Domains in current but not baseline.
    pub new_domains: usize,
    /// Domains in baseline but not current.
    pub dropped_domains: usize,
}

/// Accuracy movement in one domain.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DomainChange {
    pub domain: String,
    pub baseline_accuracy: f64,
    pub current_accuracy: f64,
    pub delta: f64,
}

impl ProgressReport {
    /// Format the comparison as markdown.
    pub fn to_markdown(&self) -> String {
        let mut md = String::new();

        md.push_str(&format!(
            "**Summary:** θ {:+.2}, score {:+.1}, readiness {} → {}; {} gains, {} declines, {} unchanged\n\n",
            self.theta_delta,
            self.score_delta,
            self.baseline_level,
            self.current_level,
            self.gains.len(),
            self.declines.len(),
            self.unchanged
        ));

        if !self.declines.is_empty() {
            md.push_str("### Declines\n\n");
            md.push_str("| Domain | Baseline | Current | Delta |\n");
            md.push_str("|--------|----------|---------|-------|\n");
            for d in &self.declines {
                md.push_str(&format!(
                    "| {} | {:.1}% | {:.1}% | {:.1}% |\n",
                    d.domain,
                    d.baseline_accuracy * 100.0,
                    d.current_accuracy * 100.0,
                    d.delta * 100.0
                ));
            }
            md.push('\n');
        }

        if !self.gains.is_empty() {
            md.push_str("### Gains\n\n");
            md.push_str("| Domain | Baseline | Current | Delta |\n");
            md.push_str("|--------|----------|---------|-------|\n");
            for g in &self.gains {
                md.push_str(&format!(
                    "| {} | {:.1}% | {:.1}% | +{:.1}% |\n",
                    g.domain,
                    g.baseline_accuracy * 100.0,
                    g.current_accuracy * 100.0,
                    g.delta * 100.0
                ));
            }
        }

        md
    }

    pub fn has_declines(&self) -> bool {
        !self.declines.is_empty()
    }
}
