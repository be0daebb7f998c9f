//! Maximum-information item selection with blueprint constraints.

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::model::{Domain, Item};
use crate::session::DomainTally;

/// Tunables for [`ItemSelector`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectorConfig {
    /// Information values closer than this are considered tied.
    pub tie_epsilon: f64,
    /// Whether critical domains are forced up to their `min_coverage`.
    pub enforce_critical_coverage: bool,
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self {
            tie_epsilon: 1e-9,
            enforce_critical_coverage: true,
        }
    }
}

/// Everything the selector needs to know about the session so far.
#[derive(Debug, Clone, Copy)]
pub struct SelectionContext<'a> {
    /// Items already administered in this session.
    pub administered: &'a HashSet<String>,
    /// Per-domain answered/correct counts.
    pub tally: &'a BTreeMap<String, DomainTally>,
    /// Blueprint domains.
    pub domains: &'a [Domain],
    /// Times each item has been served across all sessions.
    pub exposures: &'a HashMap<String, u64>,
}

impl SelectionContext<'_> {
    fn answered_in(&self, domain: &str) -> u32 {
        self.tally.get(domain).map(|t| t.answered).unwrap_or(0)
    }

    fn exposure(&self, item_id: &str) -> u64 {
        self.exposures.get(item_id).copied().unwrap_or(0)
    }

    /// Blueprint share minus realised share; positive means under-covered.
    fn coverage_deficit(&self, domain: &str) -> f64 {
        let total_weight: f64 = self.domains.iter().map(|d| d.weight.max(0.0)).sum();
        let target = if total_weight > 0.0 {
            self.domains
                .iter()
                .find(|d| d.code == domain)
                .map(|d| d.weight.max(0.0) / total_weight)
                .unwrap_or(0.0)
        } else {
            0.0
        };
        let total_answered: u32 = self.tally.values().map(|t| t.answered).sum();
        let actual = if total_answered > 0 {
            self.answered_in(domain) as f64 / total_answered as f64
        } else {
            0.0
        };
        target - actual
    }

    /// Critical domains still below their minimum coverage.
    fn deficient_critical_domains(&self) -> HashSet<&str> {
        self.domains
            .iter()
            .filter(|d| d.is_critical && self.answered_in(&d.code) < d.min_coverage)
            .map(|d| d.code.as_str())
            .collect()
    }
}

/// Picks the next item for a session.
#[derive(Debug, Clone, Copy, Default)]
pub struct ItemSelector {
    config: SelectorConfig,
}

struct Candidate<'a> {
    item: &'a Item,
    information: f64,
    deficit: f64,
    exposure: u64,
}

impl ItemSelector {
    pub fn new(config: SelectorConfig) -> Self {
        Self { config }
    }

    /// Choose the most informative eligible item at `theta`.
    ///
    /// Returns `None` when nothing is eligible; the session treats that as
    /// forced completion.
    pub fn select_next<'p>(
        &self,
        pool: &'p [Item],
        theta: f64,
        ctx: &SelectionContext<'_>,
    ) -> Option<&'p Item> {
        let mut eligible: Vec<&Item> = pool
            .iter()
            .filter(|item| !ctx.administered.contains(&item.id))
            .collect();
        if eligible.is_empty() {
            return None;
        }

        if self.config.enforce_critical_coverage {
            let deficient = ctx.deficient_critical_domains();
            if !deficient.is_empty() {
                let restricted: Vec<&Item> = eligible
                    .iter()
                    .copied()
                    .filter(|item| deficient.contains(item.domain.as_str()))
                    .collect();
                if !restricted.is_empty() {
                    tracing::debug!(
                        domains = ?deficient,
                        candidates = restricted.len(),
                        "restricting selection to under-covered critical domains"
                    );
                    eligible = restricted;
                }
            }
        }

        let candidates: Vec<Candidate<'p>> = eligible
            .into_iter()
            .map(|item| Candidate {
                item,
                information: item.fisher_information(theta),
                deficit: ctx.coverage_deficit(&item.domain),
                exposure: ctx.exposure(&item.id),
            })
            .collect();

        let eps = self.config.tie_epsilon;
        candidates
            .iter()
            .min_by(|x, y| self.rank(x, y, eps))
            .map(|c| c.item)
    }

    /// Ordering where `Less` means "preferred".
    fn rank(&self, x: &Candidate<'_>, y: &Candidate<'_>, eps: f64) -> Ordering {
        if (x.information - y.information).abs() > eps {
            return y
                .information
                .partial_cmp(&x.information)
                .unwrap_or(Ordering::Equal);
        }
        y.deficit
            .partial_cmp(&x.deficit)
            .unwrap_or(Ordering::Equal)
            .then_with(|| x.exposure.cmp(&y.exposure))
            .then_with(|| x.item.id.cmp(&y.item.id))
    }
}
