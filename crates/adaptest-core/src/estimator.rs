//! Sequential ability estimation.
//!
//! Each response moves θ along the sign of the 3PL log-likelihood gradient.
//! The move is the bounded step scaled by the item's share of precision,
//! `I / (I + 1/SE²)`, so informative items move θ further and a settled
//! estimate moves less. Standard error follows the usual CAT update
//! `SE = 1/√(prior + ΣI)`.

use serde::{Deserialize, Serialize};

use crate::model::{AbilityEstimate, ItemParameters};

/// Tunables for [`AbilityEstimator`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EstimatorConfig {
    /// Lower bound for θ.
    pub theta_min: f64,
    /// Upper bound for θ.
    pub theta_max: f64,
    /// Largest move a single response may cause.
    pub max_step: f64,
    /// SE never reported below this.
    pub se_floor: f64,
    /// SE of the population prior, i.e. before any response.
    pub prior_se: f64,
}

impl Default for EstimatorConfig {
    fn default() -> Self {
        Self {
            theta_min: -3.0,
            theta_max: 3.0,
            max_step: 1.0,
            se_floor: 0.05,
            prior_se: 1.0,
        }
    }
}

/// Result of folding one response into an estimate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EstimateUpdate {
    pub estimate: AbilityEstimate,
    /// Total Fisher information after this response.
    pub total_information: f64,
    /// Information contributed by this response.
    pub item_information: f64,
}

/// One response to replay through the estimator.
#[derive(Debug, Clone, Copy)]
pub struct ScoredResponse {
    pub params: ItemParameters,
    pub is_correct: bool,
}

/// Stateless θ/SE updater.
#[derive(Debug, Clone, Copy, Default)]
pub struct AbilityEstimator {
    config: EstimatorConfig,
}

impl AbilityEstimator {
    pub fn new(config: EstimatorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &EstimatorConfig {
        &self.config
    }

    /// The estimate before any response.
    pub fn prior(&self) -> AbilityEstimate {
        AbilityEstimate::new(0.0, self.config.prior_se)
    }

    fn clamp_theta(&self, theta: f64) -> f64 {
        theta.clamp(self.config.theta_min, self.config.theta_max)
    }

    /// Move `theta` in response to one scored answer.
    ///
    /// Returns `theta` unchanged when the item parameters are invalid or any
    /// intermediate value is not finite.
    pub fn next_theta(&self, theta: f64, se: f64, is_correct: bool, params: &ItemParameters) -> f64 {
        if let Err(e) = params.validate() {
            tracing::warn!("skipping ability update for malformed item: {e}");
            return theta;
        }
        if !theta.is_finite() || !se.is_finite() || se <= 0.0 {
            tracing::warn!("skipping ability update for degenerate estimate θ={theta}, se={se}");
            return theta;
        }

        let a = params.discrimination;
        let c = params.guessing;
        let p = params.probability_correct(theta);
        let u = if is_correct { 1.0 } else { 0.0 };

        // d/dθ log L for one 3PL response
        let gradient = a * (u - p) * (p - c) / (p * (1.0 - c));
        let direction = if gradient > 0.0 {
            1.0
        } else if gradient < 0.0 {
            -1.0
        } else {
            0.0
        };
        let information = params.fisher_information(theta);
        let weight = information / (information + 1.0 / (se * se));
        let next = theta + direction * self.config.max_step * weight;

        if !next.is_finite() {
            tracing::warn!("non-finite ability step (gradient={gradient}, information={information})");
            return theta;
        }
        self.clamp_theta(next)
    }

    /// Standard error after `total_information` has been accumulated.
    pub fn standard_error(&self, total_information: f64) -> f64 {
        let prior_precision = 1.0 / (self.config.prior_se * self.config.prior_se);
        let information = if total_information.is_finite() {
            total_information.max(0.0)
        } else {
            0.0
        };
        (1.0 / (prior_precision + information).sqrt()).max(self.config.se_floor)
    }

    /// Fold one response into `estimate`.
    ///
    /// Information is evaluated at the θ the item was administered at.
    pub fn update(
        &self,
        estimate: AbilityEstimate,
        total_information: f64,
        is_correct: bool,
        params: &ItemParameters,
    ) -> EstimateUpdate {
        let theta = self.next_theta(estimate.theta, estimate.se, is_correct, params);
        let item_information = params.fisher_information(estimate.theta);
        let total_information = total_information + item_information;
        EstimateUpdate {
            estimate: AbilityEstimate::new(theta, self.standard_error(total_information)),
            total_information,
            item_information,
        }
    }

    /// Replay a response sequence from the prior.
    pub fn replay<'a>(&self, responses: impl IntoIterator<Item = &'a ScoredResponse>) -> AbilityEstimate {
        let mut estimate = self.prior();
        let mut information = 0.0;
        for r in responses {
            let step = self.update(estimate, information, r.is_correct, &r.params);
            estimate = step.estimate;
            information = step.total_information;
        }
        estimate
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn estimator() -> AbilityEstimator {
        AbilityEstimator::default()
    }

    #[test]
    fn correct_beats_incorrect_from_same_start() {
        let est = estimator();
        let items = [
            ItemParameters::new(1.0, 0.0, 0.0),
            ItemParameters::new(2.5, -1.0, 0.25),
            ItemParameters::new(0.6, 2.0, 0.1),
        ];
        for params in &items {
            for &theta in &[-2.5, -1.0, 0.0, 0.4, 1.7, 2.5] {
                let up = est.next_theta(theta, 0.8, true, params);
                let down = est.next_theta(theta, 0.8, false, params);
                assert!(up > down, "θ={theta} {params:?}: {up} <= {down}");
                assert!(up >= theta);
                assert!(down <= theta);
            }
        }
    }

    #[test]
    fn malformed_item_leaves_theta_unchanged() {
        let est = estimator();
        for params in [
            ItemParameters::new(0.0, 0.0, 0.2),
            ItemParameters::new(1.0, f64::NAN, 0.2),
            ItemParameters::new(1.0, 0.0, 1.5),
        ] {
            assert_eq!(est.next_theta(0.7, 0.5, true, &params), 0.7);
            assert_eq!(est.next_theta(0.7, 0.5, false, &params), 0.7);
        }
    }

    #[test]
    fn malformed_item_adds_no_information() {
        let est = estimator();
        let prior = AbilityEstimate::new(0.3, 0.6);
        let out = est.update(prior, 2.0, true, &ItemParameters::new(-1.0, 0.0, 0.0));
        assert_eq!(out.estimate.theta, 0.3);
        assert_eq!(out.total_information, 2.0);
        assert_eq!(out.item_information, 0.0);
    }

    #[test]
    fn result_is_clamped_to_range() {
        let est = estimator();
        let easy = ItemParameters::new(3.0, 3.0, 0.0);
        let theta = est.next_theta(2.95, 5.0, true, &easy);
        assert!(theta <= 3.0);
        let hard = ItemParameters::new(3.0, -3.0, 0.0);
        let theta = est.next_theta(-2.95, 5.0, false, &hard);
        assert!(theta >= -3.0);
    }

    #[test]
    fn higher_certainty_means_smaller_step() {
        let est = estimator();
        let params = ItemParameters::new(1.2, 0.0, 0.2);
        let uncertain = est.next_theta(0.0, 1.0, true, &params);
        let certain = est.next_theta(0.0, 0.2, true, &params);
        assert!(uncertain > certain);
        assert!(certain > 0.0);
    }

    #[test]
    fn higher_discrimination_moves_further() {
        let est = estimator();
        let flat = est.next_theta(0.0, 1.0, true, &ItemParameters::new(0.5, 0.0, 0.0));
        let sharp = est.next_theta(0.0, 1.0, true, &ItemParameters::new(2.0, 0.0, 0.0));
        assert!(sharp > flat);
    }

    #[test]
    fn more_informative_item_moves_further() {
        let est = estimator();
        let peak = ItemParameters::new(1.0, 0.0, 0.0);
        let off = ItemParameters::new(1.0, 0.5, 0.0);
        assert!(peak.fisher_information(0.0) > off.fisher_information(0.0));

        let up_peak = est.next_theta(0.0, 1.0, true, &peak);
        let up_off = est.next_theta(0.0, 1.0, true, &off);
        assert!(up_peak > up_off, "{up_peak} <= {up_off}");

        let down_peak = est.next_theta(0.0, 1.0, false, &peak);
        let down_off = est.next_theta(0.0, 1.0, false, &off);
        assert!(down_peak < down_off, "{down_peak} >= {down_off}");

        let guess_peak = ItemParameters::new(1.4, 0.3, 0.2);
        let guess_off = ItemParameters::new(1.4, 2.0, 0.2);
        assert!(
            est.next_theta(0.3, 0.7, true, &guess_peak) - 0.3
                > est.next_theta(0.3, 0.7, true, &guess_off) - 0.3
        );
    }

    #[test]
    fn step_never_exceeds_bound() {
        let est = estimator();
        let sharp = ItemParameters::new(3.0, 0.0, 0.0);
        let theta = est.next_theta(0.0, 50.0, true, &sharp);
        assert!(theta > 0.0 && theta <= est.config().max_step);
    }

    #[test]
    fn standard_error_decreases_with_information() {
        let est = estimator();
        assert!((est.standard_error(0.0) - 1.0).abs() < 1e-12);
        let mut prev = est.standard_error(0.0);
        for i in 1..50 {
            let se = est.standard_error(i as f64 * 0.4);
            assert!(se <= prev);
            prev = se;
        }
        assert!((est.standard_error(1e9) - est.config().se_floor).abs() < 1e-12);
        assert!((est.standard_error(f64::NAN) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn replay_tracks_response_pattern() {
        let est = estimator();
        let params = ItemParameters::new(1.5, 0.0, 0.2);
        let all_right: Vec<ScoredResponse> = (0..8)
            .map(|_| ScoredResponse {
                params,
                is_correct: true,
            })
            .collect();
        let all_wrong: Vec<ScoredResponse> = (0..8)
            .map(|_| ScoredResponse {
                params,
                is_correct: false,
            })
            .collect();
        let high = est.replay(&all_right);
        let low = est.replay(&all_wrong);
        assert!(high.theta > 0.5);
        assert!(low.theta < -0.5);
        assert!(high.se < 1.0);
        assert_eq!(est.replay(std::iter::empty()), est.prior());
    }
}
