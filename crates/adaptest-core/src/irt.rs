//! 3-parameter logistic item response functions.
//!
//! `P(θ) = c + (1 − c) / (1 + exp(−a·(θ − b)))`
//!
//! Both functions fail soft: a malformed calibration yields a neutral value
//! instead of an error so one bad item cannot abort a live session.

use crate::model::{Item, ItemParameters};

/// Bound on `|a·(θ − b)|` before exponentiation.
const MAX_EXPONENT: f64 = 30.0;

/// Probabilities below this are treated as zero when computing information.
const MIN_PROBABILITY: f64 = 1e-12;

/// Largest value strictly below one.
const BELOW_ONE: f64 = 1.0 - f64::EPSILON;

#[inline]
fn logistic(z: f64) -> f64 {
    let z = z.clamp(-MAX_EXPONENT, MAX_EXPONENT);
    1.0 / (1.0 + (-z).exp())
}

impl ItemParameters {
    /// Probability of a correct response at ability `theta`.
    ///
    /// For valid parameters the result lies in `[c, 1)`.
    pub fn probability_correct(&self, theta: f64) -> f64 {
        let c = self.guessing;
        let z = self.discrimination * (theta - self.difficulty);
        let p = c + (1.0 - c) * logistic(z);
        p.min(BELOW_ONE)
    }

    /// Fisher information of the item at ability `theta`.
    ///
    /// `I(θ) = a² · ((p − c)/(1 − c))² · (1 − p)/p`. Returns 0 for invalid
    /// parameters, vanishing `p`, or a non-finite result.
    pub fn fisher_information(&self, theta: f64) -> f64 {
        if !self.is_valid() || !theta.is_finite() {
            return 0.0;
        }
        let a = self.discrimination;
        let c = self.guessing;
        let p = self.probability_correct(theta);
        if p < MIN_PROBABILITY {
            return 0.0;
        }
        let ratio = (p - c) / (1.0 - c);
        let info = a * a * ratio * ratio * (1.0 - p) / p;
        if info.is_finite() && info >= 0.0 {
            info
        } else {
            0.0
        }
    }
}

impl Item {
    pub fn probability_correct(&self, theta: f64) -> f64 {
        self.params.probability_correct(theta)
    }

    pub fn fisher_information(&self, theta: f64) -> f64 {
        self.params.fisher_information(theta)
    }
}

/// Test information: the sum of item information at `theta`.
pub fn test_information<'a>(params: impl IntoIterator<Item = &'a ItemParameters>, theta: f64) -> f64 {
    params
        .into_iter()
        .map(|p| p.fisher_information(theta))
        .sum()
}
