//! # Transition Cost Model
//!
//! ```text
//! cost(cur → cand) = Σ flip_costs[f]  for f where cur and cand differ   (structural)
//!                  − frequency_weight · ln(max(cand.frequency, 1))        (frequency)
//!                  + inertia                                             (constant)
//!
//! P(cand) = exp(−cost/T) / Σ_k exp(−cost_k/T)
//! ```
//!
//! Lower cost is more likely. A positive `frequency_weight` lowers the cost of
//! common candidates (favoring them); a negative one favors rare candidates.
//! Frequency 0 is clamped to 1 so the log term is 0 rather than −∞.
//!
//! `inertia` is the same for every candidate of a step, so it shifts costs
//! without changing probabilities. It is kept as a separate term so cost
//! breakdowns stay comparable across profiles.

use serde::{Deserialize, Serialize};

use crate::model::token::log_frequency;
use crate::model::*;
use crate::{Error, Result};

// ============================================================================
// Weights
// ============================================================================

/// Cost model configuration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CostWeights {
    /// Cost of flipping each feature, in bit order.
    pub flip_costs: [f64; FEATURE_COUNT],
    /// Signed frequency bias. `> 0` favors common, `< 0` favors rare.
    pub frequency_weight: f64,
    /// Constant per-transition bias.
    pub inertia: f64,
}

impl Default for CostWeights {
    fn default() -> Self {
        Self::uniform(1.0)
    }
}

impl CostWeights {
    /// Same flip cost for every feature, neutral frequency, no inertia.
    pub fn uniform(flip_cost: f64) -> Self {
        Self { flip_costs: [flip_cost; FEATURE_COUNT], frequency_weight: 0.0, inertia: 0.0 }
    }

    pub fn with_frequency_weight(mut self, weight: f64) -> Self {
        self.frequency_weight = weight;
        self
    }

    pub fn with_flip_cost(mut self, feature: Feature, cost: f64) -> Self {
        self.flip_costs[feature.index()] = cost;
        self
    }

    pub fn with_inertia(mut self, inertia: f64) -> Self {
        self.inertia = inertia;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if let Some(f) = self.flip_costs.iter().position(|c| !c.is_finite()) {
            return Err(Error::validation(
                "flip_costs",
                format!("flip cost for {} is not finite", Feature::ALL[f]),
            ));
        }
        if !self.frequency_weight.is_finite() {
            return Err(Error::validation("frequency_weight", "must be finite"));
        }
        if !self.inertia.is_finite() {
            return Err(Error::validation("inertia", "must be finite"));
        }
        Ok(())
    }

    /// Structural term alone.
    pub fn structural(&self, current: FeatureVector, candidate: FeatureVector) -> f64 {
        current
            .differing(candidate)
            .iter()
            .map(|f| self.flip_costs[f.index()])
            .sum()
    }
}

// ============================================================================
// Cost
// ============================================================================

/// Per-term cost of one candidate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CostBreakdown {
    pub structural: f64,
    pub frequency: f64,
    pub inertia: f64,
}

impl CostBreakdown {
    pub fn total(&self) -> f64 {
        self.structural + self.frequency + self.inertia
    }
}

/// Cost terms from raw parts; the walk engine calls this with graph snapshots.
pub fn cost_parts(
    current: FeatureVector,
    candidate: FeatureVector,
    candidate_frequency: u64,
    weights: &CostWeights,
) -> CostBreakdown {
    CostBreakdown {
        structural: weights.structural(current, candidate),
        frequency: -weights.frequency_weight * log_frequency(candidate_frequency),
        inertia: weights.inertia,
    }
}

/// Transition cost `current → candidate`.
pub fn cost(current: &TokenRecord, candidate: &TokenRecord, weights: &CostWeights) -> f64 {
    cost_parts(current.features, candidate.features, candidate.frequency, weights).total()
}

// ============================================================================
// Softmax
// ============================================================================

/// Temperature must be finite and strictly positive.
pub fn validate_temperature(temperature: f64) -> Result<()> {
    if !(temperature.is_finite() && temperature > 0.0) {
        return Err(Error::validation(
            "temperature",
            format!("must be finite and > 0, got {temperature}"),
        ));
    }
    Ok(())
}

/// `exp(−c/T) / Σ exp(−c_k/T)` over `costs`, computed relative to the minimum
/// cost so the largest exponent is 0. Empty input gives an empty vector.
pub fn softmax(costs: &[f64], temperature: f64) -> Result<Vec<f64>> {
    validate_temperature(temperature)?;
    if costs.is_empty() {
        return Ok(Vec::new());
    }
    let min = costs.iter().copied().fold(f64::INFINITY, f64::min);
    let weights: Vec<f64> = costs.iter().map(|c| (-(c - min) / temperature).exp()).collect();
    // the minimum-cost entry contributes exp(0) = 1, so sum >= 1
    let sum: f64 = weights.iter().sum();
    Ok(weights.into_iter().map(|w| w / sum).collect())
}

/// Index whose cumulative probability first exceeds `u` (`u` in `[0, 1)`).
/// Falls back to the last index if rounding leaves the total just under `u`.
pub(crate) fn pick(probabilities: &[f64], u: f64) -> usize {
    let mut acc = 0.0;
    for (i, p) in probabilities.iter().enumerate() {
        acc += p;
        if u < acc {
            return i;
        }
    }
    probabilities.len().saturating_sub(1)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn tok(text: &str, freq: u64, bits: u16) -> TokenRecord {
        TokenRecord::new(text, freq, FeatureVector::from_bits(bits).unwrap())
    }

    #[test]
    fn structural_term_sums_per_feature_costs() {
        let w = CostWeights::uniform(1.0)
            .with_flip_cost(Feature::HasOnset, 0.25)
            .with_flip_cost(Feature::OnsetVoiced, 4.0);
        let a = tok("a", 1, 0b000);
        let b = tok("b", 1, 0b101);
        assert_eq!(cost(&a, &b, &w), 4.25);
    }

    #[test]
    fn positive_frequency_weight_favors_common() {
        let w = CostWeights::uniform(1.0).with_frequency_weight(1.0);
        let cur = tok("cur", 5, 0b00);
        let common = tok("common", 1000, 0b01);
        let rare = tok("rare", 2, 0b10);
        assert!(cost(&cur, &common, &w) < cost(&cur, &rare, &w));

        let w = w.with_frequency_weight(-1.0);
        assert!(cost(&cur, &common, &w) > cost(&cur, &rare, &w));
    }

    #[test]
    fn zero_frequency_weight_ignores_frequency() {
        let w = CostWeights::uniform(1.3);
        let cur = tok("cur", 5, 0b0110);
        let a = tok("a", 1, 0b0111);
        let b = tok("b", 1_000_000, 0b0111);
        assert_eq!(cost(&cur, &a, &w), cost(&cur, &b, &w));
    }

    #[test]
    fn zero_frequency_is_clamped() {
        let w = CostWeights::uniform(1.0).with_frequency_weight(3.0);
        let cur = tok("cur", 5, 0);
        let never = tok("never", 0, 1);
        let c = cost(&cur, &never, &w);
        assert!(c.is_finite());
        assert_eq!(c, 1.0);
    }

    #[test]
    fn inertia_is_added_verbatim() {
        let w = CostWeights::uniform(1.0).with_inertia(0.5);
        let parts = cost_parts(FeatureVector::EMPTY, FeatureVector::from_bits(1).unwrap(), 1, &w);
        assert_eq!(parts.inertia, 0.5);
        assert_eq!(parts.total(), 1.5);
    }

    #[test]
    fn softmax_sums_to_one_and_prefers_low_cost() {
        let p = softmax(&[1.0, 2.0, 3.0], 1.0).unwrap();
        let total: f64 = p.iter().sum();
        assert!((total - 1.0).abs() < 1e-12);
        assert!(p[0] > p[1] && p[1] > p[2]);
    }

    #[test]
    fn low_temperature_sharpens() {
        let cold = softmax(&[1.0, 2.0], 0.1).unwrap();
        let hot = softmax(&[1.0, 2.0], 10.0).unwrap();
        assert!(cold[0] > hot[0]);
        assert!(cold[0] > 0.99);
        assert!((hot[0] - 0.5).abs() < 0.05);
    }

    #[test]
    fn softmax_is_shift_invariant() {
        let a = softmax(&[1.0, 2.0, 4.0], 0.7).unwrap();
        let b = softmax(&[101.0, 102.0, 104.0], 0.7).unwrap();
        for (x, y) in a.iter().zip(&b) {
            assert!((x - y).abs() < 1e-12);
        }
    }

    #[test]
    fn softmax_handles_extreme_costs() {
        let p = softmax(&[0.0, 5000.0], 0.01).unwrap();
        assert_eq!(p[0], 1.0);
        assert_eq!(p[1], 0.0);
    }

    #[test]
    fn non_positive_temperature_rejected() {
        for t in [0.0, -1.0, f64::NAN, f64::INFINITY] {
            assert!(softmax(&[1.0], t).is_err(), "temperature {t}");
        }
    }

    #[test]
    fn pick_walks_cumulative_mass() {
        let p = [0.2, 0.5, 0.3];
        assert_eq!(pick(&p, 0.0), 0);
        assert_eq!(pick(&p, 0.19), 0);
        assert_eq!(pick(&p, 0.2), 1);
        assert_eq!(pick(&p, 0.69), 1);
        assert_eq!(pick(&p, 0.99), 2);
        assert_eq!(pick(&[0.5, 0.4999999], 0.9999999999), 1);
    }

    #[test]
    fn weights_validation() {
        assert!(CostWeights::default().validate().is_ok());
        let bad = CostWeights::default().with_flip_cost(Feature::Diphthong, f64::NAN);
        assert!(matches!(bad.validate(), Err(Error::Validation { field: "flip_costs", .. })));
        assert!(CostWeights::default().with_frequency_weight(f64::INFINITY).validate().is_err());
    }
}
