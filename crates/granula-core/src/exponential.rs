//! Exponential mechanism over scored candidates.
//!
//! Candidate `i` is drawn with probability proportional to
//! `exp(epsilon * score_i / 2)`. Scores arrive as exact rationals and are
//! converted to doubles only when the conversion is certified to be within
//! one ulp of the exact value.

use std::collections::BTreeMap;

use num_rational::BigRational;
use num_traits::{Signed, ToPrimitive};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::debug;

use crate::error::{AnonError, AnonResult};
use crate::interval::ulp;

/// Converts an exact rational to the nearest double, failing when the double
/// is not finite or differs from the rational by more than one ulp.
pub fn to_certified_f64(value: &BigRational) -> AnonResult<f64> {
    let d = value
        .to_f64()
        .filter(|d| d.is_finite())
        .ok_or_else(|| AnonError::NotRepresentable(value.to_string()))?;
    let exact = BigRational::from_float(d).ok_or_else(|| AnonError::NotRepresentable(value.to_string()))?;
    let tolerance =
        BigRational::from_float(ulp(d)).ok_or_else(|| AnonError::NotRepresentable(value.to_string()))?;
    if (value - exact).abs() > tolerance {
        return Err(AnonError::PrecisionLoss(value.to_string()));
    }
    Ok(d)
}

/// Randomized selection with a fixed per-draw privacy budget.
#[derive(Debug)]
pub struct ExponentialMechanism {
    epsilon: f64,
    rng: StdRng,
}

impl ExponentialMechanism {
    /// Creates the mechanism. With `deterministic` the generator is seeded
    /// from `seed`, otherwise from operating-system entropy.
    pub fn new(epsilon: f64, deterministic: bool, seed: u64) -> Self {
        let rng = if deterministic {
            StdRng::seed_from_u64(seed)
        } else {
            StdRng::from_entropy()
        };
        Self { epsilon, rng }
    }

    /// Budget spent per draw.
    pub fn epsilon(&self) -> f64 {
        self.epsilon
    }

    /// Draws one key. Candidates are visited in key order, so equal seeds and
    /// equal candidate sets always yield the same key.
    pub fn select<K: Copy + Ord + std::fmt::Debug>(&mut self, candidates: &BTreeMap<K, f64>) -> Option<K> {
        let max = candidates.values().copied().fold(f64::NEG_INFINITY, f64::max);
        if !max.is_finite() {
            return None;
        }
        // shifting by the maximum keeps every weight in (0, 1]
        let weights: Vec<(K, f64)> = candidates
            .iter()
            .map(|(&k, &s)| (k, (self.epsilon * (s - max) / 2.0).exp()))
            .collect();
        let total: f64 = weights.iter().map(|(_, w)| w).sum();
        let mut target = self.rng.gen::<f64>() * total;
        let mut selected = None;
        for (key, weight) in &weights {
            selected = Some(*key);
            if target < *weight {
                break;
            }
            target -= weight;
        }
        debug!(candidates = candidates.len(), ?selected, "exponential mechanism draw");
        selected
    }
}
