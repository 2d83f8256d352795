//! Game-theoretic cost-benefit model for publisher and adversary payoffs.

use serde::{Deserialize, Serialize};

/// Monetary parameters of the publisher/adversary game.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CostBenefitConfig {
    /// Benefit the publisher gains from publishing one record without loss.
    pub publisher_benefit: f64,
    /// Loss the publisher suffers when a record is re-identified.
    pub publisher_loss: f64,
    /// Gain of the adversary for a successful re-identification.
    pub adversary_gain: f64,
    /// Cost of one re-identification attempt.
    pub adversary_cost: f64,
}

impl Default for CostBenefitConfig {
    fn default() -> Self {
        Self {
            publisher_benefit: 1200.0,
            publisher_loss: 300.0,
            adversary_gain: 300.0,
            adversary_cost: 4.0,
        }
    }
}

/// Expected payoffs for a record with a given information loss and success probability.
#[derive(Debug, Clone, Copy)]
pub struct RiskModelCostBenefit {
    config: CostBenefitConfig,
}

impl RiskModelCostBenefit {
    /// Creates the model.
    pub fn new(config: CostBenefitConfig) -> Self {
        Self { config }
    }

    /// Adversary payoff for one attack attempt.
    pub fn expected_adversary_payout(&self, success_probability: f64) -> f64 {
        self.config.adversary_gain * success_probability - self.config.adversary_cost
    }

    /// Publisher payoff; the adversary only attacks when its expected payoff is positive.
    pub fn expected_publisher_payout(&self, information_loss: f64, success_probability: f64) -> f64 {
        let mut payout = self.config.publisher_benefit * (1.0 - information_loss);
        if self.expected_adversary_payout(success_probability) > 0.0 {
            payout -= self.config.publisher_loss * success_probability;
        }
        payout
    }

    /// The configured parameters.
    pub fn config(&self) -> &CostBenefitConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_attack_when_unprofitable() {
        let m = RiskModelCostBenefit::new(CostBenefitConfig {
            publisher_benefit: 10.0,
            publisher_loss: 100.0,
            adversary_gain: 10.0,
            adversary_cost: 5.0,
        });
        // 10 * 0.25 - 5 < 0: no attack
        assert_eq!(m.expected_publisher_payout(0.5, 0.25), 5.0);
    }

    #[test]
    fn test_attack_reduces_payout() {
        let m = RiskModelCostBenefit::new(CostBenefitConfig {
            publisher_benefit: 10.0,
            publisher_loss: 100.0,
            adversary_gain: 10.0,
            adversary_cost: 1.0,
        });
        // adversary: 10 * 0.5 - 1 > 0, publisher: 10 * 0.5 - 100 * 0.5
        assert_eq!(m.expected_publisher_payout(0.5, 0.5), -45.0);
    }

    #[test]
    fn test_full_loss_has_no_benefit() {
        let m = RiskModelCostBenefit::new(CostBenefitConfig::default());
        assert!(m.expected_publisher_payout(1.0, 0.01) <= 0.0);
    }
}
