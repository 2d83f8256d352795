//! Privacy criteria evaluated per equivalence class.
//!
//! A transformation is anonymous iff every configured criterion accepts
//! every class. The set of criteria is closed; [`PrivacyCriterion`] is the
//! tagged variant and [`PrivacyModel`] the per-operation interface.

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::config::CriterionConfig;
use crate::data_manager::DataManager;
use crate::domain_share::DomainShare;
use crate::error::{AnonError, AnonResult};
use crate::groupify::GroupifyEntry;
use crate::metric::{entropy_based_information_loss, maximal_entropy_based_information_loss};
use crate::report::ElementData;
use crate::risk::{CostBenefitConfig, RiskModelCostBenefit};

/// Requirement bits a criterion places on the grouping.
pub mod requirement {
    /// Per-class record count within the research subset.
    pub const COUNTER: u32 = 1 << 0;
    /// Per-class record count over the whole dataset.
    pub const SECONDARY_COUNTER: u32 = 1 << 1;
    /// Per-class sensitive-value distribution.
    pub const DISTRIBUTION: u32 = 1 << 2;
}

/// Operations every privacy criterion provides.
pub trait PrivacyModel {
    /// Prepares derived state from the input data.
    fn initialize(&mut self, manager: &DataManager) -> AnonResult<()>;

    /// Whether one class of the transformation with `levels` is admissible.
    fn is_anonymous(&self, levels: &[u32], entry: &GroupifyEntry) -> bool;

    /// Bitmask of [`requirement`] flags.
    fn requirements(&self) -> u32;

    /// Whether anonymity is preserved when generalizing further.
    fn is_monotonic_with_generalization(&self) -> bool;

    /// Summary for the certification report.
    fn render(&self) -> ElementData;
}

/// Record selection without a statistical guarantee; every class passes.
#[derive(Debug, Clone, Default)]
pub struct Inclusion {
    subset_size: Option<usize>,
}

impl Inclusion {
    /// Creates the criterion.
    pub fn new() -> Self {
        Self::default()
    }
}

impl PrivacyModel for Inclusion {
    fn initialize(&mut self, manager: &DataManager) -> AnonResult<()> {
        self.subset_size = Some(manager.subset_size());
        Ok(())
    }

    fn is_anonymous(&self, _levels: &[u32], _entry: &GroupifyEntry) -> bool {
        true
    }

    fn requirements(&self) -> u32 {
        requirement::COUNTER | requirement::SECONDARY_COUNTER
    }

    fn is_monotonic_with_generalization(&self) -> bool {
        true
    }

    fn render(&self) -> ElementData {
        let element = ElementData::new("Record selection");
        match self.subset_size {
            Some(size) => element.with_property("Number of records", size),
            None => element,
        }
    }
}

/// Every class must contain at least `k` records of the research subset.
#[derive(Debug, Clone)]
pub struct KAnonymity {
    k: usize,
}

impl KAnonymity {
    /// Creates the criterion with group-size threshold `k`.
    pub fn new(k: usize) -> Self {
        Self { k }
    }

    /// The group-size threshold.
    pub fn k(&self) -> usize {
        self.k
    }
}

impl PrivacyModel for KAnonymity {
    fn initialize(&mut self, _manager: &DataManager) -> AnonResult<()> {
        if self.k == 0 {
            return Err(AnonError::InvalidConfig("k must be at least 1".to_string()));
        }
        Ok(())
    }

    fn is_anonymous(&self, _levels: &[u32], entry: &GroupifyEntry) -> bool {
        entry.count >= self.k
    }

    fn requirements(&self) -> u32 {
        requirement::COUNTER
    }

    fn is_monotonic_with_generalization(&self) -> bool {
        true
    }

    fn render(&self) -> ElementData {
        ElementData::new("k-Anonymity").with_property("Threshold (k)", self.k)
    }
}

/// Every class must contain at least `l` distinct sensitive values.
#[derive(Debug, Clone)]
pub struct DistinctLDiversity {
    l: usize,
}

impl DistinctLDiversity {
    /// Creates the criterion.
    pub fn new(l: usize) -> Self {
        Self { l }
    }
}

impl PrivacyModel for DistinctLDiversity {
    fn initialize(&mut self, manager: &DataManager) -> AnonResult<()> {
        if self.l == 0 {
            return Err(AnonError::InvalidConfig("l must be at least 1".to_string()));
        }
        if manager.sensitive().is_none() {
            return Err(AnonError::InvalidConfig(
                "l-diversity requires a sensitive attribute".to_string(),
            ));
        }
        Ok(())
    }

    fn is_anonymous(&self, _levels: &[u32], entry: &GroupifyEntry) -> bool {
        entry
            .distribution
            .as_ref()
            .map(|d| d.distinct() >= self.l)
            .unwrap_or(false)
    }

    fn requirements(&self) -> u32 {
        requirement::COUNTER | requirement::DISTRIBUTION
    }

    fn is_monotonic_with_generalization(&self) -> bool {
        true
    }

    fn render(&self) -> ElementData {
        ElementData::new("Distinct l-diversity").with_property("Threshold (l)", self.l)
    }
}

/// Adversary model used to derive the re-identification probability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum AttackerModel {
    /// The adversary knows the target is in the dataset.
    #[default]
    Prosecutor,
    /// The adversary does not know whether the target is in the dataset.
    Journalist,
}

impl std::fmt::Display for AttackerModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AttackerModel::Prosecutor => f.write_str("Prosecutor"),
            AttackerModel::Journalist => f.write_str("Journalist"),
        }
    }
}

/// Keeps a class iff publishing it yields a strictly positive expected payoff.
///
/// Not monotonic: generalization may lower the adversary's success
/// probability and the publisher's payoff at the same time.
#[derive(Debug, Clone)]
pub struct Profitability {
    attacker_model: AttackerModel,
    risk_model: RiskModelCostBenefit,
    shares: Vec<DomainShare>,
    max_il: f64,
}

impl Profitability {
    /// Creates the criterion.
    pub fn new(attacker_model: AttackerModel, config: CostBenefitConfig) -> Self {
        Self {
            attacker_model,
            risk_model: RiskModelCostBenefit::new(config),
            shares: vec![],
            max_il: 1.0,
        }
    }

    /// Re-identification probability of one record in `entry`.
    ///
    /// Without a population model the journalist risk is bounded by the
    /// prosecutor risk, so both use `1 / count`.
    pub fn success_probability(&self, entry: &GroupifyEntry) -> f64 {
        1.0 / entry.count as f64
    }
}

impl PrivacyModel for Profitability {
    fn initialize(&mut self, manager: &DataManager) -> AnonResult<()> {
        self.shares = manager.domain_shares().to_vec();
        self.max_il = maximal_entropy_based_information_loss(&self.shares);
        if self.attacker_model == AttackerModel::Journalist {
            warn!("no population model available, journalist risk falls back to prosecutor risk");
        }
        Ok(())
    }

    fn is_anonymous(&self, levels: &[u32], entry: &GroupifyEntry) -> bool {
        // Only population records, nothing is published.
        if entry.count == 0 {
            return false;
        }
        let information_loss =
            entropy_based_information_loss(levels, &entry.key, &self.shares, self.max_il);
        let success_probability = self.success_probability(entry);
        self.risk_model
            .expected_publisher_payout(information_loss, success_probability)
            > 0.0
    }

    fn requirements(&self) -> u32 {
        requirement::COUNTER
    }

    fn is_monotonic_with_generalization(&self) -> bool {
        false
    }

    fn render(&self) -> ElementData {
        let config = self.risk_model.config();
        ElementData::new("Profitability")
            .with_property("Attacker model", self.attacker_model)
            .with_property("Adversary cost", config.adversary_cost)
            .with_property("Adversary gain", config.adversary_gain)
            .with_property("Publisher loss", config.publisher_loss)
            .with_property("Publisher benefit", config.publisher_benefit)
    }
}

/// The closed set of supported criteria.
#[derive(Debug, Clone)]
pub enum PrivacyCriterion {
    /// Record selection only.
    Inclusion(Inclusion),
    /// Minimum class size.
    KAnonymity(KAnonymity),
    /// Minimum number of distinct sensitive values per class.
    DistinctLDiversity(DistinctLDiversity),
    /// Cost-benefit game.
    Profitability(Profitability),
}

impl PrivacyCriterion {
    /// Builds an uninitialized criterion from its configuration.
    pub fn from_config(config: &CriterionConfig) -> Self {
        match config {
            CriterionConfig::Inclusion { .. } => PrivacyCriterion::Inclusion(Inclusion::new()),
            CriterionConfig::KAnonymity { k } => PrivacyCriterion::KAnonymity(KAnonymity::new(*k)),
            CriterionConfig::DistinctLDiversity { l } => {
                PrivacyCriterion::DistinctLDiversity(DistinctLDiversity::new(*l))
            }
            CriterionConfig::Profitability {
                attacker_model,
                cost_benefit,
            } => PrivacyCriterion::Profitability(Profitability::new(*attacker_model, *cost_benefit)),
        }
    }

    fn model(&self) -> &dyn PrivacyModel {
        match self {
            PrivacyCriterion::Inclusion(c) => c,
            PrivacyCriterion::KAnonymity(c) => c,
            PrivacyCriterion::DistinctLDiversity(c) => c,
            PrivacyCriterion::Profitability(c) => c,
        }
    }

    fn model_mut(&mut self) -> &mut dyn PrivacyModel {
        match self {
            PrivacyCriterion::Inclusion(c) => c,
            PrivacyCriterion::KAnonymity(c) => c,
            PrivacyCriterion::DistinctLDiversity(c) => c,
            PrivacyCriterion::Profitability(c) => c,
        }
    }
}

impl PrivacyModel for PrivacyCriterion {
    fn initialize(&mut self, manager: &DataManager) -> AnonResult<()> {
        self.model_mut().initialize(manager)
    }

    fn is_anonymous(&self, levels: &[u32], entry: &GroupifyEntry) -> bool {
        self.model().is_anonymous(levels, entry)
    }

    fn requirements(&self) -> u32 {
        self.model().requirements()
    }

    fn is_monotonic_with_generalization(&self) -> bool {
        self.model().is_monotonic_with_generalization()
    }

    fn render(&self) -> ElementData {
        self.model().render()
    }
}
