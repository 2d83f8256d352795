//! Anonymization run configuration, loadable from TOML or JSON.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::criteria::AttackerModel;
use crate::eddp::epsilon_per_step;
use crate::error::{AnonError, AnonResult};
use crate::history::HistoryConfig;
use crate::metric::MetricConfig;
use crate::risk::CostBenefitConfig;

/// One enabled privacy criterion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum CriterionConfig {
    /// Restricts the research subset; admits every class.
    Inclusion {
        /// Row indices of the research subset; the whole dataset when absent.
        #[serde(default)]
        subset: Option<Vec<usize>>,
    },
    /// Every class must hold at least `k` records.
    KAnonymity {
        /// Minimum class size.
        k: usize,
    },
    /// Every class must hold at least `l` distinct sensitive values.
    DistinctLDiversity {
        /// Minimum number of distinct values.
        l: usize,
    },
    /// Every class must yield a positive expected publisher payoff.
    Profitability {
        /// Adversary model.
        #[serde(default)]
        attacker_model: AttackerModel,
        /// Payoff parameters.
        #[serde(default)]
        cost_benefit: CostBenefitConfig,
    },
}

/// Search strategy selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum SearchAlgorithmKind {
    /// Lower-bound pruned best-first traversal from the bottom.
    #[default]
    BestFirst,
    /// Exponential-mechanism walk from the top.
    DataDependentDifferentialPrivacy,
}

impl std::fmt::Display for SearchAlgorithmKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SearchAlgorithmKind::BestFirst => f.write_str("Best-first search"),
            SearchAlgorithmKind::DataDependentDifferentialPrivacy => {
                f.write_str("Data-dependent differentially private search")
            }
        }
    }
}

/// Search parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Strategy.
    pub algorithm: SearchAlgorithmKind,
    /// Number of expansion steps; mandatory for the differentially private search.
    pub expansion_limit: Option<usize>,
    /// Maximum number of checked transformations.
    pub step_limit: Option<usize>,
    /// Wall-clock limit in milliseconds.
    pub time_limit_ms: Option<u64>,
    /// Total privacy budget of the differentially private search.
    pub epsilon_search: f64,
    /// Use the seeded generator instead of entropy.
    pub deterministic: bool,
    /// Seed for the deterministic generator.
    pub seed: u64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            algorithm: SearchAlgorithmKind::BestFirst,
            expansion_limit: None,
            step_limit: None,
            time_limit_ms: None,
            epsilon_search: 0.1,
            deterministic: false,
            seed: 0,
        }
    }
}

/// Complete configuration of one anonymization run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnonymizationConfig {
    /// Enabled criteria, evaluated in order.
    pub criteria: Vec<CriterionConfig>,
    /// Information-loss metric.
    pub metric: MetricConfig,
    /// Search parameters.
    pub search: SearchConfig,
    /// History cache parameters.
    pub history: HistoryConfig,
    /// Optional `(min, max)` level per attribute; the full hierarchy when absent.
    pub generalization_bounds: Vec<Option<(u32, u32)>>,
    /// Threads for the full scan.
    pub worker_threads: usize,
    /// Smallest row partition worth a separate thread.
    pub min_rows_per_worker: usize,
}

impl Default for AnonymizationConfig {
    fn default() -> Self {
        Self {
            criteria: vec![CriterionConfig::Inclusion { subset: None }],
            metric: MetricConfig::default(),
            search: SearchConfig::default(),
            history: HistoryConfig::default(),
            generalization_bounds: Vec::new(),
            worker_threads: 1,
            min_rows_per_worker: 10_000,
        }
    }
}

impl AnonymizationConfig {
    /// Loads a configuration from a `.toml` or `.json` file.
    pub fn from_file(path: &Path) -> AnonResult<Self> {
        let contents = std::fs::read_to_string(path)?;
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default();

        match ext.to_lowercase().as_str() {
            "toml" => Ok(toml::from_str(&contents)?),
            "json" => Ok(serde_json::from_str(&contents)?),
            _ => Err(AnonError::InvalidConfig(format!(
                "Unsupported config file extension: {}",
                ext
            ))),
        }
    }

    /// Fail-fast checks run before any search starts.
    pub fn validate(&self) -> AnonResult<()> {
        if self.criteria.is_empty() {
            return Err(AnonError::InvalidConfig(
                "at least one privacy criterion is required".into(),
            ));
        }
        for criterion in &self.criteria {
            match criterion {
                CriterionConfig::KAnonymity { k } if *k == 0 => {
                    return Err(AnonError::InvalidConfig("k must be at least 1".into()));
                }
                CriterionConfig::DistinctLDiversity { l } if *l == 0 => {
                    return Err(AnonError::InvalidConfig("l must be at least 1".into()));
                }
                CriterionConfig::Profitability { cost_benefit, .. } => {
                    let values = [
                        cost_benefit.publisher_benefit,
                        cost_benefit.publisher_loss,
                        cost_benefit.adversary_gain,
                        cost_benefit.adversary_cost,
                    ];
                    if values.iter().any(|v| !v.is_finite() || *v < 0.0) {
                        return Err(AnonError::InvalidConfig(
                            "cost-benefit parameters must be finite and non-negative".into(),
                        ));
                    }
                }
                _ => {}
            }
        }

        if self.search.algorithm == SearchAlgorithmKind::DataDependentDifferentialPrivacy {
            epsilon_per_step(self.search.epsilon_search, self.search.expansion_limit)?;
            if let MetricConfig::NormalizedEntropy { .. } = self.metric {
                return Err(AnonError::ScoreNotSupported("Normalized entropy".into()));
            }
        }
        if self.search.step_limit == Some(0) {
            return Err(AnonError::InvalidConfig("step limit must be positive".into()));
        }

        let history = &self.history;
        let fraction = |v: f64| (0.0..=1.0).contains(&v);
        if !fraction(history.snapshot_size_dataset) || !fraction(history.snapshot_size_snapshot) {
            return Err(AnonError::InvalidConfig(
                "snapshot size ratios must lie in [0, 1]".into(),
            ));
        }
        if !history.loss_threshold.is_finite() {
            return Err(AnonError::InvalidConfig("loss threshold must be finite".into()));
        }

        for (attribute, bounds) in self.generalization_bounds.iter().enumerate() {
            if let Some((min, max)) = bounds {
                if min > max {
                    return Err(AnonError::InvalidConfig(format!(
                        "attribute {}: minimum level {} exceeds maximum {}",
                        attribute, min, max
                    )));
                }
            }
        }
        if self.worker_threads == 0 || self.min_rows_per_worker == 0 {
            return Err(AnonError::InvalidConfig(
                "worker_threads and min_rows_per_worker must be positive".into(),
            ));
        }
        Ok(())
    }

    /// Research subset requested by the inclusion criterion, if any.
    pub fn subset(&self) -> Option<&[usize]> {
        self.criteria.iter().find_map(|c| match c {
            CriterionConfig::Inclusion { subset } => subset.as_deref(),
            _ => None,
        })
    }
}
