//! Top-level driver: validates configuration, runs the search and applies
//! the chosen transformation.

use std::path::Path;

use tracing::{info, warn};

use crate::algorithm::{Algorithm, SearchAlgorithm};
use crate::checker::{TransformationChecker, TransformedData};
use crate::config::{AnonymizationConfig, SearchAlgorithmKind};
use crate::criteria::{PrivacyCriterion, PrivacyModel};
use crate::data_manager::DataManager;
use crate::error::AnonResult;
use crate::exponential::to_certified_f64;
use crate::hierarchy::GeneralizationHierarchy;
use crate::lattice::{property, SolutionSpace};
use crate::matrix::DataMatrix;
use crate::metric::{LossMetric, Metric};
use crate::report::AnonymizationReport;

/// Output of one anonymization run.
#[derive(Debug, Clone)]
pub struct AnonymizationResult {
    /// Transformed buffers of the optimum; `None` when nothing was anonymous.
    pub output: Option<TransformedData>,
    /// Summary for reporting collaborators.
    pub report: AnonymizationReport,
}

/// Runs configured anonymization searches.
#[derive(Debug, Clone)]
pub struct Anonymizer {
    config: AnonymizationConfig,
}

impl Anonymizer {
    /// Validates `config` and creates the driver.
    pub fn new(config: AnonymizationConfig) -> AnonResult<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Loads and validates a configuration file.
    pub fn from_file(path: &Path) -> AnonResult<Self> {
        Self::new(AnonymizationConfig::from_file(path)?)
    }

    /// The validated configuration.
    pub fn config(&self) -> &AnonymizationConfig {
        &self.config
    }

    /// Builds the data manager, applying configured bounds and research subset.
    pub fn prepare(
        &self,
        data: DataMatrix,
        hierarchies: Vec<GeneralizationHierarchy>,
    ) -> AnonResult<DataManager> {
        let mut manager = DataManager::new(data, hierarchies, &self.config.generalization_bounds)?;
        if let Some(subset) = self.config.subset() {
            manager = manager.with_subset(subset)?;
        }
        Ok(manager)
    }

    /// Searches the solution space of `manager` and transforms the data with the optimum.
    pub fn anonymize(&self, manager: &DataManager) -> AnonResult<AnonymizationResult> {
        let criteria: Vec<PrivacyCriterion> = self
            .config
            .criteria
            .iter()
            .map(PrivacyCriterion::from_config)
            .collect();
        let metric = Metric::from_config(&self.config.metric);
        let mut checker = TransformationChecker::new(manager, criteria, metric, &self.config)?;
        let mut space = SolutionSpace::new(manager.min_levels(), manager.max_levels())?;
        let mut algorithm = Algorithm::from_config(&self.config.search)?;

        info!(
            algorithm = %self.config.search.algorithm,
            size = space.size(),
            rows = manager.data().rows(),
            "starting search"
        );
        let exhausted = algorithm.traverse(&mut space, &mut checker)?;
        let optimal =
            exhausted && self.config.search.algorithm == SearchAlgorithmKind::BestFirst;

        let optimum = algorithm.optimum();
        let (levels, information_loss, score, output) = match optimum {
            Some(id) => {
                let levels = space.levels_of(id)?;
                let node = space.transformation(id)?;
                let loss = node.information_loss().map(|l| l.value());
                let score = node.score().map(to_certified_f64).transpose()?;
                let output = checker.apply_transformation(&levels)?;
                (Some(levels), loss, score, Some(output))
            }
            None => {
                warn!("no anonymous transformation found");
                (None, None, None, None)
            }
        };
        let anonymous = optimum
            .map(|id| space.has_property(id, property::ANONYMOUS))
            .unwrap_or(false);

        let report = AnonymizationReport {
            levels,
            information_loss,
            score,
            anonymous,
            optimal,
            criteria: checker.criteria().iter().map(|c| c.render()).collect(),
            metric: checker.metric().render(),
            search: algorithm.render(),
            statistics: checker.stats().snapshot(),
        };
        Ok(AnonymizationResult { output, report })
    }
}
