#![warn(missing_docs)]

//! Granula anonymization engine: searches the lattice of generalization
//! transformations for one that satisfies the configured privacy criteria
//! with minimal information loss.
//!
//! Search loop: Algorithm → SolutionSpace node → Checker (Transformer → HashGroupify
//! → Criteria → Metric, History cache) → properties written back onto the node.

pub mod algorithm;
pub mod anonymizer;
pub mod best_first;
pub mod checker;
pub mod config;
pub mod criteria;
pub mod data_manager;
pub mod domain_share;
pub mod eddp;
pub mod error;
pub mod exponential;
pub mod groupify;
pub mod hierarchy;
pub mod history;
pub mod interval;
pub mod lattice;
pub mod loss;
pub mod matrix;
pub mod metric;
pub mod report;
pub mod risk;
pub mod stats;
pub mod transformer;

pub use algorithm::{Algorithm, AlgorithmBase, SearchAlgorithm, TraversalState};
pub use anonymizer::{AnonymizationResult, Anonymizer};
pub use best_first::BestFirstSearch;
pub use checker::{EvaluationMode, ScoreType, TransformationChecker, TransformationResult, TransformedData};
pub use config::{AnonymizationConfig, CriterionConfig, SearchAlgorithmKind, SearchConfig};
pub use criteria::{AttackerModel, DistinctLDiversity, Inclusion, KAnonymity, PrivacyCriterion, PrivacyModel, Profitability};
pub use data_manager::{AggregationFunction, DataManager, Microaggregation};
pub use eddp::{epsilon_per_step, DataDependentEddp};
pub use error::{AnonError, AnonResult};
pub use exponential::{to_certified_f64, ExponentialMechanism};
pub use groupify::{Distribution, GroupifyEntry, HashGroupify};
pub use hierarchy::GeneralizationHierarchy;
pub use history::{History, HistoryConfig, HistoryStats, Snapshot, StorageStrategy};
pub use interval::{Interval, IntervalArithmeticDouble};
pub use lattice::{SolutionSpace, Transformation, TransformationId};
pub use loss::{AggregateFunction, InformationLoss, InformationLossWithBound};
pub use matrix::DataMatrix;
pub use metric::{
    DiscernabilityMetric, EntropyDomainShareMetric, HeightMetric, LossMetric, Metric, MetricConfig,
    NormalizedEntropyMetric,
};
pub use report::{AnonymizationReport, ElementData};
pub use risk::{CostBenefitConfig, RiskModelCostBenefit};
pub use stats::{EngineStats, StatsSnapshot};
pub use transformer::{RowSink, RowSource, ScanMode, Transformer};
