//! Evaluates one transformation: groups the data, applies criteria and metric,
//! and maintains the history cache.

use std::collections::{BTreeMap, HashMap};

use num_rational::BigRational;
use tracing::{debug, instrument};

use crate::config::AnonymizationConfig;
use crate::criteria::{requirement, PrivacyCriterion, PrivacyModel};
use crate::data_manager::{AggregationFunction, DataManager};
use crate::error::AnonResult;
use crate::groupify::HashGroupify;
use crate::history::{History, StorageStrategy};
use crate::lattice::{SolutionSpace, TransformationId};
use crate::loss::InformationLoss;
use crate::matrix::DataMatrix;
use crate::metric::{LossMetric, Metric};
use crate::stats::EngineStats;
use crate::transformer::{ScanMode, Transformer};

/// Which value the search compares transformations by.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScoreType {
    /// Information loss only.
    InformationLoss,
    /// Information loss plus the exact differential-privacy score.
    DpScore,
}

/// How a grouping was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvaluationMode {
    /// Every input row was generalized.
    Full,
    /// Representatives of the previous grouping were regrouped.
    Representative,
    /// Representatives of a history snapshot were regrouped.
    Snapshot,
}

/// Outcome of checking one transformation.
#[derive(Debug, Clone)]
pub struct TransformationResult {
    /// Every class satisfies every criterion.
    pub anonymous: bool,
    /// Metric value.
    pub information_loss: InformationLoss,
    /// Metric lower bound.
    pub lower_bound: Option<InformationLoss>,
    /// Exact score; present for [`ScoreType::DpScore`].
    pub score: Option<BigRational>,
    /// Number of equivalence classes.
    pub classes: usize,
    /// Scan mode used.
    pub mode: EvaluationMode,
}

/// Output buffers of the chosen transformation.
#[derive(Debug, Clone)]
pub struct TransformedData {
    /// Generalized quasi-identifiers.
    pub generalized: DataMatrix,
    /// Per-class aggregates of the microaggregated attributes, if configured.
    pub microaggregated: Option<DataMatrix>,
    /// Check outcome for the transformation.
    pub result: TransformationResult,
}

/// Orchestrates transformer, grouping, criteria and metric for lattice nodes.
pub struct TransformationChecker<'a> {
    manager: &'a DataManager,
    criteria: Vec<PrivacyCriterion>,
    metric: Metric,
    history: History,
    last: Option<(Vec<u32>, HashGroupify)>,
    track_distribution: bool,
    workers: usize,
    min_rows_per_worker: usize,
    stats: EngineStats,
}

impl<'a> TransformationChecker<'a> {
    /// Initializes criteria and metric against `manager`.
    pub fn new(
        manager: &'a DataManager,
        mut criteria: Vec<PrivacyCriterion>,
        mut metric: Metric,
        config: &AnonymizationConfig,
    ) -> AnonResult<Self> {
        for criterion in &mut criteria {
            criterion.initialize(manager)?;
        }
        metric.initialize(manager)?;
        let requirements = criteria.iter().fold(0, |acc, c| acc | c.requirements());
        let track_distribution = requirements & requirement::DISTRIBUTION != 0;
        debug!(
            criteria = criteria.len(),
            metric = metric.name(),
            track_distribution,
            "created checker"
        );
        Ok(Self {
            manager,
            criteria,
            metric,
            history: History::new(config.history.clone(), manager.data().rows()),
            last: None,
            track_distribution,
            workers: config.worker_threads.max(1),
            min_rows_per_worker: config.min_rows_per_worker.max(1),
            stats: EngineStats::new(),
        })
    }

    /// Checks the transformation `id` and writes the result onto the lattice.
    ///
    /// Unless `force_recompute` is set, the grouping is derived from the
    /// smallest usable source: a history snapshot or the previous grouping.
    #[instrument(skip(self, space), fields(id = id.0))]
    pub fn check(
        &mut self,
        space: &mut SolutionSpace,
        id: TransformationId,
        force_recompute: bool,
        score_type: ScoreType,
    ) -> AnonResult<TransformationResult> {
        let levels = space.levels_of(id)?;
        self.stats.record_check();

        let snapshot_id = if force_recompute {
            None
        } else {
            let found = self.history.find_closest(&levels);
            self.stats.record_history_lookup(found.is_some());
            found
        };
        let snapshot = snapshot_id.and_then(|s| self.history.get(s));
        let previous = match &self.last {
            Some((last_levels, groupify))
                if !force_recompute && last_levels.iter().zip(&levels).all(|(p, l)| p <= l) =>
            {
                Some(groupify)
            }
            _ => None,
        };

        let (mode, source_size) = match (snapshot, previous) {
            (Some(s), Some(p)) if p.len() < s.len() => {
                (ScanMode::Groupify(p), Some(p.len()))
            }
            (Some(s), _) => (ScanMode::Snapshot(s, self.history.dictionary()), Some(s.len())),
            (None, Some(p)) => (ScanMode::Groupify(p), Some(p.len())),
            (None, None) => (ScanMode::All, None),
        };
        let evaluation = match mode {
            ScanMode::All => {
                self.stats.record_full_scan();
                EvaluationMode::Full
            }
            ScanMode::Groupify(_) => {
                self.stats.record_representative_scan();
                EvaluationMode::Representative
            }
            ScanMode::Snapshot(..) => {
                self.stats.record_snapshot_scan();
                EvaluationMode::Snapshot
            }
        };
        debug!(?evaluation, ?source_size, "selected evaluation mode");

        let mut groupify = Transformer::new(self.manager).group(
            &levels,
            mode,
            self.track_distribution,
            self.workers,
            self.min_rows_per_worker,
        );
        let result = self.evaluate(&levels, &mut groupify, evaluation, score_type)?;

        if self.history.store(
            id,
            &levels,
            &groupify,
            &result.information_loss,
            source_size,
        ) {
            self.stats.record_snapshot_stored();
        }
        self.stats
            .set_snapshots_evicted(self.history.stats().evictions);
        space.set_checked(id, &result)?;
        self.last = Some((levels, groupify));
        Ok(result)
    }

    fn evaluate(
        &self,
        levels: &[u32],
        groupify: &mut HashGroupify,
        mode: EvaluationMode,
        score_type: ScoreType,
    ) -> AnonResult<TransformationResult> {
        let anonymous = groupify.analyze(levels, &self.criteria);
        let loss = self.metric.information_loss(levels, groupify)?;
        let lower_bound = match loss.lower_bound {
            Some(bound) => Some(bound),
            None => self.metric.lower_bound(levels)?,
        };
        let score = match score_type {
            ScoreType::DpScore => Some(self.metric.score(levels, groupify)?),
            ScoreType::InformationLoss => None,
        };
        Ok(TransformationResult {
            anonymous,
            information_loss: loss.loss,
            lower_bound,
            score,
            classes: groupify.len(),
            mode,
        })
    }

    /// Generalizes the whole dataset at `levels` and aggregates the
    /// microaggregated attributes per class.
    pub fn apply_transformation(&self, levels: &[u32]) -> AnonResult<TransformedData> {
        let data = self.manager.data();
        let transformer = Transformer::new(self.manager);
        let mut generalized = DataMatrix::new(data.rows(), data.columns());
        let mut key = vec![0u32; data.columns()];
        let mut rows_by_class: HashMap<Vec<u32>, Vec<usize>> = HashMap::new();
        for row in 0..data.rows() {
            transformer.transform_row(row, levels, &mut key);
            generalized.set_row(row, &key);
            rows_by_class.entry(key.clone()).or_default().push(row);
        }

        let mut groupify = transformer.group(
            levels,
            ScanMode::All,
            self.track_distribution,
            self.workers,
            self.min_rows_per_worker,
        );
        let result = self.evaluate(levels, &mut groupify, EvaluationMode::Full, ScoreType::InformationLoss)?;

        let microaggregated = self.manager.microaggregation().map(|micro| {
            let mut out = DataMatrix::new(micro.data.rows(), micro.data.columns());
            for rows in rows_by_class.values() {
                for (column, function) in micro.functions.iter().enumerate() {
                    let values: Vec<u32> = rows.iter().map(|&r| micro.data.get(r, column)).collect();
                    let value = aggregate(*function, values);
                    for &row in rows {
                        out.set(row, column, value);
                    }
                }
            }
            out
        });

        Ok(TransformedData {
            generalized,
            microaggregated,
            result,
        })
    }

    /// Configured criteria, initialized.
    pub fn criteria(&self) -> &[PrivacyCriterion] {
        &self.criteria
    }

    /// Configured metric, initialized.
    pub fn metric(&self) -> &Metric {
        &self.metric
    }

    /// The input data.
    pub fn manager(&self) -> &DataManager {
        self.manager
    }

    /// The history cache.
    pub fn history(&self) -> &History {
        &self.history
    }

    /// The history cache, for changing its storage strategy.
    pub fn history_mut(&mut self) -> &mut History {
        &mut self.history
    }

    /// Changes which snapshots the history retains from now on.
    pub fn set_history_storage_strategy(&mut self, strategy: StorageStrategy) {
        debug!(?strategy, "history storage strategy");
        self.history.set_storage_strategy(strategy);
    }

    /// Grouping of the most recently checked transformation.
    pub fn last_groupify(&self) -> Option<&HashGroupify> {
        self.last.as_ref().map(|(_, g)| g)
    }

    /// Engine counters.
    pub fn stats(&self) -> &EngineStats {
        &self.stats
    }
}

fn aggregate(function: AggregationFunction, mut values: Vec<u32>) -> u32 {
    match function {
        AggregationFunction::Mode => {
            let mut counts: BTreeMap<u32, usize> = BTreeMap::new();
            for v in values {
                *counts.entry(v).or_insert(0) += 1;
            }
            let mut best = (0u32, 0usize);
            for (value, count) in counts {
                if count > best.1 {
                    best = (value, count);
                }
            }
            best.0
        }
        AggregationFunction::Median => {
            values.sort_unstable();
            values.get(values.len().saturating_sub(1) / 2).copied().unwrap_or(0)
        }
    }
}
