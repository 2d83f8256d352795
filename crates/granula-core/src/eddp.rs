//! Data-dependent differentially private search.
//!
//! Starting at the top of the lattice, each step scores the predecessors of
//! the current pivot and draws the next pivot from all open candidates with
//! the exponential mechanism. A node leaves the pool when drawn and returns
//! whenever a later pivot lists it again; scores are memoized on the lattice
//! so it is never checked twice. The total budget is split evenly over the
//! expansion steps.

use std::collections::BTreeMap;

use tracing::{debug, instrument};

use crate::algorithm::{AlgorithmBase, SearchAlgorithm, TraversalState};
use crate::checker::{ScoreType, TransformationChecker};
use crate::config::SearchConfig;
use crate::error::{AnonError, AnonResult};
use crate::exponential::{to_certified_f64, ExponentialMechanism};
use crate::history::StorageStrategy;
use crate::interval::IntervalArithmeticDouble;
use crate::lattice::{property, SolutionSpace, TransformationId};
use crate::report::ElementData;

/// Budget per expansion step: the lower bound of `epsilon / expansion_limit`
/// in interval arithmetic, so the steps never spend more than `epsilon`.
pub fn epsilon_per_step(epsilon: f64, expansion_limit: Option<usize>) -> AnonResult<f64> {
    let limit = expansion_limit.ok_or(AnonError::MissingExpansionLimit)?;
    if limit == 0 {
        return Err(AnonError::InvalidExpansionLimit(limit));
    }
    if !epsilon.is_finite() || epsilon <= 0.0 {
        return Err(AnonError::InvalidConfig(format!(
            "search budget must be positive and finite, got {}",
            epsilon
        )));
    }
    let arithmetic = IntervalArithmeticDouble::new();
    let quotient = arithmetic.div(
        arithmetic.create_interval(epsilon)?,
        arithmetic.create_interval_from_int(limit as u64)?,
    )?;
    Ok(quotient.lower)
}

/// Exponential-mechanism walk from the top of the lattice.
#[derive(Debug)]
pub struct DataDependentEddp {
    base: AlgorithmBase,
    epsilon_search: f64,
    epsilon_per_step: f64,
    expansion_limit: usize,
    mechanism: ExponentialMechanism,
}

impl DataDependentEddp {
    /// Validates the budget and creates the search.
    pub fn new(config: &SearchConfig) -> AnonResult<Self> {
        let epsilon = epsilon_per_step(config.epsilon_search, config.expansion_limit)?;
        let expansion_limit = config
            .expansion_limit
            .ok_or(AnonError::MissingExpansionLimit)?;
        Ok(Self {
            base: AlgorithmBase::new(config, ScoreType::DpScore),
            epsilon_search: config.epsilon_search,
            epsilon_per_step: epsilon,
            expansion_limit,
            mechanism: ExponentialMechanism::new(epsilon, config.deterministic, config.seed),
        })
    }

    /// Budget spent by each draw.
    pub fn epsilon_per_step(&self) -> f64 {
        self.epsilon_per_step
    }

    /// Number of expansion steps.
    pub fn expansion_limit(&self) -> usize {
        self.expansion_limit
    }

    fn score(space: &SolutionSpace, id: TransformationId) -> AnonResult<f64> {
        let score = space
            .get(id)
            .and_then(|t| t.score())
            .ok_or(AnonError::UnknownTransformation(id.0))?;
        to_certified_f64(score)
    }
}

impl SearchAlgorithm for DataDependentEddp {
    #[instrument(skip(self, space, checker), fields(limit = self.expansion_limit))]
    fn traverse(
        &mut self,
        space: &mut SolutionSpace,
        checker: &mut TransformationChecker<'_>,
    ) -> AnonResult<bool> {
        self.base.start();
        space.set_anonymity_property_predictable(false);
        // every scored node may be regrouped from later
        checker.set_history_storage_strategy(StorageStrategy::All);

        let mut pivot = space.top();
        self.base.assure_checked(space, checker, pivot)?;
        self.base.track_optimum(space, pivot);

        let mut candidates: BTreeMap<TransformationId, f64> = BTreeMap::new();
        for step in 1..=self.expansion_limit {
            space.set_property(pivot, property::EXPANDED)?;
            for predecessor in space.predecessors(pivot)? {
                if candidates.contains_key(&predecessor) {
                    continue;
                }
                self.base.assure_checked(space, checker, predecessor)?;
                space.set_property(predecessor, property::VISITED)?;
                candidates.insert(predecessor, Self::score(space, predecessor)?);
            }
            candidates.remove(&pivot);

            if candidates.is_empty() {
                self.base.terminate("candidate pool empty");
                return Ok(false);
            }
            let Some(next) = self.mechanism.select(&candidates) else {
                self.base.terminate("candidate pool empty");
                return Ok(false);
            };
            checker.stats().record_mechanism_draw();
            debug!(step, pivot = next.0, "selected pivot");
            pivot = next;
            self.base.track_optimum(space, pivot);

            if self.base.must_stop() {
                self.base.terminate("limit reached");
                return Ok(false);
            }
        }
        self.base.terminate("expansion limit exhausted");
        Ok(false)
    }

    fn state(&self) -> TraversalState {
        self.base.state()
    }

    fn optimum(&self) -> Option<TransformationId> {
        self.base.optimum()
    }

    fn render(&self) -> ElementData {
        ElementData::new("Data-dependent differentially private search")
            .with_property("Privacy budget", self.epsilon_search)
            .with_property("Expansion limit", self.expansion_limit)
            .with_property("Budget per step", self.epsilon_per_step)
            .with_property("Checks", self.base.checks())
    }
}
