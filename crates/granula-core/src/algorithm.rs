//! Shared search-algorithm machinery: traversal state, limits and optimum tracking.

use std::time::{Duration, Instant};

use tracing::{debug, info};

use crate::best_first::BestFirstSearch;
use crate::checker::{ScoreType, TransformationChecker};
use crate::config::{SearchAlgorithmKind, SearchConfig};
use crate::eddp::DataDependentEddp;
use crate::error::AnonResult;
use crate::lattice::{property, SolutionSpace, TransformationId};
use crate::report::ElementData;

/// Lifecycle of a search.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TraversalState {
    /// Created, not yet started.
    Initialized,
    /// Inside `traverse`.
    Traversing,
    /// Finished, by exhaustion or by a limit.
    Terminated,
}

/// A strategy for traversing the solution space.
pub trait SearchAlgorithm {
    /// Runs the search.
    ///
    /// Returns `Ok(true)` only when the search proved its optimum; running out
    /// of candidates or hitting a limit returns `Ok(false)`. The result itself
    /// is exposed through [`SearchAlgorithm::optimum`].
    fn traverse(
        &mut self,
        space: &mut SolutionSpace,
        checker: &mut TransformationChecker<'_>,
    ) -> AnonResult<bool>;

    /// Current lifecycle state.
    fn state(&self) -> TraversalState;

    /// Best anonymous transformation found so far.
    fn optimum(&self) -> Option<TransformationId>;

    /// Summary for the certification report.
    fn render(&self) -> ElementData;
}

/// Limits and bookkeeping every algorithm shares.
#[derive(Debug)]
pub struct AlgorithmBase {
    state: TraversalState,
    optimum: Option<TransformationId>,
    score_type: ScoreType,
    step_limit: Option<usize>,
    time_limit: Option<Duration>,
    started: Option<Instant>,
    checks: usize,
}

impl AlgorithmBase {
    /// Creates the base with the limits of `config`.
    pub fn new(config: &SearchConfig, score_type: ScoreType) -> Self {
        Self {
            state: TraversalState::Initialized,
            optimum: None,
            score_type,
            step_limit: config.step_limit,
            time_limit: config.time_limit_ms.map(Duration::from_millis),
            started: None,
            checks: 0,
        }
    }

    /// Enters [`TraversalState::Traversing`] and starts the clock.
    pub fn start(&mut self) {
        self.state = TraversalState::Traversing;
        self.started = Some(Instant::now());
        self.checks = 0;
    }

    /// Enters [`TraversalState::Terminated`].
    pub fn terminate(&mut self, reason: &str) {
        self.state = TraversalState::Terminated;
        info!(
            reason,
            checks = self.checks,
            optimum = ?self.optimum,
            "search terminated"
        );
    }

    /// Current lifecycle state.
    pub fn state(&self) -> TraversalState {
        self.state
    }

    /// Best transformation so far.
    pub fn optimum(&self) -> Option<TransformationId> {
        self.optimum
    }

    /// Transformations checked during this traversal.
    pub fn checks(&self) -> usize {
        self.checks
    }

    /// Whether the step or time limit fired.
    pub fn must_stop(&self) -> bool {
        if let Some(limit) = self.step_limit {
            if self.checks >= limit {
                return true;
            }
        }
        match (self.time_limit, self.started) {
            (Some(limit), Some(started)) => started.elapsed() >= limit,
            _ => false,
        }
    }

    /// Checks `id` unless the lattice already holds what this search needs.
    pub fn assure_checked(
        &mut self,
        space: &mut SolutionSpace,
        checker: &mut TransformationChecker<'_>,
        id: TransformationId,
    ) -> AnonResult<()> {
        let checked = space.has_property(id, property::CHECKED);
        let has_score = space.get(id).map(|t| t.score().is_some()).unwrap_or(false);
        if checked && (self.score_type == ScoreType::InformationLoss || has_score) {
            return Ok(());
        }
        checker.check(space, id, false, self.score_type)?;
        self.checks += 1;
        Ok(())
    }

    /// Replaces the optimum with `id` if it is anonymous and better.
    ///
    /// Lower loss wins for loss-based searches, higher score for
    /// score-based ones; ties go to the less generalized transformation.
    pub fn track_optimum(&mut self, space: &SolutionSpace, id: TransformationId) {
        let Some(candidate) = space.get(id) else {
            return;
        };
        if !space.has_property(id, property::CHECKED) || !space.has_property(id, property::ANONYMOUS) {
            return;
        }
        let better = match self.optimum.and_then(|o| space.get(o)) {
            None => true,
            Some(current) => {
                let ordering = match self.score_type {
                    ScoreType::InformationLoss => {
                        match (candidate.information_loss(), current.information_loss()) {
                            (Some(c), Some(o)) => o.compare(c),
                            _ => std::cmp::Ordering::Equal,
                        }
                    }
                    ScoreType::DpScore => candidate.score().cmp(&current.score()),
                };
                ordering
                    .then_with(|| current.level().cmp(&candidate.level()))
                    .is_gt()
            }
        };
        if better {
            debug!(id = id.0, level = candidate.level(), "new optimum");
            self.optimum = Some(id);
        }
    }
}

/// The configured search strategy.
#[derive(Debug)]
pub enum Algorithm {
    /// See [`BestFirstSearch`].
    BestFirst(BestFirstSearch),
    /// See [`DataDependentEddp`].
    DataDependentEddp(DataDependentEddp),
}

impl Algorithm {
    /// Builds the algorithm named by `config`.
    pub fn from_config(config: &SearchConfig) -> AnonResult<Self> {
        Ok(match config.algorithm {
            SearchAlgorithmKind::BestFirst => Algorithm::BestFirst(BestFirstSearch::new(config)),
            SearchAlgorithmKind::DataDependentDifferentialPrivacy => {
                Algorithm::DataDependentEddp(DataDependentEddp::new(config)?)
            }
        })
    }

    fn inner(&self) -> &dyn SearchAlgorithm {
        match self {
            Algorithm::BestFirst(a) => a,
            Algorithm::DataDependentEddp(a) => a,
        }
    }

    fn inner_mut(&mut self) -> &mut dyn SearchAlgorithm {
        match self {
            Algorithm::BestFirst(a) => a,
            Algorithm::DataDependentEddp(a) => a,
        }
    }
}

impl SearchAlgorithm for Algorithm {
    fn traverse(
        &mut self,
        space: &mut SolutionSpace,
        checker: &mut TransformationChecker<'_>,
    ) -> AnonResult<bool> {
        self.inner_mut().traverse(space, checker)
    }

    fn state(&self) -> TraversalState {
        self.inner().state()
    }

    fn optimum(&self) -> Option<TransformationId> {
        self.inner().optimum()
    }

    fn render(&self) -> ElementData {
        self.inner().render()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checker::{EvaluationMode, TransformationResult};
    use crate::loss::InformationLoss;
    use num_rational::BigRational;

    fn result(anonymous: bool, loss: f64, score: Option<i64>) -> TransformationResult {
        TransformationResult {
            anonymous,
            information_loss: InformationLoss::scalar(loss),
            lower_bound: None,
            score: score.map(|s| BigRational::from_integer(s.into())),
            classes: 1,
            mode: EvaluationMode::Full,
        }
    }

    #[test]
    fn test_step_limit() {
        let config = SearchConfig {
            step_limit: Some(2),
            ..SearchConfig::default()
        };
        let mut base = AlgorithmBase::new(&config, ScoreType::InformationLoss);
        base.start();
        assert!(!base.must_stop());
        base.checks = 2;
        assert!(base.must_stop());
    }

    #[test]
    fn test_time_limit() {
        let config = SearchConfig {
            time_limit_ms: Some(0),
            ..SearchConfig::default()
        };
        let mut base = AlgorithmBase::new(&config, ScoreType::InformationLoss);
        assert!(!base.must_stop());
        base.start();
        assert!(base.must_stop());
    }

    #[test]
    fn test_track_optimum_by_loss() {
        let mut space = SolutionSpace::new(&[0, 0], &[1, 1]).unwrap();
        let a = space.id_of(&[1, 0]).unwrap();
        let b = space.id_of(&[0, 1]).unwrap();
        let top = space.top();
        space.set_anonymity_property_predictable(false);
        space.set_checked(top, &result(true, 2.0, None)).unwrap();
        space.set_checked(a, &result(true, 1.0, None)).unwrap();
        space.set_checked(b, &result(false, 0.5, None)).unwrap();
        let mut base = AlgorithmBase::new(&SearchConfig::default(), ScoreType::InformationLoss);
        base.track_optimum(&space, top);
        assert_eq!(base.optimum(), Some(top));
        base.track_optimum(&space, b);
        assert_eq!(base.optimum(), Some(top));
        base.track_optimum(&space, a);
        assert_eq!(base.optimum(), Some(a));
        base.track_optimum(&space, top);
        assert_eq!(base.optimum(), Some(a));
    }

    #[test]
    fn test_track_optimum_by_score_prefers_lower_level_on_tie() {
        let mut space = SolutionSpace::new(&[0], &[2]).unwrap();
        space.set_anonymity_property_predictable(false);
        let ids: Vec<_> = space.ids().collect();
        space.set_checked(ids[2], &result(true, 0.0, Some(-5))).unwrap();
        space.set_checked(ids[1], &result(true, 0.0, Some(-5))).unwrap();
        space.set_checked(ids[0], &result(true, 0.0, Some(-9))).unwrap();
        let mut base = AlgorithmBase::new(&SearchConfig::default(), ScoreType::DpScore);
        base.track_optimum(&space, ids[2]);
        base.track_optimum(&space, ids[1]);
        assert_eq!(base.optimum(), Some(ids[1]));
        base.track_optimum(&space, ids[0]);
        assert_eq!(base.optimum(), Some(ids[1]));
    }
}
