//! Best-first traversal from the bottom of the lattice, pruned by metric
//! lower bounds and by predicted anonymity.

use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;

use tracing::{debug, instrument};

use crate::algorithm::{AlgorithmBase, SearchAlgorithm, TraversalState};
use crate::checker::{ScoreType, TransformationChecker};
use crate::config::SearchConfig;
use crate::criteria::PrivacyModel;
use crate::error::AnonResult;
use crate::lattice::{property, SolutionSpace, TransformationId};
use crate::metric::LossMetric;
use crate::report::ElementData;

#[derive(Debug, Clone, Copy)]
struct QueueEntry {
    bound: f64,
    level: u32,
    id: TransformationId,
}

impl PartialEq for QueueEntry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for QueueEntry {}

impl PartialOrd for QueueEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for QueueEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        self.bound
            .total_cmp(&other.bound)
            .then(self.level.cmp(&other.level))
            .then(self.id.cmp(&other.id))
    }
}

/// Expands transformations in ascending order of their lower bound.
///
/// With a monotonic metric the first anonymous transformation whose loss is
/// not exceeded by any remaining bound is optimal.
#[derive(Debug)]
pub struct BestFirstSearch {
    base: AlgorithmBase,
}

impl BestFirstSearch {
    /// Creates the search with the limits of `config`.
    pub fn new(config: &SearchConfig) -> Self {
        Self {
            base: AlgorithmBase::new(config, ScoreType::InformationLoss),
        }
    }

    fn enqueue(
        space: &mut SolutionSpace,
        checker: &TransformationChecker<'_>,
        queue: &mut BinaryHeap<Reverse<QueueEntry>>,
        id: TransformationId,
    ) -> AnonResult<()> {
        space.set_property(id, property::VISITED)?;
        let levels = space.levels_of(id)?;
        let bound = match checker.metric().lower_bound(&levels)? {
            Some(bound) => {
                let value = bound.value();
                space.set_lower_bound(id, bound)?;
                value
            }
            None => f64::NEG_INFINITY,
        };
        let level = space.transformation(id)?.level();
        queue.push(Reverse(QueueEntry { bound, level, id }));
        Ok(())
    }

    fn optimum_loss(&self, space: &SolutionSpace) -> Option<f64> {
        self.base
            .optimum()
            .and_then(|o| space.get(o))
            .and_then(|t| t.information_loss())
            .map(|l| l.value())
    }
}

impl SearchAlgorithm for BestFirstSearch {
    #[instrument(skip(self, space, checker), fields(size = space.size()))]
    fn traverse(
        &mut self,
        space: &mut SolutionSpace,
        checker: &mut TransformationChecker<'_>,
    ) -> AnonResult<bool> {
        self.base.start();
        let predictable = checker
            .criteria()
            .iter()
            .all(|c| c.is_monotonic_with_generalization());
        space.set_anonymity_property_predictable(predictable);
        let monotonic_metric = checker.metric().is_monotonic_with_generalization();

        let mut queue = BinaryHeap::new();
        let bottom = space.bottom();
        Self::enqueue(space, checker, &mut queue, bottom)?;

        while let Some(Reverse(entry)) = queue.pop() {
            if self.base.must_stop() {
                self.base.terminate("limit reached");
                return Ok(false);
            }
            let id = entry.id;
            let mut expand = true;

            let bounded_out = self
                .optimum_loss(space)
                .map(|best| entry.bound >= best)
                .unwrap_or(false);
            let predicted_anonymous = !space.has_property(id, property::CHECKED)
                && space.has_property(id, property::ANONYMOUS);

            if bounded_out || (predicted_anonymous && monotonic_metric) {
                checker.stats().record_pruned();
                debug!(id = id.0, bounded_out, "pruned");
                if monotonic_metric {
                    space.set_property(id, property::SUCCESSORS_PRUNED)?;
                    continue;
                }
            } else if space.has_property(id, property::NOT_ANONYMOUS)
                && !space.has_property(id, property::CHECKED)
            {
                checker.stats().record_pruned();
            } else {
                self.base.assure_checked(space, checker, id)?;
                self.base.track_optimum(space, id);
                if space.has_property(id, property::ANONYMOUS) && monotonic_metric {
                    expand = false;
                }
            }

            if expand {
                space.set_property(id, property::EXPANDED)?;
                for successor in space.successors(id)? {
                    if !space.has_property(successor, property::VISITED) {
                        Self::enqueue(space, checker, &mut queue, successor)?;
                    }
                }
            } else {
                space.set_property(id, property::SUCCESSORS_PRUNED)?;
            }
        }

        self.base.terminate("exhausted");
        Ok(true)
    }

    fn state(&self) -> TraversalState {
        self.base.state()
    }

    fn optimum(&self) -> Option<TransformationId> {
        self.base.optimum()
    }

    fn render(&self) -> ElementData {
        ElementData::new("Best-first search").with_property("Checks", self.base.checks())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AnonymizationConfig;
    use crate::criteria::{KAnonymity, PrivacyCriterion};
    use crate::data_manager::DataManager;
    use crate::hierarchy::GeneralizationHierarchy;
    use crate::loss::AggregateFunction;
    use crate::matrix::DataMatrix;
    use crate::metric::{HeightMetric, Metric, NormalizedEntropyMetric};

    fn manager() -> DataManager {
        // a: 8 values, 4 per level-1 group; b: 2 values
        let records: Vec<Vec<u32>> = (0..32u32).map(|r| vec![r % 8, (r / 8) % 2]).collect();
        let data = DataMatrix::from_rows(&records).unwrap();
        let a = GeneralizationHierarchy::new(
            "a",
            3,
            (0..8u32).map(|v| vec![v, 8 + v / 4, 10]).collect(),
        )
        .unwrap();
        let b = GeneralizationHierarchy::new("b", 2, vec![vec![0, 2], vec![1, 2]]).unwrap();
        DataManager::new(data, vec![a, b], &[]).unwrap()
    }

    fn brute_force_minimum(m: &DataManager, k: usize) -> u32 {
        let mut space = SolutionSpace::new(m.min_levels(), m.max_levels()).unwrap();
        let mut checker = TransformationChecker::new(
            m,
            vec![PrivacyCriterion::KAnonymity(KAnonymity::new(k))],
            Metric::Height(HeightMetric::new(AggregateFunction::Sum)),
            &AnonymizationConfig::default(),
        )
        .unwrap();
        space.set_anonymity_property_predictable(false);
        let ids: Vec<_> = space.ids().collect();
        ids.into_iter()
            .filter_map(|id| {
                let r = checker.check(&mut space, id, true, ScoreType::InformationLoss).unwrap();
                r.anonymous.then(|| space.get(id).unwrap().level())
            })
            .min()
            .unwrap()
    }

    fn run(m: &DataManager, k: usize, metric: Metric) -> (bool, Option<Vec<u32>>, usize) {
        let mut space = SolutionSpace::new(m.min_levels(), m.max_levels()).unwrap();
        let mut checker = TransformationChecker::new(
            m,
            vec![PrivacyCriterion::KAnonymity(KAnonymity::new(k))],
            metric,
            &AnonymizationConfig::default(),
        )
        .unwrap();
        let mut search = BestFirstSearch::new(&SearchConfig::default());
        let done = search.traverse(&mut space, &mut checker).unwrap();
        assert_eq!(search.state(), TraversalState::Terminated);
        let levels = search.optimum().map(|o| space.levels_of(o).unwrap());
        (done, levels, checker.stats().snapshot().checks as usize)
    }

    #[test]
    fn test_finds_minimal_height() {
        let m = manager();
        for k in [1, 2, 4, 8, 16, 32] {
            let (done, levels, _) = run(&m, k, Metric::Height(HeightMetric::new(AggregateFunction::Sum)));
            assert!(done);
            let height: u32 = levels.unwrap().iter().sum();
            assert_eq!(height, brute_force_minimum(&m, k), "k = {}", k);
        }
    }

    #[test]
    fn test_prunes_with_monotonic_metric() {
        let m = manager();
        let (_, levels, checks) = run(&m, 2, Metric::Height(HeightMetric::new(AggregateFunction::Sum)));
        // [0, 0] has classes of 2
        assert_eq!(levels, Some(vec![0, 0]));
        assert_eq!(checks, 1);
    }

    #[test]
    fn test_no_solution() {
        let m = manager();
        let (done, levels, _) = run(&m, 33, Metric::Height(HeightMetric::new(AggregateFunction::Sum)));
        assert!(done);
        assert_eq!(levels, None);
    }

    #[test]
    fn test_non_monotonic_metric_still_finds_anonymous() {
        let m = manager();
        let (done, levels, _) = run(
            &m,
            8,
            Metric::NormalizedEntropy(NormalizedEntropyMetric::new(AggregateFunction::Sum)),
        );
        assert!(done);
        assert!(levels.is_some());
    }

    #[test]
    fn test_step_limit_stops_early() {
        let m = manager();
        let mut space = SolutionSpace::new(m.min_levels(), m.max_levels()).unwrap();
        let mut checker = TransformationChecker::new(
            &m,
            vec![PrivacyCriterion::KAnonymity(KAnonymity::new(32))],
            Metric::Height(HeightMetric::new(AggregateFunction::Sum)),
            &AnonymizationConfig::default(),
        )
        .unwrap();
        let mut search = BestFirstSearch::new(&SearchConfig {
            step_limit: Some(1),
            ..SearchConfig::default()
        });
        assert!(!search.traverse(&mut space, &mut checker).unwrap());
        assert_eq!(search.state(), TraversalState::Terminated);
    }
}
