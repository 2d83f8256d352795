//! The solution space: every combination of per-attribute generalization levels.
//!
//! Nodes live in a lazily populated arena keyed by a mixed-radix encoding of
//! their level tuple. Predecessors and successors are derived arithmetically
//! from the identifier, so the graph holds no references between nodes.

use std::collections::HashMap;

use num_rational::BigRational;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::checker::TransformationResult;
use crate::error::{AnonError, AnonResult};
use crate::loss::InformationLoss;

/// Property bits stored on each transformation.
pub mod property {
    /// The checker evaluated the node.
    pub const CHECKED: u32 = 1 << 0;
    /// Every class satisfies every criterion.
    pub const ANONYMOUS: u32 = 1 << 1;
    /// At least one class violates a criterion.
    pub const NOT_ANONYMOUS: u32 = 1 << 2;
    /// A search algorithm reached the node.
    pub const VISITED: u32 = 1 << 3;
    /// Successors were excluded from the search.
    pub const SUCCESSORS_PRUNED: u32 = 1 << 4;
    /// The node's neighbors were enumerated.
    pub const EXPANDED: u32 = 1 << 5;
}

/// Mixed-radix identifier of a level tuple.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TransformationId(pub u64);

/// One node of the solution space.
#[derive(Debug, Clone)]
pub struct Transformation {
    id: TransformationId,
    levels: Vec<u32>,
    level: u32,
    properties: u32,
    information_loss: Option<InformationLoss>,
    lower_bound: Option<InformationLoss>,
    score: Option<BigRational>,
}

impl Transformation {
    /// Identifier.
    pub fn id(&self) -> TransformationId {
        self.id
    }

    /// Generalization level per attribute.
    pub fn levels(&self) -> &[u32] {
        &self.levels
    }

    /// Sum of all levels.
    pub fn level(&self) -> u32 {
        self.level
    }

    /// Properties stored on the node itself, without predictions.
    pub fn properties(&self) -> u32 {
        self.properties
    }

    /// Loss written by the checker.
    pub fn information_loss(&self) -> Option<&InformationLoss> {
        self.information_loss.as_ref()
    }

    /// Lower bound written by the checker or the search.
    pub fn lower_bound(&self) -> Option<&InformationLoss> {
        self.lower_bound.as_ref()
    }

    /// Differential-privacy score, when computed.
    pub fn score(&self) -> Option<&BigRational> {
        self.score.as_ref()
    }
}

/// Lattice of transformations between per-attribute minimum and maximum levels.
#[derive(Debug)]
pub struct SolutionSpace {
    min: Vec<u32>,
    max: Vec<u32>,
    multipliers: Vec<u64>,
    size: u64,
    nodes: HashMap<TransformationId, Transformation>,
    predictable: bool,
    anonymous_roots: Vec<Vec<u32>>,
    not_anonymous_roots: Vec<Vec<u32>>,
}

impl SolutionSpace {
    /// Creates the space for the given level bounds.
    pub fn new(min: &[u32], max: &[u32]) -> AnonResult<Self> {
        if min.len() != max.len() {
            return Err(AnonError::DimensionMismatch {
                what: "minimum and maximum levels".to_string(),
                expected: min.len(),
                actual: max.len(),
            });
        }
        let mut multipliers = Vec::with_capacity(min.len());
        let mut size: u64 = 1;
        for (lo, hi) in min.iter().zip(max) {
            if lo > hi {
                return Err(AnonError::InvalidConfig(format!(
                    "minimum level {} exceeds maximum level {}",
                    lo, hi
                )));
            }
            multipliers.push(size);
            size = size
                .checked_mul(u64::from(hi - lo) + 1)
                .ok_or_else(|| AnonError::InvalidConfig("solution space is too large".into()))?;
        }
        debug!(dimensions = min.len(), size, "created solution space");
        Ok(Self {
            min: min.to_vec(),
            max: max.to_vec(),
            multipliers,
            size,
            nodes: HashMap::new(),
            predictable: true,
            anonymous_roots: Vec::new(),
            not_anonymous_roots: Vec::new(),
        })
    }

    /// Number of quasi-identifiers.
    pub fn dimensions(&self) -> usize {
        self.min.len()
    }

    /// Number of transformations.
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Minimum level per attribute.
    pub fn min_levels(&self) -> &[u32] {
        &self.min
    }

    /// Maximum level per attribute.
    pub fn max_levels(&self) -> &[u32] {
        &self.max
    }

    /// The least generalized transformation.
    pub fn bottom(&self) -> TransformationId {
        TransformationId(0)
    }

    /// The most generalized transformation.
    pub fn top(&self) -> TransformationId {
        TransformationId(self.size - 1)
    }

    /// Identifier of a level tuple.
    pub fn id_of(&self, levels: &[u32]) -> AnonResult<TransformationId> {
        if levels.len() != self.dimensions() {
            return Err(AnonError::DimensionMismatch {
                what: "levels per transformation".to_string(),
                expected: self.dimensions(),
                actual: levels.len(),
            });
        }
        let mut id = 0u64;
        for (i, &level) in levels.iter().enumerate() {
            if level < self.min[i] || level > self.max[i] {
                return Err(AnonError::InvalidConfig(format!(
                    "level {} of attribute {} outside [{}, {}]",
                    level, i, self.min[i], self.max[i]
                )));
            }
            id += u64::from(level - self.min[i]) * self.multipliers[i];
        }
        Ok(TransformationId(id))
    }

    /// Level tuple of an identifier.
    pub fn levels_of(&self, id: TransformationId) -> AnonResult<Vec<u32>> {
        if id.0 >= self.size {
            return Err(AnonError::UnknownTransformation(id.0));
        }
        let mut rest = id.0;
        let mut levels = Vec::with_capacity(self.dimensions());
        for i in 0..self.dimensions() {
            let radix = u64::from(self.max[i] - self.min[i]) + 1;
            levels.push(self.min[i] + (rest % radix) as u32);
            rest /= radix;
        }
        Ok(levels)
    }

    /// The node for `id`, created on first access.
    pub fn transformation(&mut self, id: TransformationId) -> AnonResult<&Transformation> {
        self.node_mut(id).map(|n| &*n)
    }

    /// The node for `id` if it was ever created.
    pub fn get(&self, id: TransformationId) -> Option<&Transformation> {
        self.nodes.get(&id)
    }

    fn node_mut(&mut self, id: TransformationId) -> AnonResult<&mut Transformation> {
        if !self.nodes.contains_key(&id) {
            let levels = self.levels_of(id)?;
            let level = levels.iter().sum();
            self.nodes.insert(
                id,
                Transformation {
                    id,
                    levels,
                    level,
                    properties: 0,
                    information_loss: None,
                    lower_bound: None,
                    score: None,
                },
            );
        }
        self.nodes
            .get_mut(&id)
            .ok_or(AnonError::UnknownTransformation(id.0))
    }

    /// Nodes one step less generalized in exactly one attribute.
    pub fn predecessors(&self, id: TransformationId) -> AnonResult<Vec<TransformationId>> {
        let levels = self.levels_of(id)?;
        Ok((0..self.dimensions())
            .filter(|&i| levels[i] > self.min[i])
            .map(|i| TransformationId(id.0 - self.multipliers[i]))
            .collect())
    }

    /// Nodes one step more generalized in exactly one attribute.
    pub fn successors(&self, id: TransformationId) -> AnonResult<Vec<TransformationId>> {
        let levels = self.levels_of(id)?;
        Ok((0..self.dimensions())
            .filter(|&i| levels[i] < self.max[i])
            .map(|i| TransformationId(id.0 + self.multipliers[i]))
            .collect())
    }

    /// Enables or disables inference of anonymity from checked neighbors.
    ///
    /// Must be disabled whenever any criterion is not monotonic.
    pub fn set_anonymity_property_predictable(&mut self, predictable: bool) {
        self.predictable = predictable;
    }

    /// Whether anonymity is inferred from checked neighbors.
    pub fn is_anonymity_property_predictable(&self) -> bool {
        self.predictable
    }

    /// Whether `id` carries `flag`, either stored or predicted.
    pub fn has_property(&self, id: TransformationId, flag: u32) -> bool {
        let stored = self
            .nodes
            .get(&id)
            .map(|n| n.properties & flag == flag)
            .unwrap_or(false);
        if stored || !self.predictable {
            return stored;
        }
        let Ok(levels) = self.levels_of(id) else {
            return false;
        };
        if flag == property::ANONYMOUS {
            self.anonymous_roots
                .iter()
                .any(|root| root.iter().zip(&levels).all(|(r, l)| r <= l))
        } else if flag == property::NOT_ANONYMOUS {
            self.not_anonymous_roots
                .iter()
                .any(|root| root.iter().zip(&levels).all(|(r, l)| r >= l))
        } else {
            false
        }
    }

    /// Sets `flag` on `id`.
    pub fn set_property(&mut self, id: TransformationId, flag: u32) -> AnonResult<()> {
        self.node_mut(id)?.properties |= flag;
        Ok(())
    }

    /// Records a lower bound computed before checking.
    pub fn set_lower_bound(&mut self, id: TransformationId, bound: InformationLoss) -> AnonResult<()> {
        let node = self.node_mut(id)?;
        if node.lower_bound.is_none() {
            node.lower_bound = Some(bound);
        }
        Ok(())
    }

    /// Writes a checker result onto the node.
    ///
    /// Loss values of a checked node are never overwritten; a later check
    /// only adds a score that was not computed before.
    pub fn set_checked(&mut self, id: TransformationId, result: &TransformationResult) -> AnonResult<()> {
        let predictable = self.predictable;
        let node = self.node_mut(id)?;
        let first_check = node.properties & property::CHECKED == 0;
        if first_check {
            node.properties |= property::CHECKED;
            node.properties |= if result.anonymous {
                property::ANONYMOUS
            } else {
                property::NOT_ANONYMOUS
            };
            node.information_loss = Some(result.information_loss.clone());
            if let Some(bound) = &result.lower_bound {
                node.lower_bound = Some(bound.clone());
            }
        }
        if node.score.is_none() {
            node.score = result.score.clone();
        }
        if !(predictable && first_check) {
            return Ok(());
        }
        let levels = node.levels.clone();
        if result.anonymous {
            Self::insert_root(&mut self.anonymous_roots, levels, |a, b| a <= b);
        } else {
            Self::insert_root(&mut self.not_anonymous_roots, levels, |a, b| a >= b);
        }
        Ok(())
    }

    /// Keeps only the roots not covered by another; `covers(a, b)` holds per
    /// attribute when root `a` implies the property for `b`.
    fn insert_root(roots: &mut Vec<Vec<u32>>, levels: Vec<u32>, covers: impl Fn(u32, u32) -> bool) {
        let dominates = |a: &[u32], b: &[u32]| a.iter().zip(b).all(|(&x, &y)| covers(x, y));
        if roots.iter().any(|root| dominates(root, &levels)) {
            return;
        }
        roots.retain(|root| !dominates(&levels, root));
        roots.push(levels);
    }

    /// Number of nodes created so far.
    pub fn materialized(&self) -> usize {
        self.nodes.len()
    }

    /// Every identifier in ascending order.
    pub fn ids(&self) -> impl Iterator<Item = TransformationId> {
        (0..self.size).map(TransformationId)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checker::EvaluationMode;

    fn result(anonymous: bool, loss: f64) -> TransformationResult {
        TransformationResult {
            anonymous,
            information_loss: InformationLoss::scalar(loss),
            lower_bound: Some(InformationLoss::scalar(loss)),
            score: None,
            classes: 1,
            mode: EvaluationMode::Full,
        }
    }

    #[test]
    fn test_roots_stay_minimal() {
        let mut space = SolutionSpace::new(&[0, 0], &[3, 3]).unwrap();
        let high = space.id_of(&[2, 2]).unwrap();
        let low = space.id_of(&[1, 1]).unwrap();
        let side = space.id_of(&[0, 3]).unwrap();
        for _ in 0..5 {
            space.set_checked(high, &result(true, 4.0)).unwrap();
        }
        assert_eq!(space.anonymous_roots.len(), 1);
        space.set_checked(low, &result(true, 2.0)).unwrap();
        space.set_checked(side, &result(true, 3.0)).unwrap();
        assert_eq!(space.anonymous_roots, vec![vec![1, 1], vec![0, 3]]);
        let covered = space.id_of(&[3, 1]).unwrap();
        assert!(space.has_property(covered, property::ANONYMOUS));

        let below = space.id_of(&[0, 1]).unwrap();
        let bottom = space.bottom();
        space.set_checked(bottom, &result(false, 0.0)).unwrap();
        space.set_checked(below, &result(false, 1.0)).unwrap();
        space.set_checked(below, &result(false, 1.0)).unwrap();
        assert_eq!(space.not_anonymous_roots, vec![vec![0, 1]]);
        assert!(space.has_property(bottom, property::NOT_ANONYMOUS));
    }

    #[test]
    fn test_mixed_radix_round_trip() {
        let space = SolutionSpace::new(&[0, 1, 0], &[2, 3, 1]).unwrap();
        assert_eq!(space.size(), 3 * 3 * 2);
        for id in space.ids() {
            let levels = space.levels_of(id).unwrap();
            assert_eq!(space.id_of(&levels).unwrap(), id);
        }
        assert_eq!(space.levels_of(space.bottom()).unwrap(), vec![0, 1, 0]);
        assert_eq!(space.levels_of(space.top()).unwrap(), vec![2, 3, 1]);
    }

    #[test]
    fn test_neighbors() {
        let space = SolutionSpace::new(&[0, 0], &[2, 1]).unwrap();
        let id = space.id_of(&[1, 0]).unwrap();
        let mut preds: Vec<_> = space
            .predecessors(id)
            .unwrap()
            .into_iter()
            .map(|p| space.levels_of(p).unwrap())
            .collect();
        preds.sort();
        assert_eq!(preds, vec![vec![0, 0]]);
        let mut succs: Vec<_> = space
            .successors(id)
            .unwrap()
            .into_iter()
            .map(|s| space.levels_of(s).unwrap())
            .collect();
        succs.sort();
        assert_eq!(succs, vec![vec![1, 1], vec![2, 0]]);
        assert!(space.successors(space.top()).unwrap().is_empty());
        assert!(space.predecessors(space.bottom()).unwrap().is_empty());
    }

    #[test]
    fn test_unknown_and_out_of_range() {
        let space = SolutionSpace::new(&[0], &[1]).unwrap();
        assert!(matches!(
            space.levels_of(TransformationId(2)),
            Err(AnonError::UnknownTransformation(2))
        ));
        assert!(space.id_of(&[2]).is_err());
        assert!(space.id_of(&[0, 0]).is_err());
        assert!(SolutionSpace::new(&[1], &[0]).is_err());
    }

    #[test]
    fn test_overflow_rejected() {
        let min = vec![0u32; 8];
        let max = vec![u32::MAX; 8];
        assert!(SolutionSpace::new(&min, &max).is_err());
    }

    #[test]
    fn test_lazy_creation() {
        let mut space = SolutionSpace::new(&[0, 0], &[3, 3]).unwrap();
        assert_eq!(space.materialized(), 0);
        let top = space.top();
        assert_eq!(space.transformation(top).unwrap().level(), 6);
        assert_eq!(space.materialized(), 1);
    }

    #[test]
    fn test_checked_values_are_immutable() {
        let mut space = SolutionSpace::new(&[0], &[1]).unwrap();
        let id = space.bottom();
        space.set_checked(id, &result(true, 1.0)).unwrap();
        space.set_checked(id, &result(false, 5.0)).unwrap();
        let node = space.get(id).unwrap();
        assert_eq!(node.information_loss().unwrap().value(), 1.0);
        assert!(space.has_property(id, property::ANONYMOUS));
        assert!(!space.has_property(id, property::NOT_ANONYMOUS));
    }

    #[test]
    fn test_predicted_properties() {
        let mut space = SolutionSpace::new(&[0, 0], &[2, 2]).unwrap();
        let mid = space.id_of(&[1, 1]).unwrap();
        space.set_checked(mid, &result(true, 2.0)).unwrap();
        let above = space.id_of(&[2, 1]).unwrap();
        let beside = space.id_of(&[2, 0]).unwrap();
        assert!(space.has_property(above, property::ANONYMOUS));
        assert!(!space.has_property(beside, property::ANONYMOUS));
        assert!(!space.has_property(above, property::CHECKED));

        let low = space.id_of(&[1, 0]).unwrap();
        space.set_checked(low, &result(false, 1.0)).unwrap();
        assert!(space.has_property(space.bottom(), property::NOT_ANONYMOUS));

        space.set_anonymity_property_predictable(false);
        assert!(!space.has_property(above, property::ANONYMOUS));
        assert!(!space.has_property(space.bottom(), property::NOT_ANONYMOUS));
    }
}
