//! Property-Based Tests for the checker's cached evaluation paths

use granula_core::{
    AnonResult, AnonymizationConfig, DataManager, DiscernabilityMetric, EvaluationMode,
    HistoryConfig, KAnonymity, Metric, PrivacyCriterion, ScoreType, SolutionSpace,
    StorageStrategy, TransformationChecker,
};
use proptest::prelude::*;

/// (classes, anonymous, loss, mode) of one check.
pub type CheckOutcome = (usize, bool, f64, EvaluationMode);

/// Checks every lattice node in id order and returns the outcomes.
///
/// With `force_recompute` unset the checker may regroup from history
/// snapshots or the previous grouping instead of scanning every row.
pub fn check_all(
    manager: &DataManager,
    k: usize,
    strategy: StorageStrategy,
    force_recompute: bool,
) -> AnonResult<Vec<CheckOutcome>> {
    let config = AnonymizationConfig {
        history: HistoryConfig {
            storage_strategy: strategy,
            ..HistoryConfig::default()
        },
        ..AnonymizationConfig::default()
    };
    let mut checker = TransformationChecker::new(
        manager,
        vec![PrivacyCriterion::KAnonymity(KAnonymity::new(k))],
        Metric::Discernability(DiscernabilityMetric::new()),
        &config,
    )?;
    let mut space = SolutionSpace::new(manager.min_levels(), manager.max_levels())?;
    space.set_anonymity_property_predictable(false);
    let ids: Vec<_> = space.ids().collect();
    let mut outcomes = Vec::with_capacity(ids.len());
    for id in ids {
        let r = checker.check(&mut space, id, force_recompute, ScoreType::InformationLoss)?;
        outcomes.push((r.classes, r.anonymous, r.information_loss.value(), r.mode));
    }
    Ok(outcomes)
}

pub fn any_strategy() -> impl Strategy<Value = StorageStrategy> {
    prop_oneof![
        Just(StorageStrategy::All),
        Just(StorageStrategy::AboveThreshold),
        Just(StorageStrategy::BelowThreshold),
        Just(StorageStrategy::None),
    ]
}
