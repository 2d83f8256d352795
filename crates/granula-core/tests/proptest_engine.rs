//! Property-based tests for the granula engine.
//!
//! Random small datasets over two fixed hierarchies are grouped, checked and
//! regrouped; the properties below must hold for every generated input.

use std::collections::BTreeMap;

use granula_core::{
    AggregateFunction, AnonymizationConfig, DataManager, DataMatrix, DiscernabilityMetric,
    GeneralizationHierarchy, HashGroupify, HeightMetric, IntervalArithmeticDouble, KAnonymity,
    LossMetric, Metric, PrivacyCriterion, ScanMode, ScoreType, SolutionSpace, TransformationChecker,
    Transformer,
};
use num_rational::BigRational;
use proptest::prelude::*;

fn hierarchies() -> Vec<GeneralizationHierarchy> {
    let a = GeneralizationHierarchy::new(
        "a",
        3,
        (0..6u32).map(|v| vec![v, 6 + v / 3, 8]).collect(),
    )
    .expect("hierarchy a");
    let b = GeneralizationHierarchy::new(
        "b",
        3,
        (0..4u32).map(|v| vec![v, 4 + v / 2, 6]).collect(),
    )
    .expect("hierarchy b");
    vec![a, b]
}

/// Generator for datasets of 1..80 records over the fixed hierarchies.
fn any_manager() -> impl Strategy<Value = DataManager> {
    proptest::collection::vec((0u32..6, 0u32..4), 1..80).prop_map(|records| {
        let rows: Vec<Vec<u32>> = records.into_iter().map(|(a, b)| vec![a, b]).collect();
        let data = DataMatrix::from_rows(&rows).expect("matrix");
        DataManager::new(data, hierarchies(), &[]).expect("manager")
    })
}

fn any_levels() -> impl Strategy<Value = Vec<u32>> {
    (0u32..3, 0u32..3).prop_map(|(a, b)| vec![a, b])
}

fn class_counts(groupify: &HashGroupify) -> BTreeMap<Vec<u32>, (usize, usize)> {
    groupify
        .iter()
        .map(|e| (e.key.clone(), (e.count, e.pcount)))
        .collect()
}

fn checker<'a>(manager: &'a DataManager, k: usize, metric: Metric) -> TransformationChecker<'a> {
    TransformationChecker::new(
        manager,
        vec![PrivacyCriterion::KAnonymity(KAnonymity::new(k))],
        metric,
        &AnonymizationConfig::default(),
    )
    .expect("checker")
}

proptest! {
    #[test]
    fn prop_class_counts_sum_to_rows(manager in any_manager(), levels in any_levels()) {
        let transformer = Transformer::new(&manager);
        let groupify = transformer.group(&levels, ScanMode::All, false, 1, 1);
        prop_assert_eq!(groupify.total_count(), manager.data().rows());
        prop_assert_eq!(groupify.total_pcount(), manager.data().rows());
    }

    #[test]
    fn prop_regrouping_matches_full_scan(
        manager in any_manager(),
        first in any_levels(),
        second in any_levels(),
    ) {
        let lower: Vec<u32> = first.iter().zip(&second).map(|(a, b)| *a.min(b)).collect();
        let upper: Vec<u32> = first.iter().zip(&second).map(|(a, b)| *a.max(b)).collect();
        let transformer = Transformer::new(&manager);
        let previous = transformer.group(&lower, ScanMode::All, false, 1, 1);
        let regrouped = transformer.group(&upper, ScanMode::Groupify(&previous), false, 1, 1);
        let full = transformer.group(&upper, ScanMode::All, false, 1, 1);
        prop_assert_eq!(class_counts(&regrouped), class_counts(&full));
    }

    #[test]
    fn prop_parallel_scan_matches_sequential(
        manager in any_manager(),
        levels in any_levels(),
        workers in 2usize..6,
    ) {
        let transformer = Transformer::new(&manager);
        let sequential = transformer.group(&levels, ScanMode::All, false, 1, 1);
        let parallel = transformer.group(&levels, ScanMode::All, false, workers, 1);
        let keys = |g: &HashGroupify| g.iter().map(|e| e.key.clone()).collect::<Vec<_>>();
        prop_assert_eq!(keys(&parallel), keys(&sequential));
        prop_assert_eq!(class_counts(&parallel), class_counts(&sequential));
    }

    #[test]
    fn prop_lower_bound_never_exceeds_loss(manager in any_manager(), k in 1usize..5) {
        for metric in [
            Metric::Height(HeightMetric::new(AggregateFunction::Sum)),
            Metric::Discernability(DiscernabilityMetric::new()),
        ] {
            let mut checker = checker(&manager, k, metric);
            let mut space = SolutionSpace::new(manager.min_levels(), manager.max_levels())
                .expect("space");
            space.set_anonymity_property_predictable(false);
            let ids: Vec<_> = space.ids().collect();
            for id in ids {
                let result = checker
                    .check(&mut space, id, true, ScoreType::InformationLoss)
                    .expect("check");
                if let Some(bound) = result.lower_bound {
                    prop_assert!(bound.value() <= result.information_loss.value());
                }
            }
        }
    }

    #[test]
    fn prop_monotonic_metric_never_decreases(manager in any_manager()) {
        for metric in [
            Metric::Height(HeightMetric::new(AggregateFunction::Sum)),
            Metric::Discernability(DiscernabilityMetric::new()),
        ] {
            prop_assert!(metric.is_monotonic_with_generalization());
            let mut checker = checker(&manager, 1, metric);
            let mut space = SolutionSpace::new(manager.min_levels(), manager.max_levels())
                .expect("space");
            space.set_anonymity_property_predictable(false);
            let ids: Vec<_> = space.ids().collect();
            let mut losses = BTreeMap::new();
            for &id in &ids {
                let result = checker
                    .check(&mut space, id, true, ScoreType::InformationLoss)
                    .expect("check");
                losses.insert(id, result.information_loss.value());
            }
            for &id in &ids {
                for successor in space.successors(id).expect("successors") {
                    prop_assert!(losses[&successor] >= losses[&id]);
                }
            }
        }
    }

    #[test]
    fn prop_interval_division_lower_bound_is_safe(numerator in 1u64..1_000_000, divisor in 1u64..10_000) {
        let epsilon = numerator as f64 / 1000.0;
        let arithmetic = IntervalArithmeticDouble::new();
        let quotient = arithmetic
            .div(
                arithmetic.create_interval(epsilon).expect("interval"),
                arithmetic.create_interval_from_int(divisor).expect("interval"),
            )
            .expect("div");
        let exact = BigRational::from_float(epsilon).expect("finite")
            / BigRational::from_integer(divisor.into());
        let lower = BigRational::from_float(quotient.lower).expect("finite");
        let upper = BigRational::from_float(quotient.upper).expect("finite");
        prop_assert!(lower <= exact);
        prop_assert!(exact <= upper);
    }
}
