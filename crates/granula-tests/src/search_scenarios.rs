//! End-to-end search scenarios over synthetic 1,000-row datasets.

use std::collections::{BTreeMap, HashMap, HashSet};

use granula_core::{
    AggregateFunction, AnonResult, AnonymizationConfig, Anonymizer, CriterionConfig, DataManager,
    DataMatrix, HeightMetric, Inclusion, KAnonymity, Metric, MetricConfig, PrivacyCriterion, ScoreType,
    SearchAlgorithmKind, SearchConfig, SolutionSpace, TransformationChecker,
};

/// Minimal height among all transformations whose classes satisfy `criteria`,
/// found by checking every node of the lattice from scratch.
pub fn brute_force_minimal_height(
    manager: &DataManager,
    criteria: Vec<PrivacyCriterion>,
) -> AnonResult<Option<u32>> {
    let mut checker = TransformationChecker::new(
        manager,
        criteria,
        Metric::Height(HeightMetric::new(AggregateFunction::Sum)),
        &AnonymizationConfig::default(),
    )?;
    let mut space = SolutionSpace::new(manager.min_levels(), manager.max_levels())?;
    space.set_anonymity_property_predictable(false);
    let ids: Vec<_> = space.ids().collect();
    let mut best: Option<u32> = None;
    for id in ids {
        let result = checker.check(&mut space, id, true, ScoreType::InformationLoss)?;
        if result.anonymous {
            let level = space.levels_of(id)?.iter().sum();
            best = Some(best.map_or(level, |b: u32| b.min(level)));
        }
    }
    Ok(best)
}

/// Sizes of the classes of a generalized matrix.
pub fn class_sizes(generalized: &DataMatrix) -> Vec<usize> {
    let mut sizes: HashMap<Vec<u32>, usize> = HashMap::new();
    for row in 0..generalized.rows() {
        *sizes.entry(generalized.row(row)).or_default() += 1;
    }
    sizes.into_values().collect()
}

/// Distinct sensitive values per class of a generalized matrix.
pub fn class_diversity(generalized: &DataMatrix, sensitive: &[u32]) -> Vec<usize> {
    let mut values: HashMap<Vec<u32>, HashSet<u32>> = HashMap::new();
    for (row, &value) in sensitive.iter().enumerate().take(generalized.rows()) {
        values.entry(generalized.row(row)).or_default().insert(value);
    }
    values.into_values().map(|v| v.len()).collect()
}

/// Configuration for a deterministic DP search.
pub fn dp_config(expansion_limit: usize, seed: u64) -> AnonymizationConfig {
    AnonymizationConfig {
        criteria: vec![CriterionConfig::KAnonymity { k: 5 }],
        metric: MetricConfig::Discernability,
        search: SearchConfig {
            algorithm: SearchAlgorithmKind::DataDependentDifferentialPrivacy,
            expansion_limit: Some(expansion_limit),
            epsilon_search: 1.0,
            deterministic: true,
            seed,
            ..SearchConfig::default()
        },
        ..AnonymizationConfig::default()
    }
}
