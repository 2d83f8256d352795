//! Information-loss metrics.
//!
//! Each metric produces a loss and a lower bound per transformation and
//! declares whether it is monotonic under generalization. Search algorithms
//! only prune by loss when the metric says it is monotonic.

use std::collections::HashMap;

use num_bigint::BigInt;
use num_rational::BigRational;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::data_manager::DataManager;
use crate::domain_share::DomainShare;
use crate::error::{AnonError, AnonResult};
use crate::groupify::{GroupifyEntry, HashGroupify};
use crate::loss::{AggregateFunction, InformationLoss, InformationLossWithBound};
use crate::report::ElementData;

/// Product of per-dimension domain shares of a class, normalized to `[0, 1]`.
///
/// `0` means every value is at its leaf, `1` that every value covers the
/// whole domain. `max_il` is the product for leaves, see
/// [`maximal_entropy_based_information_loss`].
pub fn entropy_based_information_loss(
    levels: &[u32],
    key: &[u32],
    shares: &[DomainShare],
    max_il: f64,
) -> f64 {
    let mut product = 1.0;
    for (dimension, share) in shares.iter().enumerate() {
        product *= share.share(key[dimension], levels[dimension] as usize);
    }
    let floor = max_il.ln();
    if floor == 0.0 {
        return 0.0;
    }
    ((product.ln() - floor) / -floor).clamp(0.0, 1.0)
}

/// Product of leaf shares, the smallest possible share product.
pub fn maximal_entropy_based_information_loss(shares: &[DomainShare]) -> f64 {
    shares.iter().map(|s| 1.0 / s.domain_size()).product()
}

/// Operations every information-loss metric provides.
pub trait LossMetric {
    /// Human-readable name.
    fn name(&self) -> &'static str;

    /// Runs precomputation against the input data.
    fn initialize(&mut self, manager: &DataManager) -> AnonResult<()>;

    /// Whether loss never decreases when generalizing further.
    fn is_monotonic_with_generalization(&self) -> bool;

    /// Loss and lower bound for a grouped transformation.
    fn information_loss(
        &self,
        levels: &[u32],
        groupify: &HashGroupify,
    ) -> AnonResult<InformationLossWithBound>;

    /// Loss contributed by a single class.
    fn class_information_loss(&self, levels: &[u32], entry: &GroupifyEntry) -> AnonResult<InformationLoss>;

    /// A bound computable from the levels alone, without grouping.
    fn lower_bound(&self, levels: &[u32]) -> AnonResult<Option<InformationLoss>>;

    /// Whether [`LossMetric::score`] is available.
    fn is_score_supported(&self) -> bool {
        false
    }

    /// Exact differential-privacy score; higher is better.
    fn score(&self, _levels: &[u32], _groupify: &HashGroupify) -> AnonResult<BigRational> {
        Err(AnonError::ScoreNotSupported(self.name().to_string()))
    }

    /// Summary for the certification report.
    fn render(&self) -> ElementData;
}

/// Metric selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum MetricConfig {
    /// Generalization height.
    Height {
        /// Aggregation over attributes.
        #[serde(default)]
        aggregate: AggregateFunction,
    },
    /// Normalized non-uniform entropy with precomputed per-level values.
    NormalizedEntropy {
        /// Aggregation over attributes.
        #[serde(default)]
        aggregate: AggregateFunction,
    },
    /// Sum of squared class sizes.
    Discernability,
    /// Record-weighted mean of the normalized domain-share product of each class.
    EntropyDomainShare,
}

impl Default for MetricConfig {
    fn default() -> Self {
        MetricConfig::Height {
            aggregate: AggregateFunction::Sum,
        }
    }
}

/// Sum (or other aggregate) of generalization levels.
#[derive(Debug, Clone)]
pub struct HeightMetric {
    aggregate: AggregateFunction,
}

impl HeightMetric {
    /// Creates the metric.
    pub fn new(aggregate: AggregateFunction) -> Self {
        Self { aggregate }
    }

    fn loss(&self, levels: &[u32]) -> InformationLoss {
        InformationLoss::new(levels.iter().map(|&l| l as f64).collect(), self.aggregate)
    }
}

impl LossMetric for HeightMetric {
    fn name(&self) -> &'static str {
        "Height"
    }

    fn initialize(&mut self, _manager: &DataManager) -> AnonResult<()> {
        Ok(())
    }

    fn is_monotonic_with_generalization(&self) -> bool {
        true
    }

    fn information_loss(
        &self,
        levels: &[u32],
        _groupify: &HashGroupify,
    ) -> AnonResult<InformationLossWithBound> {
        Ok(InformationLossWithBound::exact(self.loss(levels)))
    }

    fn class_information_loss(&self, levels: &[u32], _entry: &GroupifyEntry) -> AnonResult<InformationLoss> {
        Ok(self.loss(levels))
    }

    fn lower_bound(&self, levels: &[u32]) -> AnonResult<Option<InformationLoss>> {
        Ok(Some(self.loss(levels)))
    }

    fn is_score_supported(&self) -> bool {
        true
    }

    /// Negated aggregate of the levels; exact for every aggregate but the
    /// geometric mean, which uses the exact value of its double.
    fn score(&self, levels: &[u32], _groupify: &HashGroupify) -> AnonResult<BigRational> {
        let sum: BigInt = levels.iter().map(|&l| BigInt::from(l)).sum();
        let value = match self.aggregate {
            AggregateFunction::Sum => BigRational::from_integer(sum),
            AggregateFunction::Maximum => {
                BigRational::from_integer(BigInt::from(levels.iter().copied().max().unwrap_or(0)))
            }
            AggregateFunction::ArithmeticMean => {
                if levels.is_empty() {
                    BigRational::from_integer(BigInt::from(0))
                } else {
                    BigRational::new(sum, BigInt::from(levels.len()))
                }
            }
            AggregateFunction::GeometricMean => BigRational::from_float(self.loss(levels).value())
                .ok_or_else(|| AnonError::NotRepresentable("height".to_string()))?,
        };
        Ok(-value)
    }

    fn render(&self) -> ElementData {
        ElementData::new("Height")
            .with_property("Aggregate function", self.aggregate)
            .with_property("Monotonic", self.is_monotonic_with_generalization())
    }
}

#[derive(Debug, Clone)]
struct EntropyTables {
    /// `losses[column][level]`, already divided by `upper[column]`.
    losses: Vec<Vec<f64>>,
    shares: Vec<DomainShare>,
}

/// Non-uniform entropy normalized per attribute by its value at full suppression.
///
/// For attribute `a` at level `l` the raw loss is
/// `sum over values v of f(v) * log2(f_l(g_l(v)) / f(v))`, where `f` counts
/// input values and `f_l` counts generalized values. It is divided by the
/// loss of collapsing the column into a single value. Without suppression
/// the value depends on the level alone, so it is precomputed once.
#[derive(Debug, Clone)]
pub struct NormalizedEntropyMetric {
    aggregate: AggregateFunction,
    tables: Option<EntropyTables>,
}

impl NormalizedEntropyMetric {
    /// Creates an uninitialized metric.
    pub fn new(aggregate: AggregateFunction) -> Self {
        Self {
            aggregate,
            tables: None,
        }
    }

    fn tables(&self) -> AnonResult<&EntropyTables> {
        self.tables
            .as_ref()
            .ok_or_else(|| AnonError::MetricNotInitialized(self.name().to_string()))
    }

    fn loss(&self, levels: &[u32]) -> AnonResult<InformationLoss> {
        let tables = self.tables()?;
        let values = levels
            .iter()
            .enumerate()
            .map(|(column, &level)| tables.losses[column][level as usize])
            .collect();
        Ok(InformationLoss::new(values, self.aggregate))
    }
}

impl LossMetric for NormalizedEntropyMetric {
    fn name(&self) -> &'static str {
        "Normalized non-uniform entropy"
    }

    fn initialize(&mut self, manager: &DataManager) -> AnonResult<()> {
        let data = manager.data();
        let rows = data.rows() as f64;
        let mut losses = Vec::with_capacity(data.columns());
        for (column, hierarchy) in manager.hierarchies().iter().enumerate() {
            let mut input: HashMap<u32, usize> = HashMap::new();
            for &value in data.column(column) {
                *input.entry(value).or_insert(0) += 1;
            }
            let upper: f64 = input
                .values()
                .map(|&f| f as f64 * (rows / f as f64).log2())
                .sum();
            let mut per_level = Vec::with_capacity(hierarchy.height());
            for level in 0..hierarchy.height() as u32 {
                let mut output: HashMap<u32, usize> = HashMap::new();
                for (&value, &f) in &input {
                    *output.entry(hierarchy.generalize(value, level)).or_insert(0) += f;
                }
                let raw: f64 = input
                    .iter()
                    .map(|(&value, &f)| {
                        let generalized = output[&hierarchy.generalize(value, level)];
                        f as f64 * (generalized as f64 / f as f64).log2()
                    })
                    .sum();
                per_level.push(if upper > 0.0 { raw / upper } else { 0.0 });
            }
            debug!(attribute = hierarchy.name(), upper, "precomputed entropy per level");
            losses.push(per_level);
        }
        self.tables = Some(EntropyTables {
            losses,
            shares: manager.domain_shares().to_vec(),
        });
        Ok(())
    }

    fn is_monotonic_with_generalization(&self) -> bool {
        false
    }

    fn information_loss(
        &self,
        levels: &[u32],
        _groupify: &HashGroupify,
    ) -> AnonResult<InformationLossWithBound> {
        Ok(InformationLossWithBound::exact(self.loss(levels)?))
    }

    /// Per attribute, how far the class's generalized value is from a leaf on a log scale.
    fn class_information_loss(&self, levels: &[u32], entry: &GroupifyEntry) -> AnonResult<InformationLoss> {
        let tables = self.tables()?;
        let values = tables
            .shares
            .iter()
            .enumerate()
            .map(|(d, share)| {
                let domain = share.domain_size();
                if domain <= 1.0 {
                    0.0
                } else {
                    1.0 + share.share(entry.key[d], levels[d] as usize).ln() / domain.ln()
                }
            })
            .collect();
        Ok(InformationLoss::new(values, self.aggregate))
    }

    fn lower_bound(&self, levels: &[u32]) -> AnonResult<Option<InformationLoss>> {
        Ok(Some(self.loss(levels)?))
    }

    fn render(&self) -> ElementData {
        ElementData::new("Normalized non-uniform entropy")
            .with_property("Aggregate function", self.aggregate)
            .with_property("Monotonic", self.is_monotonic_with_generalization())
    }
}

/// Sum of squared class sizes (records in the research subset).
#[derive(Debug, Clone, Default)]
pub struct DiscernabilityMetric {
    records: Option<usize>,
}

impl DiscernabilityMetric {
    /// Creates an uninitialized metric.
    pub fn new() -> Self {
        Self::default()
    }

    fn records(&self) -> AnonResult<usize> {
        self.records
            .ok_or_else(|| AnonError::MetricNotInitialized(self.name().to_string()))
    }
}

impl LossMetric for DiscernabilityMetric {
    fn name(&self) -> &'static str {
        "Discernability"
    }

    fn initialize(&mut self, manager: &DataManager) -> AnonResult<()> {
        self.records = Some(manager.subset_size());
        Ok(())
    }

    fn is_monotonic_with_generalization(&self) -> bool {
        true
    }

    fn information_loss(
        &self,
        levels: &[u32],
        groupify: &HashGroupify,
    ) -> AnonResult<InformationLossWithBound> {
        let sum: f64 = groupify
            .iter()
            .map(|e| (e.count as f64) * (e.count as f64))
            .sum();
        Ok(InformationLossWithBound {
            loss: InformationLoss::scalar(sum),
            lower_bound: self.lower_bound(levels)?,
        })
    }

    fn class_information_loss(&self, _levels: &[u32], entry: &GroupifyEntry) -> AnonResult<InformationLoss> {
        Ok(InformationLoss::scalar((entry.count * entry.count) as f64))
    }

    /// Every record is at least in a class of its own.
    fn lower_bound(&self, _levels: &[u32]) -> AnonResult<Option<InformationLoss>> {
        Ok(Some(InformationLoss::scalar(self.records()? as f64)))
    }

    fn is_score_supported(&self) -> bool {
        true
    }

    /// `-(sum of squared class sizes) / records`.
    fn score(&self, _levels: &[u32], groupify: &HashGroupify) -> AnonResult<BigRational> {
        let records = self.records()?;
        let sum: BigInt = groupify
            .iter()
            .map(|e| BigInt::from(e.count) * BigInt::from(e.count))
            .sum();
        if records == 0 {
            return Ok(BigRational::from_integer(BigInt::from(0)));
        }
        Ok(-BigRational::new(sum, BigInt::from(records)))
    }

    fn render(&self) -> ElementData {
        ElementData::new("Discernability")
            .with_property("Monotonic", self.is_monotonic_with_generalization())
    }
}

#[derive(Debug, Clone)]
struct ShareTables {
    shares: Vec<DomainShare>,
    max_il: f64,
}

/// Multi-dimensional loss from attribute-value domain shares.
///
/// Each class contributes [`entropy_based_information_loss`] of its key,
/// weighted by its size. The normalization constant is computed once by
/// [`LossMetric::initialize`] from the leaf shares.
#[derive(Debug, Clone, Default)]
pub struct EntropyDomainShareMetric {
    tables: Option<ShareTables>,
}

impl EntropyDomainShareMetric {
    /// Creates an uninitialized metric.
    pub fn new() -> Self {
        Self::default()
    }

    fn tables(&self) -> AnonResult<&ShareTables> {
        self.tables
            .as_ref()
            .ok_or_else(|| AnonError::MetricNotInitialized(self.name().to_string()))
    }

    fn loss(&self, levels: &[u32], groupify: &HashGroupify) -> AnonResult<f64> {
        let tables = self.tables()?;
        let (mut weighted, mut records) = (0.0, 0usize);
        for entry in groupify.iter().filter(|e| e.count > 0) {
            weighted += entry.count as f64
                * entropy_based_information_loss(levels, &entry.key, &tables.shares, tables.max_il);
            records += entry.count;
        }
        Ok(if records == 0 { 0.0 } else { weighted / records as f64 })
    }
}

impl LossMetric for EntropyDomainShareMetric {
    fn name(&self) -> &'static str {
        "Entropy-based domain share"
    }

    fn initialize(&mut self, manager: &DataManager) -> AnonResult<()> {
        let shares = manager.domain_shares().to_vec();
        let max_il = maximal_entropy_based_information_loss(&shares);
        debug!(max_il, "computed domain-share normalization");
        self.tables = Some(ShareTables { shares, max_il });
        Ok(())
    }

    /// Shares of a generalized value cover those of its children.
    fn is_monotonic_with_generalization(&self) -> bool {
        true
    }

    fn information_loss(
        &self,
        levels: &[u32],
        groupify: &HashGroupify,
    ) -> AnonResult<InformationLossWithBound> {
        Ok(InformationLossWithBound {
            loss: InformationLoss::scalar(self.loss(levels, groupify)?),
            lower_bound: self.lower_bound(levels)?,
        })
    }

    fn class_information_loss(&self, levels: &[u32], entry: &GroupifyEntry) -> AnonResult<InformationLoss> {
        let tables = self.tables()?;
        Ok(InformationLoss::scalar(entropy_based_information_loss(
            levels,
            &entry.key,
            &tables.shares,
            tables.max_il,
        )))
    }

    /// Every class covers at least the smallest share present at its level.
    fn lower_bound(&self, levels: &[u32]) -> AnonResult<Option<InformationLoss>> {
        let tables = self.tables()?;
        let floor = tables.max_il.ln();
        if floor == 0.0 {
            return Ok(Some(InformationLoss::scalar(0.0)));
        }
        let product: f64 = tables
            .shares
            .iter()
            .zip(levels)
            .map(|(share, &level)| share.min_share(level as usize))
            .product();
        let bound = ((product.ln() - floor) / -floor).clamp(0.0, 1.0);
        Ok(Some(InformationLoss::scalar(bound)))
    }

    fn is_score_supported(&self) -> bool {
        true
    }

    /// Negated loss, taken as the exact value of its double.
    fn score(&self, levels: &[u32], groupify: &HashGroupify) -> AnonResult<BigRational> {
        let loss = self.loss(levels, groupify)?;
        BigRational::from_float(loss)
            .map(|value| -value)
            .ok_or_else(|| AnonError::NotRepresentable(self.name().to_string()))
    }

    fn render(&self) -> ElementData {
        ElementData::new("Entropy-based domain share")
            .with_property("Monotonic", self.is_monotonic_with_generalization())
    }
}

/// The closed set of supported metrics.
#[derive(Debug, Clone)]
pub enum Metric {
    /// See [`HeightMetric`].
    Height(HeightMetric),
    /// See [`NormalizedEntropyMetric`].
    NormalizedEntropy(NormalizedEntropyMetric),
    /// See [`DiscernabilityMetric`].
    Discernability(DiscernabilityMetric),
    /// See [`EntropyDomainShareMetric`].
    EntropyDomainShare(EntropyDomainShareMetric),
}

impl Metric {
    /// Builds an uninitialized metric from its configuration.
    pub fn from_config(config: &MetricConfig) -> Self {
        match *config {
            MetricConfig::Height { aggregate } => Metric::Height(HeightMetric::new(aggregate)),
            MetricConfig::NormalizedEntropy { aggregate } => {
                Metric::NormalizedEntropy(NormalizedEntropyMetric::new(aggregate))
            }
            MetricConfig::Discernability => Metric::Discernability(DiscernabilityMetric::new()),
            MetricConfig::EntropyDomainShare => {
                Metric::EntropyDomainShare(EntropyDomainShareMetric::new())
            }
        }
    }

    fn inner(&self) -> &dyn LossMetric {
        match self {
            Metric::Height(m) => m,
            Metric::NormalizedEntropy(m) => m,
            Metric::Discernability(m) => m,
            Metric::EntropyDomainShare(m) => m,
        }
    }

    fn inner_mut(&mut self) -> &mut dyn LossMetric {
        match self {
            Metric::Height(m) => m,
            Metric::NormalizedEntropy(m) => m,
            Metric::Discernability(m) => m,
            Metric::EntropyDomainShare(m) => m,
        }
    }
}

impl LossMetric for Metric {
    fn name(&self) -> &'static str {
        self.inner().name()
    }

    fn initialize(&mut self, manager: &DataManager) -> AnonResult<()> {
        self.inner_mut().initialize(manager)
    }

    fn is_monotonic_with_generalization(&self) -> bool {
        self.inner().is_monotonic_with_generalization()
    }

    fn information_loss(
        &self,
        levels: &[u32],
        groupify: &HashGroupify,
    ) -> AnonResult<InformationLossWithBound> {
        self.inner().information_loss(levels, groupify)
    }

    fn class_information_loss(&self, levels: &[u32], entry: &GroupifyEntry) -> AnonResult<InformationLoss> {
        self.inner().class_information_loss(levels, entry)
    }

    fn lower_bound(&self, levels: &[u32]) -> AnonResult<Option<InformationLoss>> {
        self.inner().lower_bound(levels)
    }

    fn is_score_supported(&self) -> bool {
        self.inner().is_score_supported()
    }

    fn score(&self, levels: &[u32], groupify: &HashGroupify) -> AnonResult<BigRational> {
        self.inner().score(levels, groupify)
    }

    fn render(&self) -> ElementData {
        self.inner().render()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hierarchy::GeneralizationHierarchy;
    use crate::matrix::DataMatrix;

    fn manager() -> DataManager {
        // two attributes, four records
        let data = DataMatrix::from_rows(&[
            vec![0, 0],
            vec![1, 0],
            vec![2, 1],
            vec![3, 1],
        ])
        .unwrap();
        let age = GeneralizationHierarchy::new(
            "age",
            3,
            vec![vec![0, 4, 6], vec![1, 4, 6], vec![2, 5, 6], vec![3, 5, 6]],
        )
        .unwrap();
        let sex = GeneralizationHierarchy::new("sex", 2, vec![vec![0, 2], vec![1, 2]]).unwrap();
        DataManager::new(data, vec![age, sex], &[]).unwrap()
    }

    fn group(manager: &DataManager, levels: &[u32]) -> HashGroupify {
        let mut g = HashGroupify::new(4, false);
        for row in 0..manager.data().rows() {
            let key: Vec<u32> = manager
                .hierarchies()
                .iter()
                .enumerate()
                .map(|(c, h)| h.generalize(manager.data().get(row, c), levels[c]))
                .collect();
            g.add_from_row(&key, row, true, None);
        }
        g
    }

    #[test]
    fn test_height_loss_and_score() {
        let m = manager();
        let metric = Metric::from_config(&MetricConfig::default());
        let g = group(&m, &[2, 1]);
        let loss = metric.information_loss(&[2, 1], &g).unwrap();
        assert_eq!(loss.loss.value(), 3.0);
        assert_eq!(loss.lower_bound.unwrap().value(), 3.0);
        let score = metric.score(&[2, 1], &g).unwrap();
        assert_eq!(score, BigRational::from_integer(BigInt::from(-3)));
    }

    #[test]
    fn test_height_mean_score_is_exact() {
        let metric = HeightMetric::new(AggregateFunction::ArithmeticMean);
        let g = HashGroupify::new(1, false);
        let score = metric.score(&[1, 2, 2], &g).unwrap();
        assert_eq!(score, -BigRational::new(BigInt::from(5), BigInt::from(3)));
    }

    #[test]
    fn test_entropy_requires_initialization() {
        let metric = NormalizedEntropyMetric::new(AggregateFunction::Sum);
        assert!(matches!(
            metric.lower_bound(&[0, 0]),
            Err(AnonError::MetricNotInitialized(_))
        ));
    }

    #[test]
    fn test_entropy_normalized_range() {
        let m = manager();
        let mut metric = Metric::from_config(&MetricConfig::NormalizedEntropy {
            aggregate: AggregateFunction::Maximum,
        });
        metric.initialize(&m).unwrap();
        let bottom = metric.information_loss(&[0, 0], &group(&m, &[0, 0])).unwrap();
        let top = metric.information_loss(&[2, 1], &group(&m, &[2, 1])).unwrap();
        assert_eq!(bottom.loss.value(), 0.0);
        assert!((top.loss.value() - 1.0).abs() < 1e-12);
        let middle = metric.information_loss(&[1, 0], &group(&m, &[1, 0])).unwrap();
        assert!((middle.loss.values()[0] - 0.5).abs() < 1e-12);
        assert!(!metric.is_monotonic_with_generalization());
        assert!(!metric.is_score_supported());
        assert!(matches!(
            metric.score(&[0, 0], &group(&m, &[0, 0])),
            Err(AnonError::ScoreNotSupported(_))
        ));
    }

    #[test]
    fn test_entropy_class_loss() {
        let m = manager();
        let mut metric = NormalizedEntropyMetric::new(AggregateFunction::Sum);
        metric.initialize(&m).unwrap();
        let g = group(&m, &[1, 1]);
        let entry = g.get(&[4, 2]).unwrap();
        let loss = metric.class_information_loss(&[1, 1], entry).unwrap();
        assert!((loss.values()[0] - 0.5).abs() < 1e-12);
        assert!((loss.values()[1] - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_discernability() {
        let m = manager();
        let mut metric = Metric::from_config(&MetricConfig::Discernability);
        metric.initialize(&m).unwrap();
        let g = group(&m, &[1, 0]);
        // classes (4,0)x2 and (5,1)x2
        let loss = metric.information_loss(&[1, 0], &g).unwrap();
        assert_eq!(loss.loss.value(), 8.0);
        assert_eq!(loss.lower_bound.unwrap().value(), 4.0);
        let score = metric.score(&[1, 0], &g).unwrap();
        assert_eq!(score, BigRational::from_integer(BigInt::from(-2)));
    }

    #[test]
    fn test_entropy_based_information_loss_bounds() {
        let m = manager();
        let shares = m.domain_shares();
        let max_il = maximal_entropy_based_information_loss(shares);
        assert!((max_il - 0.125).abs() < 1e-12);
        assert_eq!(entropy_based_information_loss(&[0, 0], &[0, 0], shares, max_il), 0.0);
        let top = entropy_based_information_loss(&[2, 1], &[6, 2], shares, max_il);
        assert!((top - 1.0).abs() < 1e-12);
    }
    #[test]
    fn test_domain_share_requires_initialization() {
        let metric = EntropyDomainShareMetric::new();
        assert!(matches!(
            metric.lower_bound(&[0, 0]),
            Err(AnonError::MetricNotInitialized(_))
        ));
    }

    #[test]
    fn test_domain_share_loss_range_and_bound() {
        let m = manager();
        let mut metric = Metric::from_config(&MetricConfig::EntropyDomainShare);
        metric.initialize(&m).unwrap();
        assert!(metric.is_monotonic_with_generalization());
        let bottom = metric.information_loss(&[0, 0], &group(&m, &[0, 0])).unwrap();
        let top = metric.information_loss(&[2, 1], &group(&m, &[2, 1])).unwrap();
        assert_eq!(bottom.loss.value(), 0.0);
        assert!((top.loss.value() - 1.0).abs() < 1e-12);

        // age at level 1 covers half the domain: ln(0.5 * 0.5 / 0.125) / ln 8 = 1/3
        let middle = metric.information_loss(&[1, 0], &group(&m, &[1, 0])).unwrap();
        assert!((middle.loss.value() - 1.0 / 3.0).abs() < 1e-12);
        let bound = middle.lower_bound.unwrap().value();
        assert!(bound <= middle.loss.value() + 1e-12);
    }

    #[test]
    fn test_domain_share_loss_grows_with_generalization() {
        let m = manager();
        let mut metric = EntropyDomainShareMetric::new();
        metric.initialize(&m).unwrap();
        let chain = [[0, 0], [1, 0], [1, 1], [2, 1]];
        let losses: Vec<f64> = chain
            .iter()
            .map(|levels| metric.information_loss(levels, &group(&m, levels)).unwrap().loss.value())
            .collect();
        assert!(losses.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn test_domain_share_score_is_negated_loss() {
        let m = manager();
        let mut metric = Metric::from_config(&MetricConfig::EntropyDomainShare);
        metric.initialize(&m).unwrap();
        assert!(metric.is_score_supported());
        let g = group(&m, &[2, 1]);
        let score = metric.score(&[2, 1], &g).unwrap();
        let loss = metric.information_loss(&[2, 1], &g).unwrap().loss.value();
        assert_eq!(score, -BigRational::from_float(loss).unwrap());
        let bottom = metric.score(&[0, 0], &group(&m, &[0, 0])).unwrap();
        assert_eq!(bottom, BigRational::from_integer(BigInt::from(0)));
    }
}
