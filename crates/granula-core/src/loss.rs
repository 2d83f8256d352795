//! Information-loss values and their aggregation.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

/// How per-attribute losses are folded into the scalar used for comparisons.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum AggregateFunction {
    /// Sum of all dimensions.
    #[default]
    Sum,
    /// Largest dimension.
    Maximum,
    /// Arithmetic mean of all dimensions.
    ArithmeticMean,
    /// Geometric mean of `value + 1`, minus one, so zero dimensions are allowed.
    GeometricMean,
}

impl AggregateFunction {
    /// Folds `values` into one scalar.
    pub fn aggregate(&self, values: &[f64]) -> f64 {
        if values.is_empty() {
            return 0.0;
        }
        match self {
            AggregateFunction::Sum => values.iter().sum(),
            AggregateFunction::Maximum => values.iter().copied().fold(f64::NEG_INFINITY, f64::max),
            AggregateFunction::ArithmeticMean => values.iter().sum::<f64>() / values.len() as f64,
            AggregateFunction::GeometricMean => {
                let log_sum: f64 = values.iter().map(|v| (v + 1.0).ln()).sum();
                (log_sum / values.len() as f64).exp() - 1.0
            }
        }
    }
}

impl std::fmt::Display for AggregateFunction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            AggregateFunction::Sum => "Sum",
            AggregateFunction::Maximum => "Maximum",
            AggregateFunction::ArithmeticMean => "Arithmetic mean",
            AggregateFunction::GeometricMean => "Geometric mean",
        };
        f.write_str(name)
    }
}

/// A possibly multi-dimensional information loss with its aggregated scalar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InformationLoss {
    values: Vec<f64>,
    aggregate: AggregateFunction,
    value: f64,
}

impl InformationLoss {
    /// Multi-dimensional loss folded with `aggregate`.
    pub fn new(values: Vec<f64>, aggregate: AggregateFunction) -> Self {
        let value = aggregate.aggregate(&values);
        Self {
            values,
            aggregate,
            value,
        }
    }

    /// Single-dimensional loss.
    pub fn scalar(value: f64) -> Self {
        Self::new(vec![value], AggregateFunction::Sum)
    }

    /// Aggregated scalar.
    pub fn value(&self) -> f64 {
        self.value
    }

    /// Per-dimension values.
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Aggregate function used.
    pub fn aggregate_function(&self) -> AggregateFunction {
        self.aggregate
    }

    /// Total order on the aggregated scalar.
    pub fn compare(&self, other: &InformationLoss) -> Ordering {
        self.value.total_cmp(&other.value)
    }
}

impl PartialOrd for InformationLoss {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.compare(other))
    }
}

/// A loss together with the metric's lower bound for the same transformation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InformationLossWithBound {
    /// The information loss.
    pub loss: InformationLoss,
    /// A bound that never exceeds `loss`, if the metric provides one.
    pub lower_bound: Option<InformationLoss>,
}

impl InformationLossWithBound {
    /// A loss whose lower bound equals the loss itself.
    pub fn exact(loss: InformationLoss) -> Self {
        Self {
            lower_bound: Some(loss.clone()),
            loss,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_aggregates() {
        let v = [1.0, 2.0, 3.0];
        assert_eq!(AggregateFunction::Sum.aggregate(&v), 6.0);
        assert_eq!(AggregateFunction::Maximum.aggregate(&v), 3.0);
        assert_eq!(AggregateFunction::ArithmeticMean.aggregate(&v), 2.0);
        let g = AggregateFunction::GeometricMean.aggregate(&[0.0, 0.0]);
        assert!(g.abs() < 1e-12);
    }

    #[test]
    fn test_empty_aggregate_is_zero() {
        assert_eq!(AggregateFunction::Maximum.aggregate(&[]), 0.0);
    }

    #[test]
    fn test_ordering_on_aggregate() {
        let a = InformationLoss::new(vec![1.0, 1.0], AggregateFunction::Sum);
        let b = InformationLoss::new(vec![0.0, 3.0], AggregateFunction::Sum);
        assert!(a < b);
        let a = InformationLoss::new(vec![1.0, 1.0], AggregateFunction::Maximum);
        let b = InformationLoss::new(vec![0.0, 3.0], AggregateFunction::Maximum);
        assert!(a < b);
        assert_eq!(a.compare(&a.clone()), Ordering::Equal);
    }

    #[test]
    fn test_exact_bound() {
        let l = InformationLossWithBound::exact(InformationLoss::scalar(4.0));
        assert_eq!(l.lower_bound.unwrap().value(), 4.0);
    }
}
