//! Owns the input data and everything derived from it for the duration of a search.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::domain_share::DomainShare;
use crate::error::{AnonError, AnonResult};
use crate::hierarchy::GeneralizationHierarchy;
use crate::matrix::DataMatrix;

/// Aggregate used to collapse a microaggregated attribute within one class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AggregationFunction {
    /// Most frequent code; ties go to the smallest code.
    Mode,
    /// Lower median of the codes.
    Median,
}

/// Attributes that are aggregated per class instead of generalized.
#[derive(Debug, Clone)]
pub struct Microaggregation {
    /// Coded values, one column per aggregated attribute.
    pub data: DataMatrix,
    /// Function per column.
    pub functions: Vec<AggregationFunction>,
}

/// Immutable inputs of one anonymization run.
#[derive(Debug, Clone)]
pub struct DataManager {
    data: DataMatrix,
    hierarchies: Vec<GeneralizationHierarchy>,
    min_levels: Vec<u32>,
    max_levels: Vec<u32>,
    sensitive: Option<Vec<u32>>,
    subset: Option<Vec<bool>>,
    microaggregation: Option<Microaggregation>,
    shares: Vec<DomainShare>,
}

impl DataManager {
    /// Validates the coded data against its hierarchies.
    ///
    /// `bounds[i]` optionally restricts attribute `i` to `[min, max]` levels.
    pub fn new(
        data: DataMatrix,
        hierarchies: Vec<GeneralizationHierarchy>,
        bounds: &[Option<(u32, u32)>],
    ) -> AnonResult<Self> {
        if hierarchies.len() != data.columns() {
            return Err(AnonError::DimensionMismatch {
                what: "hierarchies per quasi-identifier".to_string(),
                expected: data.columns(),
                actual: hierarchies.len(),
            });
        }
        if !bounds.is_empty() && bounds.len() != hierarchies.len() {
            return Err(AnonError::DimensionMismatch {
                what: "generalization bounds per quasi-identifier".to_string(),
                expected: hierarchies.len(),
                actual: bounds.len(),
            });
        }
        for (column, hierarchy) in hierarchies.iter().enumerate() {
            if let Some(&value) = data.column(column).iter().find(|&&v| !hierarchy.contains(v)) {
                return Err(AnonError::UnknownValue {
                    attribute: hierarchy.name().to_string(),
                    value,
                });
            }
        }
        let mut min_levels = Vec::with_capacity(hierarchies.len());
        let mut max_levels = Vec::with_capacity(hierarchies.len());
        for (i, hierarchy) in hierarchies.iter().enumerate() {
            let top = hierarchy.height() as u32 - 1;
            let (min, max) = bounds.get(i).copied().flatten().unwrap_or((0, top));
            if min > max || max > top {
                return Err(AnonError::InvalidConfig(format!(
                    "generalization bounds [{}, {}] out of range for attribute {} with height {}",
                    min,
                    max,
                    hierarchy.name(),
                    hierarchy.height()
                )));
            }
            min_levels.push(min);
            max_levels.push(max);
        }
        let shares = hierarchies.iter().map(DomainShare::new).collect();
        debug!(
            rows = data.rows(),
            quasi_identifiers = data.columns(),
            "created data manager"
        );
        Ok(Self {
            data,
            hierarchies,
            min_levels,
            max_levels,
            sensitive: None,
            subset: None,
            microaggregation: None,
            shares,
        })
    }

    /// Attaches a coded sensitive attribute, one value per record.
    pub fn with_sensitive(mut self, sensitive: Vec<u32>) -> AnonResult<Self> {
        if sensitive.len() != self.data.rows() {
            return Err(AnonError::DimensionMismatch {
                what: "sensitive values per record".to_string(),
                expected: self.data.rows(),
                actual: sensitive.len(),
            });
        }
        self.sensitive = Some(sensitive);
        Ok(self)
    }

    /// Restricts the research subset to the given row indices.
    pub fn with_subset(mut self, rows: &[usize]) -> AnonResult<Self> {
        let mut subset = vec![false; self.data.rows()];
        for &row in rows {
            let slot = subset.get_mut(row).ok_or_else(|| {
                AnonError::InvalidConfig(format!(
                    "subset row {} out of range for {} records",
                    row,
                    self.data.rows()
                ))
            })?;
            *slot = true;
        }
        self.subset = Some(subset);
        Ok(self)
    }

    /// Attaches attributes that are microaggregated per class.
    pub fn with_microaggregation(mut self, microaggregation: Microaggregation) -> AnonResult<Self> {
        if microaggregation.data.rows() != self.data.rows() {
            return Err(AnonError::DimensionMismatch {
                what: "microaggregated records".to_string(),
                expected: self.data.rows(),
                actual: microaggregation.data.rows(),
            });
        }
        if microaggregation.functions.len() != microaggregation.data.columns() {
            return Err(AnonError::DimensionMismatch {
                what: "aggregation functions per microaggregated attribute".to_string(),
                expected: microaggregation.data.columns(),
                actual: microaggregation.functions.len(),
            });
        }
        self.microaggregation = Some(microaggregation);
        Ok(self)
    }

    /// Quasi-identifying input data.
    pub fn data(&self) -> &DataMatrix {
        &self.data
    }

    /// Hierarchies, one per quasi-identifier.
    pub fn hierarchies(&self) -> &[GeneralizationHierarchy] {
        &self.hierarchies
    }

    /// Minimum generalization level per attribute.
    pub fn min_levels(&self) -> &[u32] {
        &self.min_levels
    }

    /// Maximum generalization level per attribute.
    pub fn max_levels(&self) -> &[u32] {
        &self.max_levels
    }

    /// Coded sensitive values, if any.
    pub fn sensitive(&self) -> Option<&[u32]> {
        self.sensitive.as_deref()
    }

    /// Whether `row` belongs to the research subset. Without a subset every row does.
    #[inline]
    pub fn in_subset(&self, row: usize) -> bool {
        self.subset.as_ref().map(|s| s[row]).unwrap_or(true)
    }

    /// Whether a research subset has been configured.
    pub fn has_subset(&self) -> bool {
        self.subset.is_some()
    }

    /// Number of rows in the research subset.
    pub fn subset_size(&self) -> usize {
        match &self.subset {
            Some(s) => s.iter().filter(|&&b| b).count(),
            None => self.data.rows(),
        }
    }

    /// Microaggregated attributes, if any.
    pub fn microaggregation(&self) -> Option<&Microaggregation> {
        self.microaggregation.as_ref()
    }

    /// Domain shares per quasi-identifier.
    pub fn domain_shares(&self) -> &[DomainShare] {
        &self.shares
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manager() -> DataManager {
        let data = DataMatrix::from_rows(&[vec![0, 1], vec![1, 0], vec![2, 1]]).unwrap();
        let a = GeneralizationHierarchy::new(
            "a",
            2,
            vec![vec![0, 3], vec![1, 3], vec![2, 3]],
        )
        .unwrap();
        let b = GeneralizationHierarchy::identity("b", 2).unwrap();
        DataManager::new(data, vec![a, b], &[]).unwrap()
    }

    #[test]
    fn test_default_bounds_cover_hierarchy() {
        let m = manager();
        assert_eq!(m.min_levels(), &[0, 0]);
        assert_eq!(m.max_levels(), &[1, 0]);
    }

    #[test]
    fn test_hierarchy_count_mismatch() {
        let data = DataMatrix::from_rows(&[vec![0, 0]]).unwrap();
        let h = GeneralizationHierarchy::identity("a", 1).unwrap();
        assert!(matches!(
            DataManager::new(data, vec![h], &[]),
            Err(AnonError::DimensionMismatch { .. })
        ));
    }

    #[test]
    fn test_uncovered_value_rejected() {
        let data = DataMatrix::from_rows(&[vec![5]]).unwrap();
        let h = GeneralizationHierarchy::identity("a", 2).unwrap();
        assert!(matches!(
            DataManager::new(data, vec![h], &[]),
            Err(AnonError::UnknownValue { value: 5, .. })
        ));
    }

    #[test]
    fn test_bounds_out_of_range() {
        let data = DataMatrix::from_rows(&[vec![0]]).unwrap();
        let h = GeneralizationHierarchy::new("a", 2, vec![vec![0, 1]]).unwrap();
        assert!(DataManager::new(data, vec![h], &[Some((0, 2))]).is_err());
    }

    #[test]
    fn test_subset() {
        let m = manager().with_subset(&[0, 2]).unwrap();
        assert!(m.in_subset(0));
        assert!(!m.in_subset(1));
        assert_eq!(m.subset_size(), 2);
        assert!(manager().with_subset(&[9]).is_err());
    }

    #[test]
    fn test_sensitive_length_checked() {
        assert!(manager().with_sensitive(vec![1, 2]).is_err());
        assert!(manager().with_sensitive(vec![1, 2, 3]).is_ok());
    }
}
