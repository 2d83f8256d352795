//! Generalization hierarchies: value to per-level generalized value tables.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{AnonError, AnonResult};

/// Per-attribute generalization table.
///
/// `map[value][level]` is the code of `value` generalized to `level`. Level 0
/// is the identity and every value generalizes through the same chain of
/// coarser values, so generalizing twice never splits a group apart again.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneralizationHierarchy {
    name: String,
    height: usize,
    map: Vec<Vec<u32>>,
}

impl GeneralizationHierarchy {
    /// Builds and validates a hierarchy with the declared `height` (number of levels).
    pub fn new(name: impl Into<String>, height: usize, map: Vec<Vec<u32>>) -> AnonResult<Self> {
        let name = name.into();
        if height == 0 {
            return Err(AnonError::InvalidConfig(format!(
                "hierarchy for attribute {} must have at least one level",
                name
            )));
        }
        for (value, levels) in map.iter().enumerate() {
            if levels.len() != height {
                return Err(AnonError::MalformedHierarchy {
                    attribute: name,
                    value,
                    expected: height,
                    actual: levels.len(),
                });
            }
            if levels[0] as usize != value {
                return Err(AnonError::InvalidConfig(format!(
                    "hierarchy for attribute {} maps value {} to {} at level 0",
                    name, value, levels[0]
                )));
            }
        }
        let hierarchy = Self { name, height, map };
        hierarchy.check_monotone()?;
        debug!(
            attribute = %hierarchy.name,
            height = hierarchy.height,
            values = hierarchy.map.len(),
            "validated generalization hierarchy"
        );
        Ok(hierarchy)
    }

    /// Builds a hierarchy whose height is taken from the first row.
    pub fn from_rows(name: impl Into<String>, map: Vec<Vec<u32>>) -> AnonResult<Self> {
        let height = map.first().map(|r| r.len()).unwrap_or(1);
        Self::new(name, height, map)
    }

    /// A single-level hierarchy over `values` codes (no generalization possible).
    pub fn identity(name: impl Into<String>, values: usize) -> AnonResult<Self> {
        Self::new(name, 1, (0..values as u32).map(|v| vec![v]).collect())
    }

    fn check_monotone(&self) -> AnonResult<()> {
        for level in 0..self.height.saturating_sub(1) {
            let mut parent: HashMap<u32, u32> = HashMap::new();
            for levels in &self.map {
                let next = levels[level + 1];
                match parent.insert(levels[level], next) {
                    Some(previous) if previous != next => {
                        return Err(AnonError::NonMonotonicHierarchy {
                            attribute: self.name.clone(),
                            level: level + 1,
                        });
                    }
                    _ => {}
                }
            }
        }
        Ok(())
    }

    /// Attribute name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of levels, including the identity level.
    pub fn height(&self) -> usize {
        self.height
    }

    /// Number of distinct input codes.
    pub fn domain_size(&self) -> usize {
        self.map.len()
    }

    /// Maps `value` to `level`. Out-of-range arguments are a contract violation.
    #[inline]
    pub fn generalize(&self, value: u32, level: u32) -> u32 {
        self.map[value as usize][level as usize]
    }

    /// The full level table for a value, if the value is covered.
    pub fn levels_of(&self, value: u32) -> Option<&[u32]> {
        self.map.get(value as usize).map(|v| v.as_slice())
    }

    /// Number of distinct generalized values at `level`.
    pub fn distinct_values(&self, level: usize) -> usize {
        self.map
            .iter()
            .map(|levels| levels[level])
            .collect::<HashSet<_>>()
            .len()
    }

    /// Whether `value` is covered by this hierarchy.
    pub fn contains(&self, value: u32) -> bool {
        (value as usize) < self.map.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn age() -> GeneralizationHierarchy {
        // 0..4 -> decade buckets -> *
        GeneralizationHierarchy::new(
            "age",
            3,
            vec![
                vec![0, 4, 6],
                vec![1, 4, 6],
                vec![2, 5, 6],
                vec![3, 5, 6],
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_generalize() {
        let h = age();
        assert_eq!(h.generalize(2, 0), 2);
        assert_eq!(h.generalize(2, 1), 5);
        assert_eq!(h.generalize(2, 2), 6);
    }

    #[test]
    fn test_short_row_is_malformed() {
        let err = GeneralizationHierarchy::new("zip", 3, vec![vec![0, 2, 3], vec![1, 2]]).unwrap_err();
        match err {
            AnonError::MalformedHierarchy {
                value,
                expected,
                actual,
                ..
            } => {
                assert_eq!(value, 1);
                assert_eq!(expected, 3);
                assert_eq!(actual, 2);
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_non_monotone_rejected() {
        // values 0 and 1 share level 1 but split at level 2
        let err = GeneralizationHierarchy::new(
            "zip",
            3,
            vec![vec![0, 2, 3], vec![1, 2, 4]],
        )
        .unwrap_err();
        assert!(matches!(err, AnonError::NonMonotonicHierarchy { level: 2, .. }));
    }

    #[test]
    fn test_level_zero_must_be_identity() {
        let err = GeneralizationHierarchy::new("x", 2, vec![vec![1, 2]]).unwrap_err();
        assert!(matches!(err, AnonError::InvalidConfig(_)));
    }

    #[test]
    fn test_distinct_values() {
        let h = age();
        assert_eq!(h.distinct_values(0), 4);
        assert_eq!(h.distinct_values(1), 2);
        assert_eq!(h.distinct_values(2), 1);
    }

    #[test]
    fn test_identity_hierarchy() {
        let h = GeneralizationHierarchy::identity("flag", 2).unwrap();
        assert_eq!(h.height(), 1);
        assert_eq!(h.generalize(1, 0), 1);
    }
}
