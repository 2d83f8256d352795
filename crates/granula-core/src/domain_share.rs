//! Domain shares: the fraction of an attribute's leaf domain a generalized value covers.

use std::collections::HashMap;

use crate::hierarchy::GeneralizationHierarchy;

/// Materialized domain shares for one attribute.
#[derive(Debug, Clone)]
pub struct DomainShare {
    domain_size: f64,
    shares: Vec<HashMap<u32, f64>>,
}

impl DomainShare {
    /// Counts, per level, how many leaf values each generalized value covers.
    pub fn new(hierarchy: &GeneralizationHierarchy) -> Self {
        let domain_size = hierarchy.domain_size().max(1) as f64;
        let mut shares = Vec::with_capacity(hierarchy.height());
        for level in 0..hierarchy.height() {
            let mut counts: HashMap<u32, usize> = HashMap::new();
            for value in 0..hierarchy.domain_size() as u32 {
                *counts
                    .entry(hierarchy.generalize(value, level as u32))
                    .or_insert(0) += 1;
            }
            shares.push(
                counts
                    .into_iter()
                    .map(|(value, count)| (value, count as f64 / domain_size))
                    .collect(),
            );
        }
        Self { domain_size, shares }
    }

    /// Number of leaf values.
    pub fn domain_size(&self) -> f64 {
        self.domain_size
    }

    /// Share of `value` at `level`; a value unknown at that level counts as the whole domain.
    pub fn share(&self, value: u32, level: usize) -> f64 {
        self.shares
            .get(level)
            .and_then(|m| m.get(&value))
            .copied()
            .unwrap_or(1.0)
    }

    /// Smallest share of any value at `level`.
    pub fn min_share(&self, level: usize) -> f64 {
        self.shares
            .get(level)
            .and_then(|m| m.values().copied().reduce(f64::min))
            .unwrap_or(1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shares_per_level() {
        let h = GeneralizationHierarchy::new(
            "age",
            3,
            vec![vec![0, 4, 6], vec![1, 4, 6], vec![2, 5, 6], vec![3, 5, 6]],
        )
        .unwrap();
        let s = DomainShare::new(&h);
        assert_eq!(s.domain_size(), 4.0);
        assert!((s.share(1, 0) - 0.25).abs() < 1e-12);
        assert!((s.share(4, 1) - 0.5).abs() < 1e-12);
        assert!((s.share(6, 2) - 1.0).abs() < 1e-12);
        assert!((s.min_share(1) - 0.5).abs() < 1e-12);
        assert_eq!(s.min_share(7), 1.0);
    }

    #[test]
    fn test_unknown_value_is_whole_domain() {
        let h = GeneralizationHierarchy::identity("x", 3).unwrap();
        let s = DomainShare::new(&h);
        assert_eq!(s.share(99, 0), 1.0);
    }
}
