//! Synthetic coded datasets.
//!
//! Every dataset is generated from a seed so failing scenarios reproduce.

use granula_core::{AnonResult, DataManager, DataMatrix, GeneralizationHierarchy};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Three-level hierarchy over `values` codes: the value, its bucket of
/// `bucket` neighbours, and a single suppressed value.
pub fn bucket_hierarchy(
    name: &str,
    values: u32,
    bucket: u32,
) -> AnonResult<GeneralizationHierarchy> {
    let buckets = values.div_ceil(bucket);
    let map = (0..values)
        .map(|v| vec![v, values + v / bucket, values + buckets])
        .collect();
    GeneralizationHierarchy::new(name, 3, map)
}

/// A coded quasi-identifier matrix with one hierarchy per column and a
/// coded sensitive attribute.
#[derive(Debug, Clone)]
pub struct SyntheticDataset {
    pub seed: u64,
    pub data: DataMatrix,
    pub hierarchies: Vec<GeneralizationHierarchy>,
    pub sensitive: Vec<u32>,
}

/// (name, domain size, bucket width) of each generated attribute.
const ATTRIBUTES: [(&str, u32, u32); 4] = [
    ("age", 20, 5),
    ("zipcode", 12, 4),
    ("sex", 2, 2),
    ("education", 8, 4),
];

const DIAGNOSES: u32 = 5;

impl SyntheticDataset {
    /// Draws `rows` records over four attributes with skewed value
    /// frequencies, so that some classes stay small until generalized.
    pub fn generate(seed: u64, rows: usize) -> AnonResult<Self> {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut columns: Vec<Vec<u32>> = vec![Vec::with_capacity(rows); ATTRIBUTES.len()];
        let mut sensitive = Vec::with_capacity(rows);
        for _ in 0..rows {
            for (column, &(_, values, _)) in columns.iter_mut().zip(ATTRIBUTES.iter()) {
                // min of two draws skews toward small codes
                let value = rng.gen_range(0..values).min(rng.gen_range(0..values));
                column.push(value);
            }
            sensitive.push(rng.gen_range(0..DIAGNOSES));
        }
        let hierarchies = ATTRIBUTES
            .iter()
            .map(|&(name, values, bucket)| bucket_hierarchy(name, values, bucket))
            .collect::<AnonResult<Vec<_>>>()?;
        Ok(Self {
            seed,
            data: DataMatrix::from_columns(columns)?,
            hierarchies,
            sensitive,
        })
    }

    /// The standard scenario dataset: 1,000 rows.
    pub fn standard(seed: u64) -> AnonResult<Self> {
        Self::generate(seed, 1000)
    }

    pub fn rows(&self) -> usize {
        self.data.rows()
    }

    /// A data manager over the quasi-identifiers only.
    pub fn manager(&self) -> AnonResult<DataManager> {
        DataManager::new(self.data.clone(), self.hierarchies.clone(), &[])
    }

    /// A data manager that also carries the sensitive attribute.
    pub fn manager_with_sensitive(&self) -> AnonResult<DataManager> {
        self.manager()?.with_sensitive(self.sensitive.clone())
    }
}
