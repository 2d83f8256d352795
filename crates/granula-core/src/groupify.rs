//! Hash-based grouping of generalized records into equivalence classes.
//!
//! Classes live in an arena (`Vec<GroupifyEntry>`). Buckets and both
//! traversal chains are expressed as arena indices: `next` links entries in
//! the same bucket, `next_ordered` links all entries in insertion order.

use std::collections::BTreeMap;

use xxhash_rust::xxh3::Xxh3;

use crate::criteria::{PrivacyCriterion, PrivacyModel};

const INITIAL_BUCKETS: usize = 64;
const LOAD_FACTOR: f64 = 0.75;

/// Frequencies of sensitive values within one class.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Distribution {
    frequencies: BTreeMap<u32, usize>,
}

impl Distribution {
    /// Adds `frequency` occurrences of `value`.
    pub fn add(&mut self, value: u32, frequency: usize) {
        if frequency > 0 {
            *self.frequencies.entry(value).or_insert(0) += frequency;
        }
    }

    /// Adds every frequency of `other`.
    pub fn merge(&mut self, other: &Distribution) {
        for (&value, &frequency) in &other.frequencies {
            self.add(value, frequency);
        }
    }

    /// Number of distinct sensitive values.
    pub fn distinct(&self) -> usize {
        self.frequencies.len()
    }

    /// Frequency of `value`.
    pub fn frequency(&self, value: u32) -> usize {
        self.frequencies.get(&value).copied().unwrap_or(0)
    }

    /// `(value, frequency)` pairs in ascending value order.
    pub fn iter(&self) -> impl Iterator<Item = (u32, usize)> + '_ {
        self.frequencies.iter().map(|(&v, &f)| (v, f))
    }

    /// Flattened `[value, frequency, value, frequency, ...]` encoding.
    pub fn encode(&self) -> Vec<u32> {
        let mut out = Vec::with_capacity(self.frequencies.len() * 2);
        for (&value, &frequency) in &self.frequencies {
            out.push(value);
            out.push(frequency as u32);
        }
        out
    }

    /// Inverse of [`Distribution::encode`].
    pub fn decode(encoded: &[u32]) -> Self {
        let mut d = Distribution::default();
        for pair in encoded.chunks_exact(2) {
            d.add(pair[0], pair[1] as usize);
        }
        d
    }
}

/// One equivalence class.
#[derive(Debug, Clone)]
pub struct GroupifyEntry {
    /// Generalized quasi-identifier values shared by the class.
    pub key: Vec<u32>,
    /// Index of one record of the class in the input data.
    pub representative: usize,
    /// Records of the class inside the research subset.
    pub count: usize,
    /// All records of the class (secondary counter).
    pub pcount: usize,
    /// Sensitive-value frequencies, when tracked.
    pub distribution: Option<Distribution>,
    /// Whether the class satisfied every criterion in the last analysis.
    pub is_not_outlier: bool,
    hash: u64,
    next: Option<usize>,
    next_ordered: Option<usize>,
}

/// Hash table of equivalence classes keyed by generalized values.
#[derive(Debug, Clone)]
pub struct HashGroupify {
    buckets: Vec<Option<usize>>,
    entries: Vec<GroupifyEntry>,
    first: Option<usize>,
    last: Option<usize>,
    track_distribution: bool,
}

fn hash_key(key: &[u32]) -> u64 {
    let mut hasher = Xxh3::new();
    for value in key {
        hasher.update(&value.to_le_bytes());
    }
    hasher.digest()
}

impl HashGroupify {
    /// Creates an empty grouping sized for roughly `capacity` classes.
    pub fn new(capacity: usize, track_distribution: bool) -> Self {
        let buckets = ((capacity as f64 / LOAD_FACTOR) as usize)
            .max(INITIAL_BUCKETS)
            .next_power_of_two();
        Self {
            buckets: vec![None; buckets],
            entries: Vec::new(),
            first: None,
            last: None,
            track_distribution,
        }
    }

    /// Whether classes carry sensitive-value distributions.
    pub fn tracks_distribution(&self) -> bool {
        self.track_distribution
    }

    /// Adds one input record.
    pub fn add_from_row(&mut self, key: &[u32], row: usize, in_subset: bool, sensitive: Option<u32>) {
        let count = usize::from(in_subset);
        let index = self.find_or_insert(key, row);
        let track = self.track_distribution;
        let entry = &mut self.entries[index];
        entry.count += count;
        entry.pcount += 1;
        if track {
            if let Some(value) = sensitive {
                entry
                    .distribution
                    .get_or_insert_with(Distribution::default)
                    .add(value, count);
            }
        }
    }

    /// Adds a whole class (from a previous grouping or a snapshot) under a new key.
    ///
    /// Classes that collide on `key` merge their counters and distributions.
    pub fn add_class(
        &mut self,
        key: &[u32],
        representative: usize,
        count: usize,
        pcount: usize,
        distribution: Option<&Distribution>,
    ) {
        let index = self.find_or_insert(key, representative);
        let track = self.track_distribution;
        let entry = &mut self.entries[index];
        entry.count += count;
        entry.pcount += pcount;
        if track {
            if let Some(d) = distribution {
                entry
                    .distribution
                    .get_or_insert_with(Distribution::default)
                    .merge(d);
            }
        }
    }

    /// Merges a partial grouping built over a later, disjoint row partition.
    pub fn merge(&mut self, other: HashGroupify) {
        for entry in other.iter() {
            self.add_class(
                &entry.key,
                entry.representative,
                entry.count,
                entry.pcount,
                entry.distribution.as_ref(),
            );
        }
    }

    fn find_or_insert(&mut self, key: &[u32], representative: usize) -> usize {
        let hash = hash_key(key);
        let mask = self.buckets.len() - 1;
        let mut cursor = self.buckets[(hash as usize) & mask];
        while let Some(index) = cursor {
            let entry = &self.entries[index];
            if entry.hash == hash && entry.key == key {
                return index;
            }
            cursor = entry.next;
        }
        if (self.entries.len() + 1) as f64 > self.buckets.len() as f64 * LOAD_FACTOR {
            self.rehash();
        }
        let index = self.entries.len();
        let bucket = (hash as usize) & (self.buckets.len() - 1);
        self.entries.push(GroupifyEntry {
            key: key.to_vec(),
            representative,
            count: 0,
            pcount: 0,
            distribution: None,
            is_not_outlier: false,
            hash,
            next: self.buckets[bucket],
            next_ordered: None,
        });
        self.buckets[bucket] = Some(index);
        if let Some(last) = self.last {
            self.entries[last].next_ordered = Some(index);
        }
        self.first.get_or_insert(index);
        self.last = Some(index);
        index
    }

    fn rehash(&mut self) {
        let size = self.buckets.len() * 2;
        let mask = size - 1;
        let mut buckets = vec![None; size];
        for (index, entry) in self.entries.iter_mut().enumerate() {
            let bucket = (entry.hash as usize) & mask;
            entry.next = buckets[bucket];
            buckets[bucket] = Some(index);
        }
        self.buckets = buckets;
    }

    /// Looks up the class with `key`.
    pub fn get(&self, key: &[u32]) -> Option<&GroupifyEntry> {
        let hash = hash_key(key);
        let mut cursor = self.buckets[(hash as usize) & (self.buckets.len() - 1)];
        while let Some(index) = cursor {
            let entry = &self.entries[index];
            if entry.hash == hash && entry.key == key {
                return Some(entry);
            }
            cursor = entry.next;
        }
        None
    }

    /// Classes in insertion order.
    pub fn iter(&self) -> OrderedIter<'_> {
        OrderedIter {
            groupify: self,
            cursor: self.first,
        }
    }

    /// Number of classes.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether there are no classes.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Sum of `count` over all classes.
    pub fn total_count(&self) -> usize {
        self.entries.iter().map(|e| e.count).sum()
    }

    /// Sum of `pcount` over all classes.
    pub fn total_pcount(&self) -> usize {
        self.entries.iter().map(|e| e.pcount).sum()
    }

    /// Evaluates every criterion on every class.
    ///
    /// Returns whether the grouping is anonymous. Classes without records in
    /// the research subset are skipped. Each criterion stops at its first
    /// failing class; `is_not_outlier` is only exact for classes that were
    /// visited by every criterion.
    pub fn analyze(&mut self, levels: &[u32], criteria: &[PrivacyCriterion]) -> bool {
        for entry in &mut self.entries {
            entry.is_not_outlier = true;
        }
        let mut anonymous = true;
        for criterion in criteria {
            let mut cursor = self.first;
            while let Some(index) = cursor {
                let entry = &mut self.entries[index];
                cursor = entry.next_ordered;
                if entry.count == 0 {
                    continue;
                }
                if !criterion.is_anonymous(levels, entry) {
                    entry.is_not_outlier = false;
                    anonymous = false;
                    break;
                }
            }
            if !anonymous {
                break;
            }
        }
        anonymous
    }
}

/// Iterator along the `next_ordered` chain.
pub struct OrderedIter<'a> {
    groupify: &'a HashGroupify,
    cursor: Option<usize>,
}

impl<'a> Iterator for OrderedIter<'a> {
    type Item = &'a GroupifyEntry;

    fn next(&mut self) -> Option<Self::Item> {
        let index = self.cursor?;
        let entry = &self.groupify.entries[index];
        self.cursor = entry.next_ordered;
        Some(entry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::criteria::KAnonymity;

    #[test]
    fn test_groups_equal_keys() {
        let mut g = HashGroupify::new(4, false);
        g.add_from_row(&[1, 2], 0, true, None);
        g.add_from_row(&[1, 3], 1, true, None);
        g.add_from_row(&[1, 2], 2, true, None);
        assert_eq!(g.len(), 2);
        let e = g.get(&[1, 2]).unwrap();
        assert_eq!(e.count, 2);
        assert_eq!(e.pcount, 2);
        assert_eq!(e.representative, 0);
        assert_eq!(g.total_pcount(), 3);
    }

    #[test]
    fn test_insertion_order_survives_rehash() {
        let mut g = HashGroupify::new(1, false);
        for i in 0..500u32 {
            g.add_from_row(&[i, i % 7], i as usize, true, None);
        }
        assert_eq!(g.len(), 500);
        let keys: Vec<u32> = g.iter().map(|e| e.key[0]).collect();
        assert_eq!(keys, (0..500).collect::<Vec<_>>());
        assert!(g.get(&[499, 499 % 7]).is_some());
    }

    #[test]
    fn test_subset_counts() {
        let mut g = HashGroupify::new(4, false);
        g.add_from_row(&[0], 0, true, None);
        g.add_from_row(&[0], 1, false, None);
        let e = g.get(&[0]).unwrap();
        assert_eq!(e.count, 1);
        assert_eq!(e.pcount, 2);
    }

    #[test]
    fn test_distribution_tracking() {
        let mut g = HashGroupify::new(4, true);
        g.add_from_row(&[0], 0, true, Some(5));
        g.add_from_row(&[0], 1, true, Some(5));
        g.add_from_row(&[0], 2, true, Some(6));
        let d = g.get(&[0]).unwrap().distribution.as_ref().unwrap();
        assert_eq!(d.distinct(), 2);
        assert_eq!(d.frequency(5), 2);
    }

    #[test]
    fn test_merge_partitions() {
        let mut a = HashGroupify::new(4, true);
        a.add_from_row(&[0], 0, true, Some(1));
        a.add_from_row(&[1], 1, true, Some(1));
        let mut b = HashGroupify::new(4, true);
        b.add_from_row(&[1], 2, true, Some(2));
        b.add_from_row(&[2], 3, true, Some(2));
        a.merge(b);
        assert_eq!(a.len(), 3);
        let e = a.get(&[1]).unwrap();
        assert_eq!(e.count, 2);
        assert_eq!(e.representative, 1);
        assert_eq!(e.distribution.as_ref().unwrap().distinct(), 2);
        let order: Vec<u32> = a.iter().map(|e| e.key[0]).collect();
        assert_eq!(order, vec![0, 1, 2]);
    }

    #[test]
    fn test_distribution_encoding() {
        let mut d = Distribution::default();
        d.add(3, 2);
        d.add(1, 4);
        let encoded = d.encode();
        assert_eq!(encoded, vec![1, 4, 3, 2]);
        assert_eq!(Distribution::decode(&encoded), d);
    }

    #[test]
    fn test_analyze_marks_outliers() {
        let mut g = HashGroupify::new(4, false);
        g.add_from_row(&[0], 0, true, None);
        g.add_from_row(&[0], 1, true, None);
        g.add_from_row(&[1], 2, true, None);
        let k2 = vec![PrivacyCriterion::KAnonymity(KAnonymity::new(2))];
        assert!(!g.analyze(&[0], &k2));
        assert!(g.get(&[0]).unwrap().is_not_outlier);
        assert!(!g.get(&[1]).unwrap().is_not_outlier);
        let k1 = vec![PrivacyCriterion::KAnonymity(KAnonymity::new(1))];
        assert!(g.analyze(&[0], &k1));
    }

    #[test]
    fn test_analyze_skips_classes_outside_subset() {
        let mut g = HashGroupify::new(4, false);
        g.add_from_row(&[0], 0, true, None);
        g.add_from_row(&[0], 1, true, None);
        g.add_from_row(&[1], 2, false, None);
        let k2 = vec![PrivacyCriterion::KAnonymity(KAnonymity::new(2))];
        assert!(g.analyze(&[0], &k2));
    }
}
