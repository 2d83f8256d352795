//! History cache of compressed groupings for incremental re-evaluation.
//!
//! A snapshot of transformation `t` lists one representative per class of
//! `t` with the class counters. Any transformation `s` that generalizes every
//! attribute at least as far as `t` can be grouped from the snapshot alone,
//! because classes of `t` never split under further generalization.

use std::collections::{HashMap, VecDeque};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::groupify::{Distribution, HashGroupify};
use crate::lattice::TransformationId;
use crate::loss::InformationLoss;

/// Marker for "no distribution" in a snapshot record.
const NO_DISTRIBUTION: u32 = u32::MAX;

/// Which snapshots are retained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum StorageStrategy {
    /// Store every eligible snapshot.
    #[default]
    All,
    /// Only snapshots of transformations whose loss exceeds the threshold.
    AboveThreshold,
    /// Only snapshots of transformations whose loss is below the threshold.
    BelowThreshold,
    /// Never store snapshots.
    None,
}

/// History cache configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    /// Retention strategy.
    pub storage_strategy: StorageStrategy,
    /// Loss threshold used by the threshold strategies.
    pub loss_threshold: f64,
    /// Maximum number of snapshots; the oldest is evicted first (default 200).
    pub max_entries: usize,
    /// Store only snapshots with at most this fraction of the dataset's rows as classes (default 0.2).
    pub snapshot_size_dataset: f64,
    /// Store a snapshot derived from another only when at most this fraction of its size (default 0.8).
    pub snapshot_size_snapshot: f64,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            storage_strategy: StorageStrategy::All,
            loss_threshold: 0.0,
            max_entries: 200,
            snapshot_size_dataset: 0.2,
            snapshot_size_snapshot: 0.8,
        }
    }
}

/// Hit/miss accounting for the history cache.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HistoryStats {
    /// Lookups that found a usable snapshot.
    pub hits: u64,
    /// Lookups that found nothing.
    pub misses: u64,
    /// Snapshots stored.
    pub stored: u64,
    /// Snapshots evicted.
    pub evictions: u64,
}

impl HistoryStats {
    /// Ratio of hits to lookups; 0.0 without lookups.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// Interns encoded distributions so snapshot records have a fixed width.
#[derive(Debug, Clone, Default)]
pub struct DistributionDictionary {
    ids: HashMap<Vec<u32>, u32>,
    values: Vec<Distribution>,
}

impl DistributionDictionary {
    /// Returns the id of `distribution`, interning it if needed.
    pub fn intern(&mut self, distribution: &Distribution) -> u32 {
        let encoded = distribution.encode();
        if let Some(&id) = self.ids.get(&encoded) {
            return id;
        }
        let id = self.values.len() as u32;
        self.ids.insert(encoded, id);
        self.values.push(distribution.clone());
        id
    }

    /// Distribution for `id`.
    pub fn get(&self, id: u32) -> Option<&Distribution> {
        self.values.get(id as usize)
    }

    /// Number of interned distributions.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether nothing is interned.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// One decoded snapshot record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SnapshotRecord {
    /// Representative row.
    pub representative: usize,
    /// Records in the research subset.
    pub count: usize,
    /// All records.
    pub pcount: usize,
    /// Interned distribution id.
    pub distribution: Option<u32>,
}

/// Fixed-stride compressed grouping of one transformation.
#[derive(Debug, Clone)]
pub struct Snapshot {
    levels: Vec<u32>,
    stride: usize,
    data: Vec<u32>,
}

impl Snapshot {
    /// Compresses `groupify`, interning distributions into `dictionary`.
    pub fn from_groupify(
        levels: &[u32],
        groupify: &HashGroupify,
        dictionary: &mut DistributionDictionary,
    ) -> Self {
        let stride = if groupify.tracks_distribution() { 4 } else { 3 };
        let mut data = Vec::with_capacity(groupify.len() * stride);
        for entry in groupify.iter() {
            data.push(entry.representative as u32);
            data.push(entry.count as u32);
            data.push(entry.pcount as u32);
            if stride == 4 {
                data.push(
                    entry
                        .distribution
                        .as_ref()
                        .map(|d| dictionary.intern(d))
                        .unwrap_or(NO_DISTRIBUTION),
                );
            }
        }
        Self {
            levels: levels.to_vec(),
            stride,
            data,
        }
    }

    /// Levels of the snapshotted transformation.
    pub fn levels(&self) -> &[u32] {
        &self.levels
    }

    /// Width of one record.
    pub fn stride(&self) -> usize {
        self.stride
    }

    /// Raw record data.
    pub fn data(&self) -> &[u32] {
        &self.data
    }

    /// Number of classes.
    pub fn len(&self) -> usize {
        self.data.len() / self.stride
    }

    /// Whether the snapshot holds no classes.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Decodes the record starting at `offset`.
    pub fn record(&self, offset: usize) -> SnapshotRecord {
        let distribution = if self.stride == 4 {
            Some(self.data[offset + 3]).filter(|&id| id != NO_DISTRIBUTION)
        } else {
            None
        };
        SnapshotRecord {
            representative: self.data[offset] as usize,
            count: self.data[offset + 1] as usize,
            pcount: self.data[offset + 2] as usize,
            distribution,
        }
    }

    /// Whether `levels` generalizes every attribute at least as far as this snapshot.
    pub fn is_usable_for(&self, levels: &[u32]) -> bool {
        self.levels.len() == levels.len() && self.levels.iter().zip(levels).all(|(s, l)| s <= l)
    }
}

/// The cache of snapshots, keyed by transformation.
#[derive(Debug)]
pub struct History {
    config: HistoryConfig,
    rows: usize,
    snapshots: HashMap<TransformationId, Snapshot>,
    order: VecDeque<TransformationId>,
    dictionary: DistributionDictionary,
    stats: HistoryStats,
}

impl History {
    /// Creates an empty cache for a dataset with `rows` records.
    pub fn new(config: HistoryConfig, rows: usize) -> Self {
        Self {
            config,
            rows,
            snapshots: HashMap::new(),
            order: VecDeque::new(),
            dictionary: DistributionDictionary::default(),
            stats: HistoryStats::default(),
        }
    }

    /// Changes the retention strategy for future snapshots.
    pub fn set_storage_strategy(&mut self, strategy: StorageStrategy) {
        self.config.storage_strategy = strategy;
    }

    /// The current retention strategy.
    pub fn storage_strategy(&self) -> StorageStrategy {
        self.config.storage_strategy
    }

    /// Finds the smallest stored snapshot usable for `levels`.
    pub fn find_closest(&mut self, levels: &[u32]) -> Option<TransformationId> {
        let found = self
            .snapshots
            .iter()
            .filter(|(_, s)| s.is_usable_for(levels))
            .min_by_key(|(id, s)| (s.len(), **id))
            .map(|(id, _)| *id);
        match found {
            Some(id) => {
                self.stats.hits += 1;
                debug!(?id, "history hit");
            }
            None => self.stats.misses += 1,
        }
        found
    }

    /// Snapshot stored for `id`.
    pub fn get(&self, id: TransformationId) -> Option<&Snapshot> {
        self.snapshots.get(&id)
    }

    /// Interned distributions referenced by snapshots.
    pub fn dictionary(&self) -> &DistributionDictionary {
        &self.dictionary
    }

    /// Stores a snapshot of `groupify` if the strategy and size limits allow it.
    ///
    /// `source_size` is the class count of the snapshot the grouping was
    /// derived from, if any. Returns whether a snapshot was stored.
    pub fn store(
        &mut self,
        id: TransformationId,
        levels: &[u32],
        groupify: &HashGroupify,
        loss: &InformationLoss,
        source_size: Option<usize>,
    ) -> bool {
        if self.config.max_entries == 0 || self.snapshots.contains_key(&id) {
            return false;
        }
        let eligible = match self.config.storage_strategy {
            StorageStrategy::All => true,
            StorageStrategy::AboveThreshold => loss.value() > self.config.loss_threshold,
            StorageStrategy::BelowThreshold => loss.value() < self.config.loss_threshold,
            StorageStrategy::None => false,
        };
        if !eligible {
            return false;
        }
        let classes = groupify.len() as f64;
        if classes > self.config.snapshot_size_dataset * self.rows as f64 {
            return false;
        }
        if let Some(source) = source_size {
            if classes > self.config.snapshot_size_snapshot * source as f64 {
                return false;
            }
        }
        while self.snapshots.len() >= self.config.max_entries {
            match self.order.pop_front() {
                Some(evicted) => {
                    self.snapshots.remove(&evicted);
                    self.stats.evictions += 1;
                    debug!(id = ?evicted, "evicted snapshot");
                }
                None => break,
            }
        }
        let snapshot = Snapshot::from_groupify(levels, groupify, &mut self.dictionary);
        self.snapshots.insert(id, snapshot);
        self.order.push_back(id);
        self.stats.stored += 1;
        true
    }

    /// Number of stored snapshots.
    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    /// Whether nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    /// Hit/miss accounting.
    pub fn stats(&self) -> &HistoryStats {
        &self.stats
    }

    /// Drops every snapshot.
    pub fn reset(&mut self) {
        self.snapshots.clear();
        self.order.clear();
        self.dictionary = DistributionDictionary::default();
    }
}
