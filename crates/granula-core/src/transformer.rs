//! Applies level tuples to coded rows and feeds the results to a sink.
//!
//! Three scan modes share the same per-row generalization:
//! every input row, one representative per class of a previous grouping, or
//! one representative per record of a history snapshot.

use tracing::debug;

use crate::data_manager::DataManager;
use crate::groupify::{Distribution, HashGroupify};
use crate::history::{DistributionDictionary, Snapshot};

/// Which rows a scan visits.
#[derive(Debug, Clone, Copy)]
pub enum ScanMode<'a> {
    /// Every input row.
    All,
    /// The representative of each class of a previous, less generalized grouping.
    Groupify(&'a HashGroupify),
    /// The representative of each record of a snapshot.
    Snapshot(&'a Snapshot, &'a DistributionDictionary),
}

/// What a generalized row stands for.
#[derive(Debug, Clone, Copy)]
pub enum RowSource<'a> {
    /// A single input record.
    Row(usize),
    /// A whole class of an earlier grouping.
    Class {
        /// Representative input row.
        representative: usize,
        /// Records inside the research subset.
        count: usize,
        /// All records.
        pcount: usize,
        /// Sensitive-value frequencies, if tracked.
        distribution: Option<&'a Distribution>,
    },
}

/// Receives each generalized row of a scan.
pub trait RowSink {
    /// Called once per visited row with its generalized key.
    fn accept(&mut self, key: &[u32], source: RowSource<'_>);
}

impl<F> RowSink for F
where
    F: FnMut(&[u32], RowSource<'_>),
{
    fn accept(&mut self, key: &[u32], source: RowSource<'_>) {
        self(key, source)
    }
}

/// Sink that groups rows into a [`HashGroupify`].
pub struct GroupifyBuilder<'a> {
    manager: &'a DataManager,
    groupify: HashGroupify,
}

impl<'a> GroupifyBuilder<'a> {
    /// Starts an empty grouping sized for `capacity` classes.
    pub fn new(manager: &'a DataManager, capacity: usize, track_distribution: bool) -> Self {
        Self {
            manager,
            groupify: HashGroupify::new(capacity, track_distribution),
        }
    }

    /// The finished grouping.
    pub fn finish(self) -> HashGroupify {
        self.groupify
    }
}

impl RowSink for GroupifyBuilder<'_> {
    fn accept(&mut self, key: &[u32], source: RowSource<'_>) {
        match source {
            RowSource::Row(row) => {
                let sensitive = self.manager.sensitive().map(|s| s[row]);
                self.groupify
                    .add_from_row(key, row, self.manager.in_subset(row), sensitive);
            }
            RowSource::Class {
                representative,
                count,
                pcount,
                distribution,
            } => self
                .groupify
                .add_class(key, representative, count, pcount, distribution),
        }
    }
}

/// Generalizes rows of one [`DataManager`].
#[derive(Debug, Clone, Copy)]
pub struct Transformer<'a> {
    manager: &'a DataManager,
}

impl<'a> Transformer<'a> {
    /// Creates a transformer over the manager's data and hierarchies.
    pub fn new(manager: &'a DataManager) -> Self {
        Self { manager }
    }

    /// Writes the generalization of input `row` at `levels` into `out`.
    #[inline]
    pub fn transform_row(&self, row: usize, levels: &[u32], out: &mut [u32]) {
        let data = self.manager.data();
        for (column, hierarchy) in self.manager.hierarchies().iter().enumerate() {
            out[column] = hierarchy.generalize(data.get(row, column), levels[column]);
        }
    }

    /// Scans the rows selected by `mode`, feeding each generalized row to `sink`.
    pub fn apply<S: RowSink>(&self, levels: &[u32], mode: ScanMode<'_>, sink: &mut S) {
        self.apply_range(levels, mode, 0..self.manager.data().rows(), sink);
    }

    fn apply_range<S: RowSink>(
        &self,
        levels: &[u32],
        mode: ScanMode<'_>,
        rows: std::ops::Range<usize>,
        sink: &mut S,
    ) {
        let mut key = vec![0u32; self.manager.data().columns()];
        match mode {
            ScanMode::All => {
                for row in rows {
                    self.transform_row(row, levels, &mut key);
                    sink.accept(&key, RowSource::Row(row));
                }
            }
            ScanMode::Groupify(previous) => {
                for entry in previous.iter() {
                    self.transform_row(entry.representative, levels, &mut key);
                    sink.accept(
                        &key,
                        RowSource::Class {
                            representative: entry.representative,
                            count: entry.count,
                            pcount: entry.pcount,
                            distribution: entry.distribution.as_ref(),
                        },
                    );
                }
            }
            ScanMode::Snapshot(snapshot, dictionary) => {
                for offset in (0..snapshot.data().len()).step_by(snapshot.stride()) {
                    let record = snapshot.record(offset);
                    self.transform_row(record.representative, levels, &mut key);
                    sink.accept(
                        &key,
                        RowSource::Class {
                            representative: record.representative,
                            count: record.count,
                            pcount: record.pcount,
                            distribution: record.distribution.and_then(|id| dictionary.get(id)),
                        },
                    );
                }
            }
        }
    }

    /// Groups the rows selected by `mode`.
    ///
    /// Full scans are split into contiguous row partitions across up to
    /// `workers` threads once each partition has at least `min_rows_per_worker`
    /// rows. Partial groupings are merged in partition order, so the result is
    /// identical to a sequential scan.
    pub fn group(
        &self,
        levels: &[u32],
        mode: ScanMode<'_>,
        track_distribution: bool,
        workers: usize,
        min_rows_per_worker: usize,
    ) -> HashGroupify {
        let rows = self.manager.data().rows();
        let capacity = match mode {
            ScanMode::All => rows,
            ScanMode::Groupify(g) => g.len(),
            ScanMode::Snapshot(s, _) => s.len(),
        };
        let partitions = match mode {
            ScanMode::All => workers.min(rows / min_rows_per_worker.max(1)).max(1),
            _ => 1,
        };
        if partitions == 1 {
            let mut builder = GroupifyBuilder::new(self.manager, capacity, track_distribution);
            self.apply(levels, mode, &mut builder);
            return builder.finish();
        }

        debug!(partitions, rows, "parallel full scan");
        let chunk = rows.div_ceil(partitions);
        let partials: Vec<HashGroupify> = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..partitions)
                .map(|p| {
                    let range = (p * chunk).min(rows)..((p + 1) * chunk).min(rows);
                    scope.spawn(move || {
                        let mut builder =
                            GroupifyBuilder::new(self.manager, range.len(), track_distribution);
                        self.apply_range(levels, ScanMode::All, range, &mut builder);
                        builder.finish()
                    })
                })
                .collect();
            handles
                .into_iter()
                .map(|h| match h.join() {
                    Ok(g) => g,
                    Err(panic) => std::panic::resume_unwind(panic),
                })
                .collect()
        });

        let mut partials = partials.into_iter();
        let mut merged = partials
            .next()
            .unwrap_or_else(|| HashGroupify::new(0, track_distribution));
        for partial in partials {
            merged.merge(partial);
        }
        merged
    }
}
