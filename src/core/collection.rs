//! Ordered partitioned collection.
//!
//! An [`OrderedPartitionedCollection`] is an immutable sequence of partitions,
//! each tagged with a [`RangeSplit`]. Splits are contiguous and pairwise
//! disjoint; rows inside a partition are sorted by key and lie within the
//! partition's split. The global order is partition order, then row order.
//!
//! Rows are produced lazily by a restartable row source: every call to
//! [`Partition::rows`] builds a fresh iterator, so nothing is consumed-once
//! and nothing is materialized unless the source itself holds a buffer.
//!
//! # Example
//!
//! ```
//! use tsframe::core::{OrderedPartitionedCollection, Partition, RangeSplit};
//!
//! let opc = OrderedPartitionedCollection::from_sorted_partitions(vec![
//!     Partition::from_vec(RangeSplit::bounded(0, 10)?, vec![(1, "a"), (4, "b")]),
//!     Partition::from_vec(RangeSplit::unbounded(10), vec![(12, "c")]),
//! ])?;
//!
//! let keys: Vec<i64> = opc.to_global_sequence().map(|(k, _)| k).collect();
//! assert_eq!(keys, vec![1, 4, 12]);
//! # Ok::<(), tsframe::Error>(())
//! ```

use std::fmt;
use std::sync::Arc;

use crate::core::split::RangeSplit;
use crate::core::{Error, Result};

/// Boxed row iterator produced by a partition's row source.
pub type RowIter<K, V> = Box<dyn Iterator<Item = (K, V)> + Send>;

type RowSource<K, V> = Arc<dyn Fn() -> RowIter<K, V> + Send + Sync>;

/// One partition: a split plus a restartable source of sorted rows.
pub struct Partition<K, V> {
    split: RangeSplit<K>,
    source: RowSource<K, V>,
}

impl<K, V> Partition<K, V> {
    pub fn split(&self) -> &RangeSplit<K> {
        &self.split
    }

    /// Start a fresh replay of this partition's rows.
    pub fn rows(&self) -> RowIter<K, V> {
        (self.source)()
    }
}

impl<K, V> Partition<K, V>
where
    K: Send + 'static,
    V: Send + 'static,
{
    /// Create a partition whose rows are produced by `rows` on demand.
    ///
    /// `rows` is invoked once per replay and must yield the same sequence
    /// every time.
    pub fn from_fn<F, I>(split: RangeSplit<K>, rows: F) -> Self
    where
        F: Fn() -> I + Send + Sync + 'static,
        I: Iterator<Item = (K, V)> + Send + 'static,
    {
        Self {
            split,
            source: Arc::new(move || Box::new(rows()) as RowIter<K, V>),
        }
    }

    /// Create a partition backed by an in-memory buffer of rows.
    pub fn from_vec(split: RangeSplit<K>, rows: Vec<(K, V)>) -> Self
    where
        K: Clone + Sync,
        V: Clone + Sync,
    {
        let rows = Arc::new(rows);
        Self::from_fn(split, move || {
            let rows = Arc::clone(&rows);
            (0..rows.len()).map(move |idx| rows[idx].clone())
        })
    }

    fn map_values<W, F>(&self, f: Arc<F>) -> Partition<K, W>
    where
        K: Clone,
        W: Send + 'static,
        F: Fn(V) -> W + Send + Sync + 'static,
    {
        let source = Arc::clone(&self.source);
        Partition {
            split: self.split.clone(),
            source: Arc::new(move || {
                let f = Arc::clone(&f);
                Box::new(source().map(move |(key, value)| (key, f(value)))) as RowIter<K, W>
            }),
        }
    }

    fn filter<F>(&self, pred: Arc<F>) -> Partition<K, V>
    where
        K: Clone,
        F: Fn(&K, &V) -> bool + Send + Sync + 'static,
    {
        let source = Arc::clone(&self.source);
        Partition {
            split: self.split.clone(),
            source: Arc::new(move || {
                let pred = Arc::clone(&pred);
                Box::new(source().filter(move |(key, value)| pred(key, value))) as RowIter<K, V>
            }),
        }
    }
}

impl<K: Clone, V> Clone for Partition<K, V> {
    fn clone(&self) -> Self {
        Self {
            split: self.split.clone(),
            source: Arc::clone(&self.source),
        }
    }
}

impl<K: fmt::Debug, V> fmt::Debug for Partition<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Partition")
            .field("split", &self.split)
            .finish_non_exhaustive()
    }
}

/// Range-partitioned, globally sorted sequence of key/value rows.
pub struct OrderedPartitionedCollection<K, V> {
    partitions: Vec<Partition<K, V>>,
}

impl<K, V> OrderedPartitionedCollection<K, V>
where
    K: Ord + Clone + fmt::Debug + Send + Sync + 'static,
    V: Send + 'static,
{
    /// A collection with no partitions.
    pub fn empty() -> Self {
        Self {
            partitions: Vec::new(),
        }
    }

    /// Build a collection from partitions already in split order.
    ///
    /// Splits are checked for contiguity, and every partition is replayed
    /// once to check that its rows are sorted and inside its split. Rows are
    /// streamed, not stored.
    ///
    /// # Errors
    ///
    /// - `Error::InvalidPartitioning`: gap or overlap between splits, an
    ///   unbounded split that is not last, or a row outside its split or out
    ///   of order
    pub fn from_sorted_partitions(partitions: Vec<Partition<K, V>>) -> Result<Self> {
        validate_splits(&partitions)?;
        for (index, partition) in partitions.iter().enumerate() {
            validate_rows(index, partition)?;
        }
        Ok(Self { partitions })
    }

    /// Build a collection whose rows are correct by construction.
    ///
    /// Only the splits are checked; row bounds and ordering are the caller's
    /// guarantee.
    pub(crate) fn from_trusted_partitions(partitions: Vec<Partition<K, V>>) -> Result<Self> {
        validate_splits(&partitions)?;
        Ok(Self { partitions })
    }

    /// Partition an already sorted buffer into at most `num_partitions`
    /// balanced partitions.
    ///
    /// Boundaries are placed on distinct keys so that equal keys never
    /// straddle two partitions; the partition count shrinks when there are
    /// too few distinct keys. The last split is unbounded.
    ///
    /// # Errors
    ///
    /// - `Error::InvalidPartitioning`: `num_partitions == 0` or `rows` is not
    ///   sorted by key
    pub fn from_sorted_rows(rows: Vec<(K, V)>, num_partitions: usize) -> Result<Self>
    where
        V: Clone + Sync,
    {
        if num_partitions == 0 {
            return Err(Error::InvalidPartitioning(
                "num_partitions must be at least 1".to_string(),
            ));
        }
        if let Some(pos) = rows.windows(2).position(|pair| pair[1].0 < pair[0].0) {
            return Err(Error::InvalidPartitioning(format!(
                "rows out of order at position {}: {:?} after {:?}",
                pos + 1,
                rows[pos + 1].0,
                rows[pos].0
            )));
        }
        if rows.is_empty() {
            return Ok(Self::empty());
        }

        let len = rows.len();
        let per_partition = len.div_ceil(num_partitions);
        let mut ranges = Vec::with_capacity(num_partitions.min(len));
        let mut start = 0;
        while start < len {
            let mut stop = (start + per_partition).min(len);
            while stop < len && rows[stop].0 == rows[stop - 1].0 {
                stop += 1;
            }
            ranges.push(start..stop);
            start = stop;
        }
        if ranges.len() < num_partitions {
            log::debug!(
                "reduced partition count from {} to {} for {} rows",
                num_partitions,
                ranges.len(),
                len
            );
        }

        let rows = Arc::new(rows);
        let mut partitions = Vec::with_capacity(ranges.len());
        for (index, range) in ranges.iter().enumerate() {
            let begin = rows[range.start].0.clone();
            let split = match ranges.get(index + 1) {
                Some(next) => RangeSplit::bounded(begin, rows[next.start].0.clone())?,
                None => RangeSplit::unbounded(begin),
            };
            let rows = Arc::clone(&rows);
            let range = range.clone();
            partitions.push(Partition::from_fn(split, move || {
                let rows = Arc::clone(&rows);
                range.clone().map(move |idx| rows[idx].clone())
            }));
        }
        Self::from_trusted_partitions(partitions)
    }

    pub fn partitions(&self) -> &[Partition<K, V>] {
        &self.partitions
    }

    pub fn splits(&self) -> impl Iterator<Item = &RangeSplit<K>> + '_ {
        self.partitions.iter().map(Partition::split)
    }

    pub fn num_partitions(&self) -> usize {
        self.partitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.partitions.is_empty()
    }

    /// Number of rows; replays every partition.
    pub fn count(&self) -> usize {
        self.partitions.iter().map(|p| p.rows().count()).sum()
    }

    /// Apply `f` to every value, keeping keys, splits and order.
    ///
    /// `f` runs only when a partition's rows are replayed.
    pub fn map_values<W, F>(&self, f: F) -> OrderedPartitionedCollection<K, W>
    where
        W: Send + 'static,
        F: Fn(V) -> W + Send + Sync + 'static,
    {
        let f = Arc::new(f);
        OrderedPartitionedCollection {
            partitions: self
                .partitions
                .iter()
                .map(|p| p.map_values(Arc::clone(&f)))
                .collect(),
        }
    }

    /// Keep only rows matching `pred`; splits are unchanged.
    pub fn filter<F>(&self, pred: F) -> Self
    where
        F: Fn(&K, &V) -> bool + Send + Sync + 'static,
    {
        let pred = Arc::new(pred);
        Self {
            partitions: self
                .partitions
                .iter()
                .map(|p| p.filter(Arc::clone(&pred)))
                .collect(),
        }
    }

    /// Sub-collection of the partitions whose split satisfies `pred`.
    ///
    /// Splits are returned unmodified.
    ///
    /// # Errors
    ///
    /// - `Error::InvalidPartitioning`: the selected partitions leave a gap
    pub fn range_query<P>(&self, mut pred: P) -> Result<Self>
    where
        P: FnMut(&RangeSplit<K>) -> bool,
    {
        let partitions: Vec<_> = self
            .partitions
            .iter()
            .filter(|p| pred(p.split()))
            .cloned()
            .collect();
        validate_splits(&partitions)?;
        Ok(Self { partitions })
    }

    /// Partitions whose split intersects `[begin, end)`.
    pub fn range(&self, begin: &K, end: &K) -> Self {
        Self {
            partitions: self
                .partitions
                .iter()
                .filter(|p| p.split().intersects(begin, end))
                .cloned()
                .collect(),
        }
    }

    /// Index of the partition whose split contains `key`.
    pub fn partition_for_key(&self, key: &K) -> Option<usize> {
        let idx = self.partitions.partition_point(|p| p.split().begin() <= key);
        let candidate = idx.checked_sub(1)?;
        self.partitions[candidate]
            .split()
            .contains(key)
            .then_some(candidate)
    }

    /// Collapse into a single partition spanning every split.
    pub fn coalesce(&self) -> Self {
        let (Some(first), Some(last)) = (self.partitions.first(), self.partitions.last()) else {
            return Self::empty();
        };
        let split = RangeSplit::spanning(first.split(), last.split());
        let parts = Arc::new(self.partitions.clone());
        let partition = Partition::from_fn(split, move || {
            let parts = Arc::clone(&parts);
            (0..parts.len()).flat_map(move |idx| parts[idx].rows())
        });
        Self {
            partitions: vec![partition],
        }
    }

    /// Replay every row in global order.
    ///
    /// Each call starts a new replay.
    pub fn to_global_sequence(&self) -> impl Iterator<Item = (K, V)> + '_ {
        self.partitions.iter().flat_map(Partition::rows)
    }
}

impl<K: Clone, V> Clone for OrderedPartitionedCollection<K, V> {
    fn clone(&self) -> Self {
        Self {
            partitions: self.partitions.clone(),
        }
    }
}

impl<K: fmt::Debug, V> fmt::Debug for OrderedPartitionedCollection<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OrderedPartitionedCollection")
            .field("partitions", &self.partitions)
            .finish()
    }
}

fn validate_splits<K, V>(partitions: &[Partition<K, V>]) -> Result<()>
where
    K: Ord + fmt::Debug,
{
    for (index, pair) in partitions.windows(2).enumerate() {
        let (current, next) = (pair[0].split(), pair[1].split());
        if current.adjacent(next) {
            continue;
        }
        let reason = match current.end() {
            None => "unbounded split is not last",
            Some(end) if next.begin() < end => "splits overlap",
            Some(_) => "gap between splits",
        };
        return Err(Error::InvalidPartitioning(format!(
            "{reason}: partition {index} {current:?}, partition {} {next:?}",
            index + 1
        )));
    }
    Ok(())
}

fn validate_rows<K, V>(index: usize, partition: &Partition<K, V>) -> Result<()>
where
    K: Ord + fmt::Debug + Send + 'static,
    V: Send + 'static,
{
    let split = partition.split();
    let mut previous: Option<K> = None;
    for (key, _) in partition.rows() {
        if !split.contains(&key) {
            return Err(Error::InvalidPartitioning(format!(
                "partition {index}: key {key:?} outside split {split:?}"
            )));
        }
        if let Some(prev) = &previous {
            if key < *prev {
                return Err(Error::InvalidPartitioning(format!(
                    "partition {index}: key {key:?} follows {prev:?}"
                )));
            }
        }
        previous = Some(key);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn split(begin: i64, end: Option<i64>) -> RangeSplit<i64> {
        RangeSplit::new(begin, end).unwrap()
    }

    fn sample() -> OrderedPartitionedCollection<i64, &'static str> {
        OrderedPartitionedCollection::from_sorted_partitions(vec![
            Partition::from_vec(split(0, Some(10)), vec![(0, "a"), (3, "b"), (3, "c")]),
            Partition::from_vec(split(10, Some(20)), vec![]),
            Partition::from_vec(split(20, None), vec![(20, "d"), (99, "e")]),
        ])
        .unwrap()
    }

    #[test]
    fn test_global_sequence_order() {
        let opc = sample();
        let rows: Vec<_> = opc.to_global_sequence().collect();
        assert_eq!(
            rows,
            vec![(0, "a"), (3, "b"), (3, "c"), (20, "d"), (99, "e")]
        );
    }

    #[test]
    fn test_global_sequence_restartable() {
        let opc = sample();
        let first: Vec<_> = opc.to_global_sequence().collect();
        let second: Vec<_> = opc.to_global_sequence().collect();
        assert_eq!(first, second);
        assert_eq!(opc.count(), 5);
    }

    fn split_begin<K: Ord, V>(partition: &Partition<K, V>) -> &K {
        partition.split().begin()
    }

    fn replay_len<K, V>(partition: &Partition<K, V>) -> usize {
        partition.rows().count()
    }

    #[test]
    fn test_accessors_need_no_bounds() {
        let opc = sample();
        let begins: Vec<i64> = opc.partitions().iter().map(|p| *split_begin(p)).collect();
        assert_eq!(begins, vec![0, 10, 20]);
        let lens: Vec<usize> = opc.partitions().iter().map(replay_len).collect();
        assert_eq!(lens, vec![3, 0, 2]);
    }

    #[test]
    fn test_rejects_gap() {
        let result = OrderedPartitionedCollection::<i64, ()>::from_sorted_partitions(vec![
            Partition::from_vec(split(0, Some(10)), vec![]),
            Partition::from_vec(split(11, None), vec![]),
        ]);
        assert!(matches!(result, Err(Error::InvalidPartitioning(_))));
    }

    #[test]
    fn test_rejects_overlap() {
        let result = OrderedPartitionedCollection::<i64, ()>::from_sorted_partitions(vec![
            Partition::from_vec(split(0, Some(10)), vec![]),
            Partition::from_vec(split(5, None), vec![]),
        ]);
        assert!(matches!(result, Err(Error::InvalidPartitioning(_))));
    }

    #[test]
    fn test_rejects_unbounded_before_last() {
        let result = OrderedPartitionedCollection::<i64, ()>::from_sorted_partitions(vec![
            Partition::from_vec(split(0, None), vec![]),
            Partition::from_vec(split(10, None), vec![]),
        ]);
        assert!(matches!(result, Err(Error::InvalidPartitioning(_))));
    }

    #[test]
    fn test_rejects_row_outside_split() {
        let result = OrderedPartitionedCollection::from_sorted_partitions(vec![
            Partition::from_vec(split(0, Some(10)), vec![(10, ())]),
            Partition::from_vec(split(10, None), vec![]),
        ]);
        assert!(matches!(result, Err(Error::InvalidPartitioning(_))));
    }

    #[test]
    fn test_rejects_unsorted_rows() {
        let result = OrderedPartitionedCollection::from_sorted_partitions(vec![
            Partition::from_vec(split(0, None), vec![(5, ()), (4, ())]),
        ]);
        assert!(matches!(result, Err(Error::InvalidPartitioning(_))));
    }

    #[test]
    fn test_map_values_is_lazy() {
        use std::sync::atomic::{AtomicUsize, Ordering};

        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let mapped = sample().map_values(move |v| {
            counter.fetch_add(1, Ordering::SeqCst);
            v.to_uppercase()
        });
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        let values: Vec<_> = mapped.to_global_sequence().map(|(_, v)| v).collect();
        assert_eq!(values, vec!["A", "B", "C", "D", "E"]);
        assert_eq!(calls.load(Ordering::SeqCst), 5);
        assert_eq!(mapped.num_partitions(), 3);
    }

    #[test]
    fn test_filter_keeps_splits() {
        let opc = sample().filter(|key, _| key % 2 == 1);
        let keys: Vec<_> = opc.to_global_sequence().map(|(k, _)| k).collect();
        assert_eq!(keys, vec![3, 3, 99]);
        assert_eq!(opc.num_partitions(), 3);
    }

    #[test]
    fn test_range_query_contiguous() {
        let opc = sample();
        let tail = opc.range_query(|s| *s.begin() >= 10).unwrap();
        assert_eq!(tail.num_partitions(), 2);
        assert_eq!(tail.splits().next(), Some(&split(10, Some(20))));
    }

    #[test]
    fn test_range_query_rejects_gap() {
        let opc = sample();
        let result = opc.range_query(|s| *s.begin() != 10);
        assert!(matches!(result, Err(Error::InvalidPartitioning(_))));
    }

    #[test]
    fn test_range_intersecting() {
        let opc = sample();
        assert_eq!(opc.range(&5, &15).num_partitions(), 2);
        assert_eq!(opc.range(&25, &30).num_partitions(), 1);
        assert_eq!(opc.range(&-5, &0).num_partitions(), 0);
    }

    #[test]
    fn test_partition_for_key() {
        let opc = sample();
        assert_eq!(opc.partition_for_key(&-1), None);
        assert_eq!(opc.partition_for_key(&0), Some(0));
        assert_eq!(opc.partition_for_key(&9), Some(0));
        assert_eq!(opc.partition_for_key(&10), Some(1));
        assert_eq!(opc.partition_for_key(&1_000), Some(2));
    }

    #[test]
    fn test_coalesce() {
        let opc = sample();
        let single = opc.coalesce();
        assert_eq!(single.num_partitions(), 1);
        assert_eq!(single.splits().next(), Some(&split(0, None)));
        assert_eq!(
            single.to_global_sequence().collect::<Vec<_>>(),
            opc.to_global_sequence().collect::<Vec<_>>()
        );
    }

    #[test]
    fn test_from_sorted_rows_balanced() {
        let rows: Vec<_> = (0..10i64).map(|k| (k, k * 10)).collect();
        let opc = OrderedPartitionedCollection::from_sorted_rows(rows, 3).unwrap();
        let splits: Vec<_> = opc.splits().cloned().collect();
        assert_eq!(
            splits,
            vec![split(0, Some(4)), split(4, Some(8)), split(8, None)]
        );
        assert_eq!(opc.count(), 10);
    }

    #[test]
    fn test_from_sorted_rows_keeps_equal_keys_together() {
        let rows = vec![(1, ()), (1, ()), (1, ()), (2, ())];
        let opc = OrderedPartitionedCollection::from_sorted_rows(rows, 4).unwrap();
        assert_eq!(opc.num_partitions(), 2);
        let sizes: Vec<_> = opc.partitions().iter().map(|p| p.rows().count()).collect();
        assert_eq!(sizes, vec![3, 1]);
    }

    #[test]
    fn test_from_sorted_rows_rejects_unsorted() {
        let rows = vec![(2, ()), (1, ())];
        assert!(matches!(
            OrderedPartitionedCollection::from_sorted_rows(rows, 1),
            Err(Error::InvalidPartitioning(_))
        ));
        assert!(matches!(
            OrderedPartitionedCollection::<i64, ()>::from_sorted_rows(vec![], 0),
            Err(Error::InvalidPartitioning(_))
        ));
    }
}
