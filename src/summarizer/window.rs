//! Sliding time windows over subtractable summarizers.
//!
//! A window of `lookback` covers keys `[t - lookback, t]` for the row at `t`.
//! Advancing the window adds the new input and subtracts every input that
//! fell off the trailing edge, so each step costs O(1) amortized no matter
//! how many inputs the window holds.

use std::collections::VecDeque;
use std::fmt;

use super::Subtractable;
use crate::core::clock::Timestamp;
use crate::core::{Error, OrderedPartitionedCollection, Partition, Result};

/// Counters for a window session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WindowStats {
    /// Inputs added.
    pub adds: u64,
    /// Inputs removed through `subtract`.
    pub evictions: u64,
}

/// Push-driven sliding window.
///
/// Keys must arrive in non-decreasing order. Inputs leave the window in the
/// order they entered it.
///
/// # Example
///
/// ```
/// use tsframe::summarizer::builtin::Sum;
/// use tsframe::summarizer::SlidingWindow;
///
/// let mut window = SlidingWindow::new(Sum, 10)?;
/// assert_eq!(window.push(0, 1.0)?, 1.0);
/// assert_eq!(window.push(5, 2.0)?, 3.0);
/// assert_eq!(window.push(12, 4.0)?, 6.0); // key 0 left the window
/// # Ok::<(), tsframe::Error>(())
/// ```
pub struct SlidingWindow<S: Subtractable> {
    summarizer: S,
    lookback: i64,
    entries: VecDeque<(Timestamp, S::Input)>,
    state: S::State,
    last_key: Option<Timestamp>,
    stats: WindowStats,
    failed: Option<&'static str>,
}

impl<S: Subtractable> SlidingWindow<S> {
    /// Create an empty window covering `lookback` key units behind each row.
    ///
    /// # Errors
    ///
    /// - `Error::InvalidRange`: `lookback < 0`
    pub fn new(summarizer: S, lookback: i64) -> Result<Self> {
        check_lookback(lookback)?;
        Ok(Self::with_lookback(summarizer, lookback))
    }

    fn with_lookback(summarizer: S, lookback: i64) -> Self {
        let state = summarizer.zero();
        Self {
            summarizer,
            lookback,
            entries: VecDeque::new(),
            state,
            last_key: None,
            stats: WindowStats::default(),
            failed: None,
        }
    }

    /// Add an input at `key` and evict expired inputs without rendering.
    ///
    /// # Errors
    ///
    /// - `Error::InvalidPartitioning`: `key` is smaller than the previous key
    /// - `Error::SubtractWithoutAdd`: the summarizer rejected an eviction.
    ///   The window state is lost at that point, so this and every later
    ///   call fail.
    pub fn insert(&mut self, key: Timestamp, input: S::Input) -> Result<()> {
        if let Some(reason) = self.failed {
            return Err(Error::SubtractWithoutAdd(reason));
        }
        if let Some(last) = self.last_key {
            if key < last {
                return Err(Error::InvalidPartitioning(format!(
                    "window key {key} precedes previous key {last}"
                )));
            }
        }
        self.last_key = Some(key);

        let state = std::mem::replace(&mut self.state, self.summarizer.zero());
        self.state = self.summarizer.add(state, &input);
        self.entries.push_back((key, input));
        self.stats.adds += 1;

        let lower = key.saturating_sub(self.lookback);
        while self.entries.front().is_some_and(|(k, _)| *k < lower) {
            let Some((_, expired)) = self.entries.pop_front() else {
                break;
            };
            let state = std::mem::replace(&mut self.state, self.summarizer.zero());
            match self.summarizer.subtract(state, &expired) {
                Ok(state) => self.state = state,
                Err(err) => {
                    self.failed = Some(match &err {
                        Error::SubtractWithoutAdd(reason) => *reason,
                        _ => "window state lost on a failed eviction",
                    });
                    return Err(err);
                }
            }
            self.stats.evictions += 1;
        }
        Ok(())
    }

    /// Add an input at `key` and render the window ending there.
    pub fn push(&mut self, key: Timestamp, input: S::Input) -> Result<S::Output> {
        self.insert(key, input)?;
        Ok(self.summarizer.render(&self.state))
    }

    /// Number of inputs currently in the window.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn state(&self) -> &S::State {
        &self.state
    }

    pub fn stats(&self) -> WindowStats {
        self.stats
    }

    /// True once an eviction failed; the window rejects every later input.
    pub fn is_failed(&self) -> bool {
        self.failed.is_some()
    }
}

impl<S> fmt::Debug for SlidingWindow<S>
where
    S: Subtractable + fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SlidingWindow")
            .field("summarizer", &self.summarizer)
            .field("lookback", &self.lookback)
            .field("len", &self.entries.len())
            .field("stats", &self.stats)
            .finish()
    }
}

/// Annotate every row with the summary of its trailing window
/// `[key - lookback, key]`.
///
/// The result keeps the input's splits. Each partition warms its window up
/// from the earliest partition that can reach into its first window, so
/// partitions replay independently of each other.
///
/// # Errors
///
/// - `Error::InvalidRange`: `lookback < 0`
///
/// # Panics
///
/// Replaying a partition panics if the summarizer reports
/// `SubtractWithoutAdd` for an input the window itself added, which means
/// the summarizer broke its own contract.
pub fn summarize_windows<S, V>(
    summarizer: S,
    opc: &OrderedPartitionedCollection<Timestamp, V>,
    lookback: i64,
) -> Result<OrderedPartitionedCollection<Timestamp, (V, S::Output)>>
where
    S: Subtractable<Input = V> + Clone + Send + Sync + 'static,
    S::State: Send,
    S::Output: Send + 'static,
    V: Clone + Send + Sync + 'static,
{
    check_lookback(lookback)?;

    let all = opc.partitions();
    let mut partitions = Vec::with_capacity(all.len());
    for (index, partition) in all.iter().enumerate() {
        let begin = *partition.split().begin();
        let warm_begin = begin.saturating_sub(lookback);
        let first = opc.partition_for_key(&warm_begin).unwrap_or(0).min(index);
        let warmup: Vec<Partition<Timestamp, V>> = all[first..index].to_vec();
        log::trace!(
            "window partition {} warms up from {} partitions back",
            index,
            warmup.len()
        );

        let source = partition.clone();
        let summarizer = summarizer.clone();
        partitions.push(Partition::from_fn(partition.split().clone(), move || {
            let mut window = SlidingWindow::with_lookback(summarizer.clone(), lookback);
            for earlier in &warmup {
                for (key, value) in earlier.rows() {
                    if key >= warm_begin && key < begin {
                        window
                            .insert(key, value)
                            .unwrap_or_else(|err| contract_violation(err));
                    }
                }
            }
            source.rows().map(move |(key, value)| {
                let output = window
                    .push(key, value.clone())
                    .unwrap_or_else(|err| contract_violation(err));
                (key, (value, output))
            })
        }));
    }
    OrderedPartitionedCollection::from_trusted_partitions(partitions)
}

fn check_lookback(lookback: i64) -> Result<()> {
    if lookback < 0 {
        return Err(Error::InvalidRange {
            begin: 0,
            end: lookback,
        });
    }
    Ok(())
}

fn contract_violation(err: Error) -> ! {
    panic!("sliding window summarizer broke its subtract contract: {err}")
}
