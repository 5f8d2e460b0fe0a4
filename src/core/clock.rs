//! Synthetic clock generation.
//!
//! A clock is an evenly spaced sequence of timestamps over `[begin, end]`,
//! starting at `begin + (offset mod frequency)`. [`ClockSpec::generate`] lays
//! the ticks out as an [`OrderedPartitionedCollection`] whose splits are
//! aligned to the tick grid.
//!
//! # Partition layout
//!
//! With `n` ticks and a target of `p` partitions every partition holds
//! `n / p` ticks and the first `n % p` partitions hold one more. When there
//! are fewer ticks than requested partitions the partition count is reduced
//! to `n`, so no split is ever empty, inverted or zero-width. The last split is unbounded in key space but
//! its ticks stop at `end` (inclusive).
//!
//! Every partition computes its own first tick from its split, so partitions
//! can be replayed independently, in any order, without materializing the
//! global tick sequence.
//!
//! # Example
//!
//! ```
//! use tsframe::core::clock::ClockSpec;
//!
//! let clock = ClockSpec::new(0, 10, 3).with_partitions(2).generate()?;
//! let ticks: Vec<i64> = clock.to_global_sequence().map(|(t, _)| t).collect();
//! assert_eq!(ticks, vec![0, 3, 6, 9]);
//! assert_eq!(clock.num_partitions(), 2);
//! # Ok::<(), tsframe::Error>(())
//! ```

use crate::core::collection::{OrderedPartitionedCollection, Partition};
use crate::core::split::RangeSplit;
use crate::core::{Error, Result};

/// Nanoseconds since the UNIX epoch.
pub type Timestamp = i64;

/// Parameters of a uniform clock.
///
/// Units are whatever the caller uses for timestamps, nanoseconds by
/// convention.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClockSpec {
    pub begin: Timestamp,
    pub end: Timestamp,
    pub frequency: i64,
    pub offset: i64,
    pub num_partitions: usize,
}

impl ClockSpec {
    /// Clock with zero offset and a single partition.
    pub fn new(begin: Timestamp, end: Timestamp, frequency: i64) -> Self {
        Self {
            begin,
            end,
            frequency,
            offset: 0,
            num_partitions: 1,
        }
    }

    pub fn with_offset(mut self, offset: i64) -> Self {
        self.offset = offset;
        self
    }

    pub fn with_partitions(mut self, num_partitions: usize) -> Self {
        self.num_partitions = num_partitions;
        self
    }

    /// First tick: `begin + (offset mod frequency)`.
    ///
    /// A non-negative offset that already reaches past `end` leaves the
    /// clock empty, even when its phase would land inside the range.
    ///
    /// # Errors
    ///
    /// - `Error::InvalidRange`: `end < begin`
    /// - `Error::InvalidFrequency`: `frequency <= 0`
    /// - `Error::EmptyClock`: `begin + offset` or the first tick falls after
    ///   `end`
    pub fn first_tick(&self) -> Result<Timestamp> {
        if self.end < self.begin {
            return Err(Error::InvalidRange {
                begin: self.begin,
                end: self.end,
            });
        }
        if self.frequency <= 0 {
            return Err(Error::InvalidFrequency(self.frequency));
        }
        let shifted = i128::from(self.begin) + i128::from(self.offset.max(0));
        if shifted > i128::from(self.end) {
            return Err(Error::EmptyClock {
                first_tick: Timestamp::try_from(shifted).unwrap_or(Timestamp::MAX),
                end: self.end,
            });
        }
        let first_tick = self
            .begin
            .checked_add(self.offset.rem_euclid(self.frequency))
            .ok_or(Error::EmptyClock {
                first_tick: Timestamp::MAX,
                end: self.end,
            })?;
        if first_tick > self.end {
            return Err(Error::EmptyClock {
                first_tick,
                end: self.end,
            });
        }
        Ok(first_tick)
    }

    /// Compute the partition boundaries without producing any tick.
    ///
    /// # Errors
    ///
    /// Everything [`ClockSpec::first_tick`] reports, plus
    /// `Error::InvalidPartitioning` when `num_partitions == 0`.
    pub fn layout(&self) -> Result<ClockLayout> {
        let first_tick = self.first_tick()?;
        if self.num_partitions == 0 {
            return Err(Error::InvalidPartitioning(
                "num_partitions must be at least 1".to_string(),
            ));
        }

        let frequency = i128::from(self.frequency);
        let span = i128::from(self.end) - i128::from(first_tick);
        let num_ticks = span / frequency + 1;
        let requested = self.num_partitions as i128;
        let effective = requested.min(num_ticks);
        // The first `remainder` partitions take one extra tick.
        let base = num_ticks / effective;
        let remainder = num_ticks % effective;
        let ticks_per_partition = base + i128::from(remainder > 0);

        // Every boundary is a tick at or before `end`, so it fits in i64.
        let boundaries: Vec<Timestamp> = (0..effective)
            .map(|idx| {
                let tick_index = idx * base + idx.min(remainder);
                (i128::from(first_tick) + tick_index * frequency) as Timestamp
            })
            .collect();

        if effective < requested {
            log::warn!(
                "clock over [{}, {}] has {} ticks; using {} partitions instead of {}",
                first_tick,
                self.end,
                num_ticks,
                effective,
                self.num_partitions
            );
        }
        log::debug!(
            "clock layout: first_tick={} ticks={} ticks_per_partition={} partitions={}",
            first_tick,
            num_ticks,
            ticks_per_partition,
            boundaries.len()
        );

        Ok(ClockLayout {
            first_tick,
            end: self.end,
            frequency: self.frequency,
            num_ticks: num_ticks as u128,
            ticks_per_partition: ticks_per_partition as u128,
            boundaries,
        })
    }

    /// Generate the clock as an ordered partitioned collection.
    ///
    /// Keys and values are both the tick timestamp.
    pub fn generate(&self) -> Result<OrderedPartitionedCollection<Timestamp, Timestamp>> {
        self.layout()?.into_collection()
    }
}

/// Generate a uniform clock; see [`ClockSpec::generate`].
pub fn generate(
    begin: Timestamp,
    end: Timestamp,
    frequency: i64,
    offset: i64,
    num_partitions: usize,
) -> Result<OrderedPartitionedCollection<Timestamp, Timestamp>> {
    ClockSpec {
        begin,
        end,
        frequency,
        offset,
        num_partitions,
    }
    .generate()
}

/// Partition boundaries of a validated clock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClockLayout {
    first_tick: Timestamp,
    end: Timestamp,
    frequency: i64,
    num_ticks: u128,
    ticks_per_partition: u128,
    boundaries: Vec<Timestamp>,
}

impl ClockLayout {
    pub fn first_tick(&self) -> Timestamp {
        self.first_tick
    }

    /// Last tick at or before `end`.
    pub fn last_tick(&self) -> Timestamp {
        // Bounded by `end`.
        (i128::from(self.first_tick) + (self.num_ticks as i128 - 1) * i128::from(self.frequency))
            as Timestamp
    }

    pub fn num_ticks(&self) -> u128 {
        self.num_ticks
    }

    /// Ticks in the largest partition.
    pub fn ticks_per_partition(&self) -> u128 {
        self.ticks_per_partition
    }

    /// Inclusive lower bound of every partition, in order.
    pub fn boundaries(&self) -> &[Timestamp] {
        &self.boundaries
    }

    pub fn num_partitions(&self) -> usize {
        self.boundaries.len()
    }

    fn into_collection(self) -> Result<OrderedPartitionedCollection<Timestamp, Timestamp>> {
        let mut partitions = Vec::with_capacity(self.boundaries.len());
        for (idx, &start) in self.boundaries.iter().enumerate() {
            let (split, stop) = match self.boundaries.get(idx + 1) {
                Some(&next) => (RangeSplit::bounded(start, next)?, next - 1),
                None => (RangeSplit::unbounded(start), self.end),
            };
            let frequency = self.frequency;
            partitions.push(Partition::from_fn(split, move || {
                ticks(start, stop, frequency).map(|tick| (tick, tick))
            }));
        }
        OrderedPartitionedCollection::from_trusted_partitions(partitions)
    }
}

/// Ticks `start, start + frequency, ...` up to and including `stop`.
fn ticks(start: Timestamp, stop: Timestamp, frequency: i64) -> impl Iterator<Item = Timestamp> {
    std::iter::successors(Some(start), move |tick| tick.checked_add(frequency))
        .take_while(move |tick| *tick <= stop)
}
