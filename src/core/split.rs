//! Key-range descriptors for partitions.
//!
//! A [`RangeSplit`] is the half-open interval `[begin, end)` of keys owned by
//! one partition. An absent `end` means the split extends to `+inf`, which is
//! only legal for the last partition of a collection.

use std::fmt;

use crate::core::{Error, Result};

/// Half-open key range `[begin, end)` owned by one partition.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RangeSplit<K> {
    begin: K,
    end: Option<K>,
}

impl<K: Ord> RangeSplit<K> {
    /// Create a split, rejecting inverted or zero-width bounds.
    ///
    /// # Errors
    ///
    /// - `Error::InvalidPartitioning`: `end` is present and `end <= begin`
    pub fn new(begin: K, end: Option<K>) -> Result<Self>
    where
        K: fmt::Debug,
    {
        if let Some(end) = &end {
            if *end <= begin {
                return Err(Error::InvalidPartitioning(format!(
                    "split end {end:?} must be greater than begin {begin:?}"
                )));
            }
        }
        Ok(Self { begin, end })
    }

    /// Create a split bounded on both sides.
    pub fn bounded(begin: K, end: K) -> Result<Self>
    where
        K: fmt::Debug,
    {
        Self::new(begin, Some(end))
    }

    /// Create a split extending to `+inf`.
    pub fn unbounded(begin: K) -> Self {
        Self { begin, end: None }
    }

    /// Inclusive lower bound.
    pub fn begin(&self) -> &K {
        &self.begin
    }

    /// Exclusive upper bound, `None` when unbounded.
    pub fn end(&self) -> Option<&K> {
        self.end.as_ref()
    }

    /// Split running from `first.begin` to `last.end`.
    ///
    /// Callers guarantee `first` precedes or equals `last` in a contiguous run.
    pub(crate) fn spanning(first: &RangeSplit<K>, last: &RangeSplit<K>) -> Self
    where
        K: Clone,
    {
        Self {
            begin: first.begin.clone(),
            end: last.end.clone(),
        }
    }

    pub fn is_unbounded(&self) -> bool {
        self.end.is_none()
    }

    /// `key >= begin && (end is absent || key < end)`.
    pub fn contains(&self, key: &K) -> bool {
        *key >= self.begin && self.end.as_ref().map_or(true, |end| key < end)
    }

    /// True when `next` starts exactly where this split ends.
    pub fn adjacent(&self, next: &RangeSplit<K>) -> bool {
        self.end.as_ref() == Some(&next.begin)
    }

    /// True when this split shares at least one key with `[lo, hi)`.
    pub fn intersects(&self, lo: &K, hi: &K) -> bool {
        if hi <= lo {
            return false;
        }
        let starts_before_hi = self.begin < *hi;
        let ends_after_lo = self.end.as_ref().map_or(true, |end| end > lo);
        starts_before_hi && ends_after_lo
    }
}

impl<K: fmt::Display> fmt::Display for RangeSplit<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.end {
            Some(end) => write!(f, "[{}, {})", self.begin, end),
            None => write!(f, "[{}, +inf)", self.begin),
        }
    }
}
