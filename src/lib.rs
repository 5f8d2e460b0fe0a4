//! Ordered, range-partitioned time-series collections and a composable
//! summarizer algebra.
//!
//! - [`core`]: range splits, the ordered partitioned collection, and the
//!   uniform clock generator.
//! - [`summarizer`]: the `Summarizer` / `Combinable` / `Subtractable`
//!   capability traits, reference summarizers, partition-parallel reduction
//!   and sliding windows.
//! - [`config`]: serializable clock parameters (feature `config`).

pub mod core;
pub mod summarizer;

#[cfg(feature = "config")]
pub mod config;

pub use crate::core::{
    ClockSpec, Error, OrderedPartitionedCollection, Partition, RangeSplit, Result, Timestamp,
};
pub use crate::summarizer::{Combinable, RowAdapter, Subtractable, Summarizer};
