//! Ordered, range-partitioned collections and the clocks that build them.

pub mod clock;
pub mod collection;
pub mod error;
pub mod split;

pub use clock::{generate, ClockLayout, ClockSpec, Timestamp};
pub use collection::{OrderedPartitionedCollection, Partition, RowIter};
pub use error::{Error, Result};
pub use split::RangeSplit;
