//! Summarizer algebra.
//!
//! A summarizer folds inputs into an opaque state and renders the state into
//! an output. Capabilities come in three tiers, each a separate trait so a
//! summarizer only implements what it can honour:
//!
//! - [`Summarizer`]: `zero`, `add`, `render`. Single-pass aggregation.
//! - [`Combinable`]: adds `merge`. States form a monoid with `zero` as the
//!   identity, so partitions can be summarized independently and reduced.
//! - [`Subtractable`]: adds `subtract`, the inverse of `add` for an input
//!   currently reflected in the state. Sliding windows use it to drop the
//!   oldest input in O(1) instead of re-adding the whole window.
//!
//! States are exclusively owned by whoever drives the aggregation; `add`,
//! `merge` and `subtract` take a state by value and return the next one.
//! `merge` is the only way two states are combined.
//!
//! # Example
//!
//! ```
//! use tsframe::summarizer::builtin::Count;
//! use tsframe::summarizer::{Subtractable, Summarizer};
//!
//! let count = Count::<i64>::new();
//! let state = [5, 7, 2].iter().fold(count.zero(), |s, x| count.add(s, x));
//! assert_eq!(count.render(&state), 3);
//!
//! let state = count.subtract(state, &5)?;
//! assert_eq!(count.render(&state), 2);
//! # Ok::<(), tsframe::Error>(())
//! ```

pub mod builtin;
pub mod engine;
pub mod window;

use crate::core::Result;

/// Base tier: single-pass aggregation.
pub trait Summarizer {
    type Input;
    type State;
    type Output;

    /// Empty state.
    fn zero(&self) -> Self::State;

    /// Fold one input into `state`.
    fn add(&self, state: Self::State, input: &Self::Input) -> Self::State;

    fn render(&self, state: &Self::State) -> Self::Output;
}

/// Summarizers whose states form a monoid under `merge`.
///
/// Implementations must satisfy, for all reachable states:
///
/// - `merge(merge(a, b), c) == merge(a, merge(b, c))`
/// - `merge(zero(), a) == a == merge(a, zero())`
pub trait Combinable: Summarizer {
    /// Combine two partial states; `a` covers inputs that precede `b`'s.
    fn merge(&self, a: Self::State, b: Self::State) -> Self::State;
}

/// Summarizers that can remove a previously added input.
///
/// For any state reached by adding a multiset `M`, subtracting a member of
/// `M` yields the state for `M` without that member, whatever the order of
/// earlier adds and subtracts.
pub trait Subtractable: Combinable {
    /// Remove `input` from `state`.
    ///
    /// # Errors
    ///
    /// - `Error::SubtractWithoutAdd`: the summarizer detected that `input` is
    ///   not reflected in `state`. This is a caller bug; the returned error
    ///   carries no recoverable state.
    fn subtract(&self, state: Self::State, input: &Self::Input) -> Result<Self::State>;
}

/// Maps host rows into summarizer inputs and outputs back into host rows.
///
/// Both functions are total over well-formed rows.
pub trait RowAdapter<R>: Summarizer {
    type OutputRow;

    fn to_internal(&self, row: &R) -> Self::Input;

    fn from_output(&self, output: Self::Output) -> Self::OutputRow;
}

pub use builtin::{Column, Count, Max, Mean, NamedValue, Sum};
pub use engine::{
    add_summary_column, summarize, summarize_base, summarize_parallel, summarize_partition,
    summarize_rows,
};
pub use window::{summarize_windows, SlidingWindow, WindowStats};
