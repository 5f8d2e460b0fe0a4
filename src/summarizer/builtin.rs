//! Reference leaf summarizers.

use std::fmt;
use std::marker::PhantomData;

use super::{Combinable, RowAdapter, Subtractable, Summarizer};
use crate::core::{Error, Result};

/// Number of inputs.
pub struct Count<T> {
    _input: PhantomData<fn(&T)>,
}

impl<T> Count<T> {
    pub fn new() -> Self {
        Self {
            _input: PhantomData,
        }
    }
}

impl<T> Default for Count<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for Count<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Count<T> {}

impl<T> fmt::Debug for Count<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Count")
    }
}

impl<T> Summarizer for Count<T> {
    type Input = T;
    type State = u64;
    type Output = u64;

    fn zero(&self) -> u64 {
        0
    }

    fn add(&self, state: u64, _input: &T) -> u64 {
        state + 1
    }

    fn render(&self, state: &u64) -> u64 {
        *state
    }
}

impl<T> Combinable for Count<T> {
    fn merge(&self, a: u64, b: u64) -> u64 {
        a + b
    }
}

impl<T> Subtractable for Count<T> {
    fn subtract(&self, state: u64, _input: &T) -> Result<u64> {
        state
            .checked_sub(1)
            .ok_or(Error::SubtractWithoutAdd("count is already zero"))
    }
}

/// Compensated (Neumaier) running sum.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SumState {
    sum: f64,
    compensation: f64,
}

impl SumState {
    fn add(self, value: f64) -> Self {
        let sum = self.sum + value;
        let lost = if self.sum.abs() >= value.abs() {
            (self.sum - sum) + value
        } else {
            (value - sum) + self.sum
        };
        Self {
            sum,
            compensation: self.compensation + lost,
        }
    }

    fn merge(self, other: SumState) -> Self {
        let mut merged = self.add(other.sum);
        merged.compensation += other.compensation;
        merged
    }

    pub fn value(&self) -> f64 {
        self.sum + self.compensation
    }
}

/// Sum of `f64` inputs.
///
/// `subtract` inverts `add` on the rendered value. The state itself may come
/// back with the running error moved between `sum` and `compensation`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Sum;

impl Summarizer for Sum {
    type Input = f64;
    type State = SumState;
    type Output = f64;

    fn zero(&self) -> SumState {
        SumState::default()
    }

    fn add(&self, state: SumState, input: &f64) -> SumState {
        state.add(*input)
    }

    fn render(&self, state: &SumState) -> f64 {
        state.value()
    }
}

impl Combinable for Sum {
    fn merge(&self, a: SumState, b: SumState) -> SumState {
        a.merge(b)
    }
}

impl Subtractable for Sum {
    fn subtract(&self, state: SumState, input: &f64) -> Result<SumState> {
        Ok(state.add(-*input))
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MeanState {
    count: u64,
    sum: SumState,
}

impl MeanState {
    pub fn count(&self) -> u64 {
        self.count
    }
}

/// Arithmetic mean of `f64` inputs; renders `None` when empty.
///
/// Like [`Sum`], `subtract` inverts `add` on the rendered value.
#[derive(Debug, Clone, Copy, Default)]
pub struct Mean;

impl Summarizer for Mean {
    type Input = f64;
    type State = MeanState;
    type Output = Option<f64>;

    fn zero(&self) -> MeanState {
        MeanState::default()
    }

    fn add(&self, state: MeanState, input: &f64) -> MeanState {
        MeanState {
            count: state.count + 1,
            sum: state.sum.add(*input),
        }
    }

    fn render(&self, state: &MeanState) -> Option<f64> {
        (state.count > 0).then(|| state.sum.value() / state.count as f64)
    }
}

impl Combinable for Mean {
    fn merge(&self, a: MeanState, b: MeanState) -> MeanState {
        MeanState {
            count: a.count + b.count,
            sum: a.sum.merge(b.sum),
        }
    }
}

impl Subtractable for Mean {
    fn subtract(&self, state: MeanState, input: &f64) -> Result<MeanState> {
        let count = state
            .count
            .checked_sub(1)
            .ok_or(Error::SubtractWithoutAdd("mean has no inputs"))?;
        Ok(MeanState {
            count,
            sum: state.sum.add(-*input),
        })
    }
}

/// Largest input. Combinable but not subtractable: removing the maximum
/// would need every other input.
pub struct Max<T> {
    _input: PhantomData<fn(&T)>,
}

impl<T> Max<T> {
    pub fn new() -> Self {
        Self {
            _input: PhantomData,
        }
    }
}

impl<T> Default for Max<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for Max<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Max<T> {}

impl<T> fmt::Debug for Max<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Max")
    }
}

impl<T: PartialOrd + Clone> Summarizer for Max<T> {
    type Input = T;
    type State = Option<T>;
    type Output = Option<T>;

    fn zero(&self) -> Option<T> {
        None
    }

    fn add(&self, state: Option<T>, input: &T) -> Option<T> {
        match state {
            Some(current) if current >= *input => Some(current),
            _ => Some(input.clone()),
        }
    }

    fn render(&self, state: &Option<T>) -> Option<T> {
        state.clone()
    }
}

impl<T: PartialOrd + Clone> Combinable for Max<T> {
    fn merge(&self, a: Option<T>, b: Option<T>) -> Option<T> {
        match (a, b) {
            (Some(a), Some(b)) => Some(if b > a { b } else { a }),
            (a, None) => a,
            (None, b) => b,
        }
    }
}

/// A summary value tagged with its output column.
#[derive(Debug, Clone, PartialEq)]
pub struct NamedValue<V> {
    pub column: String,
    pub value: V,
}

/// Runs a summarizer over one field of a host row.
///
/// `extract` maps a row to the summarizer's input; the rendered output is
/// returned as a [`NamedValue`] under `column`. The algebra is delegated to
/// the inner summarizer, so a `Column` has exactly its capabilities.
#[derive(Clone)]
pub struct Column<S, F> {
    column: String,
    summarizer: S,
    extract: F,
}

impl<S, F> Column<S, F> {
    pub fn new(column: impl Into<String>, summarizer: S, extract: F) -> Self {
        Self {
            column: column.into(),
            summarizer,
            extract,
        }
    }

    pub fn name(&self) -> &str {
        &self.column
    }
}

impl<S: fmt::Debug, F> fmt::Debug for Column<S, F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Column")
            .field("column", &self.column)
            .field("summarizer", &self.summarizer)
            .finish_non_exhaustive()
    }
}

impl<S: Summarizer, F> Summarizer for Column<S, F> {
    type Input = S::Input;
    type State = S::State;
    type Output = S::Output;

    fn zero(&self) -> S::State {
        self.summarizer.zero()
    }

    fn add(&self, state: S::State, input: &S::Input) -> S::State {
        self.summarizer.add(state, input)
    }

    fn render(&self, state: &S::State) -> S::Output {
        self.summarizer.render(state)
    }
}

impl<S: Combinable, F> Combinable for Column<S, F> {
    fn merge(&self, a: S::State, b: S::State) -> S::State {
        self.summarizer.merge(a, b)
    }
}

impl<S: Subtractable, F> Subtractable for Column<S, F> {
    fn subtract(&self, state: S::State, input: &S::Input) -> Result<S::State> {
        self.summarizer.subtract(state, input)
    }
}

impl<R, S, F> RowAdapter<R> for Column<S, F>
where
    S: Summarizer,
    F: Fn(&R) -> S::Input,
{
    type OutputRow = NamedValue<S::Output>;

    fn to_internal(&self, row: &R) -> S::Input {
        (self.extract)(row)
    }

    fn from_output(&self, output: S::Output) -> NamedValue<S::Output> {
        NamedValue {
            column: self.column.clone(),
            value: output,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fold<S: Summarizer>(s: &S, inputs: &[S::Input]) -> S::State {
        inputs.iter().fold(s.zero(), |state, x| s.add(state, x))
    }

    #[test]
    fn test_count_add_subtract() {
        let count = Count::new();
        let state = fold(&count, &[5, 7, 2]);
        assert_eq!(count.render(&state), 3);
        let state = count.subtract(state, &5).unwrap();
        assert_eq!(count.render(&state), 2);
    }

    #[test]
    fn test_count_subtract_from_zero() {
        let count = Count::<i32>::new();
        assert!(matches!(
            count.subtract(count.zero(), &1),
            Err(Error::SubtractWithoutAdd(_))
        ));
    }

    #[test]
    fn test_sum_is_compensated() {
        let sum = Sum;
        let state = fold(&sum, &[1e16, 1.0, -1e16]);
        assert_eq!(sum.render(&state), 1.0);
    }

    #[test]
    fn test_sum_subtract_inverts_add() {
        let sum = Sum;
        let base = fold(&sum, &[3.0, 4.0]);
        let state = sum.subtract(sum.add(base, &10.0), &10.0).unwrap();
        assert_eq!(state, base);
    }

    #[test]
    fn test_sum_subtract_restores_rendered_value() {
        let sum = Sum;
        let base = fold(&sum, &[0.1]);
        let state = sum.subtract(sum.add(base, &1e20), &1e20).unwrap();
        assert_ne!(state, base);
        assert_eq!(sum.render(&state), sum.render(&base));
    }

    #[test]
    fn test_mean() {
        let mean = Mean;
        assert_eq!(mean.render(&mean.zero()), None);
        let state = fold(&mean, &[2.0, 4.0, 9.0]);
        assert_eq!(mean.render(&state), Some(5.0));
        let state = mean.subtract(state, &9.0).unwrap();
        assert_eq!(mean.render(&state), Some(3.0));
        assert_eq!(state.count(), 2);
    }

    #[test]
    fn test_mean_subtract_from_empty() {
        let mean = Mean;
        assert!(matches!(
            mean.subtract(mean.zero(), &1.0),
            Err(Error::SubtractWithoutAdd(_))
        ));
    }

    #[test]
    fn test_max_merge_identity() {
        let max = Max::new();
        let a = fold(&max, &[3, 9, 4]);
        assert_eq!(max.render(&a), Some(9));
        assert_eq!(max.merge(max.zero(), a), Some(9));
        assert_eq!(max.merge(a, max.zero()), Some(9));
        assert_eq!(max.merge(Some(2), Some(11)), Some(11));
    }

    #[test]
    fn test_column_adapter() {
        let column = Column::new("avg_price", Mean, |row: &(i64, f64)| row.1);
        let rows = [(1, 10.0), (2, 20.0)];
        let state = rows
            .iter()
            .fold(column.zero(), |s, row| column.add(s, &column.to_internal(row)));
        let out = RowAdapter::<(i64, f64)>::from_output(&column, column.render(&state));
        assert_eq!(
            out,
            NamedValue {
                column: "avg_price".to_string(),
                value: Some(15.0),
            }
        );
        assert_eq!(column.name(), "avg_price");
    }
}
