//! Drivers that apply summarizers to ordered partitioned collections.
//!
//! These are the host-side reduction steps: an add-loop per partition in row
//! order, then a `merge` reduction across partitions. [`summarize_parallel`]
//! runs the add-loops on scoped worker threads.

use std::fmt;
use std::sync::{mpsc, Arc};
use std::thread;
use std::time::Instant;

use super::{Combinable, RowAdapter, Summarizer};
use crate::core::{Error, OrderedPartitionedCollection, Partition, Result};

/// Fold one partition's rows into a fresh state, in row order.
pub fn summarize_partition<S, K, V>(summarizer: &S, partition: &Partition<K, V>) -> S::State
where
    S: Summarizer<Input = V>,
    K: Send + 'static,
    V: Send + 'static,
{
    partition
        .rows()
        .fold(summarizer.zero(), |state, (_, value)| summarizer.add(state, &value))
}

/// Single pass over the global sequence; needs only the base tier.
pub fn summarize_base<S, K, V>(summarizer: &S, opc: &OrderedPartitionedCollection<K, V>) -> S::Output
where
    S: Summarizer<Input = V>,
    K: Ord + Clone + fmt::Debug + Send + Sync + 'static,
    V: Send + 'static,
{
    let state = opc
        .to_global_sequence()
        .fold(summarizer.zero(), |state, (_, value)| summarizer.add(state, &value));
    summarizer.render(&state)
}

/// Summarize each partition independently, then merge the partial states.
pub fn summarize<S, K, V>(summarizer: &S, opc: &OrderedPartitionedCollection<K, V>) -> S::Output
where
    S: Combinable<Input = V>,
    K: Ord + Clone + fmt::Debug + Send + Sync + 'static,
    V: Send + 'static,
{
    let state = opc
        .partitions()
        .iter()
        .map(|partition| summarize_partition(summarizer, partition))
        .fold(summarizer.zero(), |acc, state| summarizer.merge(acc, state));
    summarizer.render(&state)
}

/// Summarize partitions on up to `workers` threads and merge the results.
///
/// `workers == 0` uses the available parallelism. Partitions are dealt to
/// workers round-robin. Partial states are reduced pairwise in partition
/// order, so only associativity is relied upon.
///
/// # Errors
///
/// - `Error::Io`: a worker thread could not be spawned
/// - `Error::WorkerPanicked`: a worker panicked; no partial result is returned
pub fn summarize_parallel<S, K, V>(
    summarizer: &S,
    opc: &OrderedPartitionedCollection<K, V>,
    workers: usize,
) -> Result<S::Output>
where
    S: Combinable<Input = V> + Sync,
    S::State: Send,
    K: Ord + Clone + fmt::Debug + Send + Sync + 'static,
    V: Send + 'static,
{
    let partitions = opc.partitions();
    if partitions.is_empty() {
        return Ok(summarizer.render(&summarizer.zero()));
    }
    let requested = if workers == 0 {
        thread::available_parallelism().map_or(1, |n| n.get())
    } else {
        workers
    };
    let workers = requested.min(partitions.len());

    let start = Instant::now();
    let (tx, rx) = mpsc::channel::<(usize, S::State)>();
    let slots = thread::scope(|scope| -> Result<Vec<Option<S::State>>> {
        let mut handles = Vec::with_capacity(workers);
        for worker_id in 0..workers {
            let tx = tx.clone();
            let handle = thread::Builder::new()
                .name(format!("summarize-worker-{worker_id}"))
                .spawn_scoped(scope, move || {
                    for index in (worker_id..partitions.len()).step_by(workers) {
                        let state = summarize_partition(summarizer, &partitions[index]);
                        log::trace!("worker {} finished partition {}", worker_id, index);
                        if tx.send((index, state)).is_err() {
                            break;
                        }
                    }
                })?;
            handles.push(handle);
        }
        drop(tx);

        let mut slots: Vec<Option<S::State>> = partitions.iter().map(|_| None).collect();
        for (index, state) in rx {
            slots[index] = Some(state);
        }

        let mut panicked = None;
        for (worker_id, handle) in handles.into_iter().enumerate() {
            if handle.join().is_err() && panicked.is_none() {
                panicked = Some(worker_id);
            }
        }
        match panicked {
            Some(worker_id) => Err(Error::WorkerPanicked(worker_id)),
            None => Ok(slots),
        }
    })?;

    let states = slots
        .into_iter()
        .enumerate()
        .map(|(index, slot)| {
            slot.ok_or_else(|| {
                Error::InvalidPartitioning(format!("partition {index} produced no state"))
            })
        })
        .collect::<Result<Vec<_>>>()?;
    let state = merge_pairwise(summarizer, states);

    log::info!(
        "summarized {} partitions on {} workers in {:?}",
        partitions.len(),
        workers,
        start.elapsed()
    );
    Ok(summarizer.render(&state))
}

/// Apply a row adapter: map every row to an input, summarize, and convert
/// the rendered output back into a row.
pub fn summarize_rows<A, K, R>(adapter: &A, opc: &OrderedPartitionedCollection<K, R>) -> A::OutputRow
where
    A: RowAdapter<R> + Combinable,
    K: Ord + Clone + fmt::Debug + Send + Sync + 'static,
    R: Send + 'static,
{
    let state = opc
        .partitions()
        .iter()
        .map(|partition| {
            partition.rows().fold(adapter.zero(), |state, (_, row)| {
                adapter.add(state, &adapter.to_internal(&row))
            })
        })
        .fold(adapter.zero(), |acc, state| adapter.merge(acc, state));
    adapter.from_output(adapter.render(&state))
}

/// Annotate every row with the running summary of all rows up to and
/// including it.
///
/// Each partition's starting state (the merge of every earlier partition)
/// is computed up front with one replay; the running summaries themselves
/// are produced lazily, and each partition can be replayed on its own.
pub fn add_summary_column<S, K, V>(
    summarizer: S,
    opc: &OrderedPartitionedCollection<K, V>,
) -> Result<OrderedPartitionedCollection<K, (V, S::Output)>>
where
    S: Combinable<Input = V> + Send + Sync + 'static,
    S::State: Clone + Send + Sync + 'static,
    S::Output: Send + 'static,
    K: Ord + Clone + fmt::Debug + Send + Sync + 'static,
    V: Send + 'static,
{
    let summarizer = Arc::new(summarizer);
    let mut prefix = summarizer.zero();
    let mut partitions = Vec::with_capacity(opc.num_partitions());
    for partition in opc.partitions() {
        let start = prefix.clone();
        prefix = summarizer.merge(prefix, summarize_partition(summarizer.as_ref(), partition));

        let summarizer = Arc::clone(&summarizer);
        let source = partition.clone();
        partitions.push(Partition::from_fn(partition.split().clone(), move || {
            let summarizer = Arc::clone(&summarizer);
            source.rows().scan(start.clone(), move |state, (key, value)| {
                let current = std::mem::replace(state, summarizer.zero());
                *state = summarizer.add(current, &value);
                let output = summarizer.render(state);
                Some((key, (value, output)))
            })
        }));
    }
    OrderedPartitionedCollection::from_trusted_partitions(partitions)
}

/// Reduce states pairwise, keeping their relative order.
fn merge_pairwise<S: Combinable>(summarizer: &S, mut states: Vec<S::State>) -> S::State {
    while states.len() > 1 {
        let mut next = Vec::with_capacity(states.len().div_ceil(2));
        let mut iter = states.into_iter();
        while let Some(left) = iter.next() {
            match iter.next() {
                Some(right) => next.push(summarizer.merge(left, right)),
                None => next.push(left),
            }
        }
        states = next;
    }
    states.pop().unwrap_or_else(|| summarizer.zero())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::summarizer::builtin::{Count, Max, Sum};

    fn numbers(num_partitions: usize) -> OrderedPartitionedCollection<i64, f64> {
        let rows: Vec<_> = (0..100i64).map(|k| (k, k as f64)).collect();
        OrderedPartitionedCollection::from_sorted_rows(rows, num_partitions).unwrap()
    }

    #[test]
    fn test_summarize_matches_base() {
        let opc = numbers(7);
        assert_eq!(summarize(&Sum, &opc), 4950.0);
        assert_eq!(summarize_base(&Sum, &opc), 4950.0);
        assert_eq!(summarize(&Count::new(), &opc), 100);
    }

    #[test]
    fn test_summarize_parallel() {
        let opc = numbers(13);
        assert_eq!(summarize_parallel(&Sum, &opc, 4).unwrap(), 4950.0);
        assert_eq!(summarize_parallel(&Max::new(), &opc, 0).unwrap(), Some(99.0));
        assert_eq!(summarize_parallel(&Count::new(), &opc, 64).unwrap(), 100);
    }

    #[test]
    fn test_summarize_parallel_empty() {
        let opc = OrderedPartitionedCollection::<i64, f64>::empty();
        assert_eq!(summarize_parallel(&Count::new(), &opc, 4).unwrap(), 0);
    }

    #[test]
    fn test_merge_pairwise_keeps_order() {
        // String concatenation is associative but not commutative.
        struct Concat;
        impl Summarizer for Concat {
            type Input = char;
            type State = String;
            type Output = String;
            fn zero(&self) -> String {
                String::new()
            }
            fn add(&self, mut state: String, input: &char) -> String {
                state.push(*input);
                state
            }
            fn render(&self, state: &String) -> String {
                state.clone()
            }
        }
        impl Combinable for Concat {
            fn merge(&self, a: String, b: String) -> String {
                a + &b
            }
        }

        let states: Vec<String> = "abcdefg".chars().map(String::from).collect();
        assert_eq!(merge_pairwise(&Concat, states), "abcdefg");
        assert_eq!(merge_pairwise(&Concat, Vec::new()), "");

        let rows: Vec<_> = "tsframe".chars().enumerate().map(|(i, c)| (i as i64, c)).collect();
        let opc = OrderedPartitionedCollection::from_sorted_rows(rows, 5).unwrap();
        assert_eq!(summarize_parallel(&Concat, &opc, 3).unwrap(), "tsframe");
    }

    #[test]
    fn test_add_summary_column() {
        let opc = numbers(4);
        let running = add_summary_column(Sum, &opc).unwrap();
        assert_eq!(running.num_partitions(), opc.num_partitions());

        let mut expected = 0.0;
        for (key, (value, total)) in running.to_global_sequence() {
            expected += key as f64;
            assert_eq!(value, key as f64);
            assert_eq!(total, expected);
        }

        // A later partition replays on its own from its prefix.
        let last = running.partitions().last().unwrap();
        let (first_key, (_, total)) = last.rows().next().unwrap();
        let before: i64 = (0..=first_key).sum();
        assert_eq!(total, before as f64);
    }

    #[test]
    fn test_summarize_parallel_reports_panicked_worker() {
        struct PanicOn42;
        impl Summarizer for PanicOn42 {
            type Input = i64;
            type State = i64;
            type Output = i64;
            fn zero(&self) -> i64 {
                0
            }
            fn add(&self, state: i64, input: &i64) -> i64 {
                assert_ne!(*input, 42, "refusing 42");
                state + input
            }
            fn render(&self, state: &i64) -> i64 {
                *state
            }
        }
        impl Combinable for PanicOn42 {
            fn merge(&self, a: i64, b: i64) -> i64 {
                a + b
            }
        }

        let rows: Vec<(i64, i64)> = (0..80).map(|k| (k, k)).collect();
        let opc = OrderedPartitionedCollection::from_sorted_rows(rows, 8).unwrap();
        assert!(matches!(
            summarize_parallel(&PanicOn42, &opc, 4),
            Err(Error::WorkerPanicked(_))
        ));

        let rows: Vec<(i64, i64)> = (0..40).map(|k| (k, k)).collect();
        let opc = OrderedPartitionedCollection::from_sorted_rows(rows, 8).unwrap();
        assert_eq!(summarize_parallel(&PanicOn42, &opc, 4).unwrap(), 780);
    }
}
