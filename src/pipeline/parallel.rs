//! Parallel primitives for batch pipeline stages.
//!
//! Every stage follows the same plan: partition the input into
//! `thread_count()` contiguous chunks, run the sequential kernel on each
//! chunk in a crossbeam scoped thread, then concatenate per-worker outputs
//! in partition order and sum per-worker logs. Threads are spawned and
//! joined per stage; there is no persistent pool. Inputs smaller than the
//! worker count collapse to the sequential path.

use std::ops::Add;

use crate::pipeline::log::ParseLog;

/// Number of workers a stage partitions into.
pub fn thread_count() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

/// Split a vector into `parts` contiguous chunks: `parts - 1` chunks of
/// `len / parts` items, the remainder in the last.
fn split_vec<T>(items: Vec<T>, parts: usize) -> Vec<Vec<T>> {
    let batch = items.len() / parts;
    let mut chunks = Vec::with_capacity(parts);
    let mut iter = items.into_iter();
    for _ in 0..parts - 1 {
        chunks.push(iter.by_ref().take(batch).collect());
    }
    chunks.push(iter.collect());
    chunks
}

/// Apply `f` to every element in place.
pub fn parallel_for_each<T, F>(items: &mut [T], f: F)
where
    T: Send,
    F: Fn(&mut T) + Sync,
{
    let threads = thread_count();
    let batch = items.len() / threads;
    if batch == 0 {
        items.iter_mut().for_each(f);
        return;
    }

    crossbeam::scope(|scope| {
        let f = &f;
        let (head, tail) = items.split_at_mut(batch * (threads - 1));
        let mut chunks: Vec<&mut [T]> = head.chunks_mut(batch).collect();
        chunks.push(tail);
        for chunk in chunks {
            scope.spawn(move |_| chunk.iter_mut().for_each(f));
        }
    })
    .expect("worker thread panicked");
}

/// Map every element through `f`, preserving order.
pub fn parallel_transform<T, U, F>(items: Vec<T>, f: F) -> Vec<U>
where
    T: Send,
    U: Send,
    F: Fn(T) -> U + Sync,
{
    let threads = thread_count();
    if items.len() / threads == 0 {
        return items.into_iter().map(f).collect();
    }

    let chunks = split_vec(items, threads);
    let results: Vec<Vec<U>> = crossbeam::scope(|scope| {
        let f = &f;
        let handles: Vec<_> = chunks
            .into_iter()
            .map(|chunk| scope.spawn(move |_| chunk.into_iter().map(f).collect::<Vec<U>>()))
            .collect();
        handles
            .into_iter()
            .map(|h| h.join().expect("worker thread panicked"))
            .collect()
    })
    .expect("worker thread panicked");

    let mut out = Vec::with_capacity(results.iter().map(Vec::len).sum());
    for r in results {
        out.extend(r);
    }
    out
}

/// Map every element through `f`, dropping `None` results and accumulating
/// filter counts into `log`. Surviving elements keep their input order.
pub fn parallel_transform_filter<T, U, F>(items: Vec<T>, log: &mut ParseLog, f: F) -> Vec<U>
where
    T: Send,
    U: Send,
    F: Fn(T, &mut ParseLog) -> Option<U> + Sync,
{
    let threads = thread_count();
    if items.len() / threads == 0 {
        let mut out = Vec::with_capacity(items.len());
        for item in items {
            if let Some(u) = f(item, log) {
                out.push(u);
            }
        }
        return out;
    }

    let chunks = split_vec(items, threads);
    let results: Vec<(Vec<U>, ParseLog)> = crossbeam::scope(|scope| {
        let f = &f;
        let handles: Vec<_> = chunks
            .into_iter()
            .map(|chunk| {
                scope.spawn(move |_| {
                    let mut local = ParseLog::default();
                    let mut out = Vec::with_capacity(chunk.len());
                    for item in chunk {
                        if let Some(u) = f(item, &mut local) {
                            out.push(u);
                        }
                    }
                    (out, local)
                })
            })
            .collect();
        handles
            .into_iter()
            .map(|h| h.join().expect("worker thread panicked"))
            .collect()
    })
    .expect("worker thread panicked");

    let mut out = Vec::with_capacity(results.iter().map(|(r, _)| r.len()).sum());
    for (r, local) in results {
        out.extend(r);
        *log += local;
    }
    out
}

/// Reduce a slice by running `f` on each chunk and summing the partial
/// results.
pub fn parallel_reduce<T, R, F>(items: &[T], f: F) -> R
where
    T: Sync,
    R: Send + Add<Output = R>,
    F: Fn(&[T]) -> R + Sync,
{
    let threads = thread_count();
    let batch = items.len() / threads;
    if batch == 0 {
        return f(items);
    }

    let results: Vec<R> = crossbeam::scope(|scope| {
        let f = &f;
        let handles: Vec<_> = (0..threads)
            .map(|i| {
                let chunk = if i == threads - 1 {
                    &items[i * batch..]
                } else {
                    &items[i * batch..(i + 1) * batch]
                };
                scope.spawn(move |_| f(chunk))
            })
            .collect();
        handles
            .into_iter()
            .map(|h| h.join().expect("worker thread panicked"))
            .collect()
    })
    .expect("worker thread panicked");

    results
        .into_iter()
        .reduce(|a, b| a + b)
        .expect("at least one reduction chunk")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transform_preserves_order() {
        let items: Vec<u64> = (0..10_000).collect();
        let doubled = parallel_transform(items, |x| x * 2);
        assert_eq!(doubled.len(), 10_000);
        assert!(doubled.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(doubled[7], 14);
    }

    #[test]
    fn test_transform_filter_counts_match_sequential() {
        let items: Vec<u64> = (0..10_000).collect();
        let kernel = |x: u64, log: &mut ParseLog| {
            if x % 3 == 0 {
                log.filter_invalid_chars += 1;
                None
            } else {
                Some(x)
            }
        };

        let mut par_log = ParseLog::default();
        let kept = parallel_transform_filter(items.clone(), &mut par_log, kernel);

        let mut seq_log = ParseLog::default();
        let expected: Vec<u64> = items
            .into_iter()
            .filter_map(|x| kernel(x, &mut seq_log))
            .collect();

        assert_eq!(kept, expected);
        assert_eq!(par_log, seq_log);
    }

    #[test]
    fn test_reduce_sums_chunks() {
        let items: Vec<u64> = (1..=1000).collect();
        let total = parallel_reduce(&items, |chunk| chunk.iter().sum::<u64>());
        assert_eq!(total, 500_500);
    }

    #[test]
    fn test_small_inputs_take_sequential_path() {
        let mut log = ParseLog::default();
        let out = parallel_transform_filter(vec![1u64], &mut log, |x, _| Some(x + 1));
        assert_eq!(out, vec![2]);
    }

    #[test]
    fn test_for_each_mutates_in_place() {
        let mut items: Vec<u64> = (0..5000).collect();
        parallel_for_each(&mut items, |x| *x += 1);
        assert_eq!(items[0], 1);
        assert_eq!(items[4999], 5000);
    }
}
