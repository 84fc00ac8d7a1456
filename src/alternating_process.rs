//! Stride-partitioned process variant.

use std::thread;

use crate::error::Error;
use crate::process::Process;

/// Executes operations on workers that stride the index range instead of
/// racing a shared counter: worker `k` handles `k, k + n, k + 2n, ...` for
/// a pool of width `n`.
///
/// With no claim traffic this is the cheapest variant per index, at the
/// cost of a fixed partition: there is no stop mechanism and an uneven
/// per-index workload skews the finish times.
#[derive(Debug)]
pub struct AlternatingProcess {
    num_routines: usize,
}

impl AlternatingProcess {
    pub fn new(num_routines: usize) -> Result<Self, Error> {
        if num_routines == 0 {
            return Err(Error::ZeroRoutines);
        }

        Ok(Self { num_routines })
    }
}

impl Process for AlternatingProcess {
    fn execute<F>(&self, iterations: usize, operation: F)
    where
        F: Fn(usize) + Sync,
    {
        if iterations == 0 {
            return;
        }

        let stride = self.num_routines;
        thread::scope(|scope| {
            let operation = &operation;
            for start in 0..stride {
                scope.spawn(move || {
                    let mut i = start;
                    while i < iterations {
                        operation(i);
                        i += stride;
                    }
                });
            }
        });
    }

    fn num_routines(&self) -> usize {
        self.num_routines
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_zero_routines_is_a_misconfiguration() {
        assert_eq!(AlternatingProcess::new(0).unwrap_err(), Error::ZeroRoutines);
    }

    #[test]
    fn test_every_index_executes_exactly_once() {
        let process = AlternatingProcess::new(3).unwrap();
        let hits: Vec<AtomicUsize> = (0..10_000).map(|_| AtomicUsize::new(0)).collect();

        process.execute(hits.len(), |i| {
            hits[i].fetch_add(1, Ordering::SeqCst);
        });

        assert!(hits.iter().all(|hit| hit.load(Ordering::SeqCst) == 1));
    }

    #[test]
    fn test_range_shorter_than_the_pool_still_completes() {
        let process = AlternatingProcess::new(8).unwrap();
        let hits: Vec<AtomicUsize> = (0..3).map(|_| AtomicUsize::new(0)).collect();

        process.execute(hits.len(), |i| {
            hits[i].fetch_add(1, Ordering::SeqCst);
        });

        assert!(hits.iter().all(|hit| hit.load(Ordering::SeqCst) == 1));
    }
}
