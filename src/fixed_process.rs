//! Constant-width process variant.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;

use crate::counter::SafeCounter;
use crate::error::Error;
use crate::process::Process;

/// Executes operations across a fixed number of worker threads.
///
/// Workers race on a shared claim counter rather than owning a slice of
/// the range, so a worker stuck on a slow index never holds back the
/// others.
#[derive(Debug)]
pub struct FixedProcess {
    num_routines: usize,
    count: SafeCounter,
    iterations: AtomicUsize,
}

impl FixedProcess {
    /// Creates a process that always runs `num_routines` workers.
    pub fn new(num_routines: usize) -> Result<Self, Error> {
        if num_routines == 0 {
            return Err(Error::ZeroRoutines);
        }

        Ok(Self {
            num_routines,
            count: SafeCounter::new(),
            iterations: AtomicUsize::new(0),
        })
    }

    /// Poisons the claim counter so every worker exits after its current
    /// operation. Each index claimed before the call still executes, so the
    /// executed set is a downward-closed prefix in dispense order.
    pub fn stop(&self) {
        self.count.advance_to(self.iterations.load(Ordering::SeqCst));
    }

    fn run_routine<F>(&self, operation: &F)
    where
        F: Fn(usize) + Sync,
    {
        let iterations = self.iterations.load(Ordering::SeqCst);
        let mut i = self.count.add(1) - 1;
        while i < iterations {
            operation(i);
            i = self.count.add(1) - 1;
        }
    }
}

impl Process for FixedProcess {
    fn execute<F>(&self, iterations: usize, operation: F)
    where
        F: Fn(usize) + Sync,
    {
        self.count.set(0);
        self.iterations.store(iterations, Ordering::SeqCst);
        if iterations == 0 {
            return;
        }

        thread::scope(|scope| {
            let operation = &operation;
            for _ in 0..self.num_routines {
                scope.spawn(move || self.run_routine(operation));
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
    use std::sync::atomic::AtomicBool;

    #[test]
    fn test_zero_routines_is_a_misconfiguration() {
        assert_eq!(FixedProcess::new(0).unwrap_err(), Error::ZeroRoutines);
    }

    #[test]
    fn test_num_routines_reports_the_configured_width() {
        let process = FixedProcess::new(3).unwrap();
        assert_eq!(process.num_routines(), 3);
    }

    #[test]
    fn test_zero_iterations_never_invokes_the_operation() {
        let process = FixedProcess::new(2).unwrap();
        let called = AtomicBool::new(false);

        process.execute(0, |_| called.store(true, Ordering::SeqCst));

        assert!(!called.load(Ordering::SeqCst));
    }

    #[test]
    fn test_every_index_executes_exactly_once() {
        let process = FixedProcess::new(4).unwrap();
        let hits: Vec<AtomicUsize> = (0..10_000).map(|_| AtomicUsize::new(0)).collect();

        process.execute(hits.len(), |i| {
            hits[i].fetch_add(1, Ordering::SeqCst);
        });

        assert!(hits.iter().all(|hit| hit.load(Ordering::SeqCst) == 1));
    }
}
