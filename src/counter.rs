//! Concurrency-safe claim-ticket counter shared by the process variants.

use std::sync::atomic::{AtomicUsize, Ordering};

/// Non-negative counter with linearizable read-modify-write operations.
///
/// `add` returns the post-update value so callers can treat it as a claim
/// ticket: the next index a worker should execute is `add(1) - 1`. During a
/// single execution the value only moves forward.
#[derive(Debug, Default)]
pub(crate) struct SafeCounter {
    value: AtomicUsize,
}

impl SafeCounter {
    pub fn new() -> Self {
        Self::default()
    }

    #[allow(dead_code)]
    pub fn get(&self) -> usize {
        self.value.load(Ordering::SeqCst)
    }

    /// Stores `n` and returns it.
    pub fn set(&self, n: usize) -> usize {
        self.value.store(n, Ordering::SeqCst);
        n
    }

    /// Adds `n` and returns the post-update value.
    pub fn add(&self, n: usize) -> usize {
        self.value.fetch_add(n, Ordering::SeqCst) + n
    }

    /// Subtracts `n`, saturating at zero, and returns the post-update value.
    #[allow(dead_code)]
    pub fn subtract(&self, n: usize) -> usize {
        let mut current = self.value.load(Ordering::SeqCst);
        loop {
            let next = current.saturating_sub(n);
            match self.value.compare_exchange_weak(
                current,
                next,
                Ordering::SeqCst,
                Ordering::SeqCst,
            ) {
                Ok(_) => return next,
                Err(observed) => current = observed,
            }
        }
    }

    /// Raises the value to at least `n` and returns the post-update value.
    ///
    /// Cancellation uses this instead of `set` so a late stop cannot move
    /// the counter backwards past claims already handed out.
    pub fn advance_to(&self, n: usize) -> usize {
        self.value.fetch_max(n, Ordering::SeqCst).max(n)
    }
}
