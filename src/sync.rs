//! Completion tracking for a worker set that grows while it is awaited.

use parking_lot::{Condvar, Mutex};

/// Counts outstanding participants and blocks `wait` until all have
/// finished.
///
/// Participants may be added while another thread waits, which a plain
/// barrier cannot express. The registration for a new participant must be
/// taken before its thread is spawned: that ordering keeps the count from
/// being observed at zero while a spawn is still pending.
#[derive(Debug, Default)]
pub(crate) struct WaitGroup {
    count: Mutex<usize>,
    zero: Condvar,
}

impl WaitGroup {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, n: usize) {
        *self.count.lock() += n;
    }

    pub fn done(&self) {
        let mut count = self.count.lock();
        debug_assert!(*count > 0, "done without a matching add");
        *count -= 1;
        if *count == 0 {
            self.zero.notify_all();
        }
    }

    /// Adds one participant and returns a guard that signals completion on
    /// drop, so a panicking participant still releases its registration.
    pub fn register(&self) -> Registration<'_> {
        self.add(1);
        Registration { group: self }
    }

    /// Blocks until the count reaches zero.
    pub fn wait(&self) {
        let mut count = self.count.lock();
        while *count > 0 {
            self.zero.wait(&mut count);
        }
    }
}

/// Drop-based completion signal for one participant.
pub(crate) struct Registration<'a> {
    group: &'a WaitGroup,
}

impl Drop for Registration<'_> {
    fn drop(&mut self) {
        self.group.done();
    }
}
