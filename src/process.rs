//! Common interface implemented by every process variant.

/// A parallel process executes an indexed operation across worker threads.
///
/// The operation is invoked concurrently from as many threads as the
/// variant runs, which the `Sync` bound encodes; any interior state it
/// touches must carry its own synchronization. Indices are dispensed in
/// increasing order but may complete out of order, and no index is ever
/// dispensed twice. A panic inside the operation is not intercepted: the
/// remaining workers drain and the panic propagates out of `execute`.
pub trait Process {
    /// Runs `operation` for every index in `[0, iterations)`, returning
    /// once all workers have exited. `iterations == 0` returns immediately
    /// without invoking the operation.
    fn execute<F>(&self, iterations: usize, operation: F)
    where
        F: Fn(usize) + Sync;

    /// The number of workers the process is currently using.
    fn num_routines(&self) -> usize;
}
