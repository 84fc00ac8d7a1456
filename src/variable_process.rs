//! Adaptive process variant driven by a CPU-utilization control loop.
//!
//! One worker starts the run. A ticker thread fires every optimization
//! interval, samples process CPU usage, feeds it through the PID
//! controller, and resizes the pool toward the controller's answer: growth
//! spawns workers into the shared claim loop, shrinkage posts a budget
//! that workers consume at their next checkpoint. The claim counter is the
//! only dispenser, so resizing never drops or repeats an index.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::thread;
use std::time::Duration;

use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender};
use log::{debug, trace};
use parking_lot::Mutex;

use crate::controller::{Controller, ControllerConfiguration};
use crate::counter::SafeCounter;
use crate::error::Error;
use crate::process::Process;
use crate::reporter::CpuReporter;
use crate::sync::WaitGroup;

/// Commands accepted by the optimization ticker between ticks.
enum TickerCommand {
    /// Re-read the optimization interval before waiting again.
    Restart,
}

/// Pool counters that must change together.
///
/// The shrink decision reads and writes both fields atomically as a pair;
/// splitting them into independent atomics would let two workers claim the
/// same shrink slot while each observes a pool of one.
#[derive(Debug)]
struct PoolCounts {
    num_workers: usize,
    num_to_remove: usize,
}

/// Controller and reporter, mutated only by the ticker and by `reset`
/// before any worker exists. The lock also serializes configuration
/// access from other threads.
#[derive(Debug)]
struct ControlLoop {
    controller: Controller,
    reporter: CpuReporter,
}

/// Executes operations across a worker pool whose width is continuously
/// retuned toward maximal CPU throughput.
#[derive(Debug)]
pub struct VariableProcess {
    /// Wall-clock period between optimization ticks.
    interval: Mutex<Duration>,
    /// Upper bound on the pool size; mutable mid-run.
    max_routines: AtomicUsize,
    /// Pool size and pending shrink budget, updated as a pair.
    pool: Mutex<PoolCounts>,
    /// Next index to dispense.
    iteration: SafeCounter,
    /// Total index count for the current execution.
    iterations: AtomicUsize,
    control: Mutex<ControlLoop>,
    /// Outstanding workers plus in-flight ticks.
    completion: WaitGroup,
    stop_requested: AtomicBool,
    /// Command handle for the live ticker; present only while `execute`
    /// runs.
    ticker: Mutex<Option<Sender<TickerCommand>>>,
}

impl VariableProcess {
    /// Creates a process that optimizes its pool every `interval` up to
    /// `max_routines` workers.
    pub fn new(
        interval: Duration,
        max_routines: usize,
        configuration: ControllerConfiguration,
    ) -> Result<Self, Error> {
        if interval.is_zero() {
            return Err(Error::ZeroInterval);
        }
        if max_routines == 0 {
            return Err(Error::ZeroRoutines);
        }
        configuration.validate()?;

        Ok(Self {
            interval: Mutex::new(interval),
            max_routines: AtomicUsize::new(max_routines),
            pool: Mutex::new(PoolCounts {
                num_workers: 1,
                num_to_remove: 0,
            }),
            iteration: SafeCounter::new(),
            iterations: AtomicUsize::new(0),
            control: Mutex::new(ControlLoop {
                controller: Controller::new(configuration),
                reporter: CpuReporter::new(),
            }),
            completion: WaitGroup::new(),
            stop_requested: AtomicBool::new(false),
            ticker: Mutex::new(None),
        })
    }

    /// Requests cancellation: the claim counter is raised past the end of
    /// the range, so every worker exits after the operation it is currently
    /// running. Best-effort; in-flight operations are never interrupted.
    ///
    /// Calling this with no execution in progress only arms the flag, which
    /// the next `execute` clears.
    pub fn stop(&self) {
        self.stop_requested.store(true, Ordering::SeqCst);
        self.iteration
            .advance_to(self.iterations.load(Ordering::SeqCst));
    }

    pub fn optimization_interval(&self) -> Duration {
        *self.interval.lock()
    }

    /// Replaces the optimization period and restarts the ticker. A zero
    /// duration is ignored.
    pub fn set_optimization_interval(&self, interval: Duration) {
        if interval.is_zero() {
            return;
        }
        *self.interval.lock() = interval;
        if let Some(sender) = self.ticker.lock().as_ref() {
            let _ = sender.send(TickerCommand::Restart);
        }
    }

    pub fn max_routines(&self) -> usize {
        self.max_routines.load(Ordering::SeqCst)
    }

    /// Updates the pool bound observed by the next optimization tick. Zero
    /// is tolerated here and clamped to an effective bound of one at tick
    /// time, so a lone worker always remains to drain the range.
    pub fn set_max_routines(&self, max_routines: usize) {
        self.max_routines.store(max_routines, Ordering::SeqCst);
    }

    pub fn controller_configuration(&self) -> ControllerConfiguration {
        self.control.lock().controller.configuration()
    }

    /// Replaces the controller coefficients; takes effect on the next tick.
    pub fn set_controller_configuration(&self, configuration: ControllerConfiguration) {
        self.control.lock().controller.set_configuration(configuration);
    }

    fn reset(&self) {
        {
            let mut pool = self.pool.lock();
            pool.num_workers = 1;
            pool.num_to_remove = 0;
        }
        self.iteration.set(0);
        self.stop_requested.store(false, Ordering::SeqCst);

        let mut control = self.control.lock();
        control.controller.reset();
        control.reporter.reset();
    }

    /// Claim loop shared by the initial worker and every worker the ticker
    /// adds mid-run.
    fn run_routine<F>(&self, operation: &F)
    where
        F: Fn(usize) + Sync,
    {
        let iterations = self.iterations.load(Ordering::SeqCst);
        let mut i = self.iteration.add(1) - 1;
        while i < iterations {
            operation(i);
            if self.check_shrink() {
                break;
            }
            i = self.iteration.add(1) - 1;
        }
    }

    /// Consumes one unit of shrink budget, if any. Returns whether this
    /// worker was chosen to exit. The last live worker absorbs the budget
    /// instead of exiting, so the pool never drops below one while indices
    /// remain; absorbing (rather than leaving the budget pending) keeps a
    /// stale shrink from killing a freshly grown worker on the next tick.
    fn check_shrink(&self) -> bool {
        let mut pool = self.pool.lock();
        if pool.num_to_remove == 0 {
            return false;
        }

        pool.num_to_remove -= 1;
        if pool.num_workers > 1 {
            pool.num_workers -= 1;
            return true;
        }
        false
    }

    /// Ticker body: one optimization per interval until every command
    /// sender is dropped. A restart command re-reads the interval
    /// immediately.
    fn run_ticker<'scope, F>(
        &'scope self,
        scope: &'scope thread::Scope<'scope, '_>,
        commands: &Receiver<TickerCommand>,
        operation: &'scope F,
    ) where
        F: Fn(usize) + Sync,
    {
        loop {
            let interval = *self.interval.lock();
            match commands.recv_timeout(interval) {
                Err(RecvTimeoutError::Timeout) => self.optimize(scope, operation),
                Ok(TickerCommand::Restart) => continue,
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }
    }

    /// One optimization tick: sample, control, resize.
    ///
    /// The tick holds a completion registration for its whole duration so
    /// `execute` cannot observe an empty pool between the last worker
    /// exiting and a grow decision landing. New workers are registered
    /// before they are spawned for the same reason.
    fn optimize<'scope, F>(
        &'scope self,
        scope: &'scope thread::Scope<'scope, '_>,
        operation: &'scope F,
    ) where
        F: Fn(usize) + Sync,
    {
        let _tick = self.completion.register();

        if self.stop_requested.load(Ordering::SeqCst) {
            return;
        }

        let output = {
            let mut control = self.control.lock();
            let (utilization, _) = control.reporter.sample();
            let output = control.controller.next(utilization);
            trace!("tick: utilization {utilization:.3}, controller output {output:.3}");
            output
        };
        if !output.is_finite() {
            return;
        }

        let max_routines = self.max_routines.load(Ordering::SeqCst).max(1);
        let desired = (output.round() as i64).clamp(1, max_routines as i64) as usize;

        let mut pool = self.pool.lock();
        let current = pool.num_workers;
        if desired > current {
            pool.num_workers = desired;
            drop(pool);

            debug!("growing pool from {current} to {desired} workers");
            for _ in 0..desired - current {
                let registration = self.completion.register();
                scope.spawn(move || {
                    let _registration = registration;
                    self.run_routine(operation);
                });
            }
        } else if desired < current {
            // Ceiling-replace: a later tick supersedes an earlier pending
            // shrink rather than stacking on top of it.
            pool.num_to_remove = current - desired;
            debug!("requesting shrink from {current} to {desired} workers");
        }
    }
}

impl Process for VariableProcess {
    fn execute<F>(&self, iterations: usize, operation: F)
    where
        F: Fn(usize) + Sync,
    {
        if iterations == 0 {
            return;
        }

        self.reset();
        self.iterations.store(iterations, Ordering::SeqCst);

        let (sender, receiver) = unbounded();
        *self.ticker.lock() = Some(sender);

        thread::scope(|scope| {
            let operation = &operation;

            let registration = self.completion.register();
            scope.spawn(move || {
                let _registration = registration;
                self.run_routine(operation);
            });
            scope.spawn(move || self.run_ticker(scope, &receiver, operation));

            self.completion.wait();
            // Dropping the sender disconnects the ticker; the scope join
            // then absorbs the ticker thread along with any stragglers its
            // final tick spawned into the exhausted range.
            *self.ticker.lock() = None;
        });
    }

    fn num_routines(&self) -> usize {
        self.pool.lock().num_workers
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reference_configuration() -> ControllerConfiguration {
        ControllerConfiguration::new(2.0, 0.0, 1.0, 0.1, 1.0)
    }

    #[test]
    fn test_zero_interval_is_a_misconfiguration() {
        let result = VariableProcess::new(Duration::ZERO, 4, reference_configuration());
        assert_eq!(result.unwrap_err(), Error::ZeroInterval);
    }

    #[test]
    fn test_zero_max_routines_is_a_misconfiguration() {
        let result =
            VariableProcess::new(Duration::from_millis(10), 0, reference_configuration());
        assert_eq!(result.unwrap_err(), Error::ZeroRoutines);
    }

    #[test]
    fn test_invalid_configuration_is_rejected() {
        let configuration = ControllerConfiguration::new(1.0, 0.0, 0.0, 2.0, 1.0);
        let result = VariableProcess::new(Duration::from_millis(10), 4, configuration);
        assert!(matches!(
            result.unwrap_err(),
            Error::InvalidControllerConfiguration(_)
        ));
    }

    #[test]
    fn test_tuning_accessors_round_trip() {
        let process =
            VariableProcess::new(Duration::from_millis(10), 4, reference_configuration())
                .unwrap();

        assert_eq!(process.optimization_interval(), Duration::from_millis(10));
        process.set_optimization_interval(Duration::from_millis(25));
        assert_eq!(process.optimization_interval(), Duration::from_millis(25));

        // A zero interval is ignored rather than accepted.
        process.set_optimization_interval(Duration::ZERO);
        assert_eq!(process.optimization_interval(), Duration::from_millis(25));

        assert_eq!(process.max_routines(), 4);
        process.set_max_routines(9);
        assert_eq!(process.max_routines(), 9);

        let retuned = ControllerConfiguration::new(3.0, 0.5, 0.0, 1.0, 1.0);
        process.set_controller_configuration(retuned);
        assert_eq!(process.controller_configuration(), retuned);
    }

    #[test]
    fn test_shrink_budget_spares_the_last_worker() {
        let process =
            VariableProcess::new(Duration::from_millis(10), 4, reference_configuration())
                .unwrap();

        {
            let mut pool = process.pool.lock();
            pool.num_workers = 2;
            pool.num_to_remove = 3;
        }

        // First consumer shrinks the pool; the rest absorb against the
        // floor of one.
        assert!(process.check_shrink());
        assert!(!process.check_shrink());
        assert!(!process.check_shrink());
        assert!(!process.check_shrink());

        let pool = process.pool.lock();
        assert_eq!(pool.num_workers, 1);
        assert_eq!(pool.num_to_remove, 0);
    }

    #[test]
    fn test_stop_before_execute_is_cleared_by_the_next_run() {
        let process =
            VariableProcess::new(Duration::from_millis(10), 4, reference_configuration())
                .unwrap();
        process.stop();

        let hits: Vec<AtomicUsize> = (0..1_000).map(|_| AtomicUsize::new(0)).collect();
        process.execute(hits.len(), |i| {
            hits[i].fetch_add(1, Ordering::SeqCst);
        });

        assert!(hits.iter().all(|hit| hit.load(Ordering::SeqCst) == 1));
    }
}
