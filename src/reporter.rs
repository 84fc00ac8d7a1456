//! Process CPU utilization sampling.

use std::time::{Duration, Instant};

/// Interval reported when two samples land on the same instant, keeping
/// downstream derivatives bounded.
const DEGENERATE_INTERVAL: f64 = 1e-9;

/// Reports the CPU consumed by this process between consecutive samples.
///
/// Utilization is unit-less: a value of N means N cores-worth of CPU time
/// was burned over the sampled wall-clock window.
#[derive(Debug)]
pub(crate) struct CpuReporter {
    last_wall: Instant,
    last_cpu: Duration,
}

impl CpuReporter {
    pub fn new() -> Self {
        Self {
            last_wall: Instant::now(),
            last_cpu: process_cpu_time(),
        }
    }

    /// Returns `(utilization, elapsed_seconds)` measured since the previous
    /// call to `sample`, `reset`, or construction, and reseats both
    /// reference points.
    ///
    /// A zero-width wall interval yields `(0.0, DEGENERATE_INTERVAL)`
    /// instead of dividing by zero.
    pub fn sample(&mut self) -> (f64, f64) {
        let wall_now = Instant::now();
        let cpu_now = process_cpu_time();

        let wall_delta = wall_now.duration_since(self.last_wall).as_secs_f64();
        let cpu_delta = cpu_now
            .checked_sub(self.last_cpu)
            .unwrap_or_default()
            .as_secs_f64();

        self.last_wall = wall_now;
        self.last_cpu = cpu_now;

        if wall_delta <= 0.0 {
            return (0.0, DEGENERATE_INTERVAL);
        }

        (cpu_delta / wall_delta, wall_delta)
    }

    /// Reseats both reference points to now.
    pub fn reset(&mut self) {
        self.last_wall = Instant::now();
        self.last_cpu = process_cpu_time();
    }
}

impl Default for CpuReporter {
    fn default() -> Self {
        Self::new()
    }
}

/// Total user plus system CPU time consumed by this process.
#[cfg(unix)]
fn process_cpu_time() -> Duration {
    let mut usage: libc::rusage = unsafe { std::mem::zeroed() };
    let rc = unsafe { libc::getrusage(libc::RUSAGE_SELF, &mut usage) };
    if rc != 0 {
        return Duration::ZERO;
    }
    timeval_duration(usage.ru_utime) + timeval_duration(usage.ru_stime)
}

#[cfg(unix)]
fn timeval_duration(tv: libc::timeval) -> Duration {
    Duration::new(tv.tv_sec.max(0) as u64, tv.tv_usec.max(0) as u32 * 1_000)
}

/// CPU accounting is unavailable on this platform; the controller sees an
/// idle machine and holds the pool at its clamped minimum.
#[cfg(not(unix))]
fn process_cpu_time() -> Duration {
    Duration::ZERO
}
