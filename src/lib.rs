//! Parallel execution of indexed operations on fixed or adaptive worker
//! pools.
//!
//! A process runs a caller-supplied operation for every index in
//! `[0, iterations)` across a set of worker threads. [`FixedProcess`] and
//! [`AlternatingProcess`] use a constant, caller-chosen width.
//! [`VariableProcess`] resizes its pool while it runs: a PID controller
//! fed by process CPU utilization decides every tick how many workers the
//! machine can actually keep busy.
//!
//! ```
//! use parapid::{FixedProcess, Process};
//! use std::sync::atomic::{AtomicUsize, Ordering};
//!
//! let values: Vec<AtomicUsize> = (0..1_000).map(|_| AtomicUsize::new(0)).collect();
//! let process = FixedProcess::new(2).unwrap();
//! process.execute(values.len(), |i| values[i].store(i + 1, Ordering::Relaxed));
//!
//! assert!(values
//!     .iter()
//!     .enumerate()
//!     .all(|(i, v)| v.load(Ordering::Relaxed) == i + 1));
//! ```

pub mod alternating_process;
pub mod controller;
pub mod error;
pub mod fixed_process;
pub mod process;
pub mod variable_process;

mod counter;
mod reporter;
mod sync;

pub use alternating_process::AlternatingProcess;
pub use controller::ControllerConfiguration;
pub use error::Error;
pub use fixed_process::FixedProcess;
pub use process::Process;
pub use variable_process::VariableProcess;
