//! Construction-time error kinds.

use thiserror::Error;

/// Misconfiguration detected while building a process.
///
/// Construction is the only fallible surface of the crate; `execute` never
/// fail-returns.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// A process cannot run with zero workers.
    #[error("the number of routines must be greater than zero")]
    ZeroRoutines,

    /// The optimization ticker cannot fire on a zero period.
    #[error("the optimization interval must be greater than zero")]
    ZeroInterval,

    /// A controller coefficient is outside its documented range.
    #[error("invalid controller configuration: {0}")]
    InvalidControllerConfiguration(&'static str),
}
