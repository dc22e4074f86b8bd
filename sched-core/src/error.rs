//! Error types for the front scheduler.
//!
//! Scheduling itself reports readiness, not failure: a `false` from
//! `pull_front_data` or `finish_front` means "poll again later". The variants
//! here cover caller contract violations and accelerator failures, both of
//! which are fatal to the factorization run.

use crate::front::FrontState;
use thiserror::Error;

/// Errors that can occur while scheduling fronts.
#[derive(Error, Debug)]
pub enum SchedError {
    /// Front id outside the front list.
    #[error("Unknown front {front} (front list has {len} entries)")]
    UnknownFront { front: usize, len: usize },

    /// `pull_front_data` was called before the kernel launch handed over
    /// the front's ready signal.
    #[error("Front {0} has no ready signal attached")]
    MissingReadySignal(usize),

    /// A ready signal was attached twice without an intervening pull.
    #[error("Front {0} already has a ready signal attached")]
    ReadySignalAlreadyAttached(usize),

    /// A ready signal was attached to a front whose pull was already issued
    /// or that was finished; nothing would ever consume it.
    #[error("Front {0} no longer takes a ready signal (already pulled or finished)")]
    ReadySignalAfterPull(usize),

    /// The front has no accelerator buffer to pull from.
    #[error("Front {0} has no device buffer")]
    MissingDeviceBuffer(usize),

    /// State write on a front that is not in the active set.
    #[error("Front {0} is not active")]
    NotActive(usize),

    /// A state write outside the transition table.
    #[error("Illegal transition for front {front}: {from} -> {to}")]
    IllegalTransition {
        front: usize,
        from: FrontState,
        to: FrontState,
    },

    /// Active-set permutation check failed.
    #[error("Active set invariant violated: {0}")]
    InvariantViolation(String),

    /// Accelerator or transfer API failure.
    #[error("Device error {code} during {context}: {message}")]
    Device {
        code: i32,
        context: String,
        message: String,
    },
}

/// Result type for scheduler operations.
pub type SchedResult<T> = Result<T, SchedError>;
