//! Error types for the threading core.
//!
//! Only genuinely runtime-recoverable conditions are represented as errors.
//! Contract violations — releasing a lock the caller does not hold, using a
//! condition variable without its lock, re-acquiring a held lock — indicate a
//! bug in the caller and panic at the call site instead of returning a value.

use core::fmt;

/// Result type for threading operations.
pub type KernelResult<T> = Result<T, KernelError>;

/// Top-level error type for fallible kernel operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KernelError {
    /// Thread joining errors
    Join(JoinError),
}

/// Errors that can occur when joining a thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinError {
    /// The joined thread panicked during execution.
    Panicked,
}

impl fmt::Display for KernelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KernelError::Join(e) => write!(f, "thread join error: {}", e),
        }
    }
}

impl fmt::Display for JoinError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JoinError::Panicked => write!(f, "thread panicked during execution"),
        }
    }
}

impl From<JoinError> for KernelError {
    fn from(error: JoinError) -> Self {
        KernelError::Join(error)
    }
}

impl std::error::Error for JoinError {}
impl std::error::Error for KernelError {}
