use std::{
    error::Error,
    fmt::{self, Display},
};

use thiserror::Error;

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// The result of a deferred-scheduler operation.
pub type DeferredResult<T> = Result<T, DeferredError>;

/// An error raised by a deferred task itself (as opposed to scheduler
/// bookkeeping, which never fails).
#[derive(pretty_error_debug::Debug, Error)]
pub enum DeferredError {
    /// The task's context was cancelled, either by an explicit
    /// [`crate::Scheduler::cancel`] call or by a parent context expiring,
    /// before the task completed.
    #[error("deferred task cancelled")]
    Cancelled,

    /// Any other error, wrapped for a task's `perform` closure that has no
    /// dedicated variant to raise.
    #[error(transparent)]
    Custom(#[from] AnyError),
}

/// An error that can represent any error.
#[derive(Debug)]
pub struct AnyError {
    error: anyhow::Error,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl DeferredError {
    /// Creates a new `Err` result from any error type.
    pub fn custom(error: impl Into<anyhow::Error>) -> DeferredError {
        DeferredError::Custom(AnyError {
            error: error.into(),
        })
    }
}

//--------------------------------------------------------------------------------------------------
// Trait Implementations
//--------------------------------------------------------------------------------------------------

impl Display for AnyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.error)
    }
}

impl Error for AnyError {}
