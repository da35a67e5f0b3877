//! # Pool Error Types
//!
//! Every failure the engine reports to a caller is one of the variants of
//! [`PoolError`]. The variants fall into four groups:
//!
//! - Configuration: [`PoolError::LackPoolFunc`], [`PoolError::InvalidPoolExpiry`],
//!   [`PoolError::InvalidPreAllocSize`]; the pool is never created
//! - Admission: [`PoolError::PoolClosed`], [`PoolError::PoolOverload`]; returned
//!   synchronously to the submitter without touching pool state
//! - Queue: [`PoolError::QueueIsFull`], [`PoolError::QueueIsReleased`]; internal
//!   to the worker queue, the worker is dropped rather than recycled
//! - Lifecycle: [`PoolError::Timeout`] from a bounded release
//!
//! [`PoolError::BadObservation`] is never returned. It is the panic payload
//! raised when a pool without an output channel is observed.
//!
//! Display strings are the default English text. Callers that localise
//! messages should key their catalogue on [`PoolError::id`] instead.

use thiserror::Error;

/// Errors produced by the worker pool engine and its pipelines.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PoolError {
    /// A pool was constructed without a function to run.
    #[error("must provide function for pool func")]
    LackPoolFunc,

    /// The expiry duration cannot be used to schedule the purge scavenger.
    #[error("invalid expiry for pool")]
    InvalidPoolExpiry,

    /// Pre-allocation was requested for an unbounded pool.
    #[error("can not set up a negative capacity under PreAlloc mode")]
    InvalidPreAllocSize,

    /// The pool has been released.
    #[error("this pool has been closed")]
    PoolClosed,

    /// No worker is free and the caller may not block for one.
    #[error("too many goroutines blocked on submit or Nonblocking is set")]
    PoolOverload,

    /// The bounded worker queue has no free slot.
    #[error("the queue is full")]
    QueueIsFull,

    /// The worker queue has been reset and accepts no more workers.
    #[error("the queue length is zero")]
    QueueIsReleased,

    /// A bounded wait elapsed.
    #[error("operation timed out")]
    Timeout,

    /// An output channel was requested from a pool configured without one.
    #[error("output channel requested but no output was configured")]
    BadObservation,
}

impl PoolError {
    /// Opaque identifier of the error kind, stable across releases.
    pub fn id(&self) -> &'static str {
        match self {
            PoolError::LackPoolFunc => "lack-pool-func.error",
            PoolError::InvalidPoolExpiry => "invalid-pool-expiry.error",
            PoolError::InvalidPreAllocSize => "invalid-pre-alloc-size.error",
            PoolError::PoolClosed => "pool-closed.error",
            PoolError::PoolOverload => "pool-overload.error",
            PoolError::QueueIsFull => "queue-is-full.error",
            PoolError::QueueIsReleased => "queue-is-released.error",
            PoolError::Timeout => "timeout.error",
            PoolError::BadObservation => "bad-observation.error",
        }
    }

    /// Whether the error arose while validating options.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            PoolError::LackPoolFunc | PoolError::InvalidPoolExpiry | PoolError::InvalidPreAllocSize
        )
    }

    /// Whether the error rejected a submission.
    pub fn is_admission(&self) -> bool {
        matches!(self, PoolError::PoolClosed | PoolError::PoolOverload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_are_unique() {
        let all = [
            PoolError::LackPoolFunc,
            PoolError::InvalidPoolExpiry,
            PoolError::InvalidPreAllocSize,
            PoolError::PoolClosed,
            PoolError::PoolOverload,
            PoolError::QueueIsFull,
            PoolError::QueueIsReleased,
            PoolError::Timeout,
            PoolError::BadObservation,
        ];
        let ids: std::collections::HashSet<_> = all.iter().map(PoolError::id).collect();
        assert_eq!(ids.len(), all.len());
    }

    #[test]
    fn test_classification() {
        assert!(PoolError::LackPoolFunc.is_configuration());
        assert!(!PoolError::PoolClosed.is_configuration());
        assert!(PoolError::PoolOverload.is_admission());
        assert!(!PoolError::Timeout.is_admission());
    }
}
