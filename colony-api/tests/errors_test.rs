// Integration tests for the error taxonomy in colony_api::error

use colony_api::error::PoolError;
use std::error::Error;

#[test]
fn test_configuration_error_display() {
    assert_eq!(PoolError::LackPoolFunc.to_string(), "must provide function for pool func");
    assert_eq!(PoolError::InvalidPoolExpiry.to_string(), "invalid expiry for pool");
    assert_eq!(
        PoolError::InvalidPreAllocSize.to_string(),
        "can not set up a negative capacity under PreAlloc mode"
    );
}

#[test]
fn test_admission_error_display() {
    assert_eq!(PoolError::PoolClosed.to_string(), "this pool has been closed");
    assert_eq!(
        PoolError::PoolOverload.to_string(),
        "too many goroutines blocked on submit or Nonblocking is set"
    );
}

#[test]
fn test_queue_and_lifecycle_error_display() {
    assert_eq!(PoolError::QueueIsFull.to_string(), "the queue is full");
    assert_eq!(PoolError::QueueIsReleased.to_string(), "the queue length is zero");
    assert_eq!(PoolError::Timeout.to_string(), "operation timed out");
}

#[test]
fn test_errors_have_no_source() {
    assert!(PoolError::PoolClosed.source().is_none());
    assert!(PoolError::BadObservation.source().is_none());
}

#[test]
fn test_errors_convert_into_anyhow() {
    let err: anyhow::Error = PoolError::PoolOverload.into();
    assert_eq!(err.downcast_ref::<PoolError>(), Some(&PoolError::PoolOverload));
}

#[test]
fn test_error_ids_are_kind_identifiers() {
    assert_eq!(PoolError::PoolClosed.id(), "pool-closed.error");
    assert_eq!(PoolError::BadObservation.id(), "bad-observation.error");
    assert!(PoolError::Timeout.id().ends_with(".error"));
}
