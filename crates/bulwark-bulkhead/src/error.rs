//! Error types for bulkhead pools.

use bulwark_core::{OperationKey, ResilienceError};
use std::time::Duration;

/// Why a bulkhead refused a call.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BulkheadError {
    /// All slots were busy and the queue was full.
    #[error("bulkhead '{key}' is full: {max_concurrent} in flight, {max_queue_depth} queued")]
    BulkheadFull {
        /// Operation whose pool is saturated.
        key: OperationKey,
        /// Configured concurrency limit.
        max_concurrent: usize,
        /// Configured queue depth.
        max_queue_depth: usize,
    },
    /// The call's deadline passed while it waited in the queue.
    #[error("bulkhead '{key}': deadline passed after waiting {waited:?} for a slot")]
    QueueTimeout {
        /// Operation whose queue the call waited in.
        key: OperationKey,
        /// Time spent waiting.
        waited: Duration,
        /// Configured concurrency limit.
        max_concurrent: usize,
        /// Configured queue depth.
        max_queue_depth: usize,
    },
}

impl BulkheadError {
    /// The operation that rejected the call.
    pub fn key(&self) -> &OperationKey {
        match self {
            BulkheadError::BulkheadFull { key, .. } | BulkheadError::QueueTimeout { key, .. } => {
                key
            }
        }
    }

    /// Returns `true` if the call waited in the queue before being rejected.
    pub fn is_queue_timeout(&self) -> bool {
        matches!(self, BulkheadError::QueueTimeout { .. })
    }
}

/// Result type for bulkhead operations.
pub type Result<T> = std::result::Result<T, BulkheadError>;

// Both kinds of refusal are the same outcome to the executor: rejected by bulkhead.
impl<E> From<BulkheadError> for ResilienceError<E> {
    fn from(err: BulkheadError) -> Self {
        match err {
            BulkheadError::BulkheadFull {
                key,
                max_concurrent,
                max_queue_depth,
            }
            | BulkheadError::QueueTimeout {
                key,
                max_concurrent,
                max_queue_depth,
                ..
            } => ResilienceError::BulkheadFull {
                key,
                max_concurrent,
                max_queue_depth,
            },
        }
    }
}
