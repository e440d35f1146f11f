use crate::CircuitState;
use bulwark_core::{OperationKey, ResilienceError};
use thiserror::Error;

/// Returned by [`CircuitBreaker::permit`](crate::CircuitBreaker::permit) when
/// a call is not allowed through.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("circuit breaker '{key}' is {state:?}; call not permitted")]
pub struct CircuitOpen {
    /// Operation whose breaker refused the call.
    pub key: OperationKey,
    /// State at the time of refusal: `Open`, or `HalfOpen` with a probe
    /// already in flight.
    pub state: CircuitState,
}

impl<E> From<CircuitOpen> for ResilienceError<E> {
    fn from(err: CircuitOpen) -> Self {
        ResilienceError::BreakerOpen { key: err.key }
    }
}
