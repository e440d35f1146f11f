use crate::CircuitState;
use bulwark_core::{CallOutcome, OperationKey, ResilienceEvent};
use std::time::Instant;

/// Events emitted by circuit breakers.
#[derive(Debug, Clone)]
pub enum CircuitBreakerEvent {
    /// A call was permitted through the breaker.
    CallPermitted {
        key: OperationKey,
        timestamp: Instant,
        state: CircuitState,
    },
    /// A call was rejected.
    CallRejected {
        key: OperationKey,
        timestamp: Instant,
        state: CircuitState,
    },
    /// The breaker moved between states.
    StateTransition {
        key: OperationKey,
        timestamp: Instant,
        from_state: CircuitState,
        to_state: CircuitState,
    },
    /// A permitted call reported how it ended.
    OutcomeRecorded {
        key: OperationKey,
        timestamp: Instant,
        outcome: CallOutcome,
        state: CircuitState,
    },
}

impl ResilienceEvent for CircuitBreakerEvent {
    fn event_type(&self) -> &'static str {
        match self {
            CircuitBreakerEvent::CallPermitted { .. } => "call_permitted",
            CircuitBreakerEvent::CallRejected { .. } => "call_rejected",
            CircuitBreakerEvent::StateTransition { .. } => "state_transition",
            CircuitBreakerEvent::OutcomeRecorded { .. } => "outcome_recorded",
        }
    }

    fn timestamp(&self) -> Instant {
        match self {
            CircuitBreakerEvent::CallPermitted { timestamp, .. }
            | CircuitBreakerEvent::CallRejected { timestamp, .. }
            | CircuitBreakerEvent::StateTransition { timestamp, .. }
            | CircuitBreakerEvent::OutcomeRecorded { timestamp, .. } => *timestamp,
        }
    }

    fn key(&self) -> &OperationKey {
        match self {
            CircuitBreakerEvent::CallPermitted { key, .. }
            | CircuitBreakerEvent::CallRejected { key, .. }
            | CircuitBreakerEvent::StateTransition { key, .. }
            | CircuitBreakerEvent::OutcomeRecorded { key, .. } => key,
        }
    }
}
