use bulwark_core::{CallOutcome, OperationKey, ResilienceEvent};
use std::time::{Duration, Instant};

/// Events emitted by the resilient executor.
#[derive(Debug, Clone)]
pub enum ExecutorEvent {
    /// An invocation reached its terminal outcome.
    CallCompleted {
        key: OperationKey,
        timestamp: Instant,
        outcome: CallOutcome,
        /// Time from entry to outcome, including queueing.
        duration: Duration,
    },
    /// A fallback stood in for a non-successful call.
    FallbackApplied {
        key: OperationKey,
        timestamp: Instant,
        outcome: CallOutcome,
    },
    /// No fallback could stand in; the caller receives an error.
    FallbackFailed {
        key: OperationKey,
        timestamp: Instant,
        outcome: CallOutcome,
    },
}

impl ResilienceEvent for ExecutorEvent {
    fn event_type(&self) -> &'static str {
        match self {
            ExecutorEvent::CallCompleted { .. } => "call_completed",
            ExecutorEvent::FallbackApplied { .. } => "fallback_applied",
            ExecutorEvent::FallbackFailed { .. } => "fallback_failed",
        }
    }

    fn timestamp(&self) -> Instant {
        match self {
            ExecutorEvent::CallCompleted { timestamp, .. }
            | ExecutorEvent::FallbackApplied { timestamp, .. }
            | ExecutorEvent::FallbackFailed { timestamp, .. } => *timestamp,
        }
    }

    fn key(&self) -> &OperationKey {
        match self {
            ExecutorEvent::CallCompleted { key, .. }
            | ExecutorEvent::FallbackApplied { key, .. }
            | ExecutorEvent::FallbackFailed { key, .. } => key,
        }
    }
}
