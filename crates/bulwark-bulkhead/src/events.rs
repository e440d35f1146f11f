//! Event types for bulkhead pools.

use bulwark_core::events::ResilienceEvent;
use bulwark_core::OperationKey;
use std::time::{Duration, Instant};

/// Why a call did not get a slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    /// Every slot was busy and the queue was full.
    Full,
    /// The call queued but its deadline passed before a slot freed up.
    QueueTimeout,
}

impl RejectReason {
    /// Label used for metrics.
    pub fn as_str(&self) -> &'static str {
        match self {
            RejectReason::Full => "full",
            RejectReason::QueueTimeout => "queue_timeout",
        }
    }
}

/// Events emitted by a bulkhead pool.
#[derive(Debug, Clone)]
pub enum BulkheadEvent {
    /// A call obtained a slot.
    CallPermitted {
        /// Operation the slot belongs to.
        key: OperationKey,
        /// When the event occurred.
        timestamp: Instant,
        /// Calls in flight, including this one.
        in_flight: usize,
        /// Time spent queued before admission.
        waited: Duration,
    },
    /// A call found every slot busy and joined the queue.
    CallQueued {
        /// Operation the queue belongs to.
        key: OperationKey,
        /// When the event occurred.
        timestamp: Instant,
        /// Queue depth, including this call.
        queue_depth: usize,
    },
    /// A call was turned away.
    CallRejected {
        /// Operation that rejected the call.
        key: OperationKey,
        /// When the event occurred.
        timestamp: Instant,
        /// Why the call was rejected.
        reason: RejectReason,
    },
    /// A slot was returned to the pool.
    SlotReleased {
        /// Operation the slot belongs to.
        key: OperationKey,
        /// When the event occurred.
        timestamp: Instant,
        /// How long the slot was held.
        held: Duration,
    },
}

impl ResilienceEvent for BulkheadEvent {
    fn event_type(&self) -> &'static str {
        match self {
            BulkheadEvent::CallPermitted { .. } => "call_permitted",
            BulkheadEvent::CallQueued { .. } => "call_queued",
            BulkheadEvent::CallRejected { .. } => "call_rejected",
            BulkheadEvent::SlotReleased { .. } => "slot_released",
        }
    }

    fn timestamp(&self) -> Instant {
        match self {
            BulkheadEvent::CallPermitted { timestamp, .. }
            | BulkheadEvent::CallQueued { timestamp, .. }
            | BulkheadEvent::CallRejected { timestamp, .. }
            | BulkheadEvent::SlotReleased { timestamp, .. } => *timestamp,
        }
    }

    fn key(&self) -> &OperationKey {
        match self {
            BulkheadEvent::CallPermitted { key, .. }
            | BulkheadEvent::CallQueued { key, .. }
            | BulkheadEvent::CallRejected { key, .. }
            | BulkheadEvent::SlotReleased { key, .. } => key,
        }
    }
}
