//! Events emitted by the fallback dispatcher.

use bulwark_core::{OperationKey, ResilienceEvent};
use std::time::Instant;

/// Events emitted by the fallback dispatcher.
#[derive(Debug, Clone)]
pub enum FallbackEvent {
    /// A fallback produced a response.
    Applied {
        /// Operation the fallback stood in for.
        key: OperationKey,
        /// When the event occurred.
        timestamp: Instant,
    },

    /// No usable fallback was registered for the key.
    Missing {
        /// Operation that had no fallback.
        key: OperationKey,
        /// When the event occurred.
        timestamp: Instant,
    },

    /// The fallback ran and returned an error.
    Failed {
        /// Operation whose fallback failed.
        key: OperationKey,
        /// When the event occurred.
        timestamp: Instant,
    },
}

impl ResilienceEvent for FallbackEvent {
    fn event_type(&self) -> &'static str {
        match self {
            Self::Applied { .. } => "applied",
            Self::Missing { .. } => "missing",
            Self::Failed { .. } => "failed",
        }
    }

    fn timestamp(&self) -> Instant {
        match self {
            Self::Applied { timestamp, .. }
            | Self::Missing { timestamp, .. }
            | Self::Failed { timestamp, .. } => *timestamp,
        }
    }

    fn key(&self) -> &OperationKey {
        match self {
            Self::Applied { key, .. } | Self::Missing { key, .. } | Self::Failed { key, .. } => key,
        }
    }
}
