//! Terminal outcomes of a protected invocation.

use std::fmt;

/// Which protection rejected a call before it ran.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Rejection {
    /// The circuit breaker refused the call.
    ByBreaker,
    /// The bulkhead had no free slot and no room (or time) to queue.
    ByBulkhead,
}

/// How one invocation ended.
///
/// Every invocation terminates in exactly one outcome. The outcome is what
/// gets recorded into the rolling window and what decides whether the
/// fallback runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum CallOutcome {
    /// The protected call completed with a value before its deadline.
    Success,
    /// The protected call returned an error before its deadline.
    Failure,
    /// The deadline elapsed before the protected call completed.
    Timeout,
    /// The call never ran.
    Rejected(Rejection),
}

impl CallOutcome {
    /// Returns `true` only for [`CallOutcome::Success`].
    pub fn is_success(&self) -> bool {
        matches!(self, CallOutcome::Success)
    }

    /// Returns `true` for every outcome that counts against the error rate.
    pub fn is_error(&self) -> bool {
        !self.is_success()
    }

    /// Returns `true` if the call was rejected without running.
    pub fn is_rejected(&self) -> bool {
        matches!(self, CallOutcome::Rejected(_))
    }

    /// Short label used for metrics and log fields.
    pub fn as_str(&self) -> &'static str {
        match self {
            CallOutcome::Success => "success",
            CallOutcome::Failure => "failure",
            CallOutcome::Timeout => "timeout",
            CallOutcome::Rejected(Rejection::ByBreaker) => "rejected_by_breaker",
            CallOutcome::Rejected(Rejection::ByBulkhead) => "rejected_by_bulkhead",
        }
    }
}

impl fmt::Display for CallOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
