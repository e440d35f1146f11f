//! Error taxonomy shared across bulwark crates.
//!
//! [`ResilienceError`] names every way a protected invocation can go wrong.
//! The executor recovers the first four variants locally by dispatching to
//! the key's fallback; only [`ResilienceError::FallbackFailed`] ever reaches
//! the caller of `invoke`. The individual protections (bulkhead, breaker,
//! fallback) return their own narrower errors, each of which converts into
//! `ResilienceError`.
//!
//! ```
//! use bulwark_core::{CallOutcome, FallbackFailure, ResilienceError};
//!
//! let err: ResilienceError<std::io::Error> = ResilienceError::FallbackFailed {
//!     key: "organization-lookup".into(),
//!     outcome: CallOutcome::Timeout,
//!     call_error: None,
//!     source: FallbackFailure::NotRegistered,
//! };
//! assert!(err.is_fallback_failed());
//! assert_eq!(err.outcome(), CallOutcome::Timeout);
//! ```

use crate::key::OperationKey;
use crate::outcome::{CallOutcome, Rejection};
use std::time::Duration;

/// Boxed error used for type-erased fallback and client failures.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Everything that can happen to a protected invocation besides success.
#[derive(Debug, thiserror::Error)]
pub enum ResilienceError<E> {
    /// The protected call returned an error.
    #[error("protected call failed: {0}")]
    CallFailure(E),

    /// The protected call did not finish before its deadline.
    #[error("protected call exceeded its {timeout:?} deadline")]
    CallTimeout {
        /// Time budget the call had.
        timeout: Duration,
    },

    /// The circuit breaker refused the call.
    #[error("circuit breaker '{key}' is open")]
    BreakerOpen {
        /// Operation whose breaker is open.
        key: OperationKey,
    },

    /// The bulkhead had no slot and could not queue the call.
    #[error("bulkhead '{key}' rejected the call (max {max_concurrent} concurrent, {max_queue_depth} queued)")]
    BulkheadFull {
        /// Operation whose bulkhead is saturated.
        key: OperationKey,
        /// Configured concurrency limit.
        max_concurrent: usize,
        /// Configured queue depth.
        max_queue_depth: usize,
    },

    /// The call did not succeed and no fallback could stand in for it.
    #[error("fallback for '{key}' failed after {outcome}: {source}")]
    FallbackFailed {
        /// Operation whose fallback failed.
        key: OperationKey,
        /// How the protected call ended.
        outcome: CallOutcome,
        /// The protected call's own error, when the outcome was a failure.
        call_error: Option<E>,
        /// Why the fallback could not produce a value.
        #[source]
        source: FallbackFailure,
    },
}

impl<E> ResilienceError<E> {
    /// Returns `true` for [`ResilienceError::CallFailure`].
    pub fn is_call_failure(&self) -> bool {
        matches!(self, ResilienceError::CallFailure(_))
    }

    /// Returns `true` for [`ResilienceError::CallTimeout`].
    pub fn is_timeout(&self) -> bool {
        matches!(self, ResilienceError::CallTimeout { .. })
    }

    /// Returns `true` for [`ResilienceError::BreakerOpen`].
    pub fn is_breaker_open(&self) -> bool {
        matches!(self, ResilienceError::BreakerOpen { .. })
    }

    /// Returns `true` for [`ResilienceError::BulkheadFull`].
    pub fn is_bulkhead_full(&self) -> bool {
        matches!(self, ResilienceError::BulkheadFull { .. })
    }

    /// Returns `true` for [`ResilienceError::FallbackFailed`].
    pub fn is_fallback_failed(&self) -> bool {
        matches!(self, ResilienceError::FallbackFailed { .. })
    }

    /// The outcome this error corresponds to.
    pub fn outcome(&self) -> CallOutcome {
        match self {
            ResilienceError::CallFailure(_) => CallOutcome::Failure,
            ResilienceError::CallTimeout { .. } => CallOutcome::Timeout,
            ResilienceError::BreakerOpen { .. } => CallOutcome::Rejected(Rejection::ByBreaker),
            ResilienceError::BulkheadFull { .. } => CallOutcome::Rejected(Rejection::ByBulkhead),
            ResilienceError::FallbackFailed { outcome, .. } => *outcome,
        }
    }

    /// Consumes the error, returning the protected call's own error if any.
    pub fn into_call_error(self) -> Option<E> {
        match self {
            ResilienceError::CallFailure(e) => Some(e),
            ResilienceError::FallbackFailed { call_error, .. } => call_error,
            _ => None,
        }
    }

    /// Wraps this error as the trigger of a failed fallback.
    pub fn into_fallback_failed(self, key: OperationKey, source: FallbackFailure) -> Self {
        let outcome = self.outcome();
        ResilienceError::FallbackFailed {
            key,
            outcome,
            call_error: self.into_call_error(),
            source,
        }
    }

    /// Maps the protected call's error type.
    pub fn map_call_error<F, T>(self, f: F) -> ResilienceError<T>
    where
        F: FnOnce(E) -> T,
    {
        match self {
            ResilienceError::CallFailure(e) => ResilienceError::CallFailure(f(e)),
            ResilienceError::CallTimeout { timeout } => ResilienceError::CallTimeout { timeout },
            ResilienceError::BreakerOpen { key } => ResilienceError::BreakerOpen { key },
            ResilienceError::BulkheadFull {
                key,
                max_concurrent,
                max_queue_depth,
            } => ResilienceError::BulkheadFull {
                key,
                max_concurrent,
                max_queue_depth,
            },
            ResilienceError::FallbackFailed {
                key,
                outcome,
                call_error,
                source,
            } => ResilienceError::FallbackFailed {
                key,
                outcome,
                call_error: call_error.map(f),
                source,
            },
        }
    }
}

/// Why a fallback could not produce a value.
#[derive(Debug, thiserror::Error)]
pub enum FallbackFailure {
    /// No fallback is registered for the key.
    #[error("no fallback registered")]
    NotRegistered,

    /// A fallback is registered, but for different request/response types.
    #[error("registered fallback expects {expected}")]
    TypeMismatch {
        /// Signature of the registered fallback.
        expected: &'static str,
    },

    /// The fallback itself returned an error.
    #[error("fallback returned an error: {0}")]
    Failed(#[source] BoxError),
}

/// Invalid configuration values.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// A field is out of range.
    #[error("invalid {field}: {reason}")]
    Invalid {
        /// Name of the offending field.
        field: &'static str,
        /// What is wrong with it.
        reason: String,
    },

    /// The same operation key was configured twice.
    #[error("operation '{0}' is configured more than once")]
    DuplicateKey(OperationKey),
}

impl ConfigError {
    /// Shorthand for [`ConfigError::Invalid`].
    pub fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        ConfigError::Invalid {
            field,
            reason: reason.into(),
        }
    }
}
