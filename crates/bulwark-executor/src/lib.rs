//! Keyed resilient execution for bulwark.
//!
//! [`ResilientExecutor`] is the facade tying the other bulwark crates
//! together. For every `invoke(key, input, call)`:
//!
//! 1. the key's circuit breaker decides whether the call may proceed;
//! 2. the key's bulkhead admits, queues or rejects it;
//! 3. the call runs under the key's deadline and is dropped if it overruns;
//! 4. the bulkhead slot is released on every exit path;
//! 5. the single terminal [`CallOutcome`](bulwark_core::CallOutcome) is
//!    recorded, and anything but success is answered by the key's fallback.
//!
//! Each key is configured with a [`CommandConfig`]; keys without one use the
//! executor's default. [`ResilientLayer`] applies the same protection to any
//! `tower::Service`.
//!
//! # Feature Flags
//!
//! - `metrics`: enables metrics in every bulwark crate plus
//!   `executor_calls_total` and `executor_call_duration_seconds`
//! - `tracing`: debug logs for non-successful outcomes, warnings when no
//!   fallback can answer
//! - `serde`: (de)serialization of [`CommandConfig`] with millisecond
//!   durations

pub use bulwark_core::{CallOutcome, OperationKey, ResilienceError};
pub use config::{CommandConfig, CommandConfigBuilder};
pub use events::ExecutorEvent;
pub use executor::{ResilientExecutor, ResilientExecutorBuilder};
pub use layer::{ResilientLayer, ResilientService};

mod config;
mod events;
mod executor;
mod layer;
