//! Core infrastructure for bulwark.
//!
//! This crate provides the pieces every protection shares:
//! - [`OperationKey`]: the identity all per-call-site state is keyed by
//! - [`CallOutcome`]: the single terminal result of an invocation
//! - [`MetricsWindow`]: rolling, bucketed outcome statistics per key
//! - [`KeyedRegistry`]: atomic create-if-absent storage for per-key state
//! - the event system used for observability
//! - the [`ResilienceError`] taxonomy

pub mod error;
pub mod events;
pub mod key;
pub mod outcome;
pub mod registry;
pub mod window;

pub use error::{BoxError, ConfigError, FallbackFailure, ResilienceError};
pub use events::{EventListener, EventListeners, FnListener, ResilienceEvent};
pub use key::OperationKey;
pub use outcome::{CallOutcome, Rejection};
pub use registry::KeyedRegistry;
pub use window::{Bucket, MetricsWindow, RollingWindow, WindowConfig, WindowSnapshot};
