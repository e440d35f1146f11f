//! Per-key fallbacks for bulwark.
//!
//! When a protected call is rejected, times out or fails, the executor asks
//! the [`FallbackDispatcher`] for the key's [`Fallback`]: a cheap function
//! with the same request and response types as the protected call.
//!
//! ```rust
//! use bulwark_fallback::{Fallback, FallbackDispatcher};
//! use bulwark_core::FallbackFailure;
//!
//! let dispatcher = FallbackDispatcher::new();
//! dispatcher.register(
//!     "license-by-org",
//!     Fallback::from_fn(|org_id: String| vec![format!("placeholder for {org_id}")]),
//! );
//!
//! let licenses: Vec<String> = dispatcher
//!     .invoke(&"license-by-org".into(), "e254f8c-c442".to_string())
//!     .unwrap();
//! assert_eq!(licenses.len(), 1);
//!
//! let missing = dispatcher.invoke::<String, String>(&"organization-lookup".into(), String::new());
//! assert!(matches!(missing, Err(FallbackFailure::NotRegistered)));
//! ```
//!
//! # Feature Flags
//!
//! - `metrics`: `fallback_calls_total` by key and result
//! - `tracing`: logs fallback failures

pub use bulwark_core::FallbackFailure;
pub use dispatcher::{FallbackDispatcher, FallbackDispatcherBuilder};
pub use events::FallbackEvent;
pub use fallback::Fallback;

mod dispatcher;
mod events;
mod fallback;
