//! Per-key bulkheads for bulwark.
//!
//! A bulkhead caps how many calls to one operation run at the same time and
//! how many may wait for a slot. Each [`OperationKey`] gets its own bulkhead,
//! so a slow dependency can exhaust only its own slots.
//!
//! Admission order for a key:
//!
//! 1. A free slot is taken immediately.
//! 2. Otherwise the call joins a FIFO queue if fewer than `max_queue_depth`
//!    calls are already waiting.
//! 3. Otherwise it is rejected with [`BulkheadError::BulkheadFull`].
//!
//! A queued call that has not obtained a slot by its deadline is rejected
//! with [`BulkheadError::QueueTimeout`]. Slots are returned when the
//! [`Slot`] guard drops, on every exit path.
//!
//! # Example
//!
//! ```rust
//! use bulwark_bulkhead::{BulkheadError, BulkheadPool, PoolConfig};
//! use std::time::Duration;
//! use tokio::time::Instant;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let pool = BulkheadPool::builder()
//!     .pool("license-by-org", PoolConfig::new(1, 0).unwrap())
//!     .on_call_rejected(|key, reason| println!("{key} rejected: {reason:?}"))
//!     .build();
//!
//! let key = "license-by-org".into();
//! let deadline = Instant::now() + Duration::from_secs(1);
//! let _slot = pool.try_acquire(&key, deadline).await.unwrap();
//!
//! match pool.try_acquire(&key, deadline).await {
//!     Err(BulkheadError::BulkheadFull { max_concurrent, .. }) => assert_eq!(max_concurrent, 1),
//!     other => panic!("unexpected: {other:?}"),
//! }
//! # }
//! ```
//!
//! # Feature Flags
//!
//! - `metrics`: in-flight, queue depth, rejection and wait-time metrics
//! - `tracing`: debug logs for rejections
//! - `serde`: (de)serialization of [`PoolConfig`]

pub use bulwark_core::OperationKey;
pub use config::{BulkheadPoolBuilder, PoolConfig};
pub use error::BulkheadError;
pub use events::{BulkheadEvent, RejectReason};
pub use pool::{Bulkhead, BulkheadMetrics, BulkheadPool, Slot};

mod config;
mod error;
mod events;
mod pool;
