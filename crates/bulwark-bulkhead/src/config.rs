//! Configuration for bulkhead pools.

use crate::events::BulkheadEvent;
use crate::pool::BulkheadPool;
use bulwark_core::events::{EventListeners, FnListener};
use bulwark_core::{ConfigError, OperationKey};
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::Semaphore;

/// Sizing of one key's bulkhead. Fixed once the key's pool exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PoolConfig {
    /// Calls allowed to run at the same time.
    pub max_concurrent: usize,
    /// Calls allowed to wait for a slot once all slots are busy.
    pub max_queue_depth: usize,
}

impl PoolConfig {
    /// Creates a validated pool configuration.
    pub fn new(max_concurrent: usize, max_queue_depth: usize) -> Result<Self, ConfigError> {
        let config = Self {
            max_concurrent,
            max_queue_depth,
        };
        config.validate()?;
        Ok(config)
    }

    /// Checks the limits are usable.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_concurrent == 0 {
            return Err(ConfigError::invalid("max_concurrent", "must be at least 1"));
        }
        if self.max_concurrent > Semaphore::MAX_PERMITS {
            return Err(ConfigError::invalid(
                "max_concurrent",
                format!("must not exceed {}", Semaphore::MAX_PERMITS),
            ));
        }
        Ok(())
    }
}

impl Default for PoolConfig {
    /// Ten concurrent calls, no queueing.
    fn default() -> Self {
        Self {
            max_concurrent: 10,
            max_queue_depth: 0,
        }
    }
}

/// Builder for a [`BulkheadPool`].
pub struct BulkheadPoolBuilder {
    default_config: PoolConfig,
    overrides: HashMap<OperationKey, PoolConfig>,
    event_listeners: EventListeners<BulkheadEvent>,
}

impl BulkheadPoolBuilder {
    /// Creates a builder with default values.
    pub fn new() -> Self {
        Self {
            default_config: PoolConfig::default(),
            overrides: HashMap::new(),
            event_listeners: EventListeners::new(),
        }
    }

    /// Sizing used for keys without an explicit entry.
    ///
    /// Default: 10 concurrent, queue depth 0
    pub fn default_config(mut self, config: PoolConfig) -> Self {
        self.default_config = config;
        self
    }

    /// Sizing for one key.
    pub fn pool(mut self, key: impl Into<OperationKey>, config: PoolConfig) -> Self {
        self.overrides.insert(key.into(), config);
        self
    }

    /// Registers a callback when a call obtains a slot.
    ///
    /// # Callback Signature
    /// `Fn(&OperationKey, usize, Duration)`: the key, the number of calls in
    /// flight after admission, and how long the call waited in the queue.
    pub fn on_call_permitted<F>(mut self, f: F) -> Self
    where
        F: Fn(&OperationKey, usize, Duration) + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(move |event: &BulkheadEvent| {
            if let BulkheadEvent::CallPermitted {
                key,
                in_flight,
                waited,
                ..
            } = event
            {
                f(key, *in_flight, *waited);
            }
        }));
        self
    }

    /// Registers a callback when a call has to wait for a slot.
    ///
    /// # Callback Signature
    /// `Fn(&OperationKey, usize)`: the key and the queue depth including
    /// this call.
    pub fn on_call_queued<F>(mut self, f: F) -> Self
    where
        F: Fn(&OperationKey, usize) + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(move |event: &BulkheadEvent| {
            if let BulkheadEvent::CallQueued {
                key, queue_depth, ..
            } = event
            {
                f(key, *queue_depth);
            }
        }));
        self
    }

    /// Registers a callback when a call is turned away.
    ///
    /// # Callback Signature
    /// `Fn(&OperationKey, RejectReason)`.
    ///
    /// # Example
    /// ```rust
    /// use bulwark_bulkhead::{BulkheadPool, RejectReason};
    /// use std::sync::atomic::{AtomicUsize, Ordering};
    /// use std::sync::Arc;
    ///
    /// let rejected = Arc::new(AtomicUsize::new(0));
    /// let counter = Arc::clone(&rejected);
    ///
    /// let pool = BulkheadPool::builder()
    ///     .on_call_rejected(move |key, reason| {
    ///         counter.fetch_add(1, Ordering::SeqCst);
    ///         if reason == RejectReason::QueueTimeout {
    ///             println!("{key}: gave up waiting for a slot");
    ///         }
    ///     })
    ///     .build();
    /// ```
    pub fn on_call_rejected<F>(mut self, f: F) -> Self
    where
        F: Fn(&OperationKey, crate::RejectReason) + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(move |event: &BulkheadEvent| {
            if let BulkheadEvent::CallRejected { key, reason, .. } = event {
                f(key, *reason);
            }
        }));
        self
    }

    /// Registers a callback when a slot is returned.
    ///
    /// # Callback Signature
    /// `Fn(&OperationKey, Duration)`: the key and how long the slot was held.
    pub fn on_slot_released<F>(mut self, f: F) -> Self
    where
        F: Fn(&OperationKey, Duration) + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(move |event: &BulkheadEvent| {
            if let BulkheadEvent::SlotReleased { key, held, .. } = event {
                f(key, *held);
            }
        }));
        self
    }

    /// Validates every sizing and builds the pool.
    pub fn try_build(self) -> Result<BulkheadPool, ConfigError> {
        self.default_config.validate()?;
        for config in self.overrides.values() {
            config.validate()?;
        }
        Ok(BulkheadPool::new(
            self.default_config,
            self.overrides,
            self.event_listeners,
        ))
    }

    /// Builds the pool.
    ///
    /// # Panics
    ///
    /// Panics if any configured sizing is invalid; use
    /// [`try_build`](Self::try_build) to handle that as an error.
    pub fn build(self) -> BulkheadPool {
        match self.try_build() {
            Ok(pool) => pool,
            Err(e) => panic!("invalid bulkhead configuration: {e}"),
        }
    }
}

impl Default for BulkheadPoolBuilder {
    fn default() -> Self {
        Self::new()
    }
}
