//! Keyed bulkhead pools.

use crate::config::{BulkheadPoolBuilder, PoolConfig};
use crate::error::{BulkheadError, Result};
use crate::events::{BulkheadEvent, RejectReason};
use bulwark_core::events::EventListeners;
use bulwark_core::{KeyedRegistry, OperationKey};
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::time::Instant;

#[cfg(feature = "metrics")]
use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
#[cfg(feature = "metrics")]
use std::sync::Once;
#[cfg(feature = "tracing")]
use tracing::{debug, trace};

#[cfg(feature = "metrics")]
static METRICS_INIT: Once = Once::new();

#[cfg(feature = "metrics")]
pub(crate) fn describe_metrics() {
    METRICS_INIT.call_once(|| {
        describe_counter!(
            "bulkhead_calls_permitted_total",
            "Total number of calls that obtained a bulkhead slot"
        );
        describe_counter!(
            "bulkhead_calls_rejected_total",
            "Total number of calls rejected by a bulkhead"
        );
        describe_gauge!(
            "bulkhead_concurrent_calls",
            "Calls currently holding a bulkhead slot"
        );
        describe_gauge!("bulkhead_queue_depth", "Calls currently waiting for a slot");
        describe_histogram!(
            "bulkhead_wait_duration_seconds",
            "Time calls spent queued before obtaining a slot"
        );
    });
}

/// Point-in-time view of one key's bulkhead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BulkheadMetrics {
    /// Calls currently holding a slot.
    pub in_flight: usize,
    /// Calls currently waiting for a slot.
    pub queued: usize,
    /// Configured concurrency limit.
    pub max_concurrent: usize,
    /// Configured queue depth.
    pub max_queue_depth: usize,
}

/// The bulkhead of a single operation key.
///
/// Admission is strictly first-come first-served: a released slot is handed
/// to the longest-waiting queued call before any newcomer can take it.
pub struct Bulkhead {
    key: OperationKey,
    config: PoolConfig,
    semaphore: Arc<Semaphore>,
    queued: AtomicUsize,
    listeners: Arc<EventListeners<BulkheadEvent>>,
}

impl Bulkhead {
    fn new(
        key: OperationKey,
        config: PoolConfig,
        listeners: Arc<EventListeners<BulkheadEvent>>,
    ) -> Self {
        Self {
            key,
            semaphore: Arc::new(Semaphore::new(config.max_concurrent)),
            config,
            queued: AtomicUsize::new(0),
            listeners,
        }
    }

    /// The operation this bulkhead guards.
    pub fn key(&self) -> &OperationKey {
        &self.key
    }

    /// The bulkhead's sizing.
    pub fn config(&self) -> PoolConfig {
        self.config
    }

    /// Calls currently holding a slot.
    pub fn in_flight(&self) -> usize {
        self.config
            .max_concurrent
            .saturating_sub(self.semaphore.available_permits())
    }

    /// Calls currently waiting for a slot.
    pub fn queued(&self) -> usize {
        self.queued.load(Ordering::Acquire)
    }

    /// Current counters.
    pub fn metrics(&self) -> BulkheadMetrics {
        BulkheadMetrics {
            in_flight: self.in_flight(),
            queued: self.queued(),
            max_concurrent: self.config.max_concurrent,
            max_queue_depth: self.config.max_queue_depth,
        }
    }

    /// Obtains a slot, queueing until `deadline` if every slot is busy.
    ///
    /// Rejects immediately when the queue is also full.
    pub async fn acquire(self: &Arc<Self>, deadline: Instant) -> Result<Slot> {
        let started = Instant::now();

        // Permits released while others wait go straight to the waiters, so
        // this never overtakes a queued call.
        if let Ok(permit) = Arc::clone(&self.semaphore).try_acquire_owned() {
            return Ok(self.admit(permit, Duration::ZERO));
        }

        let max_depth = self.config.max_queue_depth;
        let reserved = self
            .queued
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |depth| {
                (depth < max_depth).then_some(depth + 1)
            });
        let depth = match reserved {
            Ok(previous) => previous + 1,
            Err(_) => return Err(self.reject(RejectReason::Full, Duration::ZERO)),
        };

        let queue_guard = QueueGuard { bulkhead: self };
        self.listeners.emit(&BulkheadEvent::CallQueued {
            key: self.key.clone(),
            timestamp: std::time::Instant::now(),
            queue_depth: depth,
        });
        #[cfg(feature = "metrics")]
        gauge!("bulkhead_queue_depth", "bulkhead" => self.key.to_string()).set(depth as f64);
        #[cfg(feature = "tracing")]
        trace!(key = %self.key, queue_depth = depth, "call queued for bulkhead slot");

        let acquired =
            tokio::time::timeout_at(deadline, Arc::clone(&self.semaphore).acquire_owned()).await;
        drop(queue_guard);

        let waited = started.elapsed();
        match acquired {
            Ok(Ok(permit)) => Ok(self.admit(permit, waited)),
            // The semaphore is never closed; treat it as saturation if it ever is.
            Ok(Err(_)) => Err(self.reject(RejectReason::Full, waited)),
            Err(_) => Err(self.reject(RejectReason::QueueTimeout, waited)),
        }
    }

    fn admit(self: &Arc<Self>, permit: OwnedSemaphorePermit, waited: Duration) -> Slot {
        let in_flight = self.in_flight();
        self.listeners.emit(&BulkheadEvent::CallPermitted {
            key: self.key.clone(),
            timestamp: std::time::Instant::now(),
            in_flight,
            waited,
        });

        #[cfg(feature = "metrics")]
        {
            describe_metrics();
            let label = self.key.to_string();
            counter!("bulkhead_calls_permitted_total", "bulkhead" => label.clone()).increment(1);
            gauge!("bulkhead_concurrent_calls", "bulkhead" => label.clone()).set(in_flight as f64);
            histogram!("bulkhead_wait_duration_seconds", "bulkhead" => label)
                .record(waited.as_secs_f64());
        }

        Slot {
            permit: Some(permit),
            bulkhead: Arc::clone(self),
            acquired_at: Instant::now(),
        }
    }

    fn reject(&self, reason: RejectReason, waited: Duration) -> BulkheadError {
        self.listeners.emit(&BulkheadEvent::CallRejected {
            key: self.key.clone(),
            timestamp: std::time::Instant::now(),
            reason,
        });

        #[cfg(feature = "metrics")]
        {
            describe_metrics();
            counter!(
                "bulkhead_calls_rejected_total",
                "bulkhead" => self.key.to_string(),
                "reason" => reason.as_str()
            )
            .increment(1);
        }

        #[cfg(feature = "tracing")]
        debug!(
            key = %self.key,
            reason = reason.as_str(),
            in_flight = self.in_flight(),
            queued = self.queued(),
            "bulkhead rejected call"
        );

        match reason {
            RejectReason::Full => BulkheadError::BulkheadFull {
                key: self.key.clone(),
                max_concurrent: self.config.max_concurrent,
                max_queue_depth: self.config.max_queue_depth,
            },
            RejectReason::QueueTimeout => BulkheadError::QueueTimeout {
                key: self.key.clone(),
                waited,
                max_concurrent: self.config.max_concurrent,
                max_queue_depth: self.config.max_queue_depth,
            },
        }
    }
}

impl fmt::Debug for Bulkhead {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Bulkhead")
            .field("key", &self.key)
            .field("config", &self.config)
            .field("in_flight", &self.in_flight())
            .field("queued", &self.queued())
            .finish()
    }
}

/// Gives back a queue reservation, including when the waiting future is dropped.
struct QueueGuard<'a> {
    bulkhead: &'a Bulkhead,
}

impl Drop for QueueGuard<'_> {
    fn drop(&mut self) {
        let _remaining = self.bulkhead.queued.fetch_sub(1, Ordering::AcqRel) - 1;
        #[cfg(feature = "metrics")]
        gauge!("bulkhead_queue_depth", "bulkhead" => self.bulkhead.key.to_string())
            .set(_remaining as f64);
    }
}

/// A held bulkhead slot. The slot is returned when this is dropped.
#[must_use = "the slot is released as soon as it is dropped"]
pub struct Slot {
    permit: Option<OwnedSemaphorePermit>,
    bulkhead: Arc<Bulkhead>,
    acquired_at: Instant,
}

impl Slot {
    /// The operation this slot belongs to.
    pub fn key(&self) -> &OperationKey {
        &self.bulkhead.key
    }

    /// How long the slot has been held.
    pub fn held(&self) -> Duration {
        self.acquired_at.elapsed()
    }

    /// Returns the slot to the pool.
    pub fn release(self) {
        drop(self);
    }
}

impl Drop for Slot {
    fn drop(&mut self) {
        let Some(permit) = self.permit.take() else {
            return;
        };
        drop(permit);

        let held = self.acquired_at.elapsed();
        self.bulkhead.listeners.emit(&BulkheadEvent::SlotReleased {
            key: self.bulkhead.key.clone(),
            timestamp: std::time::Instant::now(),
            held,
        });

        #[cfg(feature = "metrics")]
        gauge!("bulkhead_concurrent_calls", "bulkhead" => self.bulkhead.key.to_string())
            .set(self.bulkhead.in_flight() as f64);
    }
}

impl fmt::Debug for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Slot")
            .field("key", &self.bulkhead.key)
            .field("held", &self.held())
            .finish()
    }
}

/// One independent bulkhead per operation key.
///
/// Bulkheads are created on first use of a key, sized from the key's
/// explicit configuration or the pool default. Saturating one key never
/// affects admission on another.
///
/// # Example
///
/// ```rust
/// use bulwark_bulkhead::{BulkheadPool, PoolConfig};
/// use std::time::Duration;
/// use tokio::time::Instant;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let pool = BulkheadPool::builder()
///     .pool("organization-lookup", PoolConfig::new(2, 1).unwrap())
///     .build();
///
/// let deadline = Instant::now() + Duration::from_millis(500);
/// let slot = pool.try_acquire(&"organization-lookup".into(), deadline).await.unwrap();
/// assert_eq!(pool.metrics(&"organization-lookup".into()).in_flight, 1);
/// drop(slot);
/// assert_eq!(pool.metrics(&"organization-lookup".into()).in_flight, 0);
/// # }
/// ```
pub struct BulkheadPool {
    default_config: PoolConfig,
    overrides: HashMap<OperationKey, PoolConfig>,
    bulkheads: KeyedRegistry<Bulkhead>,
    listeners: Arc<EventListeners<BulkheadEvent>>,
}

impl BulkheadPool {
    /// Returns a builder for a pool.
    pub fn builder() -> BulkheadPoolBuilder {
        #[cfg(feature = "metrics")]
        describe_metrics();
        BulkheadPoolBuilder::new()
    }

    pub(crate) fn new(
        default_config: PoolConfig,
        overrides: HashMap<OperationKey, PoolConfig>,
        listeners: EventListeners<BulkheadEvent>,
    ) -> Self {
        Self {
            default_config,
            overrides,
            bulkheads: KeyedRegistry::new(),
            listeners: Arc::new(listeners),
        }
    }

    /// Sizing that applies to `key`.
    pub fn config_for(&self, key: &OperationKey) -> PoolConfig {
        self.overrides
            .get(key)
            .copied()
            .unwrap_or(self.default_config)
    }

    /// The bulkhead for `key`, created on first use.
    pub fn bulkhead(&self, key: &OperationKey) -> Arc<Bulkhead> {
        self.bulkheads.get_or_insert_with(key, |key| {
            Bulkhead::new(
                key.clone(),
                self.config_for(key),
                Arc::clone(&self.listeners),
            )
        })
    }

    /// Obtains a slot for `key`, waiting in its queue no later than `deadline`.
    pub async fn try_acquire(&self, key: &OperationKey, deadline: Instant) -> Result<Slot> {
        self.bulkhead(key).acquire(deadline).await
    }

    /// Current counters for `key`. Unknown keys report an idle bulkhead of
    /// the size they would get.
    pub fn metrics(&self, key: &OperationKey) -> BulkheadMetrics {
        match self.bulkheads.get(key.as_str()) {
            Some(bulkhead) => bulkhead.metrics(),
            None => {
                let config = self.config_for(key);
                BulkheadMetrics {
                    in_flight: 0,
                    queued: 0,
                    max_concurrent: config.max_concurrent,
                    max_queue_depth: config.max_queue_depth,
                }
            }
        }
    }

    /// Discards the bulkhead of `key`; the next call starts with a fresh one.
    ///
    /// Slots still held against the old bulkhead are released into it and
    /// do not count against the new one.
    pub fn reset(&self, key: &OperationKey) {
        self.bulkheads.remove(key.as_str());
    }

    /// Discards every bulkhead.
    pub fn clear(&self) {
        self.bulkheads.clear();
    }

    /// Keys with a live bulkhead.
    pub fn keys(&self) -> Vec<OperationKey> {
        self.bulkheads.keys()
    }
}

impl Default for BulkheadPool {
    fn default() -> Self {
        BulkheadPool::builder().build()
    }
}

impl fmt::Debug for BulkheadPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BulkheadPool")
            .field("default_config", &self.default_config)
            .field("overrides", &self.overrides)
            .field("bulkheads", &self.bulkheads)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    fn pool(max_concurrent: usize, max_queue_depth: usize) -> BulkheadPool {
        BulkheadPool::builder()
            .default_config(PoolConfig::new(max_concurrent, max_queue_depth).unwrap())
            .build()
    }

    fn key(name: &str) -> OperationKey {
        OperationKey::from(name)
    }

    #[tokio::test(start_paused = true)]
    async fn admits_queues_then_rejects() {
        let pool = Arc::new(pool(2, 1));
        let far = Instant::now() + Duration::from_secs(60);
        let k = key("organization-lookup");

        let first = pool.try_acquire(&k, far).await.unwrap();
        let _second = pool.try_acquire(&k, far).await.unwrap();

        let waiter = {
            let pool = Arc::clone(&pool);
            let k = k.clone();
            tokio::spawn(async move { pool.try_acquire(&k, far).await.map(|slot| slot.key().clone()) })
        };
        tokio::task::yield_now().await;
        assert_eq!(pool.metrics(&k).queued, 1);

        let fourth = pool.try_acquire(&k, far).await;
        assert!(matches!(fourth, Err(BulkheadError::BulkheadFull { .. })));

        drop(first);
        assert_eq!(waiter.await.unwrap().unwrap(), k);
        assert_eq!(pool.metrics(&k).queued, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn queued_calls_are_admitted_in_arrival_order() {
        let pool = Arc::new(pool(1, 3));
        let far = Instant::now() + Duration::from_secs(60);
        let k = key("license-by-org");
        let order = Arc::new(Mutex::new(Vec::new()));

        let held = pool.try_acquire(&k, far).await.unwrap();

        let mut waiters = Vec::new();
        for i in 0..3 {
            let pool = Arc::clone(&pool);
            let k = k.clone();
            let order = Arc::clone(&order);
            waiters.push(tokio::spawn(async move {
                let slot = pool.try_acquire(&k, far).await.unwrap();
                order.lock().unwrap().push(i);
                tokio::time::sleep(Duration::from_millis(10)).await;
                drop(slot);
            }));
            tokio::task::yield_now().await;
        }
        assert_eq!(pool.metrics(&k).queued, 3);

        drop(held);
        for waiter in waiters {
            waiter.await.unwrap();
        }
        assert_eq!(*order.lock().unwrap(), vec![0, 1, 2]);
    }

    #[tokio::test(start_paused = true)]
    async fn queue_wait_ends_at_deadline() {
        let pool = pool(1, 1);
        let k = key("organization-lookup");
        let _held = pool
            .try_acquire(&k, Instant::now() + Duration::from_secs(60))
            .await
            .unwrap();

        let start = Instant::now();
        let result = pool
            .try_acquire(&k, start + Duration::from_millis(250))
            .await;

        match result {
            Err(BulkheadError::QueueTimeout { waited, .. }) => {
                assert!(waited >= Duration::from_millis(250));
            }
            other => panic!("expected queue timeout, got {other:?}"),
        }
        assert_eq!(pool.metrics(&k).queued, 0);
        assert_eq!(pool.metrics(&k).in_flight, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn keys_are_isolated() {
        let pool = pool(1, 0);
        let far = Instant::now() + Duration::from_secs(60);

        let _a = pool.try_acquire(&key("a"), far).await.unwrap();
        assert!(pool.try_acquire(&key("a"), far).await.is_err());
        assert!(pool.try_acquire(&key("b"), far).await.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn overrides_apply_per_key() {
        let pool = BulkheadPool::builder()
            .pool("license-by-org", PoolConfig::new(30, 10).unwrap())
            .build();

        let metrics = pool.metrics(&key("license-by-org"));
        assert_eq!((metrics.max_concurrent, metrics.max_queue_depth), (30, 10));
        let metrics = pool.metrics(&key("anything-else"));
        assert_eq!((metrics.max_concurrent, metrics.max_queue_depth), (10, 0));
    }

    #[tokio::test(start_paused = true)]
    async fn dropped_waiter_frees_its_queue_place() {
        let pool = Arc::new(pool(1, 1));
        let far = Instant::now() + Duration::from_secs(60);
        let k = key("organization-lookup");
        let _held = pool.try_acquire(&k, far).await.unwrap();

        let waiter = {
            let pool = Arc::clone(&pool);
            let k = k.clone();
            tokio::spawn(async move {
                let _ = pool.try_acquire(&k, far).await;
            })
        };
        tokio::task::yield_now().await;
        assert_eq!(pool.metrics(&k).queued, 1);

        waiter.abort();
        let _ = waiter.await;
        assert_eq!(pool.metrics(&k).queued, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn events_follow_slot_lifecycle() {
        let events = Arc::new(Mutex::new(Vec::new()));
        let permitted = Arc::clone(&events);
        let released = Arc::clone(&events);
        let pool = BulkheadPool::builder()
            .default_config(PoolConfig::new(1, 0).unwrap())
            .on_call_permitted(move |_, in_flight, _| {
                permitted.lock().unwrap().push(format!("permitted:{in_flight}"));
            })
            .on_slot_released(move |_, held| {
                released.lock().unwrap().push(format!("released:{}", held.as_millis()));
            })
            .build();

        let slot = pool
            .try_acquire(&key("a"), Instant::now() + Duration::from_secs(1))
            .await
            .unwrap();
        tokio::time::advance(Duration::from_millis(40)).await;
        slot.release();

        assert_eq!(
            *events.lock().unwrap(),
            vec!["permitted:1".to_string(), "released:40".to_string()]
        );
    }
}
