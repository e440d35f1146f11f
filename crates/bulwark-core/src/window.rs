//! Rolling outcome statistics.
//!
//! A [`RollingWindow`] is a ring of fixed-duration buckets. Outcomes are
//! counted into the bucket covering "now"; as the clock crosses bucket
//! boundaries the oldest buckets are zeroed and reused, so aggregates only
//! ever reflect the last `bucket_count * bucket_duration` of traffic.
//!
//! Rotation is lazy: it happens on the next read or write after a boundary
//! has been crossed, and rotates out exactly as many buckets as the elapsed
//! time demands.
//!
//! [`MetricsWindow`] keeps one rolling window per [`OperationKey`].
//!
//! ```
//! use bulwark_core::{CallOutcome, MetricsWindow, WindowConfig};
//! use std::time::Duration;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let windows = MetricsWindow::new(WindowConfig::new(5, Duration::from_secs(3)).unwrap());
//! windows.record(&"organization-lookup".into(), CallOutcome::Success);
//! windows.record(&"organization-lookup".into(), CallOutcome::Timeout);
//!
//! let snapshot = windows.snapshot(&"organization-lookup".into());
//! assert_eq!(snapshot.total, 2);
//! assert_eq!(snapshot.error_rate, 0.5);
//! # }
//! ```

use crate::error::ConfigError;
use crate::key::OperationKey;
use crate::outcome::CallOutcome;
use crate::registry::KeyedRegistry;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::time::Instant;

/// Shape of a rolling window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowConfig {
    bucket_count: usize,
    bucket_duration: Duration,
}

impl WindowConfig {
    /// Creates a window of `bucket_count` buckets, each `bucket_duration` long.
    pub fn new(bucket_count: usize, bucket_duration: Duration) -> Result<Self, ConfigError> {
        if bucket_count == 0 {
            return Err(ConfigError::invalid("bucket_count", "must be at least 1"));
        }
        if bucket_duration.is_zero() {
            return Err(ConfigError::invalid("bucket_duration", "must be non-zero"));
        }
        Ok(Self {
            bucket_count,
            bucket_duration,
        })
    }

    /// Number of buckets in the ring.
    pub fn bucket_count(&self) -> usize {
        self.bucket_count
    }

    /// Length of one bucket.
    pub fn bucket_duration(&self) -> Duration {
        self.bucket_duration
    }

    /// Total span covered by the window.
    pub fn window_duration(&self) -> Duration {
        self.bucket_duration * self.bucket_count as u32
    }
}

impl Default for WindowConfig {
    /// Ten one-second buckets.
    fn default() -> Self {
        Self {
            bucket_count: 10,
            bucket_duration: Duration::from_secs(1),
        }
    }
}

/// Counters for one slice of the window.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Bucket {
    /// Calls that completed successfully.
    pub success: u64,
    /// Calls that returned an error.
    pub failure: u64,
    /// Calls that ran past their deadline.
    pub timeout: u64,
    /// Calls rejected by the breaker or the bulkhead.
    pub rejection: u64,
}

impl Bucket {
    fn record(&mut self, outcome: CallOutcome) {
        match outcome {
            CallOutcome::Success => self.success += 1,
            CallOutcome::Failure => self.failure += 1,
            CallOutcome::Timeout => self.timeout += 1,
            CallOutcome::Rejected(_) => self.rejection += 1,
        }
    }

    fn total(&self) -> u64 {
        self.success + self.failure + self.timeout + self.rejection
    }
}

/// Aggregate view over every live bucket of a window.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct WindowSnapshot {
    /// Number of outcomes in the window.
    pub total: u64,
    /// Successful outcomes.
    pub success: u64,
    /// Failed outcomes.
    pub failure: u64,
    /// Timed-out outcomes.
    pub timeout: u64,
    /// Rejected outcomes.
    pub rejection: u64,
    /// `(failure + timeout + rejection) / total`, or 0 for an empty window.
    pub error_rate: f64,
    /// `timeout / total`, or 0 for an empty window.
    pub timeout_rate: f64,
}

impl WindowSnapshot {
    fn from_buckets<'a>(buckets: impl Iterator<Item = &'a Bucket>) -> Self {
        let sum = buckets.fold(Bucket::default(), |mut acc, b| {
            acc.success += b.success;
            acc.failure += b.failure;
            acc.timeout += b.timeout;
            acc.rejection += b.rejection;
            acc
        });
        let total = sum.total();
        let (error_rate, timeout_rate) = if total == 0 {
            (0.0, 0.0)
        } else {
            let errors = sum.failure + sum.timeout + sum.rejection;
            (errors as f64 / total as f64, sum.timeout as f64 / total as f64)
        };
        Self {
            total,
            success: sum.success,
            failure: sum.failure,
            timeout: sum.timeout,
            rejection: sum.rejection,
            error_rate,
            timeout_rate,
        }
    }

    /// Number of outcomes that count against the error rate.
    pub fn error_count(&self) -> u64 {
        self.failure + self.timeout + self.rejection
    }
}

/// A ring of time buckets for a single key.
#[derive(Debug)]
pub struct RollingWindow {
    config: WindowConfig,
    buckets: Vec<Bucket>,
    /// Index of the bucket receiving new outcomes.
    head: usize,
    /// Instant the window's bucket grid is aligned to.
    origin: Instant,
    /// Number of whole bucket durations between `origin` and the head bucket.
    head_epoch: u64,
}

impl RollingWindow {
    /// Creates an empty window aligned to the current instant.
    pub fn new(config: WindowConfig) -> Self {
        Self::starting_at(config, Instant::now())
    }

    /// Creates an empty window aligned to `origin`.
    pub fn starting_at(config: WindowConfig, origin: Instant) -> Self {
        Self {
            config,
            buckets: vec![Bucket::default(); config.bucket_count],
            head: 0,
            origin,
            head_epoch: 0,
        }
    }

    /// The window's shape.
    pub fn config(&self) -> WindowConfig {
        self.config
    }

    /// Counts `outcome` into the bucket covering `now`.
    pub fn record_at(&mut self, outcome: CallOutcome, now: Instant) {
        self.rotate(now);
        self.buckets[self.head].record(outcome);
    }

    /// Counts `outcome` into the current bucket.
    pub fn record(&mut self, outcome: CallOutcome) {
        self.record_at(outcome, Instant::now());
    }

    /// Aggregates every bucket still inside the window at `now`.
    pub fn snapshot_at(&mut self, now: Instant) -> WindowSnapshot {
        self.rotate(now);
        WindowSnapshot::from_buckets(self.buckets.iter())
    }

    /// Aggregates every bucket still inside the window.
    pub fn snapshot(&mut self) -> WindowSnapshot {
        self.snapshot_at(Instant::now())
    }

    /// Zeroes every bucket and re-aligns the grid to `now`.
    pub fn reset_at(&mut self, now: Instant) {
        self.buckets.iter_mut().for_each(|b| *b = Bucket::default());
        self.head = 0;
        self.origin = now;
        self.head_epoch = 0;
    }

    /// Zeroes every bucket.
    pub fn reset(&mut self) {
        self.reset_at(Instant::now());
    }

    /// Buckets from oldest to newest.
    pub fn buckets(&self) -> impl Iterator<Item = &Bucket> {
        let n = self.buckets.len();
        (1..=n).map(move |offset| &self.buckets[(self.head + offset) % n])
    }

    fn epoch_of(&self, now: Instant) -> u64 {
        let elapsed = now.saturating_duration_since(self.origin);
        (elapsed.as_nanos() / self.config.bucket_duration.as_nanos()) as u64
    }

    fn rotate(&mut self, now: Instant) {
        let epoch = self.epoch_of(now);
        if epoch <= self.head_epoch {
            return;
        }
        let n = self.buckets.len();
        let steps = (epoch - self.head_epoch).min(n as u64) as usize;
        for _ in 0..steps {
            self.head = (self.head + 1) % n;
            self.buckets[self.head] = Bucket::default();
        }
        self.head_epoch = epoch;
    }
}

/// One [`RollingWindow`] per operation key.
///
/// Each key's window sits behind its own lock, so recording on one key never
/// contends with another.
#[derive(Debug)]
pub struct MetricsWindow {
    default_config: WindowConfig,
    windows: KeyedRegistry<Mutex<RollingWindow>>,
}

impl MetricsWindow {
    /// Creates an empty set of windows; keys without an explicit shape use
    /// `default_config`.
    pub fn new(default_config: WindowConfig) -> Self {
        Self {
            default_config,
            windows: KeyedRegistry::new(),
        }
    }

    /// Returns the shared window for `key`, creating it with the default shape.
    pub fn window(&self, key: &OperationKey) -> Arc<Mutex<RollingWindow>> {
        let config = self.default_config;
        self.windows
            .get_or_insert_with(key, |_| Mutex::new(RollingWindow::new(config)))
    }

    /// Returns the shared window for `key`, creating it with `config` if absent.
    pub fn window_with(&self, key: &OperationKey, config: WindowConfig) -> Arc<Mutex<RollingWindow>> {
        self.windows
            .get_or_insert_with(key, |_| Mutex::new(RollingWindow::new(config)))
    }

    /// Appends one outcome to the current bucket of `key`.
    pub fn record(&self, key: &OperationKey, outcome: CallOutcome) {
        let window = self.window(key);
        lock(&window).record(outcome);
    }

    /// Aggregates the live buckets of `key`.
    pub fn snapshot(&self, key: &OperationKey) -> WindowSnapshot {
        match self.windows.get(key.as_str()) {
            Some(window) => lock(&window).snapshot(),
            None => WindowSnapshot::default(),
        }
    }

    /// Clears the counters of `key`.
    pub fn reset(&self, key: &OperationKey) {
        if let Some(window) = self.windows.get(key.as_str()) {
            lock(&window).reset();
        }
    }

    /// Forgets every key.
    pub fn clear(&self) {
        self.windows.clear();
    }

    /// Keys that have a window.
    pub fn keys(&self) -> Vec<OperationKey> {
        self.windows.keys()
    }
}

impl Default for MetricsWindow {
    fn default() -> Self {
        Self::new(WindowConfig::default())
    }
}

/// Locks a window, recovering the data from a poisoned lock.
///
/// Window updates are plain counter arithmetic and never leave the ring in a
/// torn state, so the contents stay valid after a panic elsewhere.
pub fn lock(window: &Mutex<RollingWindow>) -> std::sync::MutexGuard<'_, RollingWindow> {
    window.lock().unwrap_or_else(PoisonError::into_inner)
}
