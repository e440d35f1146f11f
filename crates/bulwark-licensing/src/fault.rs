//! Injected latency for exercising timeouts and the circuit breaker.

use rand::Rng;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq)]
enum Schedule {
    Never,
    Probability(f64),
    EveryNth(u64),
}

/// Delays a fraction of calls to simulate a slow dependency.
///
/// A test hook only; the default injector never delays.
///
/// ```rust
/// use bulwark_licensing::FaultInjector;
/// use std::time::Duration;
///
/// let faults = FaultInjector::every_nth(3, Duration::from_secs(11));
/// let delayed: Vec<bool> = (0..6).map(|_| faults.next_delay().is_some()).collect();
/// assert_eq!(delayed, [false, false, true, false, false, true]);
/// ```
#[derive(Debug)]
pub struct FaultInjector {
    schedule: Schedule,
    delay: Duration,
    calls: AtomicU64,
}

impl FaultInjector {
    /// Never delays.
    pub fn none() -> Self {
        Self::new(Schedule::Never, Duration::ZERO)
    }

    /// Delays each call by `delay` with probability `probability`
    /// (clamped to `0.0..=1.0`).
    pub fn with_probability(probability: f64, delay: Duration) -> Self {
        let probability = if probability.is_nan() {
            0.0
        } else {
            probability.clamp(0.0, 1.0)
        };
        Self::new(Schedule::Probability(probability), delay)
    }

    /// Delays every `n`th call by `delay`. `n == 0` never delays.
    pub fn every_nth(n: u64, delay: Duration) -> Self {
        if n == 0 {
            return Self::none();
        }
        Self::new(Schedule::EveryNth(n), delay)
    }

    /// One call in three sleeps for eleven seconds, chosen at random.
    pub fn one_in_three() -> Self {
        Self::with_probability(1.0 / 3.0, Duration::from_secs(11))
    }

    fn new(schedule: Schedule, delay: Duration) -> Self {
        Self {
            schedule,
            delay,
            calls: AtomicU64::new(0),
        }
    }

    /// Decides whether the next call is delayed, and by how much.
    pub fn next_delay(&self) -> Option<Duration> {
        let call = self.calls.fetch_add(1, Ordering::Relaxed) + 1;
        let delayed = match self.schedule {
            Schedule::Never => false,
            Schedule::Probability(p) => rand::rng().random_bool(p),
            Schedule::EveryNth(n) => call % n == 0,
        };
        delayed.then_some(self.delay)
    }

    /// Sleeps if the next call is scheduled to be slow.
    pub async fn maybe_delay(&self) {
        if let Some(delay) = self.next_delay() {
            tracing::debug!(?delay, "injecting latency");
            tokio::time::sleep(delay).await;
        }
    }

    /// Calls seen so far.
    pub fn calls(&self) -> u64 {
        self.calls.load(Ordering::Relaxed)
    }
}

impl Default for FaultInjector {
    fn default() -> Self {
        Self::none()
    }
}
