use crate::config::CircuitBreakerConfig;
use crate::error::CircuitOpen;
use crate::events::CircuitBreakerEvent;
use bulwark_core::window::{lock, RollingWindow};
use bulwark_core::{CallOutcome, EventListeners, OperationKey, Rejection, WindowSnapshot};
#[cfg(feature = "metrics")]
use metrics::{counter, gauge};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::time::Instant;

/// Represents the state of the circuit breaker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum CircuitState {
    /// The circuit is closed and calls are allowed.
    Closed = 0,
    /// The circuit is open and calls are rejected.
    Open = 1,
    /// The circuit is half-open and a single probe call is allowed.
    HalfOpen = 2,
}

impl CircuitState {
    pub(crate) fn from_u8(value: u8) -> Self {
        match value {
            1 => CircuitState::Open,
            2 => CircuitState::HalfOpen,
            _ => CircuitState::Closed,
        }
    }

    /// Label used in logs and metrics.
    pub fn as_str(&self) -> &'static str {
        match self {
            CircuitState::Closed => "Closed",
            CircuitState::Open => "Open",
            CircuitState::HalfOpen => "HalfOpen",
        }
    }
}

/// Snapshot of one key's breaker.
#[derive(Debug, Clone, PartialEq)]
pub struct CircuitMetrics {
    /// Current state of the breaker.
    pub state: CircuitState,
    /// Aggregate of the live buckets of the key's window.
    pub window: WindowSnapshot,
    /// Time since the last state transition.
    pub time_since_state_change: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum PermitKind {
    Normal,
    Probe { generation: u64 },
}

#[derive(Debug)]
struct CircuitInner {
    state: CircuitState,
    opened_at: Instant,
    last_state_change: Instant,
    probe_in_flight: bool,
    /// Bumped on every transition so a stale probe cannot resolve a newer
    /// half-open episode.
    generation: u64,
}

/// The breaker of a single operation key.
///
/// Lock order is always `inner` then `window`.
pub(crate) struct Circuit {
    key: OperationKey,
    config: CircuitBreakerConfig,
    state_atomic: AtomicU8,
    inner: Mutex<CircuitInner>,
    window: Arc<Mutex<RollingWindow>>,
    listeners: Arc<EventListeners<CircuitBreakerEvent>>,
}

impl Circuit {
    pub(crate) fn new(
        key: OperationKey,
        config: CircuitBreakerConfig,
        window: Arc<Mutex<RollingWindow>>,
        listeners: Arc<EventListeners<CircuitBreakerEvent>>,
    ) -> Self {
        let now = Instant::now();
        Self {
            key,
            config,
            state_atomic: AtomicU8::new(CircuitState::Closed as u8),
            inner: Mutex::new(CircuitInner {
                state: CircuitState::Closed,
                opened_at: now,
                last_state_change: now,
                probe_in_flight: false,
                generation: 0,
            }),
            window,
            listeners,
        }
    }

    pub(crate) fn key(&self) -> &OperationKey {
        &self.key
    }

    pub(crate) fn config(&self) -> CircuitBreakerConfig {
        self.config
    }

    /// Last state written by a transition. Lock-free.
    pub(crate) fn state(&self) -> CircuitState {
        CircuitState::from_u8(self.state_atomic.load(Ordering::Acquire))
    }

    fn lock_inner(&self) -> MutexGuard<'_, CircuitInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Decides whether a call may proceed, applying any transition that is due.
    pub(crate) fn try_acquire(&self) -> Result<PermitKind, CircuitOpen> {
        let now = Instant::now();
        let mut inner = self.lock_inner();

        match inner.state {
            CircuitState::Closed => {
                let snapshot = lock(&self.window).snapshot_at(now);
                if snapshot.total >= self.config.request_volume_threshold
                    && snapshot.error_rate >= self.config.error_threshold
                {
                    #[cfg(feature = "tracing")]
                    tracing::debug!(
                        key = %self.key,
                        total = snapshot.total,
                        error_rate = snapshot.error_rate,
                        "error threshold reached"
                    );
                    self.transition_to(&mut inner, CircuitState::Open, now);
                    return Err(self.reject(&inner, now));
                }
                self.permitted(inner.state);
                Ok(PermitKind::Normal)
            }
            CircuitState::Open => {
                if now.saturating_duration_since(inner.opened_at) >= self.config.sleep_window {
                    self.transition_to(&mut inner, CircuitState::HalfOpen, now);
                    Ok(self.grant_probe(&mut inner))
                } else {
                    Err(self.reject(&inner, now))
                }
            }
            CircuitState::HalfOpen => {
                if inner.probe_in_flight {
                    Err(self.reject(&inner, now))
                } else {
                    Ok(self.grant_probe(&mut inner))
                }
            }
        }
    }

    fn grant_probe(&self, inner: &mut CircuitInner) -> PermitKind {
        inner.probe_in_flight = true;
        self.permitted(inner.state);
        PermitKind::Probe {
            generation: inner.generation,
        }
    }

    fn permitted(&self, state: CircuitState) {
        self.listeners.emit(&CircuitBreakerEvent::CallPermitted {
            key: self.key.clone(),
            timestamp: std::time::Instant::now(),
            state,
        });
    }

    fn reject(&self, inner: &CircuitInner, now: Instant) -> CircuitOpen {
        let outcome = CallOutcome::Rejected(Rejection::ByBreaker);
        lock(&self.window).record_at(outcome, now);

        self.listeners.emit(&CircuitBreakerEvent::CallRejected {
            key: self.key.clone(),
            timestamp: std::time::Instant::now(),
            state: inner.state,
        });

        #[cfg(feature = "metrics")]
        counter!(
            "circuitbreaker_calls_total",
            "circuitbreaker" => self.key.to_string(),
            "outcome" => outcome.as_str()
        )
        .increment(1);

        CircuitOpen {
            key: self.key.clone(),
            state: inner.state,
        }
    }

    /// Records the outcome of a permitted call and resolves a probe.
    pub(crate) fn on_complete(&self, kind: PermitKind, outcome: CallOutcome) {
        let now = Instant::now();
        let mut inner = self.lock_inner();
        lock(&self.window).record_at(outcome, now);

        self.listeners.emit(&CircuitBreakerEvent::OutcomeRecorded {
            key: self.key.clone(),
            timestamp: std::time::Instant::now(),
            outcome,
            state: inner.state,
        });

        #[cfg(feature = "metrics")]
        counter!(
            "circuitbreaker_calls_total",
            "circuitbreaker" => self.key.to_string(),
            "outcome" => outcome.as_str()
        )
        .increment(1);

        if let PermitKind::Probe { generation } = kind {
            if inner.state != CircuitState::HalfOpen || inner.generation != generation {
                return;
            }
            inner.probe_in_flight = false;
            if outcome.is_success() {
                self.transition_to(&mut inner, CircuitState::Closed, now);
                lock(&self.window).reset_at(now);
            } else {
                self.transition_to(&mut inner, CircuitState::Open, now);
            }
        }
    }

    pub(crate) fn force_open(&self) {
        let now = Instant::now();
        let mut inner = self.lock_inner();
        self.transition_to(&mut inner, CircuitState::Open, now);
        // Restart the cool-down even if already open.
        inner.opened_at = now;
    }

    pub(crate) fn force_closed(&self) {
        let now = Instant::now();
        let mut inner = self.lock_inner();
        self.transition_to(&mut inner, CircuitState::Closed, now);
        lock(&self.window).reset_at(now);
    }

    pub(crate) fn reset(&self) {
        self.force_closed();
    }

    pub(crate) fn metrics(&self) -> CircuitMetrics {
        let now = Instant::now();
        let inner = self.lock_inner();
        let window = lock(&self.window).snapshot_at(now);
        CircuitMetrics {
            state: inner.state,
            window,
            time_since_state_change: now.saturating_duration_since(inner.last_state_change),
        }
    }

    fn transition_to(&self, inner: &mut CircuitInner, state: CircuitState, now: Instant) {
        if inner.state == state {
            return;
        }

        let from_state = inner.state;

        self.listeners.emit(&CircuitBreakerEvent::StateTransition {
            key: self.key.clone(),
            timestamp: std::time::Instant::now(),
            from_state,
            to_state: state,
        });

        #[cfg(feature = "tracing")]
        tracing::info!(key = %self.key, from = ?from_state, to = ?state, "Circuit state transition");

        #[cfg(feature = "metrics")]
        {
            counter!(
                "circuitbreaker_transitions_total",
                "circuitbreaker" => self.key.to_string(),
                "from" => from_state.as_str(),
                "to" => state.as_str()
            )
            .increment(1);

            gauge!("circuitbreaker_state", "circuitbreaker" => self.key.to_string())
                .set(state as u8 as f64);
        }

        inner.state = state;
        inner.last_state_change = now;
        inner.generation = inner.generation.wrapping_add(1);
        inner.probe_in_flight = false;
        if state == CircuitState::Open {
            inner.opened_at = now;
        }
        self.state_atomic.store(state as u8, Ordering::Release);
    }
}
