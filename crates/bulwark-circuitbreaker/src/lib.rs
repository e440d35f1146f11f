//! Per-key circuit breakers for bulwark.
//!
//! Each [`OperationKey`] gets its own breaker, driven by the rolling bucketed
//! window of that key's outcomes:
//!
//! - **Closed**: calls flow. On each permission check, once the window holds
//!   at least `request_volume_threshold` calls and the error rate (failures,
//!   timeouts and rejections over total) reaches `error_threshold`, the
//!   breaker opens and refuses that check.
//! - **Open**: calls are refused immediately. After `sleep_window` the next
//!   check moves the breaker to half-open.
//! - **HalfOpen**: exactly one probe call is let through. A successful probe
//!   closes the breaker and clears the window; anything else reopens it with
//!   a fresh sleep window.
//!
//! A permitted call hands back its outcome through [`Permit::complete`]. A
//! probe permit dropped without an outcome counts as a failed probe, so a
//! cancelled caller can never leave the breaker stuck half-open.
//!
//! # Example
//!
//! ```rust
//! use bulwark_circuitbreaker::{CircuitBreaker, CircuitBreakerConfig, CircuitState};
//! use bulwark_core::{CallOutcome, WindowConfig};
//! use std::time::Duration;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let breaker = CircuitBreaker::builder()
//!     .breaker(
//!         "organization-lookup",
//!         CircuitBreakerConfig {
//!             request_volume_threshold: 10,
//!             error_threshold: 0.75,
//!             sleep_window: Duration::from_millis(7000),
//!             window: WindowConfig::new(5, Duration::from_secs(3)).unwrap(),
//!         },
//!     )
//!     .build();
//!
//! let key = "organization-lookup".into();
//! for _ in 0..10 {
//!     breaker.permit(&key).unwrap().complete(CallOutcome::Timeout);
//! }
//! assert!(breaker.permit(&key).is_err());
//! assert_eq!(breaker.state(&key), CircuitState::Open);
//! # }
//! ```
//!
//! # Feature Flags
//!
//! - `metrics`: call, transition and state metrics
//! - `tracing`: logs state transitions

use crate::circuit::{Circuit, PermitKind};
use bulwark_core::{
    CallOutcome, EventListeners, KeyedRegistry, MetricsWindow, OperationKey, WindowSnapshot,
};
#[cfg(feature = "metrics")]
use metrics::{describe_counter, describe_gauge};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
#[cfg(feature = "metrics")]
use std::sync::Once;

pub use circuit::{CircuitMetrics, CircuitState};
pub use config::{CircuitBreakerBuilder, CircuitBreakerConfig};
pub use error::CircuitOpen;
pub use events::CircuitBreakerEvent;

mod circuit;
mod config;
mod error;
mod events;

#[cfg(feature = "metrics")]
static METRICS_INIT: Once = Once::new();

/// One circuit breaker per operation key.
///
/// Breakers are created on first use of a key with that key's configuration,
/// or the default one. Keys never influence each other.
pub struct CircuitBreaker {
    default_config: CircuitBreakerConfig,
    overrides: HashMap<OperationKey, CircuitBreakerConfig>,
    circuits: KeyedRegistry<Circuit>,
    windows: MetricsWindow,
    listeners: Arc<EventListeners<CircuitBreakerEvent>>,
}

impl CircuitBreaker {
    /// Returns a builder.
    pub fn builder() -> CircuitBreakerBuilder {
        #[cfg(feature = "metrics")]
        {
            METRICS_INIT.call_once(|| {
                describe_counter!(
                    "circuitbreaker_calls_total",
                    "Total number of calls through the circuit breaker"
                );
                describe_counter!(
                    "circuitbreaker_transitions_total",
                    "Total number of circuit breaker state transitions"
                );
                describe_gauge!(
                    "circuitbreaker_state",
                    "Current state of the circuit breaker (0 closed, 1 open, 2 half-open)"
                );
            });
        }
        CircuitBreakerBuilder::new()
    }

    pub(crate) fn new(
        default_config: CircuitBreakerConfig,
        overrides: HashMap<OperationKey, CircuitBreakerConfig>,
        listeners: EventListeners<CircuitBreakerEvent>,
    ) -> Self {
        Self {
            windows: MetricsWindow::new(default_config.window),
            default_config,
            overrides,
            circuits: KeyedRegistry::new(),
            listeners: Arc::new(listeners),
        }
    }

    /// Configuration that applies to `key`.
    pub fn config_for(&self, key: &OperationKey) -> CircuitBreakerConfig {
        self.overrides
            .get(key)
            .copied()
            .unwrap_or(self.default_config)
    }

    fn circuit(&self, key: &OperationKey) -> Arc<Circuit> {
        self.circuits.get_or_insert_with(key, |key| {
            let config = self.config_for(key);
            Circuit::new(
                key.clone(),
                config,
                self.windows.window_with(key, config.window),
                Arc::clone(&self.listeners),
            )
        })
    }

    /// Asks whether a call for `key` may proceed.
    ///
    /// A refusal is itself recorded as a `Rejected(ByBreaker)` outcome.
    pub fn permit(&self, key: &OperationKey) -> Result<Permit, CircuitOpen> {
        let circuit = self.circuit(key);
        let kind = circuit.try_acquire()?;
        Ok(Permit {
            circuit,
            kind,
            resolved: false,
        })
    }

    /// Current state of `key`'s breaker; `Closed` for keys never used.
    ///
    /// An open breaker whose sleep window has elapsed still reports `Open`
    /// until the next permission check moves it on.
    pub fn state(&self, key: &OperationKey) -> CircuitState {
        self.circuits
            .get(key.as_str())
            .map_or(CircuitState::Closed, |c| c.state())
    }

    /// Opens `key`'s breaker and restarts its sleep window.
    pub fn force_open(&self, key: &OperationKey) {
        self.circuit(key).force_open();
    }

    /// Closes `key`'s breaker and clears its window.
    pub fn force_closed(&self, key: &OperationKey) {
        self.circuit(key).force_closed();
    }

    /// Returns `key`'s breaker to a fresh closed state.
    pub fn reset(&self, key: &OperationKey) {
        if let Some(circuit) = self.circuits.get(key.as_str()) {
            circuit.reset();
        }
    }

    /// Resets every known breaker.
    pub fn reset_all(&self) {
        for key in self.circuits.keys() {
            self.reset(&key);
        }
    }

    /// Aggregate of `key`'s rolling window.
    pub fn snapshot(&self, key: &OperationKey) -> WindowSnapshot {
        self.windows.snapshot(key)
    }

    /// State and window of `key`'s breaker.
    pub fn metrics(&self, key: &OperationKey) -> CircuitMetrics {
        match self.circuits.get(key.as_str()) {
            Some(circuit) => circuit.metrics(),
            None => CircuitMetrics {
                state: CircuitState::Closed,
                window: WindowSnapshot::default(),
                time_since_state_change: std::time::Duration::ZERO,
            },
        }
    }

    /// Keys with a breaker.
    pub fn keys(&self) -> Vec<OperationKey> {
        self.circuits.keys()
    }
}

impl Default for CircuitBreaker {
    fn default() -> Self {
        CircuitBreaker::builder().build()
    }
}

impl fmt::Debug for CircuitBreaker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CircuitBreaker")
            .field("default_config", &self.default_config)
            .field("keys", &self.circuits.keys())
            .finish()
    }
}

/// Permission for one call to proceed.
///
/// Report how the call ended with [`complete`](Self::complete).
#[must_use = "a permit must be completed with the call's outcome"]
pub struct Permit {
    circuit: Arc<Circuit>,
    kind: PermitKind,
    resolved: bool,
}

impl Permit {
    /// The operation this permit belongs to.
    pub fn key(&self) -> &OperationKey {
        self.circuit.key()
    }

    /// Returns `true` if this permit is the half-open probe.
    pub fn is_probe(&self) -> bool {
        matches!(self.kind, PermitKind::Probe { .. })
    }

    /// Records the call's outcome and resolves the probe, if this is one.
    pub fn complete(mut self, outcome: CallOutcome) {
        self.resolved = true;
        self.circuit.on_complete(self.kind, outcome);
    }
}

impl Drop for Permit {
    fn drop(&mut self) {
        if self.resolved || !self.is_probe() {
            return;
        }
        #[cfg(feature = "tracing")]
        tracing::debug!(key = %self.circuit.key(), "probe dropped without outcome");
        self.circuit.on_complete(self.kind, CallOutcome::Failure);
    }
}

impl fmt::Debug for Permit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Permit")
            .field("key", self.circuit.key())
            .field("probe", &self.is_probe())
            .field("config", &self.circuit.config())
            .finish()
    }
}
