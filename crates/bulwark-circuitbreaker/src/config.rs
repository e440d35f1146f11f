use crate::events::CircuitBreakerEvent;
use crate::{CircuitBreaker, CircuitState};
use bulwark_core::{CallOutcome, ConfigError, EventListeners, FnListener, OperationKey, WindowConfig};
use std::collections::HashMap;
use std::time::Duration;

/// Thresholds for one key's breaker.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CircuitBreakerConfig {
    /// Minimum calls in the window before the error rate is considered.
    pub request_volume_threshold: u64,
    /// Error rate (0.0 to 1.0) at or above which the breaker opens.
    pub error_threshold: f64,
    /// How long the breaker stays open before letting a probe through.
    pub sleep_window: Duration,
    /// Shape of the rolling window the error rate is computed over.
    pub window: WindowConfig,
}

impl CircuitBreakerConfig {
    /// Checks the thresholds are usable.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.error_threshold > 0.0 && self.error_threshold <= 1.0) {
            return Err(ConfigError::invalid(
                "error_threshold",
                format!("must be in (0.0, 1.0], got {}", self.error_threshold),
            ));
        }
        Ok(())
    }
}

impl Default for CircuitBreakerConfig {
    /// 20 calls, 50% errors, 5s sleep window, 10 one-second buckets.
    fn default() -> Self {
        Self {
            request_volume_threshold: 20,
            error_threshold: 0.5,
            sleep_window: Duration::from_secs(5),
            window: WindowConfig::default(),
        }
    }
}

/// Builder for a [`CircuitBreaker`].
pub struct CircuitBreakerBuilder {
    default_config: CircuitBreakerConfig,
    overrides: HashMap<OperationKey, CircuitBreakerConfig>,
    event_listeners: EventListeners<CircuitBreakerEvent>,
}

impl CircuitBreakerBuilder {
    /// Creates a builder with default values.
    pub fn new() -> Self {
        Self {
            default_config: CircuitBreakerConfig::default(),
            overrides: HashMap::new(),
            event_listeners: EventListeners::new(),
        }
    }

    /// Thresholds used for keys without an explicit entry.
    pub fn default_config(mut self, config: CircuitBreakerConfig) -> Self {
        self.default_config = config;
        self
    }

    /// Thresholds for one key.
    pub fn breaker(mut self, key: impl Into<OperationKey>, config: CircuitBreakerConfig) -> Self {
        self.overrides.insert(key.into(), config);
        self
    }

    /// Registers a callback for state transitions.
    ///
    /// # Callback Signature
    /// `Fn(&OperationKey, CircuitState, CircuitState)`: the key, the state
    /// being left and the state being entered.
    ///
    /// # Example
    ///
    /// ```rust
    /// use bulwark_circuitbreaker::{CircuitBreaker, CircuitState};
    ///
    /// let breaker = CircuitBreaker::builder()
    ///     .on_state_transition(|key, from, to| {
    ///         if to == CircuitState::Open {
    ///             eprintln!("{key}: opened (was {from:?})");
    ///         }
    ///     })
    ///     .build();
    /// ```
    pub fn on_state_transition<F>(mut self, f: F) -> Self
    where
        F: Fn(&OperationKey, CircuitState, CircuitState) + Send + Sync + 'static,
    {
        self.event_listeners
            .add(FnListener::new(move |event: &CircuitBreakerEvent| {
                if let CircuitBreakerEvent::StateTransition {
                    key,
                    from_state,
                    to_state,
                    ..
                } = event
                {
                    f(key, *from_state, *to_state);
                }
            }));
        self
    }

    /// Registers a callback when a call is permitted.
    ///
    /// # Callback Signature
    /// `Fn(&OperationKey, CircuitState)`: `Closed` for normal calls,
    /// `HalfOpen` for the probe.
    pub fn on_call_permitted<F>(mut self, f: F) -> Self
    where
        F: Fn(&OperationKey, CircuitState) + Send + Sync + 'static,
    {
        self.event_listeners
            .add(FnListener::new(move |event: &CircuitBreakerEvent| {
                if let CircuitBreakerEvent::CallPermitted { key, state, .. } = event {
                    f(key, *state);
                }
            }));
        self
    }

    /// Registers a callback when a call is rejected.
    pub fn on_call_rejected<F>(mut self, f: F) -> Self
    where
        F: Fn(&OperationKey) + Send + Sync + 'static,
    {
        self.event_listeners
            .add(FnListener::new(move |event: &CircuitBreakerEvent| {
                if let CircuitBreakerEvent::CallRejected { key, .. } = event {
                    f(key);
                }
            }));
        self
    }

    /// Registers a callback when a permitted call reports its outcome.
    pub fn on_outcome_recorded<F>(mut self, f: F) -> Self
    where
        F: Fn(&OperationKey, CallOutcome) + Send + Sync + 'static,
    {
        self.event_listeners
            .add(FnListener::new(move |event: &CircuitBreakerEvent| {
                if let CircuitBreakerEvent::OutcomeRecorded { key, outcome, .. } = event {
                    f(key, *outcome);
                }
            }));
        self
    }

    /// Validates every configuration and builds the breaker.
    pub fn try_build(self) -> Result<CircuitBreaker, ConfigError> {
        self.default_config.validate()?;
        for config in self.overrides.values() {
            config.validate()?;
        }
        Ok(CircuitBreaker::new(
            self.default_config,
            self.overrides,
            self.event_listeners,
        ))
    }

    /// Builds the breaker.
    ///
    /// # Panics
    ///
    /// Panics if any configuration is invalid.
    pub fn build(self) -> CircuitBreaker {
        match self.try_build() {
            Ok(breaker) => breaker,
            Err(e) => panic!("invalid circuit breaker configuration: {e}"),
        }
    }
}

impl Default for CircuitBreakerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn threshold_must_be_a_rate() {
        for bad in [0.0, -0.1, 1.5, f64::NAN] {
            let config = CircuitBreakerConfig {
                error_threshold: bad,
                ..Default::default()
            };
            assert!(config.validate().is_err(), "{bad} accepted");
        }
        let config = CircuitBreakerConfig {
            error_threshold: 1.0,
            ..Default::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn try_build_rejects_bad_override() {
        let result = CircuitBreaker::builder()
            .breaker(
                "license-by-org",
                CircuitBreakerConfig {
                    error_threshold: 75.0,
                    ..Default::default()
                },
            )
            .try_build();
        assert!(result.is_err());
    }
}
