use crate::config::CommandConfig;
use crate::events::ExecutorEvent;
use bulwark_bulkhead::{BulkheadMetrics, BulkheadPool};
use bulwark_circuitbreaker::{CircuitBreaker, CircuitMetrics, CircuitState};
use bulwark_core::{
    CallOutcome, ConfigError, EventListeners, FnListener, OperationKey, Rejection,
    ResilienceError, WindowSnapshot,
};
use bulwark_fallback::{Fallback, FallbackDispatcher};
#[cfg(feature = "metrics")]
use metrics::{counter, describe_counter, describe_histogram, histogram};
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
#[cfg(feature = "metrics")]
use std::sync::Once;
use std::time::Duration;
use tokio::time::Instant;

#[cfg(feature = "metrics")]
static METRICS_INIT: Once = Once::new();

struct Shared {
    default_config: CommandConfig,
    commands: HashMap<OperationKey, CommandConfig>,
    breaker: CircuitBreaker,
    bulkheads: BulkheadPool,
    fallbacks: FallbackDispatcher,
    listeners: EventListeners<ExecutorEvent>,
}

/// Runs calls under the protection configured for their operation key.
///
/// Every invocation goes through, in order: the key's circuit breaker, the
/// key's bulkhead, and a deadline. Its terminal [`CallOutcome`] is recorded
/// in the key's rolling window. Any outcome other than success is answered
/// by the key's fallback; only a missing or failing fallback produces an
/// error, always [`ResilienceError::FallbackFailed`].
///
/// Cloning is cheap and clones share all per-key state.
///
/// # Example
///
/// ```rust
/// use bulwark_executor::{CommandConfig, ResilientExecutor};
/// use bulwark_fallback::Fallback;
/// use std::time::Duration;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let executor = ResilientExecutor::builder()
///     .command(
///         "organization-lookup",
///         CommandConfig::builder()
///             .timeout(Duration::from_millis(500))
///             .build()
///             .unwrap(),
///     )
///     .fallback("organization-lookup", Fallback::<u64, String>::value("unknown".into()))
///     .build();
///
/// let key = "organization-lookup".into();
/// let name = executor
///     .invoke(&key, 42u64, |id| async move {
///         Err::<String, _>(std::io::Error::other(format!("lookup of {id} failed")))
///     })
///     .await
///     .unwrap();
/// assert_eq!(name, "unknown");
/// # }
/// ```
#[derive(Clone)]
pub struct ResilientExecutor {
    shared: Arc<Shared>,
}

impl ResilientExecutor {
    /// Returns a builder.
    pub fn builder() -> ResilientExecutorBuilder {
        #[cfg(feature = "metrics")]
        METRICS_INIT.call_once(|| {
            describe_counter!(
                "executor_calls_total",
                "Total number of protected invocations by outcome"
            );
            describe_histogram!(
                "executor_call_duration_seconds",
                "Time from invocation to terminal outcome"
            );
        });
        ResilientExecutorBuilder::new()
    }

    /// Configuration that applies to `key`.
    pub fn config_for(&self, key: &OperationKey) -> CommandConfig {
        self.shared
            .commands
            .get(key)
            .copied()
            .unwrap_or(self.shared.default_config)
    }

    /// Runs `call` under `key`'s protection with the key's configured timeout.
    pub async fn invoke<Req, Res, E, F, Fut>(
        &self,
        key: &OperationKey,
        input: Req,
        call: F,
    ) -> Result<Res, ResilienceError<E>>
    where
        Req: Clone + 'static,
        Res: 'static,
        F: FnOnce(Req) -> Fut,
        Fut: Future<Output = Result<Res, E>>,
    {
        let deadline = Instant::now() + self.config_for(key).timeout;
        self.execute(key, input, deadline, call, None).await
    }

    /// Like [`invoke`](Self::invoke), with an explicit deadline that bounds
    /// both the bulkhead queue wait and the call.
    pub async fn invoke_with_deadline<Req, Res, E, F, Fut>(
        &self,
        key: &OperationKey,
        input: Req,
        deadline: Instant,
        call: F,
    ) -> Result<Res, ResilienceError<E>>
    where
        Req: Clone + 'static,
        Res: 'static,
        F: FnOnce(Req) -> Fut,
        Fut: Future<Output = Result<Res, E>>,
    {
        self.execute(key, input, deadline, call, None).await
    }

    /// Like [`invoke`](Self::invoke), using `fallback` instead of the
    /// registered one for this call.
    pub async fn invoke_with_fallback<Req, Res, E, F, Fut>(
        &self,
        key: &OperationKey,
        input: Req,
        call: F,
        fallback: Fallback<Req, Res>,
    ) -> Result<Res, ResilienceError<E>>
    where
        Req: Clone + 'static,
        Res: 'static,
        F: FnOnce(Req) -> Fut,
        Fut: Future<Output = Result<Res, E>>,
    {
        let deadline = Instant::now() + self.config_for(key).timeout;
        self.execute(key, input, deadline, call, Some(&fallback))
            .await
    }

    async fn execute<Req, Res, E, F, Fut>(
        &self,
        key: &OperationKey,
        input: Req,
        deadline: Instant,
        call: F,
        fallback: Option<&Fallback<Req, Res>>,
    ) -> Result<Res, ResilienceError<E>>
    where
        Req: Clone + 'static,
        Res: 'static,
        F: FnOnce(Req) -> Fut,
        Fut: Future<Output = Result<Res, E>>,
    {
        let started = Instant::now();
        let error = match self
            .protected(key, input.clone(), started, deadline, call)
            .await
        {
            Ok(response) => {
                self.completed(key, CallOutcome::Success, started);
                return Ok(response);
            }
            Err(error) => error,
        };

        let outcome = error.outcome();
        self.completed(key, outcome, started);

        let recovered = match fallback {
            Some(fallback) => self.shared.fallbacks.run(key, fallback, input),
            None => self.shared.fallbacks.invoke(key, input),
        };
        match recovered {
            Ok(response) => {
                self.shared.listeners.emit(&ExecutorEvent::FallbackApplied {
                    key: key.clone(),
                    timestamp: std::time::Instant::now(),
                    outcome,
                });
                Ok(response)
            }
            Err(failure) => {
                #[cfg(feature = "tracing")]
                tracing::warn!(key = %key, %outcome, error = %failure, "no fallback available");
                self.shared.listeners.emit(&ExecutorEvent::FallbackFailed {
                    key: key.clone(),
                    timestamp: std::time::Instant::now(),
                    outcome,
                });
                Err(error.into_fallback_failed(key.clone(), failure))
            }
        }
    }

    /// Breaker, bulkhead and deadline, without the fallback.
    async fn protected<Req, Res, E, F, Fut>(
        &self,
        key: &OperationKey,
        input: Req,
        started: Instant,
        deadline: Instant,
        call: F,
    ) -> Result<Res, ResilienceError<E>>
    where
        F: FnOnce(Req) -> Fut,
        Fut: Future<Output = Result<Res, E>>,
    {
        let permit = self.shared.breaker.permit(key)?;

        let slot = match self.shared.bulkheads.try_acquire(key, deadline).await {
            Ok(slot) => slot,
            Err(rejected) => {
                permit.complete(CallOutcome::Rejected(Rejection::ByBulkhead));
                return Err(rejected.into());
            }
        };

        // On timeout the call future is dropped here and never polled again.
        let result = tokio::time::timeout_at(deadline, call(input)).await;
        slot.release();

        let (outcome, result) = match result {
            Ok(Ok(response)) => (CallOutcome::Success, Ok(response)),
            Ok(Err(e)) => (CallOutcome::Failure, Err(ResilienceError::CallFailure(e))),
            Err(_) => (
                CallOutcome::Timeout,
                Err(ResilienceError::CallTimeout {
                    timeout: deadline.saturating_duration_since(started),
                }),
            ),
        };
        permit.complete(outcome);
        result
    }

    fn completed(&self, key: &OperationKey, outcome: CallOutcome, started: Instant) {
        let duration = started.elapsed();

        #[cfg(feature = "tracing")]
        if !outcome.is_success() {
            tracing::debug!(key = %key, %outcome, ?duration, "protected call did not succeed");
        }

        #[cfg(feature = "metrics")]
        {
            counter!(
                "executor_calls_total",
                "executor" => key.to_string(),
                "outcome" => outcome.as_str()
            )
            .increment(1);
            histogram!("executor_call_duration_seconds", "executor" => key.to_string())
                .record(duration.as_secs_f64());
        }

        self.shared.listeners.emit(&ExecutorEvent::CallCompleted {
            key: key.clone(),
            timestamp: std::time::Instant::now(),
            outcome,
            duration,
        });
    }

    /// Sets the fallback for `key`, replacing any previous one.
    pub fn register_fallback<Req, Res>(&self, key: impl Into<OperationKey>, fallback: Fallback<Req, Res>)
    where
        Req: 'static,
        Res: 'static,
    {
        self.shared.fallbacks.register(key, fallback);
    }

    /// Removes the fallback for `key`.
    pub fn unregister_fallback(&self, key: &OperationKey) -> bool {
        self.shared.fallbacks.unregister(key.as_str())
    }

    /// Aggregate of `key`'s rolling window.
    pub fn snapshot(&self, key: &OperationKey) -> WindowSnapshot {
        self.shared.breaker.snapshot(key)
    }

    /// State of `key`'s breaker.
    pub fn breaker_state(&self, key: &OperationKey) -> CircuitState {
        self.shared.breaker.state(key)
    }

    /// State and window of `key`'s breaker.
    pub fn breaker_metrics(&self, key: &OperationKey) -> CircuitMetrics {
        self.shared.breaker.metrics(key)
    }

    /// Counters of `key`'s bulkhead.
    pub fn bulkhead_metrics(&self, key: &OperationKey) -> BulkheadMetrics {
        self.shared.bulkheads.metrics(key)
    }

    /// Opens `key`'s breaker.
    pub fn force_open(&self, key: &OperationKey) {
        self.shared.breaker.force_open(key);
    }

    /// Closes `key`'s breaker and clears its window.
    pub fn force_closed(&self, key: &OperationKey) {
        self.shared.breaker.force_closed(key);
    }

    /// Returns `key` to a fresh state: breaker closed, window empty, new
    /// bulkhead.
    pub fn reset(&self, key: &OperationKey) {
        self.shared.breaker.reset(key);
        self.shared.bulkheads.reset(key);
    }

    /// Resets every key.
    pub fn reset_all(&self) {
        self.shared.breaker.reset_all();
        self.shared.bulkheads.clear();
    }
}

impl fmt::Debug for ResilientExecutor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResilientExecutor")
            .field("default_config", &self.shared.default_config)
            .field("commands", &self.shared.commands)
            .field("fallbacks", &self.shared.fallbacks)
            .finish()
    }
}

/// Builder for a [`ResilientExecutor`].
pub struct ResilientExecutorBuilder {
    default_config: CommandConfig,
    commands: HashMap<OperationKey, CommandConfig>,
    duplicate: Option<OperationKey>,
    fallbacks: FallbackDispatcher,
    listeners: EventListeners<ExecutorEvent>,
}

impl ResilientExecutorBuilder {
    fn new() -> Self {
        Self {
            default_config: CommandConfig::default(),
            commands: HashMap::new(),
            duplicate: None,
            fallbacks: FallbackDispatcher::new(),
            listeners: EventListeners::new(),
        }
    }

    /// Configuration for keys without an explicit command.
    pub fn default_config(mut self, config: CommandConfig) -> Self {
        self.default_config = config;
        self
    }

    /// Configuration for one key. Configuring a key twice is an error.
    pub fn command(mut self, key: impl Into<OperationKey>, config: CommandConfig) -> Self {
        let key = key.into();
        if self.commands.insert(key.clone(), config).is_some() && self.duplicate.is_none() {
            self.duplicate = Some(key);
        }
        self
    }

    /// Registers the fallback for one key.
    pub fn fallback<Req, Res>(self, key: impl Into<OperationKey>, fallback: Fallback<Req, Res>) -> Self
    where
        Req: 'static,
        Res: 'static,
    {
        self.fallbacks.register(key, fallback);
        self
    }

    /// Registers a callback for every terminal outcome.
    ///
    /// # Callback Signature
    /// `Fn(&OperationKey, CallOutcome, Duration)`: the key, the outcome and
    /// the time from invocation to outcome.
    pub fn on_call_completed<F>(mut self, f: F) -> Self
    where
        F: Fn(&OperationKey, CallOutcome, Duration) + Send + Sync + 'static,
    {
        self.listeners
            .add(FnListener::new(move |event: &ExecutorEvent| {
                if let ExecutorEvent::CallCompleted {
                    key,
                    outcome,
                    duration,
                    ..
                } = event
                {
                    f(key, *outcome, *duration);
                }
            }));
        self
    }

    /// Registers a callback when a fallback answers a call.
    pub fn on_fallback_applied<F>(mut self, f: F) -> Self
    where
        F: Fn(&OperationKey, CallOutcome) + Send + Sync + 'static,
    {
        self.listeners
            .add(FnListener::new(move |event: &ExecutorEvent| {
                if let ExecutorEvent::FallbackApplied { key, outcome, .. } = event {
                    f(key, *outcome);
                }
            }));
        self
    }

    /// Registers a callback when no fallback could answer a call.
    pub fn on_fallback_failed<F>(mut self, f: F) -> Self
    where
        F: Fn(&OperationKey, CallOutcome) + Send + Sync + 'static,
    {
        self.listeners
            .add(FnListener::new(move |event: &ExecutorEvent| {
                if let ExecutorEvent::FallbackFailed { key, outcome, .. } = event {
                    f(key, *outcome);
                }
            }));
        self
    }

    /// Validates the configuration and builds the executor.
    pub fn try_build(self) -> Result<ResilientExecutor, ConfigError> {
        if let Some(key) = self.duplicate {
            return Err(ConfigError::DuplicateKey(key));
        }
        self.default_config.validate()?;

        let mut breaker = CircuitBreaker::builder().default_config(self.default_config.breaker_config()?);
        let mut bulkheads = BulkheadPool::builder().default_config(self.default_config.pool_config()?);
        for (key, config) in &self.commands {
            config.validate()?;
            breaker = breaker.breaker(key.clone(), config.breaker_config()?);
            bulkheads = bulkheads.pool(key.clone(), config.pool_config()?);
        }

        #[cfg(feature = "tracing")]
        tracing::debug!(commands = self.commands.len(), "resilient executor built");

        Ok(ResilientExecutor {
            shared: Arc::new(Shared {
                default_config: self.default_config,
                commands: self.commands,
                breaker: breaker.try_build()?,
                bulkheads: bulkheads.try_build()?,
                fallbacks: self.fallbacks,
                listeners: self.listeners,
            }),
        })
    }

    /// Builds the executor.
    ///
    /// # Panics
    ///
    /// Panics if the configuration is invalid or a key is configured twice.
    pub fn build(self) -> ResilientExecutor {
        match self.try_build() {
            Ok(executor) => executor,
            Err(e) => panic!("invalid executor configuration: {e}"),
        }
    }
}

impl Default for ResilientExecutorBuilder {
    fn default() -> Self {
        Self::new()
    }
}
