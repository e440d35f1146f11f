use crate::events::FallbackEvent;
use crate::fallback::{signature, Fallback};
use bulwark_core::{EventListeners, FallbackFailure, FnListener, KeyedRegistry, OperationKey};
#[cfg(feature = "metrics")]
use metrics::{counter, describe_counter};
use std::any::Any;
use std::fmt;
use std::panic::AssertUnwindSafe;
#[cfg(feature = "metrics")]
use std::sync::Once;

#[cfg(feature = "metrics")]
static METRICS_INIT: Once = Once::new();

struct Registered {
    fallback: Box<dyn Any + Send + Sync>,
    signature: &'static str,
}

/// Holds at most one fallback per operation key.
///
/// Fallbacks are stored type-erased; [`invoke`](Self::invoke) recovers the
/// concrete request/response types and reports
/// [`FallbackFailure::TypeMismatch`] if they differ from the registered ones.
///
/// # Example
///
/// ```rust
/// use bulwark_fallback::{Fallback, FallbackDispatcher};
///
/// let dispatcher = FallbackDispatcher::new();
/// dispatcher.register("organization-lookup", Fallback::<u64, String>::value("n/a".into()));
///
/// let name: String = dispatcher.invoke(&"organization-lookup".into(), 7u64).unwrap();
/// assert_eq!(name, "n/a");
/// ```
pub struct FallbackDispatcher {
    fallbacks: KeyedRegistry<Registered>,
    listeners: EventListeners<FallbackEvent>,
}

impl FallbackDispatcher {
    /// Creates an empty dispatcher without listeners.
    pub fn new() -> Self {
        Self::builder().build()
    }

    /// Returns a builder for registering event callbacks.
    pub fn builder() -> FallbackDispatcherBuilder {
        #[cfg(feature = "metrics")]
        METRICS_INIT.call_once(|| {
            describe_counter!(
                "fallback_calls_total",
                "Total number of fallback invocations by result"
            );
        });
        FallbackDispatcherBuilder {
            listeners: EventListeners::new(),
        }
    }

    /// Sets the fallback for `key`, replacing any previous one.
    pub fn register<Req, Res>(&self, key: impl Into<OperationKey>, fallback: Fallback<Req, Res>)
    where
        Req: 'static,
        Res: 'static,
    {
        let key = key.into();
        #[cfg(feature = "tracing")]
        tracing::debug!(key = %key, signature = signature::<Req, Res>(), "fallback registered");
        self.fallbacks.insert(
            key,
            Registered {
                fallback: Box::new(fallback),
                signature: signature::<Req, Res>(),
            },
        );
    }

    /// Removes the fallback for `key`. Returns `true` if one was registered.
    pub fn unregister(&self, key: &str) -> bool {
        self.fallbacks.remove(key).is_some()
    }

    /// Returns `true` if `key` has a fallback.
    pub fn contains(&self, key: &str) -> bool {
        self.fallbacks.contains(key)
    }

    /// Looks up the typed fallback for `key` without running it.
    pub fn get<Req, Res>(&self, key: &OperationKey) -> Result<Fallback<Req, Res>, FallbackFailure>
    where
        Req: 'static,
        Res: 'static,
    {
        let registered = self
            .fallbacks
            .get(key.as_str())
            .ok_or(FallbackFailure::NotRegistered)?;
        registered
            .fallback
            .downcast_ref::<Fallback<Req, Res>>()
            .cloned()
            .ok_or(FallbackFailure::TypeMismatch {
                expected: registered.signature,
            })
    }

    /// Runs the fallback for `key` with `input`.
    pub fn invoke<Req, Res>(&self, key: &OperationKey, input: Req) -> Result<Res, FallbackFailure>
    where
        Req: 'static,
        Res: 'static,
    {
        let fallback = match self.get::<Req, Res>(key) {
            Ok(fallback) => fallback,
            Err(failure) => {
                self.missing(key, &failure);
                return Err(failure);
            }
        };
        self.run(key, &fallback, input)
    }

    /// Runs `fallback` on behalf of `key`, reporting the result like a
    /// registered one.
    ///
    /// A panicking fallback is caught and reported as
    /// [`FallbackFailure::Failed`].
    pub fn run<Req, Res>(
        &self,
        key: &OperationKey,
        fallback: &Fallback<Req, Res>,
        input: Req,
    ) -> Result<Res, FallbackFailure> {
        let called = std::panic::catch_unwind(AssertUnwindSafe(|| fallback.call(input)))
            .unwrap_or_else(|payload| Err(panic_message(payload.as_ref()).into()));
        match called {
            Ok(response) => {
                self.listeners.emit(&FallbackEvent::Applied {
                    key: key.clone(),
                    timestamp: std::time::Instant::now(),
                });
                #[cfg(feature = "metrics")]
                counter!("fallback_calls_total", "fallback" => key.to_string(), "result" => "applied")
                    .increment(1);
                Ok(response)
            }
            Err(source) => {
                #[cfg(feature = "tracing")]
                tracing::warn!(key = %key, error = %source, "fallback failed");
                self.listeners.emit(&FallbackEvent::Failed {
                    key: key.clone(),
                    timestamp: std::time::Instant::now(),
                });
                #[cfg(feature = "metrics")]
                counter!("fallback_calls_total", "fallback" => key.to_string(), "result" => "failed")
                    .increment(1);
                Err(FallbackFailure::Failed(source))
            }
        }
    }

    fn missing(&self, key: &OperationKey, _failure: &FallbackFailure) {
        #[cfg(feature = "tracing")]
        tracing::warn!(key = %key, reason = %_failure, "no usable fallback");
        self.listeners.emit(&FallbackEvent::Missing {
            key: key.clone(),
            timestamp: std::time::Instant::now(),
        });
        #[cfg(feature = "metrics")]
        counter!("fallback_calls_total", "fallback" => key.to_string(), "result" => "missing")
            .increment(1);
    }

    /// Keys with a fallback.
    pub fn keys(&self) -> Vec<OperationKey> {
        self.fallbacks.keys()
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    let detail = payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("non-string payload");
    format!("fallback panicked: {detail}")
}

impl Default for FallbackDispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for FallbackDispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FallbackDispatcher")
            .field("keys", &self.fallbacks.keys())
            .finish()
    }
}

/// Builder for a [`FallbackDispatcher`].
pub struct FallbackDispatcherBuilder {
    listeners: EventListeners<FallbackEvent>,
}

impl FallbackDispatcherBuilder {
    /// Registers a callback when a fallback produces a response.
    pub fn on_applied<F>(mut self, f: F) -> Self
    where
        F: Fn(&OperationKey) + Send + Sync + 'static,
    {
        self.listeners
            .add(FnListener::new(move |event: &FallbackEvent| {
                if let FallbackEvent::Applied { key, .. } = event {
                    f(key);
                }
            }));
        self
    }

    /// Registers a callback when no usable fallback exists or the fallback
    /// returns an error.
    pub fn on_failed<F>(mut self, f: F) -> Self
    where
        F: Fn(&OperationKey) + Send + Sync + 'static,
    {
        self.listeners
            .add(FnListener::new(move |event: &FallbackEvent| {
                if let FallbackEvent::Missing { key, .. } | FallbackEvent::Failed { key, .. } =
                    event
                {
                    f(key);
                }
            }));
        self
    }

    /// Builds the dispatcher.
    pub fn build(self) -> FallbackDispatcher {
        FallbackDispatcher {
            fallbacks: KeyedRegistry::new(),
            listeners: self.listeners,
        }
    }
}
