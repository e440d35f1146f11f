//! Event system shared by every bulwark component.
//!
//! Components describe what happened to a keyed call site through their own
//! event enums and hand them to an [`EventListeners`] collection. Listeners
//! are purely observational: a listener that panics is isolated so the
//! invocation that emitted the event carries on unaffected.

use crate::key::OperationKey;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;

/// An event emitted by a bulwark component.
pub trait ResilienceEvent: Send + Sync + fmt::Debug {
    /// Stable snake_case name of the event (e.g. `"state_transition"`).
    fn event_type(&self) -> &'static str;

    /// When the event occurred.
    fn timestamp(&self) -> Instant;

    /// The operation key the event belongs to.
    fn key(&self) -> &OperationKey;
}

/// Receives events of one type.
pub trait EventListener<E: ResilienceEvent>: Send + Sync {
    /// Called for every emitted event.
    fn on_event(&self, event: &E);
}

/// Shared, type-erased listener.
pub type BoxedEventListener<E> = Arc<dyn EventListener<E>>;

/// An ordered collection of listeners for one event type.
#[derive(Clone)]
pub struct EventListeners<E: ResilienceEvent> {
    listeners: Vec<BoxedEventListener<E>>,
}

impl<E: ResilienceEvent> EventListeners<E> {
    /// Creates an empty collection.
    pub fn new() -> Self {
        Self {
            listeners: Vec::new(),
        }
    }

    /// Appends a listener.
    pub fn add<L>(&mut self, listener: L)
    where
        L: EventListener<E> + 'static,
    {
        self.listeners.push(Arc::new(listener));
    }

    /// Appends a closure as a listener.
    pub fn add_fn<F>(&mut self, f: F)
    where
        F: Fn(&E) + Send + Sync + 'static,
        E: 'static,
    {
        self.add(FnListener::new(f));
    }

    /// Delivers `event` to every listener in registration order.
    ///
    /// A panicking listener is caught; the remaining listeners still run.
    pub fn emit(&self, event: &E) {
        for listener in &self.listeners {
            let delivered = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                listener.on_event(event);
            }));
            #[cfg(feature = "tracing")]
            if delivered.is_err() {
                tracing::warn!(
                    key = %event.key(),
                    event = event.event_type(),
                    "event listener panicked"
                );
            }
            #[cfg(not(feature = "tracing"))]
            let _ = delivered;
        }
    }

    /// Returns `true` if no listener is registered.
    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }

    /// Number of registered listeners.
    pub fn len(&self) -> usize {
        self.listeners.len()
    }
}

impl<E: ResilienceEvent> Default for EventListeners<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: ResilienceEvent> fmt::Debug for EventListeners<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventListeners")
            .field("len", &self.listeners.len())
            .finish()
    }
}

/// Adapts a closure into an [`EventListener`].
pub struct FnListener<E, F>
where
    F: Fn(&E) + Send + Sync,
{
    f: F,
    _phantom: std::marker::PhantomData<fn(&E)>,
}

impl<E, F> FnListener<E, F>
where
    F: Fn(&E) + Send + Sync,
{
    /// Wraps `f`.
    pub fn new(f: F) -> Self {
        Self {
            f,
            _phantom: std::marker::PhantomData,
        }
    }
}

impl<E, F> EventListener<E> for FnListener<E, F>
where
    E: ResilienceEvent,
    F: Fn(&E) + Send + Sync,
{
    fn on_event(&self, event: &E) {
        (self.f)(event)
    }
}
