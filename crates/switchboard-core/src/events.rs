//! Typed event listeners for gateway components.

use std::fmt;
use std::sync::Arc;

/// An event emitted by a gateway component.
pub trait Event: Send + Sync + fmt::Debug {
    /// Short machine-readable event kind, e.g. `"state_transition"`.
    fn kind(&self) -> &'static str;
}

/// A callback registered for a component's events.
pub trait EventListener<E: Event>: Send + Sync {
    fn on_event(&self, event: &E);
}

/// An ordered collection of listeners, cloned freely alongside the
/// component configuration that owns it.
#[derive(Clone)]
pub struct EventListeners<E: Event> {
    listeners: Vec<Arc<dyn EventListener<E>>>,
}

impl<E: Event> EventListeners<E> {
    pub fn new() -> Self {
        Self {
            listeners: Vec::new(),
        }
    }

    pub fn add<L>(&mut self, listener: L)
    where
        L: EventListener<E> + 'static,
    {
        self.listeners.push(Arc::new(listener));
    }

    /// Delivers `event` to every registered listener, in registration order.
    pub fn emit(&self, event: &E) {
        for listener in &self.listeners {
            listener.on_event(event);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }
}

impl<E: Event> Default for EventListeners<E> {
    fn default() -> Self {
        Self::new()
    }
}

/// A listener backed by a plain closure.
pub struct FnListener<E, F>
where
    F: Fn(&E) + Send + Sync,
{
    f: F,
    _marker: std::marker::PhantomData<fn(&E)>,
}

impl<E, F> FnListener<E, F>
where
    F: Fn(&E) + Send + Sync,
{
    pub fn new(f: F) -> Self {
        Self {
            f,
            _marker: std::marker::PhantomData,
        }
    }
}

impl<E, F> EventListener<E> for FnListener<E, F>
where
    E: Event,
    F: Fn(&E) + Send + Sync,
{
    fn on_event(&self, event: &E) {
        (self.f)(event)
    }
}
