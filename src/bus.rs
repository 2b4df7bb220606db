//! Process-wide publish/subscribe event bus.
//!
//! Other parts of an application observe the client's lifecycle through
//! named events rather than through return values: call announcements,
//! response completions and connectivity problems are all published here.
//!
//! # Event Contract
//!
//! The event names are a wire contract that application code may depend on:
//!
//! | Event | Name | Payload |
//! |-------|------|---------|
//! | [`EventId::ApplicationError`] | `application-error` | error kind + context |
//! | [`EventId::ServiceCall`] | `service-call` | serviceId, path, correlationId |
//! | [`EventId::ResponseComplete`] | `service-response-complete` | serviceId, path |
//!
//! Listeners are invoked synchronously, in registration order, and are never
//! deduplicated. They are also never unregistered automatically; dropping a
//! [`Subscription`] handle keeps the listener alive, only an explicit
//! [`Subscription::unsubscribe`] removes it.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use rustc_hash::FxHashMap;

use crate::identifiers::{CorrelationId, ServiceId};

// ============================================================================
// Types
// ============================================================================

/// Listener callback type.
type Listener = Arc<dyn Fn(&ClientEvent) + Send + Sync>;

// ============================================================================
// EventId
// ============================================================================

/// Identifier of a bus event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventId {
    /// A connectivity or discovery problem occurred.
    ApplicationError,
    /// A service call is being issued.
    ServiceCall,
    /// An inbound response finished processing.
    ResponseComplete,
}

impl EventId {
    /// Returns the event's wire name.
    #[inline]
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ApplicationError => "application-error",
            Self::ServiceCall => "service-call",
            Self::ResponseComplete => "service-response-complete",
        }
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// ErrorKind
// ============================================================================

/// Kind tag carried by `application-error` events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The discovery bootstrap call failed; context is the discovery URL.
    ServiceDiscovery,
    /// A pooled connection reported a transport error; context is the serviceId.
    WebsocketError,
    /// A pooled connection closed; context is the serviceId.
    WebsocketClosed,
}

impl ErrorKind {
    /// Returns the kind's wire name.
    #[inline]
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ServiceDiscovery => "SERVICE_DISCOVERY",
            Self::WebsocketError => "WEBSOCKET_ERROR",
            Self::WebsocketClosed => "WEBSOCKET_CLOSED",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// ClientEvent
// ============================================================================

/// Payload published on the bus.
#[derive(Debug, Clone)]
pub enum ClientEvent {
    /// A connectivity or discovery problem occurred.
    ApplicationError {
        /// What went wrong.
        kind: ErrorKind,
        /// Discovery URL or serviceId, depending on `kind`.
        context: String,
    },

    /// A service call is being issued.
    ServiceCall {
        /// The service owning the method path.
        service_id: ServiceId,
        /// The method path being called.
        path: String,
        /// The correlation id assigned to the call.
        correlation_id: CorrelationId,
    },

    /// An inbound response finished processing.
    ///
    /// Announced for every parseable response, even when no pending call
    /// matched its correlation id (in which case `path` is empty).
    ResponseComplete {
        /// The service the response arrived from.
        service_id: ServiceId,
        /// The originating method path, when known.
        path: String,
    },
}

impl ClientEvent {
    /// Returns the id this event is published under.
    #[inline]
    #[must_use]
    pub const fn id(&self) -> EventId {
        match self {
            Self::ApplicationError { .. } => EventId::ApplicationError,
            Self::ServiceCall { .. } => EventId::ServiceCall,
            Self::ResponseComplete { .. } => EventId::ResponseComplete,
        }
    }
}

// ============================================================================
// EventBus
// ============================================================================

/// Publish/subscribe mechanism shared by all client components.
///
/// Cheap to clone; clones share the same listener registry.
#[derive(Clone, Default)]
pub struct EventBus {
    inner: Arc<Mutex<BusInner>>,
}

#[derive(Default)]
struct BusInner {
    listeners: FxHashMap<EventId, Vec<(u64, Listener)>>,
    next_token: u64,
}

impl EventBus {
    /// Creates an empty event bus.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a listener for the given event.
    ///
    /// Listeners accumulate in registration order and are never
    /// deduplicated. The returned [`Subscription`] is the only way to
    /// remove the listener again.
    pub fn subscribe(
        &self,
        event: EventId,
        listener: impl Fn(&ClientEvent) + Send + Sync + 'static,
    ) -> Subscription {
        let token = {
            let mut inner = self.inner.lock();
            let token = inner.next_token;
            inner.next_token += 1;
            inner
                .listeners
                .entry(event)
                .or_default()
                .push((token, Arc::new(listener)));
            token
        };

        Subscription {
            event,
            token,
            bus: self.clone(),
        }
    }

    /// Synchronously invokes every listener registered for the event's id.
    ///
    /// Listeners run in registration order on the triggering thread.
    /// Triggering an event with no subscribers is a no-op. The registry
    /// lock is released before listeners run, so a listener may subscribe
    /// or unsubscribe without deadlocking.
    pub fn trigger(&self, event: ClientEvent) {
        let snapshot: Vec<Listener> = {
            let inner = self.inner.lock();
            match inner.listeners.get(&event.id()) {
                Some(listeners) => listeners.iter().map(|(_, l)| Arc::clone(l)).collect(),
                None => return,
            }
        };

        for listener in snapshot {
            listener(&event);
        }
    }

    /// Returns the number of listeners registered for an event.
    #[must_use]
    pub fn listener_count(&self, event: EventId) -> usize {
        self.inner
            .lock()
            .listeners
            .get(&event)
            .map_or(0, Vec::len)
    }

    /// Removes the listener identified by `token`.
    fn unsubscribe(&self, event: EventId, token: u64) {
        let mut inner = self.inner.lock();
        if let Some(listeners) = inner.listeners.get_mut(&event) {
            listeners.retain(|(t, _)| *t != token);
        }
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("EventBus")
            .field("events", &inner.listeners.len())
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Subscription
// ============================================================================

/// Handle to a registered listener.
///
/// Dropping the handle does *not* remove the listener; call
/// [`unsubscribe`](Self::unsubscribe) to stop receiving events.
#[derive(Debug)]
pub struct Subscription {
    event: EventId,
    token: u64,
    bus: EventBus,
}

impl Subscription {
    /// Returns the event this subscription listens to.
    #[inline]
    #[must_use]
    pub const fn event(&self) -> EventId {
        self.event
    }

    /// Removes the listener from the bus.
    pub fn unsubscribe(self) {
        self.bus.unsubscribe(self.event, self.token);
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use parking_lot::Mutex;

    fn error_event(context: &str) -> ClientEvent {
        ClientEvent::ApplicationError {
            kind: ErrorKind::WebsocketClosed,
            context: context.to_owned(),
        }
    }

    #[test]
    fn test_event_wire_names() {
        assert_eq!(EventId::ApplicationError.as_str(), "application-error");
        assert_eq!(EventId::ServiceCall.as_str(), "service-call");
        assert_eq!(
            EventId::ResponseComplete.as_str(),
            "service-response-complete"
        );
        assert_eq!(ErrorKind::ServiceDiscovery.as_str(), "SERVICE_DISCOVERY");
        assert_eq!(ErrorKind::WebsocketError.as_str(), "WEBSOCKET_ERROR");
        assert_eq!(ErrorKind::WebsocketClosed.as_str(), "WEBSOCKET_CLOSED");
    }

    #[test]
    fn test_listeners_fire_in_registration_order() {
        let bus = EventBus::new();
        let order = Arc::new(Mutex::new(Vec::new()));

        for n in 0..3 {
            let order = Arc::clone(&order);
            bus.subscribe(EventId::ApplicationError, move |_| {
                order.lock().push(n);
            });
        }

        bus.trigger(error_event("svcA"));
        assert_eq!(*order.lock(), vec![0, 1, 2]);
    }

    #[test]
    fn test_payload_passes_through() {
        let bus = EventBus::new();
        let seen = Arc::new(Mutex::new(None));

        let seen_clone = Arc::clone(&seen);
        bus.subscribe(EventId::ApplicationError, move |event| {
            if let ClientEvent::ApplicationError { kind, context } = event {
                *seen_clone.lock() = Some((*kind, context.clone()));
            }
        });

        bus.trigger(error_event("svcA"));
        assert_eq!(
            seen.lock().take(),
            Some((ErrorKind::WebsocketClosed, "svcA".to_owned()))
        );
    }

    #[test]
    fn test_trigger_without_subscribers_is_noop() {
        let bus = EventBus::new();
        bus.trigger(error_event("svcA"));
    }

    #[test]
    fn test_listeners_are_not_deduplicated() {
        let bus = EventBus::new();
        let count = Arc::new(Mutex::new(0));

        for _ in 0..2 {
            let count = Arc::clone(&count);
            bus.subscribe(EventId::ResponseComplete, move |_| {
                *count.lock() += 1;
            });
        }

        bus.trigger(ClientEvent::ResponseComplete {
            service_id: ServiceId::new("svcA"),
            path: "/ping/".to_owned(),
        });
        assert_eq!(*count.lock(), 2);
    }

    #[test]
    fn test_unsubscribe_stops_delivery() {
        let bus = EventBus::new();
        let count = Arc::new(Mutex::new(0));

        let count_clone = Arc::clone(&count);
        let subscription = bus.subscribe(EventId::ApplicationError, move |_| {
            *count_clone.lock() += 1;
        });

        bus.trigger(error_event("svcA"));
        subscription.unsubscribe();
        bus.trigger(error_event("svcA"));

        assert_eq!(*count.lock(), 1);
        assert_eq!(bus.listener_count(EventId::ApplicationError), 0);
    }

    #[test]
    fn test_dropping_subscription_keeps_listener() {
        let bus = EventBus::new();
        let count = Arc::new(Mutex::new(0));

        let count_clone = Arc::clone(&count);
        let subscription = bus.subscribe(EventId::ApplicationError, move |_| {
            *count_clone.lock() += 1;
        });
        drop(subscription);

        bus.trigger(error_event("svcA"));
        assert_eq!(*count.lock(), 1);
    }

    #[test]
    fn test_only_matching_event_fires() {
        let bus = EventBus::new();
        let count = Arc::new(Mutex::new(0));

        let count_clone = Arc::clone(&count);
        bus.subscribe(EventId::ServiceCall, move |_| {
            *count_clone.lock() += 1;
        });

        bus.trigger(error_event("svcA"));
        assert_eq!(*count.lock(), 0);
    }
}
