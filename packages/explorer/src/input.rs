//! Map gesture events and scoped subscription ownership.
//!
//! The host shell forwards its pointer gestures as [`InputEvent`]s into an
//! [`EventHub`]; components subscribe handlers and receive every event
//! until their [`Subscription`] is dropped. A [`SubscriptionSet`] groups
//! the subscriptions of one interactive mode so deactivation disposes all
//! of them atomically — there is no ad hoc handle bag to leak from.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};

/// Phase of a drag gesture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DragAction {
    /// The pointer went down and started moving.
    Start,
    /// The pointer moved while dragging.
    Update,
    /// The pointer was released.
    End,
}

/// A pointer gesture on the map surface.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InputEvent {
    /// A primary click at a map location.
    Click {
        /// Click position in map coordinates (longitude, latitude).
        point: geo::Point<f64>,
    },
    /// Pointer hover movement in screen coordinates.
    PointerMove {
        /// Screen x.
        x: f64,
        /// Screen y.
        y: f64,
    },
    /// A drag gesture in screen coordinates.
    Drag {
        /// Gesture phase.
        action: DragAction,
        /// Screen x.
        x: f64,
        /// Screen y.
        y: f64,
    },
}

type Handler = Box<dyn Fn(&InputEvent) -> bool + Send + Sync>;
type HandlerMap = Arc<Mutex<BTreeMap<u64, Handler>>>;

/// Dispatches [`InputEvent`]s to subscribed handlers.
#[derive(Default)]
pub struct EventHub {
    next_id: AtomicU64,
    handlers: HandlerMap,
}

impl EventHub {
    /// Creates an empty hub, shareable across components.
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Registers `handler` and returns its owning [`Subscription`].
    ///
    /// The handler returns `true` to consume the event (suppressing the
    /// host's default handling of the gesture).
    pub fn subscribe(
        &self,
        handler: impl Fn(&InputEvent) -> bool + Send + Sync + 'static,
    ) -> Subscription {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.handlers
            .lock()
            .expect("event hub mutex poisoned")
            .insert(id, Box::new(handler));
        Subscription {
            handlers: Arc::downgrade(&self.handlers),
            id,
        }
    }

    /// Delivers `event` to every subscribed handler.
    ///
    /// Returns `true` if any handler consumed the event. All handlers see
    /// the event even after one consumes it.
    pub fn dispatch(&self, event: &InputEvent) -> bool {
        let handlers = self.handlers.lock().expect("event hub mutex poisoned");
        let mut consumed = false;
        for handler in handlers.values() {
            consumed |= handler(event);
        }
        consumed
    }

    /// Number of live subscriptions.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.handlers.lock().expect("event hub mutex poisoned").len()
    }
}

/// Owns one registered handler; dropping it unregisters the handler.
pub struct Subscription {
    handlers: Weak<Mutex<BTreeMap<u64, Handler>>>,
    id: u64,
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(handlers) = self.handlers.upgrade() {
            handlers
                .lock()
                .expect("event hub mutex poisoned")
                .remove(&self.id);
        }
    }
}

/// The subscriptions of one interactive mode, disposed as a unit.
#[derive(Default)]
pub struct SubscriptionSet {
    subscriptions: Vec<Subscription>,
}

impl SubscriptionSet {
    /// Creates an empty set.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            subscriptions: Vec::new(),
        }
    }

    /// Takes ownership of a subscription.
    pub fn add(&mut self, subscription: Subscription) {
        self.subscriptions.push(subscription);
    }

    /// Drops every owned subscription.
    pub fn clear(&mut self) {
        self.subscriptions.clear();
    }

    /// Returns `true` if no subscriptions are owned.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.subscriptions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;

    use super::*;

    #[test]
    fn dispatch_reaches_all_handlers() {
        let hub = EventHub::new();
        let calls = Arc::new(AtomicUsize::new(0));

        let _a = hub.subscribe({
            let calls = Arc::clone(&calls);
            move |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                false
            }
        });
        let _b = hub.subscribe({
            let calls = Arc::clone(&calls);
            move |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                true
            }
        });

        let consumed = hub.dispatch(&InputEvent::Click {
            point: geo::Point::new(0.0, 0.0),
        });
        assert!(consumed);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn dropping_subscription_unregisters_handler() {
        let hub = EventHub::new();
        let calls = Arc::new(AtomicUsize::new(0));

        let subscription = hub.subscribe({
            let calls = Arc::clone(&calls);
            move |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                false
            }
        });
        assert_eq!(hub.subscriber_count(), 1);

        drop(subscription);
        assert_eq!(hub.subscriber_count(), 0);

        hub.dispatch(&InputEvent::PointerMove { x: 1.0, y: 2.0 });
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn clearing_a_set_disposes_every_subscription() {
        let hub = EventHub::new();
        let mut set = SubscriptionSet::new();

        set.add(hub.subscribe(|_| false));
        set.add(hub.subscribe(|_| false));
        set.add(hub.subscribe(|_| true));
        assert_eq!(hub.subscriber_count(), 3);

        set.clear();
        assert!(set.is_empty());
        assert_eq!(hub.subscriber_count(), 0);
        assert!(!hub.dispatch(&InputEvent::Drag {
            action: DragAction::Update,
            x: 3.0,
            y: 4.0,
        }));
    }
}
