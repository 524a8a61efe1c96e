/// A named, cloneable event that can travel over an [`EventBus`].
pub trait BusEvent: Clone {
    /// Stable event name subscribers filter on (e.g. `"themeChanged"`).
    fn name(&self) -> &'static str;
}

/// Recorded event for traceability.
#[derive(Debug, Clone, PartialEq)]
pub struct Event<E> {
    /// Position in emission order, starting at 0.
    pub seq: u64,
    pub payload: E,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SubscriptionId(u64);

struct Subscriber<E> {
    id: SubscriptionId,
    /// `None` receives every event.
    filter: Option<&'static str>,
    handler: Box<dyn FnMut(&Event<E>)>,
}

/// Synchronous event bus with explicit subscriber lists.
///
/// Events are only kept after [`EventBus::set_recording`] turns the log on;
/// a long-lived bus otherwise holds nothing but its subscribers.
///
/// Ordering contract:
/// - Subscribers run in subscription order.
/// - Events are delivered and recorded in emission order.
pub struct EventBus<E> {
    next_seq: u64,
    next_subscription: u64,
    subscribers: Vec<Subscriber<E>>,
    recording: bool,
    events: Vec<Event<E>>,
}

impl<E> Default for EventBus<E> {
    fn default() -> Self {
        Self {
            next_seq: 0,
            next_subscription: 0,
            subscribers: Vec::new(),
            recording: false,
            events: Vec::new(),
        }
    }
}

impl<E> std::fmt::Debug for EventBus<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("next_seq", &self.next_seq)
            .field("subscribers", &self.subscribers.len())
            .field("recording", &self.recording)
            .field("recorded", &self.events.len())
            .finish()
    }
}

impl<E: BusEvent> EventBus<E> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bus that keeps every emitted event until drained.
    pub fn recorded() -> Self {
        Self {
            recording: true,
            ..Self::default()
        }
    }

    /// Turning recording off drops the events kept so far.
    pub fn set_recording(&mut self, on: bool) {
        self.recording = on;
        if !on {
            self.events.clear();
        }
    }

    pub fn is_recording(&self) -> bool {
        self.recording
    }

    /// Subscribes to events named `name`.
    pub fn subscribe(
        &mut self,
        name: &'static str,
        handler: impl FnMut(&Event<E>) + 'static,
    ) -> SubscriptionId {
        self.push_subscriber(Some(name), Box::new(handler))
    }

    /// Subscribes to every event.
    pub fn subscribe_all(&mut self, handler: impl FnMut(&Event<E>) + 'static) -> SubscriptionId {
        self.push_subscriber(None, Box::new(handler))
    }

    /// Returns `true` if the subscription existed.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.subscribers.len();
        self.subscribers.retain(|s| s.id != id);
        self.subscribers.len() != before
    }

    pub fn emit(&mut self, payload: E) {
        let event = Event {
            seq: self.next_seq,
            payload,
        };
        self.next_seq += 1;

        let name = event.payload.name();
        for sub in &mut self.subscribers {
            if sub.filter.is_none_or(|f| f == name) {
                (sub.handler)(&event);
            }
        }
        if self.recording {
            self.events.push(event);
        }
    }

    pub fn events(&self) -> &[Event<E>] {
        &self.events
    }

    pub fn drain(&mut self) -> Vec<Event<E>> {
        std::mem::take(&mut self.events)
    }

    fn push_subscriber(
        &mut self,
        filter: Option<&'static str>,
        handler: Box<dyn FnMut(&Event<E>)>,
    ) -> SubscriptionId {
        let id = SubscriptionId(self.next_subscription);
        self.next_subscription += 1;
        self.subscribers.push(Subscriber {
            id,
            filter,
            handler,
        });
        id
    }
}
