//! Typed publish/subscribe hubs for process lifecycle and stream data.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::{Arc, Mutex};

use crate::protocol::ExitStatus;

/// An event that can be published on a hub, carrying one payload type.
pub trait Event: 'static {
    type Payload: 'static;

    /// Wire-level name of the event, used for tracing only.
    const NAME: &'static str;
}

/// Marker for a closed set of events served by one hub.
pub trait EventSet: 'static {}

/// Membership of an [`Event`] in an [`EventSet`].
pub trait EventOf<S: EventSet>: Event {}

/// A registered callback. Cloning shares the underlying closure, so a
/// clone can be handed back to [`EventHub::off`] to remove every
/// registration of the same callback.
pub struct Listener<P: 'static>(Arc<dyn Fn(&P) + Send + Sync>);

impl<P: 'static> Listener<P> {
    pub fn new(callback: impl Fn(&P) + Send + Sync + 'static) -> Self {
        Listener(Arc::new(callback))
    }

    fn invoke(&self, payload: &P) {
        (self.0)(payload)
    }

    fn is(&self, other: &Listener<P>) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl<P: 'static> Clone for Listener<P> {
    fn clone(&self) -> Self {
        Listener(Arc::clone(&self.0))
    }
}

struct Entry<P: 'static> {
    listener: Listener<P>,
    once: bool,
}

/// Ordered listener registry over the closed event set `S`.
///
/// Each event keeps its listeners in registration order and a listener may
/// be registered any number of times. The registry is internally locked so
/// a hub can be shared with the feed-routing task, but emission itself is a
/// synchronous fan-out on the calling thread.
pub struct EventHub<S: EventSet> {
    slots: Mutex<HashMap<TypeId, Box<dyn Any + Send>>>,
    _set: PhantomData<fn() -> S>,
}

impl<S: EventSet> EventHub<S> {
    pub fn new() -> Self {
        EventHub {
            slots: Mutex::new(HashMap::new()),
            _set: PhantomData,
        }
    }

    /// Appends a new listener for `E` and returns its handle.
    pub fn on<E, F>(&self, callback: F) -> Listener<E::Payload>
    where
        E: EventOf<S>,
        F: Fn(&E::Payload) + Send + Sync + 'static,
    {
        let listener = Listener::new(callback);
        self.register::<E>(listener.clone(), false, false);
        listener
    }

    /// Appends an existing handle. Registering the same handle twice means
    /// two invocations per emission.
    pub fn add_listener<E>(&self, listener: Listener<E::Payload>)
    where
        E: EventOf<S>,
    {
        self.register::<E>(listener, false, false);
    }

    /// Appends a listener that is removed again before its first
    /// invocation, so it observes exactly one emission.
    pub fn once<E, F>(&self, callback: F) -> Listener<E::Payload>
    where
        E: EventOf<S>,
        F: Fn(&E::Payload) + Send + Sync + 'static,
    {
        let listener = Listener::new(callback);
        self.register::<E>(listener.clone(), true, false);
        listener
    }

    /// Like [`EventHub::on`], but inserts at the front of the order.
    pub fn prepend<E, F>(&self, callback: F) -> Listener<E::Payload>
    where
        E: EventOf<S>,
        F: Fn(&E::Payload) + Send + Sync + 'static,
    {
        let listener = Listener::new(callback);
        self.register::<E>(listener.clone(), false, true);
        listener
    }

    /// Like [`EventHub::once`], but inserts at the front of the order.
    pub fn prepend_once<E, F>(&self, callback: F) -> Listener<E::Payload>
    where
        E: EventOf<S>,
        F: Fn(&E::Payload) + Send + Sync + 'static,
    {
        let listener = Listener::new(callback);
        self.register::<E>(listener.clone(), true, true);
        listener
    }

    /// Removes every registration of `listener`, returning whether any was
    /// present. Identity is the shared closure, not closure equality.
    pub fn off<E>(&self, listener: &Listener<E::Payload>) -> bool
    where
        E: EventOf<S>,
    {
        let mut slots = self.slots.lock().unwrap();
        match slots
            .get_mut(&TypeId::of::<E>())
            .and_then(|slot| slot.downcast_mut::<Vec<Entry<E::Payload>>>())
        {
            Some(entries) => {
                let before = entries.len();
                entries.retain(|entry| !entry.listener.is(listener));
                entries.len() != before
            }
            None => false,
        }
    }

    /// Drops all listeners registered for `E`.
    pub fn remove_listeners<E>(&self)
    where
        E: EventOf<S>,
    {
        self.slots.lock().unwrap().remove(&TypeId::of::<E>());
    }

    /// Drops every listener for every event in the set.
    pub fn clear(&self) {
        self.slots.lock().unwrap().clear();
    }

    /// Invokes every listener currently registered for `E`, in
    /// registration order, and reports whether there was at least one.
    ///
    /// The listener list is snapshotted (and once-entries are pruned) under
    /// the registry lock before anything is invoked. Listeners added or
    /// removed from inside a callback therefore take effect from the next
    /// emission on, never retroactively for the one in flight.
    pub fn emit<E>(&self, payload: &E::Payload) -> bool
    where
        E: EventOf<S>,
    {
        let snapshot: Vec<Listener<E::Payload>> = {
            let mut slots = self.slots.lock().unwrap();
            slots
                .get_mut(&TypeId::of::<E>())
                .and_then(|slot| slot.downcast_mut::<Vec<Entry<E::Payload>>>())
                .map(|entries| {
                    let captured = entries
                        .iter()
                        .map(|entry| entry.listener.clone())
                        .collect::<Vec<_>>();
                    entries.retain(|entry| !entry.once);
                    captured
                })
                .unwrap_or_default()
        };

        if snapshot.is_empty() {
            return false;
        }

        tracing::trace!("Emitting {} to {} listener(s)", E::NAME, snapshot.len());
        for listener in &snapshot {
            listener.invoke(payload);
        }
        true
    }

    /// Number of listeners currently registered for `E`.
    pub fn listener_count<E>(&self) -> usize
    where
        E: EventOf<S>,
    {
        let slots = self.slots.lock().unwrap();
        slots
            .get(&TypeId::of::<E>())
            .and_then(|slot| slot.downcast_ref::<Vec<Entry<E::Payload>>>())
            .map_or(0, Vec::len)
    }

    fn register<E>(&self, listener: Listener<E::Payload>, once: bool, front: bool)
    where
        E: EventOf<S>,
    {
        let mut slots = self.slots.lock().unwrap();
        let slot = slots
            .entry(TypeId::of::<E>())
            .or_insert_with(|| Box::new(Vec::<Entry<E::Payload>>::new()));
        let entries = slot
            .downcast_mut::<Vec<Entry<E::Payload>>>()
            .expect("slot is keyed by its event type");
        let entry = Entry { listener, once };
        if front {
            entries.insert(0, entry);
        } else {
            entries.push(entry);
        }
    }
}

impl<S: EventSet> Default for EventHub<S> {
    fn default() -> Self {
        Self::new()
    }
}

/// Lifecycle events of a dispatched specification.
pub struct CommandEvents;

impl EventSet for CommandEvents {}

/// Process termination, reported once by the executor.
pub struct CloseEvent;

impl Event for CloseEvent {
    type Payload = ExitStatus;
    const NAME: &'static str = "close";
}

impl EventOf<CommandEvents> for CloseEvent {}

/// Executor-side failure the executor could not express any other way,
/// e.g. the program failed to launch.
pub struct ErrorEvent;

impl Event for ErrorEvent {
    type Payload = String;
    const NAME: &'static str = "error";
}

impl EventOf<CommandEvents> for ErrorEvent {}

/// Per-stream data events of a dispatched specification.
pub struct OutputEvents<P>(PhantomData<fn() -> P>);

impl<P: 'static> EventSet for OutputEvents<P> {}

/// A chunk arriving on one output stream.
pub struct DataEvent<P>(PhantomData<fn() -> P>);

impl<P: 'static> Event for DataEvent<P> {
    type Payload = P;
    const NAME: &'static str = "data";
}

impl<P: 'static> EventOf<OutputEvents<P>> for DataEvent<P> {}
