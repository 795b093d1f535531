#![forbid(unsafe_code)]

//! Typed publish/subscribe primitive.
//!
//! An [`EventDispatcher<P>`] keeps, per event type, a de-duplicated list of
//! listener handles and invokes them synchronously on
//! [`dispatch_event`](EventDispatcher::dispatch_event). Dispatchers carrying
//! [`Change<V>`] payloads additionally remember the last value passed to
//! [`set_value`](EventDispatcher::set_value).
//!
//! # Listener identity
//!
//! A [`Listener<P>`] is an `Rc<dyn Fn(&Event<'_, P>)>`. Identity is `Rc`
//! pointer identity: registering the same handle twice stores it once, and a
//! single removal detaches it completely. Clone the handle to keep it around
//! for later removal.
//!
//! # Re-entrancy
//!
//! Listeners are snapshotted before a dispatch round starts and no borrow is
//! held while they run, so a listener may freely add or remove listeners,
//! dispatch, or call `set_value` on the same dispatcher.
//!
//! - A listener removed during a round is still called in that round.
//! - A listener added during a round is first called in the next round.
//!
//! # Failure Modes
//!
//! - Listener panic: unwinds to the caller of `dispatch_event`/`set_value`;
//!   listeners after it in the same round are skipped.
//! - Removing an unknown listener or event type is a silent no-op.

use std::cell::RefCell;
use std::rc::Rc;

use ahash::AHashMap;

/// Event type fired by [`EventDispatcher::set_value`].
pub const CHANGE: &str = "change";

/// An event record handed to listeners: `{type, detail}`.
#[derive(Debug)]
pub struct Event<'a, P> {
    /// The event type the dispatch was issued for.
    pub event_type: &'a str,
    /// The dispatched payload.
    pub detail: &'a P,
}

/// Payload of a [`CHANGE`] event: `{value}`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Change<V> {
    pub value: V,
}

impl<V> Change<V> {
    #[must_use]
    pub fn new(value: V) -> Self {
        Self { value }
    }
}

/// Shared listener handle.
pub type Listener<P> = Rc<dyn Fn(&Event<'_, P>)>;

/// Wrap a closure into a [`Listener`] handle.
pub fn listener<P>(f: impl Fn(&Event<'_, P>) + 'static) -> Listener<P> {
    Rc::new(f)
}

/// A dispatcher whose events carry [`Change<V>`] payloads.
pub type ValueDispatcher<V> = EventDispatcher<Change<V>>;

/// Per-event-type listener registry with synchronous dispatch.
///
/// All methods take `&self`; state lives behind `RefCell`s that are never
/// borrowed while a listener runs.
pub struct EventDispatcher<P> {
    listeners: RefCell<AHashMap<String, Vec<Listener<P>>>>,
    value: RefCell<Option<P>>,
}

impl<P> EventDispatcher<P> {
    /// Create an empty dispatcher with no listeners and no value.
    #[must_use]
    pub fn new() -> Self {
        Self {
            listeners: RefCell::new(AHashMap::new()),
            value: RefCell::new(None),
        }
    }

    /// Register `listener` for every future dispatch of `event_type`.
    ///
    /// Adding a handle that is already registered for `event_type` is a no-op.
    pub fn add_event_listener(&self, event_type: &str, listener: &Listener<P>) {
        let mut listeners = self.listeners.borrow_mut();
        let set = listeners.entry(event_type.to_owned()).or_default();
        if !set.iter().any(|l| Rc::ptr_eq(l, listener)) {
            set.push(Rc::clone(listener));
        }
    }

    /// Unregister `listener` from `event_type`.
    pub fn remove_event_listener(&self, event_type: &str, listener: &Listener<P>) {
        if let Some(set) = self.listeners.borrow_mut().get_mut(event_type) {
            set.retain(|l| !Rc::ptr_eq(l, listener));
        }
    }

    /// Whether `listener` is currently registered for `event_type`.
    #[must_use]
    pub fn has_listener(&self, event_type: &str, listener: &Listener<P>) -> bool {
        self.listeners
            .borrow()
            .get(event_type)
            .is_some_and(|set| set.iter().any(|l| Rc::ptr_eq(l, listener)))
    }

    /// Number of listeners registered for `event_type`.
    #[must_use]
    pub fn listener_count(&self, event_type: &str) -> usize {
        self.listeners.borrow().get(event_type).map_or(0, Vec::len)
    }

    /// Event types that currently have at least one listener.
    #[must_use]
    pub fn event_types(&self) -> Vec<String> {
        self.listeners
            .borrow()
            .iter()
            .filter(|(_, set)| !set.is_empty())
            .map(|(ty, _)| ty.clone())
            .collect()
    }

    /// Drop every listener for every event type. The stored value is kept.
    pub fn clear(&self) {
        self.listeners.borrow_mut().clear();
    }

    /// Invoke every listener registered for `event_type`, in registration
    /// order, with `{type: event_type, detail}`.
    ///
    /// Does not modify the stored value.
    pub fn dispatch_event(&self, event_type: &str, detail: &P) {
        let snapshot: Vec<Listener<P>> = match self.listeners.borrow().get(event_type) {
            Some(set) if !set.is_empty() => set.clone(),
            _ => return,
        };
        let event = Event { event_type, detail };
        for cb in &snapshot {
            cb(&event);
        }
    }
}

impl<V: Clone> EventDispatcher<Change<V>> {
    /// Create a dispatcher pre-seeded with `value`. No event is fired.
    #[must_use]
    pub fn with_value(value: V) -> Self {
        let dispatcher = Self::new();
        *dispatcher.value.borrow_mut() = Some(Change::new(value));
        dispatcher
    }

    /// Store `value`, then dispatch exactly one [`CHANGE`] event carrying it.
    pub fn set_value(&self, value: V) {
        let change = Change::new(value);
        *self.value.borrow_mut() = Some(change.clone());
        self.dispatch_event(CHANGE, &change);
    }

    /// Last value passed to [`set_value`](Self::set_value), if any.
    #[must_use]
    pub fn value(&self) -> Option<V> {
        self.value.borrow().as_ref().map(|c| c.value.clone())
    }
}

impl<P> Default for EventDispatcher<P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P> std::fmt::Debug for EventDispatcher<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let listeners = self.listeners.borrow();
        let total: usize = listeners.values().map(Vec::len).sum();
        f.debug_struct("EventDispatcher")
            .field("event_types", &listeners.len())
            .field("listener_count", &total)
            .field("has_value", &self.value.borrow().is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    fn counter<P>() -> (Rc<Cell<u32>>, Listener<P>) {
        let count = Rc::new(Cell::new(0u32));
        let c = Rc::clone(&count);
        (count, listener(move |_| c.set(c.get() + 1)))
    }

    #[test]
    fn both_listeners_receive_type_and_detail() {
        let dispatcher = EventDispatcher::<u32>::new();
        let seen = Rc::new(RefCell::new(Vec::new()));

        let s1 = Rc::clone(&seen);
        let l1 = listener(move |e: &Event<'_, u32>| {
            s1.borrow_mut().push(("l1", e.event_type.to_owned(), *e.detail));
        });
        let s2 = Rc::clone(&seen);
        let l2 = listener(move |e: &Event<'_, u32>| {
            s2.borrow_mut().push(("l2", e.event_type.to_owned(), *e.detail));
        });

        dispatcher.add_event_listener("event1", &l1);
        dispatcher.add_event_listener("event1", &l2);
        dispatcher.dispatch_event("event1", &7);

        assert_eq!(
            *seen.borrow(),
            vec![
                ("l1", "event1".to_owned(), 7),
                ("l2", "event1".to_owned(), 7),
            ]
        );
    }

    #[test]
    fn dispatch_only_reaches_matching_type() {
        let dispatcher = EventDispatcher::<()>::new();
        let (a, la) = counter();
        let (b, lb) = counter();
        dispatcher.add_event_listener("event1", &la);
        dispatcher.add_event_listener("event2", &lb);

        dispatcher.dispatch_event("event1", &());
        assert_eq!(a.get(), 1);
        assert_eq!(b.get(), 0);

        dispatcher.dispatch_event("event2", &());
        assert_eq!(a.get(), 1);
        assert_eq!(b.get(), 1);
    }

    #[test]
    fn duplicate_registration_is_stored_once() {
        let dispatcher = EventDispatcher::<()>::new();
        let (count, l) = counter();
        dispatcher.add_event_listener("tick", &l);
        dispatcher.add_event_listener("tick", &l);
        assert_eq!(dispatcher.listener_count("tick"), 1);

        dispatcher.dispatch_event("tick", &());
        assert_eq!(count.get(), 1);

        dispatcher.remove_event_listener("tick", &l);
        dispatcher.dispatch_event("tick", &());
        assert_eq!(count.get(), 1, "single removal detaches a double add");
    }

    #[test]
    fn remove_unknown_is_noop() {
        let dispatcher = EventDispatcher::<()>::new();
        let (_, l) = counter();
        dispatcher.remove_event_listener("never", &l);
        assert_eq!(dispatcher.listener_count("never"), 0);
    }

    #[test]
    fn dispatch_without_listeners_is_noop() {
        let dispatcher = ValueDispatcher::<i32>::new();
        dispatcher.dispatch_event(CHANGE, &Change::new(3));
        assert_eq!(dispatcher.value(), None, "dispatch does not store a value");
    }

    #[test]
    fn set_value_stores_and_fires_once() {
        let dispatcher = ValueDispatcher::<String>::new();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let s = Rc::clone(&seen);
        let l = listener(move |e: &Event<'_, Change<String>>| {
            s.borrow_mut().push(e.detail.value.clone());
        });
        dispatcher.add_event_listener(CHANGE, &l);

        dispatcher.set_value("foo".to_owned());
        assert_eq!(*seen.borrow(), vec!["foo".to_owned()]);
        assert_eq!(dispatcher.value().as_deref(), Some("foo"));
    }

    #[test]
    fn with_value_does_not_dispatch() {
        let dispatcher = ValueDispatcher::with_value(5);
        assert_eq!(dispatcher.value(), Some(5));
    }

    #[test]
    fn listener_removed_mid_round_still_runs_that_round() {
        let dispatcher = Rc::new(EventDispatcher::<()>::new());
        let (count, victim) = counter();

        let d = Rc::clone(&dispatcher);
        let v = Rc::clone(&victim);
        let remover = listener(move |_| d.remove_event_listener("go", &v));

        dispatcher.add_event_listener("go", &remover);
        dispatcher.add_event_listener("go", &victim);

        dispatcher.dispatch_event("go", &());
        assert_eq!(count.get(), 1);
        dispatcher.dispatch_event("go", &());
        assert_eq!(count.get(), 1);
    }

    #[test]
    fn listener_can_set_value_reentrantly() {
        let dispatcher = Rc::new(ValueDispatcher::<u32>::new());
        let d = Rc::clone(&dispatcher);
        let bump = listener(move |e: &Event<'_, Change<u32>>| {
            if e.detail.value < 3 {
                d.set_value(e.detail.value + 1);
            }
        });
        dispatcher.add_event_listener(CHANGE, &bump);

        dispatcher.set_value(0);
        assert_eq!(dispatcher.value(), Some(3));
    }

    #[test]
    fn event_types_lists_only_live_sets() {
        let dispatcher = EventDispatcher::<()>::new();
        let (_, l) = counter();
        dispatcher.add_event_listener("a", &l);
        dispatcher.add_event_listener("b", &l);
        dispatcher.remove_event_listener("b", &l);

        assert_eq!(dispatcher.event_types(), vec!["a".to_owned()]);
        dispatcher.clear();
        assert!(dispatcher.event_types().is_empty());
    }

    #[test]
    #[should_panic(expected = "listener failed")]
    fn listener_panic_propagates() {
        let dispatcher = EventDispatcher::<()>::new();
        let boom = listener(|_| panic!("listener failed"));
        dispatcher.add_event_listener("x", &boom);
        dispatcher.dispatch_event("x", &());
    }

    #[test]
    fn debug_format() {
        let dispatcher = EventDispatcher::<()>::new();
        let (_, l) = counter();
        dispatcher.add_event_listener("a", &l);
        let dbg = format!("{dispatcher:?}");
        assert!(dbg.contains("listener_count: 1"));
    }
}
