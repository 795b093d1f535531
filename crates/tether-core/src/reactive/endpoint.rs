#![forbid(unsafe_code)]

//! The endpoint capability shared by models and views.
//!
//! A [`Binding`](super::Binding) only ever reads and writes its endpoints
//! through [`Endpoint::get_value`] and [`Endpoint::set_value`]. Endpoints that
//! also expose a change channel via [`Endpoint::changes`] have their own
//! notifications relayed into the binding while it is bound.

use std::cell::RefCell;
use std::rc::Rc;

use super::dispatcher::ValueDispatcher;

/// A value holder that can serve as a binding's source or target.
pub trait Endpoint<V> {
    /// Current value. Must not have side effects.
    fn get_value(&self) -> V;

    /// Apply a new value. Implementations may notify observers.
    fn set_value(&self, value: V);

    /// Change notifications emitted by this endpoint, if it has any.
    fn changes(&self) -> Option<&ValueDispatcher<V>> {
        None
    }
}

/// Identity of a shared endpoint allocation.
///
/// Two ids are equal exactly when they were taken from handles to the same
/// `Rc` allocation. An id stays unique for as long as any strong or weak
/// handle to that allocation is alive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EndpointId(usize);

impl EndpointId {
    /// Identity of the allocation behind `endpoint`.
    #[must_use]
    pub fn of<E: ?Sized>(endpoint: &Rc<E>) -> Self {
        Self(Rc::as_ptr(endpoint).cast::<()>() as usize)
    }

    pub(crate) fn from_ptr<E: ?Sized>(ptr: *const E) -> Self {
        Self(ptr.cast::<()>() as usize)
    }

    /// Raw address, for diagnostics only.
    #[inline]
    #[must_use]
    pub const fn addr(self) -> usize {
        self.0
    }
}

/// A standalone value holder with change notification.
///
/// Every [`set_value`](Endpoint::set_value) stores the value and emits one
/// [`CHANGE`](super::CHANGE) event, even when the value is unchanged. Suitable
/// as either side of a binding.
pub struct ValueCell<V> {
    value: RefCell<V>,
    changes: ValueDispatcher<V>,
}

impl<V: Clone + 'static> ValueCell<V> {
    /// Create a shared cell holding `value`.
    #[must_use]
    pub fn new(value: V) -> Rc<Self> {
        Rc::new(Self {
            value: RefCell::new(value),
            changes: ValueDispatcher::new(),
        })
    }

    /// Current value.
    #[must_use]
    pub fn get(&self) -> V {
        self.value.borrow().clone()
    }

    /// Store `value` and notify.
    pub fn set(&self, value: V) {
        *self.value.borrow_mut() = value.clone();
        self.changes.set_value(value);
    }

    /// The cell's change channel.
    #[must_use]
    pub fn dispatcher(&self) -> &ValueDispatcher<V> {
        &self.changes
    }
}

impl<V: Clone + 'static> Endpoint<V> for ValueCell<V> {
    fn get_value(&self) -> V {
        self.get()
    }

    fn set_value(&self, value: V) {
        self.set(value);
    }

    fn changes(&self) -> Option<&ValueDispatcher<V>> {
        Some(&self.changes)
    }
}

impl<V: std::fmt::Debug> std::fmt::Debug for ValueCell<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ValueCell")
            .field("value", &*self.value.borrow())
            .field("changes", &self.changes)
            .finish()
    }
}
