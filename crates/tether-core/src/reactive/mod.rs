#![forbid(unsafe_code)]

//! Two-way data binding between model and view endpoints.
//!
//! This module provides the synchronization primitives:
//!
//! - [`EventDispatcher`]: per-event-type publish/subscribe with an optional
//!   last-known value.
//! - [`Endpoint`]: the `get_value`/`set_value` capability shared by models and
//!   views, with [`ValueCell`] and [`ModelField`] as ready-made endpoints.
//! - [`Binding`]: keeps one source endpoint and one target endpoint equal.
//! - [`BindingManager`]: ordered registry for bulk teardown by source or
//!   target.
//!
//! # Architecture
//!
//! Everything is single-threaded and synchronous. Shared state lives behind
//! `Rc`/`RefCell`/`Cell`; no borrow is held while a listener runs, so
//! dispatch is fully re-entrant.
//!
//! A `Binding` owns two internal dispatchers (`model` and `view`) that
//! mediate every change. Endpoint notifications are relayed into them while
//! the binding is bound; writes back out to endpoints go through an equality
//! check and a re-entrancy guard.
//!
//! # Invariants
//!
//! 1. A listener handle is registered at most once per event type.
//! 2. `set_value` fires exactly one `"change"` event.
//! 3. A bound binding has exactly one listener on each internal dispatcher.
//! 4. A change written into an endpoint by a binding never loops back through
//!    that same binding.
//! 5. The manager only does bookkeeping; removing a binding does not unbind it
//!    unless configured to.

pub mod binding;
pub mod dispatcher;
pub mod endpoint;
pub mod manager;
pub mod model;

pub use binding::{Binding, BindingId, Side};
pub use dispatcher::{
    CHANGE, Change, Event, EventDispatcher, Listener, ValueDispatcher, listener,
};
pub use endpoint::{Endpoint, EndpointId, ValueCell};
pub use manager::{BindingManager, ManagedBinding};
pub use model::{KeyedModel, ModelField};
