#![forbid(unsafe_code)]

//! Two-way binding between a source (model) endpoint and a target (view)
//! endpoint.
//!
//! A [`Binding<V>`] never talks to its endpoints directly from the outside
//! world. It owns two internal [`ValueDispatcher`]s that mediate propagation:
//!
//! - `model` carries changes attributed to the source side. Each change is
//!   pushed outward into the target via [`Binding::update_view`].
//! - `view` carries changes attributed to the target side. Each change is
//!   written into the source and then forwarded to `model`.
//!
//! Endpoints that expose a change channel ([`Endpoint::changes`]) have their
//! own `"change"` events relayed into `model`/`view` while the binding is
//! bound. Other endpoints are driven by calling `set_value` on
//! [`Binding::model`] or [`Binding::view`].
//!
//! # Usage
//!
//! ```
//! use tether_core::{Binding, ValueCell};
//!
//! let source = ValueCell::new(String::from("foo"));
//! let target = ValueCell::new(String::new());
//!
//! let binding = Binding::new(&source, &target);
//! binding.bind().unwrap();
//! assert_eq!(target.get(), "foo");
//!
//! target.set("typed".into());
//! assert_eq!(source.get(), "typed");
//!
//! binding.unbind();
//! source.set("bar".into());
//! assert_eq!(target.get(), "typed");
//! ```
//!
//! # Invariants
//!
//! 1. After `bind()` and before `unbind()`, exactly one binding listener is
//!    attached to `model` and exactly one to `view`. `unbind()` removes those
//!    two and nothing else.
//! 2. `bind()` is idempotent: listener handles are stored once, so a second
//!    call re-runs the initial sync but never doubles propagation.
//! 3. A change forced onto an endpoint by the binding does not re-enter the
//!    binding's own pipeline: the write is skipped when the endpoint already
//!    holds the value, and a handler call arriving while the binding is
//!    writing is dropped if it carries the value being written.
//! 4. A different value arriving mid-write (an observer adjusting either
//!    endpoint) is deferred and replayed after the write, so both endpoints
//!    end up holding the latest value.
//! 5. The binding holds only weak references to its endpoints.
//! 6. Dropping a `Binding` unbinds it.
//!
//! # Failure Modes
//!
//! - Endpoint dropped before `bind()`: [`BindingError::EndpointDropped`],
//!   nothing attached.
//! - Endpoint dropped while bound: writes to it are skipped and logged.
//! - Endpoint or listener panic: propagates to whoever triggered the change.
//!   The in-flight marker is restored during unwinding and any deferred
//!   change is discarded.
//! - Cycles spanning three or more bindings are not detected and may recurse
//!   without bound.

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};
use std::sync::atomic::{AtomicU64, Ordering};

use tracing::{debug, trace};

use super::dispatcher::{CHANGE, Change, Event, Listener, ValueDispatcher, listener};
use super::endpoint::{Endpoint, EndpointId};
use crate::config::{BindingConfig, InitialSync};
use crate::error::{BindingError, ConfigError};

/// Global counter for binding ids.
static BINDING_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Process-unique identifier of a binding, used in diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BindingId(u64);

impl BindingId {
    fn next() -> Self {
        Self(BINDING_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw id value.
    #[inline]
    pub const fn id(self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for BindingId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// One side of a binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Side {
    /// The model endpoint, mediated by the `model` dispatcher.
    Source,
    /// The view endpoint, mediated by the `view` dispatcher.
    Target,
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Source => "source",
            Self::Target => "target",
        })
    }
}

// ---------------------------------------------------------------------------
// PropagationGuard
// ---------------------------------------------------------------------------

/// Records the value a binding is writing for the guard's lifetime, restoring
/// the previous state on drop (including during unwinding).
///
/// A deferred change left over from an unwinding write is discarded.
struct PropagationGuard<'a, V> {
    in_flight: &'a RefCell<Option<V>>,
    pending: &'a RefCell<Option<(Side, V)>>,
    prev: Option<V>,
}

impl<'a, V> PropagationGuard<'a, V> {
    fn enter(
        in_flight: &'a RefCell<Option<V>>,
        pending: &'a RefCell<Option<(Side, V)>>,
        value: V,
    ) -> Self {
        let prev = in_flight.replace(Some(value));
        Self {
            in_flight,
            pending,
            prev,
        }
    }
}

impl<V> Drop for PropagationGuard<'_, V> {
    fn drop(&mut self) {
        *self.in_flight.borrow_mut() = self.prev.take();
        if std::thread::panicking() {
            self.pending.borrow_mut().take();
        }
    }
}

// ---------------------------------------------------------------------------
// Binding<V>
// ---------------------------------------------------------------------------

/// Bidirectional link between one source endpoint and one target endpoint.
///
/// Created as `Rc<Binding<V>>` so its listeners can refer back to it weakly.
pub struct Binding<V: 'static> {
    id: BindingId,
    source: Weak<dyn Endpoint<V>>,
    target: Weak<dyn Endpoint<V>>,
    source_id: EndpointId,
    target_id: EndpointId,
    model: ValueDispatcher<V>,
    view: ValueDispatcher<V>,
    handle_view_change: Listener<Change<V>>,
    handle_model_change: Listener<Change<V>>,
    source_relay: Listener<Change<V>>,
    target_relay: Listener<Change<V>>,
    /// Value being written by this binding, while a write is running.
    in_flight: RefCell<Option<V>>,
    /// Re-entrant change that differs from `in_flight`, replayed once the
    /// write completes. `Side` is where the change came from.
    pending: RefCell<Option<(Side, V)>>,
    bound: Cell<bool>,
    config: BindingConfig,
}

impl<V: Clone + PartialEq + 'static> Binding<V> {
    /// Create an unbound binding with the default configuration.
    ///
    /// The `model` dispatcher is wired to [`update_view`](Self::update_view)
    /// right away; everything else waits for [`bind`](Self::bind).
    pub fn new<S, T>(source: &Rc<S>, target: &Rc<T>) -> Rc<Self>
    where
        S: Endpoint<V> + 'static,
        T: Endpoint<V> + 'static,
    {
        let source: Weak<S> = Rc::downgrade(source);
        let target: Weak<T> = Rc::downgrade(target);
        Self::build(source, target, BindingConfig::default())
    }

    /// Create an unbound binding with `config`.
    ///
    /// # Errors
    ///
    /// [`ConfigError::NoCycleBreaker`] if `config` disables both equality
    /// skipping and the re-entrancy guard.
    pub fn with_config<S, T>(
        source: &Rc<S>,
        target: &Rc<T>,
        config: BindingConfig,
    ) -> Result<Rc<Self>, ConfigError>
    where
        S: Endpoint<V> + 'static,
        T: Endpoint<V> + 'static,
    {
        config.validate()?;
        let source: Weak<S> = Rc::downgrade(source);
        let target: Weak<T> = Rc::downgrade(target);
        Ok(Self::build(source, target, config))
    }

    /// Create an unbound binding between type-erased endpoints.
    pub fn from_dyn(
        source: &Rc<dyn Endpoint<V>>,
        target: &Rc<dyn Endpoint<V>>,
        config: BindingConfig,
    ) -> Result<Rc<Self>, ConfigError> {
        config.validate()?;
        Ok(Self::build(Rc::downgrade(source), Rc::downgrade(target), config))
    }

    fn build(
        source: Weak<dyn Endpoint<V>>,
        target: Weak<dyn Endpoint<V>>,
        config: BindingConfig,
    ) -> Rc<Self> {
        Rc::new_cyclic(|me: &Weak<Self>| {
            let w = me.clone();
            let handle_view_change = listener(move |event: &Event<'_, Change<V>>| {
                if let Some(binding) = w.upgrade() {
                    binding.handle_view_change(event);
                }
            });
            let w = me.clone();
            let handle_model_change = listener(move |event: &Event<'_, Change<V>>| {
                if let Some(binding) = w.upgrade() {
                    binding.handle_model_change(event);
                }
            });
            let w = me.clone();
            let source_relay = listener(move |event: &Event<'_, Change<V>>| {
                if let Some(binding) = w.upgrade() {
                    binding.model.set_value(event.detail.value.clone());
                }
            });
            let w = me.clone();
            let target_relay = listener(move |event: &Event<'_, Change<V>>| {
                if let Some(binding) = w.upgrade() {
                    binding.view.set_value(event.detail.value.clone());
                }
            });

            let model = ValueDispatcher::new();
            model.add_event_listener(CHANGE, &handle_model_change);

            let id = BindingId::next();
            trace!(binding = %id, "binding created");
            Self {
                id,
                source_id: EndpointId::from_ptr(source.as_ptr()),
                target_id: EndpointId::from_ptr(target.as_ptr()),
                source,
                target,
                model,
                view: ValueDispatcher::new(),
                handle_view_change,
                handle_model_change,
                source_relay,
                target_relay,
                in_flight: RefCell::new(None),
                pending: RefCell::new(None),
                bound: Cell::new(false),
                config,
            }
        })
    }

    /// Activate propagation in both directions, then run the initial sync
    /// selected by [`BindingConfig::initial_sync`].
    ///
    /// Calling `bind()` on a bound binding re-runs the initial sync only.
    ///
    /// # Errors
    ///
    /// [`BindingError::EndpointDropped`] if either endpoint is gone. Nothing is
    /// attached in that case.
    pub fn bind(&self) -> Result<(), BindingError> {
        let source = self.source.upgrade().ok_or(BindingError::EndpointDropped {
            binding: self.id,
            side: Side::Source,
        })?;
        let target = self.target.upgrade().ok_or(BindingError::EndpointDropped {
            binding: self.id,
            side: Side::Target,
        })?;

        self.view.add_event_listener(CHANGE, &self.handle_view_change);
        self.model.add_event_listener(CHANGE, &self.handle_model_change);
        if self.config.relay_endpoint_changes {
            if let Some(changes) = source.changes() {
                changes.add_event_listener(CHANGE, &self.source_relay);
            }
            if let Some(changes) = target.changes() {
                changes.add_event_listener(CHANGE, &self.target_relay);
            }
        }

        let rebind = self.bound.replace(true);
        debug!(binding = %self.id, rebind, initial_sync = ?self.config.initial_sync, "bind");

        match self.config.initial_sync {
            InitialSync::SourceToTarget => self.update_view(None),
            InitialSync::TargetToSource => self.update_model(target.get_value()),
            InitialSync::Skip => {}
        }
        Ok(())
    }

    /// Push a model-side value into the target.
    ///
    /// With `event`, the value is `event.detail.value`; without one (the
    /// initial sync pass) it is read from the source. The target is written
    /// only if its current value differs, unless
    /// [`BindingConfig::skip_equal_writes`] is off.
    pub fn update_view(&self, event: Option<&Event<'_, Change<V>>>) {
        let value = match event {
            Some(event) => event.detail.value.clone(),
            None => match self.source.upgrade() {
                Some(source) => source.get_value(),
                None => {
                    debug!(binding = %self.id, "source dropped; sync skipped");
                    return;
                }
            },
        };
        self.write(Side::Target, value);
    }

    /// Push a view-side value into the source, under the same equality rule as
    /// [`update_view`](Self::update_view).
    pub fn update_model(&self, value: V) {
        self.write(Side::Source, value);
    }

    /// Handler installed on the `view` dispatcher: write the value into the
    /// source, then forward it to `model`.
    pub fn handle_view_change(&self, event: &Event<'_, Change<V>>) {
        if self.intercepted(Side::Target, &event.detail.value) {
            return;
        }
        self.apply_view_value(event.detail.value.clone());
    }

    /// Handler installed on the `model` dispatcher: propagate outward to the
    /// target.
    pub fn handle_model_change(&self, event: &Event<'_, Change<V>>) {
        if self.intercepted(Side::Source, &event.detail.value) {
            return;
        }
        self.update_view(Some(event));
    }

    /// Write a view-side value into the source and forward it to `model`.
    ///
    /// The forward runs with the value in flight, so `handle_model_change`
    /// does not write it back into a target that already holds it. A target
    /// that does not (the `view` dispatcher was driven directly) is written
    /// once here.
    fn apply_view_value(&self, value: V) {
        let forward = value.clone();
        self.guarded(value.clone(), || {
            self.update_model(value.clone());
            self.model.set_value(forward);
            let target_holds = self
                .target
                .upgrade()
                .is_some_and(|target| target.get_value() == value);
            if !target_holds {
                self.write(Side::Target, value);
            }
        });
    }

    /// Whether a handler call arrived while this binding is writing.
    ///
    /// An echo of the value being written is dropped. Any other value is kept
    /// as the pending change and replayed once the write completes.
    fn intercepted(&self, origin: Side, value: &V) -> bool {
        if !self.config.reentrancy_guard {
            return false;
        }
        let echo = match self.in_flight.borrow().as_ref() {
            None => return false,
            Some(writing) => writing == value,
        };
        if echo {
            trace!(binding = %self.id, %origin, "re-entrant echo dropped");
        } else {
            trace!(binding = %self.id, %origin, "re-entrant change deferred");
            *self.pending.borrow_mut() = Some((origin, value.clone()));
        }
        true
    }

    /// Run `f` with `value` marked as in flight, then replay any change that
    /// was deferred meanwhile.
    fn guarded(&self, value: V, f: impl FnOnce()) {
        if !self.config.reentrancy_guard {
            f();
            return;
        }
        {
            let _guard = PropagationGuard::enter(&self.in_flight, &self.pending, value);
            f();
        }
        if self.in_flight.borrow().is_some() {
            return;
        }
        loop {
            let next = self.pending.borrow_mut().take();
            let Some((origin, value)) = next else {
                break;
            };
            debug!(binding = %self.id, %origin, "replay deferred change");
            match origin {
                Side::Source => self.write(Side::Target, value),
                Side::Target => self.apply_view_value(value),
            }
        }
    }

    fn write(&self, side: Side, value: V) {
        let endpoint = match side {
            Side::Source => &self.source,
            Side::Target => &self.target,
        };
        let Some(endpoint) = endpoint.upgrade() else {
            debug!(binding = %self.id, %side, "endpoint dropped; write skipped");
            return;
        };
        if self.config.skip_equal_writes && endpoint.get_value() == value {
            trace!(binding = %self.id, %side, "value unchanged; write skipped");
            return;
        }
        trace!(binding = %self.id, %side, "propagate");
        self.guarded(value.clone(), || endpoint.set_value(value));
    }
}

impl<V: 'static> Binding<V> {
    /// Detach the two handlers installed by [`bind`](Self::bind), plus any
    /// endpoint relays. No-op on an unbound binding.
    pub fn unbind(&self) {
        self.view.remove_event_listener(CHANGE, &self.handle_view_change);
        self.model.remove_event_listener(CHANGE, &self.handle_model_change);
        if let Some(source) = self.source.upgrade() {
            if let Some(changes) = source.changes() {
                changes.remove_event_listener(CHANGE, &self.source_relay);
            }
        }
        if let Some(target) = self.target.upgrade() {
            if let Some(changes) = target.changes() {
                changes.remove_event_listener(CHANGE, &self.target_relay);
            }
        }
        if self.bound.replace(false) {
            debug!(binding = %self.id, "unbind");
        }
    }

    #[inline]
    #[must_use]
    pub fn id(&self) -> BindingId {
        self.id
    }

    /// The source endpoint, if its owner still holds it.
    #[must_use]
    pub fn source(&self) -> Option<Rc<dyn Endpoint<V>>> {
        self.source.upgrade()
    }

    /// The target endpoint, if its owner still holds it.
    #[must_use]
    pub fn target(&self) -> Option<Rc<dyn Endpoint<V>>> {
        self.target.upgrade()
    }

    #[must_use]
    pub fn source_id(&self) -> EndpointId {
        self.source_id
    }

    #[must_use]
    pub fn target_id(&self) -> EndpointId {
        self.target_id
    }

    /// Dispatcher mediating source-side changes.
    #[must_use]
    pub fn model(&self) -> &ValueDispatcher<V> {
        &self.model
    }

    /// Dispatcher mediating target-side changes.
    #[must_use]
    pub fn view(&self) -> &ValueDispatcher<V> {
        &self.view
    }

    /// Internal dispatcher for `side`.
    #[must_use]
    pub fn dispatcher(&self, side: Side) -> &ValueDispatcher<V> {
        match side {
            Side::Source => &self.model,
            Side::Target => &self.view,
        }
    }

    /// Observe one of the internal dispatchers.
    pub fn add_event_listener(&self, side: Side, event_type: &str, listener: &Listener<Change<V>>) {
        self.dispatcher(side).add_event_listener(event_type, listener);
    }

    pub fn remove_event_listener(
        &self,
        side: Side,
        event_type: &str,
        listener: &Listener<Change<V>>,
    ) {
        self.dispatcher(side).remove_event_listener(event_type, listener);
    }

    #[must_use]
    pub fn is_bound(&self) -> bool {
        self.bound.get()
    }

    #[must_use]
    pub fn config(&self) -> &BindingConfig {
        &self.config
    }
}

impl<V: 'static> Drop for Binding<V> {
    fn drop(&mut self) {
        self.unbind();
    }
}

impl<V: 'static> std::fmt::Debug for Binding<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Binding")
            .field("id", &self.id)
            .field("source", &self.source_id)
            .field("target", &self.target_id)
            .field("bound", &self.bound.get())
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
