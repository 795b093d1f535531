#![forbid(unsafe_code)]

//! Registry of live bindings for bulk teardown.
//!
//! A [`BindingManager`] collects bindings for a logical scope (a component, a
//! form, a screen) so they can be released together, by source, or by target.
//! It never takes part in propagation.
//!
//! # Usage
//!
//! ```
//! use tether_core::{Binding, BindingManager, ValueCell};
//!
//! let name = ValueCell::new(String::from("ada"));
//! let label = ValueCell::new(String::new());
//! let input = ValueCell::new(String::new());
//!
//! let mut manager = BindingManager::new();
//! manager.add_binding(Binding::new(&name, &label));
//! manager.add_binding(Binding::new(&name, &input));
//! manager.bind_all().unwrap();
//! assert_eq!(input.get(), "ada");
//!
//! assert_eq!(manager.remove_bindings_for_target(&label), 1);
//! assert_eq!(manager.len(), 1);
//! ```
//!
//! # Invariants
//!
//! 1. Insertion order is preserved; duplicates are allowed.
//! 2. Bulk removal keeps the relative order of the survivors.
//! 3. `remove_binding` removes at most one entry: the first identical one.
//! 4. Removal is silent when nothing matches.
//! 5. Removed bindings stay bound unless
//!    [`ManagerConfig::unbind_on_remove`] is set. Note that a binding whose
//!    last `Rc` was held by the manager is dropped, and a dropped binding
//!    always unbinds.

use std::rc::Rc;

use tracing::debug;

use super::binding::{Binding, BindingId};
use super::endpoint::EndpointId;
use crate::config::ManagerConfig;
use crate::error::BindingError;

/// Type-erased view of a binding, so one manager can hold bindings over
/// different value types.
pub trait ManagedBinding {
    fn binding_id(&self) -> BindingId;

    fn source_id(&self) -> EndpointId;

    fn target_id(&self) -> EndpointId;

    fn bind(&self) -> Result<(), BindingError>;

    fn unbind(&self);

    fn is_bound(&self) -> bool;
}

impl<V: Clone + PartialEq + 'static> ManagedBinding for Binding<V> {
    fn binding_id(&self) -> BindingId {
        self.id()
    }

    fn source_id(&self) -> EndpointId {
        Binding::source_id(self)
    }

    fn target_id(&self) -> EndpointId {
        Binding::target_id(self)
    }

    fn bind(&self) -> Result<(), BindingError> {
        Binding::bind(self)
    }

    fn unbind(&self) {
        Binding::unbind(self);
    }

    fn is_bound(&self) -> bool {
        Binding::is_bound(self)
    }
}

/// Ordered registry of bindings.
#[derive(Default)]
pub struct BindingManager {
    bindings: Vec<Rc<dyn ManagedBinding>>,
    config: ManagerConfig,
}

impl BindingManager {
    /// Create an empty manager with the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_config(config: ManagerConfig) -> Self {
        Self {
            bindings: Vec::new(),
            config,
        }
    }

    #[must_use]
    pub fn config(&self) -> &ManagerConfig {
        &self.config
    }

    /// Append `binding`. No de-duplication, no validation.
    pub fn add_binding(&mut self, binding: Rc<dyn ManagedBinding>) {
        debug!(binding = %binding.binding_id(), "registry add");
        self.bindings.push(binding);
    }

    /// Remove the first entry that is the same allocation as `binding`.
    ///
    /// Returns whether an entry was removed.
    pub fn remove_binding<B: ?Sized>(&mut self, binding: &Rc<B>) -> bool {
        let Some(index) = self.position(binding) else {
            return false;
        };
        let removed = self.bindings.remove(index);
        self.release(vec![removed]);
        true
    }

    /// Remove every binding whose source is `source`. Returns the count.
    pub fn remove_bindings_for_source<E: ?Sized>(&mut self, source: &Rc<E>) -> usize {
        self.remove_bindings_for_source_id(EndpointId::of(source))
    }

    pub fn remove_bindings_for_source_id(&mut self, source: EndpointId) -> usize {
        self.remove_where(|b| b.source_id() == source)
    }

    /// Remove every binding whose target is `target`. Returns the count.
    pub fn remove_bindings_for_target<E: ?Sized>(&mut self, target: &Rc<E>) -> usize {
        self.remove_bindings_for_target_id(EndpointId::of(target))
    }

    pub fn remove_bindings_for_target_id(&mut self, target: EndpointId) -> usize {
        self.remove_where(|b| b.target_id() == target)
    }

    /// Whether `binding` is registered at least once.
    #[must_use]
    pub fn contains<B: ?Sized>(&self, binding: &Rc<B>) -> bool {
        self.position(binding).is_some()
    }

    /// Registered bindings in insertion order.
    #[must_use]
    pub fn bindings(&self) -> &[Rc<dyn ManagedBinding>] {
        &self.bindings
    }

    /// Number of registered entries (duplicates counted).
    #[must_use]
    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    /// Bind every registered binding in order.
    ///
    /// # Errors
    ///
    /// Stops at the first binding that fails to bind; earlier ones stay bound.
    pub fn bind_all(&self) -> Result<(), BindingError> {
        for binding in &self.bindings {
            binding.bind()?;
        }
        Ok(())
    }

    /// Unbind every registered binding. The registry is left unchanged.
    pub fn unbind_all(&self) {
        for binding in &self.bindings {
            binding.unbind();
        }
    }

    /// Remove every entry.
    pub fn clear(&mut self) {
        let removed = std::mem::take(&mut self.bindings);
        self.release(removed);
    }

    fn position<B: ?Sized>(&self, binding: &Rc<B>) -> Option<usize> {
        self.bindings
            .iter()
            .position(|b| std::ptr::addr_eq(Rc::as_ptr(b), Rc::as_ptr(binding)))
    }

    fn remove_where(&mut self, mut pred: impl FnMut(&dyn ManagedBinding) -> bool) -> usize {
        let mut removed = Vec::new();
        self.bindings.retain(|b| {
            if pred(b.as_ref()) {
                removed.push(Rc::clone(b));
                false
            } else {
                true
            }
        });
        let count = removed.len();
        self.release(removed);
        count
    }

    fn release(&self, removed: Vec<Rc<dyn ManagedBinding>>) {
        if removed.is_empty() {
            return;
        }
        debug!(
            count = removed.len(),
            unbind = self.config.unbind_on_remove,
            remaining = self.bindings.len(),
            "registry remove"
        );
        if self.config.unbind_on_remove {
            for binding in &removed {
                binding.unbind();
            }
        }
    }
}

impl std::fmt::Debug for BindingManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BindingManager")
            .field("binding_count", &self.bindings.len())
            .field("config", &self.config)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
