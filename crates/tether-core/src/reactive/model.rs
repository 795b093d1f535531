#![forbid(unsafe_code)]

//! Keyed data model with per-key change notification.
//!
//! [`KeyedModel<K, V>`] stores a map of values and fires a
//! [`CHANGE`](super::CHANGE) event on the key's own channel whenever
//! [`set`](KeyedModel::set) is called for that key. A [`ModelField`] projects a
//! single key as an [`Endpoint`], so one model can feed several bindings.
//!
//! # Invariants
//!
//! 1. Listeners registered for key `a` never observe writes to key `b`.
//! 2. Each `set` fires exactly one change event on that key's channel, even
//!    when the value is unchanged.
//! 3. A field for a missing key reads as `V::default()`.

use std::cell::RefCell;
use std::hash::Hash;
use std::rc::Rc;

use ahash::AHashMap;

use super::dispatcher::{CHANGE, Change, Listener, ValueDispatcher};
use super::endpoint::Endpoint;

/// A keyed value store with per-key change channels.
pub struct KeyedModel<K, V> {
    data: RefCell<AHashMap<K, V>>,
    channels: RefCell<AHashMap<K, Rc<ValueDispatcher<V>>>>,
}

impl<K, V> KeyedModel<K, V>
where
    K: Eq + Hash + Clone + 'static,
    V: Clone + 'static,
{
    /// Create an empty shared model.
    #[must_use]
    pub fn new() -> Rc<Self> {
        Rc::new(Self {
            data: RefCell::new(AHashMap::new()),
            channels: RefCell::new(AHashMap::new()),
        })
    }

    /// Create a shared model seeded with `entries`. No events fire.
    #[must_use]
    pub fn from_entries(entries: impl IntoIterator<Item = (K, V)>) -> Rc<Self> {
        let model = Self::new();
        model.data.borrow_mut().extend(entries);
        model
    }

    /// Value stored under `key`.
    #[must_use]
    pub fn get(&self, key: &K) -> Option<V> {
        self.data.borrow().get(key).cloned()
    }

    /// Whether `key` holds a value.
    #[must_use]
    pub fn contains_key(&self, key: &K) -> bool {
        self.data.borrow().contains_key(key)
    }

    /// Number of stored keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.borrow().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.borrow().is_empty()
    }

    /// Store `value` under `key` and notify that key's listeners.
    pub fn set(&self, key: K, value: V) {
        self.data.borrow_mut().insert(key.clone(), value.clone());
        let channel = self.channels.borrow().get(&key).cloned();
        if let Some(channel) = channel {
            channel.set_value(value);
        }
    }

    /// Register `listener` for changes to `key`.
    pub fn add_listener(&self, key: K, listener: &Listener<Change<V>>) {
        self.channel(key).add_event_listener(CHANGE, listener);
    }

    /// Unregister `listener` from `key`. No-op if absent.
    pub fn remove_listener(&self, key: &K, listener: &Listener<Change<V>>) {
        if let Some(channel) = self.channels.borrow().get(key) {
            channel.remove_event_listener(CHANGE, listener);
        }
    }

    /// An endpoint reading and writing `key` on this model.
    #[must_use]
    pub fn field(self: &Rc<Self>, key: K) -> Rc<ModelField<K, V>> {
        let channel = self.channel(key.clone());
        Rc::new(ModelField {
            model: Rc::clone(self),
            key,
            channel,
        })
    }

    fn channel(&self, key: K) -> Rc<ValueDispatcher<V>> {
        Rc::clone(
            self.channels
                .borrow_mut()
                .entry(key)
                .or_insert_with(|| Rc::new(ValueDispatcher::new())),
        )
    }
}

impl<K, V> std::fmt::Debug for KeyedModel<K, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyedModel")
            .field("len", &self.data.borrow().len())
            .field("channels", &self.channels.borrow().len())
            .finish()
    }
}

/// One key of a [`KeyedModel`] exposed as an [`Endpoint`].
pub struct ModelField<K, V> {
    model: Rc<KeyedModel<K, V>>,
    key: K,
    channel: Rc<ValueDispatcher<V>>,
}

impl<K, V> ModelField<K, V> {
    /// The projected key.
    #[must_use]
    pub fn key(&self) -> &K {
        &self.key
    }

    /// The model this field reads from.
    #[must_use]
    pub fn model(&self) -> &Rc<KeyedModel<K, V>> {
        &self.model
    }
}

impl<K, V> Endpoint<V> for ModelField<K, V>
where
    K: Eq + Hash + Clone + 'static,
    V: Clone + Default + 'static,
{
    fn get_value(&self) -> V {
        self.model.get(&self.key).unwrap_or_default()
    }

    fn set_value(&self, value: V) {
        self.model.set(self.key.clone(), value);
    }

    fn changes(&self) -> Option<&ValueDispatcher<V>> {
        Some(&self.channel)
    }
}

impl<K: std::fmt::Debug, V> std::fmt::Debug for ModelField<K, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelField").field("key", &self.key).finish()
    }
}
