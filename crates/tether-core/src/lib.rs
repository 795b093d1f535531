#![forbid(unsafe_code)]

//! Two-way data bindings for Rust UIs.
//!
//! `tether-core` keeps a model value and any number of view values in sync
//! without either side knowing about the other. See [`reactive`] for the
//! building blocks and [`config`] for tuning.
//!
//! ```
//! use tether_core::{Binding, BindingManager, ValueCell};
//!
//! let model = ValueCell::new(10);
//! let view = ValueCell::new(0);
//!
//! let mut bindings = BindingManager::new();
//! let binding = Binding::new(&model, &view);
//! bindings.add_binding(binding.clone());
//! binding.bind().unwrap();
//!
//! view.set(20);
//! assert_eq!(model.get(), 20);
//! ```

pub mod config;
pub mod error;
pub mod reactive;

pub use config::{BindingConfig, BindingPolicy, InitialSync, ManagerConfig};
pub use error::{BindingError, ConfigError};
pub use reactive::{
    Binding, BindingId, BindingManager, CHANGE, Change, Endpoint, EndpointId, Event,
    EventDispatcher, KeyedModel, Listener, ManagedBinding, ModelField, Side, ValueCell,
    ValueDispatcher, listener,
};
