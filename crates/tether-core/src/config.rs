#![forbid(unsafe_code)]

//! Binding and registry configuration.
//!
//! [`BindingConfig`] tunes how a single [`Binding`](crate::Binding) propagates;
//! [`ManagerConfig`] tunes [`BindingManager`](crate::BindingManager) teardown.
//! [`BindingPolicy`] bundles both so an application can ship them as data.
//!
//! With the `policy-config` feature, all three derive `serde` traits and
//! `BindingPolicy` can be loaded from TOML or JSON. Missing fields take their
//! defaults.

#[cfg(feature = "policy-config")]
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// What `bind()` does before returning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "policy-config", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "policy-config", serde(rename_all = "snake_case"))]
pub enum InitialSync {
    /// Copy the source value into the target.
    #[default]
    SourceToTarget,
    /// Copy the target value into the source.
    TargetToSource,
    /// Leave both endpoints untouched.
    Skip,
}

/// Propagation settings for one binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "policy-config", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "policy-config", serde(default))]
pub struct BindingConfig {
    pub initial_sync: InitialSync,
    /// Skip endpoint writes whose value already equals the endpoint's value.
    pub skip_equal_writes: bool,
    /// Drop handler invocations that re-enter while the binding is writing.
    pub reentrancy_guard: bool,
    /// Relay an endpoint's own change events into the binding while bound.
    pub relay_endpoint_changes: bool,
}

impl Default for BindingConfig {
    fn default() -> Self {
        Self {
            initial_sync: InitialSync::SourceToTarget,
            skip_equal_writes: true,
            reentrancy_guard: true,
            relay_endpoint_changes: true,
        }
    }
}

impl BindingConfig {
    #[must_use]
    pub fn with_initial_sync(mut self, initial_sync: InitialSync) -> Self {
        self.initial_sync = initial_sync;
        self
    }

    #[must_use]
    pub fn with_skip_equal_writes(mut self, skip: bool) -> Self {
        self.skip_equal_writes = skip;
        self
    }

    #[must_use]
    pub fn with_reentrancy_guard(mut self, guard: bool) -> Self {
        self.reentrancy_guard = guard;
        self
    }

    #[must_use]
    pub fn with_relay_endpoint_changes(mut self, relay: bool) -> Self {
        self.relay_endpoint_changes = relay;
        self
    }

    /// Reject settings that leave no way to break a two-endpoint echo.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.skip_equal_writes && !self.reentrancy_guard {
            return Err(ConfigError::NoCycleBreaker);
        }
        Ok(())
    }
}

/// Registry settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "policy-config", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "policy-config", serde(default))]
pub struct ManagerConfig {
    /// Call `unbind()` on every binding removed from the registry.
    pub unbind_on_remove: bool,
}

impl ManagerConfig {
    #[must_use]
    pub fn with_unbind_on_remove(mut self, unbind: bool) -> Self {
        self.unbind_on_remove = unbind;
        self
    }
}

/// Binding and registry settings as one document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "policy-config", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "policy-config", serde(default))]
pub struct BindingPolicy {
    pub binding: BindingConfig,
    pub manager: ManagerConfig,
}

impl BindingPolicy {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.binding.validate()
    }
}

#[cfg(feature = "policy-config")]
impl BindingPolicy {
    /// Parse and validate a TOML policy document.
    pub fn from_toml_str(src: &str) -> Result<Self, ConfigError> {
        let policy: Self = toml::from_str(src)?;
        policy.validate()?;
        Ok(policy)
    }

    /// Parse and validate a JSON policy document.
    pub fn from_json_str(src: &str) -> Result<Self, ConfigError> {
        let policy: Self = serde_json::from_str(src)?;
        policy.validate()?;
        Ok(policy)
    }
}
