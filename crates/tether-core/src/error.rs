#![forbid(unsafe_code)]

//! Error types for binding activation and configuration.
//!
//! Propagation itself never returns errors: a dropped endpoint met during a
//! dispatch round is logged and skipped, and listener panics unwind to the
//! caller untouched.

use thiserror::Error;

use crate::reactive::{BindingId, Side};

/// Failure to activate a binding.
#[derive(Debug, Error)]
pub enum BindingError {
    /// One of the binding's endpoints was dropped by its owner.
    #[error("binding {binding}: {side} endpoint has been dropped")]
    EndpointDropped { binding: BindingId, side: Side },
}

/// Invalid or unreadable binding configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Both equality skipping and the re-entrancy guard are disabled, so two
    /// notifying endpoints would echo writes forever.
    #[error("binding config disables every cycle breaker (skip_equal_writes and reentrancy_guard)")]
    NoCycleBreaker,

    #[cfg(feature = "policy-config")]
    #[error("parse binding policy TOML: {0}")]
    Toml(#[from] toml::de::Error),

    #[cfg(feature = "policy-config")]
    #[error("parse binding policy JSON: {0}")]
    Json(#[from] serde_json::Error),
}
