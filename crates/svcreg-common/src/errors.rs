//! Error types for the service registry.
//!
//! # Rust Learning Note
//!
//! Every fallible operation returns `Result<T, Error>`. Callers either
//! propagate with `?` or, for the fire-and-forget registration calls,
//! log the error and move on.
//!
//! ```rust
//! use svcreg_common::{Error, Result};
//!
//! fn lookup() -> Result<()> {
//!     Err(Error::service_not_registered("Cache"))
//! }
//!
//! assert!(lookup().is_err());
//! ```

use thiserror::Error;

/// Result type alias for registry operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for registry operations.
#[derive(Debug, Error)]
pub enum Error {
    /// A DHT get/set/delete call failed.
    #[error("DHT unavailable during {operation}: {reason}")]
    DhtUnavailable {
        operation: String,
        reason: String,
    },

    /// Enumerating the DHT keys failed during a liveness sweep.
    #[error("Key listing failed: {reason}")]
    KeyListingFailed {
        reason: String,
    },

    /// An endpoint token or list blob does not match the wire format.
    #[error("Malformed endpoint '{token}': {reason}")]
    MalformedEndpoint {
        token: String,
        reason: String,
    },

    /// Discover was called for a service with no registered endpoints.
    #[error("Service not registered: {service}")]
    ServiceNotRegistered {
        service: String,
    },

    /// A health probe reported the endpoint as not alive.
    #[error("Probe failed for {address}: {reason}")]
    ProbeFailed {
        address: String,
        reason: String,
    },

    /// A service name that cannot key the DHT.
    #[error("Invalid service name '{name}': {reason}")]
    InvalidServiceName {
        name: String,
        reason: String,
    },

    /// I/O error (wraps std::io::Error).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Internal error (shouldn't happen in normal operation).
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Creates a DhtUnavailable error.
    pub fn dht_unavailable(operation: impl Into<String>, reason: impl ToString) -> Self {
        Self::DhtUnavailable {
            operation: operation.into(),
            reason: reason.to_string(),
        }
    }

    /// Creates a KeyListingFailed error.
    pub fn key_listing_failed(reason: impl ToString) -> Self {
        Self::KeyListingFailed {
            reason: reason.to_string(),
        }
    }

    /// Creates a MalformedEndpoint error.
    pub fn malformed_endpoint(token: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::MalformedEndpoint {
            token: token.into(),
            reason: reason.into(),
        }
    }

    /// Creates a ServiceNotRegistered error.
    pub fn service_not_registered(service: impl ToString) -> Self {
        Self::ServiceNotRegistered {
            service: service.to_string(),
        }
    }

    /// Creates a ProbeFailed error.
    pub fn probe_failed(address: impl Into<String>, reason: impl ToString) -> Self {
        Self::ProbeFailed {
            address: address.into(),
            reason: reason.to_string(),
        }
    }

    /// Creates an InvalidServiceName error.
    pub fn invalid_service_name(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidServiceName {
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// Returns true for failures of the backing DHT.
    pub fn is_dht_failure(&self) -> bool {
        matches!(self, Self::DhtUnavailable { .. } | Self::KeyListingFailed { .. })
    }

    /// Returns true for errors caused by the caller's input.
    pub fn is_invalid_input(&self) -> bool {
        matches!(self, Self::InvalidServiceName { .. })
    }
}
