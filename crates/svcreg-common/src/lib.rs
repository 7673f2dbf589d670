//! # svcreg Common
//!
//! Types and errors shared across the service registry crates.
//!
//! This crate provides the domain vocabulary (service names, endpoint
//! descriptors, encoded endpoints) and the single error type that every
//! other crate reports through.

pub mod errors;
pub mod types;

// Re-export commonly used items
pub use errors::{Error, Result};
pub use types::{EncodedEndpoint, EndpointDescriptor, ServiceName, FIELD_MARKER, LIST_SEPARATOR};
