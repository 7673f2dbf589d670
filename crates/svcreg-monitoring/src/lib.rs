//! # svcreg Monitoring
//!
//! Health probes used by the registry's liveness engine.
//!
//! This crate provides:
//! - The [`HealthProbe`] trait (one `is_alive` call per endpoint)
//! - TCP connect probes
//! - HTTP status probes
//! - [`ProbeRegistry`], the table mapping a service kind to the factory
//!   that builds probes for its endpoints

pub mod http;
pub mod registry;
pub mod tcp;

use async_trait::async_trait;
use svcreg_common::{EndpointDescriptor, Result};

pub use http::HttpProbe;
pub use registry::{ProbeKind, ProbeRegistry, ProbeSpec};
pub use tcp::TcpProbe;

/// Health check against one endpoint.
///
/// `is_alive` returns `Ok(())` exactly when the endpoint is alive; any
/// failure is reported as an error, so "not alive" and "error" can never
/// disagree.
#[async_trait]
pub trait HealthProbe: Send + Sync {
    /// Probes the endpoint once.
    async fn is_alive(&self) -> Result<()>;

    /// Address being probed, for logging.
    fn target(&self) -> &str;
}

/// Builds a probe for one endpoint of a service kind.
pub trait ProbeFactory: Send + Sync {
    /// Creates a probe for `endpoint`. Fails when the descriptor lacks the
    /// protocol this factory probes.
    fn create(&self, endpoint: &EndpointDescriptor) -> Result<Box<dyn HealthProbe>>;
}

impl<F> ProbeFactory for F
where
    F: Fn(&EndpointDescriptor) -> Result<Box<dyn HealthProbe>> + Send + Sync,
{
    fn create(&self, endpoint: &EndpointDescriptor) -> Result<Box<dyn HealthProbe>> {
        self(endpoint)
    }
}
