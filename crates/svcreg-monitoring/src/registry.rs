//! Service kind → probe factory table.
//!
//! The liveness engine never knows which protocol a service speaks; it
//! asks this table for the factory registered under the service name and
//! lets the factory build a probe for each endpoint. New service kinds are
//! added by registering another factory, without touching the sweep.

use crate::{HealthProbe, HttpProbe, ProbeFactory, TcpProbe};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use svcreg_common::{EndpointDescriptor, Error, Result, ServiceName};

/// Default protocol probed by the built-in service kinds.
pub const DEFAULT_PROBE_PROTOCOL: &str = "GRPC";

/// Service kinds known out of the box.
pub const BUILTIN_SERVICE_KINDS: [&str; 2] = ["TestService", "CacheService"];

/// How endpoints of a service kind are probed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProbeKind {
    /// TCP connect to the protocol's address.
    Tcp,
    /// HTTP GET against the protocol's address.
    Http,
}

/// Declarative probe configuration for one service kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbeSpec {
    pub service: ServiceName,
    pub kind: ProbeKind,
    #[serde(default = "default_protocol")]
    pub protocol: String,
    /// Request path for HTTP probes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

fn default_protocol() -> String {
    DEFAULT_PROBE_PROTOCOL.to_string()
}

impl ProbeSpec {
    pub fn tcp(service: impl Into<ServiceName>, protocol: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            kind: ProbeKind::Tcp,
            protocol: protocol.into(),
            path: None,
        }
    }

    pub fn http(
        service: impl Into<ServiceName>,
        protocol: impl Into<String>,
        path: impl Into<String>,
    ) -> Self {
        Self {
            service: service.into(),
            kind: ProbeKind::Http,
            protocol: protocol.into(),
            path: Some(path.into()),
        }
    }

    /// Probe specs for the built-in service kinds.
    pub fn builtin() -> Vec<Self> {
        BUILTIN_SERVICE_KINDS
            .iter()
            .map(|service| Self::tcp(*service, DEFAULT_PROBE_PROTOCOL))
            .collect()
    }
}

struct SpecFactory {
    kind: ProbeKind,
    protocol: String,
    path: String,
    timeout: Duration,
}

impl ProbeFactory for SpecFactory {
    fn create(&self, endpoint: &EndpointDescriptor) -> Result<Box<dyn HealthProbe>> {
        let address = endpoint.address(&self.protocol).ok_or_else(|| {
            Error::probe_failed(
                endpoint.to_string(),
                format!("no {} address registered", self.protocol),
            )
        })?;

        let probe: Box<dyn HealthProbe> = match self.kind {
            ProbeKind::Tcp => Box::new(TcpProbe::new(address, self.timeout)),
            ProbeKind::Http => Box::new(HttpProbe::new(address, &self.path, self.timeout)),
        };
        Ok(probe)
    }
}

/// Table of probe factories keyed by service kind.
#[derive(Clone, Default)]
pub struct ProbeRegistry {
    factories: HashMap<ServiceName, Arc<dyn ProbeFactory>>,
}

impl ProbeRegistry {
    /// Creates an empty table; every service is "unknown".
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a table from declarative specs.
    pub fn from_specs(specs: &[ProbeSpec], connect_timeout: Duration) -> Self {
        let mut registry = Self::new();
        for spec in specs {
            registry.register_spec(spec, connect_timeout);
        }
        registry
    }

    /// Creates a table holding the built-in service kinds.
    pub fn with_defaults(connect_timeout: Duration) -> Self {
        Self::from_specs(&ProbeSpec::builtin(), connect_timeout)
    }

    /// Registers (or replaces) the factory for a service kind.
    pub fn register(&mut self, service: impl Into<ServiceName>, factory: Arc<dyn ProbeFactory>) {
        self.factories.insert(service.into(), factory);
    }

    /// Registers a factory built from a declarative spec.
    pub fn register_spec(&mut self, spec: &ProbeSpec, connect_timeout: Duration) {
        let factory = SpecFactory {
            kind: spec.kind,
            protocol: spec.protocol.clone(),
            path: spec.path.clone().unwrap_or_else(|| "/health".to_string()),
            timeout: connect_timeout,
        };
        self.register(spec.service.clone(), Arc::new(factory));
    }

    /// Returns the factory for `service`, or `None` for an unknown kind.
    pub fn factory_for(&self, service: &ServiceName) -> Option<Arc<dyn ProbeFactory>> {
        self.factories.get(service).cloned()
    }

    /// Registered service kinds, sorted.
    pub fn kinds(&self) -> Vec<ServiceName> {
        let mut kinds: Vec<_> = self.factories.keys().cloned().collect();
        kinds.sort();
        kinds
    }

    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_kinds() {
        let registry = ProbeRegistry::with_defaults(Duration::from_secs(1));
        assert_eq!(
            registry.kinds(),
            vec![ServiceName::from("CacheService"), ServiceName::from("TestService")]
        );
        assert!(registry.factory_for(&ServiceName::from("Unknown")).is_none());
    }

    #[test]
    fn test_factory_requires_protocol() {
        let registry = ProbeRegistry::with_defaults(Duration::from_secs(1));
        let factory = registry.factory_for(&ServiceName::from("CacheService")).unwrap();

        let grpc = EndpointDescriptor::single("GRPC", "10.0.0.1:9000").unwrap();
        let probe = factory.create(&grpc).unwrap();
        assert_eq!(probe.target(), "10.0.0.1:9000");

        let http_only = EndpointDescriptor::single("HTTP", "10.0.0.1:8080").unwrap();
        assert!(matches!(factory.create(&http_only), Err(Error::ProbeFailed { .. })));
    }

    #[test]
    fn test_http_spec_builds_url() {
        let mut registry = ProbeRegistry::new();
        registry.register_spec(
            &ProbeSpec::http("Web", "HTTP", "/ready"),
            Duration::from_secs(1),
        );

        let factory = registry.factory_for(&ServiceName::from("Web")).unwrap();
        let endpoint = EndpointDescriptor::single("HTTP", "10.0.0.1:8080").unwrap();
        let probe = factory.create(&endpoint).unwrap();
        assert_eq!(probe.target(), "http://10.0.0.1:8080/ready");
    }

    #[test]
    fn test_closure_factory() {
        let mut registry = ProbeRegistry::new();
        registry.register(
            "Custom",
            Arc::new(|endpoint: &EndpointDescriptor| -> Result<Box<dyn HealthProbe>> {
                let address = endpoint.address("TCP").unwrap_or("missing");
                Ok(Box::new(TcpProbe::new(address, Duration::from_millis(10))))
            }),
        );

        assert_eq!(registry.kinds(), vec![ServiceName::from("Custom")]);
        assert!(!registry.is_empty());
    }

    #[test]
    fn test_probe_spec_defaults() {
        let spec: ProbeSpec = serde_json::from_str(r#"{"service":"Cache","kind":"tcp"}"#).unwrap();
        assert_eq!(spec.protocol, "GRPC");
        assert_eq!(spec.path, None);
    }
}
