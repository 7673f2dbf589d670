//! Test doubles shared by the integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use dashmap::DashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use svcreg_common::{EndpointDescriptor, Error, Result};
use svcreg_monitoring::{HealthProbe, ProbeRegistry};
use svcreg_registry::dht::{Dht, MemoryDht};

/// Probe outcomes controlled by the test: addresses in `down` fail.
#[derive(Clone, Default)]
pub struct ScriptedProbes {
    down: Arc<DashSet<String>>,
}

impl ScriptedProbes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn take_down(&self, address: &str) {
        self.down.insert(address.to_string());
    }

    pub fn bring_up(&self, address: &str) {
        self.down.remove(address);
    }

    /// Probe table mapping each service kind to a GRPC-address probe.
    pub fn registry_for(&self, services: &[&str]) -> ProbeRegistry {
        let mut probes = ProbeRegistry::new();
        for service in services {
            let down = Arc::clone(&self.down);
            probes.register(
                *service,
                Arc::new(move |endpoint: &EndpointDescriptor| -> Result<Box<dyn HealthProbe>> {
                    let address = endpoint.address("GRPC").ok_or_else(|| {
                        Error::probe_failed(endpoint.to_string(), "no GRPC address")
                    })?;
                    Ok(Box::new(ScriptedProbe {
                        address: address.to_string(),
                        down: Arc::clone(&down),
                    }))
                }),
            );
        }
        probes
    }
}

struct ScriptedProbe {
    address: String,
    down: Arc<DashSet<String>>,
}

#[async_trait]
impl HealthProbe for ScriptedProbe {
    async fn is_alive(&self) -> Result<()> {
        if self.down.contains(&self.address) {
            Err(Error::probe_failed(&self.address, "connection refused"))
        } else {
            Ok(())
        }
    }

    fn target(&self) -> &str {
        &self.address
    }
}

/// Memory DHT with switchable key listing and reads.
pub struct FaultyDht {
    pub inner: MemoryDht,
    pub listing_fails: AtomicBool,
    pub reads_fail_for: DashSet<String>,
}

impl FaultyDht {
    pub fn new() -> Self {
        Self {
            inner: MemoryDht::founding(),
            listing_fails: AtomicBool::new(false),
            reads_fail_for: DashSet::new(),
        }
    }

    pub fn fail_listing(&self, fail: bool) {
        self.listing_fails.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl Dht for FaultyDht {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        if self.reads_fail_for.contains(key) {
            return Err(Error::dht_unavailable("get", "injected read failure"));
        }
        self.inner.get(key).await
    }

    async fn set(&self, key: &str, value: Vec<u8>) -> Result<()> {
        self.inner.set(key, value).await
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.inner.delete(key).await
    }

    async fn keys(&self) -> Result<Vec<String>> {
        if self.listing_fails.load(Ordering::SeqCst) {
            return Err(Error::key_listing_failed("injected listing failure"));
        }
        self.inner.keys().await
    }

    async fn is_first_node(&self) -> Result<bool> {
        Ok(true)
    }
}

pub fn grpc(address: &str) -> EndpointDescriptor {
    EndpointDescriptor::single("GRPC", address).unwrap()
}
