//! Registration engine.
//!
//! Each service name is either unregistered (no DHT key) or registered
//! (key present, non-empty endpoint list). `register`, `unregister` and
//! `discover` each hold the registry mutex for their whole
//! read-modify-write against the DHT, so two operations on one node never
//! lose each other's updates. Nodes do not lock across each other; the DHT
//! is the only cross-node serialization point.
//!
//! # Rust Learning Note
//!
//! The mutex guards the health cache, but it is also *the* lock for every
//! DHT mutation. Internal helpers that assume the lock is held take
//! `&mut RegistryState`: the only way to get one is through the guard, so
//! the compiler proves the caller locked.

use crate::codec::{decode_list, encode_endpoint, encode_list};
use crate::dht::Dht;
use crate::health_cache::{HealthCache, NodeStatus};
use std::sync::Arc;
use svcreg_common::{EncodedEndpoint, EndpointDescriptor, Error, Result, ServiceName};
use tokio::sync::{Mutex, MutexGuard};
use tracing::{debug, info, warn};

/// State guarded by the registry mutex.
#[derive(Debug, Default)]
pub struct RegistryState {
    pub(crate) health: HealthCache,
}

impl RegistryState {
    pub fn health(&self) -> &HealthCache {
        &self.health
    }
}

/// Result of a registration attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegisterOutcome {
    Added,
    AlreadyPresent,
}

/// Result of an unregistration attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnregisterOutcome {
    /// Endpoint removed; the service still has endpoints.
    Removed,
    /// Last endpoint removed; the service key was deleted.
    ServiceRemoved,
    /// The service had no endpoints.
    NotRegistered,
    /// The service exists but does not list this endpoint.
    EndpointNotFound,
}

/// Registry servant: the context object shared by the API and the
/// liveness engine.
pub struct Registry {
    dht: Arc<dyn Dht>,
    first_node: bool,
    state: Mutex<RegistryState>,
}

impl Registry {
    /// Creates a registry over `dht` with a known first-node flag.
    pub fn new(dht: Arc<dyn Dht>, first_node: bool) -> Self {
        Self {
            dht,
            first_node,
            state: Mutex::new(RegistryState::default()),
        }
    }

    /// Creates a registry, asking the DHT once whether this node founded
    /// the ring.
    pub async fn connect(dht: Arc<dyn Dht>) -> Result<Self> {
        let first_node = dht.is_first_node().await?;
        info!("Registry connected to DHT (first node: {})", first_node);
        Ok(Self::new(dht, first_node))
    }

    pub fn is_first_node(&self) -> bool {
        self.first_node
    }

    pub fn dht(&self) -> &Arc<dyn Dht> {
        &self.dht
    }

    /// Adds `descriptor` to the service's endpoint list. Re-registering an
    /// existing endpoint is a no-op.
    pub async fn try_register(
        &self,
        service: &ServiceName,
        descriptor: &EndpointDescriptor,
    ) -> Result<RegisterOutcome> {
        if !service.is_valid() {
            return Err(Error::invalid_service_name(service.as_str(), "cannot key the DHT"));
        }
        let _state = self.state.lock().await;

        let mut endpoints = self.read_endpoints(service).await?.unwrap_or_default();
        let endpoint = encode_endpoint(descriptor);

        if endpoints.contains(&endpoint) {
            info!("Address {} already exists for service {}", endpoint, service);
            return Ok(RegisterOutcome::AlreadyPresent);
        }

        endpoints.push(endpoint.clone());
        self.write_endpoints(service, &endpoints).await?;

        info!("Address {} added for service {}", endpoint, service);
        Ok(RegisterOutcome::Added)
    }

    /// Fire-and-forget registration; failures are logged.
    pub async fn register(&self, service: &ServiceName, descriptor: &EndpointDescriptor) {
        if let Err(e) = self.try_register(service, descriptor).await {
            warn!("Register {} for service {} failed: {}", descriptor, service, e);
        }
    }

    /// Removes `descriptor` from the service's endpoint list, deleting the
    /// service key when the list becomes empty.
    pub async fn try_unregister(
        &self,
        service: &ServiceName,
        descriptor: &EndpointDescriptor,
    ) -> Result<UnregisterOutcome> {
        let mut state = self.state.lock().await;
        let endpoint = encode_endpoint(descriptor);
        self.remove_endpoint_locked(&mut state, service, &endpoint).await
    }

    /// Fire-and-forget unregistration; failures are logged.
    pub async fn unregister(&self, service: &ServiceName, descriptor: &EndpointDescriptor) {
        if let Err(e) = self.try_unregister(service, descriptor).await {
            warn!("Unregister {} for service {} failed: {}", descriptor, service, e);
        }
    }

    /// Returns the service's endpoints in registration order.
    ///
    /// Never returns an empty list: an absent or empty service is
    /// `Error::ServiceNotRegistered`.
    pub async fn discover(&self, service: &ServiceName) -> Result<Vec<EncodedEndpoint>> {
        let _state = self.state.lock().await;

        match self.read_endpoints(service).await? {
            Some(endpoints) if !endpoints.is_empty() => Ok(endpoints),
            _ => Err(Error::service_not_registered(service)),
        }
    }

    /// Lists every registered service name.
    pub async fn services(&self) -> Result<Vec<ServiceName>> {
        let _state = self.state.lock().await;
        let keys = self.dht.keys().await?;
        Ok(keys.into_iter().map(ServiceName::from).collect())
    }

    /// Copy of the health cache.
    pub async fn health_snapshot(&self) -> Vec<(EncodedEndpoint, NodeStatus)> {
        self.state.lock().await.health.snapshot()
    }

    /// Acquires the registry mutex.
    pub(crate) async fn lock_state(&self) -> MutexGuard<'_, RegistryState> {
        self.state.lock().await
    }

    /// Removes one endpoint with the mutex already held. Shared by the
    /// public unregister path and liveness eviction; also prunes the
    /// endpoint's health cache entry once it is no longer registered.
    pub(crate) async fn remove_endpoint_locked(
        &self,
        state: &mut RegistryState,
        service: &ServiceName,
        endpoint: &EncodedEndpoint,
    ) -> Result<UnregisterOutcome> {
        let mut endpoints = match self.read_endpoints(service).await? {
            Some(endpoints) if !endpoints.is_empty() => endpoints,
            stored => {
                info!("Service {} not registered", service);
                if stored.is_some() {
                    self.drop_empty_service_locked(state, service).await?;
                }
                state.health.remove(endpoint);
                return Ok(UnregisterOutcome::NotRegistered);
            }
        };

        let Some(index) = endpoints.iter().position(|e| e == endpoint) else {
            info!("Address {} not found for service {}", endpoint, service);
            state.health.remove(endpoint);
            return Ok(UnregisterOutcome::EndpointNotFound);
        };

        endpoints.remove(index);
        // Cache entry survives a failed write so the next sweep retries.
        self.write_endpoints(service, &endpoints).await?;
        state.health.remove(endpoint);

        if endpoints.is_empty() {
            info!("Address {} removed; service {} has no endpoints left", endpoint, service);
            Ok(UnregisterOutcome::ServiceRemoved)
        } else {
            info!("Address {} removed for service {}", endpoint, service);
            Ok(UnregisterOutcome::Removed)
        }
    }

    /// Deletes a service key whose stored list is empty.
    pub(crate) async fn drop_empty_service_locked(
        &self,
        _state: &mut RegistryState,
        service: &ServiceName,
    ) -> Result<()> {
        info!("Deleting empty endpoint list of service {}", service);
        self.dht.delete(service.as_str()).await
    }

    /// Reads and decodes the stored list. `None` means the key is absent.
    pub(crate) async fn read_endpoints(
        &self,
        service: &ServiceName,
    ) -> Result<Option<Vec<EncodedEndpoint>>> {
        match self.dht.get(service.as_str()).await? {
            Some(blob) => {
                let endpoints = decode_list(&blob)?;
                debug!("Service {} has {} endpoint(s)", service, endpoints.len());
                Ok(Some(endpoints))
            }
            None => Ok(None),
        }
    }

    /// Writes the list back; an empty list deletes the key instead.
    async fn write_endpoints(
        &self,
        service: &ServiceName,
        endpoints: &[EncodedEndpoint],
    ) -> Result<()> {
        if endpoints.is_empty() {
            self.dht.delete(service.as_str()).await
        } else {
            self.dht.set(service.as_str(), encode_list(endpoints)).await
        }
    }
}
