//! Liveness engine.
//!
//! On every tick the engine runs one sweep:
//!
//! 1. Lock the registry (registration calls wait until the sweep ends).
//! 2. List every service key in the DHT.
//! 3. For each service, read its endpoints and probe each one with the
//!    probe factory registered for that service kind.
//! 4. Update the health cache: success resets the failure count, failure
//!    increments it and marks the endpoint dead at the threshold.
//! 5. Evict dead endpoints, walking the list back to front so removals do
//!    not shift the indices still to be visited.
//! 6. Drop health entries for endpoints no longer listed under any service.
//!    Other nodes write the shared DHT directly, so an endpoint can vanish
//!    without this node ever removing it. Skipped when a list was unreadable.
//!
//! A sweep is bounded only by its probes. Without `probe_timeout`, a probe
//! that never answers holds the registry lock indefinitely.

use crate::codec::decode_endpoint;
use crate::config::{KeyListingFailurePolicy, LivenessConfig};
use crate::registry::{Registry, RegistryState};
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use svcreg_common::{EncodedEndpoint, EndpointDescriptor, Error, Result, ServiceName};
use svcreg_monitoring::{ProbeFactory, ProbeRegistry};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, timeout, Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

/// Counters for one sweep.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    pub services: usize,
    pub probed: usize,
    pub healthy: usize,
    pub failed: usize,
    pub evicted: usize,
    /// Services skipped for a read failure or an unknown kind.
    pub skipped_services: usize,
    /// Endpoints skipped because their token could not be decoded.
    pub malformed_endpoints: usize,
    /// Health entries dropped for endpoints no longer registered.
    pub pruned: usize,
}

/// Engine-wide statistics, readable without the registry lock.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SweepStats {
    pub sweeps: u64,
    pub total_evicted: u64,
    pub last_sweep_at: Option<DateTime<Utc>>,
    pub last_report: Option<SweepReport>,
    pub consecutive_key_listing_failures: u32,
}

/// Periodic prober and evictor.
pub struct LivenessEngine {
    registry: Arc<Registry>,
    probes: ProbeRegistry,
    config: LivenessConfig,
    stats: Arc<RwLock<SweepStats>>,
}

impl LivenessEngine {
    pub fn new(registry: Arc<Registry>, probes: ProbeRegistry, config: LivenessConfig) -> Self {
        Self {
            registry,
            probes,
            config,
            stats: Arc::new(RwLock::new(SweepStats::default())),
        }
    }

    /// Shared handle to the statistics, for the health endpoint.
    pub fn stats_handle(&self) -> Arc<RwLock<SweepStats>> {
        Arc::clone(&self.stats)
    }

    pub fn stats(&self) -> SweepStats {
        self.stats.read().clone()
    }

    /// Spawns the engine on the tokio runtime.
    pub fn spawn(self) -> JoinHandle<Result<()>> {
        tokio::spawn(self.run())
    }

    /// Sweeps forever. Returns only when key listing fails under the
    /// `abort` policy.
    pub async fn run(self) -> Result<()> {
        info!(
            "Liveness engine started (interval: {:?}, failure_threshold: {}, probe_timeout: {:?})",
            self.config.interval, self.config.failure_threshold, self.config.probe_timeout
        );
        if self.probes.is_empty() {
            warn!("No probe factories registered; every service will be skipped");
        } else {
            info!("Probing service kinds: {:?}", self.probes.kinds());
        }

        // First sweep one interval after start.
        let mut ticker = interval_at(Instant::now() + self.config.interval, self.config.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;

            match self.sweep_once().await {
                Ok(report) => {
                    info!(
                        "Sweep done: {} services, {} probed, {} healthy, {} failed, {} evicted",
                        report.services,
                        report.probed,
                        report.healthy,
                        report.failed,
                        report.evicted
                    );
                }
                Err(e) => match self.config.on_key_listing_failure {
                    KeyListingFailurePolicy::Skip => {
                        error!("Sweep skipped, retrying next tick: {}", e);
                    }
                    KeyListingFailurePolicy::Abort => {
                        error!("Stopping liveness engine: {}", e);
                        return Err(e);
                    }
                },
            }
        }
    }

    /// Runs one full sweep. Fails only when the service keys cannot be
    /// listed; every other failure is logged and absorbed.
    pub async fn sweep_once(&self) -> Result<SweepReport> {
        let mut state = self.registry.lock_state().await;
        debug!("Liveness sweep started");

        let services = match self.registry.dht().keys().await {
            Ok(keys) => keys,
            Err(e) => {
                self.stats.write().consecutive_key_listing_failures += 1;
                return Err(match e {
                    Error::KeyListingFailed { .. } => e,
                    other => Error::key_listing_failed(other),
                });
            }
        };

        let mut report = SweepReport {
            services: services.len(),
            ..SweepReport::default()
        };

        let mut listed = HashSet::new();
        let mut all_read = true;
        for key in services {
            let service = ServiceName::from(key);
            all_read &= self
                .sweep_service(&mut state, &service, &mut listed, &mut report)
                .await;
        }

        if all_read {
            report.pruned = state.health.retain(|endpoint| listed.contains(endpoint));
            if report.pruned > 0 {
                debug!("Dropped {} stale health entries", report.pruned);
            }
        }

        let mut stats = self.stats.write();
        stats.sweeps += 1;
        stats.total_evicted += report.evicted as u64;
        stats.last_sweep_at = Some(Utc::now());
        stats.last_report = Some(report.clone());
        stats.consecutive_key_listing_failures = 0;

        Ok(report)
    }

    /// Sweeps one service, adding every endpoint it lists to `listed`.
    /// Returns false when the service's list could not be read.
    async fn sweep_service(
        &self,
        state: &mut RegistryState,
        service: &ServiceName,
        listed: &mut HashSet<EncodedEndpoint>,
        report: &mut SweepReport,
    ) -> bool {
        let mut endpoints = match self.registry.read_endpoints(service).await {
            Ok(Some(endpoints)) if endpoints.is_empty() => {
                if let Err(e) = self.registry.drop_empty_service_locked(state, service).await {
                    warn!("Failed to delete empty service {}: {}", service, e);
                }
                return true;
            }
            Ok(Some(endpoints)) => endpoints,
            // Deleted since the key listing.
            Ok(None) => return true,
            Err(e) => {
                warn!("Skipping service {} this sweep: {}", service, e);
                report.skipped_services += 1;
                return false;
            }
        };
        listed.extend(endpoints.iter().cloned());

        let Some(factory) = self.probes.factory_for(service) else {
            warn!("Unknown service kind {}, not probing", service);
            report.skipped_services += 1;
            return true;
        };

        for endpoint in &endpoints {
            debug!("Probing service {} endpoint {}", service, endpoint);

            let descriptor = match decode_endpoint(endpoint) {
                Ok(descriptor) => descriptor,
                Err(e) => {
                    warn!("Skipping malformed endpoint of service {}: {}", service, e);
                    report.malformed_endpoints += 1;
                    continue;
                }
            };

            report.probed += 1;
            match self.probe(factory.as_ref(), &descriptor).await {
                Ok(()) => {
                    debug!("Endpoint {} is alive", endpoint);
                    state.health.record_success(endpoint);
                    report.healthy += 1;
                }
                Err(e) => {
                    report.failed += 1;
                    let threshold = self.config.failure_threshold;
                    let status = state.health.record_failure(endpoint, threshold);
                    if status.alive {
                        warn!(
                            "Endpoint {} is not alive (failure {}): {}",
                            endpoint, status.fail_count, e
                        );
                    } else {
                        warn!(
                            "Endpoint {} marked dead after {} failures: {}",
                            endpoint, status.fail_count, e
                        );
                    }
                }
            }
        }

        // Back to front: removing index i leaves 0..i untouched.
        for i in (0..endpoints.len()).rev() {
            if !state.health.is_dead(&endpoints[i]) {
                continue;
            }
            let endpoint: EncodedEndpoint = endpoints.remove(i);
            info!("Evicting dead endpoint {} from service {}", endpoint, service);

            match self.registry.remove_endpoint_locked(state, service, &endpoint).await {
                Ok(_) => report.evicted += 1,
                Err(e) => warn!(
                    "Eviction of {} from {} failed, retrying next sweep: {}",
                    endpoint, service, e
                ),
            }
        }

        true
    }

    async fn probe(
        &self,
        factory: &dyn ProbeFactory,
        descriptor: &EndpointDescriptor,
    ) -> Result<()> {
        let probe = factory.create(descriptor)?;

        match self.config.probe_timeout {
            Some(limit) => timeout(limit, probe.is_alive()).await.map_err(|_| {
                Error::probe_failed(probe.target(), format!("no answer within {:?}", limit))
            })?,
            None => probe.is_alive().await,
        }
    }
}
