//! Registry node: HTTP API plus the liveness engine.

use crate::{
    api::{create_router, AppState},
    config::RegistryConfig,
    dht::{self, Dht},
    liveness::LivenessEngine,
    registry::Registry,
};
use axum::Router;
use std::future::{Future, IntoFuture};
use std::sync::Arc;
use svcreg_common::{Error, Result};
use svcreg_monitoring::ProbeRegistry;
use tokio::net::TcpListener;
use tracing::info;

/// One registry node.
pub struct RegistryServer {
    config: RegistryConfig,
    registry: Arc<Registry>,
    liveness: Option<LivenessEngine>,
    router: Router,
}

impl RegistryServer {
    /// Founds or joins the DHT ring per configuration and builds the node.
    pub async fn new(config: RegistryConfig) -> Result<Self> {
        let dht = dht::connect(&config.dht)?;
        Self::with_dht(config, dht).await
    }

    /// Builds the node over an existing DHT handle.
    pub async fn with_dht(config: RegistryConfig, dht: Arc<dyn Dht>) -> Result<Self> {
        let registry = Arc::new(Registry::connect(dht).await?);
        let probes =
            ProbeRegistry::from_specs(&config.probe_specs(), config.liveness.connect_timeout);
        Ok(Self::with_parts(config, registry, probes))
    }

    /// Builds the node from an already-connected registry and probe table.
    pub fn with_parts(
        config: RegistryConfig,
        registry: Arc<Registry>,
        probes: ProbeRegistry,
    ) -> Self {
        let mut state = AppState::new(Arc::clone(&registry));

        let liveness = if registry.is_first_node() || !config.liveness.only_on_first_node {
            let engine =
                LivenessEngine::new(Arc::clone(&registry), probes, config.liveness.clone());
            state = state.with_liveness(engine.stats_handle());
            Some(engine)
        } else {
            info!("Not the first node; liveness sweeps run elsewhere");
            None
        };

        Self {
            config,
            registry,
            liveness,
            router: create_router(state),
        }
    }

    /// Returns a reference to the registry.
    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    pub fn runs_liveness(&self) -> bool {
        self.liveness.is_some()
    }

    /// Binds the configured address and serves until `shutdown` resolves.
    pub async fn run_until<F>(self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = format!("{}:{}", self.config.server.host, self.config.server.port);
        info!("Binding to TCP: {}", addr);

        let listener = TcpListener::bind(&addr).await?;
        self.serve(listener, shutdown).await
    }

    /// Serves on `listener` until `shutdown` resolves or the liveness
    /// engine stops with an error.
    pub async fn serve<F>(self, listener: TcpListener, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        info!("Server listening on {}", listener.local_addr()?);

        let mut liveness = self.liveness.map(LivenessEngine::spawn);
        let server = axum::serve(listener, self.router)
            .with_graceful_shutdown(shutdown)
            .into_future();

        let result = match liveness.as_mut() {
            Some(handle) => tokio::select! {
                served = server => served.map_err(Error::from),
                finished = handle => match finished {
                    Ok(result) => result,
                    Err(e) => Err(Error::Internal(format!("Liveness task failed: {}", e))),
                },
            },
            None => server.await.map_err(Error::from),
        };

        if let Some(handle) = liveness {
            handle.abort();
        }

        info!("Registry server stopped");
        result
    }
}
