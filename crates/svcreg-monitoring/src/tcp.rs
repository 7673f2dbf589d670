//! TCP connect probe.
//!
//! Treats an endpoint as alive when a TCP connection to its address can be
//! established within the timeout.

use crate::HealthProbe;
use async_trait::async_trait;
use std::time::Duration;
use svcreg_common::{Error, Result};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::debug;

/// Probe that opens (and immediately drops) a TCP connection.
#[derive(Debug, Clone)]
pub struct TcpProbe {
    address: String,
    timeout: Duration,
}

impl TcpProbe {
    pub fn new(address: impl Into<String>, timeout: Duration) -> Self {
        Self {
            address: address.into(),
            timeout,
        }
    }
}

#[async_trait]
impl HealthProbe for TcpProbe {
    async fn is_alive(&self) -> Result<()> {
        debug!("TCP probe: {}", self.address);

        match timeout(self.timeout, TcpStream::connect(&self.address)).await {
            Ok(Ok(_stream)) => Ok(()),
            Ok(Err(e)) => Err(Error::probe_failed(&self.address, e)),
            Err(_) => Err(Error::probe_failed(
                &self.address,
                format!("connect timed out after {:?}", self.timeout),
            )),
        }
    }

    fn target(&self) -> &str {
        &self.address
    }
}
