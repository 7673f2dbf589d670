// HTTP status probe

use crate::HealthProbe;
use async_trait::async_trait;
use http_body_util::Empty;
use hyper::body::Bytes;
use hyper::{Method, Request, Uri};
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;
use std::time::{Duration, Instant};
use svcreg_common::{Error, Result};
use tokio::time::timeout;
use tracing::{debug, warn};

/// Probe that issues `GET <url>`; any 2xx status means alive.
pub struct HttpProbe {
    url: String,
    timeout: Duration,
    client: Client<HttpConnector, Empty<Bytes>>,
}

impl HttpProbe {
    /// Creates a probe for `address` (host:port) and request `path`.
    pub fn new(address: &str, path: &str, timeout: Duration) -> Self {
        let path = if path.starts_with('/') {
            path.to_string()
        } else {
            format!("/{}", path)
        };

        Self {
            url: format!("http://{}{}", address, path),
            timeout,
            client: Client::builder(TokioExecutor::new()).build_http(),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl HealthProbe for HttpProbe {
    async fn is_alive(&self) -> Result<()> {
        let start_time = Instant::now();

        let uri: Uri = self
            .url
            .parse()
            .map_err(|e| Error::probe_failed(&self.url, format!("Invalid URI: {}", e)))?;

        let request = Request::builder()
            .method(Method::GET)
            .uri(uri)
            .header("User-Agent", "svcreg-liveness/1.0")
            .body(Empty::<Bytes>::new())
            .map_err(|e| {
                Error::probe_failed(&self.url, format!("Failed to build request: {}", e))
            })?;

        let response = match timeout(self.timeout, self.client.request(request)).await {
            Ok(Ok(response)) => response,
            Ok(Err(e)) => {
                warn!("HTTP probe connection failed: {} - {}", self.url, e);
                return Err(Error::probe_failed(&self.url, format!("Connection failed: {}", e)));
            }
            Err(_) => {
                warn!("HTTP probe timeout: {}", self.url);
                return Err(Error::probe_failed(&self.url, "Timeout"));
            }
        };

        let status = response.status();
        debug!(
            "HTTP probe complete: {} - status={} time={}ms",
            self.url,
            status,
            start_time.elapsed().as_millis()
        );

        if status.is_success() {
            Ok(())
        } else {
            Err(Error::probe_failed(
                &self.url,
                format!("Unexpected status code: {}", status),
            ))
        }
    }

    fn target(&self) -> &str {
        &self.url
    }
}
