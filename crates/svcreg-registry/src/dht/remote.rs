//! DHT client used by nodes that joined an existing ring.
//!
//! Every call is forwarded over HTTP to the founding node's
//! `/api/v1/dht` routes (see `api::dht_router`).

use super::Dht;
use async_trait::async_trait;
use http_body_util::{BodyExt, Full};
use hyper::body::Bytes;
use hyper::{Method, Request, StatusCode, Uri};
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;
use svcreg_common::{Error, Result};
use tracing::debug;

/// HTTP client for a remote DHT node.
pub struct RemoteDht {
    /// Base URL of the founding node (e.g., "http://root:1099").
    base_url: String,

    client: Client<HttpConnector, Full<Bytes>>,
}

impl RemoteDht {
    pub fn new(base_url: impl Into<String>) -> Self {
        let client = Client::builder(TokioExecutor::new()).build_http();

        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn key_url(&self, key: &str) -> String {
        format!("{}/api/v1/dht/keys/{}", self.base_url, urlencoding::encode(key))
    }

    fn keys_url(&self) -> String {
        format!("{}/api/v1/dht/keys", self.base_url)
    }

    /// Sends one request and returns the status and body bytes.
    async fn send(
        &self,
        operation: &str,
        method: Method,
        url: String,
        body: Vec<u8>,
    ) -> Result<(StatusCode, Bytes)> {
        debug!("DHT {} -> {} {}", operation, method, url);

        let uri: Uri = url
            .parse()
            .map_err(|e| Error::dht_unavailable(operation, format!("Invalid URI: {}", e)))?;

        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/octet-stream")
            .body(Full::new(Bytes::from(body)))
            .map_err(|e| {
                Error::dht_unavailable(operation, format!("Failed to build request: {}", e))
            })?;

        let response = self
            .client
            .request(request)
            .await
            .map_err(|e| Error::dht_unavailable(operation, format!("HTTP request failed: {}", e)))?;

        let status = response.status();
        let bytes = response
            .into_body()
            .collect()
            .await
            .map_err(|e| {
                Error::dht_unavailable(operation, format!("Failed to read response: {}", e))
            })?
            .to_bytes();

        Ok((status, bytes))
    }
}

fn unexpected_status(operation: &str, status: StatusCode) -> Error {
    Error::dht_unavailable(operation, format!("DHT node returned status: {}", status))
}

#[async_trait]
impl Dht for RemoteDht {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let (status, bytes) = self.send("get", Method::GET, self.key_url(key), Vec::new()).await?;
        match status {
            StatusCode::OK => Ok(Some(bytes.to_vec())),
            StatusCode::NOT_FOUND => Ok(None),
            other => Err(unexpected_status("get", other)),
        }
    }

    async fn set(&self, key: &str, value: Vec<u8>) -> Result<()> {
        let (status, _) = self.send("set", Method::PUT, self.key_url(key), value).await?;
        if status.is_success() {
            Ok(())
        } else {
            Err(unexpected_status("set", status))
        }
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let (status, _) = self.send("delete", Method::DELETE, self.key_url(key), Vec::new()).await?;
        if status.is_success() || status == StatusCode::NOT_FOUND {
            Ok(())
        } else {
            Err(unexpected_status("delete", status))
        }
    }

    async fn keys(&self) -> Result<Vec<String>> {
        let (status, bytes) = self
            .send("keys", Method::GET, self.keys_url(), Vec::new())
            .await
            .map_err(Error::key_listing_failed)?;

        if !status.is_success() {
            return Err(Error::key_listing_failed(format!("DHT node returned status: {}", status)));
        }

        serde_json::from_slice(&bytes)
            .map_err(|e| Error::key_listing_failed(format!("Failed to parse JSON: {}", e)))
    }

    async fn is_first_node(&self) -> Result<bool> {
        // A client of another node's store never founded the ring.
        Ok(false)
    }
}
