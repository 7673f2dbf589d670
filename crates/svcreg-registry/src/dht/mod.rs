//! DHT facade.
//!
//! The registry stores one key per service name whose value is the encoded
//! endpoint list. Routing, replication and ring maintenance belong to the
//! DHT; the registry only needs the key-value surface below.

mod memory;
mod remote;

pub use memory::MemoryDht;
pub use remote::RemoteDht;

use crate::config::{DhtConfig, DhtMode};
use async_trait::async_trait;
use std::sync::Arc;
use svcreg_common::Result;
use tracing::info;

/// Key-value surface of the distributed hash table.
///
/// Every failure is reported as `Error::DhtUnavailable`, except `keys`,
/// which reports `Error::KeyListingFailed`.
#[async_trait]
pub trait Dht: Send + Sync {
    /// Reads a value. An absent key is `Ok(None)`, distinct from a present
    /// but empty value.
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    async fn set(&self, key: &str, value: Vec<u8>) -> Result<()>;

    /// Deletes a key. Deleting an absent key succeeds.
    async fn delete(&self, key: &str) -> Result<()>;

    /// Lists every key currently stored.
    async fn keys(&self) -> Result<Vec<String>>;

    /// True on the node that founded the ring.
    async fn is_first_node(&self) -> Result<bool>;
}

/// Founds a new ring or joins an existing one, per configuration.
pub fn connect(config: &DhtConfig) -> Result<Arc<dyn Dht>> {
    match config.mode {
        DhtMode::Found => {
            info!("Founding new DHT ring");
            Ok(Arc::new(MemoryDht::founding()))
        }
        DhtMode::Join => {
            let base_url = format!("http://{}:{}", config.bootstrap_host, config.port);
            info!("Joining DHT ring via {}", base_url);
            Ok(Arc::new(RemoteDht::new(base_url)))
        }
    }
}
