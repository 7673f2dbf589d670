//! In-process DHT store held by the ring-founding node.

use super::Dht;
use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::Arc;
use svcreg_common::Result;

/// DashMap-backed key-value store.
///
/// Clones share the same underlying map, so a test can keep a handle to
/// inspect what the registry wrote.
#[derive(Debug, Clone)]
pub struct MemoryDht {
    entries: Arc<DashMap<String, Vec<u8>>>,
    first_node: bool,
}

impl MemoryDht {
    /// Store for the node that founds the ring.
    pub fn founding() -> Self {
        Self::with_first_node(true)
    }

    pub fn with_first_node(first_node: bool) -> Self {
        Self {
            entries: Arc::new(DashMap::new()),
            first_node,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }
}

impl Default for MemoryDht {
    fn default() -> Self {
        Self::founding()
    }
}

#[async_trait]
impl Dht for MemoryDht {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.entries.get(key).map(|entry| entry.value().clone()))
    }

    async fn set(&self, key: &str, value: Vec<u8>) -> Result<()> {
        self.entries.insert(key.to_string(), value);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.entries.remove(key);
        Ok(())
    }

    async fn keys(&self) -> Result<Vec<String>> {
        let mut keys: Vec<String> = self.entries.iter().map(|entry| entry.key().clone()).collect();
        keys.sort();
        Ok(keys)
    }

    async fn is_first_node(&self) -> Result<bool> {
        Ok(self.first_node)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_get_absent_vs_empty() {
        let dht = MemoryDht::founding();
        assert_eq!(dht.get("Cache").await.unwrap(), None);

        dht.set("Cache", Vec::new()).await.unwrap();
        assert_eq!(dht.get("Cache").await.unwrap(), Some(Vec::new()));
    }

    #[tokio::test]
    async fn test_set_delete_keys() {
        let dht = MemoryDht::founding();
        dht.set("b", b"2".to_vec()).await.unwrap();
        dht.set("a", b"1".to_vec()).await.unwrap();
        assert_eq!(dht.keys().await.unwrap(), vec!["a", "b"]);

        dht.delete("a").await.unwrap();
        dht.delete("missing").await.unwrap();
        assert_eq!(dht.keys().await.unwrap(), vec!["b"]);
    }

    #[tokio::test]
    async fn test_clones_share_state() {
        let dht = MemoryDht::founding();
        let handle = dht.clone();
        dht.set("Cache", b"x".to_vec()).await.unwrap();
        assert!(handle.contains_key("Cache"));
    }

    #[tokio::test]
    async fn test_first_node_flag() {
        assert!(MemoryDht::founding().is_first_node().await.unwrap());
        assert!(!MemoryDht::with_first_node(false).is_first_node().await.unwrap());
    }
}
