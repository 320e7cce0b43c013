use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use fabricx_network::Network;

/// In-memory mapping from network id to [`Network`].
///
/// An explicit owned map guarded by a reader/writer lock, passed to the
/// service façade at construction; never a process-wide singleton. Lookups
/// take the read lock, insert/delete the write lock, and neither is held
/// across anything long-running. State is process-lifetime only; nothing is
/// reloaded on restart.
pub struct NetworkRegistry {
    networks: RwLock<HashMap<String, Arc<Network>>>,
}

impl NetworkRegistry {
    pub fn new() -> Self {
        Self {
            networks: RwLock::new(HashMap::new()),
        }
    }

    /// Registers a bootstrapped network under its id.
    pub async fn insert(&self, network: Network) -> Arc<Network> {
        let network = Arc::new(network);
        self.networks
            .write()
            .await
            .insert(network.id.clone(), network.clone());
        network
    }

    pub async fn get(&self, network_id: &str) -> Option<Arc<Network>> {
        self.networks.read().await.get(network_id).cloned()
    }

    pub async fn remove(&self, network_id: &str) -> Option<Arc<Network>> {
        self.networks.write().await.remove(network_id)
    }

    /// Every registered network, for shutdown iteration.
    pub async fn all(&self) -> Vec<Arc<Network>> {
        self.networks.read().await.values().cloned().collect()
    }

    pub async fn len(&self) -> usize {
        self.networks.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.networks.read().await.is_empty()
    }

    pub async fn clear(&self) {
        self.networks.write().await.clear();
    }
}

impl Default for NetworkRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fabricx_network::planner::{plan_network, PlanRequest};

    fn sample_network(id: &str) -> Network {
        plan_network(
            PlanRequest {
                name: "t".into(),
                org_count: 1,
                channel_name: "ch".into(),
            },
            format!("/tmp/fabricx/{id}").into(),
            id.into(),
        )
    }

    #[tokio::test]
    async fn test_insert_and_get() {
        let registry = NetworkRegistry::new();
        registry.insert(sample_network("aaa11111")).await;

        let found = registry.get("aaa11111").await.unwrap();
        assert_eq!(found.id, "aaa11111");
        assert!(registry.get("zzz99999").await.is_none());
    }

    #[tokio::test]
    async fn test_remove() {
        let registry = NetworkRegistry::new();
        registry.insert(sample_network("aaa11111")).await;

        assert!(registry.remove("aaa11111").await.is_some());
        assert!(registry.remove("aaa11111").await.is_none());
        assert!(registry.is_empty().await);
    }

    #[tokio::test]
    async fn test_all_and_clear() {
        let registry = NetworkRegistry::new();
        registry.insert(sample_network("aaa11111")).await;
        registry.insert(sample_network("bbb22222")).await;

        assert_eq!(registry.all().await.len(), 2);
        assert_eq!(registry.len().await, 2);

        registry.clear().await;
        assert!(registry.is_empty().await);
    }

    #[tokio::test]
    async fn test_concurrent_access() {
        use tokio::task::JoinSet;

        let registry = Arc::new(NetworkRegistry::new());
        let mut join_set = JoinSet::new();

        for i in 0..16 {
            let registry = Arc::clone(&registry);
            join_set.spawn(async move {
                let id = format!("net{i:05}");
                registry.insert(sample_network(&id)).await;
                assert!(registry.get(&id).await.is_some());
            });
        }
        while let Some(result) = join_set.join_next().await {
            result.unwrap();
        }
        assert_eq!(registry.len().await, 16);
    }
}
