//! Shared result store written by sweep workers

use crate::ping::PingStats;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Lock-protected map from address string to probe result.
///
/// Cloning is cheap and every clone writes into the same map.
#[derive(Debug, Clone, Default)]
pub struct ResultStore {
    inner: Arc<Mutex<HashMap<String, PingStats>>>,
}

impl ResultStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the result for one host, replacing any earlier entry for the same key
    pub async fn insert(&self, target: String, stats: PingStats) {
        let mut results = self.inner.lock().await;
        results.insert(target, stats);
    }

    pub async fn len(&self) -> usize {
        self.inner.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.lock().await.is_empty()
    }

    /// Flatten into a plain map. Call once every worker has been joined.
    pub async fn into_results(self) -> HashMap<String, PingStats> {
        match Arc::try_unwrap(self.inner) {
            Ok(results) => results.into_inner(),
            Err(shared) => shared.lock().await.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_concurrent_writers_lose_nothing() {
        let store = ResultStore::new();
        let mut handles = Vec::new();

        for worker in 0..8u32 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                for i in 0..50u32 {
                    store.insert(format!("{}-{}", worker, i), PingStats::default()).await;
                }
            }));
        }

        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(store.len().await, 400);
        assert_eq!(store.into_results().await.len(), 400);
    }

    #[tokio::test]
    async fn test_overwrite_on_duplicate_key() {
        let store = ResultStore::new();
        store.insert("10.0.0.1".to_string(), PingStats::default()).await;
        store
            .insert(
                "10.0.0.1".to_string(),
                PingStats {
                    packets_sent: 2,
                    packets_recv: 2,
                    ..Default::default()
                },
            )
            .await;

        let results = store.into_results().await;
        assert_eq!(results.len(), 1);
        assert_eq!(results["10.0.0.1"].packets_recv, 2);
    }
}
