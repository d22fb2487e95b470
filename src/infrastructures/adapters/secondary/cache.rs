use crate::domain::cache::StatusCache;
use crate::domain::models::ci_status::AggregateStatus;
use async_trait::async_trait;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

struct CacheEntry {
    status: AggregateStatus,
    stored_at: Instant,
}

/// Process-local [`StatusCache`] whose entries expire after a fixed TTL.
pub struct InMemoryStatusCache {
    ttl: Duration,
    entries: RwLock<HashMap<String, CacheEntry>>,
}

impl InMemoryStatusCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: RwLock::new(HashMap::new()),
        }
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[async_trait]
impl StatusCache for InMemoryStatusCache {
    async fn get(&self, repository_id: &str) -> Option<AggregateStatus> {
        let entries = self.entries.read().await;
        entries
            .get(repository_id)
            .filter(|entry| entry.stored_at.elapsed() < self.ttl)
            .map(|entry| entry.status.clone())
    }

    async fn put(&self, repository_id: &str, status: AggregateStatus) {
        let mut entries = self.entries.write().await;
        let ttl = self.ttl;
        entries.retain(|_, entry| entry.stored_at.elapsed() < ttl);
        entries.insert(
            repository_id.to_string(),
            CacheEntry {
                status,
                stored_at: Instant::now(),
            },
        );
    }
}
