use crate::domain::models::ci_status::AggregateStatus;
use async_trait::async_trait;

/// Short-lived store of resolved statuses, keyed by repository identifier.
#[async_trait]
pub trait StatusCache: Send + Sync {
    /// Returns the cached status unless it has expired.
    async fn get(&self, repository_id: &str) -> Option<AggregateStatus>;
    async fn put(&self, repository_id: &str, status: AggregateStatus);
}
