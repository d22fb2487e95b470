use crate::application::use_cases::resolve_ci_status::{
    ResolveCiStatusUseCase, ResolveCiStatusUseCaseInput, ResolveCiStatusUseCaseOutput,
};
use crate::domain::cache::StatusCache;
use crate::domain::models::ci_status::{
    AggregateStatus, BRANCH_NOT_FOUND_DETAILS, CiState, NO_CI_DETAILS,
};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;

/// Serves recently resolved statuses from a [`StatusCache`] and resolves the
/// rest through the wrapped use case.
pub struct CachedResolveCiStatusInteractor<U: ?Sized, C: ?Sized> {
    inner: Arc<U>,
    cache: Arc<C>,
}

impl<U: ResolveCiStatusUseCase + ?Sized, C: StatusCache + ?Sized>
    CachedResolveCiStatusInteractor<U, C>
{
    pub fn new(inner: Arc<U>, cache: Arc<C>) -> Self {
        Self { inner, cache }
    }
}

/// Only answers that actually came back from GitHub are worth keeping.
/// Fetch errors stay uncached so the next request retries them.
fn is_cacheable(status: &AggregateStatus) -> bool {
    match status.state {
        CiState::Unknown => {
            status.details == NO_CI_DETAILS || status.details == BRANCH_NOT_FOUND_DETAILS
        }
        CiState::Success | CiState::Failure | CiState::Pending | CiState::Error => true,
    }
}

#[async_trait]
impl<U: ResolveCiStatusUseCase + ?Sized, C: StatusCache + ?Sized> ResolveCiStatusUseCase
    for CachedResolveCiStatusInteractor<U, C>
{
    #[tracing::instrument(name = "CachedResolveCiStatusInteractor::execute", skip_all)]
    async fn execute(&self, input: ResolveCiStatusUseCaseInput) -> ResolveCiStatusUseCaseOutput {
        let mut statuses = HashMap::new();
        let mut misses = Vec::new();
        for id in input.distinct_ids() {
            // A refresh still stores what it resolves, it just never reads.
            let cached = if input.refresh {
                None
            } else {
                self.cache.get(&id).await
            };
            match cached {
                Some(status) => {
                    statuses.insert(id, status);
                }
                None => misses.push(id),
            }
        }
        tracing::debug!("{} cache hits, {} misses", statuses.len(), misses.len());

        if !misses.is_empty() {
            let fresh = self
                .inner
                .execute(ResolveCiStatusUseCaseInput::new(misses))
                .await;
            for (id, status) in fresh.statuses {
                if is_cacheable(&status) {
                    self.cache.put(&id, status.clone()).await;
                }
                statuses.insert(id, status);
            }
        }

        ResolveCiStatusUseCaseOutput { statuses }
    }
}
