use crate::application::use_cases::resolve_ci_status::{
    ResolveCiStatusUseCase, ResolveCiStatusUseCaseInput, ResolveCiStatusUseCaseOutput,
};
use async_stream::stream;
use futures_util::Stream;
use std::sync::Arc;
use std::time::Duration;

/// 1接続で監視するリポジトリの最大数
pub const MAX_WATCHED_REPOSITORIES: usize = 20;

/// ステータス再取得の間隔（秒）
pub const REFRESH_INTERVAL_SECONDS: u64 = 60;

/// 1リポジトリあたりのAPI呼び出し回数（ブランチ取得 + チェックラン一覧）
const API_CALLS_PER_REPOSITORY: u32 = 2;

#[derive(Debug, Clone, Default)]
pub struct StreamCiStatusUseCaseInput {
    pub repository_ids: Vec<String>,
}

pub trait StreamCiStatusUseCase {
    fn execute(
        &self,
        input: StreamCiStatusUseCaseInput,
    ) -> impl Stream<Item = ResolveCiStatusUseCaseOutput> + Send;
}

/// Re-resolves a watched set of repositories on a fixed interval.
pub struct StreamCiStatusInteractor {
    resolver: Arc<dyn ResolveCiStatusUseCase>,
    refresh_interval: Duration,
}

impl StreamCiStatusInteractor {
    pub fn new(resolver: Arc<dyn ResolveCiStatusUseCase>) -> Self {
        Self {
            resolver,
            refresh_interval: Duration::from_secs(REFRESH_INTERVAL_SECONDS),
        }
    }

    #[must_use]
    pub fn with_refresh_interval(mut self, refresh_interval: Duration) -> Self {
        self.refresh_interval = refresh_interval;
        self
    }
}

impl StreamCiStatusUseCase for StreamCiStatusInteractor {
    fn execute(
        &self,
        input: StreamCiStatusUseCaseInput,
    ) -> impl Stream<Item = ResolveCiStatusUseCaseOutput> + Send {
        let resolver = self.resolver.clone();
        let refresh_interval = self.refresh_interval;

        let mut repository_ids =
            ResolveCiStatusUseCaseInput::new(input.repository_ids).distinct_ids();
        if repository_ids.len() > MAX_WATCHED_REPOSITORIES {
            tracing::warn!(
                "Watching only the first {} of {} repositories",
                MAX_WATCHED_REPOSITORIES,
                repository_ids.len()
            );
            repository_ids.truncate(MAX_WATCHED_REPOSITORIES);
        }

        stream! {
            loop {
                tracing::debug!("Refreshing CI status for {} repositories", repository_ids.len());
                // Every tick goes back to GitHub, even behind a cache.
                let output = resolver
                    .execute(ResolveCiStatusUseCaseInput::new(repository_ids.clone()).refreshed())
                    .await;
                yield output;

                tokio::time::sleep(refresh_interval).await;
            }
        }
    }
}
