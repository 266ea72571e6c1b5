//! News Service
//!
//! Fetches every configured feed concurrently through the orchestrator and merges
//! the outcomes. A failing feed never fails the request.

use crate::error::Result;
use crate::news::{NewsAggregator, NewsBundle, SourceResult};
use crate::orchestrator::FetchKey;
use crate::sources::types::NewsItem;
use crate::state::AppState;
use futures_util::future::join_all;
use std::sync::Arc;
use tracing::info;

/// News service for business logic
pub struct NewsService;

impl NewsService {
    /// Get the merged bundle of all feeds
    pub async fn get_news(state: &AppState) -> Result<Arc<NewsBundle>> {
        info!("NewsService::get_news - {} feed(s)", state.sources.news.len());

        let requests = state.sources.news.iter().map(|feed| {
            let id = feed.id().to_string();
            let role = feed.role();
            let source = Arc::clone(feed);

            async move {
                let outcome = state
                    .orchestrator
                    .request(FetchKey::news(&id), &state.policies.news, move || {
                        let source = Arc::clone(&source);
                        async move { source.fetch_news().await }
                    })
                    .await
                    .map(|items: Arc<Vec<NewsItem>>| items.as_ref().clone());
                SourceResult::new(id, role, outcome)
            }
        });

        let bundle = NewsAggregator::merge(join_all(requests).await);
        info!(
            "NewsService::get_news - {} item(s), {} failed feed(s)",
            bundle.len(),
            bundle.failed_sources().len()
        );
        Ok(Arc::new(bundle))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;
    use crate::sources::types::NewsCategory;
    use crate::testing::{news_item, test_config, Fakes, ScriptedEngine, ScriptedNews, ScriptedQuotes};

    #[tokio::test(start_paused = true)]
    async fn test_one_failing_feed_of_three() {
        let fakes = Fakes::new(
            ScriptedQuotes::new(),
            vec![
                ScriptedNews::ok("a", NewsCategory::AssetTrend, vec![news_item("a1", 2)]),
                ScriptedNews::failing("b", NewsCategory::Macro, AppError::Transient("503".to_string())),
                ScriptedNews::ok("c", NewsCategory::Macro, vec![news_item("c1", 5), news_item("c2", 1)]),
            ],
            ScriptedEngine::text("unused"),
        );
        let state = AppState::with_sources(test_config(), fakes.registry());

        let bundle = NewsService::get_news(&state).await.unwrap();

        assert_eq!(bundle.len(), 3);
        assert_eq!(bundle.items()[0].item.title, "c1");
        assert_eq!(bundle.failed_sources().iter().collect::<Vec<_>>(), vec!["b"]);
        // Transient failures are retried up to the news policy's budget
        assert_eq!(fakes.news[1].calls(), 4);
        state.shutdown();
    }

    #[tokio::test]
    async fn test_cached_feeds_are_not_refetched() {
        let fakes = Fakes::healthy();
        let state = AppState::with_sources(test_config(), fakes.registry());

        NewsService::get_news(&state).await.unwrap();
        NewsService::get_news(&state).await.unwrap();

        assert!(fakes.news.iter().all(|feed| feed.calls() == 1));
        state.shutdown();
    }
}
