//! NewsAPI adapter
//!
//! Headline and full-text search feeds. Requires `NEWSAPI_API_KEY`; a missing key
//! fails the feed with a configuration error before any request is sent.

use crate::config::{NewsApiConfig, NewsQuery};
use crate::credentials::{Credential, CredentialStore};
use crate::error::{AppError, Result};
use crate::sources::types::{NewsCategory, NewsItem};
use crate::sources::{check_status, http_client, NewsSource};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Placeholder title NewsAPI uses for retracted articles
const REMOVED_TITLE: &str = "[Removed]";

/// One NewsAPI-backed feed
pub struct NewsApiFeed {
    client: Client,
    base_url: String,
    page_size: u32,
    id: String,
    role: NewsCategory,
    query: NewsQuery,
    credentials: Arc<CredentialStore>,
}

impl NewsApiFeed {
    pub fn new(
        config: &NewsApiConfig,
        id: String,
        role: NewsCategory,
        query: NewsQuery,
        credentials: Arc<CredentialStore>,
    ) -> Result<Self> {
        if query == NewsQuery::Trending {
            return Err(AppError::Config(format!(
                "Feed '{}': trending lists are served by CoinGecko, not NewsAPI",
                id
            )));
        }
        Ok(Self {
            client: http_client(Duration::from_secs(config.timeout_secs))?,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            page_size: config.page_size,
            id,
            role,
            query,
            credentials,
        })
    }

    /// Endpoint path and query parameters for this feed
    fn request_parts(&self) -> (&'static str, Vec<(&'static str, String)>) {
        let page_size = ("pageSize", self.page_size.to_string());
        match &self.query {
            NewsQuery::TopHeadlines { category, country } => (
                "/top-headlines",
                vec![
                    ("category", category.clone()),
                    ("country", country.clone()),
                    page_size,
                ],
            ),
            NewsQuery::Everything { keyword } => (
                "/everything",
                vec![
                    ("q", keyword.clone()),
                    ("sortBy", "publishedAt".to_string()),
                    ("language", "en".to_string()),
                    page_size,
                ],
            ),
            NewsQuery::Publisher { source } => (
                "/top-headlines",
                vec![("sources", source.clone()), page_size],
            ),
            // Rejected in `new`
            NewsQuery::Trending => ("/top-headlines", vec![page_size]),
        }
    }
}

#[async_trait]
impl NewsSource for NewsApiFeed {
    fn id(&self) -> &str {
        &self.id
    }

    fn role(&self) -> NewsCategory {
        self.role
    }

    async fn fetch_news(&self) -> Result<Vec<NewsItem>> {
        let api_key = self.credentials.resolve(Credential::NewsApi)?;
        let (path, params) = self.request_parts();
        info!("NewsApi::fetch_news - {} {}", self.id, path);

        let response = self
            .client
            .get(format!("{}{}", self.base_url, path))
            .header("X-Api-Key", api_key)
            .query(&params)
            .send()
            .await?;
        let response = check_status("newsapi", response).await?;
        let body: ArticlesResponse = response.json().await?;

        map_articles(body)
    }
}

// ============================================================================
// Wire types
// ============================================================================

#[derive(Debug, Deserialize)]
struct ArticlesResponse {
    status: String,
    #[serde(default)]
    articles: Vec<Article>,
    code: Option<String>,
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Article {
    source: ArticleSource,
    title: Option<String>,
    description: Option<String>,
    url: Option<String>,
    published_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
struct ArticleSource {
    name: Option<String>,
}

fn map_articles(body: ArticlesResponse) -> Result<Vec<NewsItem>> {
    if body.status != "ok" {
        let code = body.code.unwrap_or_default();
        let message = body.message.unwrap_or_else(|| "NewsAPI request failed".to_string());
        return Err(match code.as_str() {
            "apiKeyMissing" | "apiKeyInvalid" | "apiKeyDisabled" => AppError::Config(message),
            "rateLimited" => AppError::Transient(message),
            _ => AppError::Validation(format!("{}: {}", code, message)),
        });
    }

    let items = body
        .articles
        .into_iter()
        .filter_map(|article| {
            let title = article.title.filter(|t| !t.is_empty() && t != REMOVED_TITLE)?;
            Some(NewsItem {
                title,
                url: article.url?,
                published_at: article.published_at?,
                source: article.source.name.unwrap_or_else(|| "NewsAPI".to_string()),
                summary: article.description.unwrap_or_default(),
            })
        })
        .collect();

    Ok(items)
}
