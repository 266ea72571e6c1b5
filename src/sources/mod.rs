//! Source adapters module
//!
//! One adapter per upstream capability: quote lookup, price history, news feeds and
//! the analysis engine. Adapters are constructed explicitly and injected through
//! [`SourceRegistry`]; nothing here is a process-wide singleton.

pub mod types;
pub mod rate_limiter;
pub mod coingecko;
pub mod newsapi;
pub mod openai;

use crate::config::{AppConfig, NewsQuery};
use crate::credentials::CredentialStore;
use crate::error::{AppError, Result};
use async_trait::async_trait;
use futures_util::stream::BoxStream;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use types::*;

/// Live quote lookup
#[async_trait]
pub trait QuoteSource: Send + Sync {
    fn id(&self) -> &'static str;

    async fn get_quote(&self, symbol: &str) -> Result<AssetQuote>;
}

/// Historical price series lookup
#[async_trait]
pub trait PriceHistorySource: Send + Sync {
    fn id(&self) -> &'static str;

    /// Series ascending by timestamp, resampled to `range.max_points`
    async fn get_price_series(&self, symbol: &str, range: &RangeSpec) -> Result<PriceSeries>;
}

/// One independent news feed
#[async_trait]
pub trait NewsSource: Send + Sync {
    /// Stable feed identifier, reported in `failed_sources`
    fn id(&self) -> &str;

    /// Category every item of this feed is tagged with
    fn role(&self) -> NewsCategory;

    async fn fetch_news(&self) -> Result<Vec<NewsItem>>;
}

/// Lazy, finite, non-restartable sequence of text chunks
pub type TextChunkStream = BoxStream<'static, Result<String>>;

/// How the analysis engine delivers its answer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisMode {
    #[default]
    Buffered,
    Streamed,
}

pub enum EngineOutput {
    Text(String),
    Chunks(TextChunkStream),
}

/// Hosted language-model completion capability
#[async_trait]
pub trait AnalysisEngine: Send + Sync {
    fn id(&self) -> &'static str;

    /// Single buffered completion
    async fn complete(&self, prompt: &str) -> Result<String>;

    /// Streamed completion; chunks arrive in generation order
    async fn stream(&self, prompt: &str) -> Result<TextChunkStream>;

    async fn submit(&self, prompt: &str, mode: AnalysisMode) -> Result<EngineOutput> {
        match mode {
            AnalysisMode::Buffered => self.complete(prompt).await.map(EngineOutput::Text),
            AnalysisMode::Streamed => self.stream(prompt).await.map(EngineOutput::Chunks),
        }
    }
}

/// Injected adapter instances used by the services layer
#[derive(Clone)]
pub struct SourceRegistry {
    pub quotes: Arc<dyn QuoteSource>,
    pub history: Arc<dyn PriceHistorySource>,
    pub news: Vec<Arc<dyn NewsSource>>,
    pub engine: Arc<dyn AnalysisEngine>,
}

impl SourceRegistry {
    /// Build the production adapters described by `config`
    pub fn from_config(config: &AppConfig, credentials: Arc<CredentialStore>) -> Result<Self> {
        let coingecko = Arc::new(coingecko::CoinGeckoClient::new(
            &config.coingecko,
            config.symbols.clone(),
        )?);

        let mut news: Vec<Arc<dyn NewsSource>> = Vec::with_capacity(config.news_feeds.len());
        for feed in &config.news_feeds {
            match &feed.query {
                NewsQuery::Trending => news.push(Arc::new(coingecko::TrendingFeed::new(
                    feed.id.clone(),
                    feed.role,
                    coingecko.clone(),
                ))),
                query => news.push(Arc::new(newsapi::NewsApiFeed::new(
                    &config.newsapi,
                    feed.id.clone(),
                    feed.role,
                    query.clone(),
                    credentials.clone(),
                )?)),
            }
        }

        let engine = Arc::new(openai::OpenAiEngine::new(&config.openai, credentials)?);

        tracing::info!(
            "Source registry: quotes={}, history={}, {} news feed(s), engine={}",
            QuoteSource::id(coingecko.as_ref()),
            PriceHistorySource::id(coingecko.as_ref()),
            news.len(),
            engine.id()
        );

        Ok(Self {
            quotes: coingecko.clone(),
            history: coingecko,
            news,
            engine,
        })
    }
}

/// Build an HTTP client with a request timeout
pub(crate) fn http_client(timeout: Duration) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .user_agent(concat!("market-signal/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| AppError::Config(format!("Failed to create HTTP client: {}", e)))
}

/// Pass 2xx responses through; turn anything else into a classified error
pub(crate) async fn check_status(
    provider: &str,
    response: reqwest::Response,
) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(classify_status(provider, status.as_u16(), &body))
}

/// 429/5xx are transient, 401/403 mean the credential was rejected, other 4xx are final
pub(crate) fn classify_status(provider: &str, status: u16, body: &str) -> AppError {
    let detail: String = body.chars().take(200).collect();
    match status {
        429 | 500..=599 => AppError::Transient(format!("{} returned {}: {}", provider, status, detail)),
        401 | 403 => AppError::Config(format!(
            "{} rejected the credential ({}): {}",
            provider, status, detail
        )),
        _ => AppError::Upstream {
            status,
            message: format!("{}: {}", provider, detail),
        },
    }
}
