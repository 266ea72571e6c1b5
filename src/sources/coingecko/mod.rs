//! CoinGecko adapter
//!
//! Unauthenticated public API: quotes, price history and the trending list.
//! Every call goes through a shared token bucket.

use crate::config::CoinGeckoConfig;
use crate::error::{AppError, Result};
use crate::sources::rate_limiter::{RateLimiter, TokenBucket};
use crate::sources::types::*;
use crate::sources::{check_status, http_client, NewsSource, PriceHistorySource, QuoteSource};
use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use reqwest::Client;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

const TRENDING_SOURCE: &str = "CoinGecko Trends";
const TRENDING_LIMIT: usize = 5;

/// CoinGecko client implementing quote and history lookups
pub struct CoinGeckoClient {
    client: Client,
    base_url: String,
    symbols: BTreeMap<String, String>,
    limiter: RateLimiter,
}

impl CoinGeckoClient {
    pub fn new(config: &CoinGeckoConfig, symbols: BTreeMap<String, String>) -> Result<Self> {
        Ok(Self {
            client: http_client(Duration::from_secs(config.timeout_secs))?,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            symbols,
            limiter: RateLimiter::new(
                "coingecko",
                TokenBucket::per_minute(config.requests_per_minute.max(1)),
            ),
        })
    }

    fn coin_id(&self, symbol: &str) -> Result<&str> {
        self.symbols
            .get(&symbol.to_uppercase())
            .map(String::as_str)
            .ok_or_else(|| AppError::Validation(format!("Unsupported symbol: {}", symbol)))
    }

    async fn get(&self, path: &str, query: &[(&str, String)]) -> Result<reqwest::Response> {
        self.limiter.acquire().await;
        let response = self
            .client
            .get(format!("{}{}", self.base_url, path))
            .query(query)
            .send()
            .await?;
        check_status("coingecko", response).await
    }

    /// Trending coins rendered as news items
    pub async fn trending(&self) -> Result<Vec<NewsItem>> {
        let response = self.get("/search/trending", &[]).await?;
        let body: TrendingResponse = response.json().await?;
        Ok(map_trending(body, Utc::now()))
    }
}

#[async_trait]
impl QuoteSource for CoinGeckoClient {
    fn id(&self) -> &'static str {
        "coingecko"
    }

    async fn get_quote(&self, symbol: &str) -> Result<AssetQuote> {
        let coin_id = self.coin_id(symbol)?.to_string();
        info!("CoinGecko::get_quote - {} ({})", symbol, coin_id);

        let response = self
            .get(
                "/coins/markets",
                &[("vs_currency", "usd".to_string()), ("ids", coin_id.clone())],
            )
            .await?;
        let markets: Vec<MarketEntry> = response.json().await?;

        map_quote(symbol, &coin_id, markets, Utc::now())
    }
}

#[async_trait]
impl PriceHistorySource for CoinGeckoClient {
    fn id(&self) -> &'static str {
        "coingecko"
    }

    async fn get_price_series(&self, symbol: &str, range: &RangeSpec) -> Result<PriceSeries> {
        let coin_id = self.coin_id(symbol)?.to_string();
        info!("CoinGecko::get_price_series - {} {}", symbol, range);

        let response = self
            .get(
                &format!("/coins/{}/market_chart", coin_id),
                &[("vs_currency", "usd".to_string()), ("days", range.days.to_string())],
            )
            .await?;
        let chart: MarketChart = response.json().await?;

        map_chart(symbol, chart).map(|series| series.resample(range.max_points))
    }
}

/// Trending list exposed as a news feed
pub struct TrendingFeed {
    id: String,
    role: NewsCategory,
    client: Arc<CoinGeckoClient>,
}

impl TrendingFeed {
    pub fn new(id: String, role: NewsCategory, client: Arc<CoinGeckoClient>) -> Self {
        Self { id, role, client }
    }
}

#[async_trait]
impl NewsSource for TrendingFeed {
    fn id(&self) -> &str {
        &self.id
    }

    fn role(&self) -> NewsCategory {
        self.role
    }

    async fn fetch_news(&self) -> Result<Vec<NewsItem>> {
        self.client.trending().await
    }
}

// ============================================================================
// Wire types
// ============================================================================

#[derive(Debug, Deserialize)]
struct MarketEntry {
    current_price: Option<f64>,
    price_change_percentage_24h: Option<f64>,
    total_volume: Option<f64>,
    market_cap: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct MarketChart {
    prices: Vec<(f64, f64)>,
}

#[derive(Debug, Deserialize)]
struct TrendingResponse {
    coins: Vec<TrendingCoin>,
}

#[derive(Debug, Deserialize)]
struct TrendingCoin {
    item: TrendingItem,
}

#[derive(Debug, Deserialize)]
struct TrendingItem {
    id: String,
    name: String,
    symbol: String,
    market_cap_rank: Option<u32>,
    #[serde(default)]
    price_btc: f64,
}

fn map_quote(
    symbol: &str,
    coin_id: &str,
    markets: Vec<MarketEntry>,
    observed_at: DateTime<Utc>,
) -> Result<AssetQuote> {
    let entry = markets
        .into_iter()
        .next()
        .ok_or_else(|| AppError::Validation(format!("No data found for {}", coin_id)))?;

    Ok(AssetQuote {
        symbol: symbol.to_uppercase(),
        price: entry.current_price.unwrap_or(0.0),
        change_24h: entry.price_change_percentage_24h.unwrap_or(0.0),
        volume_24h: entry.total_volume.unwrap_or(0.0),
        market_cap: entry.market_cap.unwrap_or(0.0),
        observed_at,
    })
}

fn map_chart(symbol: &str, chart: MarketChart) -> Result<PriceSeries> {
    let points = chart
        .prices
        .into_iter()
        .map(|(millis, price)| {
            Utc.timestamp_millis_opt(millis as i64)
                .single()
                .map(|timestamp| PricePoint { timestamp, price })
                .ok_or_else(|| AppError::Validation(format!("Invalid timestamp {}", millis)))
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(PriceSeries::new(symbol.to_uppercase(), points))
}

fn map_trending(body: TrendingResponse, now: DateTime<Utc>) -> Vec<NewsItem> {
    body.coins
        .into_iter()
        .take(TRENDING_LIMIT)
        .map(|coin| {
            let item = coin.item;
            let rank = item
                .market_cap_rank
                .map(|r| r.to_string())
                .unwrap_or_else(|| "n/a".to_string());
            NewsItem {
                title: format!("{} ({}) is trending", item.name, item.symbol.to_uppercase()),
                url: format!("https://www.coingecko.com/en/coins/{}", item.id),
                published_at: now,
                source: TRENDING_SOURCE.to_string(),
                summary: format!(
                    "{} is currently trending with a market cap rank of {}. Price change in BTC: {:.8}",
                    item.name, rank, item.price_btc
                ),
            }
        })
        .collect()
}
