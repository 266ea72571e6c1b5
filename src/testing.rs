//! Scripted adapters for unit tests

use crate::config::AppConfig;
use crate::error::{AppError, Result};
use crate::sources::types::*;
use crate::sources::{
    AnalysisEngine, NewsSource, PriceHistorySource, QuoteSource, SourceRegistry, TextChunkStream,
};
use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, TimeZone, Utc};
use futures_util::stream::{self, StreamExt};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

pub fn quote(symbol: &str) -> AssetQuote {
    AssetQuote {
        symbol: symbol.to_uppercase(),
        price: 100.0,
        change_24h: 1.5,
        volume_24h: 2_000_000.0,
        market_cap: 50_000_000_000.0,
        observed_at: Utc::now(),
    }
}

pub fn news_item(title: &str, hour: u32) -> NewsItem {
    NewsItem {
        title: title.to_string(),
        url: format!("https://example.com/{}", title.replace(' ', "-")),
        published_at: Utc.with_ymd_and_hms(2024, 3, 1, hour, 0, 0).unwrap(),
        source: "Test".to_string(),
        summary: String::new(),
    }
}

pub fn series(symbol: &str, prices: &[f64]) -> PriceSeries {
    let start = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
    let points = prices
        .iter()
        .enumerate()
        .map(|(i, price)| PricePoint {
            timestamp: start + ChronoDuration::minutes(i as i64),
            price: *price,
        })
        .collect();
    PriceSeries::new(symbol.to_uppercase(), points)
}

/// Quotes priced per symbol, with optional per-symbol latency
#[derive(Default)]
pub struct ScriptedQuotes {
    prices: HashMap<String, f64>,
    delays: HashMap<String, Duration>,
    calls: AtomicU32,
}

impl ScriptedQuotes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, symbol: &str, price: f64) -> Self {
        self.prices.insert(symbol.to_uppercase(), price);
        self
    }

    pub fn delayed(mut self, symbol: &str, delay: Duration) -> Self {
        self.delays.insert(symbol.to_uppercase(), delay);
        self
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl QuoteSource for ScriptedQuotes {
    fn id(&self) -> &'static str {
        "scripted"
    }

    async fn get_quote(&self, symbol: &str) -> Result<AssetQuote> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let symbol = symbol.to_uppercase();
        if let Some(delay) = self.delays.get(&symbol) {
            tokio::time::sleep(*delay).await;
        }
        let price = self
            .prices
            .get(&symbol)
            .ok_or_else(|| AppError::Validation(format!("Unsupported symbol: {}", symbol)))?;
        Ok(AssetQuote {
            price: *price,
            ..quote(&symbol)
        })
    }
}

/// History returning the same prices for every symbol
pub struct ScriptedHistory {
    prices: Vec<f64>,
    calls: AtomicU32,
}

impl ScriptedHistory {
    pub fn new(prices: &[f64]) -> Self {
        Self {
            prices: prices.to_vec(),
            calls: AtomicU32::new(0),
        }
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PriceHistorySource for ScriptedHistory {
    fn id(&self) -> &'static str {
        "scripted"
    }

    async fn get_price_series(&self, symbol: &str, range: &RangeSpec) -> Result<PriceSeries> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(series(symbol, &self.prices).resample(range.max_points))
    }
}

/// News feed with a fixed outcome
pub struct ScriptedNews {
    id: String,
    role: NewsCategory,
    outcome: Result<Vec<NewsItem>>,
    calls: AtomicU32,
}

impl ScriptedNews {
    pub fn ok(id: &str, role: NewsCategory, items: Vec<NewsItem>) -> Self {
        Self {
            id: id.to_string(),
            role,
            outcome: Ok(items),
            calls: AtomicU32::new(0),
        }
    }

    pub fn failing(id: &str, role: NewsCategory, error: AppError) -> Self {
        Self {
            id: id.to_string(),
            role,
            outcome: Err(error),
            calls: AtomicU32::new(0),
        }
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl NewsSource for ScriptedNews {
    fn id(&self) -> &str {
        &self.id
    }

    fn role(&self) -> NewsCategory {
        self.role
    }

    async fn fetch_news(&self) -> Result<Vec<NewsItem>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.outcome.clone()
    }
}

enum EngineScript {
    Text(String),
    Chunks(Vec<String>),
    Failing(AppError),
}

/// Analysis engine answering every prompt the same way
pub struct ScriptedEngine {
    script: EngineScript,
    calls: AtomicU32,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedEngine {
    fn with_script(script: EngineScript) -> Self {
        Self {
            script,
            calls: AtomicU32::new(0),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn text(text: &str) -> Self {
        Self::with_script(EngineScript::Text(text.to_string()))
    }

    pub fn chunks(chunks: &[&str]) -> Self {
        Self::with_script(EngineScript::Chunks(
            chunks.iter().map(|c| c.to_string()).collect(),
        ))
    }

    pub fn failing(error: AppError) -> Self {
        Self::with_script(EngineScript::Failing(error))
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_prompt(&self) -> Option<String> {
        self.prompts.lock().last().cloned()
    }

    fn record(&self, prompt: &str) {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().push(prompt.to_string());
    }
}

#[async_trait]
impl AnalysisEngine for ScriptedEngine {
    fn id(&self) -> &'static str {
        "scripted"
    }

    async fn complete(&self, prompt: &str) -> Result<String> {
        self.record(prompt);
        match &self.script {
            EngineScript::Text(text) => Ok(text.clone()),
            EngineScript::Chunks(chunks) => Ok(chunks.concat()),
            EngineScript::Failing(error) => Err(error.clone()),
        }
    }

    async fn stream(&self, prompt: &str) -> Result<TextChunkStream> {
        self.record(prompt);
        let chunks = match &self.script {
            EngineScript::Text(text) => vec![text.clone()],
            EngineScript::Chunks(chunks) => chunks.clone(),
            EngineScript::Failing(error) => return Err(error.clone()),
        };
        Ok(stream::iter(chunks.into_iter().map(Ok)).boxed())
    }
}

/// Registry over scripted adapters, plus handles for inspecting them
pub struct Fakes {
    pub quotes: Arc<ScriptedQuotes>,
    pub history: Arc<ScriptedHistory>,
    pub news: Vec<Arc<ScriptedNews>>,
    pub engine: Arc<ScriptedEngine>,
}

impl Fakes {
    pub fn new(quotes: ScriptedQuotes, news: Vec<ScriptedNews>, engine: ScriptedEngine) -> Self {
        Self {
            quotes: Arc::new(quotes),
            history: Arc::new(ScriptedHistory::new(&[1.0, 2.0, 3.0, 4.0, 5.0])),
            news: news.into_iter().map(Arc::new).collect(),
            engine: Arc::new(engine),
        }
    }

    /// BTC and ETH quotes, two healthy feeds and an engine answering "Hold."
    pub fn healthy() -> Self {
        Self::new(
            ScriptedQuotes::new().with("BTC", 64_000.0).with("ETH", 3_400.0),
            vec![
                ScriptedNews::ok("trend", NewsCategory::AssetTrend, vec![news_item("BTC trending", 5)]),
                ScriptedNews::ok("macro", NewsCategory::Macro, vec![news_item("Fed holds", 4)]),
            ],
            ScriptedEngine::text("Hold."),
        )
    }

    pub fn registry(&self) -> SourceRegistry {
        SourceRegistry {
            quotes: self.quotes.clone(),
            history: self.history.clone(),
            news: self
                .news
                .iter()
                .map(|feed| feed.clone() as Arc<dyn NewsSource>)
                .collect(),
            engine: self.engine.clone(),
        }
    }
}

/// Config with a three-point SMA so the scripted history yields computed values
pub fn test_config() -> AppConfig {
    let mut config = AppConfig::default();
    config.indicator.window = 3;
    config
}
