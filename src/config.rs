//! Application configuration
//!
//! Every field has a default, so an absent or partial JSON file is valid.
//! Environment overrides are applied after the file is read.

use crate::error::{AppError, Result};
use crate::indicators::IndicatorKind;
use crate::orchestrator::{Backoff, FetchPolicy, PolicySet};
use crate::sources::types::{NewsCategory, RangeSpec};
use crate::sources::AnalysisMode;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;
use url::Url;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Symbol selected at startup
    pub default_symbol: String,
    /// Supported symbols mapped to their upstream coin id
    pub symbols: BTreeMap<String, String>,
    pub coingecko: CoinGeckoConfig,
    pub newsapi: NewsApiConfig,
    pub openai: OpenAiConfig,
    pub news_feeds: Vec<NewsFeedConfig>,
    pub history: HistoryConfig,
    pub indicator: IndicatorConfig,
    pub analysis: AnalysisConfig,
    pub policies: PoliciesConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            default_symbol: "BTC".to_string(),
            symbols: BTreeMap::from([
                ("BTC".to_string(), "bitcoin".to_string()),
                ("ETH".to_string(), "ethereum".to_string()),
                ("SOL".to_string(), "solana".to_string()),
            ]),
            coingecko: CoinGeckoConfig::default(),
            newsapi: NewsApiConfig::default(),
            openai: OpenAiConfig::default(),
            news_feeds: default_news_feeds(),
            history: HistoryConfig::default(),
            indicator: IndicatorConfig::default(),
            analysis: AnalysisConfig::default(),
            policies: PoliciesConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load from an optional JSON file, then apply environment overrides and validate
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => {
                let raw = std::fs::read_to_string(path).map_err(|e| {
                    AppError::Config(format!("Failed to read {}: {}", path.display(), e))
                })?;
                Self::from_json(&raw)?
            }
            None => Self::default(),
        };

        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    pub fn from_json(raw: &str) -> Result<Self> {
        serde_json::from_str(raw).map_err(|e| AppError::Config(format!("Invalid config: {}", e)))
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(model) = std::env::var("MARKET_SIGNAL_OPENAI_MODEL") {
            if !model.trim().is_empty() {
                self.openai.model = model;
            }
        }
        if let Ok(symbol) = std::env::var("MARKET_SIGNAL_DEFAULT_SYMBOL") {
            if !symbol.trim().is_empty() {
                self.default_symbol = symbol.to_uppercase();
            }
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.indicator.window == 0 {
            return Err(AppError::Config("indicator.window must be at least 1".into()));
        }
        if self.history.points == 0 {
            return Err(AppError::Config("history.points must be at least 1".into()));
        }
        if self.indicator.window > self.history.points {
            return Err(AppError::Config(format!(
                "indicator.window ({}) exceeds history.points ({}); no value could ever be computed",
                self.indicator.window, self.history.points
            )));
        }
        if self.history.days <= 0.0 {
            return Err(AppError::Config("history.days must be positive".into()));
        }
        self.coin_id(&self.default_symbol)
            .map_err(|_| AppError::Config(format!(
                "default_symbol {} is not in the symbol map",
                self.default_symbol
            )))?;

        for (name, base_url) in [
            ("coingecko", &self.coingecko.base_url),
            ("newsapi", &self.newsapi.base_url),
            ("openai", &self.openai.base_url),
        ] {
            Url::parse(base_url).map_err(|e| {
                AppError::Config(format!("{}.base_url '{}' is invalid: {}", name, base_url, e))
            })?;
        }

        let mut seen = std::collections::HashSet::new();
        for feed in &self.news_feeds {
            if !seen.insert(feed.id.as_str()) {
                return Err(AppError::Config(format!("Duplicate news feed id '{}'", feed.id)));
            }
        }
        Ok(())
    }

    /// Upstream coin id for a supported symbol
    pub fn coin_id(&self, symbol: &str) -> Result<&str> {
        self.symbols
            .get(&symbol.to_uppercase())
            .map(String::as_str)
            .ok_or_else(|| AppError::Validation(format!("Unsupported symbol: {}", symbol)))
    }

    pub fn range_spec(&self) -> RangeSpec {
        RangeSpec {
            days: self.history.days,
            max_points: self.history.points,
        }
    }

    pub fn policy_set(&self) -> PolicySet {
        PolicySet {
            quote: (&self.policies.quote).into(),
            price_history: (&self.policies.price_history).into(),
            indicator: (&self.policies.indicator).into(),
            news: (&self.policies.news).into(),
            analysis: (&self.policies.analysis).into(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CoinGeckoConfig {
    pub base_url: String,
    pub requests_per_minute: u32,
    pub timeout_secs: u64,
}

impl Default for CoinGeckoConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.coingecko.com/api/v3".to_string(),
            requests_per_minute: 30,
            timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NewsApiConfig {
    pub base_url: String,
    pub page_size: u32,
    pub timeout_secs: u64,
}

impl Default for NewsApiConfig {
    fn default() -> Self {
        Self {
            base_url: "https://newsapi.org/v2".to_string(),
            page_size: 10,
            timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OpenAiConfig {
    pub base_url: String,
    pub model: String,
    pub timeout_secs: u64,
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            model: "gpt-4o".to_string(),
            timeout_secs: 120,
        }
    }
}

/// Query a news feed runs against its provider
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NewsQuery {
    /// CoinGecko trending coins
    Trending,
    /// NewsAPI headlines filtered by category and country
    TopHeadlines { category: String, country: String },
    /// NewsAPI full-text search
    Everything { keyword: String },
    /// NewsAPI headlines of one publisher
    Publisher { source: String },
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewsFeedConfig {
    pub id: String,
    pub role: NewsCategory,
    pub query: NewsQuery,
}

fn default_news_feeds() -> Vec<NewsFeedConfig> {
    vec![
        NewsFeedConfig {
            id: "coingecko-trending".to_string(),
            role: NewsCategory::AssetTrend,
            query: NewsQuery::Trending,
        },
        NewsFeedConfig {
            id: "newsapi-business".to_string(),
            role: NewsCategory::Macro,
            query: NewsQuery::TopHeadlines {
                category: "business".to_string(),
                country: "us".to_string(),
            },
        },
        NewsFeedConfig {
            id: "newsapi-crypto".to_string(),
            role: NewsCategory::AssetTrend,
            query: NewsQuery::Everything {
                keyword: "cryptocurrency".to_string(),
            },
        },
    ]
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    /// Look-back in days; 0.09375 days = 135 minutes
    pub days: f64,
    /// Points kept after resampling
    pub points: usize,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            days: 0.09375,
            points: 10,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct IndicatorConfig {
    pub kind: IndicatorKind,
    pub window: usize,
    /// Trailing indicator values embedded in the analysis request
    pub trailing: usize,
}

impl Default for IndicatorConfig {
    fn default() -> Self {
        Self {
            kind: IndicatorKind::Sma,
            window: 5,
            trailing: 5,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    pub mode: AnalysisMode,
}

/// Serializable form of a [`FetchPolicy`]
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct PolicyConfig {
    pub ttl_secs: u64,
    pub max_attempts: u32,
    pub backoff_initial_ms: u64,
    pub backoff_max_ms: u64,
    pub backoff_multiplier: f64,
    pub backoff_jitter: f64,
    pub refetch_interval_secs: Option<u64>,
    pub attempt_timeout_secs: u64,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            ttl_secs: 60,
            max_attempts: 4,
            backoff_initial_ms: 1_000,
            backoff_max_ms: 30_000,
            backoff_multiplier: 2.0,
            backoff_jitter: 0.1,
            refetch_interval_secs: None,
            attempt_timeout_secs: 30,
        }
    }
}

impl From<&PolicyConfig> for FetchPolicy {
    fn from(config: &PolicyConfig) -> Self {
        FetchPolicy {
            ttl: Duration::from_secs(config.ttl_secs),
            max_attempts: config.max_attempts.max(1),
            backoff: Backoff {
                initial: Duration::from_millis(config.backoff_initial_ms),
                max: Duration::from_millis(config.backoff_max_ms),
                multiplier: config.backoff_multiplier,
                jitter: config.backoff_jitter.clamp(0.0, 0.99),
            },
            refetch_interval: config
                .refetch_interval_secs
                .filter(|secs| *secs > 0)
                .map(Duration::from_secs),
            attempt_timeout: Duration::from_secs(config.attempt_timeout_secs.max(1)),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PoliciesConfig {
    pub quote: PolicyConfig,
    pub price_history: PolicyConfig,
    pub indicator: PolicyConfig,
    pub news: PolicyConfig,
    pub analysis: PolicyConfig,
}

impl Default for PoliciesConfig {
    fn default() -> Self {
        // Quotes and news refresh every 15 minutes with three retries
        Self {
            quote: PolicyConfig {
                ttl_secs: 900,
                refetch_interval_secs: Some(900),
                ..PolicyConfig::default()
            },
            price_history: PolicyConfig {
                ttl_secs: 300,
                ..PolicyConfig::default()
            },
            indicator: PolicyConfig {
                ttl_secs: 300,
                max_attempts: 1,
                ..PolicyConfig::default()
            },
            news: PolicyConfig {
                ttl_secs: 900,
                refetch_interval_secs: Some(900),
                ..PolicyConfig::default()
            },
            analysis: PolicyConfig {
                ttl_secs: 0,
                max_attempts: 2,
                attempt_timeout_secs: 120,
                ..PolicyConfig::default()
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::types::{PricePoint, PriceSeries};
    use std::io::Write;

    #[test]
    fn test_defaults_are_valid() {
        let config = AppConfig::default();
        config.validate().unwrap();

        assert_eq!(config.coin_id("eth").unwrap(), "ethereum");
        assert_eq!(config.news_feeds.len(), 3);
        assert_eq!(config.indicator.window, 5);
    }

    #[test]
    fn test_default_indicator_produces_values() {
        let config = AppConfig::default();
        let start = chrono::Utc::now();
        let points = (0..200)
            .map(|i| PricePoint {
                timestamp: start + chrono::Duration::minutes(i),
                price: 100.0 + i as f64,
            })
            .collect();
        let series = PriceSeries::new("BTC", points).resample(config.range_spec().max_points);

        let indicator =
            crate::indicators::compute(config.indicator.kind, &series, config.indicator.window)
                .unwrap();

        assert_eq!(indicator.len(), config.history.points);
        assert!(indicator.trailing(config.indicator.trailing).iter().all(Option::is_some));
    }

    #[test]
    fn test_window_longer_than_history_is_rejected() {
        let config = AppConfig::from_json(
            r#"{ "indicator": { "window": 50 }, "history": { "points": 10 } }"#,
        )
        .unwrap();
        assert!(matches!(config.validate(), Err(AppError::Config(ref msg)) if msg.contains("history.points")));
    }

    #[test]
    fn test_unsupported_symbol_is_validation_error() {
        let config = AppConfig::default();
        assert!(matches!(config.coin_id("DOGE"), Err(AppError::Validation(_))));
    }

    #[test]
    fn test_policy_conversion() {
        let policies = AppConfig::default().policy_set();

        assert_eq!(policies.quote.ttl, Duration::from_secs(900));
        assert_eq!(policies.quote.refetch_interval, Some(Duration::from_secs(900)));
        assert_eq!(policies.quote.max_attempts, 4);
        assert_eq!(policies.analysis.max_attempts, 2);
        assert_eq!(policies.analysis.ttl, Duration::ZERO);
        assert_eq!(policies.price_history.refetch_interval, None);
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config = AppConfig::from_json(
            r#"{
                "default_symbol": "SOL",
                "indicator": { "kind": "ema", "window": 3 },
                "analysis": { "mode": "streamed" },
                "news_feeds": [
                    { "id": "reuters", "role": "macro", "query": { "type": "publisher", "source": "reuters" } }
                ]
            }"#,
        )
        .unwrap();

        assert_eq!(config.default_symbol, "SOL");
        assert_eq!(config.indicator.kind, IndicatorKind::Ema);
        assert_eq!(config.indicator.window, 3);
        assert_eq!(config.indicator.trailing, 5);
        assert_eq!(config.analysis.mode, AnalysisMode::Streamed);
        assert_eq!(
            config.news_feeds[0].query,
            NewsQuery::Publisher { source: "reuters".to_string() }
        );
        assert_eq!(config.openai.model, "gpt-4o");
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{ "history": {{ "points": 20 }} }}"#).unwrap();

        let config = AppConfig::load(Some(file.path())).unwrap();
        assert_eq!(config.history.points, 20);
        assert_eq!(config.range_spec().max_points, 20);
    }

    #[test]
    fn test_zero_window_is_rejected() {
        let config = AppConfig::from_json(r#"{ "indicator": { "window": 0 } }"#).unwrap();
        assert!(matches!(config.validate(), Err(AppError::Config(_))));
    }

    #[test]
    fn test_invalid_base_url_is_rejected() {
        let config = AppConfig::from_json(r#"{ "openai": { "base_url": "not a url" } }"#).unwrap();
        assert!(matches!(config.validate(), Err(AppError::Config(ref msg)) if msg.contains("openai")));
    }

    #[test]
    fn test_duplicate_feed_ids_are_rejected() {
        let config = AppConfig::from_json(
            r#"{ "news_feeds": [
                { "id": "a", "role": "macro", "query": { "type": "trending" } },
                { "id": "a", "role": "macro", "query": { "type": "trending" } }
            ] }"#,
        )
        .unwrap();
        assert!(config.validate().is_err());
    }
}
