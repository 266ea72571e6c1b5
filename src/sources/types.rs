//! Common source types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Live quote snapshot; replaced wholesale on refresh
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetQuote {
    pub symbol: String,
    pub price: f64,
    pub change_24h: f64,
    pub volume_24h: f64,
    pub market_cap: f64,
    pub observed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    pub timestamp: DateTime<Utc>,
    pub price: f64,
}

/// Price history of one symbol, ascending by timestamp
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceSeries {
    pub symbol: String,
    points: Vec<PricePoint>,
}

impl PriceSeries {
    /// Build a series, ordering points by timestamp (stable for equal timestamps)
    pub fn new(symbol: impl Into<String>, mut points: Vec<PricePoint>) -> Self {
        points.sort_by_key(|p| p.timestamp);
        Self {
            symbol: symbol.into(),
            points,
        }
    }

    pub fn points(&self) -> &[PricePoint] {
        &self.points
    }

    pub fn prices(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.price).collect()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Thin the series down to at most `max_points` evenly strided points.
    ///
    /// Keeps every `len / max_points`-th point starting from the first, then
    /// truncates to `max_points`. Series already within bounds are returned unchanged.
    pub fn resample(self, max_points: usize) -> Self {
        if max_points == 0 || self.points.len() <= max_points {
            return self;
        }
        let step = self.points.len() / max_points;
        let points = self
            .points
            .into_iter()
            .step_by(step)
            .take(max_points)
            .collect();

        Self {
            symbol: self.symbol,
            points,
        }
    }
}

/// History window requested from the price-history source
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RangeSpec {
    /// Look-back in days; fractional values select intraday windows
    pub days: f64,
    /// Resampling bound applied after download
    pub max_points: usize,
}

impl fmt::Display for RangeSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}d/{}pts", self.days, self.max_points)
    }
}

/// Declared role of a news feed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NewsCategory {
    /// Asset-specific trend feed (trending coins, crypto keyword search)
    AssetTrend,
    /// Macro-economic and business headlines
    Macro,
}

impl NewsCategory {
    pub fn title(&self) -> &'static str {
        match self {
            NewsCategory::AssetTrend => "Asset Trends",
            NewsCategory::Macro => "Macro / Business",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewsItem {
    pub title: String,
    pub url: String,
    pub published_at: DateTime<Utc>,
    pub source: String,
    /// Possibly empty
    pub summary: String,
}
