//! Analysis request assembly and prompt rendering

use crate::indicators::{IndicatorKind, IndicatorSeries};
use crate::news::NewsBundle;
use crate::sources::types::{AssetQuote, NewsCategory};
use std::fmt::Write;

/// Everything the analysis engine is shown. Built per synthesis, never cached.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisRequest {
    pub quote: AssetQuote,
    pub indicator: Option<IndicatorSlice>,
    /// News excerpts per category, newest first
    pub news: Vec<(NewsCategory, Vec<NewsExcerpt>)>,
}

/// Trailing window of an indicator series, oldest first
#[derive(Debug, Clone, PartialEq)]
pub struct IndicatorSlice {
    pub kind: IndicatorKind,
    pub window_size: usize,
    pub values: Vec<Option<f64>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewsExcerpt {
    pub title: String,
    pub summary: String,
}

impl AnalysisRequest {
    pub fn new(
        quote: &AssetQuote,
        indicator: Option<&IndicatorSeries>,
        news: &NewsBundle,
        trailing: usize,
    ) -> Self {
        let indicator = indicator.map(|series| IndicatorSlice {
            kind: series.kind,
            window_size: series.window_size,
            values: series.trailing(trailing).to_vec(),
        });

        let news = news
            .categories()
            .map(|category| {
                let excerpts = news
                    .category(category)
                    .map(|entry| NewsExcerpt {
                        title: entry.item.title.clone(),
                        summary: entry.item.summary.clone(),
                    })
                    .collect();
                (category, excerpts)
            })
            .collect();

        Self {
            quote: quote.clone(),
            indicator,
            news,
        }
    }

    /// Render the prompt sent to the engine as a single user message
    pub fn render(&self) -> String {
        let q = &self.quote;
        let mut prompt = String::new();

        // Writing into a String cannot fail
        let _ = writeln!(
            prompt,
            "Analyze the following crypto market data and trends for the selected cryptocurrency ({}):",
            q.symbol
        );
        let _ = writeln!(prompt);
        let _ = writeln!(prompt, "Market Data:");
        let _ = writeln!(prompt, "- Current Price: ${}", q.price);
        let _ = writeln!(prompt, "- 24h Change: {}%", q.change_24h);
        let _ = writeln!(prompt, "- 24h Volume: ${}", q.volume_24h);
        let _ = writeln!(prompt, "- Market Cap: ${}", q.market_cap);

        if let Some(indicator) = &self.indicator {
            let values: Vec<String> = indicator
                .values
                .iter()
                .map(|v| v.map(|v| format!("{:.2}", v)).unwrap_or_else(|| "n/a".to_string()))
                .collect();
            let _ = writeln!(prompt);
            let _ = writeln!(
                prompt,
                "Technical Indicator ({} {}, most recent last):",
                indicator.kind.to_string().to_uppercase(),
                indicator.window_size
            );
            let _ = writeln!(prompt, "- {}", values.join(", "));
        }

        let _ = writeln!(prompt);
        let _ = writeln!(prompt, "Market Trends:");
        for (category, excerpts) in &self.news {
            let _ = writeln!(prompt, "{}:", category.title());
            for excerpt in excerpts {
                let _ = writeln!(prompt, "- {}", excerpt.title);
                if !excerpt.summary.is_empty() {
                    let _ = writeln!(prompt, "  {}", excerpt.summary);
                }
            }
        }

        let _ = writeln!(prompt);
        let _ = writeln!(prompt, "Based on this information, provide:");
        let _ = writeln!(
            prompt,
            "1. A short-term trading signal (buy/sell/hold) for {}",
            q.symbol
        );
        let _ = writeln!(prompt, "2. A long-term trading signal (buy/sell/hold)");
        let _ = writeln!(prompt, "3. A confidence level (0-100)");
        let _ = write!(prompt, "4. A brief explanation of your decision");
        prompt
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::news::{NewsAggregator, SourceResult};
    use crate::sources::types::NewsItem;
    use chrono::{TimeZone, Utc};

    fn quote() -> AssetQuote {
        AssetQuote {
            symbol: "ETH".to_string(),
            price: 3400.5,
            change_24h: -2.5,
            volume_24h: 1500000.0,
            market_cap: 410000000000.0,
            observed_at: Utc::now(),
        }
    }

    fn news_item(title: &str, summary: &str, hour: u32) -> NewsItem {
        NewsItem {
            title: title.to_string(),
            url: "https://example.com".to_string(),
            published_at: Utc.with_ymd_and_hms(2024, 3, 1, hour, 0, 0).unwrap(),
            source: "Test".to_string(),
            summary: summary.to_string(),
        }
    }

    fn bundle() -> NewsBundle {
        NewsAggregator::merge(vec![
            SourceResult::new(
                "trend",
                NewsCategory::AssetTrend,
                Ok(vec![news_item("Solana (SOL) is trending", "Rank 5", 3)]),
            ),
            SourceResult::new(
                "macro",
                NewsCategory::Macro,
                Ok(vec![news_item("Fed holds rates", "", 4)]),
            ),
        ])
    }

    #[test]
    fn test_render_includes_market_data_and_sections() {
        let request = AnalysisRequest::new(&quote(), None, &bundle(), 5);
        let prompt = request.render();

        assert!(prompt.contains("selected cryptocurrency (ETH)"));
        assert!(prompt.contains("- Current Price: $3400.5"));
        assert!(prompt.contains("- 24h Change: -2.5%"));
        assert!(prompt.contains("- Market Cap: $410000000000"));
        assert!(prompt.contains("Asset Trends:\n- Solana (SOL) is trending\n  Rank 5"));
        assert!(prompt.contains("Macro / Business:\n- Fed holds rates\n"));
        assert!(prompt.contains("1. A short-term trading signal (buy/sell/hold) for ETH"));
        assert!(!prompt.contains("Technical Indicator"));
    }

    #[test]
    fn test_render_indicator_slice_with_markers() {
        let series = IndicatorSeries {
            kind: IndicatorKind::Sma,
            window_size: 3,
            values: vec![None, None, Some(2.0), Some(3.0), Some(4.0), Some(5.126)],
        };
        let request = AnalysisRequest::new(&quote(), Some(&series), &bundle(), 5);

        let slice = request.indicator.as_ref().unwrap();
        assert_eq!(slice.values.len(), 5);
        assert!(request
            .render()
            .contains("Technical Indicator (SMA 3, most recent last):\n- n/a, 2.00, 3.00, 4.00, 5.13"));
    }
}
