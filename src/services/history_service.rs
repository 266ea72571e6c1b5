//! History Service
//!
//! Price series for the configured look-back and the indicator computed over it.

use crate::error::Result;
use crate::indicators::{self, IndicatorSeries};
use crate::orchestrator::FetchKey;
use crate::sources::types::PriceSeries;
use crate::state::AppState;
use std::sync::Arc;
use tracing::info;

/// History service for business logic
pub struct HistoryService;

impl HistoryService {
    /// Get the resampled price series for `symbol`
    pub async fn get_price_series(state: &AppState, symbol: &str) -> Result<Arc<PriceSeries>> {
        state.config.coin_id(symbol)?;
        let symbol = symbol.to_uppercase();
        let range = state.config.range_spec();
        info!("HistoryService::get_price_series - {} {}", symbol, range);

        let source = Arc::clone(&state.sources.history);
        let key = FetchKey::price_history(&symbol, &range.to_string());

        state
            .orchestrator
            .request(key, &state.policies.price_history, move || {
                let source = Arc::clone(&source);
                let symbol = symbol.clone();
                async move { source.get_price_series(&symbol, &range).await }
            })
            .await
    }

    /// Get the configured indicator over the price series of `symbol`
    pub async fn get_indicator(state: &AppState, symbol: &str) -> Result<Arc<IndicatorSeries>> {
        let series = Self::get_price_series(state, symbol).await?;

        let kind = state.config.indicator.kind;
        let window = state.config.indicator.window;
        let params = format!(
            "{}@{}",
            indicators::label(kind, window),
            state.config.range_spec()
        );
        info!("HistoryService::get_indicator - {} {}", symbol, params);

        state
            .orchestrator
            .request(
                FetchKey::indicator(symbol, &params),
                &state.policies.indicator,
                move || {
                    let series = Arc::clone(&series);
                    async move { indicators::compute(kind, &series, window) }
                },
            )
            .await
    }
}
