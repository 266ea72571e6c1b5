//! Quote Service
//!
//! Live quote for a supported symbol, cached and refreshed by the orchestrator.

use crate::error::Result;
use crate::orchestrator::FetchKey;
use crate::sources::types::AssetQuote;
use crate::state::AppState;
use std::sync::Arc;
use tracing::info;

/// Quote service for business logic
pub struct QuoteService;

impl QuoteService {
    /// Get the quote for `symbol`
    pub async fn get_quote(state: &AppState, symbol: &str) -> Result<Arc<AssetQuote>> {
        state.config.coin_id(symbol)?;
        let symbol = symbol.to_uppercase();
        info!("QuoteService::get_quote - {}", symbol);

        let source = Arc::clone(&state.sources.quotes);
        let key = FetchKey::quote(&symbol);

        state
            .orchestrator
            .request(key, &state.policies.quote, move || {
                let source = Arc::clone(&source);
                let symbol = symbol.clone();
                async move { source.get_quote(&symbol).await }
            })
            .await
    }
}
