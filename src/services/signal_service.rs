//! Signal Service
//!
//! Consumer entry point for the synthesized market signal.

use super::{HistoryService, NewsService, QuoteService};
use crate::error::Result;
use crate::signal::{MarketSignal, SynthesisOutcome};
use crate::state::AppState;
use tracing::info;

/// Signal service for business logic
pub struct SignalService;

impl SignalService {
    /// Get the market signal for `symbol`.
    ///
    /// Resolves to a signal (possibly the placeholder), a dependency failure when
    /// quote or news could not be resolved, or a configuration error.
    pub async fn get_market_signal(state: &AppState, symbol: &str) -> Result<MarketSignal> {
        Self::synthesize(state, symbol).await.result
    }

    /// Run one synthesis and return its full outcome
    pub async fn synthesize(state: &AppState, symbol: &str) -> SynthesisOutcome {
        info!("SignalService::synthesize - {}", symbol);
        state
            .synthesizer
            .synthesize(
                symbol,
                QuoteService::get_quote(state, symbol),
                NewsService::get_news(state),
                HistoryService::get_indicator(state, symbol),
            )
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;
    use crate::signal::SynthesisState;
    use crate::sources::types::NewsCategory;
    use crate::testing::{test_config, Fakes, ScriptedEngine, ScriptedNews, ScriptedQuotes};

    #[tokio::test]
    async fn test_market_signal_for_symbol() {
        let fakes = Fakes::healthy();
        let state = AppState::with_sources(test_config(), fakes.registry());

        let signal = SignalService::get_market_signal(&state, "eth").await.unwrap();

        assert_eq!(signal.symbol, "ETH");
        assert_eq!(signal.reasoning, "Hold.");
        let prompt = fakes.engine.last_prompt().unwrap();
        assert!(prompt.contains("- Current Price: $3400"));
        assert!(prompt.contains("Technical Indicator (SMA 3, most recent last):\n- n/a, n/a, 2.00, 3.00, 4.00"));
        state.shutdown();
    }

    #[tokio::test(start_paused = true)]
    async fn test_permanent_news_failure_skips_engine() {
        let fakes = Fakes::new(
            ScriptedQuotes::new().with("BTC", 64_000.0),
            vec![
                ScriptedNews::failing("a", NewsCategory::AssetTrend, AppError::Transient("down".to_string())),
                ScriptedNews::failing("b", NewsCategory::Macro, AppError::Config("NEWSAPI_API_KEY missing".to_string())),
            ],
            ScriptedEngine::text("unused"),
        );
        let state = AppState::with_sources(test_config(), fakes.registry());

        let outcome = SignalService::synthesize(&state, "BTC").await;

        assert!(matches!(outcome.result, Err(AppError::DependencyFailed { .. })));
        assert!(!outcome.reached(SynthesisState::Synthesizing));
        assert_eq!(fakes.engine.calls(), 0);
        // Configuration failures are never retried
        assert_eq!(fakes.news[1].calls(), 1);
        state.shutdown();
    }

    #[tokio::test(start_paused = true)]
    async fn test_unselected_symbol_is_not_kept_refreshing() {
        let fakes = Fakes::healthy();
        let state = AppState::with_sources(test_config(), fakes.registry());
        let eth_quote = crate::orchestrator::FetchKey::quote("ETH");

        SignalService::get_market_signal(&state, "ETH").await.unwrap();
        assert_eq!(state.selected_symbol(), "BTC");
        assert!(state.orchestrator.status(&eth_quote).is_none());

        tokio::time::sleep(std::time::Duration::from_secs(61 * 60)).await;

        assert_eq!(fakes.quotes.calls(), 1);
        assert!(state.orchestrator.status(&eth_quote).is_none());
        state.shutdown();
    }
}
