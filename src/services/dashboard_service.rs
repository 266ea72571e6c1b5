//! Dashboard Service
//!
//! Evaluates the dependency graph for the selected symbol:
//!
//! ```text
//! quote ──────────────────────────┐
//! price series ──> indicator ─────┼──> signal
//! news feeds ───> merged bundle ──┘
//! ```
//!
//! Each group is written to the dashboard as soon as it resolves, and only while the
//! selection it was started for is still current.

use super::{HistoryService, NewsService, QuoteService};
use crate::error::Result;
use crate::state::{AppState, Dashboard, GroupState};
use std::sync::Arc;
use tracing::{debug, info};

/// Dashboard service for business logic
pub struct DashboardService;

impl DashboardService {
    /// Resolve every group for the current selection and return the resulting snapshot
    pub async fn refresh(state: &AppState) -> Dashboard {
        let selection = state.selection();
        let symbol = selection.symbol.as_str();
        let epoch = selection.epoch;
        info!("DashboardService::refresh - {} (epoch {})", symbol, epoch);

        Self::apply(state, epoch, "loading", mark_loading);

        let quote = async {
            let result = QuoteService::get_quote(state, symbol).await;
            Self::apply(state, epoch, "quote", |d| {
                d.quote = GroupState::from_result(result.clone());
            });
            result
        };

        let indicator = async {
            let series = HistoryService::get_price_series(state, symbol).await;
            Self::apply(state, epoch, "price_series", |d| {
                d.price_series = GroupState::from_result(series.clone());
            });
            series?;

            let result = HistoryService::get_indicator(state, symbol).await;
            Self::apply(state, epoch, "indicator", |d| {
                d.indicator = GroupState::from_result(result.clone());
            });
            result
        };

        let news = async {
            let result = NewsService::get_news(state).await;
            let group = match &result {
                Ok(bundle) => match bundle.require_available() {
                    Ok(_) => GroupState::Ready(Arc::clone(bundle)),
                    Err(e) => GroupState::Failed(e),
                },
                Err(e) => GroupState::Failed(e.clone()),
            };
            Self::apply(state, epoch, "news", |d| d.news = group);
            result
        };

        let outcome = state.synthesizer.synthesize(symbol, quote, news, indicator).await;
        Self::apply(state, epoch, "signal", |d| {
            d.signal = GroupState::from_result(outcome.result.map(Arc::new));
        });

        state.dashboard()
    }

    /// Switch the selection, then refresh for the new symbol
    pub async fn select_symbol(state: &AppState, symbol: &str) -> Result<Dashboard> {
        state.select_symbol(symbol)?;
        Ok(Self::refresh(state).await)
    }

    // ========================================================================
    // Private Helper Methods
    // ========================================================================

    fn apply(state: &AppState, epoch: u64, group: &str, update: impl FnOnce(&mut Dashboard)) {
        if !state.apply_if_current(epoch, update) {
            debug!("Discarding {} result of superseded selection (epoch {})", group, epoch);
        }
    }
}

/// Groups never resolved before show as loading; resolved ones keep their last state
fn mark_loading(d: &mut Dashboard) {
    if matches!(d.quote, GroupState::Idle) {
        d.quote = GroupState::Loading;
    }
    if matches!(d.price_series, GroupState::Idle) {
        d.price_series = GroupState::Loading;
    }
    if matches!(d.indicator, GroupState::Idle) {
        d.indicator = GroupState::Loading;
    }
    if matches!(d.news, GroupState::Idle) {
        d.news = GroupState::Loading;
    }
    if matches!(d.signal, GroupState::Idle) {
        d.signal = GroupState::Loading;
    }
}
