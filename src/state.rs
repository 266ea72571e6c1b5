//! Application state management

use crate::config::AppConfig;
use crate::credentials::CredentialStore;
use crate::error::{AppError, Result};
use crate::indicators::IndicatorSeries;
use crate::news::NewsBundle;
use crate::orchestrator::{FetchOrchestrator, PolicySet};
use crate::signal::{MarketSignal, SignalSynthesizer};
use crate::sources::types::{AssetQuote, PriceSeries};
use crate::sources::SourceRegistry;
use parking_lot::RwLock;
use serde::Serialize;
use std::sync::Arc;

/// Loading/error/ready state of one independently resolving data group
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", content = "data", rename_all = "snake_case")]
pub enum GroupState<T> {
    Idle,
    Loading,
    Ready(Arc<T>),
    Failed(AppError),
}

impl<T> GroupState<T> {
    pub fn from_result(result: Result<Arc<T>>) -> Self {
        match result {
            Ok(value) => GroupState::Ready(value),
            Err(e) => GroupState::Failed(e),
        }
    }

    pub fn value(&self) -> Option<&Arc<T>> {
        match self {
            GroupState::Ready(value) => Some(value),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&AppError> {
        match self {
            GroupState::Failed(e) => Some(e),
            _ => None,
        }
    }

    pub fn is_loading(&self) -> bool {
        matches!(self, GroupState::Loading)
    }
}

impl<T> Default for GroupState<T> {
    fn default() -> Self {
        GroupState::Idle
    }
}

/// Currently selected symbol; the epoch increases on every switch
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Selection {
    pub symbol: String,
    pub epoch: u64,
}

/// Snapshot of everything shown for the selected symbol
#[derive(Debug, Clone, Default, Serialize)]
pub struct Dashboard {
    pub symbol: String,
    pub quote: GroupState<AssetQuote>,
    pub price_series: GroupState<PriceSeries>,
    pub indicator: GroupState<IndicatorSeries>,
    pub news: GroupState<NewsBundle>,
    pub signal: GroupState<MarketSignal>,
}

impl Dashboard {
    fn for_symbol(symbol: &str) -> Self {
        Self {
            symbol: symbol.to_string(),
            ..Self::default()
        }
    }

    /// Put every group belonging to the old symbol back to loading
    fn reset_symbol_groups(&mut self, symbol: &str) {
        self.symbol = symbol.to_string();
        self.quote = GroupState::Loading;
        self.price_series = GroupState::Loading;
        self.indicator = GroupState::Loading;
        self.signal = GroupState::Loading;
    }
}

/// Application state shared by every service
pub struct AppState {
    pub config: AppConfig,

    /// Injected upstream adapters
    pub sources: SourceRegistry,

    /// Task/cache map and background refresh timers
    pub orchestrator: FetchOrchestrator,

    pub policies: PolicySet,

    pub synthesizer: SignalSynthesizer,

    selection: RwLock<Selection>,

    dashboard: RwLock<Dashboard>,
}

impl AppState {
    /// Create state backed by the production adapters
    pub fn new(config: AppConfig, credentials: Arc<CredentialStore>) -> Result<Self> {
        let sources = SourceRegistry::from_config(&config, credentials)?;
        Ok(Self::with_sources(config, sources))
    }

    /// Create state over an explicit set of adapters
    pub fn with_sources(config: AppConfig, sources: SourceRegistry) -> Self {
        let policies = config.policy_set();
        let synthesizer = SignalSynthesizer::new(
            sources.engine.clone(),
            policies.analysis.clone(),
            config.analysis.mode,
            config.indicator.trailing,
        );
        let symbol = config.default_symbol.to_uppercase();

        tracing::info!("Initial selection: {}", symbol);
        let orchestrator = FetchOrchestrator::new();
        orchestrator.set_active_symbol(&symbol);

        Self {
            sources,
            orchestrator,
            policies,
            synthesizer,
            dashboard: RwLock::new(Dashboard::for_symbol(&symbol)),
            selection: RwLock::new(Selection { symbol, epoch: 0 }),
            config,
        }
    }

    pub fn selection(&self) -> Selection {
        self.selection.read().clone()
    }

    pub fn selected_symbol(&self) -> String {
        self.selection.read().symbol.clone()
    }

    pub fn is_current(&self, epoch: u64) -> bool {
        self.selection.read().epoch == epoch
    }

    /// Switch the selected symbol.
    ///
    /// Abandons the old symbol's quote/history/indicator tasks and resets the
    /// symbol-scoped dashboard groups. Selecting the current symbol is a no-op.
    pub fn select_symbol(&self, symbol: &str) -> Result<Selection> {
        self.config.coin_id(symbol)?;
        let symbol = symbol.to_uppercase();

        let (previous, selection) = {
            let mut selection = self.selection.write();
            if selection.symbol == symbol {
                return Ok(selection.clone());
            }
            let previous = std::mem::replace(&mut selection.symbol, symbol.clone());
            selection.epoch += 1;
            self.orchestrator.set_active_symbol(&symbol);

            self.dashboard.write().reset_symbol_groups(&symbol);
            (previous, selection.clone())
        };

        tracing::info!(
            "Selected {} (was {}), epoch {}",
            selection.symbol,
            previous,
            selection.epoch
        );
        self.orchestrator.abandon_symbol(&previous);
        Ok(selection)
    }

    pub fn dashboard(&self) -> Dashboard {
        self.dashboard.read().clone()
    }

    /// Apply `update` only while `epoch` is still the current selection.
    ///
    /// Returns false, leaving the dashboard untouched, when the selection moved on.
    pub fn apply_if_current(&self, epoch: u64, update: impl FnOnce(&mut Dashboard)) -> bool {
        let selection = self.selection.read();
        if selection.epoch != epoch {
            return false;
        }
        update(&mut *self.dashboard.write());
        true
    }

    /// Drop all tasks and cancel background refresh timers
    pub fn shutdown(&self) {
        self.orchestrator.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{test_config, Fakes};

    fn state() -> AppState {
        AppState::with_sources(test_config(), Fakes::healthy().registry())
    }

    #[test]
    fn test_initial_selection() {
        let state = state();
        assert_eq!(state.selection(), Selection { symbol: "BTC".to_string(), epoch: 0 });
        assert!(matches!(state.dashboard().quote, GroupState::Idle));
    }

    #[test]
    fn test_select_symbol_bumps_epoch_and_resets_groups() {
        let state = state();
        state.apply_if_current(0, |d| {
            d.news = GroupState::Failed(AppError::Transient("down".to_string()));
        });

        let selection = state.select_symbol("eth").unwrap();

        assert_eq!(selection.symbol, "ETH");
        assert_eq!(selection.epoch, 1);
        let dashboard = state.dashboard();
        assert_eq!(dashboard.symbol, "ETH");
        assert!(dashboard.quote.is_loading());
        assert!(dashboard.signal.is_loading());
        // News is global and keeps its state
        assert!(dashboard.news.error().is_some());
    }

    #[test]
    fn test_reselecting_same_symbol_is_noop() {
        let state = state();
        assert_eq!(state.select_symbol("BTC").unwrap().epoch, 0);
    }

    #[test]
    fn test_unsupported_symbol_is_rejected() {
        let state = state();
        assert!(matches!(state.select_symbol("DOGE"), Err(AppError::Validation(_))));
        assert_eq!(state.selected_symbol(), "BTC");
    }

    #[test]
    fn test_stale_epoch_is_not_applied() {
        let state = state();
        state.select_symbol("ETH").unwrap();

        let applied = state.apply_if_current(0, |d| {
            d.quote = GroupState::Ready(Arc::new(crate::testing::quote("BTC")));
        });

        assert!(!applied);
        assert!(state.dashboard().quote.is_loading());
    }

    #[test]
    fn test_group_state_serializes_with_status_tag() {
        let ready: GroupState<AssetQuote> = GroupState::Ready(Arc::new(crate::testing::quote("BTC")));
        let json = serde_json::to_value(&ready).unwrap();
        assert_eq!(json["status"], "ready");
        assert_eq!(json["data"]["symbol"], "BTC");

        let failed: GroupState<AssetQuote> =
            GroupState::Failed(AppError::Config("OPENAI_API_KEY missing".to_string()));
        let json = serde_json::to_value(&failed).unwrap();
        assert_eq!(json["status"], "failed");
        assert_eq!(json["data"]["code"], "CONFIG_ERROR");

        let idle: GroupState<AssetQuote> = GroupState::Idle;
        assert_eq!(serde_json::to_value(&idle).unwrap()["status"], "idle");
    }
}
