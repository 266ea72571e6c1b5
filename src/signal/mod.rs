//! Signal synthesis
//!
//! Per request: `Idle -> AwaitingInputs -> Synthesizing -> Ready | Failed`.
//! Quote and news are gating inputs; the indicator series is included when it
//! resolves but never blocks synthesis. Engine failures degrade to a placeholder
//! signal; only a configuration error fails the request.

mod prompt;

pub use prompt::{AnalysisRequest, IndicatorSlice, NewsExcerpt};

use crate::error::{AppError, Result};
use crate::indicators::IndicatorSeries;
use crate::news::NewsBundle;
use crate::orchestrator::{run_with_retry, FetchPolicy};
use crate::sources::types::AssetQuote;
use crate::sources::{AnalysisEngine, AnalysisMode, EngineOutput};
use chrono::{DateTime, Utc};
use futures_util::StreamExt;
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

/// Reasoning used when the engine produced nothing usable
pub const ANALYSIS_UNAVAILABLE: &str = "Analysis not available";

/// Confidence reported until the engine returns structured fields
pub const NEUTRAL_CONFIDENCE: u8 = 70;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Signal {
    Buy,
    Sell,
    #[default]
    Hold,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MarketSignal {
    pub symbol: String,
    pub short_term_signal: Signal,
    pub long_term_signal: Signal,
    /// 0-100
    pub confidence: u8,
    pub reasoning: String,
    pub generated_at: DateTime<Utc>,
}

impl MarketSignal {
    /// Signal carrying the engine's text; categorical fields stay at their neutral values
    pub fn from_reasoning(symbol: &str, reasoning: String) -> Self {
        Self {
            symbol: symbol.to_uppercase(),
            short_term_signal: Signal::Hold,
            long_term_signal: Signal::Hold,
            confidence: NEUTRAL_CONFIDENCE,
            reasoning,
            generated_at: Utc::now(),
        }
    }

    pub fn unavailable(symbol: &str) -> Self {
        Self::from_reasoning(symbol, ANALYSIS_UNAVAILABLE.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SynthesisState {
    Idle,
    AwaitingInputs,
    Synthesizing,
    Ready,
    Failed,
}

/// Result of one synthesis request plus the states it went through
#[derive(Debug)]
pub struct SynthesisOutcome {
    pub run_id: Uuid,
    pub transitions: Vec<SynthesisState>,
    pub result: Result<MarketSignal>,
    /// Engine failure absorbed into a placeholder signal
    pub degraded: Option<AppError>,
}

impl SynthesisOutcome {
    pub fn state(&self) -> SynthesisState {
        self.transitions.last().copied().unwrap_or(SynthesisState::Idle)
    }

    pub fn reached(&self, state: SynthesisState) -> bool {
        self.transitions.contains(&state)
    }
}

pub struct SignalSynthesizer {
    engine: Arc<dyn AnalysisEngine>,
    policy: FetchPolicy,
    mode: AnalysisMode,
    trailing: usize,
}

impl SignalSynthesizer {
    pub fn new(
        engine: Arc<dyn AnalysisEngine>,
        policy: FetchPolicy,
        mode: AnalysisMode,
        trailing: usize,
    ) -> Self {
        Self {
            engine,
            policy,
            mode,
            trailing,
        }
    }

    /// Await the inputs, then ask the engine for an assessment of `symbol`
    pub async fn synthesize<Q, N, I>(
        &self,
        symbol: &str,
        quote: Q,
        news: N,
        indicator: I,
    ) -> SynthesisOutcome
    where
        Q: Future<Output = Result<Arc<AssetQuote>>>,
        N: Future<Output = Result<Arc<NewsBundle>>>,
        I: Future<Output = Result<Arc<IndicatorSeries>>>,
    {
        let mut run = Run::new(symbol);
        run.enter(SynthesisState::AwaitingInputs);

        let (quote, news, indicator) = tokio::join!(quote, news, indicator);

        let quote = match quote {
            Ok(quote) => quote,
            Err(e) => return run.fail(dependency("quote", e)),
        };
        let news = match news {
            Ok(bundle) => match bundle.require_available() {
                Ok(_) => bundle,
                Err(e) => return run.fail(e),
            },
            Err(e) => return run.fail(dependency("news", e)),
        };
        let indicator = match indicator {
            Ok(series) => Some(series),
            Err(e) => {
                warn!("Synthesis {}: indicator unavailable: {}", run.id, e);
                None
            }
        };

        run.enter(SynthesisState::Synthesizing);
        let request = AnalysisRequest::new(&quote, indicator.as_deref(), &news, self.trailing);
        let prompt = request.render();

        let label = format!("analysis {} ({})", symbol.to_uppercase(), self.engine.id());
        let text = run_with_retry(&label, &self.policy, |_, _| {}, || {
            collect(self.engine.as_ref(), &prompt, self.mode)
        })
        .await
        .and_then(|text| {
            if text.trim().is_empty() {
                Err(AppError::Analysis("engine returned empty content".to_string()))
            } else {
                Ok(text)
            }
        });

        match text {
            Ok(text) => run.ready(MarketSignal::from_reasoning(symbol, text), None),
            Err(e) if e.is_fatal() => run.fail(e),
            Err(e) => {
                let e = match e {
                    AppError::Analysis(_) => e,
                    other => AppError::Analysis(other.to_string()),
                };
                warn!("Synthesis {}: degrading to placeholder: {}", run.id, e);
                run.ready(MarketSignal::unavailable(symbol), Some(e))
            }
        }
    }
}

// ============================================================================
// Private Helper Methods
// ============================================================================

struct Run {
    id: Uuid,
    symbol: String,
    transitions: Vec<SynthesisState>,
}

impl Run {
    fn new(symbol: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            symbol: symbol.to_uppercase(),
            transitions: vec![SynthesisState::Idle],
        }
    }

    fn enter(&mut self, state: SynthesisState) {
        info!("Synthesis {} [{}]: -> {:?}", self.id, self.symbol, state);
        self.transitions.push(state);
    }

    fn ready(mut self, signal: MarketSignal, degraded: Option<AppError>) -> SynthesisOutcome {
        self.enter(SynthesisState::Ready);
        SynthesisOutcome {
            run_id: self.id,
            transitions: self.transitions,
            result: Ok(signal),
            degraded,
        }
    }

    fn fail(mut self, error: AppError) -> SynthesisOutcome {
        warn!("Synthesis {} [{}] failed: {}", self.id, self.symbol, error);
        self.enter(SynthesisState::Failed);
        SynthesisOutcome {
            run_id: self.id,
            transitions: self.transitions,
            result: Err(error),
            degraded: None,
        }
    }
}

fn dependency(group: &str, error: AppError) -> AppError {
    AppError::DependencyFailed {
        group: group.to_string(),
        reason: error.to_string(),
    }
}

/// One engine attempt; streamed chunks are concatenated in arrival order
async fn collect(engine: &dyn AnalysisEngine, prompt: &str, mode: AnalysisMode) -> Result<String> {
    match engine.submit(prompt, mode).await? {
        EngineOutput::Text(text) => Ok(text),
        EngineOutput::Chunks(mut chunks) => {
            let mut text = String::new();
            while let Some(chunk) = chunks.next().await {
                text.push_str(&chunk?);
            }
            Ok(text)
        }
    }
}
