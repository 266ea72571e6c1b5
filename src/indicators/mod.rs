//! Technical indicators over price series
//!
//! Every indicator produces a series aligned index-for-index with its input. Entries
//! whose window has not filled yet are `None`, never a computed number, and a window
//! longer than the series yields only `None` entries rather than an error.
//!
//! # Supported Indicators
//! - **SMA** - Simple Moving Average
//! - **EMA** - Exponential Moving Average

mod ema;
mod sma;

pub use ema::Ema;
pub use sma::Sma;

use crate::error::{AppError, Result};
use crate::sources::types::PriceSeries;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Indicator family
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndicatorKind {
    #[default]
    Sma,
    Ema,
}

impl fmt::Display for IndicatorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IndicatorKind::Sma => write!(f, "sma"),
            IndicatorKind::Ema => write!(f, "ema"),
        }
    }
}

/// Trait for technical indicators.
///
/// Implementations are pure: identical prices always yield identical output.
pub trait Indicator: Send + Sync {
    fn kind(&self) -> IndicatorKind;

    fn window_size(&self) -> usize;

    /// One entry per price, oldest first; `None` until the window has filled
    fn compute(&self, prices: &[f64]) -> Vec<Option<f64>>;
}

/// Indicator values aligned with the price series they were computed from
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndicatorSeries {
    pub kind: IndicatorKind,
    pub window_size: usize,
    pub values: Vec<Option<f64>>,
}

impl IndicatorSeries {
    /// The most recent `n` entries (fewer when the series is shorter)
    pub fn trailing(&self, n: usize) -> &[Option<f64>] {
        let start = self.values.len().saturating_sub(n);
        &self.values[start..]
    }

    pub fn latest(&self) -> Option<f64> {
        self.values.last().copied().flatten()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Parameter string identifying an indicator computation, e.g. `sma(50)`
pub fn label(kind: IndicatorKind, window_size: usize) -> String {
    format!("{}({})", kind, window_size)
}

/// Build the indicator for `kind`; a zero window is rejected
pub fn build(kind: IndicatorKind, window_size: usize) -> Result<Box<dyn Indicator>> {
    if window_size == 0 {
        return Err(AppError::Validation(
            "Indicator window size must be at least 1".to_string(),
        ));
    }
    Ok(match kind {
        IndicatorKind::Sma => Box::new(Sma::new(window_size)),
        IndicatorKind::Ema => Box::new(Ema::new(window_size)),
    })
}

/// Compute `kind` over `series`
pub fn compute(kind: IndicatorKind, series: &PriceSeries, window_size: usize) -> Result<IndicatorSeries> {
    let indicator = build(kind, window_size)?;
    let values = indicator.compute(&series.prices());
    debug_assert_eq!(values.len(), series.len());

    Ok(IndicatorSeries {
        kind,
        window_size,
        values,
    })
}

/// Simple moving average over `series`
pub fn compute_sma(series: &PriceSeries, window_size: usize) -> Result<IndicatorSeries> {
    compute(IndicatorKind::Sma, series, window_size)
}

/// Leading `None` entries for a window that needs `window_size` values, capped at `len`
fn warmup(window_size: usize, len: usize) -> impl Iterator<Item = Option<f64>> {
    std::iter::repeat(None).take(window_size.saturating_sub(1).min(len))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::types::PricePoint;
    use chrono::{Duration, TimeZone, Utc};

    fn series(prices: &[f64]) -> PriceSeries {
        let start = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        let points = prices
            .iter()
            .enumerate()
            .map(|(i, price)| PricePoint {
                timestamp: start + Duration::minutes(i as i64),
                price: *price,
            })
            .collect();
        PriceSeries::new("BTC", points)
    }

    #[test]
    fn test_sma_reference_values() {
        let sma = compute_sma(&series(&[1.0, 2.0, 3.0, 4.0, 5.0]), 3).unwrap();
        assert_eq!(sma.values, vec![None, None, Some(2.0), Some(3.0), Some(4.0)]);
        assert_eq!(sma.latest(), Some(4.0));
    }

    #[test]
    fn test_window_longer_than_series_is_all_markers() {
        let sma = compute_sma(&series(&[1.0, 2.0]), 50).unwrap();
        assert_eq!(sma.values, vec![None, None]);

        let ema = compute(IndicatorKind::Ema, &series(&[1.0, 2.0]), 50).unwrap();
        assert_eq!(ema.values, vec![None, None]);
    }

    #[test]
    fn test_lengths_match_for_every_window() {
        let prices: Vec<f64> = (0..17).map(|i| (i * 7 % 11) as f64).collect();
        let input = series(&prices);

        for kind in [IndicatorKind::Sma, IndicatorKind::Ema] {
            for window in 1..=20 {
                let output = compute(kind, &input, window).unwrap();
                assert_eq!(output.len(), input.len(), "{} window {}", kind, window);
                let markers = output.values.iter().take_while(|v| v.is_none()).count();
                assert_eq!(markers, (window - 1).min(input.len()));
            }
        }
    }

    #[test]
    fn test_zero_window_is_rejected() {
        assert!(matches!(
            compute_sma(&series(&[1.0]), 0),
            Err(AppError::Validation(_))
        ));
    }

    #[test]
    fn test_empty_series() {
        let sma = compute_sma(&series(&[]), 3).unwrap();
        assert!(sma.is_empty());
        assert_eq!(sma.latest(), None);
    }

    #[test]
    fn test_trailing_slice() {
        let sma = compute_sma(&series(&[1.0, 2.0, 3.0, 4.0, 5.0]), 3).unwrap();
        assert_eq!(sma.trailing(2), &[Some(3.0), Some(4.0)]);
        assert_eq!(sma.trailing(10).len(), 5);
    }

    #[test]
    fn test_label_string() {
        assert_eq!(label(IndicatorKind::Sma, 50), "sma(50)");
        assert_eq!(label(IndicatorKind::Ema, 12), "ema(12)");
    }
}
