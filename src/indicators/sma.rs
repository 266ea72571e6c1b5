use super::{warmup, Indicator, IndicatorKind};

/// Simple Moving Average.
///
/// Entry `i` is the arithmetic mean of the `period` prices ending at `i`.
#[derive(Debug, Clone)]
pub struct Sma {
    period: usize,
}

impl Sma {
    /// `period` must be at least 1; see [`super::build`]
    pub fn new(period: usize) -> Self {
        Self { period }
    }
}

impl Indicator for Sma {
    fn kind(&self) -> IndicatorKind {
        IndicatorKind::Sma
    }

    fn window_size(&self) -> usize {
        self.period
    }

    fn compute(&self, prices: &[f64]) -> Vec<Option<f64>> {
        let period = self.period.max(1);
        let means = prices
            .windows(period)
            .map(|window| Some(window.iter().sum::<f64>() / period as f64));

        warmup(period, prices.len()).chain(means).collect()
    }
}
