use super::{warmup, Indicator, IndicatorKind};

/// Exponential Moving Average.
///
/// Seeded with the SMA of the first `period` prices, then smoothed with
/// multiplier = 2 / (period + 1).
#[derive(Debug, Clone)]
pub struct Ema {
    period: usize,
    multiplier: f64,
}

impl Ema {
    /// `period` must be at least 1; see [`super::build`]
    pub fn new(period: usize) -> Self {
        let period = period.max(1);
        Self {
            period,
            multiplier: 2.0 / (period as f64 + 1.0),
        }
    }
}

impl Indicator for Ema {
    fn kind(&self) -> IndicatorKind {
        IndicatorKind::Ema
    }

    fn window_size(&self) -> usize {
        self.period
    }

    fn compute(&self, prices: &[f64]) -> Vec<Option<f64>> {
        let mut values: Vec<Option<f64>> = warmup(self.period, prices.len()).collect();
        if prices.len() < self.period {
            return values;
        }

        let seed = prices[..self.period].iter().sum::<f64>() / self.period as f64;
        values.push(Some(seed));

        let mut prev = seed;
        for price in &prices[self.period..] {
            prev = (price - prev) * self.multiplier + prev;
            values.push(Some(prev));
        }
        values
    }
}
