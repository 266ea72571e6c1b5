//! Per-source fetch policies

use super::key::SourceKind;
use rand::Rng;
use std::time::Duration;

/// Exponential backoff between retry attempts
#[derive(Debug, Clone, PartialEq)]
pub struct Backoff {
    pub initial: Duration,
    pub max: Duration,
    pub multiplier: f64,
    /// Relative jitter in `[0, 1)`; 0.1 spreads each delay by ±10%
    pub jitter: f64,
}

impl Backoff {
    /// Fixed delay, no growth and no jitter
    pub fn fixed(delay: Duration) -> Self {
        Self {
            initial: delay,
            max: delay,
            multiplier: 1.0,
            jitter: 0.0,
        }
    }

    pub fn none() -> Self {
        Self::fixed(Duration::ZERO)
    }

    /// Delay to wait after the given failed attempt (1-based)
    pub fn delay(&self, failed_attempt: u32) -> Duration {
        let exponent = failed_attempt.saturating_sub(1) as i32;
        let base = self.initial.as_secs_f64() * self.multiplier.powi(exponent);
        let capped = base.min(self.max.as_secs_f64());

        let spread = if self.jitter > 0.0 {
            rand::thread_rng().gen_range((1.0 - self.jitter)..=(1.0 + self.jitter))
        } else {
            1.0
        };

        Duration::from_secs_f64((capped * spread).max(0.0))
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Self {
            initial: Duration::from_secs(1),
            max: Duration::from_secs(30),
            multiplier: 2.0,
            jitter: 0.1,
        }
    }
}

/// Caching, retry and refresh policy for one source kind
#[derive(Debug, Clone, PartialEq)]
pub struct FetchPolicy {
    /// Maximum age of a cached value before it must be revalidated
    pub ttl: Duration,
    /// Total attempts per resolution, including the first
    pub max_attempts: u32,
    pub backoff: Backoff,
    /// Background refresh period while the task stays active
    pub refetch_interval: Option<Duration>,
    /// Upper bound for a single attempt; expiry counts as a transient failure
    pub attempt_timeout: Duration,
}

impl FetchPolicy {
    /// Policy for work that is never cached (analysis requests)
    pub fn uncached(max_attempts: u32, attempt_timeout: Duration) -> Self {
        Self {
            ttl: Duration::ZERO,
            max_attempts,
            backoff: Backoff::default(),
            refetch_interval: None,
            attempt_timeout,
        }
    }
}

impl Default for FetchPolicy {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(60),
            max_attempts: 4,
            backoff: Backoff::default(),
            refetch_interval: None,
            attempt_timeout: Duration::from_secs(30),
        }
    }
}

/// One policy per source kind, passed explicitly to the orchestrator
#[derive(Debug, Clone, PartialEq)]
pub struct PolicySet {
    pub quote: FetchPolicy,
    pub price_history: FetchPolicy,
    pub indicator: FetchPolicy,
    pub news: FetchPolicy,
    pub analysis: FetchPolicy,
}

impl PolicySet {
    pub fn for_kind(&self, kind: SourceKind) -> &FetchPolicy {
        match kind {
            SourceKind::Quote => &self.quote,
            SourceKind::PriceHistory => &self.price_history,
            SourceKind::Indicator => &self.indicator,
            SourceKind::News => &self.news,
            SourceKind::Analysis => &self.analysis,
        }
    }
}

impl Default for PolicySet {
    fn default() -> Self {
        let fifteen_min = Duration::from_secs(15 * 60);
        Self {
            quote: FetchPolicy {
                ttl: fifteen_min,
                refetch_interval: Some(fifteen_min),
                ..FetchPolicy::default()
            },
            price_history: FetchPolicy {
                ttl: Duration::from_secs(5 * 60),
                ..FetchPolicy::default()
            },
            indicator: FetchPolicy {
                ttl: Duration::from_secs(5 * 60),
                max_attempts: 1,
                backoff: Backoff::none(),
                ..FetchPolicy::default()
            },
            news: FetchPolicy {
                ttl: fifteen_min,
                refetch_interval: Some(fifteen_min),
                ..FetchPolicy::default()
            },
            analysis: FetchPolicy::uncached(2, Duration::from_secs(120)),
        }
    }
}
