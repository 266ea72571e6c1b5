//! Background refresh timers
//!
//! Each active fetch task with a refetch interval owns one timer. The timer calls its
//! tick closure every period until the closure reports the task inactive or the
//! timer is cancelled.

use crate::orchestrator::FetchKey;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::debug;

struct Timer {
    id: u64,
    handle: JoinHandle<()>,
}

/// Refresh timers keyed by fetch key
pub struct RefreshScheduler {
    timers: Arc<DashMap<FetchKey, Timer>>,
    next_id: AtomicU64,
}

impl RefreshScheduler {
    pub fn new() -> Self {
        Self {
            timers: Arc::new(DashMap::new()),
            next_id: AtomicU64::new(0),
        }
    }

    /// Start a timer for `key` unless a live one is already running.
    ///
    /// The first tick fires one full period after scheduling. A timer whose tick
    /// reports the task inactive removes itself, so the key can be scheduled again.
    pub fn schedule<F>(&self, key: FetchKey, every: Duration, tick: F)
    where
        F: Fn() -> bool + Send + Sync + 'static,
    {
        let entry = self.timers.entry(key.clone());
        if let Entry::Occupied(occupied) = &entry {
            if !occupied.get().handle.is_finished() {
                return;
            }
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let timers = Arc::clone(&self.timers);
        let timer_key = key.clone();
        debug!("Refresh timer for {} every {:?}", key, every);

        let handle = tokio::spawn(async move {
            let mut interval = interval_at(Instant::now() + every, every);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                if !tick() {
                    debug!("Refresh timer for {} stopped: task inactive", timer_key);
                    break;
                }
            }
            timers.remove_if(&timer_key, |_, timer| timer.id == id);
        });
        entry.insert(Timer { id, handle });
    }

    pub fn cancel(&self, key: &FetchKey) -> bool {
        match self.timers.remove(key) {
            Some((_, timer)) => {
                timer.handle.abort();
                true
            }
            None => false,
        }
    }

    /// Cancel every timer whose key matches `predicate`
    pub fn cancel_where<P>(&self, predicate: P)
    where
        P: Fn(&FetchKey) -> bool,
    {
        self.timers.retain(|key, timer| {
            if predicate(key) {
                timer.handle.abort();
                false
            } else {
                true
            }
        });
    }

    pub fn len(&self) -> usize {
        self.timers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timers.is_empty()
    }

    pub fn shutdown(&self) {
        self.cancel_where(|_| true);
    }
}

impl Default for RefreshScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for RefreshScheduler {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn test_timer_ticks_each_period() {
        let scheduler = RefreshScheduler::new();
        let ticks = Arc::new(AtomicU32::new(0));
        let counter = ticks.clone();

        scheduler.schedule(FetchKey::news("trending"), Duration::from_secs(5), move || {
            counter.fetch_add(1, Ordering::SeqCst);
            true
        });

        tokio::time::sleep(Duration::from_secs(16)).await;
        assert_eq!(ticks.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_schedule_is_idempotent_per_key() {
        let scheduler = RefreshScheduler::new();
        scheduler.schedule(FetchKey::quote("BTC"), Duration::from_secs(5), || true);
        scheduler.schedule(FetchKey::quote("BTC"), Duration::from_secs(5), || true);

        assert_eq!(scheduler.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_stops_ticks() {
        let scheduler = RefreshScheduler::new();
        let ticks = Arc::new(AtomicU32::new(0));
        let counter = ticks.clone();
        let key = FetchKey::quote("ETH");

        scheduler.schedule(key.clone(), Duration::from_secs(5), move || {
            counter.fetch_add(1, Ordering::SeqCst);
            true
        });
        tokio::time::sleep(Duration::from_secs(6)).await;
        assert!(scheduler.cancel(&key));
        tokio::time::sleep(Duration::from_secs(20)).await;

        assert_eq!(ticks.load(Ordering::SeqCst), 1);
        assert!(scheduler.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_inactive_timer_frees_its_key() {
        let scheduler = RefreshScheduler::new();
        let key = FetchKey::quote("ETH");
        let ticks = Arc::new(AtomicU32::new(0));

        scheduler.schedule(key.clone(), Duration::from_secs(5), || false);
        tokio::time::sleep(Duration::from_secs(6)).await;
        assert!(scheduler.is_empty());

        let counter = ticks.clone();
        scheduler.schedule(key, Duration::from_secs(5), move || {
            counter.fetch_add(1, Ordering::SeqCst);
            true
        });
        tokio::time::sleep(Duration::from_secs(11)).await;

        assert_eq!(scheduler.len(), 1);
        assert_eq!(ticks.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_where_only_hits_matching_keys() {
        let scheduler = RefreshScheduler::new();
        scheduler.schedule(FetchKey::quote("BTC"), Duration::from_secs(5), || true);
        scheduler.schedule(FetchKey::news("trending"), Duration::from_secs(5), || true);

        scheduler.cancel_where(|key| key.is_scoped_to("BTC"));

        assert_eq!(scheduler.len(), 1);
    }
}
