//! Fetch orchestration
//!
//! Schedules, coalesces, retries, caches and refreshes fetches keyed by
//! (source kind, parameters). One task exists per key; a request arriving while the
//! task's attempt is in flight attaches to that attempt instead of starting another.
//!
//! ```text
//! request(key) ──> fresh cache? ──yes──> value
//!                      │ no
//!                      v
//!              in-flight attempt? ──yes──> await shared attempt
//!                      │ no
//!                      v
//!              spawn attempt (retry + timeout) ──> cache ──> all waiters
//! ```

mod key;
mod policy;
mod retry;
mod task;

pub use key::{FetchKey, SourceKind};
pub use policy::{Backoff, FetchPolicy, PolicySet};
pub use retry::run_with_retry;
pub use task::{FetchStatus, TaskPhase};

use crate::error::{AppError, Result};
use crate::scheduler::RefreshScheduler;
use dashmap::DashMap;
use futures_util::FutureExt;
use parking_lot::RwLock;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use task::{AnyValue, ErasedProducer, FetchTask};
use tracing::{debug, info};

type TaskMap = DashMap<FetchKey, Arc<FetchTask>>;

/// Process-wide task/cache map plus background refresh timers
pub struct FetchOrchestrator {
    tasks: Arc<TaskMap>,
    scheduler: RefreshScheduler,
    /// Symbol whose scoped tasks may stay cached and keep refreshing
    active_symbol: Arc<RwLock<Option<String>>>,
}

impl FetchOrchestrator {
    pub fn new() -> Self {
        Self {
            tasks: Arc::new(DashMap::new()),
            scheduler: RefreshScheduler::new(),
            active_symbol: Arc::new(RwLock::new(None)),
        }
    }

    /// Resolve `key`, invoking `producer` only when no fresh value or in-flight attempt exists.
    ///
    /// The policy is fixed when the task is first created. Active tasks whose policy
    /// carries a `refetch_interval` get a background refresh timer after their first
    /// request. Tasks scoped to a symbol other than the active one serve this request
    /// and are then released.
    pub async fn request<T, F, Fut>(
        &self,
        key: FetchKey,
        policy: &FetchPolicy,
        producer: F,
    ) -> Result<Arc<T>>
    where
        T: Send + Sync + 'static,
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        let erased: ErasedProducer = Arc::new(move || {
            let fut = producer();
            async move { fut.await.map(|value| Arc::new(value) as AnyValue) }.boxed()
        });

        let task = self
            .tasks
            .entry(key.clone())
            .or_insert_with(|| Arc::new(FetchTask::new(key.clone(), policy.clone())))
            .clone();

        if self.is_active(&key) {
            if let Some(every) = task.policy().refetch_interval {
                self.schedule_refresh(&key, &task, every);
            }
        }

        let value = task.resolve(erased).await;

        if !self.is_active(&key) {
            self.scheduler.cancel(&key);
            if release(&self.tasks, &key, &task) {
                debug!("Released {}: symbol not selected", key);
            }
        }
        downcast(value?, &key)
    }

    /// Mark `symbol` as selected; scoped tasks of other symbols stop refreshing
    pub fn set_active_symbol(&self, symbol: &str) {
        *self.active_symbol.write() = Some(symbol.to_uppercase());
    }

    pub fn active_symbol(&self) -> Option<String> {
        self.active_symbol.read().clone()
    }

    fn is_active(&self, key: &FetchKey) -> bool {
        key.is_active_for(self.active_symbol.read().as_deref())
    }

    fn schedule_refresh(&self, key: &FetchKey, task: &Arc<FetchTask>, every: Duration) {
        let refresher = Arc::clone(task);
        let tasks = Arc::clone(&self.tasks);
        let active_symbol = Arc::clone(&self.active_symbol);
        let timer_key = key.clone();

        self.scheduler.schedule(key.clone(), every, move || {
            if !timer_key.is_active_for(active_symbol.read().as_deref()) {
                release(&tasks, &timer_key, &refresher);
                return false;
            }
            refresher.revalidate()
        });
    }

    /// Cached value for `key` regardless of age, without triggering a fetch
    pub fn peek<T: Send + Sync + 'static>(&self, key: &FetchKey) -> Option<Arc<T>> {
        let value = self.tasks.get(key)?.cached()?;
        value.downcast::<T>().ok()
    }

    pub fn status(&self, key: &FetchKey) -> Option<FetchStatus> {
        self.tasks.get(key).map(|task| task.status())
    }

    /// Schedule a new attempt for `key` while its cached value stays servable.
    ///
    /// Returns false when the key is unknown. Must be called within a tokio runtime.
    pub fn refresh(&self, key: &FetchKey) -> bool {
        let Some(task) = self.tasks.get(key).map(|t| Arc::clone(t.value())) else {
            return false;
        };
        task.revalidate()
    }

    /// Abandon every symbol-scoped task of `symbol`.
    ///
    /// In-flight attempts run to completion but their results are discarded.
    /// Global tasks (news feeds) are untouched.
    pub fn abandon_symbol(&self, symbol: &str) -> usize {
        let mut abandoned = 0;
        self.tasks.retain(|key, task| {
            if key.is_scoped_to(symbol) {
                task.abandon();
                abandoned += 1;
                false
            } else {
                true
            }
        });
        self.scheduler.cancel_where(|key| key.is_scoped_to(symbol));

        if abandoned > 0 {
            info!("Abandoned {} task(s) for {}", abandoned, symbol);
        }
        abandoned
    }

    pub fn task_count(&self) -> usize {
        self.tasks.len()
    }

    pub fn refresh_timer_count(&self) -> usize {
        self.scheduler.len()
    }

    /// Drop all tasks and cancel every background refresh timer
    pub fn shutdown(&self) {
        for task in self.tasks.iter() {
            task.abandon();
        }
        self.tasks.clear();
        self.scheduler.shutdown();
        debug!("Fetch orchestrator shut down");
    }
}

impl Default for FetchOrchestrator {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for FetchOrchestrator {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Drop `task` from the map if it is still the one registered under `key`
fn release(tasks: &TaskMap, key: &FetchKey, task: &Arc<FetchTask>) -> bool {
    let removed = tasks.remove_if(key, |_, current| Arc::ptr_eq(current, task)).is_some();
    if removed {
        task.abandon();
    }
    removed
}

fn downcast<T: Send + Sync + 'static>(value: AnyValue, key: &FetchKey) -> Result<Arc<T>> {
    value.downcast::<T>().map_err(|_| {
        AppError::Internal(format!(
            "{} holds a value of a different type than requested",
            key
        ))
    })
}
