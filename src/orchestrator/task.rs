//! Fetch task state and the coalescing primitive

use super::key::FetchKey;
use super::policy::FetchPolicy;
use super::retry::run_with_retry;
use crate::error::{AppError, Result};
use futures_util::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use serde::Serialize;
use std::any::Any;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Type-erased cached value; written once, replaced wholesale
pub(crate) type AnyValue = Arc<dyn Any + Send + Sync>;

/// Type-erased producer; one call is one upstream request or computation
pub(crate) type ErasedProducer =
    Arc<dyn Fn() -> BoxFuture<'static, Result<AnyValue>> + Send + Sync>;

/// Handle every waiter of an in-flight resolution polls
pub(crate) type SharedAttempt = Shared<BoxFuture<'static, Result<AnyValue>>>;

/// Lifecycle phase of a fetch task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskPhase {
    Pending,
    InFlight,
    Succeeded,
    Failed,
}

/// Point-in-time view of a task for consumers
#[derive(Debug, Clone)]
pub struct FetchStatus {
    pub key: FetchKey,
    pub phase: TaskPhase,
    pub has_value: bool,
    /// Age of the cached value, if any
    pub age: Option<Duration>,
    /// Retries spent by the latest resolution
    pub retry_count: u32,
    pub last_error: Option<AppError>,
}

struct CachedValue {
    value: AnyValue,
    fetched_at: Instant,
}

struct TaskState {
    phase: TaskPhase,
    cached: Option<CachedValue>,
    in_flight: Option<SharedAttempt>,
    retry_count: u32,
    last_error: Option<AppError>,
    producer: Option<ErasedProducer>,
}

/// One task per distinct key; concurrent requests attach to its in-flight attempt
pub(crate) struct FetchTask {
    key: FetchKey,
    policy: FetchPolicy,
    state: Mutex<TaskState>,
    abandoned: AtomicBool,
}

impl FetchTask {
    pub(crate) fn new(key: FetchKey, policy: FetchPolicy) -> Self {
        Self {
            key,
            policy,
            state: Mutex::new(TaskState {
                phase: TaskPhase::Pending,
                cached: None,
                in_flight: None,
                retry_count: 0,
                last_error: None,
                producer: None,
            }),
            abandoned: AtomicBool::new(false),
        }
    }

    pub(crate) fn policy(&self) -> &FetchPolicy {
        &self.policy
    }

    /// Resolve the task: fresh cache hit, join the in-flight attempt, or start one.
    ///
    /// If the attempt fails while an older value is cached, that value is served and the
    /// failure stays recorded on the task.
    pub(crate) async fn resolve(self: &Arc<Self>, producer: ErasedProducer) -> Result<AnyValue> {
        let (attempt, stale) = {
            let mut state = self.state.lock();
            state.producer = Some(producer);

            if let Some(cached) = &state.cached {
                if cached.fetched_at.elapsed() < self.policy.ttl {
                    debug!("{}: cache hit", self.key);
                    return Ok(cached.value.clone());
                }
            }

            let stale = state.cached.as_ref().map(|c| c.value.clone());
            (self.attempt_locked(&mut state), stale)
        };

        match attempt.await {
            Ok(value) => Ok(value),
            Err(err) => match stale {
                Some(value) => {
                    warn!("{}: revalidation failed, serving stale value: {}", self.key, err);
                    Ok(value)
                }
                None => Err(err),
            },
        }
    }

    /// Start a background revalidation unless one is already running.
    ///
    /// Returns false once the task is abandoned or has no producer yet.
    pub(crate) fn revalidate(self: &Arc<Self>) -> bool {
        if self.is_abandoned() {
            return false;
        }
        let mut state = self.state.lock();
        if state.producer.is_none() {
            return false;
        }
        if state.in_flight.is_none() {
            debug!("{}: background revalidation", self.key);
            // Runs to completion on its own; waiters read the cache afterwards
            drop(self.attempt_locked(&mut state));
        }
        true
    }

    /// Cached value regardless of age
    pub(crate) fn cached(&self) -> Option<AnyValue> {
        self.state.lock().cached.as_ref().map(|c| c.value.clone())
    }

    pub(crate) fn status(&self) -> FetchStatus {
        let state = self.state.lock();
        FetchStatus {
            key: self.key.clone(),
            phase: state.phase,
            has_value: state.cached.is_some(),
            age: state.cached.as_ref().map(|c| c.fetched_at.elapsed()),
            retry_count: state.retry_count,
            last_error: state.last_error.clone(),
        }
    }

    /// Results that arrive after abandonment are discarded
    pub(crate) fn abandon(&self) {
        self.abandoned.store(true, Ordering::SeqCst);
    }

    pub(crate) fn is_abandoned(&self) -> bool {
        self.abandoned.load(Ordering::SeqCst)
    }

    /// Join the in-flight attempt or spawn a new one. Caller holds the state lock.
    fn attempt_locked(self: &Arc<Self>, state: &mut TaskState) -> SharedAttempt {
        if let Some(in_flight) = &state.in_flight {
            debug!("{}: attaching to in-flight attempt", self.key);
            return in_flight.clone();
        }

        state.phase = TaskPhase::InFlight;
        state.retry_count = 0;

        // Spawned so the attempt completes even if every waiter goes away
        let task = Arc::clone(self);
        let handle = tokio::spawn(async move { task.run().await });
        let key = self.key.clone();
        let attempt = async move {
            match handle.await {
                Ok(outcome) => outcome,
                Err(e) => Err(AppError::Internal(format!("{} task aborted: {}", key, e))),
            }
        }
        .boxed()
        .shared();

        state.in_flight = Some(attempt.clone());
        attempt
    }

    async fn run(self: Arc<Self>) -> Result<AnyValue> {
        let producer = self.state.lock().producer.clone();
        let Some(producer) = producer else {
            return Err(AppError::Internal(format!("{}: no producer registered", self.key)));
        };

        let label = self.key.to_string();
        let outcome = run_with_retry(
            &label,
            &self.policy,
            |attempt, err| {
                let mut state = self.state.lock();
                state.retry_count = attempt;
                state.last_error = Some(err.clone());
            },
            || producer(),
        )
        .await;

        self.complete(&outcome);
        outcome
    }

    fn complete(&self, outcome: &Result<AnyValue>) {
        let mut state = self.state.lock();
        state.in_flight = None;

        if self.is_abandoned() {
            debug!("{}: result arrived after abandonment, discarded", self.key);
            return;
        }

        match outcome {
            Ok(value) => {
                state.cached = Some(CachedValue {
                    value: value.clone(),
                    fetched_at: Instant::now(),
                });
                state.phase = TaskPhase::Succeeded;
                state.last_error = None;
                info!("{}: resolved", self.key);
            }
            Err(err) => {
                state.phase = TaskPhase::Failed;
                state.last_error = Some(err.clone());
            }
        }
    }
}
