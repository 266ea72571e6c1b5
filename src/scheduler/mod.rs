//! Scheduler module
//!
//! Handles background work that runs on a timer:
//! - Refetch timers for active fetch tasks

mod refresh;

pub use refresh::RefreshScheduler;
