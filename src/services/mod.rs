//! Services Layer
//!
//! Consumer-facing operations over the injected adapters, the fetch orchestrator
//! and the selection state. Called by the binary and by any embedding client.
//!
//! # Architecture
//!
//! ```text
//! CLI / client ──> Services ──> FetchOrchestrator ──> Source adapters
//!                     │
//!                     └──> SignalSynthesizer ──> Analysis engine
//! ```
//!
//! # Services
//!
//! - `QuoteService` - Live quote per symbol
//! - `HistoryService` - Price series and indicator series
//! - `NewsService` - Merged news bundle over all feeds
//! - `SignalService` - Synthesized market signal
//! - `DashboardService` - Per-group dashboard for the selected symbol

pub mod quote_service;
pub mod history_service;
pub mod news_service;
pub mod signal_service;
pub mod dashboard_service;

pub use quote_service::QuoteService;
pub use history_service::HistoryService;
pub use news_service::NewsService;
pub use signal_service::SignalService;
pub use dashboard_service::DashboardService;
